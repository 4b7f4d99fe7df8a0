use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{instrument, warn};

use super::{CreateSessionRequest, PaymentProvider, ProviderSession, ProviderSessionStatus};
use crate::errors::ServiceError;

/// HTTP client for the hosted checkout provider.
///
/// Every call is bounded by the configured timeout; an elapsed timeout is
/// reported as `ProviderTimeout` and never retried here; retry policy
/// belongs to the caller.
#[derive(Debug, Clone)]
pub struct HostedCheckoutClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct SessionCreatedBody {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct SessionStatusBody {
    status: String,
    #[serde(default)]
    payment_status: Option<String>,
}

impl HostedCheckoutClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout_secs,
        })
    }

    fn map_request_error(&self, err: reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            ServiceError::ProviderTimeout(self.timeout_secs)
        } else {
            ServiceError::ProviderError(format!("request failed: {}", err))
        }
    }

    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(
                "provider checkout session not found".to_string(),
            ));
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = %status, "provider returned an error response");
        Err(ServiceError::ProviderError(format!(
            "provider responded {}: {}",
            status,
            body.chars().take(256).collect::<String>()
        )))
    }
}

/// Maps the provider's two status fields onto one local view. A session is
/// paid only when the provider says so explicitly.
fn map_session_status(body: &SessionStatusBody) -> ProviderSessionStatus {
    if body.payment_status.as_deref() == Some("paid") {
        return ProviderSessionStatus::Paid;
    }
    match body.status.as_str() {
        "expired" => ProviderSessionStatus::Expired,
        "failed" | "canceled" => ProviderSessionStatus::Failed,
        _ => ProviderSessionStatus::Open,
    }
}

#[async_trait]
impl PaymentProvider for HostedCheckoutClient {
    #[instrument(skip(self, request), fields(amount = %request.amount, currency = %request.currency))]
    async fn create_checkout_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<ProviderSession, ServiceError> {
        let url = format!("{}/v1/checkout/sessions", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let body: SessionCreatedBody = self
            .check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::ProviderError(format!("malformed session response: {}", e)))?;

        Ok(ProviderSession {
            id: body.id,
            redirect_url: body.url,
        })
    }

    #[instrument(skip(self))]
    async fn get_session_status(
        &self,
        provider_session_id: &str,
    ) -> Result<ProviderSessionStatus, ServiceError> {
        let url = format!("{}/v1/checkout/sessions/{}", self.base_url, provider_session_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let body: SessionStatusBody = self
            .check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::ProviderError(format!("malformed status response: {}", e)))?;

        Ok(map_session_status(&body))
    }
}
