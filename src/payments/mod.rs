use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

pub mod hosted_checkout;

pub use hosted_checkout::HostedCheckoutClient;

/// Request for one hosted checkout session. Metadata must carry everything
/// needed to materialize an order later without re-reading the cart.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    pub amount: Decimal,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: serde_json::Value,
}

/// Provider-issued handle for a hosted checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSession {
    pub id: String,
    pub redirect_url: String,
}

/// The provider's view of a session's payment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSessionStatus {
    /// Payment not finished; the shopper may still complete it.
    Open,
    Paid,
    Expired,
    Failed,
}

/// Asynchronous status event pushed by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEvent {
    /// Provider-side event id, used only for logging.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub provider_session_id: String,
}

impl ProviderEvent {
    /// Maps the event type onto the session status it reports. Unknown
    /// event types are ignored by the caller.
    pub fn reported_status(&self) -> Option<ProviderSessionStatus> {
        match self.event_type.as_str() {
            "checkout.session.completed" => Some(ProviderSessionStatus::Paid),
            "checkout.session.expired" => Some(ProviderSessionStatus::Expired),
            "checkout.session.failed" => Some(ProviderSessionStatus::Failed),
            _ => None,
        }
    }
}

/// Boundary to the hosted payment provider. The provider's checkout page is
/// opaque; this core only creates sessions and reads their status.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<ProviderSession, ServiceError>;

    async fn get_session_status(
        &self,
        provider_session_id: &str,
    ) -> Result<ProviderSessionStatus, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_types_map_to_statuses() {
        let event = |event_type: &str| ProviderEvent {
            id: Some("evt_1".into()),
            event_type: event_type.into(),
            provider_session_id: "cs_1".into(),
        };

        assert_eq!(
            event("checkout.session.completed").reported_status(),
            Some(ProviderSessionStatus::Paid)
        );
        assert_eq!(
            event("checkout.session.expired").reported_status(),
            Some(ProviderSessionStatus::Expired)
        );
        assert_eq!(
            event("checkout.session.failed").reported_status(),
            Some(ProviderSessionStatus::Failed)
        );
        assert_eq!(event("invoice.created").reported_status(), None);
    }
}
