use crate::{errors::ServiceError, payments::ProviderEvent, AppState};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_TOLERANCE_SECS: u64 = 300;

/// Provider status events. Signature verification runs when a webhook
/// secret is configured; the body is then parsed and fed into the same
/// reconciliation routine that polling uses, so replayed deliveries are
/// no-ops.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Event accepted"),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn provider_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    if let Some(secret) = state.config.payment_webhook_secret.clone() {
        let tolerance = state
            .config
            .payment_webhook_tolerance_secs
            .unwrap_or(DEFAULT_TOLERANCE_SECS);
        if !verify_signature(&headers, &body, &secret, tolerance) {
            warn!("Payment webhook signature verification failed");
            return Err(ServiceError::Unauthorized(
                "invalid webhook signature".to_string(),
            ));
        }
    }

    let event: ProviderEvent = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::ValidationError(format!("invalid webhook payload: {}", e)))?;

    if let Some(event_id) = event.id.as_deref() {
        info!(event_id = %event_id, "processing provider webhook");
    }

    state
        .services
        .reconciliation
        .handle_provider_event(&event)
        .await?;

    Ok((StatusCode::OK, "ok"))
}

fn verify_signature(headers: &HeaderMap, payload: &Bytes, secret: &str, tolerance_secs: u64) -> bool {
    // Generic HMAC: x-timestamp and x-signature headers
    if let (Some(ts), Some(sig)) = (headers.get("x-timestamp"), headers.get("x-signature")) {
        if let (Ok(ts), Ok(sig)) = (ts.to_str(), sig.to_str()) {
            if let Ok(ts_i) = ts.parse::<i64>() {
                let now = chrono::Utc::now().timestamp();
                if (now - ts_i).unsigned_abs() > tolerance_secs {
                    return false;
                }
            }
            return signature_matches(ts, payload, secret, sig);
        }
    }
    // Stripe-style support: Stripe-Signature with t=, v1=
    if let Some(sig) = headers.get("stripe-signature").and_then(|h| h.to_str().ok()) {
        let mut ts = "";
        let mut v1 = "";
        for part in sig.split(',') {
            let mut it = part.split('=');
            match (it.next(), it.next()) {
                (Some("t"), Some(val)) => ts = val,
                (Some("v1"), Some(val)) => v1 = val,
                _ => {}
            }
        }
        if !ts.is_empty() && !v1.is_empty() {
            return signature_matches(ts, payload, secret, v1);
        }
    }
    false
}

fn signature_matches(ts: &str, payload: &Bytes, secret: &str, candidate: &str) -> bool {
    let signed = format!("{}.{}", ts, std::str::from_utf8(payload).unwrap_or(""));
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(signed.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, candidate)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn sign(secret: &str, ts: &str, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", ts, payload).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn generic_header_signature_verifies() {
        let secret = "whsec_test";
        let payload = Bytes::from_static(b"{\"type\":\"checkout.session.completed\"}");
        let ts = chrono::Utc::now().timestamp().to_string();
        let sig = sign(secret, &ts, std::str::from_utf8(&payload).unwrap());

        let mut headers = HeaderMap::new();
        headers.insert("x-timestamp", HeaderValue::from_str(&ts).unwrap());
        headers.insert("x-signature", HeaderValue::from_str(&sig).unwrap());

        assert!(verify_signature(&headers, &payload, secret, 300));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let secret = "whsec_test";
        let payload = Bytes::from_static(b"{}");
        let ts = (chrono::Utc::now().timestamp() - 4000).to_string();
        let sig = sign(secret, &ts, "{}");

        let mut headers = HeaderMap::new();
        headers.insert("x-timestamp", HeaderValue::from_str(&ts).unwrap());
        headers.insert("x-signature", HeaderValue::from_str(&sig).unwrap());

        assert!(!verify_signature(&headers, &payload, secret, 300));
    }

    #[test]
    fn stripe_style_signature_verifies() {
        let secret = "whsec_test";
        let payload = Bytes::from_static(b"{\"type\":\"checkout.session.expired\"}");
        let ts = "1700000000";
        let sig = sign(secret, ts, std::str::from_utf8(&payload).unwrap());

        let mut headers = HeaderMap::new();
        headers.insert(
            "stripe-signature",
            HeaderValue::from_str(&format!("t={},v1={}", ts, sig)).unwrap(),
        );

        assert!(verify_signature(&headers, &payload, secret, 300));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let payload = Bytes::from_static(b"{}");
        let ts = chrono::Utc::now().timestamp().to_string();
        let sig = sign("other_secret", &ts, "{}");

        let mut headers = HeaderMap::new();
        headers.insert("x-timestamp", HeaderValue::from_str(&ts).unwrap());
        headers.insert("x-signature", HeaderValue::from_str(&sig).unwrap());

        assert!(!verify_signature(&headers, &payload, "whsec_test", 300));
    }

    #[test]
    fn missing_headers_are_rejected() {
        let payload = Bytes::from_static(b"{}");
        assert!(!verify_signature(&HeaderMap::new(), &payload, "whsec_test", 300));
    }

    #[test]
    fn constant_time_eq_requires_equal_lengths() {
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(constant_time_eq("abcd", "abcd"));
        assert!(!constant_time_eq("abcd", "abce"));
    }
}
