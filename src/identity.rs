use axum::{extract::FromRequestParts, http::request::Parts};
use std::fmt;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Opaque owner of a cart, checkout session, or order.
///
/// Credential verification happens upstream; this core only receives the
/// resulting identity and scopes every read and write by it. Authenticated
/// shoppers arrive as `Customer`, anonymous ones as `Guest` carrying the
/// client-generated session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Customer(Uuid),
    Guest(String),
}

impl Identity {
    /// Canonical storage key. Prefixed so a forged session id can never
    /// collide with a customer id.
    pub fn owner_id(&self) -> String {
        match self {
            Identity::Customer(id) => format!("customer:{}", id),
            Identity::Guest(session_id) => format!("guest:{}", session_id),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.owner_id())
    }
}

const CUSTOMER_ID_HEADER: &str = "x-customer-id";
const SESSION_ID_HEADER: &str = "x-session-id";

#[axum::async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(raw) = parts.headers.get(CUSTOMER_ID_HEADER) {
            let raw = raw
                .to_str()
                .map_err(|_| ServiceError::Unauthorized("malformed customer id".to_string()))?;
            let customer_id = Uuid::parse_str(raw)
                .map_err(|_| ServiceError::Unauthorized("malformed customer id".to_string()))?;
            return Ok(Identity::Customer(customer_id));
        }

        if let Some(raw) = parts.headers.get(SESSION_ID_HEADER) {
            let session_id = raw
                .to_str()
                .map_err(|_| ServiceError::Unauthorized("malformed session id".to_string()))?;
            if session_id.trim().is_empty() {
                return Err(ServiceError::Unauthorized("empty session id".to_string()));
            }
            return Ok(Identity::Guest(session_id.to_string()));
        }

        Err(ServiceError::Unauthorized(
            "authentication or session id required".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_keys_are_prefixed_by_kind() {
        let customer_id = Uuid::new_v4();
        assert_eq!(
            Identity::Customer(customer_id).owner_id(),
            format!("customer:{}", customer_id)
        );
        assert_eq!(
            Identity::Guest("sess_abc".to_string()).owner_id(),
            "guest:sess_abc"
        );
    }

    #[test]
    fn a_guest_cannot_forge_a_customer_key() {
        let customer_id = Uuid::new_v4();
        let forged = Identity::Guest(format!("customer:{}", customer_id));
        assert_ne!(forged.owner_id(), Identity::Customer(customer_id).owner_id());
    }
}
