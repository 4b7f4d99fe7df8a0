use crate::{
    handlers::common::{created_response, success_response},
    errors::ServiceError,
    identity::Identity,
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/session", post(create_checkout_session))
        .route("/status/:provider_session_id", get(get_checkout_status))
}

/// Create a hosted checkout session for the caller's cart
#[utoipa::path(
    post,
    path = "/api/v1/checkout/session",
    responses(
        (status = 201, description = "Checkout session created", body = crate::services::CheckoutSessionCreated),
        (status = 400, description = "Cart is empty", body = crate::errors::ErrorResponse),
        (status = 422, description = "A line is out of stock", body = crate::errors::ErrorResponse),
        (status = 502, description = "Provider error", body = crate::errors::ErrorResponse),
        (status = 504, description = "Provider timed out", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state.services.checkout.create_session(&identity).await?;
    Ok(created_response(session))
}

/// Poll the reconciled status of a checkout session
#[utoipa::path(
    get,
    path = "/api/v1/checkout/status/{provider_session_id}",
    params(
        ("provider_session_id" = String, Path, description = "Provider-issued checkout session id")
    ),
    responses(
        (status = 200, description = "Current session status", body = crate::services::CheckoutStatusView),
        (status = 404, description = "Unknown session", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn get_checkout_status(
    State(state): State<AppState>,
    Path(provider_session_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let status = state
        .services
        .reconciliation
        .check_status(&provider_session_id)
        .await?;
    Ok(success_response(status))
}
