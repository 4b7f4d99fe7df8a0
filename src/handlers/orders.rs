use crate::{
    handlers::common::success_response,
    errors::ServiceError,
    identity::Identity,
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use uuid::Uuid;

/// Creates the router for order endpoints
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
}

/// List the caller's orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    responses(
        (status = 200, description = "Orders owned by the caller", body = [crate::services::OrderView]),
        (status = 401, description = "Missing identity", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.orders.list_orders(&identity).await?;
    Ok(success_response(orders))
}

/// Fetch one of the caller's orders
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "The order", body = crate::services::OrderView),
        (status = 401, description = "Order belongs to a different identity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.get_order(&identity, id).await?;
    Ok(success_response(order))
}
