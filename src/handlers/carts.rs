use crate::{
    handlers::common::{no_content_response, success_response, validate_input},
    errors::ServiceError,
    identity::Identity,
    services::{AddToCartInput, UpdateQuantityInput},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use uuid::Uuid;

/// Creates the router for cart endpoints
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/", delete(clear_cart))
        .route("/items", post(add_to_cart))
        .route("/items/:item_id", put(update_cart_item))
        .route("/items/:item_id", delete(remove_cart_item))
}

/// Get the caller's cart with resolved product details
async fn get_cart(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.cart.get_cart(&identity).await?;
    Ok(success_response(cart))
}

/// Add an item to the cart (or increment the existing line)
async fn add_to_cart(
    State(state): State<AppState>,
    identity: Identity,
    Json(payload): Json<AddToCartInput>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let cart = state.services.cart.add_item(&identity, payload).await?;
    Ok(success_response(cart))
}

/// Update a line's quantity; zero or less removes the line
async fn update_cart_item(
    State(state): State<AppState>,
    identity: Identity,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state
        .services
        .cart
        .update_item(&identity, item_id, payload.quantity)
        .await?;
    Ok(success_response(cart))
}

/// Remove a line from the cart (idempotent)
async fn remove_cart_item(
    State(state): State<AppState>,
    identity: Identity,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.cart.remove_item(&identity, item_id).await?;
    Ok(no_content_response())
}

/// Clear the caller's cart
async fn clear_cart(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.cart.clear_cart(&identity).await?;
    Ok(no_content_response())
}
