use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = r#"
# Storefront Checkout API

Session-scoped shopping carts, hosted checkout sessions, and payment-status
reconciliation into immutable orders.

## Identity

Every cart, checkout, and order call is scoped to an opaque identity taken
from request headers: `x-customer-id` (verified upstream) for authenticated
shoppers, or `x-session-id` for guests. Requests carrying neither are
rejected with 401.

## Checkout flow

1. `POST /api/v1/checkout/session` snapshots the cart and returns the
   provider's redirect URL.
2. The shopper pays on the provider's hosted page.
3. The frontend polls `GET /api/v1/checkout/status/{provider_session_id}`
   (and the provider may push webhooks); both paths reconcile into the same
   idempotent state transition.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        crate::handlers::checkout::create_checkout_session,
        crate::handlers::checkout::get_checkout_status,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::webhooks::provider_webhook,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::services::AddToCartInput,
        crate::services::UpdateQuantityInput,
        crate::services::CartItemView,
        crate::services::CartSummary,
        crate::services::CheckoutSessionCreated,
        crate::services::CheckoutStatusView,
        crate::services::OrderView,
        crate::services::OrderItemView,
    )),
    tags(
        (name = "Checkout", description = "Checkout session lifecycle and reconciliation"),
        (name = "Orders", description = "Materialized order history")
    )
)]
pub struct ApiDoc;

/// Swagger UI serving the generated OpenAPI document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
