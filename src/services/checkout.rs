use crate::{
    config::AppConfig,
    entities::{cart_item, checkout_session, CartItem, CheckoutStatus, LineSnapshot},
    errors::ServiceError,
    events::{Event, EventSender},
    identity::Identity,
    payments::{CreateSessionRequest, PaymentProvider},
    services::catalog::CatalogService,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

/// Checkout session manager: snapshots the cart, opens a hosted payment
/// session with the provider, and persists the pending transaction keyed by
/// the provider's session id.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    catalog: Arc<CatalogService>,
    provider: Arc<dyn PaymentProvider>,
    config: Arc<AppConfig>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        catalog: Arc<CatalogService>,
        provider: Arc<dyn PaymentProvider>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            catalog,
            provider,
            config,
        }
    }

    /// Creates a hosted checkout session for the identity's cart.
    ///
    /// Every line is re-validated against the live catalog and re-priced at
    /// the current price; a price change between add-to-cart and checkout
    /// is honored here. The snapshot stored with the session carries
    /// everything needed to materialize the order later, so the cart may be
    /// mutated or cleared in another tab without corrupting this checkout.
    #[instrument(skip(self), fields(owner = %identity))]
    pub async fn create_session(
        &self,
        identity: &Identity,
    ) -> Result<CheckoutSessionCreated, ServiceError> {
        let owner_id = identity.owner_id();

        let lines = CartItem::find()
            .filter(cart_item::Column::OwnerId.eq(owner_id.clone()))
            .all(&*self.db)
            .await?;

        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let mut snapshots = Vec::with_capacity(lines.len());
        let mut total_amount = Decimal::ZERO;

        for line in &lines {
            let product = match self.catalog.get_product(line.product_id).await {
                Ok(product) => product,
                Err(ServiceError::NotFound(_)) => {
                    return Err(ServiceError::OutOfStock(format!(
                        "Product {} is no longer available",
                        line.product_id
                    )))
                }
                Err(other) => return Err(other),
            };

            if !product.is_active || product.stock < line.quantity {
                return Err(ServiceError::OutOfStock(product.name.clone()));
            }

            let item_total = product.price * Decimal::from(line.quantity);
            total_amount += item_total;
            snapshots.push(LineSnapshot {
                product_id: product.id,
                name: product.name.clone(),
                quantity: line.quantity,
                unit_price: product.price,
                item_total,
            });
        }

        if total_amount <= Decimal::ZERO {
            return Err(ServiceError::InvalidOperation(
                "Cart total must be positive".to_string(),
            ));
        }

        let items_json = serde_json::to_value(&snapshots)
            .map_err(|e| ServiceError::InternalError(format!("snapshot serialization: {}", e)))?;

        let metadata = serde_json::json!({
            "owner_id": owner_id,
            "order_type": "cart_checkout",
            "items": items_json,
        });

        // The only network-bound suspension point in the core; bounded by
        // the provider timeout and surfaced to the caller on expiry.
        let provider_session = self
            .provider
            .create_checkout_session(CreateSessionRequest {
                amount: total_amount,
                currency: self.config.currency.clone(),
                success_url: self.config.checkout_success_url.clone(),
                cancel_url: self.config.checkout_cancel_url.clone(),
                metadata,
            })
            .await?;

        let now = Utc::now();
        let session = checkout_session::ActiveModel {
            provider_session_id: Set(provider_session.id.clone()),
            owner_id: Set(owner_id.clone()),
            amount: Set(total_amount),
            currency: Set(self.config.currency.clone()),
            status: Set(CheckoutStatus::Initiated),
            items: Set(items_json),
            redirect_url: Set(provider_session.redirect_url.clone()),
            failure_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        session.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CheckoutSessionCreated {
                provider_session_id: provider_session.id.clone(),
                owner_id,
                amount: total_amount,
            })
            .await;

        info!(
            provider_session_id = %provider_session.id,
            amount = %total_amount,
            "created checkout session"
        );

        Ok(CheckoutSessionCreated {
            provider_session_id: provider_session.id,
            redirect_url: provider_session.redirect_url,
        })
    }
}

/// Response for a newly created checkout session
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutSessionCreated {
    /// Opaque provider key; round-trips unchanged into every status lookup
    pub provider_session_id: String,
    /// Hosted payment page the caller should redirect the shopper to
    pub redirect_url: String,
}
