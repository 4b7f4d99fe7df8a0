use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    payments::PaymentProvider,
    services::{CartService, CatalogService, CheckoutService, OrderService, ReconciliationService},
};

pub mod carts;
pub mod checkout;
pub mod common;
pub mod orders;
pub mod webhooks;

/// Services used by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub reconciliation: Arc<ReconciliationService>,
    pub orders: Arc<OrderService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        provider: Arc<dyn PaymentProvider>,
        config: Arc<AppConfig>,
    ) -> Self {
        let catalog = Arc::new(CatalogService::new(db.clone()));
        let cart = Arc::new(CartService::new(
            db.clone(),
            event_sender.clone(),
            catalog.clone(),
        ));
        let checkout = Arc::new(CheckoutService::new(
            db.clone(),
            event_sender.clone(),
            catalog.clone(),
            provider.clone(),
            config,
        ));
        let reconciliation = Arc::new(ReconciliationService::new(
            db.clone(),
            event_sender,
            provider,
        ));
        let orders = Arc::new(OrderService::new(db));

        Self {
            catalog,
            cart,
            checkout,
            reconciliation,
            orders,
        }
    }
}
