//! Storefront API Library
//!
//! Session-scoped shopping carts, checkout-session lifecycle against a
//! hosted payment provider, and payment-status reconciliation into orders.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod identity;
pub mod migrator;
pub mod openapi;
pub mod payments;
pub mod services;

use axum::{routing::post, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Full v1 API surface: cart CRUD, checkout session + status, provider
/// webhook, and order history.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/cart", handlers::carts::carts_routes())
        .nest(
            "/checkout",
            handlers::checkout::checkout_routes()
                .route("/webhook", post(handlers::webhooks::provider_webhook)),
        )
        .nest("/orders", handlers::orders::orders_routes())
}
