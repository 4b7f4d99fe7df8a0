#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use storefront_api::{
    config::AppConfig,
    db,
    entities::product,
    errors::ServiceError,
    events::EventSender,
    handlers::AppServices,
    payments::{CreateSessionRequest, PaymentProvider, ProviderSession, ProviderSessionStatus},
    AppState,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Scriptable in-process payment provider. Sessions start `Open`; tests
/// flip them with [`set_status`](Self::set_status) to simulate the hosted
/// page completing, expiring, or failing.
#[derive(Default)]
pub struct StubProvider {
    sessions: Mutex<HashMap<String, ProviderSessionStatus>>,
    counter: AtomicU32,
    /// When set, every call fails with this error kind.
    timeout_mode: Mutex<bool>,
}

impl StubProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_status(&self, provider_session_id: &str, status: ProviderSessionStatus) {
        self.sessions
            .lock()
            .unwrap()
            .insert(provider_session_id.to_string(), status);
    }

    pub fn set_timeout_mode(&self, enabled: bool) {
        *self.timeout_mode.lock().unwrap() = enabled;
    }

    pub fn created_sessions(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentProvider for StubProvider {
    async fn create_checkout_session(
        &self,
        _request: CreateSessionRequest,
    ) -> Result<ProviderSession, ServiceError> {
        if *self.timeout_mode.lock().unwrap() {
            return Err(ServiceError::ProviderTimeout(10));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = format!("cs_test_{:04}", n);
        self.sessions
            .lock()
            .unwrap()
            .insert(id.clone(), ProviderSessionStatus::Open);

        Ok(ProviderSession {
            redirect_url: format!("https://pay.example.test/c/{}", id),
            id,
        })
    }

    async fn get_session_status(
        &self,
        provider_session_id: &str,
    ) -> Result<ProviderSessionStatus, ServiceError> {
        if *self.timeout_mode.lock().unwrap() {
            return Err(ServiceError::ProviderTimeout(10));
        }

        self.sessions
            .lock()
            .unwrap()
            .get(provider_session_id)
            .copied()
            .ok_or_else(|| {
                ServiceError::ProviderError(format!(
                    "unknown provider session {}",
                    provider_session_id
                ))
            })
    }
}

/// Application harness backed by a throwaway SQLite database and the stub
/// provider.
pub struct TestApp {
    pub state: AppState,
    pub provider: Arc<StubProvider>,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Construct with configuration tweaks (e.g. a webhook secret).
    pub async fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let db_dir = TempDir::new().expect("tempdir");
        let db_path = db_dir.path().join("storefront_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
            "https://pay.example.test".to_string(),
            "sk_test_key".to_string(),
            "http://localhost:3000/success?session_id={CHECKOUT_SESSION_ID}".to_string(),
            "http://localhost:3000/cart".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        tweak(&mut cfg);

        let pool = db::establish_connection(&cfg).await.expect("db connect");
        db::run_migrations(&pool).await.expect("migrations");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(storefront_api::events::process_events(event_rx));

        let provider = StubProvider::new();
        let cfg = Arc::new(cfg);
        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            provider.clone(),
            cfg.clone(),
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        Self {
            state,
            provider,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    /// Router with the full v1 API, ready for `tower::ServiceExt::oneshot`.
    pub fn router(&self) -> Router {
        Router::new()
            .nest("/api/v1", storefront_api::api_v1_routes())
            .with_state(self.state.clone())
    }

    /// Seed a catalog product and return its id.
    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> Uuid {
        let product_id = Uuid::new_v4();
        let now = Utc::now();

        let row = product::ActiveModel {
            id: Set(product_id),
            name: Set(name.to_string()),
            description: Set(Some(format!("{} description", name))),
            price: Set(price),
            currency: Set("usd".to_string()),
            image_url: Set(Some(format!("https://img.example.test/{}.jpg", product_id))),
            stock: Set(stock),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        row.insert(&*self.state.db).await.expect("seed product");

        product_id
    }
}
