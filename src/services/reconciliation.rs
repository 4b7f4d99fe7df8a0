use crate::{
    entities::{
        checkout_session, order, order_item, CheckoutSession, CheckoutSessionModel, CheckoutStatus,
        PaymentStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    payments::{PaymentProvider, ProviderEvent, ProviderSessionStatus},
    services::{carts::CartService, catalog::CatalogService},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Payment status reconciler.
///
/// Polling (`check_status`) and webhooks (`handle_provider_event`) both
/// converge on [`reconcile`](Self::reconcile): one idempotent state-machine
/// transition `initiated -> {paid, expired, failed}`. Replays of the same
/// provider signal never double-apply stock decrements or create duplicate
/// orders: the terminal-state compare-and-set runs in the same transaction
/// as the order write.
#[derive(Clone)]
pub struct ReconciliationService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    provider: Arc<dyn PaymentProvider>,
}

impl ReconciliationService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            db,
            event_sender,
            provider,
        }
    }

    /// Polling entry point. Looks the session up locally first (a forged or
    /// foreign id never reaches the provider), skips the provider call
    /// entirely for terminal sessions, and otherwise reconciles against the
    /// provider's current view.
    #[instrument(skip(self))]
    pub async fn check_status(
        &self,
        provider_session_id: &str,
    ) -> Result<CheckoutStatusView, ServiceError> {
        let session = self.find_session(provider_session_id).await?;
        if session.status.is_terminal() {
            return Ok(CheckoutStatusView::from(session));
        }

        let reported = self.provider.get_session_status(provider_session_id).await?;
        let session = self.reconcile(provider_session_id, reported).await?;
        Ok(CheckoutStatusView::from(session))
    }

    /// Webhook entry point. Unknown event types are ignored; known ones
    /// feed the same reconciliation routine as polling.
    #[instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn handle_provider_event(
        &self,
        event: &ProviderEvent,
    ) -> Result<Option<CheckoutStatusView>, ServiceError> {
        let Some(reported) = event.reported_status() else {
            info!("ignoring unhandled provider event type");
            return Ok(None);
        };

        let session = self.reconcile(&event.provider_session_id, reported).await?;
        Ok(Some(CheckoutStatusView::from(session)))
    }

    /// The single reconciliation routine both entry points share.
    pub async fn reconcile(
        &self,
        provider_session_id: &str,
        reported: ProviderSessionStatus,
    ) -> Result<CheckoutSessionModel, ServiceError> {
        let session = self.find_session(provider_session_id).await?;

        if session.status.is_terminal() {
            // A paid report against a session that terminated without
            // payment means the provider and this store disagree about
            // money. Surface it for manual review instead of silently
            // materializing an order.
            if reported == ProviderSessionStatus::Paid && session.status != CheckoutStatus::Paid {
                error!(
                    provider_session_id = %provider_session_id,
                    local_status = session.status.as_str(),
                    "provider reported paid for a session already terminal in a non-paid state"
                );
                return Err(ServiceError::ProviderError(format!(
                    "paid event for checkout session {} already in state {}",
                    provider_session_id,
                    session.status.as_str()
                )));
            }
            return Ok(session);
        }

        match reported {
            ProviderSessionStatus::Open => Ok(session),
            ProviderSessionStatus::Paid => self.apply_paid(session).await,
            ProviderSessionStatus::Expired => {
                self.apply_terminal(session, CheckoutStatus::Expired, None).await
            }
            ProviderSessionStatus::Failed => {
                self.apply_terminal(
                    session,
                    CheckoutStatus::Failed,
                    Some("provider reported the session failed".to_string()),
                )
                .await
            }
        }
    }

    /// Paid transition: claim the session, decrement stock, materialize the
    /// order, and clear the cart, all in one transaction.
    async fn apply_paid(
        &self,
        session: CheckoutSessionModel,
    ) -> Result<CheckoutSessionModel, ServiceError> {
        let provider_session_id = session.provider_session_id.clone();
        let lines = session
            .line_snapshots()
            .map_err(|e| ServiceError::InternalError(format!("corrupt session snapshot: {}", e)))?;

        let txn = self.db.begin().await?;

        // Compare-and-set claim. Losing means a concurrent delivery of the
        // same signal already applied the transition; return its result.
        if !Self::claim_transition(&txn, &provider_session_id, CheckoutStatus::Paid, None).await? {
            txn.rollback().await?;
            return self.find_session(&provider_session_id).await;
        }

        for line in &lines {
            if let Err(err) =
                CatalogService::decrement_stock(&txn, line.product_id, line.quantity, &line.name)
                    .await
            {
                // Roll the claim and any earlier decrements back, then
                // flag the session for manual reconciliation. The payment
                // itself is not ours to roll back.
                txn.rollback().await?;
                return self.flag_insufficient_stock(&provider_session_id, err).await;
            }
        }

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let order = order::ActiveModel {
            id: Set(order_id),
            owner_id: Set(session.owner_id.clone()),
            total_amount: Set(session.amount),
            currency: Set(session.currency.clone()),
            payment_status: Set(PaymentStatus::Paid),
            provider_session_id: Set(provider_session_id.clone()),
            created_at: Set(now),
        };
        order.insert(&txn).await?;

        for line in &lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                name: Set(line.name.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                item_total: Set(line.item_total),
                created_at: Set(now),
            };
            item.insert(&txn).await?;
        }

        // The cart is superseded by the order; expiry and failure leave it
        // untouched for retry.
        CartService::clear_owner(&txn, &session.owner_id).await?;

        let updated = CheckoutSession::find_by_id(provider_session_id.clone())
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError("checkout session vanished mid-transition".to_string())
            })?;

        txn.commit().await?;

        for line in &lines {
            self.event_sender
                .send_or_log(Event::StockDecremented {
                    product_id: line.product_id,
                    quantity: line.quantity,
                })
                .await;
        }
        self.event_sender
            .send_or_log(Event::CheckoutSessionPaid {
                provider_session_id: provider_session_id.clone(),
                order_id,
            })
            .await;
        self.event_sender.send_or_log(Event::OrderCreated(order_id)).await;

        info!(
            provider_session_id = %provider_session_id,
            order_id = %order_id,
            amount = %updated.amount,
            "reconciled paid checkout session into order"
        );
        Ok(updated)
    }

    /// Expired/failed transition: a bare compare-and-set, no order, cart
    /// left alone.
    async fn apply_terminal(
        &self,
        session: CheckoutSessionModel,
        target: CheckoutStatus,
        reason: Option<String>,
    ) -> Result<CheckoutSessionModel, ServiceError> {
        let provider_session_id = session.provider_session_id.clone();

        let txn = self.db.begin().await?;
        let claimed =
            Self::claim_transition(&txn, &provider_session_id, target, reason.clone()).await?;
        txn.commit().await?;

        if claimed {
            let event = match target {
                CheckoutStatus::Expired => Event::CheckoutSessionExpired {
                    provider_session_id: provider_session_id.clone(),
                },
                _ => Event::CheckoutSessionFailed {
                    provider_session_id: provider_session_id.clone(),
                    reason: reason.unwrap_or_else(|| "unspecified".to_string()),
                },
            };
            self.event_sender.send_or_log(event).await;
            info!(
                provider_session_id = %provider_session_id,
                status = target.as_str(),
                "checkout session transitioned"
            );
        }

        self.find_session(&provider_session_id).await
    }

    /// The paid claim was rolled back because stock ran out under a
    /// concurrent session. Record the operational exception on the session
    /// unless a competing delivery resolved it meanwhile.
    async fn flag_insufficient_stock(
        &self,
        provider_session_id: &str,
        err: ServiceError,
    ) -> Result<CheckoutSessionModel, ServiceError> {
        let reason = format!("{}; manual reconciliation required", err);
        warn!(
            provider_session_id = %provider_session_id,
            reason = %reason,
            "paid session could not be fulfilled"
        );

        let txn = self.db.begin().await?;
        let flagged = Self::claim_transition(
            &txn,
            provider_session_id,
            CheckoutStatus::Failed,
            Some(reason.clone()),
        )
        .await?;
        txn.commit().await?;

        if !flagged {
            // Lost to a concurrent transition; report its outcome instead.
            return self.find_session(provider_session_id).await;
        }

        self.event_sender
            .send_or_log(Event::CheckoutSessionFailed {
                provider_session_id: provider_session_id.to_string(),
                reason,
            })
            .await;
        Err(err)
    }

    /// Conditional status update out of `initiated`. Returns whether this
    /// caller won the transition.
    async fn claim_transition(
        conn: &impl ConnectionTrait,
        provider_session_id: &str,
        target: CheckoutStatus,
        failure_reason: Option<String>,
    ) -> Result<bool, ServiceError> {
        let mut update = CheckoutSession::update_many()
            .col_expr(checkout_session::Column::Status, Expr::value(target))
            .col_expr(checkout_session::Column::UpdatedAt, Expr::value(Utc::now()));

        if let Some(reason) = failure_reason {
            update = update.col_expr(checkout_session::Column::FailureReason, Expr::value(reason));
        }

        let result = update
            .filter(checkout_session::Column::ProviderSessionId.eq(provider_session_id))
            .filter(checkout_session::Column::Status.eq(CheckoutStatus::Initiated))
            .exec(conn)
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn find_session(
        &self,
        provider_session_id: &str,
    ) -> Result<CheckoutSessionModel, ServiceError> {
        CheckoutSession::find_by_id(provider_session_id.to_string())
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Checkout session {} not found",
                    provider_session_id
                ))
            })
    }
}

/// Caller-facing view of a checkout session's reconciled state
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutStatusView {
    pub provider_session_id: String,
    pub status: CheckoutStatus,
    pub amount: Decimal,
    pub currency: String,
}

impl From<CheckoutSessionModel> for CheckoutStatusView {
    fn from(session: CheckoutSessionModel) -> Self {
        Self {
            provider_session_id: session.provider_session_id,
            status: session.status,
            amount: session.amount,
            currency: session.currency,
        }
    }
}
