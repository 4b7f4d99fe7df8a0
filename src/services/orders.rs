use crate::{
    entities::{order, OrderItem, OrderItemModel, OrderModel, PaymentStatus},
    errors::ServiceError,
    identity::Identity,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// Read-only projection over materialized orders. Orders are created by
/// reconciliation; nothing here mutates.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// All orders owned by the identity, newest first.
    #[instrument(skip(self), fields(owner = %identity))]
    pub async fn list_orders(&self, identity: &Identity) -> Result<Vec<OrderView>, ServiceError> {
        let rows = order::Entity::find()
            .filter(order::Column::OwnerId.eq(identity.owner_id()))
            .order_by_desc(order::Column::CreatedAt)
            .find_with_related(OrderItem)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(order, items)| OrderView::new(order, items))
            .collect())
    }

    /// One order with its frozen items. Requesting another identity's
    /// order fails with `Unauthorized`.
    #[instrument(skip(self), fields(owner = %identity))]
    pub async fn get_order(
        &self,
        identity: &Identity,
        order_id: Uuid,
    ) -> Result<OrderView, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.owner_id != identity.owner_id() {
            return Err(ServiceError::Unauthorized(
                "order belongs to a different identity".to_string(),
            ));
        }

        let items = OrderItem::find()
            .filter(crate::entities::order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        Ok(OrderView::new(order, items))
    }
}

/// Order with its frozen line items
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderView {
    pub id: Uuid,
    pub total_amount: Decimal,
    pub currency: String,
    pub payment_status: PaymentStatus,
    pub provider_session_id: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
}

impl OrderView {
    fn new(order: OrderModel, items: Vec<OrderItemModel>) -> Self {
        Self {
            id: order.id,
            total_amount: order.total_amount,
            currency: order.currency,
            payment_status: order.payment_status,
            provider_session_id: order.provider_session_id,
            created_at: order.created_at,
            items: items.into_iter().map(OrderItemView::from).collect(),
        }
    }
}

/// One purchased line, captured at purchase time
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderItemView {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub item_total: Decimal,
}

impl From<OrderItemModel> for OrderItemView {
    fn from(item: OrderItemModel) -> Self {
        Self {
            product_id: item.product_id,
            name: item.name,
            quantity: item.quantity,
            unit_price: item.unit_price,
            item_total: item.item_total,
        }
    }
}
