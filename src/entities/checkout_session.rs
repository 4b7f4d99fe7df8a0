use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Local record of one attempt to pay for a cart snapshot, keyed by the
/// provider's opaque session id.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "checkout_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub provider_session_id: String,
    pub owner_id: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    pub currency: String,
    pub status: CheckoutStatus,
    /// Frozen line items; enough to materialize an order without re-reading
    /// the cart.
    #[sea_orm(column_type = "Json")]
    pub items: Json,
    pub redirect_url: String,
    #[sea_orm(nullable)]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn line_snapshots(&self) -> Result<Vec<LineSnapshot>, serde_json::Error> {
        serde_json::from_value(self.items.clone())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Checkout session status. `Initiated` is the only non-terminal state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum CheckoutStatus {
    #[sea_orm(string_value = "initiated")]
    Initiated,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "expired")]
    Expired,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl CheckoutStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, CheckoutStatus::Initiated)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CheckoutStatus::Initiated => "initiated",
            CheckoutStatus::Paid => "paid",
            CheckoutStatus::Expired => "expired",
            CheckoutStatus::Failed => "failed",
        }
    }
}

/// One frozen cart line inside a checkout session snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSnapshot {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub item_total: Decimal,
}
