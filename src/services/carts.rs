use crate::{
    entities::{cart_item, CartItem, ProductModel},
    errors::ServiceError,
    events::{Event, EventSender},
    identity::Identity,
    services::catalog::CatalogService,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Session-scoped cart store.
///
/// Lines are keyed by `(owner_id, product_id)` with a unique index, so the
/// add-or-increment path is a single atomic upsert and two concurrent adds
/// for the same product can never create duplicate lines. Adding records
/// the product's current price on the new line; stock is never mutated
/// here; that happens only when a paid checkout is reconciled.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    catalog: Arc<CatalogService>,
}

impl CartService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        catalog: Arc<CatalogService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            catalog,
        }
    }

    /// Adds a product to the identity's cart, or increments the existing
    /// line. Validates that the product exists, is active, and has stock
    /// covering the resulting line quantity. Returns the updated cart.
    #[instrument(skip(self), fields(owner = %identity))]
    pub async fn add_item(
        &self,
        identity: &Identity,
        input: AddToCartInput,
    ) -> Result<CartSummary, ServiceError> {
        input.validate()?;

        let product = self.catalog.get_product(input.product_id).await?;
        if !product.is_active {
            return Err(ServiceError::NotFound(format!(
                "Product {} is no longer available",
                product.name
            )));
        }

        let owner_id = identity.owner_id();

        // Advisory stock check against the would-be line quantity. The
        // authoritative guard is the conditional decrement at
        // reconciliation time.
        let existing_quantity = CartItem::find()
            .filter(cart_item::Column::OwnerId.eq(owner_id.clone()))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .one(&*self.db)
            .await?
            .map(|line| line.quantity)
            .unwrap_or(0);

        if product.stock < existing_quantity + input.quantity {
            return Err(ServiceError::OutOfStock(product.name.clone()));
        }

        let now = Utc::now();
        let line = cart_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id.clone()),
            product_id: Set(input.product_id),
            quantity: Set(input.quantity),
            unit_price: Set(product.price),
            created_at: Set(now),
            updated_at: Set(now),
        };

        // Atomic find-or-create: the unique (owner_id, product_id) index
        // turns a concurrent double-add into an increment.
        CartItem::insert(line)
            .on_conflict(
                OnConflict::columns([cart_item::Column::OwnerId, cart_item::Column::ProductId])
                    .value(
                        cart_item::Column::Quantity,
                        Expr::col(cart_item::Column::Quantity).add(input.quantity),
                    )
                    .value(cart_item::Column::UpdatedAt, Expr::value(now))
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                owner_id: owner_id.clone(),
                product_id: input.product_id,
                quantity: input.quantity,
            })
            .await;

        info!(
            product_id = %input.product_id,
            quantity = input.quantity,
            "added item to cart"
        );
        self.get_cart(identity).await
    }

    /// Sets a line's quantity; a quantity of zero or less removes the line.
    /// Fails with `NotFound` when the item does not exist under this
    /// identity.
    #[instrument(skip(self), fields(owner = %identity))]
    pub async fn update_item(
        &self,
        identity: &Identity,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartSummary, ServiceError> {
        let owner_id = identity.owner_id();

        let line = CartItem::find_by_id(item_id)
            .filter(cart_item::Column::OwnerId.eq(owner_id.clone()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        if quantity <= 0 {
            CartItem::delete_by_id(item_id).exec(&*self.db).await?;
            self.event_sender
                .send_or_log(Event::CartItemRemoved {
                    owner_id,
                    item_id,
                })
                .await;
            return self.get_cart(identity).await;
        }

        let product = self.catalog.get_product(line.product_id).await?;
        if product.stock < quantity {
            return Err(ServiceError::OutOfStock(product.name.clone()));
        }

        let mut active: cart_item::ActiveModel = line.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                owner_id,
                item_id,
                quantity,
            })
            .await;

        self.get_cart(identity).await
    }

    /// Removes a line. Deletion is idempotent: removing an item that is
    /// already gone is a no-op, so webhook-style double deletes stay
    /// harmless.
    #[instrument(skip(self), fields(owner = %identity))]
    pub async fn remove_item(&self, identity: &Identity, item_id: Uuid) -> Result<(), ServiceError> {
        let owner_id = identity.owner_id();

        let result = CartItem::delete_many()
            .filter(cart_item::Column::Id.eq(item_id))
            .filter(cart_item::Column::OwnerId.eq(owner_id.clone()))
            .exec(&*self.db)
            .await?;

        if result.rows_affected > 0 {
            self.event_sender
                .send_or_log(Event::CartItemRemoved { owner_id, item_id })
                .await;
        }

        Ok(())
    }

    /// Returns the cart with resolved product details. Totals are computed
    /// at read time: `items_count` is the sum of quantities and
    /// `total_amount` is the sum of quantity x recorded unit price.
    #[instrument(skip(self), fields(owner = %identity))]
    pub async fn get_cart(&self, identity: &Identity) -> Result<CartSummary, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::OwnerId.eq(identity.owner_id()))
            .order_by_asc(cart_item::Column::CreatedAt)
            .find_also_related(crate::entities::Product)
            .all(&*self.db)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for (line, product) in rows {
            // A line whose product vanished from the catalog cannot be
            // checked out; leave it out of the summary.
            let Some(product) = product else { continue };
            items.push(CartItemView::new(&line, &product));
        }

        Ok(CartSummary::from_items(items))
    }

    /// Removes every line owned by the identity.
    #[instrument(skip(self), fields(owner = %identity))]
    pub async fn clear_cart(&self, identity: &Identity) -> Result<(), ServiceError> {
        let owner_id = identity.owner_id();
        Self::clear_owner(&*self.db, &owner_id).await?;

        self.event_sender
            .send_or_log(Event::CartCleared { owner_id })
            .await;

        info!("cleared cart");
        Ok(())
    }

    /// Connection-generic clear, so reconciliation can empty the cart
    /// inside its own paid-transition transaction.
    pub async fn clear_owner(
        conn: &impl ConnectionTrait,
        owner_id: &str,
    ) -> Result<u64, ServiceError> {
        let result = CartItem::delete_many()
            .filter(cart_item::Column::OwnerId.eq(owner_id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }
}

/// Input for adding an item to the cart
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// Input for updating a line's quantity; zero or less removes the line
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateQuantityInput {
    pub quantity: i32,
}

/// One cart line with resolved product details
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    /// Price recorded when the line was added
    pub unit_price: Decimal,
    /// The catalog's price right now; checkout honors this one
    pub current_price: Decimal,
    pub quantity: i32,
    pub item_total: Decimal,
}

impl CartItemView {
    fn new(line: &cart_item::Model, product: &ProductModel) -> Self {
        Self {
            id: line.id,
            product_id: line.product_id,
            name: product.name.clone(),
            image_url: product.image_url.clone(),
            unit_price: line.unit_price,
            current_price: product.price,
            quantity: line.quantity,
            item_total: line.item_total(),
        }
    }
}

/// Cart contents with derived totals
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartSummary {
    pub items: Vec<CartItemView>,
    /// Sum of line quantities
    pub items_count: i32,
    /// Sum of line totals (quantity x recorded unit price)
    pub total_amount: Decimal,
}

impl CartSummary {
    fn from_items(items: Vec<CartItemView>) -> Self {
        let items_count = items.iter().map(|item| item.quantity).sum();
        let total_amount = items.iter().map(|item| item.item_total).sum();
        Self {
            items,
            items_count,
            total_amount,
        }
    }
}
