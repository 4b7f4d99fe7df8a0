use crate::{
    entities::{product, Product, ProductModel},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Catalog collaborator boundary. The checkout core resolves products for
/// price/stock/name/image and conditionally decrements stock; catalog
/// CRUD and search live elsewhere.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Resolves a product by id.
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// Conditionally decrements stock, failing when the remaining stock
    /// would go negative. The guard lives in the WHERE clause, never in a
    /// read-then-write, so concurrent paid sessions competing for the last
    /// units cannot oversell.
    ///
    /// Takes a connection so callers can run it inside their own
    /// transaction.
    pub async fn decrement_stock(
        conn: &impl ConnectionTrait,
        product_id: Uuid,
        quantity: i32,
        display_name: &str,
    ) -> Result<(), ServiceError> {
        let result = Product::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).sub(quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::Stock.gte(quantity))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::InsufficientStock(format!(
                "Insufficient stock for {}",
                display_name
            )));
        }

        info!(
            product_id = %product_id,
            quantity = quantity,
            "decremented stock"
        );
        Ok(())
    }
}
