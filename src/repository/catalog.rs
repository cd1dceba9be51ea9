use async_trait::async_trait;
use thiserror::Error;

use crate::{
    db::DbPool,
    models::{Money, ProductId, ShopId, UserId},
};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("catalog unavailable")]
    Unavailable(#[from] sqlx::Error),
}

/// What pricing needs to know about a product right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedProduct {
    pub unit_price: Money,
    pub shop_id: ShopId,
}

/// Read side of the shop catalog. Products and shops are owned elsewhere;
/// this trait never writes.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn resolve_product(&self, product_id: ProductId) -> Result<ResolvedProduct, CatalogError>;

    async fn shop_exists(&self, shop_id: ShopId) -> Result<bool, CatalogError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_exists(&self, user_id: UserId) -> Result<bool, CatalogError>;
}

/// Postgres-backed catalog and user lookups.
#[derive(Clone)]
pub struct PgCatalog {
    pool: DbPool,
}

impl PgCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogReader for PgCatalog {
    async fn resolve_product(&self, product_id: ProductId) -> Result<ResolvedProduct, CatalogError> {
        let row: Option<(i64, i64)> =
            sqlx::query_as("SELECT price, shop_id FROM products WHERE id = $1")
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?;

        let (unit_price, shop_id) = row.ok_or(CatalogError::ProductNotFound(product_id))?;
        Ok(ResolvedProduct {
            unit_price,
            shop_id,
        })
    }

    async fn shop_exists(&self, shop_id: ShopId) -> Result<bool, CatalogError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM shops WHERE id = $1)")
            .bind(shop_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl UserDirectory for PgCatalog {
    async fn user_exists(&self, user_id: UserId) -> Result<bool, CatalogError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}
