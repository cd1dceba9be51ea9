use thiserror::Error;

use crate::{
    models::{CartItem, Money, OrderLine, ProductId},
    repository::{CatalogError, CatalogReader},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("order must contain at least one product")]
    EmptyCart,

    #[error("amount for product {product_id} must be greater than 0, got {amount}")]
    InvalidQuantity { product_id: ProductId, amount: i32 },

    #[error("amount for product {0} is too large")]
    AmountOverflow(ProductId),

    #[error("order total is too large")]
    TotalOverflow,
}

#[derive(Debug, Error)]
pub enum PricingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCart {
    pub lines: Vec<OrderLine>,
    pub total: Money,
}

/// Rejects empty carts and non-positive amounts, and folds repeated product
/// ids into one item. First-seen order is kept.
pub fn normalize_items(items: &[CartItem]) -> Result<Vec<CartItem>, ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::EmptyCart);
    }

    let mut merged: Vec<CartItem> = Vec::with_capacity(items.len());
    for item in items {
        if item.amount <= 0 {
            return Err(ValidationError::InvalidQuantity {
                product_id: item.product_id,
                amount: item.amount,
            });
        }
        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => {
                existing.amount = existing
                    .amount
                    .checked_add(item.amount)
                    .ok_or(ValidationError::AmountOverflow(item.product_id))?;
            }
            None => merged.push(*item),
        }
    }
    Ok(merged)
}

/// Prices a cart against the current catalog.
///
/// All amounts are validated before the first catalog lookup. Lookups then
/// run in cart order and the first unresolvable product aborts pricing.
/// Arithmetic is exact over minor units; overflow is an error, never a wrap.
pub async fn price_cart(
    catalog: &dyn CatalogReader,
    items: &[CartItem],
) -> Result<PricedCart, PricingError> {
    let items = normalize_items(items)?;

    let mut lines = Vec::with_capacity(items.len());
    let mut total: Money = 0;
    for item in items {
        let resolved = catalog.resolve_product(item.product_id).await?;
        let line = OrderLine {
            product_id: item.product_id,
            shop_id: resolved.shop_id,
            amount: item.amount,
            unit_price: resolved.unit_price,
        };
        let subtotal = line.subtotal().ok_or(ValidationError::TotalOverflow)?;
        total = total
            .checked_add(subtotal)
            .ok_or(ValidationError::TotalOverflow)?;
        lines.push(line);
    }

    Ok(PricedCart { lines, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::{CatalogProduct, MemoryCatalog};

    fn item(product_id: ProductId, amount: i32) -> CartItem {
        CartItem { product_id, amount }
    }

    async fn catalog() -> MemoryCatalog {
        let catalog = MemoryCatalog::new();
        catalog.add_product(CatalogProduct::new(1, 10, "Kettle", 1000)).await;
        catalog.add_product(CatalogProduct::new(2, 20, "Mug", 500)).await;
        catalog
    }

    #[tokio::test]
    async fn prices_two_line_cart() {
        let catalog = catalog().await;
        let priced = price_cart(&catalog, &[item(1, 2), item(2, 1)]).await.unwrap();

        assert_eq!(priced.total, 2500);
        assert_eq!(priced.lines.len(), 2);
        assert_eq!(priced.lines[0].shop_id, 10);
        assert_eq!(priced.lines[0].unit_price, 1000);
        assert_eq!(priced.lines[1].shop_id, 20);
    }

    #[tokio::test]
    async fn zero_amount_is_rejected_before_any_lookup() {
        let catalog = catalog().await;
        let err = price_cart(&catalog, &[item(1, 1), item(2, 0)]).await.unwrap_err();

        assert!(matches!(
            err,
            PricingError::Validation(ValidationError::InvalidQuantity { product_id: 2, amount: 0 })
        ));
        assert_eq!(catalog.lookups(), 0);
    }

    #[tokio::test]
    async fn negative_amount_is_rejected() {
        let catalog = catalog().await;
        let err = price_cart(&catalog, &[item(1, -3)]).await.unwrap_err();
        assert!(matches!(
            err,
            PricingError::Validation(ValidationError::InvalidQuantity { amount: -3, .. })
        ));
    }

    #[tokio::test]
    async fn stops_at_first_unknown_product() {
        let catalog = catalog().await;
        let err = price_cart(&catalog, &[item(99, 1), item(1, 1)]).await.unwrap_err();

        assert!(matches!(err, PricingError::Catalog(CatalogError::ProductNotFound(99))));
        assert_eq!(catalog.lookups(), 1);
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let catalog = catalog().await;
        let err = price_cart(&catalog, &[]).await.unwrap_err();
        assert!(matches!(err, PricingError::Validation(ValidationError::EmptyCart)));
    }

    #[tokio::test]
    async fn total_overflow_is_an_error() {
        let catalog = MemoryCatalog::new();
        catalog
            .add_product(CatalogProduct::new(1, 1, "Yacht", Money::MAX / 2))
            .await;
        let err = price_cart(&catalog, &[item(1, 3)]).await.unwrap_err();
        assert!(matches!(err, PricingError::Validation(ValidationError::TotalOverflow)));
    }

    #[test]
    fn repeated_products_are_merged() {
        let merged = normalize_items(&[item(2, 1), item(1, 2), item(2, 4)]).unwrap();
        assert_eq!(merged, vec![item(2, 5), item(1, 2)]);
    }

    #[test]
    fn merged_amount_overflow_is_reported() {
        let err = normalize_items(&[item(1, i32::MAX), item(1, 1)]).unwrap_err();
        assert_eq!(err, ValidationError::AmountOverflow(1));
    }
}
