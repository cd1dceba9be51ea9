use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type UserId = i64;
pub type ShopId = i64;
pub type ProductId = i64;
pub type OrderId = i64;

/// Money in minor currency units (cents). Never a float.
pub type Money = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Shipping,
    Cancelled,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Shipping => "SHIPPING",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "SHIPPING" => Ok(OrderStatus::Shipping),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "COMPLETED" => Ok(OrderStatus::Completed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// One requested (product, quantity) pair before pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartItem {
    pub product_id: ProductId,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    pub courier: String,
    pub items: Vec<CartItem>,
}

/// A priced line. `unit_price` is the catalog price captured when the order
/// was priced and stays fixed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub shop_id: ShopId,
    pub amount: i32,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn subtotal(&self) -> Option<Money> {
        self.unit_price.checked_mul(Money::from(self.amount))
    }
}

/// Everything the store needs to write an order header and its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub user_id: UserId,
    pub status: OrderStatus,
    pub courier: String,
    pub total: Money,
    pub lines: Vec<OrderLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total: Money,
    pub courier: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Display data for a product referenced by an order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLine {
    pub line: OrderLine,
    pub product: ProductSummary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAggregate {
    pub order: Order,
    pub lines: Vec<StoredLine>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_its_own_rendering() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Shipping,
            OrderStatus::Cancelled,
            OrderStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("pending".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn status_serializes_upper_case() {
        let json = serde_json::to_string(&OrderStatus::Pending).unwrap();
        assert_eq!(json, "\"PENDING\"");
    }

    #[test]
    fn subtotal_detects_overflow() {
        let line = OrderLine {
            product_id: 1,
            shop_id: 1,
            amount: 2,
            unit_price: Money::MAX,
        };
        assert_eq!(line.subtotal(), None);
    }
}
