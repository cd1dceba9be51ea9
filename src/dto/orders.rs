use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{
    Cart, CartItem, Money, OrderAggregate, OrderId, OrderStatus, ProductId, ShopId, UserId,
};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub courier: String,
    pub order_products: Vec<OrderProductRequest>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderProductRequest {
    pub product_id: ProductId,
    /// Must be greater than zero.
    pub amount: i32,
}

impl From<CreateOrderRequest> for Cart {
    fn from(req: CreateOrderRequest) -> Self {
        Cart {
            courier: req.courier,
            items: req
                .order_products
                .into_iter()
                .map(|p| CartItem {
                    product_id: p.product_id,
                    amount: p.amount,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatedOrder {
    pub id: OrderId,
}

/// A product line as shown to clients. `price` is the unit price captured
/// when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderedProduct {
    pub id: ProductId,
    pub shop_id: ShopId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub amount: i32,
    pub subtotal: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total: Money,
    pub courier: String,
    pub created_at: DateTime<Utc>,
    pub products: Vec<OrderedProduct>,
}

impl From<OrderAggregate> for OrderView {
    fn from(aggregate: OrderAggregate) -> Self {
        let OrderAggregate { order, lines } = aggregate;
        let products = lines
            .into_iter()
            .map(|stored| OrderedProduct {
                id: stored.product.id,
                shop_id: stored.line.shop_id,
                name: stored.product.name,
                description: stored.product.description,
                price: stored.line.unit_price,
                amount: stored.line.amount,
                subtotal: stored
                    .line
                    .unit_price
                    .saturating_mul(Money::from(stored.line.amount)),
            })
            .collect();

        OrderView {
            id: order.id,
            user_id: order.user_id,
            status: order.status,
            total: order.total,
            courier: order.courier,
            created_at: order.created_at,
            products,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<OrderView>,
}
