pub mod order_products;
pub mod orders;
pub mod products;
