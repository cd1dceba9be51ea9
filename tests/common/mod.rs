#![allow(dead_code)]

use std::sync::Arc;

use order_management_api::{
    models::{Cart, CartItem, ProductId},
    repository::memory::{CatalogProduct, MemoryCatalog, MemoryOrderStore},
    services::OrderService,
};

pub const ALICE: i64 = 1;
pub const BOB: i64 = 2;

pub const GADGETS: i64 = 10;
pub const KITCHEN: i64 = 20;
pub const EMPTY_SHOP: i64 = 30;

pub const KETTLE: i64 = 1;
pub const MUG: i64 = 2;
pub const TOASTER: i64 = 3;

pub struct Fixture {
    pub catalog: Arc<MemoryCatalog>,
    pub store: Arc<MemoryOrderStore>,
    pub service: OrderService,
}

/// Two users, three shops, three products:
/// kettle 1000 and toaster 250 from GADGETS, mug 500 from KITCHEN.
pub async fn fixture() -> Fixture {
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.add_user(ALICE).await;
    catalog.add_user(BOB).await;
    catalog.add_shop(EMPTY_SHOP).await;

    let mut kettle = CatalogProduct::new(KETTLE, GADGETS, "Kettle", 1000);
    kettle.description = Some("1.7l, stainless".into());
    catalog.add_product(kettle).await;
    catalog
        .add_product(CatalogProduct::new(MUG, KITCHEN, "Mug", 500))
        .await;
    catalog
        .add_product(CatalogProduct::new(TOASTER, GADGETS, "Toaster", 250))
        .await;

    let store = Arc::new(MemoryOrderStore::new(catalog.clone()));
    let service = OrderService::new(catalog.clone(), catalog.clone(), store.clone());

    Fixture {
        catalog,
        store,
        service,
    }
}

pub fn cart(courier: &str, items: &[(ProductId, i32)]) -> Cart {
    Cart {
        courier: courier.to_string(),
        items: items
            .iter()
            .map(|&(product_id, amount)| CartItem { product_id, amount })
            .collect(),
    }
}
