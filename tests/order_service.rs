mod common;

use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;
use common::*;
use order_management_api::{
    models::{OrderAggregate, OrderDraft, OrderId, OrderStatus, ShopId, UserId},
    repository::{CatalogError, OrderStore, StoreError, memory::MemoryOrderStore},
    services::{OrderError, OrderService, pricing::ValidationError},
};

#[tokio::test]
async fn creates_priced_pending_order() {
    let fx = fixture().await;

    let id = fx
        .service
        .create_order(ALICE, cart("JNE", &[(KETTLE, 2), (MUG, 1)]))
        .await
        .unwrap();

    let view = fx.service.get_order(id).await.unwrap();
    assert_eq!(view.total, 2500);
    assert_eq!(view.status, OrderStatus::Pending);
    assert_eq!(view.user_id, ALICE);
    assert_eq!(view.products.len(), 2);
    assert_eq!(fx.store.line_count().await, 2);
}

#[tokio::test]
async fn round_trip_keeps_courier_total_and_lines() {
    let fx = fixture().await;
    let requested = [(MUG, 3), (KETTLE, 1), (TOASTER, 4)];

    let id = fx
        .service
        .create_order(ALICE, cart("SiCepat", &requested))
        .await
        .unwrap();
    let view = fx.service.get_order(id).await.unwrap();

    assert_eq!(view.courier, "SiCepat");
    assert_eq!(view.total, 3 * 500 + 1000 + 4 * 250);
    let stored: BTreeSet<(i64, i32)> = view.products.iter().map(|p| (p.id, p.amount)).collect();
    assert_eq!(stored, requested.into_iter().collect::<BTreeSet<_>>());

    let summed: i64 = view.products.iter().map(|p| p.subtotal).sum();
    assert_eq!(summed, view.total);

    let kettle = view.products.iter().find(|p| p.id == KETTLE).unwrap();
    assert_eq!(kettle.name, "Kettle");
    assert_eq!(kettle.description.as_deref(), Some("1.7l, stainless"));
    assert_eq!(kettle.shop_id, GADGETS);
}

#[tokio::test]
async fn unknown_product_persists_nothing() {
    let fx = fixture().await;

    let err = fx
        .service
        .create_order(ALICE, cart("JNE", &[(KETTLE, 1), (999, 1)]))
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::Pricing(CatalogError::ProductNotFound(999))));
    assert_eq!(fx.store.order_count().await, 0);
    assert_eq!(fx.store.write_calls(), 0);
}

#[tokio::test]
async fn non_positive_amounts_never_reach_the_store() {
    let fx = fixture().await;

    for amount in [0, -1] {
        let err = fx
            .service
            .create_order(ALICE, cart("JNE", &[(KETTLE, 1), (MUG, amount)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::Validation(ValidationError::InvalidQuantity { product_id: MUG, .. })
        ));
    }

    assert_eq!(fx.catalog.lookups(), 0);
    assert_eq!(fx.store.write_calls(), 0);
}

#[tokio::test]
async fn empty_cart_is_a_validation_error() {
    let fx = fixture().await;
    let err = fx
        .service
        .create_order(ALICE, cart("JNE", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Validation(ValidationError::EmptyCart)));
}

#[tokio::test]
async fn repeated_product_is_stored_as_one_line() {
    let fx = fixture().await;
    let id = fx
        .service
        .create_order(ALICE, cart("JNE", &[(KETTLE, 1), (KETTLE, 2)]))
        .await
        .unwrap();

    let view = fx.service.get_order(id).await.unwrap();
    assert_eq!(view.products.len(), 1);
    assert_eq!(view.products[0].amount, 3);
    assert_eq!(view.total, 3000);
}

#[tokio::test]
async fn shop_listing_has_each_order_once() {
    let fx = fixture().await;
    // Two GADGETS lines and one KITCHEN line in the same order.
    let mixed = fx
        .service
        .create_order(ALICE, cart("JNE", &[(KETTLE, 1), (TOASTER, 2), (MUG, 1)]))
        .await
        .unwrap();
    let kitchen_only = fx
        .service
        .create_order(BOB, cart("JNE", &[(MUG, 5)]))
        .await
        .unwrap();

    let gadgets: Vec<i64> = fx
        .service
        .get_orders_by_shop(GADGETS)
        .await
        .unwrap()
        .iter()
        .map(|v| v.id)
        .collect();
    assert_eq!(gadgets, vec![mixed]);

    let kitchen: Vec<i64> = fx
        .service
        .get_orders_by_shop(KITCHEN)
        .await
        .unwrap()
        .iter()
        .map(|v| v.id)
        .collect();
    assert_eq!(kitchen, vec![mixed, kitchen_only]);

    assert!(fx.service.get_orders_by_shop(EMPTY_SHOP).await.unwrap().is_empty());
    assert!(matches!(
        fx.service.get_orders_by_shop(404).await.unwrap_err(),
        OrderError::ShopNotFound(404)
    ));
}

#[tokio::test]
async fn user_listing() {
    let fx = fixture().await;
    let first = fx
        .service
        .create_order(ALICE, cart("JNE", &[(KETTLE, 1)]))
        .await
        .unwrap();
    let second = fx
        .service
        .create_order(ALICE, cart("JNE", &[(MUG, 1)]))
        .await
        .unwrap();

    let ids: Vec<i64> = fx
        .service
        .get_orders_by_user(ALICE)
        .await
        .unwrap()
        .iter()
        .map(|v| v.id)
        .collect();
    assert_eq!(ids, vec![first, second]);

    assert!(fx.service.get_orders_by_user(BOB).await.unwrap().is_empty());
    assert!(matches!(
        fx.service.get_orders_by_user(77).await.unwrap_err(),
        OrderError::UserNotFound(77)
    ));
}

#[tokio::test]
async fn all_orders_are_listed_in_id_order() {
    let fx = fixture().await;
    let a = fx.service.create_order(BOB, cart("JNE", &[(MUG, 1)])).await.unwrap();
    let b = fx.service.create_order(ALICE, cart("JNE", &[(KETTLE, 1)])).await.unwrap();

    let ids: Vec<i64> = fx
        .service
        .get_all_orders()
        .await
        .unwrap()
        .iter()
        .map(|v| v.id)
        .collect();
    assert_eq!(ids, vec![a, b]);
}

#[tokio::test]
async fn delete_removes_order_and_lines() {
    let fx = fixture().await;
    let id = fx
        .service
        .create_order(ALICE, cart("JNE", &[(KETTLE, 2), (MUG, 1)]))
        .await
        .unwrap();

    fx.service.delete_order(id).await.unwrap();

    assert!(matches!(
        fx.service.get_order(id).await.unwrap_err(),
        OrderError::NotFound(found) if found == id
    ));
    assert_eq!(fx.store.line_count().await, 0);
    assert!(matches!(
        fx.service.delete_order(id).await.unwrap_err(),
        OrderError::NotFound(_)
    ));
}

#[tokio::test]
async fn later_price_change_does_not_touch_placed_order() {
    let fx = fixture().await;
    let id = fx
        .service
        .create_order(ALICE, cart("JNE", &[(KETTLE, 2)]))
        .await
        .unwrap();

    fx.catalog.set_price(KETTLE, 1500).await;

    let view = fx.service.get_order(id).await.unwrap();
    assert_eq!(view.total, 2000);
    assert_eq!(view.products[0].price, 1000);
    assert_eq!(view.products[0].subtotal, 2000);
}

#[tokio::test]
async fn store_failure_is_persistence_error_and_leaves_nothing() {
    let fx = fixture().await;
    fx.store.set_fail_writes(true);

    let err = fx
        .service
        .create_order(ALICE, cart("JNE", &[(KETTLE, 1)]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrderError::Persistence(StoreError::Persistence { step: "insert order", .. })
    ));
    assert_eq!(fx.store.order_count().await, 0);
    assert!(fx.service.get_orders_by_user(ALICE).await.unwrap().is_empty());
}

#[tokio::test]
async fn catalog_outage_is_a_pricing_error() {
    let fx = fixture().await;
    fx.catalog.set_unavailable(true);

    let err = fx
        .service
        .create_order(ALICE, cart("JNE", &[(KETTLE, 1)]))
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::Pricing(CatalogError::Unavailable(_))));
    assert_eq!(fx.store.write_calls(), 0);
}

#[tokio::test]
async fn update_reprices_and_replaces_lines() {
    let fx = fixture().await;
    let id = fx
        .service
        .create_order(ALICE, cart("JNE", &[(KETTLE, 2), (MUG, 1)]))
        .await
        .unwrap();

    fx.catalog.set_price(TOASTER, 300).await;
    let view = fx
        .service
        .update_order(id, ALICE, cart("AnterAja", &[(TOASTER, 2)]))
        .await
        .unwrap();

    assert_eq!(view.courier, "AnterAja");
    assert_eq!(view.total, 600);
    assert_eq!(view.status, OrderStatus::Pending);
    assert_eq!(view.products.len(), 1);
    assert_eq!(view.products[0].id, TOASTER);
    assert!(fx.service.get_orders_by_shop(KITCHEN).await.unwrap().is_empty());
}

#[tokio::test]
async fn only_pending_orders_can_be_updated() {
    let fx = fixture().await;
    let id = fx
        .service
        .create_order(ALICE, cart("JNE", &[(KETTLE, 1)]))
        .await
        .unwrap();
    assert!(fx.store.set_status(id, OrderStatus::Shipping).await);

    let err = fx
        .service
        .update_order(id, ALICE, cart("JNE", &[(MUG, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::NotPending { status: OrderStatus::Shipping, .. }
    ));
    assert_eq!(fx.service.get_order(id).await.unwrap().total, 1000);
}

#[tokio::test]
async fn only_the_owner_can_update() {
    let fx = fixture().await;
    let id = fx
        .service
        .create_order(ALICE, cart("JNE", &[(KETTLE, 1)]))
        .await
        .unwrap();

    let err = fx
        .service
        .update_order(id, BOB, cart("JNE", &[(MUG, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotFound(found) if found == id));
    assert_eq!(fx.store.write_calls(), 1);
}

#[tokio::test]
async fn store_update_keeps_status_and_refuses_non_pending() {
    let fx = fixture().await;
    let id = fx
        .service
        .create_order(ALICE, cart("JNE", &[(KETTLE, 1)]))
        .await
        .unwrap();

    // A draft asking for another status does not change it.
    let draft = OrderDraft {
        user_id: ALICE,
        status: OrderStatus::Completed,
        courier: "JNE".into(),
        total: 500,
        lines: Vec::new(),
    };
    fx.store.update_order(id, &draft).await.unwrap();
    assert_eq!(fx.store.get_order(id).await.unwrap().order.status, OrderStatus::Pending);

    fx.store.set_status(id, OrderStatus::Cancelled).await;
    assert!(matches!(
        fx.store.update_order(id, &draft).await.unwrap_err(),
        StoreError::NotPending { status: OrderStatus::Cancelled, .. }
    ));
    assert!(matches!(
        fx.store.update_order(404, &draft).await.unwrap_err(),
        StoreError::OrderNotFound(404)
    ));
}

/// Ships the order right before the write reaches the inner store, the way a
/// concurrent fulfilment update would land between the pending check and the
/// write.
struct ShipsBeforeWrite {
    inner: Arc<MemoryOrderStore>,
}

#[async_trait]
impl OrderStore for ShipsBeforeWrite {
    async fn create_order(&self, draft: &OrderDraft) -> Result<OrderId, StoreError> {
        self.inner.create_order(draft).await
    }

    async fn order_ids_by_user(&self, user_id: UserId) -> Result<Vec<OrderId>, StoreError> {
        self.inner.order_ids_by_user(user_id).await
    }

    async fn order_ids_by_shop(&self, shop_id: ShopId) -> Result<Vec<OrderId>, StoreError> {
        self.inner.order_ids_by_shop(shop_id).await
    }

    async fn load_orders(&self, ids: &[OrderId]) -> Result<Vec<OrderAggregate>, StoreError> {
        self.inner.load_orders(ids).await
    }

    async fn all_orders(&self) -> Result<Vec<OrderAggregate>, StoreError> {
        self.inner.all_orders().await
    }

    async fn update_order(&self, id: OrderId, draft: &OrderDraft) -> Result<(), StoreError> {
        self.inner.set_status(id, OrderStatus::Shipping).await;
        self.inner.update_order(id, draft).await
    }

    async fn delete_order(&self, id: OrderId) -> Result<(), StoreError> {
        self.inner.delete_order(id).await
    }
}

#[tokio::test]
async fn update_racing_a_shipment_keeps_the_shipment() {
    let fx = fixture().await;
    let service = OrderService::new(
        fx.catalog.clone(),
        fx.catalog.clone(),
        Arc::new(ShipsBeforeWrite {
            inner: fx.store.clone(),
        }),
    );
    let id = service
        .create_order(ALICE, cart("JNE", &[(KETTLE, 1)]))
        .await
        .unwrap();

    let err = service
        .update_order(id, ALICE, cart("JNE", &[(MUG, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::NotPending { status: OrderStatus::Shipping, .. }
    ));

    let order = fx.store.get_order(id).await.unwrap();
    assert_eq!(order.order.status, OrderStatus::Shipping);
    assert_eq!(order.order.total, 1000);
    assert_eq!(order.lines[0].line.product_id, KETTLE);
}

#[tokio::test]
async fn failed_update_keeps_previous_lines() {
    let fx = fixture().await;
    let id = fx
        .service
        .create_order(ALICE, cart("JNE", &[(KETTLE, 1), (MUG, 1)]))
        .await
        .unwrap();

    fx.store.set_fail_writes(true);
    let err = fx
        .service
        .update_order(id, ALICE, cart("JNE", &[(TOASTER, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Persistence(_)));

    fx.store.set_fail_writes(false);
    let view = fx.service.get_order(id).await.unwrap();
    assert_eq!(view.total, 1500);
    assert_eq!(view.products.len(), 2);
}
