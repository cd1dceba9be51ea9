//! In-process implementations of the repository traits, used by tests and
//! for running the HTTP layer without Postgres.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::DbErr;
use tokio::sync::{Mutex, RwLock};

use super::{
    catalog::{CatalogError, CatalogReader, ResolvedProduct, UserDirectory},
    orders::{OrderStore, StoreError},
};
use crate::models::{
    Money, Order, OrderAggregate, OrderDraft, OrderId, OrderLine, OrderStatus, ProductId,
    ProductSummary, ShopId, StoredLine, UserId,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub shop_id: ShopId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
}

impl CatalogProduct {
    pub fn new(id: ProductId, shop_id: ShopId, name: impl Into<String>, price: Money) -> Self {
        Self {
            id,
            shop_id,
            name: name.into(),
            description: None,
            price,
        }
    }
}

#[derive(Default)]
pub struct MemoryCatalog {
    products: RwLock<BTreeMap<ProductId, CatalogProduct>>,
    shops: RwLock<BTreeSet<ShopId>>,
    users: RwLock<BTreeSet<UserId>>,
    unavailable: AtomicBool,
    lookups: AtomicUsize,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user_id: UserId) {
        self.users.write().await.insert(user_id);
    }

    pub async fn add_shop(&self, shop_id: ShopId) {
        self.shops.write().await.insert(shop_id);
    }

    /// Registers the product and its shop.
    pub async fn add_product(&self, product: CatalogProduct) {
        self.add_shop(product.shop_id).await;
        self.products.write().await.insert(product.id, product);
    }

    pub async fn set_price(&self, product_id: ProductId, price: Money) {
        if let Some(product) = self.products.write().await.get_mut(&product_id) {
            product.price = price;
        }
    }

    pub async fn product(&self, product_id: ProductId) -> Option<CatalogProduct> {
        self.products.read().await.get(&product_id).cloned()
    }

    /// Makes every lookup fail as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `resolve_product` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), CatalogError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogReader for MemoryCatalog {
    async fn resolve_product(&self, product_id: ProductId) -> Result<ResolvedProduct, CatalogError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.products
            .read()
            .await
            .get(&product_id)
            .map(|p| ResolvedProduct {
                unit_price: p.price,
                shop_id: p.shop_id,
            })
            .ok_or(CatalogError::ProductNotFound(product_id))
    }

    async fn shop_exists(&self, shop_id: ShopId) -> Result<bool, CatalogError> {
        self.check_available()?;
        Ok(self.shops.read().await.contains(&shop_id))
    }
}

#[async_trait]
impl UserDirectory for MemoryCatalog {
    async fn user_exists(&self, user_id: UserId) -> Result<bool, CatalogError> {
        self.check_available()?;
        Ok(self.users.read().await.contains(&user_id))
    }
}

#[derive(Default)]
struct Tables {
    last_id: OrderId,
    orders: BTreeMap<OrderId, (Order, Vec<OrderLine>)>,
}

/// Order store over a map. Product details and shop ownership are read from
/// the shared [`MemoryCatalog`] at load time, the same way the Postgres store
/// joins `products`.
pub struct MemoryOrderStore {
    catalog: Arc<MemoryCatalog>,
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
    write_calls: AtomicUsize,
}

impl MemoryOrderStore {
    pub fn new(catalog: Arc<MemoryCatalog>) -> Self {
        Self {
            catalog,
            tables: Mutex::new(Tables::default()),
            fail_writes: AtomicBool::new(false),
            write_calls: AtomicUsize::new(0),
        }
    }

    /// Makes every write fail before touching any state.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of write operations attempted, failed ones included.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Moves an order to `status` the way a fulfilment process would, outside
    /// of `OrderStore`. Returns false for an unknown id.
    pub async fn set_status(&self, id: OrderId, status: OrderStatus) -> bool {
        match self.tables.lock().await.orders.get_mut(&id) {
            Some((order, _)) => {
                order.status = status;
                order.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    pub async fn line_count(&self) -> usize {
        self.tables
            .lock()
            .await
            .orders
            .values()
            .map(|(_, lines)| lines.len())
            .sum()
    }

    fn begin_write(&self, step: &'static str) -> Result<(), StoreError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Persistence {
                step,
                source: DbErr::Custom("injected write failure".into()),
            });
        }
        Ok(())
    }

    async fn snapshot(&self, ids: &[OrderId]) -> Vec<(Order, Vec<OrderLine>)> {
        let tables = self.tables.lock().await;
        let wanted: BTreeSet<OrderId> = ids.iter().copied().collect();
        wanted
            .into_iter()
            .filter_map(|id| tables.orders.get(&id).cloned())
            .collect()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn create_order(&self, draft: &OrderDraft) -> Result<OrderId, StoreError> {
        self.begin_write("insert order")?;

        let mut tables = self.tables.lock().await;
        tables.last_id += 1;
        let id = tables.last_id;
        let now = Utc::now();
        let order = Order {
            id,
            user_id: draft.user_id,
            status: draft.status,
            total: draft.total,
            courier: draft.courier.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.orders.insert(id, (order, draft.lines.clone()));
        Ok(id)
    }

    async fn order_ids_by_user(&self, user_id: UserId) -> Result<Vec<OrderId>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .values()
            .filter(|(order, _)| order.user_id == user_id)
            .map(|(order, _)| order.id)
            .collect())
    }

    async fn order_ids_by_shop(&self, shop_id: ShopId) -> Result<Vec<OrderId>, StoreError> {
        let orders: Vec<(OrderId, Vec<ProductId>)> = {
            let tables = self.tables.lock().await;
            tables
                .orders
                .values()
                .map(|(order, lines)| (order.id, lines.iter().map(|l| l.product_id).collect()))
                .collect()
        };

        let mut ids = Vec::new();
        for (order_id, product_ids) in orders {
            for product_id in product_ids {
                let owned = self
                    .catalog
                    .product(product_id)
                    .await
                    .is_some_and(|p| p.shop_id == shop_id);
                if owned {
                    ids.push(order_id);
                    break;
                }
            }
        }
        Ok(ids)
    }

    async fn load_orders(&self, ids: &[OrderId]) -> Result<Vec<OrderAggregate>, StoreError> {
        let mut aggregates = Vec::new();
        for (order, lines) in self.snapshot(ids).await {
            let mut stored = Vec::with_capacity(lines.len());
            for line in lines {
                // Inner-join semantics: a line whose product vanished is dropped.
                let Some(product) = self.catalog.product(line.product_id).await else {
                    continue;
                };
                stored.push(StoredLine {
                    line: OrderLine {
                        shop_id: product.shop_id,
                        ..line
                    },
                    product: ProductSummary {
                        id: product.id,
                        name: product.name,
                        description: product.description,
                        price: product.price,
                    },
                });
            }
            stored.sort_by_key(|l| l.line.product_id);
            aggregates.push(OrderAggregate {
                order,
                lines: stored,
            });
        }
        Ok(aggregates)
    }

    async fn all_orders(&self) -> Result<Vec<OrderAggregate>, StoreError> {
        let ids: Vec<OrderId> = self.tables.lock().await.orders.keys().copied().collect();
        self.load_orders(&ids).await
    }

    async fn update_order(&self, id: OrderId, draft: &OrderDraft) -> Result<(), StoreError> {
        self.begin_write("update order")?;

        let mut tables = self.tables.lock().await;
        let (order, lines) = tables
            .orders
            .get_mut(&id)
            .ok_or(StoreError::OrderNotFound(id))?;
        if order.status != OrderStatus::Pending {
            return Err(StoreError::NotPending {
                id,
                status: order.status,
            });
        }
        order.courier = draft.courier.clone();
        order.total = draft.total;
        order.updated_at = Utc::now();
        *lines = draft.lines.clone();
        Ok(())
    }

    async fn delete_order(&self, id: OrderId) -> Result<(), StoreError> {
        self.begin_write("delete order")?;

        self.tables
            .lock()
            .await
            .orders
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::OrderNotFound(id))
    }
}
