use std::sync::Arc;

use thiserror::Error;

use crate::{
    dto::orders::OrderView,
    models::{Cart, OrderAggregate, OrderDraft, OrderId, OrderStatus, ShopId, UserId},
    repository::{CatalogError, CatalogReader, OrderStore, StoreError, UserDirectory},
    services::pricing::{PricingError, ValidationError, price_cart},
};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("invalid order: {0}")]
    Validation(#[from] ValidationError),

    #[error("pricing failed: {0}")]
    Pricing(#[source] CatalogError),

    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error("shop {0} not found")]
    ShopNotFound(ShopId),

    #[error("order {id} is {status} and can no longer be changed")]
    NotPending { id: OrderId, status: OrderStatus },

    #[error("lookup failed: {0}")]
    Directory(#[source] CatalogError),

    #[error("failed to persist order")]
    Persistence(#[source] StoreError),
}

impl From<PricingError> for OrderError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::Validation(err) => OrderError::Validation(err),
            PricingError::Catalog(err) => OrderError::Pricing(err),
        }
    }
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OrderNotFound(id) => OrderError::NotFound(id),
            StoreError::NotPending { id, status } => OrderError::NotPending { id, status },
            other => OrderError::Persistence(other),
        }
    }
}

/// Order use cases: pricing a cart, storing the result, and reading orders
/// back as views.
#[derive(Clone)]
pub struct OrderService {
    catalog: Arc<dyn CatalogReader>,
    users: Arc<dyn UserDirectory>,
    store: Arc<dyn OrderStore>,
}

impl OrderService {
    pub fn new(
        catalog: Arc<dyn CatalogReader>,
        users: Arc<dyn UserDirectory>,
        store: Arc<dyn OrderStore>,
    ) -> Self {
        Self {
            catalog,
            users,
            store,
        }
    }

    /// Prices `cart` and stores it as a new `PENDING` order owned by
    /// `user_id`. The caller is trusted to have authenticated the user.
    pub async fn create_order(&self, user_id: UserId, cart: Cart) -> Result<OrderId, OrderError> {
        tracing::debug!(
            user_id,
            items = cart.items.len(),
            courier = %cart.courier,
            "creating order"
        );

        let priced = price_cart(self.catalog.as_ref(), &cart.items).await?;
        let draft = OrderDraft {
            user_id,
            status: OrderStatus::Pending,
            courier: cart.courier,
            total: priced.total,
            lines: priced.lines,
        };

        let id = self.store.create_order(&draft).await?;
        tracing::info!(
            order_id = id,
            user_id,
            total = draft.total,
            lines = draft.lines.len(),
            "order created"
        );
        Ok(id)
    }

    pub async fn get_order(&self, id: OrderId) -> Result<OrderView, OrderError> {
        tracing::debug!(order_id = id, "getting order");
        let aggregate = self.store.get_order(id).await?;
        Ok(aggregate.into())
    }

    /// An existing user without orders yields an empty list.
    pub async fn get_orders_by_user(&self, user_id: UserId) -> Result<Vec<OrderView>, OrderError> {
        tracing::debug!(user_id, "getting orders by user");
        if !self
            .users
            .user_exists(user_id)
            .await
            .map_err(OrderError::Directory)?
        {
            return Err(OrderError::UserNotFound(user_id));
        }

        let ids = self.store.order_ids_by_user(user_id).await?;
        self.materialize(&ids).await
    }

    /// Orders containing at least one product of the shop, each listed once.
    pub async fn get_orders_by_shop(&self, shop_id: ShopId) -> Result<Vec<OrderView>, OrderError> {
        tracing::debug!(shop_id, "getting orders by shop");
        if !self
            .catalog
            .shop_exists(shop_id)
            .await
            .map_err(OrderError::Directory)?
        {
            return Err(OrderError::ShopNotFound(shop_id));
        }

        let ids = self.store.order_ids_by_shop(shop_id).await?;
        self.materialize(&ids).await
    }

    pub async fn get_all_orders(&self) -> Result<Vec<OrderView>, OrderError> {
        tracing::debug!("getting all orders");
        let aggregates = self.store.all_orders().await?;
        Ok(aggregates.into_iter().map(OrderView::from).collect())
    }

    /// Loads an order that `owner` may edit. Someone else's order reads as
    /// missing; a non-pending order is `NotPending`.
    pub async fn editable_order(
        &self,
        id: OrderId,
        owner: UserId,
    ) -> Result<OrderAggregate, OrderError> {
        let current = self.store.get_order(id).await?;
        if current.order.user_id != owner {
            return Err(OrderError::NotFound(id));
        }
        if current.order.status != OrderStatus::Pending {
            return Err(OrderError::NotPending {
                id,
                status: current.order.status,
            });
        }
        Ok(current)
    }

    /// Re-prices `cart` at current catalog prices and replaces the courier
    /// and lines of `current`. The store re-checks the status under a row
    /// lock, so an order shipped in the meantime is not overwritten.
    pub async fn reprice_order(
        &self,
        current: OrderAggregate,
        cart: Cart,
    ) -> Result<OrderView, OrderError> {
        let id = current.order.id;
        let priced = price_cart(self.catalog.as_ref(), &cart.items).await?;
        let draft = OrderDraft {
            user_id: current.order.user_id,
            status: OrderStatus::Pending,
            courier: cart.courier,
            total: priced.total,
            lines: priced.lines,
        };
        self.store.update_order(id, &draft).await?;
        tracing::info!(order_id = id, total = draft.total, "order updated");

        self.get_order(id).await
    }

    pub async fn update_order(
        &self,
        id: OrderId,
        owner: UserId,
        cart: Cart,
    ) -> Result<OrderView, OrderError> {
        let current = self.editable_order(id, owner).await?;
        self.reprice_order(current, cart).await
    }

    pub async fn delete_order(&self, id: OrderId) -> Result<(), OrderError> {
        self.store.delete_order(id).await?;
        tracing::info!(order_id = id, "order deleted");
        Ok(())
    }

    async fn materialize(&self, ids: &[OrderId]) -> Result<Vec<OrderView>, OrderError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let aggregates = self.store.load_orders(ids).await?;
        Ok(aggregates.into_iter().map(OrderView::from).collect())
    }
}
