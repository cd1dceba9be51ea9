use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, FromQueryResult,
    JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use thiserror::Error;

use crate::{
    db::OrmConn,
    entity::{
        order_products::{
            self, ActiveModel as LineActive, Column as LineCol, Entity as OrderProducts,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::Column as ProdCol,
    },
    models::{
        Order, OrderAggregate, OrderDraft, OrderId, OrderLine, OrderStatus, ProductSummary, ShopId,
        StoredLine, UserId,
    },
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("order {id} is {status}")]
    NotPending { id: OrderId, status: OrderStatus },

    /// A step of a read or write failed. Writes run in a transaction, so
    /// nothing from the failed operation was committed.
    #[error("{step} failed")]
    Persistence {
        step: &'static str,
        #[source]
        source: DbErr,
    },
}

fn failed(step: &'static str) -> impl FnOnce(DbErr) -> StoreError {
    move |source| StoreError::Persistence { step, source }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Writes the header and every line atomically and returns the new id.
    async fn create_order(&self, draft: &OrderDraft) -> Result<OrderId, StoreError>;

    /// Ids of the user's orders, ascending.
    async fn order_ids_by_user(&self, user_id: UserId) -> Result<Vec<OrderId>, StoreError>;

    /// Ids of orders with at least one line for a product of `shop_id`,
    /// ascending, each id once.
    async fn order_ids_by_shop(&self, shop_id: ShopId) -> Result<Vec<OrderId>, StoreError>;

    /// Materializes the given orders in one batch, ascending by id. Unknown
    /// ids are skipped.
    async fn load_orders(&self, ids: &[OrderId]) -> Result<Vec<OrderAggregate>, StoreError>;

    async fn all_orders(&self) -> Result<Vec<OrderAggregate>, StoreError>;

    /// Replaces courier, total and the full line set of a pending order in one
    /// transaction. `draft.status` is not written; an order that left
    /// `PENDING` fails with `NotPending` and is left untouched.
    async fn update_order(&self, id: OrderId, draft: &OrderDraft) -> Result<(), StoreError>;

    async fn delete_order(&self, id: OrderId) -> Result<(), StoreError>;

    async fn get_order(&self, id: OrderId) -> Result<OrderAggregate, StoreError> {
        self.load_orders(&[id])
            .await?
            .pop()
            .ok_or(StoreError::OrderNotFound(id))
    }
}

#[derive(Clone)]
pub struct SeaOrmOrderStore {
    db: OrmConn,
}

impl SeaOrmOrderStore {
    pub fn new(db: OrmConn) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromQueryResult)]
struct LineRow {
    order_id: i64,
    product_id: i64,
    amount: i32,
    unit_price: i64,
    shop_id: i64,
    name: String,
    description: Option<String>,
    current_price: i64,
}

#[async_trait]
impl OrderStore for SeaOrmOrderStore {
    async fn create_order(&self, draft: &OrderDraft) -> Result<OrderId, StoreError> {
        let txn = self.db.begin().await.map_err(failed("begin transaction"))?;

        let order = OrderActive {
            id: NotSet,
            user_id: Set(draft.user_id),
            status: Set(draft.status.as_str().to_string()),
            total: Set(draft.total),
            courier: Set(draft.courier.clone()),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(&txn)
        .await
        .map_err(failed("insert order"))?;

        insert_lines(&txn, order.id, &draft.lines).await?;

        txn.commit().await.map_err(failed("commit"))?;
        Ok(order.id)
    }

    async fn order_ids_by_user(&self, user_id: UserId) -> Result<Vec<OrderId>, StoreError> {
        Orders::find()
            .select_only()
            .column(OrderCol::Id)
            .filter(OrderCol::UserId.eq(user_id))
            .order_by_asc(OrderCol::Id)
            .into_tuple::<i64>()
            .all(&self.db)
            .await
            .map_err(failed("select orders by user"))
    }

    async fn order_ids_by_shop(&self, shop_id: ShopId) -> Result<Vec<OrderId>, StoreError> {
        // An order with several lines from the same shop joins to several
        // rows; DISTINCT collapses them.
        OrderProducts::find()
            .select_only()
            .column(LineCol::OrderId)
            .distinct()
            .join(JoinType::InnerJoin, order_products::Relation::Products.def())
            .filter(ProdCol::ShopId.eq(shop_id))
            .order_by_asc(LineCol::OrderId)
            .into_tuple::<i64>()
            .all(&self.db)
            .await
            .map_err(failed("select orders by shop"))
    }

    async fn load_orders(&self, ids: &[OrderId]) -> Result<Vec<OrderAggregate>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let headers = Orders::find()
            .filter(OrderCol::Id.is_in(ids.iter().copied()))
            .order_by_asc(OrderCol::Id)
            .all(&self.db)
            .await
            .map_err(failed("select orders"))?;

        let rows = OrderProducts::find()
            .select_only()
            .column(LineCol::OrderId)
            .column(LineCol::ProductId)
            .column(LineCol::Amount)
            .column(LineCol::UnitPrice)
            .join(JoinType::InnerJoin, order_products::Relation::Products.def())
            .column(ProdCol::ShopId)
            .column(ProdCol::Name)
            .column(ProdCol::Description)
            .column_as(ProdCol::Price, "current_price")
            .filter(LineCol::OrderId.is_in(ids.iter().copied()))
            .order_by_asc(LineCol::OrderId)
            .order_by_asc(LineCol::ProductId)
            .into_model::<LineRow>()
            .all(&self.db)
            .await
            .map_err(failed("select order lines"))?;

        let mut lines: BTreeMap<OrderId, Vec<StoredLine>> = BTreeMap::new();
        for row in rows {
            lines.entry(row.order_id).or_default().push(stored_line_from_row(row));
        }

        headers
            .into_iter()
            .map(|model| {
                let lines = lines.remove(&model.id).unwrap_or_default();
                Ok(OrderAggregate {
                    order: order_from_entity(model)?,
                    lines,
                })
            })
            .collect()
    }

    async fn all_orders(&self) -> Result<Vec<OrderAggregate>, StoreError> {
        let ids = Orders::find()
            .select_only()
            .column(OrderCol::Id)
            .order_by_asc(OrderCol::Id)
            .into_tuple::<i64>()
            .all(&self.db)
            .await
            .map_err(failed("select all orders"))?;

        self.load_orders(&ids).await
    }

    async fn update_order(&self, id: OrderId, draft: &OrderDraft) -> Result<(), StoreError> {
        let txn = self.db.begin().await.map_err(failed("begin transaction"))?;

        // Dropping the transaction without commit rolls it back.
        let current = lock_order(&txn, id).await?;
        let status = order_from_entity(current)?.status;
        if status != OrderStatus::Pending {
            return Err(StoreError::NotPending { id, status });
        }

        Orders::update_many()
            .col_expr(OrderCol::Courier, Expr::value(draft.courier.clone()))
            .col_expr(OrderCol::Total, Expr::value(draft.total))
            .col_expr(OrderCol::UpdatedAt, Expr::value(Utc::now()))
            .filter(OrderCol::Id.eq(id))
            .exec(&txn)
            .await
            .map_err(failed("update order"))?;

        OrderProducts::delete_many()
            .filter(LineCol::OrderId.eq(id))
            .exec(&txn)
            .await
            .map_err(failed("delete order lines"))?;

        insert_lines(&txn, id, &draft.lines).await?;

        txn.commit().await.map_err(failed("commit"))?;
        Ok(())
    }

    async fn delete_order(&self, id: OrderId) -> Result<(), StoreError> {
        let txn = self.db.begin().await.map_err(failed("begin transaction"))?;

        // Header first, then lines: the same lock order as `update_order`.
        lock_order(&txn, id).await?;

        OrderProducts::delete_many()
            .filter(LineCol::OrderId.eq(id))
            .exec(&txn)
            .await
            .map_err(failed("delete order lines"))?;

        Orders::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(failed("delete order"))?;

        txn.commit().await.map_err(failed("commit"))?;
        Ok(())
    }
}

/// `SELECT ... FOR UPDATE` on the order header. Every write path takes this
/// lock before touching `order_products`.
async fn lock_order(txn: &DatabaseTransaction, id: OrderId) -> Result<OrderModel, StoreError> {
    Orders::find_by_id(id)
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(failed("lock order"))?
        .ok_or(StoreError::OrderNotFound(id))
}

async fn insert_lines(
    txn: &DatabaseTransaction,
    order_id: OrderId,
    lines: &[OrderLine],
) -> Result<(), StoreError> {
    if lines.is_empty() {
        return Ok(());
    }

    let rows = lines.iter().map(|line| LineActive {
        order_id: Set(order_id),
        product_id: Set(line.product_id),
        amount: Set(line.amount),
        unit_price: Set(line.unit_price),
    });

    OrderProducts::insert_many(rows)
        .exec_without_returning(txn)
        .await
        .map_err(failed("insert order lines"))?;
    Ok(())
}

fn order_from_entity(model: OrderModel) -> Result<Order, StoreError> {
    let status = model
        .status
        .parse::<OrderStatus>()
        .map_err(|err| StoreError::Persistence {
            step: "decode order status",
            source: DbErr::Type(err.to_string()),
        })?;

    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        status,
        total: model.total,
        courier: model.courier,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn stored_line_from_row(row: LineRow) -> StoredLine {
    StoredLine {
        line: OrderLine {
            product_id: row.product_id,
            shop_id: row.shop_id,
            amount: row.amount,
            unit_price: row.unit_price,
        },
        product: ProductSummary {
            id: row.product_id,
            name: row.name,
            description: row.description,
            price: row.current_price,
        },
    }
}
