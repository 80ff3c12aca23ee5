//! 订单持久化仓储
//!
//! 定义仓储接口，便于摄入管道依赖抽象而非具体实现，支持 mock 测试。
//! PostgreSQL 实现将一条订单拆入四张表：orders、deliveries、payments、items，
//! 写入在单个事务内完成，冲突时按幂等重放处理（ON CONFLICT DO NOTHING）。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info, warn};

use order_shared::error::Result;

use crate::model::{DeliveryInfo, LineItem, OrderRecord, PaymentInfo};

/// 订单存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// 事务性保存一条订单
    ///
    /// 四次插入全部成功才提交；任一失败整体回滚，不留部分行。
    /// order_uid 冲突按无操作成功处理（幂等重放）。
    async fn save(&self, order: &OrderRecord) -> Result<()>;

    /// 全量加载所有订单
    ///
    /// 缺少配送或支付行的订单记录警告后跳过，不中断整个加载——
    /// 部分数据永远不对外可见。
    async fn load_all(&self) -> Result<Vec<OrderRecord>>;
}

// ---------------------------------------------------------------------------
// PostgreSQL 实现
// ---------------------------------------------------------------------------

/// 订单头查询结果
#[derive(sqlx::FromRow)]
struct OrderRow {
    order_uid: String,
    track_number: String,
    entry: String,
    locale: String,
    internal_signature: String,
    customer_id: String,
    delivery_service: String,
    shardkey: String,
    sm_id: i32,
    date_created: DateTime<Utc>,
    oof_shard: String,
}

/// 配送行查询结果
#[derive(sqlx::FromRow)]
struct DeliveryRow {
    name: String,
    phone: String,
    zip: String,
    city: String,
    address: String,
    region: String,
    email: String,
}

impl From<DeliveryRow> for DeliveryInfo {
    fn from(row: DeliveryRow) -> Self {
        Self {
            name: row.name,
            phone: row.phone,
            zip: row.zip,
            city: row.city,
            address: row.address,
            region: row.region,
            email: row.email,
        }
    }
}

/// 支付行查询结果
#[derive(sqlx::FromRow)]
struct PaymentRow {
    transaction_id: String,
    request_id: String,
    currency: String,
    provider: String,
    amount: i64,
    payment_dt: i64,
    bank: String,
    delivery_cost: i64,
    goods_total: i64,
    custom_fee: i64,
}

impl From<PaymentRow> for PaymentInfo {
    fn from(row: PaymentRow) -> Self {
        Self {
            transaction_id: row.transaction_id,
            request_id: row.request_id,
            currency: row.currency,
            provider: row.provider,
            amount: row.amount,
            payment_dt: row.payment_dt,
            bank: row.bank,
            delivery_cost: row.delivery_cost,
            goods_total: row.goods_total,
            custom_fee: row.custom_fee,
        }
    }
}

/// 商品行查询结果
#[derive(sqlx::FromRow)]
struct ItemRow {
    chrt_id: i64,
    track_number: String,
    price: i64,
    rid: String,
    name: String,
    sale: i32,
    size: String,
    total_price: i64,
    nm_id: i64,
    brand: String,
    status: i32,
}

impl From<ItemRow> for LineItem {
    fn from(row: ItemRow) -> Self {
        Self {
            chrt_id: row.chrt_id,
            track_number: row.track_number,
            price: row.price,
            rid: row.rid,
            name: row.name,
            sale: row.sale,
            size: row.size,
            total_price: row.total_price,
            nm_id: row.nm_id,
            brand: row.brand,
            status: row.status,
        }
    }
}

const INSERT_ORDER_SQL: &str = r#"
    INSERT INTO orders (order_uid, track_number, entry, locale, customer_id,
                        internal_signature, delivery_service, shardkey, sm_id,
                        date_created, oof_shard)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    ON CONFLICT (order_uid) DO NOTHING
"#;

const INSERT_DELIVERY_SQL: &str = r#"
    INSERT INTO deliveries (order_uid, name, phone, zip, city, address, region, email)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    ON CONFLICT (order_uid) DO NOTHING
"#;

const INSERT_PAYMENT_SQL: &str = r#"
    INSERT INTO payments (order_uid, transaction_id, request_id, currency, provider,
                          amount, payment_dt, bank, delivery_cost, goods_total, custom_fee)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    ON CONFLICT (order_uid) DO NOTHING
"#;

const INSERT_ITEM_SQL: &str = r#"
    INSERT INTO items (order_uid, chrt_id, track_number, price, rid, name,
                       sale, size, total_price, nm_id, brand, status)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
    ON CONFLICT (order_uid, chrt_id) DO NOTHING
"#;

/// PostgreSQL 订单仓储
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 加载单条订单的配送/支付/商品行并组装
    ///
    /// 配送或支付行缺失返回 Ok(None)，由调用方跳过该订单。
    async fn load_parts(&self, header: OrderRow) -> Result<Option<OrderRecord>> {
        let delivery: Option<DeliveryRow> = sqlx::query_as(
            "SELECT name, phone, zip, city, address, region, email \
             FROM deliveries WHERE order_uid = $1",
        )
        .bind(&header.order_uid)
        .fetch_optional(&self.pool)
        .await?;

        let Some(delivery) = delivery else {
            warn!(order_uid = %header.order_uid, "订单缺少配送行，跳过");
            return Ok(None);
        };

        let payment: Option<PaymentRow> = sqlx::query_as(
            "SELECT transaction_id, request_id, currency, provider, amount, \
                    payment_dt, bank, delivery_cost, goods_total, custom_fee \
             FROM payments WHERE order_uid = $1",
        )
        .bind(&header.order_uid)
        .fetch_optional(&self.pool)
        .await?;

        let Some(payment) = payment else {
            warn!(order_uid = %header.order_uid, "订单缺少支付行，跳过");
            return Ok(None);
        };

        let items: Vec<ItemRow> = sqlx::query_as(
            "SELECT chrt_id, track_number, price, rid, name, sale, size, \
                    total_price, nm_id, brand, status \
             FROM items WHERE order_uid = $1 ORDER BY chrt_id",
        )
        .bind(&header.order_uid)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(OrderRecord {
            order_uid: header.order_uid,
            track_number: header.track_number,
            entry: header.entry,
            delivery: delivery.into(),
            payment: payment.into(),
            items: items.into_iter().map(Into::into).collect(),
            locale: header.locale,
            internal_signature: header.internal_signature,
            customer_id: header.customer_id,
            delivery_service: header.delivery_service,
            shardkey: header.shardkey,
            sm_id: header.sm_id,
            date_created: header.date_created,
            oof_shard: header.oof_shard,
        }))
    }
}

#[async_trait]
impl OrderStore for PgOrderRepository {
    async fn save(&self, order: &OrderRecord) -> Result<()> {
        // 事务内四次插入；任一失败时 tx 被丢弃即回滚
        let mut tx = self.pool.begin().await?;

        sqlx::query(INSERT_ORDER_SQL)
            .bind(&order.order_uid)
            .bind(&order.track_number)
            .bind(&order.entry)
            .bind(&order.locale)
            .bind(&order.customer_id)
            .bind(&order.internal_signature)
            .bind(&order.delivery_service)
            .bind(&order.shardkey)
            .bind(order.sm_id)
            .bind(order.date_created)
            .bind(&order.oof_shard)
            .execute(&mut *tx)
            .await?;

        sqlx::query(INSERT_DELIVERY_SQL)
            .bind(&order.order_uid)
            .bind(&order.delivery.name)
            .bind(&order.delivery.phone)
            .bind(&order.delivery.zip)
            .bind(&order.delivery.city)
            .bind(&order.delivery.address)
            .bind(&order.delivery.region)
            .bind(&order.delivery.email)
            .execute(&mut *tx)
            .await?;

        sqlx::query(INSERT_PAYMENT_SQL)
            .bind(&order.order_uid)
            .bind(&order.payment.transaction_id)
            .bind(&order.payment.request_id)
            .bind(&order.payment.currency)
            .bind(&order.payment.provider)
            .bind(order.payment.amount)
            .bind(order.payment.payment_dt)
            .bind(&order.payment.bank)
            .bind(order.payment.delivery_cost)
            .bind(order.payment.goods_total)
            .bind(order.payment.custom_fee)
            .execute(&mut *tx)
            .await?;

        for item in &order.items {
            sqlx::query(INSERT_ITEM_SQL)
                .bind(&order.order_uid)
                .bind(item.chrt_id)
                .bind(&item.track_number)
                .bind(item.price)
                .bind(&item.rid)
                .bind(&item.name)
                .bind(item.sale)
                .bind(&item.size)
                .bind(item.total_price)
                .bind(item.nm_id)
                .bind(&item.brand)
                .bind(item.status)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!(order_uid = %order.order_uid, items = order.items.len(), "订单已持久化");
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<OrderRecord>> {
        // 头表查不到是致命错误；单条订单的组装失败只跳过该订单
        let headers: Vec<OrderRow> = sqlx::query_as(
            "SELECT order_uid, track_number, entry, locale, internal_signature, \
                    customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard \
             FROM orders",
        )
        .fetch_all(&self.pool)
        .await?;

        let total = headers.len();
        let mut orders = Vec::with_capacity(total);

        for header in headers {
            let order_uid = header.order_uid.clone();
            match self.load_parts(header).await {
                Ok(Some(order)) => orders.push(order),
                Ok(None) => {}
                Err(e) => {
                    warn!(order_uid = %order_uid, error = %e, "加载订单失败，跳过");
                }
            }
        }

        info!(loaded = orders.len(), total, "订单全量加载完成");
        Ok(orders)
    }
}
