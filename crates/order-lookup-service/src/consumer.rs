//! 订单摄入管道
//!
//! 将 Kafka 消息解码为订单记录，校验后事务性落库，再更新内存缓存。
//! 每条消息的终态决定偏移量是否提交：
//! - 解码失败：毒消息，记录日志后确认丢弃，绝不阻塞后续消息
//! - 落库瞬时失败/超时：不确认，依赖 broker 重投（at-least-once）
//! - 约束冲突：记录大概率已持久化，按幂等重放确认
//! - 成功：先提交事务，再写缓存，最后确认偏移量

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use order_shared::config::AppConfig;
use order_shared::error::OrderError;
use order_shared::kafka::{ConsumerMessage, KafkaConsumer, MessageDisposition};

use crate::cache::OrderCache;
use crate::model::OrderRecord;
use crate::repository::OrderStore;

/// 订单消费者
///
/// 组合 KafkaConsumer（消息拉取）、OrderStore（持久化）和 OrderCache（查询视图），
/// 形成完整的摄入管道。
pub struct OrderConsumer<S: OrderStore> {
    consumer: KafkaConsumer,
    store: Arc<S>,
    cache: OrderCache,
    topic: String,
    store_timeout: Duration,
    retry_backoff: Duration,
}

impl<S: OrderStore> OrderConsumer<S> {
    pub fn new(config: &AppConfig, store: Arc<S>, cache: OrderCache) -> Result<Self, OrderError> {
        let consumer = KafkaConsumer::new(&config.kafka)?;
        Ok(Self {
            consumer,
            store,
            cache,
            topic: config.kafka.topic.clone(),
            store_timeout: Duration::from_secs(config.ingest.store_timeout_seconds),
            retry_backoff: Duration::from_secs(config.ingest.retry_backoff_seconds),
        })
    }

    /// 启动消费循环，直到收到 shutdown 信号
    ///
    /// 将 store 和 cache 移入闭包，通过 KafkaConsumer::start 驱动消费循环。
    /// 单独抽取 handle_message 函数方便单元测试。
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), OrderError> {
        self.consumer.subscribe(&[&self.topic])?;

        info!(topic = %self.topic, "订单消费者已启动");

        let store = self.store;
        let cache = self.cache;
        let store_timeout = self.store_timeout;

        self.consumer
            .start(shutdown, self.retry_backoff, |msg| {
                let store = &store;
                let cache = &cache;
                async move { handle_message(store.as_ref(), cache, store_timeout, &msg).await }
            })
            .await;

        info!("订单消费者已停止");
        Ok(())
    }
}

/// 处理单条 Kafka 消息的完整流程
///
/// 拆分为独立函数而非方法，便于在测试中直接调用而无需构造完整的 Consumer。
/// 流程：反序列化 -> 校验 -> 落库（带超时）-> 更新缓存。
/// 缓存更新严格在事务提交之后，写库期间不持有任何缓存锁。
pub async fn handle_message<S: OrderStore + ?Sized>(
    store: &S,
    cache: &OrderCache,
    store_timeout: Duration,
    msg: &ConsumerMessage,
) -> MessageDisposition {
    // 1. 反序列化：失败即毒消息，确认丢弃
    let order: OrderRecord = match msg.deserialize_payload() {
        Ok(order) => order,
        Err(e) => {
            warn!(
                topic = %msg.topic,
                partition = msg.partition,
                offset = msg.offset,
                error = %e,
                "消息解码失败，丢弃"
            );
            return MessageDisposition::Terminal;
        }
    };

    // 2. 校验：空 order_uid 无法入库和定位，同样按毒消息处理
    if let Err(e) = order.validate() {
        warn!(
            offset = msg.offset,
            error = %e,
            "订单校验失败，丢弃"
        );
        return MessageDisposition::Terminal;
    }

    // 3. 落库：瞬时故障不确认，等待重投；约束冲突按幂等成功确认。
    //    超时归一为 StoreTimeout，与其他存储错误走同一套分类。
    let save_result = match tokio::time::timeout(store_timeout, store.save(&order)).await {
        Ok(result) => result,
        Err(_) => Err(OrderError::StoreTimeout {
            order_uid: order.order_uid.clone(),
        }),
    };

    match save_result {
        Ok(()) => {}
        Err(e) if e.is_constraint_violation() => {
            warn!(
                order_uid = %order.order_uid,
                error = %e,
                "约束冲突，按幂等重放确认"
            );
            return MessageDisposition::Terminal;
        }
        Err(e) if e.is_retryable() => {
            error!(
                order_uid = %order.order_uid,
                error = %e,
                "订单落库失败，等待重投"
            );
            return MessageDisposition::Retry;
        }
        Err(e) => {
            error!(
                order_uid = %order.order_uid,
                error = %e,
                "订单落库遇到不可重试错误，丢弃"
            );
            return MessageDisposition::Terminal;
        }
    }

    // 4. 落库成功后更新缓存。若进程在此之前崩溃，记录已持久化但缓存缺失，
    //    由下次启动的全量加载修复。
    let order_uid = order.order_uid.clone();
    cache.insert(order);

    info!(order_uid = %order_uid, offset = msg.offset, "订单处理完成");
    MessageDisposition::Terminal
}
