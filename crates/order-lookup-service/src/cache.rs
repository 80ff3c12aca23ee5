//! 订单内存缓存
//!
//! 使用 DashMap 实现 order_uid 到完整订单的高并发映射。
//! 进程独占：启动时由全量加载填充，运行期由摄入管道保持最新。
//! 无淘汰、无 TTL、无容量上限——假设完整工作集常驻内存。

use dashmap::DashMap;
use std::sync::Arc;

use crate::model::OrderRecord;

/// 订单缓存
///
/// 基于 DashMap 分段锁，调用方无需外部同步即可并发读写。
/// 单个键的写入是原子的：读者要么看到旧记录要么看到新记录，
/// 不会看到字段混杂的中间态。
#[derive(Debug, Default)]
pub struct OrderCache {
    orders: Arc<DashMap<String, OrderRecord>>,
}

impl OrderCache {
    /// 创建空缓存
    pub fn new() -> Self {
        Self {
            orders: Arc::new(DashMap::new()),
        }
    }

    /// 插入或整体替换订单
    ///
    /// 同一 order_uid 重复出现时覆盖整条记录，从不做字段级更新。
    pub fn insert(&self, order: OrderRecord) {
        self.orders.insert(order.order_uid.clone(), order);
    }

    /// 按 order_uid 查询
    ///
    /// 返回记录的克隆，不持有锁、不触发任何 I/O；未命中返回 None。
    pub fn get(&self, order_uid: &str) -> Option<OrderRecord> {
        self.orders.get(order_uid).map(|entry| entry.clone())
    }

    /// 当前缓存的订单数
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// 缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

impl Clone for OrderCache {
    fn clone(&self) -> Self {
        Self {
            orders: Arc::clone(&self.orders),
        }
    }
}
