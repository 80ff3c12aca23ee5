//! 应用状态定义
//!
//! 包含 Axum 路由共享的应用状态

use axum::extract::FromRef;
use order_shared::database::Database;

use crate::cache::OrderCache;

/// Axum 应用共享状态
///
/// 查询路径只读缓存，从不回源数据库；
/// Database 仅供就绪探针做连通性检查。
#[derive(Clone)]
pub struct AppState {
    /// 订单内存缓存（内部共享，Clone 零拷贝）
    pub cache: OrderCache,
    /// PostgreSQL 连接池包装
    pub db: Database,
}

impl FromRef<AppState> for OrderCache {
    fn from_ref(state: &AppState) -> Self {
        state.cache.clone()
    }
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
