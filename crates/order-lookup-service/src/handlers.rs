//! 查询服务 API 处理器
//!
//! 只读、纯缓存：按 order_uid 查询从不触发数据库读。

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::debug;

use order_shared::database::Database;

use crate::cache::OrderCache;
use crate::error::ApiError;
use crate::model::OrderRecord;

/// 按 order_uid 查询订单
///
/// GET /order/{order_uid}
///
/// 命中返回完整订单 JSON；未命中返回 404 纯文本。
pub async fn get_order(
    State(cache): State<OrderCache>,
    Path(order_uid): Path<String>,
) -> Result<Json<OrderRecord>, ApiError> {
    debug!(order_uid = %order_uid, "查询订单");

    cache
        .get(&order_uid)
        .map(Json)
        .ok_or(ApiError::OrderNotFound(order_uid))
}

/// 存活探针：服务进程正常即返回 ok
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "order-lookup-service"
    }))
}

/// 就绪探针：检查数据库连接是否可用
///
/// 查询路径本身不依赖数据库，但摄入管道依赖；
/// 数据库不可用时报告降级，便于编排系统告警。
pub async fn readiness_check(
    State(db): State<Database>,
    State(cache): State<OrderCache>,
) -> Json<serde_json::Value> {
    let db_ok = db.health_check().await.is_ok();

    Json(serde_json::json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "service": "order-lookup-service",
        "checks": {
            "database": if db_ok { "ok" } else { "fail" },
            "cached_orders": cache.len()
        }
    }))
}
