//! HTTP 层错误类型定义
//!
//! 对外只暴露 404（未命中）和 500（内部错误）两种失败，
//! 内部细节只进日志，不进响应体。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// 查询服务错误类型
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("订单不存在: {0}")]
    OrderNotFound(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::OrderNotFound(order_uid) => {
                tracing::debug!(order_uid = %order_uid, "订单未命中");
                (StatusCode::NOT_FOUND, "order not found").into_response()
            }
            Self::Internal(detail) => {
                // 详细信息仅记录日志，防止内部信息泄露
                tracing::error!(error = %detail, "查询服务内部错误");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = ApiError::OrderNotFound("zzz".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_internal_maps_to_500() {
        let response = ApiError::Internal("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
