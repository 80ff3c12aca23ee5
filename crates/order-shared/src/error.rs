//! 统一错误处理模块
//!
//! 定义系统中所有共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum OrderError {
    // ==================== 数据库错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("写库超时: order_uid={order_uid}")]
    StoreTimeout { order_uid: String },

    // ==================== Kafka 错误 ====================
    #[error("Kafka 错误: {0}")]
    Kafka(String),

    // ==================== 消息解码错误 ====================
    #[error("消息解码失败: {0}")]
    Decode(String),

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, OrderError>;

impl OrderError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(e) if is_constraint_violation(e) => "CONSTRAINT_VIOLATION",
            Self::Database(_) => "STORE_UNAVAILABLE",
            Self::StoreTimeout { .. } => "STORE_TIMEOUT",
            Self::Kafka(_) => "KAFKA_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 约束冲突不可重试：记录已持久化，重试只会再次冲突。
    /// 其余数据库/Kafka 错误视为瞬时故障，依赖消息重投恢复。
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(e) => !is_constraint_violation(e),
            Self::StoreTimeout { .. } | Self::Kafka(_) => true,
            Self::Decode(_) | Self::Internal(_) => false,
        }
    }

    /// 是否为数据库约束冲突（SQLSTATE 23 类）
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::Database(e) if is_constraint_violation(e))
    }
}

/// 判断 sqlx 错误是否属于完整性约束冲突（SQLSTATE class 23）
fn is_constraint_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db_err| db_err.code())
        .is_some_and(|code| code.starts_with("23"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = OrderError::Decode("bad json".to_string());
        assert_eq!(err.code(), "DECODE_ERROR");

        let err = OrderError::StoreTimeout {
            order_uid: "abc-1".to_string(),
        };
        assert_eq!(err.code(), "STORE_TIMEOUT");
    }

    #[test]
    fn test_is_retryable() {
        let db_err = OrderError::Database(sqlx::Error::PoolTimedOut);
        assert!(db_err.is_retryable());

        let timeout_err = OrderError::StoreTimeout {
            order_uid: "abc-1".to_string(),
        };
        assert!(timeout_err.is_retryable());

        let kafka_err = OrderError::Kafka("broker down".to_string());
        assert!(kafka_err.is_retryable());

        let decode_err = OrderError::Decode("bad json".to_string());
        assert!(!decode_err.is_retryable());
    }

    #[test]
    fn test_pool_timeout_is_not_constraint_violation() {
        let err = OrderError::Database(sqlx::Error::PoolTimedOut);
        assert!(!err.is_constraint_violation());
    }
}
