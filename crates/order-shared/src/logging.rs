//! 日志初始化模块
//!
//! 基于 tracing-subscriber 提供统一的日志配置：
//! EnvFilter 控制级别（RUST_LOG 优先于配置文件），
//! 输出格式支持 json（结构化，供日志采集）和 pretty（本地开发）。

use anyhow::Result;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::ObservabilityConfig;

/// 初始化全局日志订阅器
///
/// 进程内只能调用一次，重复初始化会返回错误。
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = if config.log_format == "json" {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_ansi(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent_failure() {
        let config = ObservabilityConfig::default();
        // 第一次初始化可能成功也可能因其他测试已初始化而失败，
        // 但第二次必然失败且不应 panic
        let _ = init(&config);
        assert!(init(&config).is_err());
    }
}
