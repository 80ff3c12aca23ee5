//! Kafka 基础设施封装
//!
//! 将 rdkafka 的底层 API 封装为业务友好的 Consumer 抽象，
//! 统一消息反序列化、偏移量提交和优雅关闭语义。
//!
//! 偏移量提交是手动的（`enable.auto.commit=false`）：
//! 只有处理回调报告终态的消息才提交偏移量，瞬时故障的消息保持未提交，
//! 由 broker 在消费者重启或重平衡后重投，实现 at-least-once 语义。

use std::collections::HashMap;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::KafkaConfig;
use crate::error::OrderError;

// ---------------------------------------------------------------------------
// MessageDisposition
// ---------------------------------------------------------------------------

/// 单条消息的处理结果，决定偏移量是否提交
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDisposition {
    /// 处理到达终态（成功、毒消息丢弃、幂等冲突），提交偏移量
    Terminal,
    /// 瞬时故障，不提交偏移量，等待重投
    Retry,
}

// ---------------------------------------------------------------------------
// ConsumerMessage
// ---------------------------------------------------------------------------

/// 消费到的 Kafka 消息的统一表示
///
/// 将 rdkafka 的 `BorrowedMessage`（带生命周期约束）转换为拥有所有权的结构体，
/// 使消息可以安全地跨 await 点传递给异步处理函数。
#[derive(Debug, Clone)]
pub struct ConsumerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub timestamp: Option<i64>,
    pub headers: HashMap<String, String>,
}

impl ConsumerMessage {
    /// 从 rdkafka 的借用消息构造，提取并拥有所有字段
    fn from_borrowed(msg: &BorrowedMessage<'_>) -> Self {
        let key = msg
            .key()
            .and_then(|k| std::str::from_utf8(k).ok())
            .map(String::from);

        let payload = msg.payload().map(|p| p.to_vec()).unwrap_or_default();

        let timestamp = msg.timestamp().to_millis();

        let mut headers = HashMap::new();
        if let Some(h) = msg.headers() {
            for idx in 0..h.count() {
                let header = h.get(idx);
                if let Some(raw) = header.value
                    && let Ok(value) = std::str::from_utf8(raw)
                {
                    headers.insert(header.key.to_string(), value.to_string());
                }
            }
        }

        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key,
            payload,
            timestamp,
            headers,
        }
    }

    /// 将 JSON 格式负载反序列化为目标类型
    ///
    /// 解码失败映射为 `Decode` 错误——这是一条毒消息，不应被重试。
    pub fn deserialize_payload<T: DeserializeOwned>(&self) -> Result<T, OrderError> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| OrderError::Decode(format!("负载反序列化失败: {e}")))
    }
}

// ---------------------------------------------------------------------------
// KafkaConsumer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 消费者
///
/// 封装 `StreamConsumer` 并提供基于 `watch` channel 的优雅关闭语义，
/// 确保进程退出时不会丢失正在处理的消息。
pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    /// 创建消费者
    ///
    /// 关闭自动提交：偏移量只在消息到达终态后提交，
    /// 未确认的消息由 broker 重投。
    pub fn new(config: &KafkaConfig) -> Result<Self, OrderError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.consumer_group)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.auto.commit", "false")
            .create()
            .map_err(|e| OrderError::Kafka(format!("创建消费者失败: {e}")))?;

        info!(
            brokers = %config.brokers,
            group_id = %config.consumer_group,
            "Kafka 消费者已初始化"
        );
        Ok(Self { consumer })
    }

    /// 订阅指定的 topic 列表
    pub fn subscribe(&self, topics: &[&str]) -> Result<(), OrderError> {
        self.consumer
            .subscribe(topics)
            .map_err(|e| OrderError::Kafka(format!("订阅 topic 失败: {e}")))?;

        info!(?topics, "已订阅 Kafka topics");
        Ok(())
    }

    /// 启动消费循环
    ///
    /// 使用 `tokio::select!` 同时监听消息流和关闭信号：
    /// - handler 返回 `Terminal` 时提交偏移量；返回 `Retry` 时不提交，
    ///   并退避 `retry_backoff`，避免持久存储不可用时消费循环空转。
    /// - 关闭信号变为 `true` 时退出循环，确保正在执行的 handler 能自然完成。
    pub async fn start<F, Fut>(
        self,
        mut shutdown: watch::Receiver<bool>,
        retry_backoff: Duration,
        handler: F,
    ) where
        F: Fn(ConsumerMessage) -> Fut,
        Fut: std::future::Future<Output = MessageDisposition>,
    {
        use futures::StreamExt;

        let consumer = self.consumer;
        let stream = consumer.stream();
        futures::pin_mut!(stream);

        info!("Kafka 消费循环已启动");

        loop {
            tokio::select! {
                // 偏向关闭信号，保证收到关闭时能尽快退出
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("收到关闭信号，Kafka 消费循环退出");
                        break;
                    }
                }

                msg_result = stream.next() => {
                    let Some(msg_result) = msg_result else {
                        warn!("Kafka 消息流意外结束");
                        break;
                    };

                    match msg_result {
                        Ok(borrowed_msg) => {
                            let msg = ConsumerMessage::from_borrowed(&borrowed_msg);
                            debug!(
                                topic = %msg.topic,
                                partition = msg.partition,
                                offset = msg.offset,
                                "收到 Kafka 消息"
                            );

                            match handler(msg).await {
                                MessageDisposition::Terminal => {
                                    if let Err(e) =
                                        consumer.commit_message(&borrowed_msg, CommitMode::Async)
                                    {
                                        error!(error = %e, "提交偏移量失败");
                                    }
                                }
                                MessageDisposition::Retry => {
                                    warn!(
                                        partition = borrowed_msg.partition(),
                                        offset = borrowed_msg.offset(),
                                        backoff_secs = retry_backoff.as_secs(),
                                        "消息未确认，等待重投"
                                    );
                                    tokio::time::sleep(retry_backoff).await;
                                }
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "接收 Kafka 消息出错");
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumer_message_creation() {
        let msg = ConsumerMessage {
            topic: "orders".to_string(),
            partition: 0,
            offset: 42,
            key: Some("abc-1".to_string()),
            payload: b"hello".to_vec(),
            timestamp: Some(1_700_000_000_000),
            headers: HashMap::from([("trace-id".to_string(), "abc-123".to_string())]),
        };

        assert_eq!(msg.topic, "orders");
        assert_eq!(msg.partition, 0);
        assert_eq!(msg.offset, 42);
        assert_eq!(msg.key.as_deref(), Some("abc-1"));
        assert_eq!(msg.payload, b"hello");
        assert_eq!(msg.timestamp, Some(1_700_000_000_000));
        assert_eq!(msg.headers.get("trace-id").unwrap(), "abc-123");
    }

    #[test]
    fn test_consumer_message_deserialize() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct Probe {
            order_uid: String,
            entry: String,
        }

        let json = r#"{"order_uid":"abc-1","entry":"WBIL"}"#;
        let msg = ConsumerMessage {
            topic: "orders".to_string(),
            partition: 1,
            offset: 100,
            key: None,
            payload: json.as_bytes().to_vec(),
            timestamp: None,
            headers: HashMap::new(),
        };

        let probe: Probe = msg.deserialize_payload().unwrap();
        assert_eq!(
            probe,
            Probe {
                order_uid: "abc-1".to_string(),
                entry: "WBIL".to_string(),
            }
        );
    }

    #[test]
    fn test_consumer_message_deserialize_invalid_json() {
        let msg = ConsumerMessage {
            topic: "orders".to_string(),
            partition: 0,
            offset: 0,
            key: None,
            payload: b"not json".to_vec(),
            timestamp: None,
            headers: HashMap::new(),
        };

        let result: Result<serde_json::Value, _> = msg.deserialize_payload();
        assert!(matches!(result, Err(OrderError::Decode(_))));
    }
}
