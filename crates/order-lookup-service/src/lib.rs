//! 订单查询服务
//!
//! 从 Kafka 消费订单消息，事务性写入 PostgreSQL，
//! 并维护 order_uid 到完整订单的内存映射供 HTTP 查询。

pub mod cache;
pub mod consumer;
pub mod error;
pub mod handlers;
pub mod model;
pub mod repository;
pub mod routes;
pub mod state;
