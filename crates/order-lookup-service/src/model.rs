//! 订单数据模型
//!
//! 订单记录的规范形态：订单头、配送信息、支付信息和商品明细。
//! serde 字段名与消息流及 HTTP 响应的线上格式一一对应。
//! `order_uid` 是贯穿四张表和缓存的唯一键。

use chrono::{DateTime, Utc};
use order_shared::error::OrderError;
use serde::{Deserialize, Serialize};

/// 订单记录
///
/// 解码只会产生完整的记录：任何必填字段缺失都会使整条消息解码失败，
/// 不存在部分填充的中间态。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub delivery: DeliveryInfo,
    pub payment: PaymentInfo,
    pub items: Vec<LineItem>,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i32,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

/// 配送信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryInfo {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

/// 支付信息
///
/// `amount` 等金额字段为最小货币单位的整数，`payment_dt` 为 Unix 秒级时间戳。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInfo {
    #[serde(rename = "transaction")]
    pub transaction_id: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

/// 商品明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    pub sale: i32,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i32,
}

impl OrderRecord {
    /// 校验解码后的记录
    ///
    /// `order_uid` 是四张表和缓存的连接键，空键的记录无法定位，
    /// 按毒消息处理。
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.order_uid.is_empty() {
            return Err(OrderError::Decode("order_uid 为空".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 线上格式的完整订单 JSON 样例
    fn sample_order_json() -> &'static str {
        r#"{
            "order_uid": "b563feb7b2b84b6test",
            "track_number": "WBILMTESTTRACK",
            "entry": "WBIL",
            "delivery": {
                "name": "Test Testov",
                "phone": "+9720000000",
                "zip": "2639809",
                "city": "Kiryat Mozkin",
                "address": "Ploshad Mira 15",
                "region": "Kraiot",
                "email": "test@gmail.com"
            },
            "payment": {
                "transaction": "b563feb7b2b84b6test",
                "request_id": "",
                "currency": "USD",
                "provider": "wbpay",
                "amount": 1817,
                "payment_dt": 1637907727,
                "bank": "alpha",
                "delivery_cost": 1500,
                "goods_total": 317,
                "custom_fee": 0
            },
            "items": [
                {
                    "chrt_id": 9934930,
                    "track_number": "WBILMTESTTRACK",
                    "price": 453,
                    "rid": "ab4219087a764ae0btest",
                    "name": "Mascaras",
                    "sale": 30,
                    "size": "0",
                    "total_price": 317,
                    "nm_id": 2389212,
                    "brand": "Vivienne Sabo",
                    "status": 202
                }
            ],
            "locale": "en",
            "internal_signature": "",
            "customer_id": "test",
            "delivery_service": "meest",
            "shardkey": "9",
            "sm_id": 99,
            "date_created": "2021-11-26T06:22:19Z",
            "oof_shard": "1"
        }"#
    }

    #[test]
    fn test_decode_full_order() {
        let order: OrderRecord = serde_json::from_str(sample_order_json()).unwrap();

        assert_eq!(order.order_uid, "b563feb7b2b84b6test");
        assert_eq!(order.delivery.city, "Kiryat Mozkin");
        assert_eq!(order.payment.transaction_id, "b563feb7b2b84b6test");
        assert_eq!(order.payment.amount, 1817);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].chrt_id, 9934930);
        assert_eq!(order.sm_id, 99);
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_round_trip() {
        let order: OrderRecord = serde_json::from_str(sample_order_json()).unwrap();

        let serialized = serde_json::to_string(&order).unwrap();
        let restored: OrderRecord = serde_json::from_str(&serialized).unwrap();

        assert_eq!(restored, order);
    }

    #[test]
    fn test_round_trip_empty_items() {
        let mut order: OrderRecord = serde_json::from_str(sample_order_json()).unwrap();
        order.items.clear();

        let serialized = serde_json::to_string(&order).unwrap();
        let restored: OrderRecord = serde_json::from_str(&serialized).unwrap();

        assert_eq!(restored, order);
        assert!(restored.items.is_empty());
    }

    #[test]
    fn test_payment_transaction_field_name_on_wire() {
        let order: OrderRecord = serde_json::from_str(sample_order_json()).unwrap();
        let value = serde_json::to_value(&order).unwrap();

        // 线上字段名是 transaction，不是内部的 transaction_id
        assert!(value["payment"]["transaction"].is_string());
        assert!(value["payment"].get("transaction_id").is_none());
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        let result: Result<OrderRecord, _> =
            serde_json::from_str(r#"{"order_uid": "abc-1", "entry": "WBIL"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_empty_order_uid() {
        let mut order: OrderRecord = serde_json::from_str(sample_order_json()).unwrap();
        order.order_uid.clear();

        assert!(matches!(order.validate(), Err(OrderError::Decode(_))));
    }
}
