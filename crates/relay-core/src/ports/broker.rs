//! Broker port - 外部ブローカーへの送信
//!
//! wire transport（Kafka など）はこのクレートの外の話です。

use async_trait::async_trait;

use crate::domain::PublishError;

/// Broker は topic にバイト列を渡すだけの最小インターフェース
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;
}
