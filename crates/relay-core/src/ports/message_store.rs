//! MessageStore port - relay と入口（HTTP 境界）が使う store の能力
//!
//! 本番では `app::ConsistencyStore`（durable store + mirror）が実装します。
//! テストでは記録用のラッパーなどに差し替えられます。

use async_trait::async_trait;

use crate::domain::{Filter, Message, MessageId, NewMessage, Pagination, StoreError};

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, message: NewMessage) -> Result<MessageId, StoreError>;

    async fn query(
        &self,
        filter: &Filter,
        pagination: &Pagination,
    ) -> Result<Vec<Message>, StoreError>;

    /// Mark every id processed. Ids are treated as a set.
    async fn batch_mark_processed(&self, ids: &[MessageId]) -> Result<(), StoreError>;
}
