//! MessageKeeper port - durable store（正本, source of truth）
//!
//! SQL 実装はこのクレートの外に置きます。
//! 開発・テスト用には `impls::InMemoryKeeper` を使います。

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{Filter, Message, MessageId, NewMessage, Pagination, StoreError};

/// MessageKeeper は永続化されたメッセージの正本
///
/// # 設計原則
/// - 再起動をまたいで残るのはここだけ
/// - insert で ID を採番する
/// - `mark_processed` は存在しない ID を無視する（`WHERE id = ANY($1)` と同じ）
#[async_trait]
pub trait MessageKeeper: Send + Sync {
    /// 起動時に一度だけ呼ばれ、mirror を温める
    async fn load_all(&self) -> Result<HashMap<MessageId, Message>, StoreError>;

    async fn insert(&self, message: NewMessage) -> Result<MessageId, StoreError>;

    async fn query(
        &self,
        filter: &Filter,
        pagination: &Pagination,
    ) -> Result<Vec<Message>, StoreError>;

    async fn mark_processed(&self, ids: &[MessageId]) -> Result<(), StoreError>;

    async fn ping(&self) -> bool;

    /// Returns `true` if this call closed an open store.
    async fn close(&self) -> bool;
}
