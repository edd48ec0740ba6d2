//! MessageService - メッセージの受付と一覧
//!
//! relay とは独立した入口で、ConsistencyStore 経由で書き込みます。

use std::sync::Arc;

use tracing::info;

use crate::domain::{Filter, Message, MessageId, NewMessage, Pagination, StoreError};
use crate::ports::{Clock, MessageStore};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("message content must not be empty")]
    EmptyContent,
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct MessageService {
    store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
}

impl MessageService {
    pub fn new(store: Arc<dyn MessageStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Store a new unprocessed message stamped with the current time.
    pub async fn add_message(&self, content: impl Into<String>) -> Result<MessageId, ServiceError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(ServiceError::EmptyContent);
        }

        let id = self
            .store
            .insert(NewMessage::new(content, self.clock.now()))
            .await?;
        info!(message_id = %id, "message accepted");
        Ok(id)
    }

    pub async fn list_messages(
        &self,
        filter: &Filter,
        pagination: &Pagination,
    ) -> Result<Vec<Message>, ServiceError> {
        Ok(self.store.query(filter, pagination).await?)
    }

    pub async fn list_processed(&self, pagination: &Pagination) -> Result<Vec<Message>, ServiceError> {
        self.list_messages(&Filter::processed(), pagination).await
    }
}
