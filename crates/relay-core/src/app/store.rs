//! ConsistencyStore - durable store + in-memory mirror
//!
//! # 書き込み順序
//! 1. durable store に書く（失敗したら mirror は触らない）
//! 2. 成功したら mirror のロックを取り、mirror だけを更新する
//!
//! ロックは mirror の更新中だけ保持し、durable store への往復中は保持しません。
//! 読み取り（query）は mirror ではなく durable store に直接問い合わせます。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{info, warn};

use super::status::MirrorCounts;
use crate::domain::{Filter, Message, MessageId, NewMessage, Pagination, StoreError};
use crate::ports::{MessageKeeper, MessageStore};

pub struct ConsistencyStore {
    keeper: Arc<dyn MessageKeeper>,
    mirror: Mutex<HashMap<MessageId, Message>>,
}

impl ConsistencyStore {
    /// Warm the mirror from the durable store (`load_all`).
    pub async fn open(keeper: Arc<dyn MessageKeeper>) -> Result<Self, StoreError> {
        let messages = keeper.load_all().await?;
        info!(messages = messages.len(), "mirror loaded from durable store");
        Ok(Self {
            keeper,
            mirror: Mutex::new(messages),
        })
    }

    /// Mirrored copy of a message, if present.
    pub fn get(&self, id: MessageId) -> Option<Message> {
        self.mirror().get(&id).cloned()
    }

    pub fn counts(&self) -> MirrorCounts {
        let mirror = self.mirror();
        let processed = mirror.values().filter(|m| m.processed).count();
        MirrorCounts {
            processed,
            unprocessed: mirror.len() - processed,
        }
    }

    pub async fn ping(&self) -> bool {
        self.keeper.ping().await
    }

    pub async fn close(&self) -> bool {
        self.keeper.close().await
    }

    fn mirror(&self) -> MutexGuard<'_, HashMap<MessageId, Message>> {
        self.mirror.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MessageStore for ConsistencyStore {
    async fn insert(&self, message: NewMessage) -> Result<MessageId, StoreError> {
        let id = self.keeper.insert(message.clone()).await.map_err(|err| {
            warn!(error = %err, "insert into durable store failed");
            err
        })?;

        self.mirror().insert(id, Message::from_new(id, message));
        Ok(id)
    }

    async fn query(
        &self,
        filter: &Filter,
        pagination: &Pagination,
    ) -> Result<Vec<Message>, StoreError> {
        self.keeper.query(filter, pagination).await.map_err(|err| {
            warn!(error = %err, "query against durable store failed");
            err
        })
    }

    async fn batch_mark_processed(&self, ids: &[MessageId]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }

        self.keeper.mark_processed(ids).await.map_err(|err| {
            warn!(error = %err, count = ids.len(), "batch update in durable store failed");
            err
        })?;

        let mut missing: Vec<MessageId> = {
            let mut mirror = self.mirror();
            ids.iter()
                .copied()
                .filter(|id| match mirror.get_mut(id) {
                    Some(message) => {
                        message.mark_processed();
                        false
                    }
                    None => true,
                })
                .collect()
        };

        if missing.is_empty() {
            return Ok(());
        }
        missing.sort_unstable();
        missing.dedup();
        warn!(?missing, "processed messages not found in mirror");
        Err(StoreError::MirrorMiss { missing })
    }
}
