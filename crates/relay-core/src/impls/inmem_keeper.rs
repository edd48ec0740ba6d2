//! InMemoryKeeper - 開発用の durable store
//!
//! SQL 実装と同じ振る舞いをメモリ上で再現します。
//! - insert で連番の ID を採番
//! - query は ID 順に filter → offset → limit
//! - `set_available(false)` で障害を再現できる

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::{Filter, Message, MessageId, NewMessage, Pagination, StoreError};
use crate::ports::MessageKeeper;

struct KeeperState {
    messages: BTreeMap<MessageId, Message>,
    next_id: i64,
}

pub struct InMemoryKeeper {
    state: Mutex<KeeperState>,
    available: AtomicBool,
    closed: AtomicBool,
}

impl InMemoryKeeper {
    pub fn new() -> Self {
        Self::with_messages(Vec::new())
    }

    /// Seed the store with rows that already exist (as if written by an earlier run).
    pub fn with_messages(messages: impl IntoIterator<Item = Message>) -> Self {
        let messages: BTreeMap<MessageId, Message> =
            messages.into_iter().map(|m| (m.id, m)).collect();
        let next_id = messages.keys().next_back().map_or(1, |id| id.get() + 1);
        Self {
            state: Mutex::new(KeeperState { messages, next_id }),
            available: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        }
    }

    /// Simulate an outage (`false`) or recovery (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Read a row directly, bypassing availability checks.
    pub fn get(&self, id: MessageId) -> Option<Message> {
        self.state().messages.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn state(&self) -> MutexGuard<'_, KeeperState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory keeper is offline".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryKeeper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageKeeper for InMemoryKeeper {
    async fn load_all(&self) -> Result<HashMap<MessageId, Message>, StoreError> {
        self.check()?;
        let state = self.state();
        Ok(state
            .messages
            .iter()
            .map(|(id, m)| (*id, m.clone()))
            .collect())
    }

    async fn insert(&self, message: NewMessage) -> Result<MessageId, StoreError> {
        self.check()?;
        let mut state = self.state();
        let id = MessageId::new(state.next_id);
        state.next_id += 1;
        state.messages.insert(id, Message::from_new(id, message));
        Ok(id)
    }

    async fn query(
        &self,
        filter: &Filter,
        pagination: &Pagination,
    ) -> Result<Vec<Message>, StoreError> {
        self.check()?;
        let state = self.state();
        let limit = pagination.limit.map_or(usize::MAX, |l| l as usize);
        Ok(state
            .messages
            .values()
            .filter(|m| filter.matches(m))
            .skip(pagination.offset as usize)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_processed(&self, ids: &[MessageId]) -> Result<(), StoreError> {
        self.check()?;
        let mut state = self.state();
        for id in ids {
            if let Some(message) = state.messages.get_mut(id) {
                message.mark_processed();
            }
        }
        Ok(())
    }

    async fn ping(&self) -> bool {
        self.check().is_ok()
    }

    async fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }
}
