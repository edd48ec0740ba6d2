//! InMemoryBroker - 開発用の broker
//!
//! publish されたものを記録するだけです。
//! `flaky(n)` で最初の n 回を失敗させ、リトライの挙動を確認できます。

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::PublishError;
use crate::ports::Broker;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRecord {
    pub topic: String,
    pub payload: Vec<u8>,
}

pub struct InMemoryBroker {
    published: Mutex<Vec<PublishedRecord>>,
    remaining_failures: AtomicU32,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::flaky(0)
    }

    /// Fail the first `failures` publishes, then accept everything.
    pub fn flaky(failures: u32) -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            remaining_failures: AtomicU32::new(failures),
        }
    }

    pub fn published(&self) -> Vec<PublishedRecord> {
        self.records().clone()
    }

    pub fn published_count(&self) -> usize {
        self.records().len()
    }

    fn records(&self) -> MutexGuard<'_, Vec<PublishedRecord>> {
        self.published.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        let failed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        if let Ok(left) = failed {
            return Err(PublishError::Broker(format!(
                "intentional failure (left={left})"
            )));
        }

        self.records().push(PublishedRecord {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_publishes() {
        let broker = InMemoryBroker::new();
        broker.publish("t", b"one").await.unwrap();
        broker.publish("t", b"two").await.unwrap();

        let published = broker.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].topic, "t");
        assert_eq!(published[1].payload, b"two".to_vec());
    }

    #[tokio::test]
    async fn flaky_broker_fails_first_n_publishes() {
        let broker = InMemoryBroker::flaky(2);

        assert!(broker.publish("t", b"x").await.is_err());
        assert!(broker.publish("t", b"x").await.is_err());
        broker.publish("t", b"x").await.unwrap();
        assert_eq!(broker.published_count(), 1);
    }
}
