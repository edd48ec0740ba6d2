//! Errors - エラー型と分類
//!
//! 関心ごとに enum を分けています。
//! - StoreError: durable store / mirror
//! - PublishError: broker への publish
//! - PoolError / TaskError: Task Pool とその中で動く task
//! - RelayError: relay loop の終了理由

use thiserror::Error;

use super::MessageId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("durable store unavailable: {0}")]
    Unavailable(String),

    #[error("durable store is closed")]
    Closed,

    /// The durable store committed the update, but these ids had no mirror entry.
    #[error("mirror has no entry for {} message(s): {missing:?}", missing.len())]
    MirrorMiss { missing: Vec<MessageId> },
}

impl StoreError {
    /// Mirror misses leave the durable side committed and are not fatal.
    pub fn is_mirror_miss(&self) -> bool {
        matches!(self, StoreError::MirrorMiss { .. })
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("broker rejected publish: {0}")]
    Broker(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("task pool is shut down")]
    Closed,
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Why the relay loop stopped with an error.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("unprocessed query failed: {0}")]
    Query(#[source] StoreError),

    #[error("failed to dispatch publish task: {0}")]
    Dispatch(#[from] PoolError),

    #[error("relay loop task failed: {0}")]
    Join(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_miss_lists_missing_ids() {
        let err = StoreError::MirrorMiss {
            missing: vec![MessageId::new(3), MessageId::new(9)],
        };
        assert!(err.is_mirror_miss());
        let msg = err.to_string();
        assert!(msg.contains("2 message(s)"));
        assert!(!StoreError::Closed.is_mirror_miss());
    }

    #[test]
    fn publish_error_converts_into_task_error() {
        let err: TaskError = PublishError::Broker("down".into()).into();
        assert_eq!(err.to_string(), "broker rejected publish: down");
    }
}
