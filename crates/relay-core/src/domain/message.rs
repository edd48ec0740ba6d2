//! Message records and the query shapes used to select them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MessageId;

/// A message as submitted by a client, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    pub fn new(content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            created_at,
        }
    }
}

/// A persisted message.
///
/// `processed` only ever moves from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub processed: bool,
}

impl Message {
    /// Build the stored form of `new` under the id the store assigned.
    pub fn from_new(id: MessageId, new: NewMessage) -> Self {
        Self {
            id,
            content: new.content,
            created_at: new.created_at,
            processed: false,
        }
    }

    pub fn mark_processed(&mut self) {
        self.processed = true;
    }
}

/// Optional predicate on the processed flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub processed: Option<bool>,
}

impl Filter {
    /// Matches every message.
    pub fn all() -> Self {
        Self { processed: None }
    }

    pub fn unprocessed() -> Self {
        Self {
            processed: Some(false),
        }
    }

    pub fn processed() -> Self {
        Self {
            processed: Some(true),
        }
    }

    pub fn matches(&self, message: &Message) -> bool {
        self.processed
            .is_none_or(|processed| message.processed == processed)
    }
}

/// Limit/offset window over a query result.
///
/// `limit: None` means no upper bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: u32) -> Self {
        Self { limit, offset }
    }

    /// First `limit` rows.
    pub fn limit(limit: u32) -> Self {
        Self::new(Some(limit), 0)
    }

    pub fn unbounded() -> Self {
        Self::default()
    }
}
