//! Status - mirror の状態集計

use serde::{Deserialize, Serialize};

/// Processed/unprocessed split of the in-memory mirror.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorCounts {
    pub processed: usize,
    pub unprocessed: usize,
}

impl MirrorCounts {
    pub fn total(&self) -> usize {
        self.processed + self.unprocessed
    }
}
