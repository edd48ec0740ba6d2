//! Impls - 実装（開発用・テスト用 + tokio worker pool）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryKeeper**: 開発用の durable store
//! - **InMemoryBroker**: publish を記録するだけの broker
//! - **WorkerPool**: 固定数 worker の TaskPool
//!
//! # 本番用実装
//! SQL の durable store や Kafka の broker は別クレートに置く想定です。

pub mod inmem_broker;
pub mod inmem_keeper;
pub mod worker_pool;

// 主要な型を再エクスポート
pub use self::inmem_broker::{InMemoryBroker, PublishedRecord};
pub use self::inmem_keeper::InMemoryKeeper;
pub use self::worker_pool::WorkerPool;
