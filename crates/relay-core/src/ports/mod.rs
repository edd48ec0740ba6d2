//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（PostgreSQL, Kafka など）や並行実行基盤への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - durable store（MessageKeeper）が source of truth（正本）
//! - mirror は relay 実行中の processed 状態のコピー
//! - broker には JSON バイト列だけを渡す

pub mod broker;
pub mod clock;
pub mod keeper;
pub mod message_store;
pub mod publisher;
pub mod task_pool;

// 主要な trait を再エクスポート
pub use self::broker::Broker;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::keeper::MessageKeeper;
pub use self::message_store::MessageStore;
pub use self::publisher::Publisher;
pub use self::task_pool::{Task, TaskFuture, TaskPool};
