//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: アプリケーションの構築とワイヤリング
//! - **ConsistencyStore**: durable store + in-memory mirror
//! - **RelayScheduler**: 未処理メッセージの周期配送（query→dispatch→batch commit）
//! - **BrokerPublisher**: Message を broker の topic に送る
//! - **MessageService**: メッセージの受付と一覧

pub mod builder;
pub mod config;
pub mod publisher;
pub mod relay_loop;
pub mod service;
pub mod status;
pub mod store;

// 主要な型を再エクスポート
pub use self::builder::{App, AppBuilder, BuildError};
pub use self::config::{RawRelayConfig, RelayConfig};
pub use self::publisher::BrokerPublisher;
pub use self::relay_loop::RelayScheduler;
pub use self::service::{MessageService, ServiceError};
pub use self::status::MirrorCounts;
pub use self::store::ConsistencyStore;
