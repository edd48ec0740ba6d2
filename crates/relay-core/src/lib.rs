//! relay-core
//!
//! Core building blocks for the outbox message relay.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（MessageId, Message, Filter, Pagination, errors）
//! - **ports**: 抽象化レイヤー（MessageKeeper, MessageStore, Broker, Publisher, TaskPool, Clock）
//! - **app**: アプリケーションロジック（builder, store, relay_loop, publisher, service, config）
//! - **impls**: 実装（InMemoryKeeper, InMemoryBroker, WorkerPool）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
