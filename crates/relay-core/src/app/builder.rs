//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # 起動時検証（Fail-fast）
//! - keeper / broker が未設定なら `MissingCollaborator`
//! - durable store に ping が通らなければ `StoreUnreachable`
//! - mirror の初期ロードに失敗したら `Store`
//!
//! どれか 1 つでも失敗したら scheduler も worker も起動しません。

use std::sync::Arc;

use tracing::{info, warn};

use super::config::RelayConfig;
use super::publisher::BrokerPublisher;
use super::relay_loop::RelayScheduler;
use super::service::MessageService;
use super::status::MirrorCounts;
use super::store::ConsistencyStore;
use crate::domain::{RelayError, StoreError};
use crate::impls::WorkerPool;
use crate::ports::{Broker, Clock, MessageKeeper, SystemClock};

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let mut app = AppBuilder::new()
///     .keeper(Arc::new(InMemoryKeeper::new()))
///     .broker(Arc::new(InMemoryBroker::new()))
///     .config(RelayConfig::from_env())
///     .build()
///     .await?;
/// app.start();
/// ```
pub struct AppBuilder {
    keeper: Option<Arc<dyn MessageKeeper>>,
    broker: Option<Arc<dyn Broker>>,
    clock: Arc<dyn Clock>,
    config: RelayConfig,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
    #[error("durable store did not answer ping")]
    StoreUnreachable,
    #[error("failed to load mirror: {0}")]
    Store(#[from] StoreError),
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            keeper: None,
            broker: None,
            clock: Arc::new(SystemClock),
            config: RelayConfig::default(),
        }
    }

    pub fn keeper(mut self, keeper: Arc<dyn MessageKeeper>) -> Self {
        self.keeper = Some(keeper);
        self
    }

    pub fn broker(mut self, broker: Arc<dyn Broker>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Verify collaborators, warm the mirror, then wire the pipeline.
    ///
    /// Must be called inside a tokio runtime (the worker pool spawns here).
    /// The scheduler is created stopped; call [`App::start`].
    pub async fn build(self) -> Result<App, BuildError> {
        let keeper = self.keeper.ok_or(BuildError::MissingCollaborator("keeper"))?;
        let broker = self.broker.ok_or(BuildError::MissingCollaborator("broker"))?;

        if !keeper.ping().await {
            return Err(BuildError::StoreUnreachable);
        }
        let store = Arc::new(ConsistencyStore::open(keeper).await?);

        let pool = Arc::new(WorkerPool::spawn(self.config.workers));
        let publisher = Arc::new(BrokerPublisher::new(broker, self.config.topic.clone()));
        let service = MessageService::new(store.clone(), self.clock);
        let scheduler = RelayScheduler::new(store.clone(), publisher, pool.clone(), self.config);

        info!(
            topic = %scheduler.config().topic,
            workers = scheduler.config().workers,
            "relay app built"
        );
        Ok(App {
            store,
            service,
            scheduler,
            pool,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wired relay: store, ingestion service, scheduler and worker pool.
pub struct App {
    pub store: Arc<ConsistencyStore>,
    pub service: MessageService,
    scheduler: RelayScheduler,
    pool: Arc<WorkerPool>,
}

impl App {
    pub fn start(&mut self) {
        self.scheduler.start();
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn counts(&self) -> MirrorCounts {
        self.store.counts()
    }

    /// Stop the scheduler, drain the worker pool, then close the durable store.
    ///
    /// The store is closed even when the loop had already terminated with an error;
    /// that error is returned afterwards.
    pub async fn shutdown(mut self) -> Result<(), RelayError> {
        let stopped = self.scheduler.stop().await;
        self.pool.shutdown_and_join().await;
        if !self.store.close().await {
            warn!("durable store was already closed");
        }
        info!(counts = ?self.store.counts(), "relay app shut down");
        stopped
    }
}
