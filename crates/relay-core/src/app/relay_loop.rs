//! RelayScheduler - 未処理メッセージを broker に配送する周期ループ
//!
//! # フロー（1 tick ごと）
//! 1. MessageStore::query() で processed = false を batch_limit 件まで取得
//! 2. 各メッセージを Task にして TaskPool に投入（完了は待たない）
//! 3. publish に成功した task は results channel に ID を送る
//! 4. 前回までに届いた ID をまとめて MessageStore::batch_mark_processed()
//!
//! tick の合間に届いた ID は accumulator に溜めるだけで、store には書きません。
//! そのため cycle N で publish されたメッセージが processed になるのは早くても cycle N+1 です。
//!
//! # 失敗時
//! - query の失敗: ループ終了（再起動が復旧手段）
//! - publish の失敗: ログだけ。processed にならないので次の query で再送される
//! - batch update の失敗: ログだけ。ID は捨て、次の cycle で再 publish される（at-least-once）

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::config::RelayConfig;
use crate::domain::{Filter, Message, MessageId, Pagination, RelayError, TaskError};
use crate::ports::{MessageStore, Publisher, Task, TaskPool};

/// Owns the relay loop and its shutdown signal.
pub struct RelayScheduler {
    store: Arc<dyn MessageStore>,
    publisher: Arc<dyn Publisher>,
    pool: Arc<dyn TaskPool>,
    config: RelayConfig,
    shutdown_tx: watch::Sender<bool>,
    join: Option<JoinHandle<Result<(), RelayError>>>,
}

impl RelayScheduler {
    pub fn new(
        store: Arc<dyn MessageStore>,
        publisher: Arc<dyn Publisher>,
        pool: Arc<dyn TaskPool>,
        config: RelayConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            store,
            publisher,
            pool,
            config,
            shutdown_tx,
            join: None,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Spawn the background loop. Must be called inside a tokio runtime.
    ///
    /// A second call while a loop exists is ignored.
    pub fn start(&mut self) {
        if self.join.is_some() {
            warn!("relay scheduler already started");
            return;
        }

        self.shutdown_tx.send_replace(false);
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let relay = RelayLoop {
            store: Arc::clone(&self.store),
            publisher: Arc::clone(&self.publisher),
            pool: Arc::clone(&self.pool),
            poll_interval: self.config.poll_interval,
            batch_limit: self.config.batch_limit,
            results_tx,
            results_rx,
            shutdown_rx: self.shutdown_tx.subscribe(),
        };
        self.join = Some(tokio::spawn(relay.run()));
    }

    /// `true` while the loop task is alive.
    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|join| !join.is_finished())
    }

    /// Signal cancellation and wait for the loop to exit.
    ///
    /// Dispatched tasks are not awaited; their late results are dropped.
    /// Returns the error that terminated the loop, if any.
    pub async fn stop(&mut self) -> Result<(), RelayError> {
        self.shutdown_tx.send_replace(true);
        let Some(join) = self.join.take() else {
            return Ok(());
        };
        join.await.map_err(|err| RelayError::Join(err.to_string()))?
    }
}

/// State moved into the spawned loop task.
struct RelayLoop {
    store: Arc<dyn MessageStore>,
    publisher: Arc<dyn Publisher>,
    pool: Arc<dyn TaskPool>,
    poll_interval: Duration,
    batch_limit: u32,
    results_tx: mpsc::UnboundedSender<MessageId>,
    results_rx: mpsc::UnboundedReceiver<MessageId>,
    shutdown_rx: watch::Receiver<bool>,
}

impl RelayLoop {
    async fn run(mut self) -> Result<(), RelayError> {
        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            batch_limit = self.batch_limit,
            "relay scheduler started"
        );

        // first tick one interval from now, like a plain ticker
        let mut ticker = time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pending = BTreeSet::new();

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.changed() => {
                    info!(uncommitted = pending.len(), "relay scheduler stopped");
                    return Ok(());
                }
                Some(id) = self.results_rx.recv() => {
                    pending.insert(id);
                }
                _ = ticker.tick() => {
                    self.dispatch_unprocessed().await?;
                    self.commit(&mut pending).await;
                }
            }
        }
    }

    /// Query unprocessed messages and hand one publish task per message to the pool.
    async fn dispatch_unprocessed(&self) -> Result<usize, RelayError> {
        let messages = self
            .store
            .query(&Filter::unprocessed(), &Pagination::limit(self.batch_limit))
            .await
            .map_err(|err| {
                error!(error = %err, "unprocessed query failed; relay loop terminating");
                RelayError::Query(err)
            })?;

        let count = messages.len();
        for message in messages {
            self.pool.submit(self.publish_task(message))?;
        }
        if count > 0 {
            debug!(count, "dispatched publish tasks");
        }
        Ok(count)
    }

    fn publish_task(&self, message: Message) -> Task {
        let publisher = Arc::clone(&self.publisher);
        let results = self.results_tx.clone();
        Task::new(message, move |message| async move {
            let id = publisher.publish(&message).await.map_err(|err| {
                warn!(message_id = %message.id, error = %err, "publish failed; message stays unprocessed");
                TaskError::from(err)
            })?;
            // no receiver after shutdown; the message is retried on the next run
            let _ = results.send(id);
            Ok::<(), TaskError>(())
        })
    }

    /// One batched mark-processed call for everything accumulated so far.
    async fn commit(&self, pending: &mut BTreeSet<MessageId>) {
        if pending.is_empty() {
            return;
        }
        let ids: Vec<MessageId> = std::mem::take(pending).into_iter().collect();
        let count = ids.len();

        match self.store.batch_mark_processed(&ids).await {
            Ok(()) => info!(count, "marked messages processed"),
            Err(err) if err.is_mirror_miss() => {
                warn!(count, error = %err, "marked messages processed; mirror out of sync")
            }
            Err(err) => warn!(count, error = %err, "batch update failed; messages will be republished"),
        }
    }
}
