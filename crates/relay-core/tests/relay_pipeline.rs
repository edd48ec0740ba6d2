//! End-to-end relay behaviour over the in-memory keeper.

use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;

use relay_core::app::{AppBuilder, ConsistencyStore, RelayConfig, RelayScheduler};
use relay_core::domain::{
    Filter, Message, MessageId, NewMessage, Pagination, PublishError, RelayError, StoreError,
};
use relay_core::impls::{InMemoryBroker, InMemoryKeeper, WorkerPool};
use relay_core::ports::{Broker, MessageKeeper, MessageStore, Publisher};

const POLL: Duration = Duration::from_millis(20);

/// Wraps the real store and records every batch update it forwards.
struct RecordingStore {
    inner: ConsistencyStore,
    batches: Mutex<Vec<Vec<MessageId>>>,
    queries: AtomicUsize,
    fail_next_batch: AtomicBool,
}

impl RecordingStore {
    async fn open(keeper: Arc<InMemoryKeeper>) -> Self {
        Self {
            inner: ConsistencyStore::open(keeper).await.unwrap(),
            batches: Mutex::new(Vec::new()),
            queries: AtomicUsize::new(0),
            fail_next_batch: AtomicBool::new(false),
        }
    }

    fn batches(&self) -> Vec<Vec<MessageId>> {
        self.batches.lock().unwrap().clone()
    }

    fn committed(&self) -> BTreeSet<MessageId> {
        self.batches().concat().into_iter().collect()
    }
}

#[async_trait]
impl MessageStore for RecordingStore {
    async fn insert(&self, message: NewMessage) -> Result<MessageId, StoreError> {
        self.inner.insert(message).await
    }

    async fn query(
        &self,
        filter: &Filter,
        pagination: &Pagination,
    ) -> Result<Vec<Message>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query(filter, pagination).await
    }

    async fn batch_mark_processed(&self, ids: &[MessageId]) -> Result<(), StoreError> {
        if self.fail_next_batch.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected batch failure".into()));
        }
        self.batches.lock().unwrap().push(ids.to_vec());
        self.inner.batch_mark_processed(ids).await
    }
}

/// Broker that rejects messages whose content is in the failing set.
#[derive(Default)]
struct ScriptedBroker {
    failing: Mutex<HashSet<String>>,
    attempts: Mutex<Vec<MessageId>>,
    delivered: Mutex<Vec<MessageId>>,
}

impl ScriptedBroker {
    fn failing(contents: &[&str]) -> Self {
        Self {
            failing: Mutex::new(contents.iter().map(|c| c.to_string()).collect()),
            ..Default::default()
        }
    }

    fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn attempts_for(&self, id: MessageId) -> usize {
        self.attempts.lock().unwrap().iter().filter(|a| **a == id).count()
    }

    fn delivered(&self) -> Vec<MessageId> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Broker for ScriptedBroker {
    async fn publish(&self, _topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        let message: Message = serde_json::from_slice(payload)?;
        self.attempts.lock().unwrap().push(message.id);
        if self.failing.lock().unwrap().contains(&message.content) {
            return Err(PublishError::Broker(format!("rejected {}", message.content)));
        }
        self.delivered.lock().unwrap().push(message.id);
        Ok(())
    }
}

struct Harness {
    keeper: Arc<InMemoryKeeper>,
    store: Arc<RecordingStore>,
    broker: Arc<ScriptedBroker>,
    pool: Arc<WorkerPool>,
    scheduler: RelayScheduler,
}

impl Harness {
    async fn new(broker: ScriptedBroker, config: RelayConfig) -> Self {
        let keeper = Arc::new(InMemoryKeeper::new());
        let store = Arc::new(RecordingStore::open(keeper.clone()).await);
        let broker = Arc::new(broker);
        let pool = Arc::new(WorkerPool::spawn(config.workers));
        let publisher: Arc<dyn Publisher> = Arc::new(relay_core::app::BrokerPublisher::new(
            broker.clone(),
            config.topic.clone(),
        ));
        let scheduler = RelayScheduler::new(store.clone(), publisher, pool.clone(), config);
        Self {
            keeper,
            store,
            broker,
            pool,
            scheduler,
        }
    }

    async fn add(&self, content: &str) -> MessageId {
        self.store
            .insert(NewMessage::new(content, Utc::now()))
            .await
            .unwrap()
    }

    fn processed(&self, id: MessageId) -> bool {
        self.keeper.get(id).is_some_and(|m| m.processed)
    }

    async fn stop(mut self) -> Result<(), RelayError> {
        let result = self.scheduler.stop().await;
        self.pool.shutdown_and_join().await;
        result
    }
}

fn config() -> RelayConfig {
    RelayConfig::default()
        .with_poll_interval(POLL)
        .with_workers(4)
        .with_topic("test_topic")
}

async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

async fn cycles(n: u32) {
    tokio::time::sleep(POLL * n).await;
}

async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("completes within timeout")
}

#[tokio::test]
async fn every_message_is_published_then_marked_processed() {
    let mut h = Harness::new(ScriptedBroker::default(), config()).await;
    let ids = vec![h.add("a").await, h.add("b").await, h.add("c").await];

    h.scheduler.start();
    eventually("all messages processed", || ids.iter().all(|id| h.processed(*id))).await;

    let delivered: BTreeSet<MessageId> = h.broker.delivered().into_iter().collect();
    assert_eq!(delivered, ids.iter().copied().collect());
    for id in &ids {
        assert!(h.store.inner.get(*id).unwrap().processed, "mirror flipped for {id}");
    }
    within(h.stop()).await.unwrap();
}

#[tokio::test]
async fn failed_publish_is_retried_until_it_succeeds() {
    let mut h = Harness::new(ScriptedBroker::failing(&["b"]), config()).await;
    let a = h.add("a").await;
    let b = h.add("b").await;

    h.scheduler.start();
    eventually("a processed", || h.processed(a)).await;
    eventually("b retried", || h.broker.attempts_for(b) >= 2).await;
    assert!(!h.processed(b));
    assert!(!h.store.committed().contains(&b));

    h.broker.heal();
    eventually("b processed after recovery", || h.processed(b)).await;
    within(h.stop()).await.unwrap();
}

#[tokio::test]
async fn empty_store_never_issues_batch_updates() {
    let mut h = Harness::new(ScriptedBroker::default(), config()).await;

    h.scheduler.start();
    eventually("a few polls", || h.store.queries.load(Ordering::SeqCst) >= 3).await;

    assert!(h.store.batches().is_empty());
    assert!(h.broker.delivered().is_empty());
    within(h.stop()).await.unwrap();
}

#[tokio::test]
async fn fifty_messages_are_all_committed() {
    let mut h = Harness::new(ScriptedBroker::default(), config().with_workers(8)).await;
    let mut ids = BTreeSet::new();
    for i in 0..50 {
        ids.insert(h.add(&format!("m{i}")).await);
    }

    h.scheduler.start();
    eventually("all 50 processed", || ids.iter().all(|id| h.processed(*id))).await;

    assert_eq!(h.store.committed(), ids);
    within(h.stop()).await.unwrap();
}

#[tokio::test]
async fn batch_limit_caps_each_query() {
    let mut h = Harness::new(ScriptedBroker::default(), config().with_batch_limit(5)).await;
    let mut ids = Vec::new();
    for i in 0..12 {
        ids.push(h.add(&format!("m{i}")).await);
    }

    h.scheduler.start();
    eventually("all processed in several cycles", || ids.iter().all(|id| h.processed(*id))).await;

    assert!(h.store.batches().iter().all(|batch| batch.len() <= 5));
    within(h.stop()).await.unwrap();
}

#[tokio::test]
async fn failed_batch_update_leads_to_republish() {
    let mut h = Harness::new(ScriptedBroker::default(), config()).await;
    let a = h.add("a").await;
    h.store.fail_next_batch.store(true, Ordering::SeqCst);

    h.scheduler.start();
    eventually("a processed", || h.processed(a)).await;

    assert!(!h.store.fail_next_batch.load(Ordering::SeqCst));
    assert!(h.broker.delivered().iter().filter(|id| **id == a).count() >= 2);
    assert_eq!(h.store.committed(), BTreeSet::from([a]));
    within(h.stop()).await.unwrap();
}

#[tokio::test]
async fn query_failure_terminates_the_loop() {
    let mut h = Harness::new(ScriptedBroker::default(), config()).await;
    h.keeper.set_available(false);

    h.scheduler.start();
    eventually("loop exit", || !h.scheduler.is_running()).await;

    let err = within(h.stop()).await.unwrap_err();
    assert!(matches!(err, RelayError::Query(StoreError::Unavailable(_))));
}

#[tokio::test]
async fn second_start_does_not_spawn_another_loop() {
    let mut h = Harness::new(ScriptedBroker::default(), config()).await;
    let started = Instant::now();
    h.scheduler.start();
    h.scheduler.start();
    cycles(10).await;

    // one loop polls at most once per interval
    let queries = h.store.queries.load(Ordering::SeqCst) as u128;
    let max_ticks = started.elapsed().as_millis() / POLL.as_millis();
    assert!(queries >= 1);
    assert!(queries <= max_ticks + 1, "{queries} queries in {max_ticks} intervals");
    within(h.stop()).await.unwrap();
}

#[tokio::test]
async fn stop_halts_polling() {
    let mut h = Harness::new(ScriptedBroker::default(), config()).await;
    h.scheduler.start();
    eventually("first poll", || h.store.queries.load(Ordering::SeqCst) >= 1).await;

    h.scheduler.stop().await.unwrap();
    let after_stop = h.store.queries.load(Ordering::SeqCst);
    cycles(5).await;
    assert_eq!(h.store.queries.load(Ordering::SeqCst), after_stop);
    h.pool.shutdown_and_join().await;
}

#[tokio::test]
async fn app_relays_messages_added_through_the_service() {
    let keeper = Arc::new(InMemoryKeeper::new());
    let broker = Arc::new(InMemoryBroker::flaky(2));
    let mut app = AppBuilder::new()
        .keeper(keeper.clone())
        .broker(broker.clone())
        .config(config())
        .build()
        .await
        .unwrap();

    app.start();
    let first = app.service.add_message("first").await.unwrap();
    let second = app.service.add_message("second").await.unwrap();

    eventually("mirror fully processed", || app.counts().unprocessed == 0 && app.counts().processed == 2).await;
    assert!(broker.published().iter().all(|r| r.topic == "test_topic"));
    assert!(broker.published_count() >= 2);

    let processed = app.service.list_processed(&Pagination::unbounded()).await.unwrap();
    let processed: Vec<MessageId> = processed.into_iter().map(|m| m.id).collect();
    assert_eq!(processed, vec![first, second]);

    within(app.shutdown()).await.unwrap();
    assert!(!keeper.ping().await);
}
