//! WorkerPool - tokio 上の固定数 worker による TaskPool 実装
//!
//! # 実装詳細
//! - 投入は unbounded mpsc（submit は決してブロックしない）
//! - worker は受信側を `Mutex` で共有し、1 件ずつ取り出して実行する
//! - 停止は watch channel で通知（実行中の task は強制キャンセルしない）
//! - task の panic は catch して記録し、worker 自体は生き残る

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use futures::FutureExt;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::domain::{PoolError, TaskError};
use crate::ports::{Task, TaskPool};

type SharedReceiver = Arc<Mutex<mpsc::UnboundedReceiver<Task>>>;

/// Worker pool handle.
/// - `request_shutdown()` で新しい task の取り出しを止める
/// - `shutdown_and_join()` で全 worker の終了を待てる
pub struct WorkerPool {
    task_tx: mpsc::UnboundedSender<Task>,
    shutdown_tx: watch::Sender<bool>,
    closed: AtomicBool,
    joins: StdMutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `n` workers (at least one). Must be called inside a tokio runtime.
    pub fn spawn(n: usize) -> Self {
        let n = n.max(1);
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tasks: SharedReceiver = Arc::new(Mutex::new(task_rx));

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let tasks = Arc::clone(&tasks);
            let rx = shutdown_rx.clone();
            joins.push(tokio::spawn(worker_loop(worker_id, tasks, rx)));
        }
        info!(workers = n, "worker pool started");

        Self {
            task_tx,
            shutdown_tx,
            closed: AtomicBool::new(false),
            joins: StdMutex::new(joins),
        }
    }

    /// Stop handing out tasks. In-flight tasks run to completion.
    pub fn request_shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.shutdown_tx.send_replace(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(&self) {
        self.request_shutdown();
        let joins = std::mem::take(&mut *self.joins.lock().unwrap_or_else(PoisonError::into_inner));
        for join in joins {
            let _ = join.await;
        }
        info!("worker pool stopped");
    }
}

impl TaskPool for WorkerPool {
    fn submit(&self, task: Task) -> Result<(), PoolError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PoolError::Closed);
        }
        self.task_tx.send(task).map_err(|_| PoolError::Closed)
    }
}

async fn worker_loop(
    worker_id: usize,
    tasks: SharedReceiver,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // 受信待ちは shutdown と競合させる
        let task = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            task = async { tasks.lock().await.recv().await } => task,
        };

        let Some(task) = task else {
            break;
        };

        let message_id = task.message_id();
        let result = AssertUnwindSafe(task.run())
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(TaskError::Panicked(panic_message(&*panic))));
        match result {
            Ok(()) => debug!(worker_id, message_id = %message_id, "task completed"),
            Err(err @ TaskError::Panicked(_)) => {
                error!(worker_id, message_id = %message_id, error = %err, "task panicked")
            }
            Err(err) => debug!(worker_id, message_id = %message_id, error = %err, "task failed"),
        }
    }
    debug!(worker_id, "worker exited");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
