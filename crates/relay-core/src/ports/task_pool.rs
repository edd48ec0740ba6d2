//! TaskPool port - 並行実行プール
//!
//! Task は「メッセージ + 作業クロージャ」の組です。
//! プールは投入順に関係なく、限られた数の worker で並行に実行します。
//!
//! # 契約
//! - `submit` は実行完了を待たない（fire-and-forget）
//! - 1 つの task の失敗は他の task に影響しない
//! - 完了通知は task 自身の副作用（results channel への送信など）で行う

use std::fmt;
use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::domain::{Message, MessageId, PoolError, TaskError};

pub type TaskFuture = BoxFuture<'static, Result<(), TaskError>>;

type Work = Box<dyn FnOnce(Message) -> TaskFuture + Send>;

/// One unit of work bound to the message it operates on.
pub struct Task {
    message: Message,
    work: Work,
}

impl Task {
    pub fn new<F, Fut>(message: Message, work: F) -> Self
    where
        F: FnOnce(Message) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self {
            message,
            work: Box::new(move |message| work(message).boxed()),
        }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn message_id(&self) -> MessageId {
        self.message.id
    }

    /// Consume the task and run its work on the wrapped message.
    pub async fn run(self) -> Result<(), TaskError> {
        (self.work)(self.message).await
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("message_id", &self.message.id)
            .finish_non_exhaustive()
    }
}

pub trait TaskPool: Send + Sync {
    fn submit(&self, task: Task) -> Result<(), PoolError>;
}
