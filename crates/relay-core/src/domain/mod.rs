//! Domain model (ids, messages, query shapes, errors).

pub mod errors;
pub mod ids;
pub mod message;

pub use self::errors::{PoolError, PublishError, RelayError, StoreError, TaskError};
pub use self::ids::MessageId;
pub use self::message::{Filter, Message, NewMessage, Pagination};
