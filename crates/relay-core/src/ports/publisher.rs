//! Publisher port - Message を broker に載せる adapter の契約

use async_trait::async_trait;

use crate::domain::{Message, MessageId, PublishError};

/// Publisher はメッセージを serialize して broker に渡す
///
/// 成功時は publish したメッセージの ID を返します。
/// relay は at-least-once なので、同じメッセージが複数回 publish されることがあります。
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, message: &Message) -> Result<MessageId, PublishError>;
}
