//! BrokerPublisher - Message を JSON にして broker の topic に送る adapter

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{Message, MessageId, PublishError};
use crate::ports::{Broker, Publisher};

pub struct BrokerPublisher {
    broker: Arc<dyn Broker>,
    topic: String,
}

impl BrokerPublisher {
    pub fn new(broker: Arc<dyn Broker>, topic: impl Into<String>) -> Self {
        Self {
            broker,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl Publisher for BrokerPublisher {
    async fn publish(&self, message: &Message) -> Result<MessageId, PublishError> {
        let payload = serde_json::to_vec(message)?;
        self.broker.publish(&self.topic, &payload).await?;
        debug!(message_id = %message.id, topic = %self.topic, bytes = payload.len(), "message published");
        Ok(message.id)
    }
}
