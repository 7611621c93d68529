//! In-process event bus
//!
//! One unbounded channel per topic. Messages published before anyone
//! subscribes are buffered; each topic has a single consumer, matching a
//! single consumer group on a real broker.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use super::{ConsumeError, Delivery, EventConsumer, EventEnvelope, EventPublisher, PublishError};

struct TopicChannel {
    sender: mpsc::UnboundedSender<Delivery>,
    receiver: Option<mpsc::UnboundedReceiver<Delivery>>,
    next_offset: i64,
}

impl TopicChannel {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Some(receiver),
            next_offset: 0,
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryBus {
    topics: Arc<Mutex<HashMap<String, TopicChannel>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the consumer side of `topic`
    ///
    /// Returns `None` if the topic already has a consumer.
    pub async fn subscribe(&self, topic: &str) -> Option<InMemoryConsumer> {
        let mut topics = self.topics.lock().await;
        let channel = topics.entry(topic.to_string()).or_insert_with(TopicChannel::new);
        let receiver = channel.receiver.take()?;
        Some(InMemoryConsumer {
            receiver: Mutex::new(receiver),
        })
    }

    /// Drop every sender so consumers see the end of the stream
    pub async fn close(&self) {
        self.topics.lock().await.clear();
    }
}

#[async_trait]
impl EventPublisher for InMemoryBus {
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), PublishError> {
        let mut topics = self.topics.lock().await;
        let channel = topics
            .entry(envelope.topic.clone())
            .or_insert_with(TopicChannel::new);

        let delivery = Delivery {
            envelope,
            partition: 0,
            offset: channel.next_offset,
        };
        channel.next_offset += 1;

        channel
            .sender
            .send(delivery)
            .map_err(|_| PublishError::Transport("in-memory consumer dropped".to_string()))
    }
}

pub struct InMemoryConsumer {
    receiver: Mutex<mpsc::UnboundedReceiver<Delivery>>,
}

#[async_trait]
impl EventConsumer for InMemoryConsumer {
    async fn next(&self) -> Result<Option<Delivery>, ConsumeError> {
        Ok(self.receiver.lock().await.recv().await)
    }

    async fn commit(&self, delivery: &Delivery) -> Result<(), ConsumeError> {
        tracing::trace!(
            topic = %delivery.envelope.topic,
            offset = delivery.offset,
            "In-memory delivery committed"
        );
        Ok(())
    }
}
