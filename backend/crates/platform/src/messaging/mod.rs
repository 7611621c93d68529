//! Domain Event Messaging
//!
//! Broker-neutral publish/consume contracts plus two transports:
//! - [`memory::InMemoryBus`]: in-process channels, the default
//! - `kafka` (feature `kafka`): `rdkafka` producer and consumer
//!
//! An [`EventEnvelope`] is keyed and addressed by the event name and carries
//! `event-type`, `timestamp` and `source` headers.

pub mod memory;

#[cfg(feature = "kafka")]
pub mod kafka;

pub use memory::{InMemoryBus, InMemoryConsumer};

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use kernel::error::app_error::AppError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Value of the `source` header on every published envelope
pub const EVENT_SOURCE: &str = "LearnLanguage.API";

pub const HEADER_EVENT_TYPE: &str = "event-type";
pub const HEADER_TIMESTAMP: &str = "timestamp";
pub const HEADER_SOURCE: &str = "source";

/// A domain event with a stable wire name
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync {
    /// Topic, key and `event-type` header value
    const NAME: &'static str;
}

/// Transport-level message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEnvelope {
    pub topic: String,
    pub key: String,
    pub headers: BTreeMap<String, String>,
    pub payload: String,
}

impl EventEnvelope {
    pub fn from_event<E: DomainEvent>(event: &E) -> Result<Self, PublishError> {
        let payload = serde_json::to_string(event).map_err(|e| PublishError::Encode(e.to_string()))?;

        let mut headers = BTreeMap::new();
        headers.insert(HEADER_EVENT_TYPE.to_string(), E::NAME.to_string());
        headers.insert(HEADER_TIMESTAMP.to_string(), Utc::now().to_rfc3339());
        headers.insert(HEADER_SOURCE.to_string(), EVENT_SOURCE.to_string());

        Ok(Self {
            topic: E::NAME.to_string(),
            key: E::NAME.to_string(),
            headers,
            payload,
        })
    }

    pub fn event_type(&self) -> Option<&str> {
        self.headers.get(HEADER_EVENT_TYPE).map(String::as_str)
    }

    pub fn decode<E: DomainEvent>(&self) -> Result<E, ConsumeError> {
        serde_json::from_str(&self.payload).map_err(|e| ConsumeError::Decode(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("Event could not be encoded: {0}")]
    Encode(String),

    #[error("Broker rejected the event: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsumeError {
    #[error("Event could not be decoded: {0}")]
    Decode(String),

    #[error("Broker failure: {0}")]
    Transport(String),
}

impl From<PublishError> for AppError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::Encode(_) => AppError::internal("Event encoding failed").with_source(err),
            PublishError::Transport(_) => {
                AppError::service_unavailable("Message broker unavailable").with_source(err)
            }
        }
    }
}

/// One received message plus the broker position needed to commit it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub envelope: EventEnvelope,
    pub partition: i32,
    pub offset: i64,
}

#[async_trait]
pub trait EventPublisher: Send + Sync + 'static {
    /// Single attempt; failures are returned, never retried here
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), PublishError>;
}

#[async_trait]
pub trait EventConsumer: Send + Sync + 'static {
    /// Next delivery, or `None` once the stream is closed
    async fn next(&self) -> Result<Option<Delivery>, ConsumeError>;

    /// Acknowledge a delivery so it is not redelivered
    async fn commit(&self, delivery: &Delivery) -> Result<(), ConsumeError>;
}

/// Encode and publish `event`, logging failures before returning them
pub async fn publish_event<E: DomainEvent>(
    publisher: &dyn EventPublisher,
    event: &E,
) -> Result<(), PublishError> {
    let envelope = match EventEnvelope::from_event(event) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::error!(event = E::NAME, error = %e, "Failed to encode event");
            return Err(e);
        }
    };

    match publisher.publish(envelope).await {
        Ok(()) => {
            tracing::info!(event = E::NAME, "Event published");
            Ok(())
        }
        Err(e) => {
            tracing::error!(event = E::NAME, error = %e, "Failed to publish event");
            Err(e)
        }
    }
}

/// Broker settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub enabled: bool,
    pub bootstrap_servers: String,
    pub client_id: String,
    pub group_id: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bootstrap_servers: "localhost:9092".to_string(),
            client_id: EVENT_SOURCE.to_string(),
            group_id: "LearnLanguage.Consumer".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Pinged {
        n: u32,
    }

    impl DomainEvent for Pinged {
        const NAME: &'static str = "Pinged";
    }

    #[test]
    fn test_envelope_is_keyed_by_event_name() {
        let envelope = EventEnvelope::from_event(&Pinged { n: 1 }).unwrap();
        assert_eq!(envelope.topic, "Pinged");
        assert_eq!(envelope.key, "Pinged");
        assert_eq!(envelope.event_type(), Some("Pinged"));
        assert_eq!(envelope.headers[HEADER_SOURCE], EVENT_SOURCE);
        assert!(chrono::DateTime::parse_from_rfc3339(&envelope.headers[HEADER_TIMESTAMP]).is_ok());
        assert_eq!(envelope.decode::<Pinged>().unwrap(), Pinged { n: 1 });
    }

    struct BrokenPublisher;

    #[async_trait]
    impl EventPublisher for BrokenPublisher {
        async fn publish(&self, _envelope: EventEnvelope) -> Result<(), PublishError> {
            Err(PublishError::Transport("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_publish_failure_is_returned() {
        let result = publish_event(&BrokenPublisher, &Pinged { n: 2 }).await;
        assert!(matches!(result, Err(PublishError::Transport(_))));
    }
}
