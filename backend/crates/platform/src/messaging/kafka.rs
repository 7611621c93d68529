//! Kafka transport (feature `kafka`)
//!
//! Producer sends with the envelope key and headers; consumer reads from the
//! earliest offset with auto-commit disabled and commits explicitly.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::ClientConfig;
use rdkafka::Message;
use rdkafka::TopicPartitionList;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{Header, Headers, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use super::{
    BrokerConfig, ConsumeError, Delivery, EventConsumer, EventEnvelope, EventPublisher,
    PublishError,
};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

pub struct KafkaPublisher {
    producer: FutureProducer,
}

impl KafkaPublisher {
    pub fn new(config: &BrokerConfig) -> Result<Self, PublishError> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("client.id", &config.client_id)
            .set("acks", "all")
            .create::<FutureProducer>()
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        Ok(Self { producer })
    }
}

#[async_trait]
impl EventPublisher for KafkaPublisher {
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), PublishError> {
        let mut headers = OwnedHeaders::new();
        for (key, value) in &envelope.headers {
            headers = headers.insert(Header {
                key: key.as_str(),
                value: Some(value.as_str()),
            });
        }

        let record = FutureRecord::to(&envelope.topic)
            .key(&envelope.key)
            .payload(&envelope.payload)
            .headers(headers);

        match self.producer.send(record, Timeout::After(SEND_TIMEOUT)).await {
            Ok((partition, offset)) => {
                tracing::debug!(topic = %envelope.topic, partition, offset, "Kafka message delivered");
                Ok(())
            }
            Err((e, _)) => Err(PublishError::Transport(e.to_string())),
        }
    }
}

pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    pub fn new(config: &BrokerConfig, topics: &[&str]) -> Result<Self, ConsumeError> {
        let consumer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("group.id", &config.group_id)
            .set("client.id", &config.client_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create::<StreamConsumer>()
            .map_err(|e| ConsumeError::Transport(e.to_string()))?;

        consumer
            .subscribe(topics)
            .map_err(|e| ConsumeError::Transport(e.to_string()))?;

        Ok(Self { consumer })
    }
}

#[async_trait]
impl EventConsumer for KafkaConsumer {
    async fn next(&self) -> Result<Option<Delivery>, ConsumeError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| ConsumeError::Transport(e.to_string()))?;

        let payload = match message.payload_view::<str>() {
            Some(Ok(text)) => text.to_string(),
            Some(Err(e)) => return Err(ConsumeError::Decode(e.to_string())),
            None => String::new(),
        };
        let key = match message.key_view::<str>() {
            Some(Ok(text)) => text.to_string(),
            _ => String::new(),
        };

        let mut headers = BTreeMap::new();
        if let Some(borrowed) = message.headers() {
            for header in borrowed.iter() {
                if let Some(value) = header.value.and_then(|v| std::str::from_utf8(v).ok()) {
                    headers.insert(header.key.to_string(), value.to_string());
                }
            }
        }

        Ok(Some(Delivery {
            envelope: EventEnvelope {
                topic: message.topic().to_string(),
                key,
                headers,
                payload,
            },
            partition: message.partition(),
            offset: message.offset(),
        }))
    }

    async fn commit(&self, delivery: &Delivery) -> Result<(), ConsumeError> {
        let mut positions = TopicPartitionList::new();
        positions
            .add_partition_offset(
                &delivery.envelope.topic,
                delivery.partition,
                rdkafka::Offset::Offset(delivery.offset + 1),
            )
            .map_err(|e| ConsumeError::Transport(e.to_string()))?;

        self.consumer
            .commit(&positions, CommitMode::Async)
            .map_err(|e| ConsumeError::Transport(e.to_string()))
    }
}
