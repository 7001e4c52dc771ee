//! Kafka event bus for outbox consumers.
//!
//! The producer requires all in-sync-replica acknowledgement before a send
//! counts as published, enables producer-side idempotence, and uses a
//! configurable compression codec. Messages are keyed by the partition key
//! the outbox derives, so per-document ordering holds within a partition.
//!
//! Consumers that cannot process a message republish it to a retry topic
//! with a scheduled-visibility timestamp; once a message exceeds its retry
//! budget it is forwarded to the dead-letter topic with full failure
//! context.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::engine::Engine;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use hermes::error::{Error, Result};
use hermes::outbox::{BusMessage, MessageBus};
use hermes::retry::{with_retry, RetryPolicy};

/// Default per-message retry budget before dead-lettering.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Kafka producer configuration.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Comma-separated bootstrap servers.
    pub bootstrap_servers: String,
    /// Topic receiving document change events.
    pub topic: String,
    /// Retry topic for scheduled redelivery.
    pub retry_topic: String,
    /// Dead-letter topic.
    pub dlq_topic: String,
    /// Kafka compression codec: none, gzip, snappy, lz4, zstd.
    pub compression_codec: String,
    /// Broker acknowledgement timeout per send.
    pub send_timeout: Duration,
    /// Transport-level retry budget (linear backoff, capped at 60s).
    pub transport_retries: u32,
    /// Base delay of the transport retry schedule.
    pub transport_retry_base: Duration,
    /// Per-message redelivery budget before the DLQ.
    pub max_retries: u32,
}

impl KafkaConfig {
    pub fn new(bootstrap_servers: impl Into<String>, topic: impl Into<String>) -> Self {
        let topic = topic.into();
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            retry_topic: format!("{topic}.retry"),
            dlq_topic: format!("{topic}.dlq"),
            topic,
            compression_codec: "zstd".to_string(),
            send_timeout: Duration::from_secs(30),
            transport_retries: 10,
            transport_retry_base: Duration::from_secs(1),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_compression(mut self, codec: impl Into<String>) -> Self {
        self.compression_codec = codec.into();
        self
    }

    pub fn with_retry_topic(mut self, topic: impl Into<String>) -> Self {
        self.retry_topic = topic.into();
        self
    }

    pub fn with_dlq_topic(mut self, topic: impl Into<String>) -> Self {
        self.dlq_topic = topic.into();
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Dead-letter payload carrying the failed message and its failure
/// context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    /// Base64 of the original message payload.
    pub original_payload_base64: String,
    pub error: String,
    pub source_topic: String,
    pub partition_key: String,
    pub attempts: u32,
    /// ISO 8601 timestamp of the failure.
    pub failed_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_uuid: Option<String>,
}

/// Kafka-backed [`MessageBus`].
pub struct KafkaEventBus {
    config: KafkaConfig,
    producer: FutureProducer,
    /// Schedule for retry-topic visibility: 1 minute doubling to a 2 hour
    /// cap.
    redelivery_schedule: RetryPolicy,
    transport_policy: RetryPolicy,
}

impl KafkaEventBus {
    /// Build the producer: `acks=all`, idempotence on, compression per
    /// config.
    pub fn new(config: KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("compression.codec", &config.compression_codec)
            .set("message.timeout.ms", "30000")
            .create()
            .map_err(|e| Error::internal(format!("failed to build Kafka producer: {e}")))?;
        let redelivery_schedule = RetryPolicy::exponential(config.max_retries)
            .with_initial_backoff(Duration::from_secs(60))
            .with_max_backoff(Duration::from_secs(7200));
        let transport_policy =
            RetryPolicy::linear(config.transport_retries, config.transport_retry_base)
                .with_max_backoff(Duration::from_secs(60));
        Ok(Self {
            config,
            producer,
            redelivery_schedule,
            transport_policy,
        })
    }

    /// Visibility delay applied before redelivery attempt `attempt`
    /// (1-based): `min(60s * 2^(n-1), 2h)`.
    #[must_use]
    pub fn redelivery_delay(&self, attempt: u32) -> Duration {
        self.redelivery_schedule.backoff_for_attempt(attempt)
    }

    async fn send_to(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
        headers: OwnedHeaders,
    ) -> Result<()> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload)
            .headers(headers);
        match self
            .producer
            .send(record, Timeout::After(self.config.send_timeout))
            .await
        {
            Ok((partition, offset)) => {
                debug!(topic, key, partition, offset, "message acknowledged");
                Ok(())
            }
            Err((err, _message)) => Err(Error::transient(format!(
                "Kafka send to '{topic}' failed: {err}"
            ))),
        }
    }

    fn headers_for(message: &BusMessage) -> OwnedHeaders {
        let mut headers = OwnedHeaders::new().insert(Header {
            key: "message_id",
            value: Some(&message.message_id.to_string()),
        });
        if let Some(uuid) = &message.document_uuid {
            headers = headers.insert(Header {
                key: "document_uuid",
                value: Some(&uuid.to_string()),
            });
        }
        headers
    }

    /// Republish a message to the retry topic with a scheduled-visibility
    /// timestamp for redelivery attempt `attempt`.
    pub async fn publish_retry(&self, message: &BusMessage, attempt: u32) -> Result<()> {
        if attempt > self.config.max_retries {
            return Err(Error::invalid_argument(format!(
                "attempt {attempt} exceeds the retry budget of {}",
                self.config.max_retries
            )));
        }
        let visible_at = chrono::Utc::now() + self.redelivery_delay(attempt);
        let payload = serde_json::to_vec(&message.payload)?;
        let headers = Self::headers_for(message)
            .insert(Header {
                key: "visible_at",
                value: Some(&visible_at.to_rfc3339()),
            })
            .insert(Header {
                key: "attempt",
                value: Some(&attempt.to_string()),
            });
        let topic = self.config.retry_topic.clone();
        with_retry(&self.transport_policy, || {
            let headers = headers.clone();
            let payload = payload.clone();
            let topic = topic.clone();
            async move {
                self.send_to(&topic, &message.partition_key, &payload, headers)
                    .await
            }
        })
        .await
    }

    /// Forward a message that exhausted its retry budget to the
    /// dead-letter topic.
    pub async fn publish_dead_letter(
        &self,
        message: &BusMessage,
        attempts: u32,
        reason: &str,
    ) -> Result<()> {
        let original = serde_json::to_vec(&message.payload)?;
        let letter = DeadLetter {
            original_payload_base64: BASE64.encode(&original),
            error: reason.to_string(),
            source_topic: self.config.topic.clone(),
            partition_key: message.partition_key.clone(),
            attempts,
            failed_at: chrono::Utc::now().to_rfc3339(),
            document_uuid: message.document_uuid.map(|u| u.to_string()),
        };
        warn!(
            partition_key = %message.partition_key,
            attempts,
            reason,
            "forwarding message to the dead-letter topic"
        );
        let payload = serde_json::to_vec(&letter)?;
        let headers = Self::headers_for(message);
        let topic = self.config.dlq_topic.clone();
        with_retry(&self.transport_policy, || {
            let headers = headers.clone();
            let payload = payload.clone();
            let topic = topic.clone();
            async move {
                self.send_to(&topic, &message.partition_key, &payload, headers)
                    .await
            }
        })
        .await
    }
}

#[async_trait]
impl MessageBus for KafkaEventBus {
    async fn publish(&self, message: BusMessage) -> Result<()> {
        let payload = serde_json::to_vec(&message.payload)?;
        let headers = Self::headers_for(&message);
        let topic = self.config.topic.clone();
        with_retry(&self.transport_policy, || {
            let headers = headers.clone();
            let payload = payload.clone();
            let topic = topic.clone();
            let key = message.partition_key.clone();
            async move { self.send_to(&topic, &key, &payload, headers).await }
        })
        .await
    }
}
