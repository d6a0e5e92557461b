use crate::config::BusConfig;
use crate::trait_def::{NotificationEventBus, ProcessingResult};
use common::{EventBusError, EventEnvelope};
use rdkafka::{
    config::ClientConfig,
    consumer::{Consumer, StreamConsumer},
    producer::{FutureProducer, FutureRecord, Producer},
    util::Timeout,
    Message,
};
use std::{collections::HashMap, error::Error, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Kafka-backed implementation of [`NotificationEventBus`] over the three
/// priority topics. One producer is shared across all publishes; each
/// `subscribe` call spins up its own consumer and background poll loop.
pub struct KafkaEventBus {
    producer: Arc<FutureProducer>,
    config: BusConfig,
    consumers: Arc<RwLock<HashMap<String, Arc<StreamConsumer>>>>,
    shutdown_signal: Arc<tokio::sync::watch::Sender<bool>>,
    shutdown_receiver: tokio::sync::watch::Receiver<bool>,
}

impl KafkaEventBus {
    pub async fn new(config: BusConfig) -> Result<Self, EventBusError> {
        info!("initializing kafka event bus with brokers: {}", config.bootstrap_servers);

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("security.protocol", &config.security_protocol)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("retries", "10")
            .set("retry.backoff.ms", "1000")
            .set("compression.type", "zstd")
            .set("batch.size", "65536")
            .set("linger.ms", "5")
            .set("queue.buffering.max.kbytes", "32768")
            .create()
            .map_err(|e| EventBusError::ProducerError(format!("failed to create producer: {e}")))?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        Ok(Self {
            producer: Arc::new(producer),
            config,
            consumers: Arc::new(RwLock::new(HashMap::new())),
            shutdown_signal: Arc::new(shutdown_tx),
            shutdown_receiver: shutdown_rx,
        })
    }

    fn create_consumer(&self, consumer_group: &str) -> Result<StreamConsumer, EventBusError> {
        ClientConfig::new()
            .set("bootstrap.servers", &self.config.bootstrap_servers)
            .set("security.protocol", &self.config.security_protocol)
            .set("group.id", consumer_group)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .set("session.timeout.ms", "30000")
            .set("heartbeat.interval.ms", "3000")
            .set("max.poll.interval.ms", "300000")
            .set("fetch.min.bytes", "1024")
            .set("fetch.max.wait.ms", "500")
            .set("max.partition.fetch.bytes", "1048576")
            .create()
            .map_err(|e| EventBusError::ConsumerError(format!("failed to create consumer: {e}")))
    }
}

impl Clone for KafkaEventBus {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer.clone(),
            config: self.config.clone(),
            consumers: self.consumers.clone(),
            shutdown_signal: self.shutdown_signal.clone(),
            shutdown_receiver: self.shutdown_receiver.clone(),
        }
    }
}

impl NotificationEventBus for KafkaEventBus {
    type Error = EventBusError;

    async fn publish(&self, envelope: EventEnvelope) -> Result<(), Self::Error> {
        let topic = envelope.topic();
        let key = envelope.partition_key();

        debug!("publishing event {} to topic {}", envelope.envelope_id, topic);

        let payload = serde_json::to_string(&envelope)
            .map_err(|e| EventBusError::SerializationError(format!("failed to serialize envelope: {e}")))?;

        let record = FutureRecord::to(topic).key(&key).payload(&payload);
        let timeout = Timeout::After(Duration::from_millis(self.config.timeout_ms));

        match self.producer.send(record, timeout).await {
            Ok(_) => {
                debug!("event {} published to {}", envelope.envelope_id, topic);
                Ok(())
            }
            Err((kafka_error, _)) => {
                error!("failed to publish event {}: {}", envelope.envelope_id, kafka_error);
                Err(EventBusError::ProducerError(format!("kafka send error: {kafka_error}")))
            }
        }
    }

    async fn subscribe<F>(&self, topic: &str, group_suffix: &str, handler: F) -> Result<(), Self::Error>
    where
        F: Fn(EventEnvelope) -> Result<ProcessingResult, Box<dyn Error + Send + Sync>> + Send + Sync + 'static,
    {
        let consumer_group = format!("{}-{}", self.config.consumer_group_id, group_suffix);
        info!("starting subscription to topic {} with group {}", topic, consumer_group);

        let consumer = Arc::new(self.create_consumer(&consumer_group)?);
        consumer
            .subscribe(&[topic])
            .map_err(|e| EventBusError::ConsumerError(format!("failed to subscribe to {topic}: {e}")))?;

        {
            let mut consumers = self.consumers.write().await;
            consumers.insert(consumer_group.clone(), consumer.clone());
        }

        let shutdown_rx = self.shutdown_receiver.clone();
        let topic = topic.to_string();

        tokio::spawn(async move {
            info!("consumer loop starting for topic {}", topic);
            loop {
                if shutdown_rx.has_changed().unwrap_or(false) && *shutdown_rx.borrow() {
                    info!("shutdown signal received for consumer {}", consumer_group);
                    break;
                }

                match consumer.recv().await {
                    Ok(message) => {
                        let Some(payload) = message.payload() else {
                            warn!("received empty message, skipping");
                            continue;
                        };

                        let envelope: EventEnvelope = match serde_json::from_slice(payload) {
                            Ok(envelope) => envelope,
                            Err(e) => {
                                error!("failed to deserialize envelope: {}", e);
                                let _ = consumer.commit_message(&message, rdkafka::consumer::CommitMode::Async);
                                continue;
                            }
                        };

                        let event_id = envelope.envelope_id;
                        let should_commit = match handler(envelope) {
                            Ok(ProcessingResult::Success) => {
                                debug!("event {} processed successfully", event_id);
                                true
                            }
                            Ok(ProcessingResult::RetryableError(msg)) => {
                                warn!("event {} failed retryably, leaving offset uncommitted: {}", event_id, msg);
                                false
                            }
                            Ok(ProcessingResult::PermanentError(msg)) => {
                                error!("event {} failed permanently: {}", event_id, msg);
                                true
                            }
                            Err(e) => {
                                error!("handler error for event {}, leaving offset uncommitted: {}", event_id, e);
                                false
                            }
                        };

                        if should_commit {
                            if let Err(e) = consumer.commit_message(&message, rdkafka::consumer::CommitMode::Async) {
                                error!("failed to commit offset: {}", e);
                            }
                        }
                    }
                    Err(e) => {
                        error!("error receiving message: {}", e);
                        tokio::time::sleep(Duration::from_millis(1000)).await;
                    }
                }
            }
            info!("consumer loop ended for topic {}", topic);
        });

        Ok(())
    }

    async fn health_check(&self) -> Result<(), Self::Error> {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let producer = self.producer.clone();
        let metadata_future = tokio::task::spawn_blocking(move || producer.client().fetch_metadata(None, timeout));

        match tokio::time::timeout(Duration::from_secs(10), metadata_future).await {
            Ok(Ok(Ok(_))) => Ok(()),
            Ok(Ok(Err(e))) => Err(EventBusError::ConsumerError(format!("health check failed: {e}"))),
            Ok(Err(e)) => Err(EventBusError::ConsumerError(format!("health check task failed: {e}"))),
            Err(_) => Err(EventBusError::TimeoutError),
        }
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        info!("shutting down kafka event bus");
        let _ = self.shutdown_signal.send(true);
        tokio::time::sleep(Duration::from_secs(2)).await;
        self.consumers.write().await.clear();
        Ok(())
    }
}
