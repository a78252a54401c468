use crate::{config::KafkaConfig, transform::BinaryPair, Error, Result};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{DeliveryFuture, FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use tracing::debug;

pub struct KafkaProducer {
    producer: FutureProducer,
}

impl KafkaProducer {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = client_config(config).create()?;

        Ok(Self { producer })
    }

    /// Sends one pair and waits for the broker's acknowledgement.
    pub async fn send(&self, topic: &str, pair: &BinaryPair) -> Result<()> {
        let record = FutureRecord::to(topic)
            .payload(&pair.value[..])
            .key(&pair.key[..]);

        let (partition, offset) = self
            .producer
            .send(record, Timeout::Never)
            .await
            .map_err(|(e, _)| Error::Kafka(e))?;

        debug!(topic, partition, offset, "Delivered message");
        Ok(())
    }

    /// Hands one pair to librdkafka without waiting for delivery.
    ///
    /// Returns `Ok(None)` when the local producer queue is full.
    pub fn enqueue(&self, topic: &str, pair: &BinaryPair) -> Result<Option<DeliveryFuture>> {
        let record = FutureRecord::to(topic)
            .payload(&pair.value[..])
            .key(&pair.key[..]);

        match self.producer.send_result(record) {
            Ok(delivery) => Ok(Some(delivery)),
            Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), _)) => Ok(None),
            Err((e, _)) => Err(Error::Kafka(e)),
        }
    }
}

pub(crate) fn client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", config.brokers.join(","))
        .set("compression.type", &config.compression)
        .set("acks", &config.acks)
        .set("linger.ms", config.linger_ms.to_string())
        .set("batch.size", config.batch_size.to_string())
        .set("message.timeout.ms", config.message_timeout_ms.to_string());

    for (key, value) in &config.producer_config_updates {
        client.set(key, value);
    }

    client
}
