//! Single-process driver around the error-isolating transform.
//!
//! [`WritePipeline`] reads newline-delimited JSON records, runs each through
//! an [`ErrorIsolatingTransform`] and routes the two output kinds over
//! bounded channels: pairs to a [`PairSink`], error records to an optional
//! [`DeadLetterWriter`].

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use rdkafka::producer::DeliveryFuture;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::kafka::KafkaProducer;
use crate::mapper::{encode_json, RecordSerializer};
use crate::schema::{record_from_json, Record, Schema};
use crate::transform::{BinaryPair, ErrorIsolatingTransform, Routed};
use crate::{Error, Result};

/// Destination for successfully mapped pairs.
pub trait PairSink {
    fn publish(&mut self, pair: BinaryPair) -> impl Future<Output = Result<()>>;

    fn flush(&mut self) -> impl Future<Output = Result<()>>;
}

/// Publishes pairs to a single Kafka topic.
///
/// Up to `max_in_flight` pairs wait for their delivery report at once. The
/// first failed delivery fails the sink.
pub struct KafkaSink {
    producer: KafkaProducer,
    topic: String,
    in_flight: FuturesUnordered<DeliveryFuture>,
    max_in_flight: usize,
    delivered: u64,
}

const DEFAULT_MAX_IN_FLIGHT: usize = 1000;

impl KafkaSink {
    pub fn new(producer: KafkaProducer, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
            in_flight: FuturesUnordered::new(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            delivered: 0,
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Pairs handed to librdkafka whose delivery report is still pending.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Pairs acknowledged by the broker.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    async fn await_next_delivery(&mut self) -> Result<()> {
        match self.in_flight.next().await {
            Some(Ok(Ok((partition, offset)))) => {
                self.delivered += 1;
                debug!(topic = %self.topic, partition, offset, "Delivered message");
                Ok(())
            }
            Some(Ok(Err((e, _)))) => Err(Error::Kafka(e)),
            Some(Err(_)) => Err(Error::ChannelClosed("delivery report".to_string())),
            None => Ok(()),
        }
    }
}

impl PairSink for KafkaSink {
    async fn publish(&mut self, pair: BinaryPair) -> Result<()> {
        while self.in_flight.len() >= self.max_in_flight {
            self.await_next_delivery().await?;
        }

        loop {
            match self.producer.enqueue(&self.topic, &pair)? {
                Some(delivery) => {
                    self.in_flight.push(delivery);
                    return Ok(());
                }
                None if self.in_flight.is_empty() => {
                    tokio::time::sleep(Duration::from_millis(10)).await
                }
                None => self.await_next_delivery().await?,
            }
        }
    }

    async fn flush(&mut self) -> Result<()> {
        while !self.in_flight.is_empty() {
            self.await_next_delivery().await?;
        }
        Ok(())
    }
}

/// Writes each value followed by a newline. Keys are dropped.
pub struct WriterSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Unpin> PairSink for WriterSink<W> {
    async fn publish(&mut self, pair: BinaryPair) -> Result<()> {
        self.writer.write_all(&pair.value).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

impl PairSink for Vec<BinaryPair> {
    async fn publish(&mut self, pair: BinaryPair) -> Result<()> {
        self.push(pair);
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Appends error records as JSON lines.
pub struct DeadLetterWriter<W> {
    writer: W,
    written: u64,
}

impl DeadLetterWriter<BufWriter<File>> {
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .await?;

        info!("Writing dead letters to {:?}", path.as_ref());
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: AsyncWrite + Unpin> DeadLetterWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub async fn write(&mut self, record: &Record) -> Result<()> {
        match encode_json(record) {
            Ok(line) => {
                self.writer.write_all(&line).await?;
                self.writer.write_all(b"\n").await?;
                self.written += 1;
            }
            Err(e) => warn!("Dropping error record that could not be encoded: {}", e),
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Records read from the input
    pub records: u64,
    /// Pairs handed to the sink
    pub published: u64,
    /// Records routed to the error channel
    pub failed: u64,
}

pub struct WritePipeline<S, W = BufWriter<File>> {
    transform: ErrorIsolatingTransform,
    sink: S,
    dead_letter: Option<DeadLetterWriter<W>>,
    channel_capacity: usize,
}

impl<S, W> WritePipeline<S, W>
where
    S: PairSink,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        transform: ErrorIsolatingTransform,
        sink: S,
        dead_letter: Option<DeadLetterWriter<W>>,
        channel_capacity: usize,
    ) -> Self {
        Self {
            transform,
            sink,
            dead_letter,
            channel_capacity: channel_capacity.max(1),
        }
    }

    pub fn transform(&self) -> &ErrorIsolatingTransform {
        &self.transform
    }

    pub fn into_parts(self) -> (S, Option<DeadLetterWriter<W>>) {
        (self.sink, self.dead_letter)
    }

    /// Processes every line of `input` until end of stream.
    ///
    /// Mapping failures never stop the run. Unparseable input lines, sink
    /// errors and dead-letter I/O errors do.
    pub async fn run<R>(&mut self, input: R) -> Result<PipelineSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        let Self {
            transform,
            sink,
            dead_letter,
            channel_capacity,
        } = self;

        let (pair_tx, pair_rx) = mpsc::channel(*channel_capacity);
        let (error_tx, error_rx) = mpsc::channel(*channel_capacity);

        info!(
            format = ?transform.mapper().format(),
            schema = %transform.mapper().schema(),
            "Write pipeline started"
        );

        let (records, published, failed) = futures::try_join!(
            route_records(transform, input, pair_tx, error_tx),
            publish_pairs(sink, pair_rx),
            drain_errors(dead_letter.as_mut(), error_rx),
        )?;

        let summary = PipelineSummary {
            records,
            published,
            failed,
        };

        info!(
            records = summary.records,
            published = summary.published,
            failed = summary.failed,
            counter = %transform.counter().name(),
            counter_value = transform.counter().get(),
            "Write pipeline finished"
        );

        Ok(summary)
    }
}

async fn route_records<R>(
    transform: &ErrorIsolatingTransform,
    input: R,
    pairs: mpsc::Sender<BinaryPair>,
    errors: mpsc::Sender<Record>,
) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let schema = Arc::clone(transform.mapper().schema());
    let mut lines = input.lines();
    let mut line_number = 0;
    let mut records = 0;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        let record = parse_line(&schema, &line).map_err(|message| Error::InvalidInput {
            line: line_number,
            message,
        })?;
        records += 1;

        match transform.process(&record) {
            Routed::Success(pair) => pairs
                .send(pair)
                .await
                .map_err(|_| Error::ChannelClosed("success channel".to_string()))?,
            Routed::Failure(error_record) => errors
                .send(error_record)
                .await
                .map_err(|_| Error::ChannelClosed("error channel".to_string()))?,
        }
    }

    debug!("Input exhausted after {} lines", line_number);
    Ok(records)
}

fn parse_line(schema: &Arc<Schema>, line: &str) -> std::result::Result<Record, String> {
    let json: serde_json::Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
    record_from_json(schema, &json).map_err(|e| e.to_string())
}

async fn publish_pairs<S: PairSink>(
    sink: &mut S,
    mut pairs: mpsc::Receiver<BinaryPair>,
) -> Result<u64> {
    let mut published = 0;
    while let Some(pair) = pairs.recv().await {
        sink.publish(pair).await?;
        published += 1;
    }
    sink.flush().await?;
    Ok(published)
}

async fn drain_errors<W: AsyncWrite + Unpin>(
    mut dead_letter: Option<&mut DeadLetterWriter<W>>,
    mut errors: mpsc::Receiver<Record>,
) -> Result<u64> {
    let mut failed = 0;
    while let Some(record) = errors.recv().await {
        failed += 1;
        match dead_letter.as_mut() {
            Some(writer) => writer.write(&record).await?,
            None => warn!("Dropping error record without dead letter output: {}", record),
        }
    }
    if let Some(writer) = dead_letter {
        writer.flush().await?;
    }
    Ok(failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KafkaConfig;
    use crate::mapper::ValueMapper;
    use std::collections::HashMap;
    use crate::schema::{error_schema, FieldType};

    fn name_pipeline() -> WritePipeline<Vec<BinaryPair>, Vec<u8>> {
        let schema = Schema::builder()
            .field("name", FieldType::String)
            .build()
            .unwrap();
        let transform = ErrorIsolatingTransform::new(
            "Kafka-write-error-counter",
            ValueMapper::json(Arc::clone(&schema)),
            error_schema(&schema),
            false,
        )
        .unwrap();

        WritePipeline::new(transform, Vec::new(), Some(DeadLetterWriter::new(Vec::new())), 2)
    }

    #[tokio::test]
    async fn test_routes_both_channels() {
        let mut pipeline = name_pipeline();
        let input = "{\"name\":\"a\"}\n\n{\"name\":1}\n{\"name\":\"b\"}\n{\"name\":\"c\"}\n";

        let summary = pipeline.run(input.as_bytes()).await.unwrap();

        assert_eq!(
            summary,
            PipelineSummary {
                records: 4,
                published: 3,
                failed: 1
            }
        );
        assert_eq!(pipeline.transform().counter().get(), 1);

        let (pairs, dead_letter) = pipeline.into_parts();
        let values: Vec<&[u8]> = pairs.iter().map(|p| &p.value[..]).collect();
        assert_eq!(
            values,
            vec![
                &br#"{"name":"a"}"#[..],
                &br#"{"name":"b"}"#[..],
                &br#"{"name":"c"}"#[..]
            ]
        );
        assert!(pairs.iter().all(|p| p.key.is_empty()));

        let dead_letter = dead_letter.unwrap();
        assert_eq!(dead_letter.written(), 1);
        let written = String::from_utf8(dead_letter.into_inner()).unwrap();
        assert_eq!(
            written,
            "{\"failed_row\":{\"name\":1},\"error_message\":\"field 'name' expected string but found int64\"}\n"
        );
    }

    #[tokio::test]
    async fn test_invalid_line_stops_the_run() {
        let mut pipeline = name_pipeline();
        let input = "{\"name\":\"a\"}\nnot json\n";

        let result = pipeline.run(input.as_bytes()).await;
        assert!(matches!(result, Err(Error::InvalidInput { line: 2, .. })));
    }

    fn unreachable_kafka_config() -> KafkaConfig {
        KafkaConfig {
            brokers: vec!["127.0.0.1:1".to_string()],
            compression: "none".to_string(),
            acks: "all".to_string(),
            linger_ms: 100,
            batch_size: 16384,
            message_timeout_ms: 1000,
            producer_config_updates: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_kafka_sink_keeps_deliveries_in_flight() {
        let producer = KafkaProducer::new(&unreachable_kafka_config()).unwrap();
        let mut sink = KafkaSink::new(producer, "kafka-row-writer-test").with_max_in_flight(10);

        // Publishing must not wait for delivery reports
        let published = tokio::time::timeout(Duration::from_millis(500), async {
            for value in [&b"a"[..], b"b", b"c", b"d", b"e"] {
                sink.publish(BinaryPair::new(bytes::Bytes::copy_from_slice(value)))
                    .await?;
            }
            Ok::<_, Error>(())
        })
        .await;
        assert!(matches!(published, Ok(Ok(()))));
        assert_eq!(sink.in_flight(), 5);

        // Without a broker every message times out and the first failure is fatal
        let flushed = tokio::time::timeout(Duration::from_secs(10), sink.flush())
            .await
            .unwrap();
        assert!(matches!(flushed, Err(Error::Kafka(_))));
        assert_eq!(sink.delivered(), 0);
    }

    #[tokio::test]
    async fn test_writer_sink_writes_value_lines() {
        let mut sink = WriterSink::new(Vec::new());
        sink.publish(BinaryPair::new(bytes::Bytes::from_static(b"a")))
            .await
            .unwrap();
        sink.publish(BinaryPair::new(bytes::Bytes::from_static(b"b")))
            .await
            .unwrap();
        sink.flush().await.unwrap();

        assert_eq!(sink.into_inner(), b"a\nb\n".to_vec());
    }
}
