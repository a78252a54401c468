use clap::Parser;
use kafka_row_writer::kafka::KafkaProducer;
use kafka_row_writer::pipeline::{
    DeadLetterWriter, KafkaSink, PairSink, PipelineSummary, WritePipeline, WriterSink,
};
use kafka_row_writer::schema::error_schema;
use kafka_row_writer::{Config, ErrorIsolatingTransform, Result, ValueMapper};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncWrite, BufReader};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "kafka-row-writer")]
#[command(about = "Serialize schema rows and publish them to Kafka", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[arg(short, long, value_name = "FILE", help = "Newline-delimited JSON input (default: stdin)")]
    input: Option<PathBuf>,

    #[arg(long, help = "Write values to stdout instead of Kafka")]
    dry_run: bool,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose);

    info!("Starting kafka-row-writer");
    info!("Loading configuration from {:?}", args.config);

    let config = match Config::from_file(&args.config) {
        Ok(cfg) => {
            info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    info!(
        format = ?config.writer.format,
        topic = %config.writer.topic,
        kafka_brokers = ?config.kafka.brokers,
        include_stack_trace = config.writer.include_stack_trace,
        dead_letter_path = ?config.writer.dead_letter_path,
        dry_run = args.dry_run,
        "Configuration summary"
    );

    let schema = config.input_schema()?;
    let mapper = ValueMapper::from_format(
        config.writer.format,
        Arc::clone(&schema),
        config.writer.raw_field.as_deref(),
    )?;
    let transform = ErrorIsolatingTransform::new(
        config.writer.error_counter_name.clone(),
        mapper,
        error_schema(&schema),
        config.writer.include_stack_trace,
    )?;

    let dead_letter = match &config.writer.dead_letter_path {
        Some(path) => Some(DeadLetterWriter::create(path).await?),
        None => None,
    };

    let summary = if args.dry_run {
        let sink = WriterSink::new(tokio::io::stdout());
        run(transform, sink, dead_letter, &config, args.input.as_deref()).await?
    } else {
        let producer = KafkaProducer::new(&config.kafka)?;
        let sink = KafkaSink::new(producer, config.writer.topic.clone())
            .with_max_in_flight(config.writer.channel_capacity);
        run(transform, sink, dead_letter, &config, args.input.as_deref()).await?
    };

    if summary.failed > 0 {
        error!(
            failed = summary.failed,
            records = summary.records,
            "Some records could not be serialized"
        );
    }

    Ok(())
}

async fn run<S, W>(
    transform: ErrorIsolatingTransform,
    sink: S,
    dead_letter: Option<DeadLetterWriter<W>>,
    config: &Config,
    input: Option<&Path>,
) -> Result<PipelineSummary>
where
    S: PairSink,
    W: AsyncWrite + Unpin,
{
    let mut pipeline = WritePipeline::new(
        transform,
        sink,
        dead_letter,
        config.writer.channel_capacity,
    );

    match input {
        Some(path) => {
            info!("Reading records from {:?}", path);
            let file = File::open(path).await?;
            pipeline.run(BufReader::new(file)).await
        }
        None => {
            info!("Reading records from stdin");
            pipeline.run(BufReader::new(tokio::io::stdin())).await
        }
    }
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("kafka_row_writer=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("kafka_row_writer=info,warn"))
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
