//! GantryMQ server binary.
//!
//! Starts the gatekeeper on the control stream and one queue worker per
//! subsystem queue (commands, data), all against the same Redis broker.

use clap::Parser;
use gantry_server::broker::{ReplyPublisher, StreamConsumer};
use gantry_server::dispatcher::Dispatcher;
use gantry_server::subsystems::{acquisition, digio, motion};
use gantry_server::{
    logging, Channel, ControlWorker, QueueWorker, ServerConfig, ServerResult, SessionGate,
    SharedDispatcher,
};
use tokio::task::JoinSet;
use tracing::{error, info};

/// GantryMQ: exclusive-control RPC broker for shared lab instruments.
#[derive(Parser, Debug)]
#[command(name = "gantry-server")]
#[command(about = "Exclusive-control RPC broker for shared lab instruments")]
struct Args {
    /// Redis connection URL.
    #[arg(long, env = "GMQ_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Stream-key namespace shared with the clients.
    #[arg(long, env = "GMQ_NAMESPACE", default_value = "gmq")]
    namespace: String,

    /// XREADGROUP block timeout in milliseconds.
    #[arg(long, env = "GMQ_BLOCK_MS", default_value = "5000")]
    block_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

async fn spawn_queue_worker<S>(
    workers: &mut JoinSet<ServerResult<()>>,
    config: &ServerConfig,
    gate: &SessionGate,
    publisher: &ReplyPublisher,
    stream: String,
    channel: Channel,
    dispatcher: SharedDispatcher<S>,
) -> anyhow::Result<()>
where
    S: Send + 'static,
{
    let consumer = StreamConsumer::connect(
        &config.redis_url,
        stream.clone(),
        &config.consumer_group,
        &format!("{}-{}", config.consumer_name, stream),
        config.block_timeout_ms,
    )
    .await?;

    let mut worker = QueueWorker::new(
        channel,
        consumer,
        publisher.clone(),
        gate.clone(),
        dispatcher,
    );
    workers.spawn(async move { worker.run().await });

    Ok(())
}

/// Spawn the commands and data workers for one subsystem over a shared
/// dispatcher.
async fn spawn_subsystem<S>(
    workers: &mut JoinSet<ServerResult<()>>,
    config: &ServerConfig,
    gate: &SessionGate,
    publisher: &ReplyPublisher,
    subsystem: &str,
    dispatcher: Dispatcher<S>,
) -> anyhow::Result<()>
where
    S: Send + 'static,
{
    let dispatcher = dispatcher.into_shared();

    spawn_queue_worker(
        workers,
        config,
        gate,
        publisher,
        config.commands_stream(subsystem),
        Channel::Commands,
        dispatcher.clone(),
    )
    .await?;

    spawn_queue_worker(
        workers,
        config,
        gate,
        publisher,
        config.data_stream(subsystem),
        Channel::Data,
        dispatcher,
    )
    .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logging::init_logging(&args.log_level);

    info!("GantryMQ server starting...");

    let mut config = ServerConfig::new();
    config.redis_url = args.redis_url;
    config.namespace = args.namespace;
    config.block_timeout_ms = args.block_ms;

    info!(
        redis_url = %config.redis_url,
        namespace = %config.namespace,
        control_stream = %config.control_stream(),
        consumer = %config.consumer_name,
        "Configuration loaded"
    );

    let gate = SessionGate::new();
    let publisher = ReplyPublisher::connect(&config.redis_url).await?;

    let mut workers = JoinSet::new();

    // Gatekeeper on the control stream
    let control_consumer = StreamConsumer::connect(
        &config.redis_url,
        config.control_stream(),
        &config.consumer_group,
        &config.consumer_name,
        config.block_timeout_ms,
    )
    .await?;
    let mut control = ControlWorker::new(control_consumer, publisher.clone(), gate.clone());
    workers.spawn(async move { control.run().await });

    // One worker per subsystem queue
    spawn_subsystem(
        &mut workers,
        &config,
        &gate,
        &publisher,
        motion::SUBSYSTEM,
        Dispatcher::new(
            motion::operation_registry()?,
            motion::telemetry_registry()?,
            motion::MotionStage::default(),
        ),
    )
    .await?;

    spawn_subsystem(
        &mut workers,
        &config,
        &gate,
        &publisher,
        acquisition::SUBSYSTEM,
        Dispatcher::new(
            acquisition::operation_registry()?,
            acquisition::telemetry_registry()?,
            acquisition::Digitizer::default(),
        ),
    )
    .await?;

    spawn_subsystem(
        &mut workers,
        &config,
        &gate,
        &publisher,
        digio::SUBSYSTEM,
        Dispatcher::new(
            digio::operation_registry()?,
            digio::telemetry_registry()?,
            digio::GpioBank::default(),
        ),
    )
    .await?;

    info!("Awaiting requests");

    tokio::select! {
        result = workers.join_next() => {
            match result {
                Some(Ok(Err(e))) => {
                    error!(error = %e, "Worker exited with error");
                    return Err(e.into());
                }
                Some(Err(e)) => {
                    error!(error = %e, "Worker task panicked");
                    return Err(e.into());
                }
                _ => error!("Worker exited unexpectedly"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, exiting...");
        }
    }

    Ok(())
}
