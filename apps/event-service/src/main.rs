mod config;
mod event_store_sink;
mod models;
mod task_runner;

use config::ServiceConfig;
use dotenvy::dotenv;
use lapin::{options::BasicConsumeOptions, types::FieldTable};
use messaging_core::adapters::RabbitMqConnection;
use messaging_core::topology;
use sqlx::postgres::PgPoolOptions;
use std::process::ExitCode;
use task_runner::TaskRegistry;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// `(action, entity)` for the task queue this bootstrap always declares and
/// consumes, so the task runner (component H) is reachable out of the box.
/// A host application that needs additional `(action, entity)` task queues
/// declares them with `topology::declare_task_queue`/
/// `declare_task_attempt_ladder` and spawns its own `run_task_runner` loop
/// alongside this one.
const DEFAULT_TASK_ACTION: &str = "submit";
const DEFAULT_TASK_ENTITY: &str = "generic";

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "event-service failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), BoxError> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("starting event-service v{}...", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::from_env()?;
    info!(service_name = %config.service_name, tasks_package = %config.tasks_package, "configuration loaded");

    let pool = PgPoolOptions::new().max_connections(10).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("database migrations applied");

    let connection = RabbitMqConnection::connect(&config.rabbitmq_url).await?;

    let topology_channel = connection.create_channel().await?;
    topology::declare_event_exchanges(&topology_channel).await?;
    topology::declare_task_exchanges(&topology_channel).await?;
    topology::declare_event_store_queue(&topology_channel).await?;
    topology::declare_task_queue(&topology_channel, DEFAULT_TASK_ACTION, DEFAULT_TASK_ENTITY).await?;
    info!("topology declared");

    // Host applications register their own task executors here before the
    // runner starts consuming; none are registered by default.
    let registry = TaskRegistry::new();

    let event_store_channel = connection.create_channel().await?;
    let event_store_consumer = event_store_channel
        .basic_consume(
            messaging_core::naming::event_store_queue_name(),
            "event-store-sink",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;
    let event_store_pool = pool.clone();
    let event_store_handle = tokio::spawn(async move {
        event_store_sink::run_event_store_sink(event_store_consumer, event_store_pool).await;
    });

    let task_channel = connection.create_channel().await?;
    let task_queue_name = messaging_core::naming::task_queue_name(DEFAULT_TASK_ACTION, DEFAULT_TASK_ENTITY);
    let task_consumer = task_channel
        .basic_consume(&task_queue_name, "task-runner", BasicConsumeOptions::default(), FieldTable::default())
        .await?;
    let task_pool = pool.clone();
    let task_handle = tokio::spawn(async move {
        task_runner::run_task_runner(task_consumer, task_pool, registry).await;
    });

    // A host application declares and consumes additional task queues (one
    // per `(action, entity)` it cares about) the same way, alongside this
    // default one.

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, stopping consumers");

    event_store_handle.abort();
    task_handle.abort();
    connection.close().await?;
    pool.close().await;

    Ok(())
}
