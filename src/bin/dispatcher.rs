//! # Dispatcher Binary
//!
//! Standalone service loop around the dispatch pipeline: pulls notification
//! batches from the queue, routes each one onto the stored-procedure
//! catalog, and submits the selected invocation to the warehouse backend.

use anyhow::Context;
use clap::Parser;
use sprocket_core::catalog::stock_catalog;
use sprocket_core::config::DispatchConfig;
use sprocket_core::coordinator::{CoordinatorConfig, DispatchCoordinator};
use sprocket_core::logging::init_structured_logging;
use sprocket_core::messaging::PgmqMessageSource;
use sprocket_core::submitter::{JobSubmitter, PgQueryBackend};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "dispatcher")]
#[command(about = "Route queue notifications to warehouse stored procedures")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Queue to pull notifications from (overrides SPROCKET_QUEUE_NAME)
    #[arg(short, long)]
    queue: Option<String>,

    /// Connection string for the queue and backend (overrides DATABASE_URL)
    #[arg(short, long)]
    database_url: Option<String>,

    /// Run a single pipeline pass and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let cli = Cli::parse();
    let mut config = DispatchConfig::from_env().context("loading configuration")?;
    if let Some(queue) = cli.queue {
        config.queue_name = queue;
    }
    if let Some(database_url) = cli.database_url {
        config.database_url = database_url;
    }

    info!(
        queue = %config.queue_name,
        project_id = %config.project_id,
        "Starting dispatcher"
    );

    let pool = sqlx::PgPool::connect(&config.database_url)
        .await
        .context("connecting to database")?;

    let source = PgmqMessageSource::new_with_pool(
        pool.clone(),
        config.queue_name.clone(),
        config.visibility_timeout_secs,
    )
    .await;
    source.ensure_queue().await.context("preparing queue")?;

    let catalog = Arc::new(stock_catalog(&config.project_id).context("building job catalog")?);
    let submitter = JobSubmitter::new(Arc::new(PgQueryBackend::new(pool)));
    let coordinator = DispatchCoordinator::new(
        Arc::new(source),
        catalog,
        submitter,
        CoordinatorConfig::from(&config),
    );

    if cli.once {
        let outcomes = coordinator.run_once().await?;
        info!(count = outcomes.len(), "Single pass complete");
        return Ok(());
    }

    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    info!(poll_interval_ms = config.poll_interval_ms, "Entering service loop");

    loop {
        tokio::select! {
            result = coordinator.run_once() => {
                if let Err(e) = result {
                    // Pull retries are already exhausted by the coordinator;
                    // treat the run failure as fatal and let the supervisor
                    // restart us.
                    error!(error = %e, "Pipeline run failed");
                    return Err(e.into());
                }
                tokio::time::sleep(poll_interval).await;
            }
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received, stopping dispatcher");
                return Ok(());
            }
        }
    }
}
