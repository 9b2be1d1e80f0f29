use anyhow::{Context, Result};
use std::io::Read;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn};

use sqlframe::config::Config;
use sqlframe::frame::BatchRequest;
use sqlframe::query::QueryOrchestrator;
use sqlframe::session::SqlitePool;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(config.log_level.clone())
        .with_writer(std::io::stderr)
        .init();

    info!("sqlframe v{}", env!("CARGO_PKG_VERSION"));

    let request = read_request(&config.input)?;

    let pool = SqlitePool::open(config.pool_options())
        .with_context(|| format!("Failed to open database {}", config.database))?;
    info!("Using database: {}", config.database);

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling batch");
            ctrl_c_token.cancel();
        }
    });

    let orchestrator = QueryOrchestrator::new(pool.clone())
        .with_max_concurrency(config.max_concurrency)
        .with_span(info_span!("sqlframe", database = %config.database));
    let result = orchestrator.run_with_cancel(request.queries, &cancel).await;
    pool.close();

    let output = if config.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{output}");

    Ok(())
}

fn read_request(input: &str) -> Result<BatchRequest> {
    let raw = if input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("Failed to read batch from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read batch file {input}"))?
    };
    serde_json::from_str(&raw).context("Invalid batch request JSON")
}
