//! dexproxy - entry point.

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dexproxy::app::App;
use dexproxy::config::{Cli, Config};
use dexproxy::server::Server;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?.with_cli(&cli);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let app = App::from_config(&config).context("failed to initialise application")?;
    let sweeper = app.spawn_cache_sweeper(&config);

    let server = Server::bind(config.bind_addr()).await?;
    info!(
        ttl_secs = config.cache_ttl.as_secs(),
        timeout_secs = config.upstream_timeout.as_secs(),
        "Server running at http://localhost:{}",
        server.local_addr().port()
    );

    server.serve(app.router(), shutdown_signal()).await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    info!("dexproxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
