use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use cdp_session::ChromiumLauncher;
use clap::Args;
use procurement_flow::{Orchestrator, RunExecutor};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::server::{build_router, AppState};

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Listen address, e.g. 0.0.0.0:8000 (overrides the config file)
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,
}

pub async fn cmd_serve(args: ServeArgs, config: AppConfig) -> Result<()> {
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid listen address '{bind}'"))?;

    if config.server.api_key.is_none() {
        warn!("no API key configured; /licitaciones will reject every request");
    }

    let executor: Arc<dyn RunExecutor> = Arc::new(Orchestrator::new(
        ChromiumLauncher,
        config.flow_settings(),
    ));
    let router = build_router(AppState::new(executor, &config.server));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind API server on {}", addr))?;
    info!(
        max_concurrent_runs = config.server.max_concurrent_runs,
        run_timeout_secs = config.server.run_timeout_secs,
        "API available at http://{}",
        addr
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server exited unexpectedly")?;
    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
