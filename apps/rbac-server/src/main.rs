//! RBAC decision server.

mod config;
mod logging;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rbac::RbacModule;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "rbac-server", version, about = "RBAC authorization decision server")]
struct Cli {
    /// YAML configuration file; `RBAC__*` environment variables override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Serve authorization requests (default).
    Run,
    /// Validate the configuration, print it and exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;
    logging::init(&cfg.logging)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&cfg).await,
        Command::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&cfg)?);
            Ok(())
        }
    }
}

async fn run(cfg: &AppConfig) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let mut module = RbacModule::init(&cfg.rbac).await?;
    let background = module.spawn_background(&cancel);

    let listener = TcpListener::bind(cfg.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.server.bind_addr))?;
    info!(addr = %cfg.server.bind_addr, "rbac-server listening");

    tokio::spawn(shutdown_on_signal(cancel.clone()));
    let stop = cancel.clone();
    axum::serve(listener, module.router(cfg.server.request_timeout))
        .with_graceful_shutdown(async move { stop.cancelled().await })
        .await
        .context("server error")?;

    cancel.cancel();
    for handle in background {
        if let Err(e) = handle.await {
            warn!(error = %e, "background task ended abnormally");
        }
    }
    info!("rbac-server stopped");
    Ok(())
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "cannot listen for ctrl-c");
                return;
            }
        }
        () = terminate => {}
    }
    info!("shutdown requested");
    cancel.cancel();
}
