//! `suigives-ingress` binary.
//!
//! ```text
//! suigives-ingress serve     --config suigives.toml
//! suigives-ingress reconcile --config suigives.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use suigives_common::config::{load_from_file, LoggingConfig};
use suigives_common::AppConfig;
use suigives_ingress::{build_router, AppState};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "suigives-ingress", version, about = "SuiGives backend API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API with background reconciliation.
    Serve {
        /// TOML config file; defaults plus `SUIGIVES_*` env when absent.
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
    /// Reconcile chain state into the database once and exit.
    Reconcile {
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(p) => load_from_file(p).with_context(|| format!("loading {}", p.display())),
        None => AppConfig::default()
            .apply_env(|k| std::env::var(k).ok())
            .context("applying environment overrides"),
    }
}

fn init_tracing(cfg: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.level.as_str()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if cfg.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve { config } => {
            let cfg = load_config(config.as_deref())?;
            init_tracing(&cfg.logging);
            serve(cfg).await
        }
        Command::Reconcile { config } => {
            let cfg = load_config(config.as_deref())?;
            init_tracing(&cfg.logging);
            let state = AppState::from_config(cfg)?;
            let report = state.reconciler.run().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if let Some(e) = report.error {
                anyhow::bail!("reconciliation incomplete: {}", e);
            }
            Ok(())
        }
    }
}

async fn serve(cfg: AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = cfg
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address {}", cfg.bind_addr))?;
    let interval = Duration::from_secs(cfg.reconcile.interval_secs);
    info!(
        network = ?cfg.network,
        rpc_url = %cfg.rpc_url(),
        package_id = %cfg.package_id,
        database = %cfg.database_path.display(),
        "ingress starting"
    );

    let state = AppState::from_config(cfg)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reconcile_task = if interval.is_zero() {
        info!("background reconciliation disabled");
        None
    } else {
        Some(tokio::spawn(reconcile_loop(state.clone(), interval, shutdown_rx)))
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(listen_addr = %addr, "ingress listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
    });
    let result = server.await;

    let _ = shutdown_tx.send(true);
    if let Some(task) = reconcile_task {
        if let Err(e) = task.await {
            warn!(error = %e, "reconcile task ended abnormally");
        }
    }
    info!("ingress shutdown complete");
    result.context("server error")
}

async fn reconcile_loop(state: AppState, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let reconciler = Arc::clone(&state.reconciler);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = reconciler.run().await;
                if let Some(e) = &report.error {
                    warn!(error = %e, "background reconciliation incomplete");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
