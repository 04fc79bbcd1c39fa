mod cli;
mod config;
mod http;
mod jobs;
mod manifest_cache;
mod render;
mod state;
mod wiring;

use clap::Parser;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::ConfigError;
use crate::http::HttpError;
use crate::jobs::JobError;
use crate::wiring::WiringError;
use d2builds_infra::db::migrations::run_migrations;
use d2builds_infra::db::DbPoolError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("wiring error: {0}")]
    Wiring(#[from] WiringError),
    #[error("db error: {0}")]
    Db(#[from] DbPoolError),
    #[error("http error: {0}")]
    Http(#[from] HttpError),
    #[error("job error: {0}")]
    Jobs(#[from] JobError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    config::load_dotenv()?;
    let config = config::AppConfig::from_env()?;
    let state = wiring::build_state(config)?;
    if let Some(pool) = state.db.as_ref() {
        run_migrations(pool).await?;
    }

    if cli.preload {
        match state.manifest.get_manifest().await {
            Ok(snapshot) => info!(
                exotic_armor = snapshot.exotic_armor.len(),
                mods = snapshot.mods.len(),
                "manifest preloaded"
            ),
            Err(err) => warn!(error = %err, "manifest preload failed; serving without it"),
        }
    }

    let mut api_task = None;
    let mut worker_task = None;

    if cli.mode.run_api() {
        let addr = state.config.http_addr;
        let http_state = state.clone();
        api_task = Some(tokio::spawn(async move {
            info!(%addr, "http server starting");
            http::serve(addr, http_state).await
        }));
    }

    if cli.mode.run_worker() {
        let worker_state = state.clone();
        worker_task = Some(tokio::spawn(async move {
            info!("worker scheduler starting");
            jobs::start(worker_state).await
        }));
    }

    let shutdown = shutdown_signal();

    match (api_task, worker_task) {
        (Some(mut api), Some(worker)) => {
            tokio::pin!(shutdown);
            let worker_finished = tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown signal received");
                    false
                }
                res = &mut api => {
                    res??;
                    false
                }
                res = worker => {
                    res??;
                    true
                }
            };
            // A worker that only warmed the cache once leaves the API running.
            if worker_finished {
                info!("worker finished; api keeps serving");
                tokio::select! {
                    _ = shutdown => {
                        info!("shutdown signal received");
                    }
                    res = api => {
                        res??;
                    }
                }
            }
        }
        (Some(api), None) => {
            tokio::select! {
                _ = shutdown => {
                    info!("shutdown signal received");
                }
                res = api => {
                    res??;
                }
            }
        }
        (None, Some(worker)) => {
            tokio::select! {
                _ = shutdown => {
                    info!("shutdown signal received");
                }
                res = worker => {
                    res??;
                }
            }
        }
        (None, None) => {}
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install ctrl-c handler");
    }
}
