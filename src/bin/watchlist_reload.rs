//! Watchlist reload daemon
//!
//! Loads the configured list files into a `WatchlistService`, logs each
//! reload report and keeps refreshing on the configured interval until
//! interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use watchlist_screening::{
    refresh::reload_from, spawn_refresh_loop, DirectorySource, ScreeningConfig, SourceProvider,
    StartupMode, WatchlistService,
};

/// Default configuration path
const DEFAULT_CONFIG_PATH: &str = "config/watchlist.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "watchlist_screening=info,watchlist_reload=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path =
        std::env::var("WATCHLIST_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    tracing::info!(path = %config_path, "Loading configuration");

    let mut config = if std::path::Path::new(&config_path).exists() {
        ScreeningConfig::from_file(&config_path)
            .with_context(|| format!("loading {config_path}"))?
    } else {
        tracing::warn!(path = %config_path, "Config file not found, using defaults");
        ScreeningConfig::default()
    };
    config.apply_env_overrides()?;

    tracing::info!(
        data_dir = %config.data.directory.display(),
        refresh_interval = config.refresh.interval_secs,
        startup_mode = ?config.refresh.startup_mode,
        "Configuration loaded"
    );

    let service = Arc::new(WatchlistService::from_config(&config));
    let provider = Arc::new(DirectorySource::new(config.data.clone()));

    match config.refresh.startup_mode {
        StartupMode::Sync => {
            tracing::info!("Performing synchronous initial load");
            let report = reload_from(service.clone(), provider.as_ref())
                .await
                .context("initial load failed")?;
            tracing::info!(report = %serde_json::to_string(&report)?, "Initial load complete");
        }
        StartupMode::Async => {
            tracing::info!("Starting asynchronous initial load");
            let svc = service.clone();
            let prov = provider.clone();
            tokio::spawn(async move {
                match reload_from(svc, prov.as_ref()).await {
                    Ok(report) => match serde_json::to_string(&report) {
                        Ok(json) => tracing::info!(report = %json, "Initial async load complete"),
                        Err(e) => tracing::error!(error = %e, "Failed to serialize report"),
                    },
                    Err(e) => tracing::error!(error = %e, "Initial async load failed"),
                }
            });
        }
    }

    let interval = Some(Duration::from_secs(config.refresh.interval_secs));
    let source: Arc<dyn SourceProvider> = provider;
    let (handle, task) = spawn_refresh_loop(service.clone(), source, interval);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    let status = handle.status().await;
    tracing::info!(
        succeeded = status.reloads_succeeded,
        failed = status.reloads_failed,
        coalesced = status.triggers_coalesced,
        "Refresh summary"
    );
    handle.shutdown();
    task.await?;

    let stats = service.snapshot().stats();
    tracing::info!("{stats}");
    Ok(())
}
