//! Scheduled and on-demand reloads
//!
//! `spawn_refresh_loop` runs a background task that reloads the service on a
//! timer and whenever a trigger arrives. Triggers go through a channel of
//! capacity one: while a reload is running at most one further reload is
//! queued and any extra triggers are coalesced into it.
//!
//! Reload work is CPU bound and synchronous, so it runs on the blocking pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::DataConfig;
use crate::error::ReloadError;
use crate::reader::Section;
use crate::reload::{ReloadReport, ReloadSources};
use crate::service::WatchlistService;

/// Supplies the raw sections for a reload
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn open(&self) -> Result<ReloadSources, ReloadError>;

    /// Human readable description for logs
    fn describe(&self) -> String;
}

/// Reads section files from a local directory
#[derive(Debug, Clone)]
pub struct DirectorySource {
    config: DataConfig,
}

impl DirectorySource {
    pub fn new(config: DataConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SourceProvider for DirectorySource {
    async fn open(&self) -> Result<ReloadSources, ReloadError> {
        let mut sources = ReloadSources::new();
        for section in Section::ALL {
            if !self.config.includes(section.source_list()) {
                continue;
            }
            let path = self.config.path_for(section);
            match tokio::fs::File::open(&path).await {
                Ok(file) => {
                    debug!(%section, path = %path.display(), "Opened section file");
                    sources.add(section, file.into_std().await);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(%section, path = %path.display(), "Section file not present, skipping");
                }
                Err(source) => return Err(ReloadError::SourceUnavailable { path, source }),
            }
        }
        Ok(sources)
    }

    fn describe(&self) -> String {
        format!("directory {}", self.config.directory.display())
    }
}

/// Status of the refresh loop
#[derive(Debug, Clone, Default)]
pub struct RefreshStatus {
    pub running: bool,
    pub last_run_id: Option<Uuid>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub reloads_succeeded: u64,
    pub reloads_failed: u64,
    pub triggers_coalesced: u64,
}

/// Shared refresh status
pub type SharedRefreshStatus = Arc<RwLock<RefreshStatus>>;

/// What happened to a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A reload was queued
    Queued,
    /// A reload was already pending; this trigger folds into it
    Coalesced,
    /// The refresh loop has stopped
    Closed,
}

/// Handle to a running refresh loop; dropping it stops the loop
pub struct RefreshHandle {
    trigger_tx: mpsc::Sender<()>,
    status: SharedRefreshStatus,
    coalesced: Arc<AtomicU64>,
}

impl RefreshHandle {
    /// Request a reload as soon as possible
    pub fn trigger(&self) -> TriggerOutcome {
        match self.trigger_tx.try_send(()) {
            Ok(()) => TriggerOutcome::Queued,
            Err(TrySendError::Full(())) => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                TriggerOutcome::Coalesced
            }
            Err(TrySendError::Closed(())) => TriggerOutcome::Closed,
        }
    }

    pub async fn status(&self) -> RefreshStatus {
        let mut status = self.status.read().await.clone();
        status.triggers_coalesced = self.coalesced.load(Ordering::Relaxed);
        status
    }

    /// Stop the loop after any reload in flight
    pub fn shutdown(self) {
        drop(self);
    }
}

/// Run one reload from the provider on the blocking pool
pub async fn reload_from(
    service: Arc<WatchlistService>,
    provider: &dyn SourceProvider,
) -> Result<ReloadReport, ReloadError> {
    let sources = provider.open().await?;
    tokio::task::spawn_blocking(move || service.reload(sources))
        .await
        .map_err(|e| ReloadError::Task(e.to_string()))?
}

/// Spawn the refresh loop.
///
/// With `interval` set, a reload runs every `interval` (first one after one
/// full interval); triggers run one immediately.
pub fn spawn_refresh_loop(
    service: Arc<WatchlistService>,
    provider: Arc<dyn SourceProvider>,
    interval: Option<Duration>,
) -> (RefreshHandle, JoinHandle<()>) {
    let (trigger_tx, mut trigger_rx) = mpsc::channel::<()>(1);
    let status: SharedRefreshStatus = Arc::new(RwLock::new(RefreshStatus::default()));
    let handle = RefreshHandle {
        trigger_tx,
        status: status.clone(),
        coalesced: Arc::new(AtomicU64::new(0)),
    };

    let task = tokio::spawn(async move {
        info!(
            source = %provider.describe(),
            interval_secs = interval.map(|d| d.as_secs()),
            "Refresh loop started"
        );
        let mut ticker = interval.filter(|d| !d.is_zero()).map(|period| {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            let reason = tokio::select! {
                trigger = trigger_rx.recv() => match trigger {
                    Some(()) => "trigger",
                    None => break,
                },
                _ = next_tick(&mut ticker) => "timer",
            };
            run_once(&service, provider.as_ref(), &status, reason).await;
        }
        info!("Refresh loop stopped");
    });

    (handle, task)
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn run_once(
    service: &Arc<WatchlistService>,
    provider: &dyn SourceProvider,
    status: &SharedRefreshStatus,
    reason: &str,
) {
    status.write().await.running = true;
    debug!(reason, "Refresh starting");

    let result = reload_from(service.clone(), provider).await;

    let mut s = status.write().await;
    s.running = false;
    match result {
        Ok(report) => {
            info!(
                reason,
                run_id = %report.run_id,
                entities = report.total_entities(),
                diagnostics = report.diagnostics.len(),
                "Refresh complete"
            );
            s.last_run_id = Some(report.run_id);
            s.last_success = Some(report.ended_at);
            s.last_error = None;
            s.reloads_succeeded += 1;
        }
        Err(e) => {
            error!(reason, error = %e, "Refresh failed");
            s.last_error = Some(e.to_string());
            s.reloads_failed += 1;
        }
    }
}
