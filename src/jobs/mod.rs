//! Scheduled Jobs
//!
//! Background maintenance. None of these touch loans or inventory.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::interval;

use crate::clock::Clock;
use crate::store::{Store, StoreError};

/// Delete access tokens that expired before now
pub async fn purge_expired_tokens(store: &dyn Store, clock: &dyn Clock) -> Result<u64, JobError> {
    let rows_deleted = store.purge_expired_tokens(clock.now()).await?;

    if rows_deleted > 0 {
        tracing::info!(rows_deleted = rows_deleted, "Purged expired access tokens");
    }

    Ok(rows_deleted)
}

/// Job scheduler configuration
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    pub token_purge_interval: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            token_purge_interval: Duration::from_secs(300),
        }
    }
}

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(store, clock, JobSchedulerConfig::default())
    }

    pub fn with_config(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: JobSchedulerConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Start the job scheduler in the background
    /// Returns a handle that can be used to abort the scheduler
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!(
            interval_secs = self.config.token_purge_interval.as_secs(),
            "Job scheduler started"
        );

        let mut token_interval = interval(self.config.token_purge_interval);

        loop {
            token_interval.tick().await;
            if let Err(e) = purge_expired_tokens(self.store.as_ref(), self.clock.as_ref()).await {
                tracing::error!(error = %e, "Token purge failed");
            }
        }
    }

    /// Run all maintenance jobs once (for manual trigger or testing)
    pub async fn run_all_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match purge_expired_tokens(self.store.as_ref(), self.clock.as_ref()).await {
            Ok(count) => report.tokens_purged = count,
            Err(e) => report.errors.push(format!("Token purge: {}", e)),
        }

        report.completed_at = self.clock.now();
        report
    }
}

/// Report from running maintenance jobs
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub tokens_purged: u64,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}
