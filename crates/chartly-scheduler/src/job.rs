// SPDX-License-Identifier: MIT OR Apache-2.0
use async_trait::async_trait;
use chartly_error::ChartlyError;
use serde::{Deserialize, Serialize};

/// A tenant-scoped cron job definition as returned by a [`JobsProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronJob {
    /// Owning tenant.
    pub tenant: String,
    /// Job name, unique per tenant.
    pub name: String,
    /// Standard 5-field cron expression.
    pub cron: String,
    /// IANA timezone name the cron expression is evaluated in. Empty means
    /// "use the scheduler's configured default".
    pub timezone: String,
    /// Whether this job is currently active.
    pub enabled: bool,
    /// Opaque identifier forwarded to the enqueued [`JobRequest`].
    pub source_id: String,
    /// Job type forwarded to the enqueued [`JobRequest`].
    pub job_type: String,
}

/// What [`Enqueuer::enqueue`] hands off to the work-queue producer side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Opaque identifier copied from the firing [`CronJob`].
    pub source_id: String,
    /// Job type copied from the firing [`CronJob`].
    pub job_type: String,
}

/// Supplies the scheduler with the current set of cron jobs on each tick.
#[async_trait]
pub trait JobsProvider: Send + Sync {
    /// Return every job the scheduler should consider this tick, enabled
    /// or not — the scheduler filters on [`CronJob::enabled`] itself.
    ///
    /// # Errors
    ///
    /// Returns [`ChartlyError`] if the job list cannot be retrieved.
    async fn jobs(&self) -> Result<Vec<CronJob>, ChartlyError>;
}

/// Hands a fired job off to whatever enqueues the actual work.
#[async_trait]
pub trait Enqueuer: Send + Sync {
    /// Enqueue work for `tenant` described by `request`.
    ///
    /// # Errors
    ///
    /// Returns [`ChartlyError`] on a backend failure; the scheduler leaves
    /// its caches untouched on failure so the next tick retries.
    async fn enqueue(&self, tenant: &str, request: JobRequest) -> Result<(), ChartlyError>;
}
