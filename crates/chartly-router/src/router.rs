// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::elector::LeaderElector;
use crate::sharder::shard_for;
use async_trait::async_trait;
use chartly_error::ChartlyError;
use std::sync::Arc;

/// Where [`Router::decide`] sends a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Enqueue on the local pool.
    RouteLocal,
    /// Defer: try again later, elsewhere or after load drops.
    Defer,
    /// Reject outright: the pool is overloaded.
    Reject,
}

/// The outcome of [`Router::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// The shard this `(tenant, job_id)` pair maps to.
    pub shard: u64,
    /// What to do with the job.
    pub action: Action,
    /// A stable, machine-readable reason string.
    pub reason: &'static str,
}

/// Failure returned by [`Router::route`] when the decision was not
/// `route_local`, or the local enqueue itself failed.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The router is not the elected leader for this shard right now.
    #[error("deferred: {0}")]
    Deferred(&'static str),
    /// The local pool is overloaded.
    #[error("rejected: {0}")]
    Rejected(&'static str),
    /// `route_local` was chosen but the local enqueue itself failed.
    #[error("enqueue failed: {0}")]
    Enqueue(#[from] ChartlyError),
}

/// Where a `route_local` decision is actually enqueued.
#[async_trait]
pub trait LocalQueue: Send + Sync {
    /// Enqueue `job_id` for `tenant` on the local pool.
    ///
    /// # Errors
    ///
    /// Returns [`ChartlyError`] on a backend failure.
    async fn enqueue(&self, tenant: &str, job_id: &str) -> Result<(), ChartlyError>;
}

/// Overload-aware router: shards `(tenant, job_id)` pairs, defers to
/// [`LeaderElector`] for leadership, and compares a caller-supplied queued
/// count against `defer`/`reject` thresholds.
pub struct Router {
    shard_count: u64,
    elector: Option<Arc<LeaderElector>>,
    defer_threshold: u64,
    reject_threshold: u64,
    max_queue: u64,
}

impl Router {
    /// Construct a router with no thresholds set (everything routes local
    /// until [`Router::with_thresholds`] configures limits) and no elector
    /// (every decision assumes this process is leader).
    #[must_use]
    pub fn new(shard_count: u64) -> Self {
        Self {
            shard_count,
            elector: None,
            defer_threshold: u64::MAX,
            reject_threshold: u64::MAX,
            max_queue: u64::MAX,
        }
    }

    /// Gate routing decisions on `elector`'s leadership state.
    #[must_use]
    pub fn with_elector(mut self, elector: Arc<LeaderElector>) -> Self {
        self.elector = Some(elector);
        self
    }

    /// Configure overload thresholds. Silently ignored (current thresholds
    /// are left untouched) unless `defer <= reject <= max_queue`.
    #[must_use]
    pub fn with_thresholds(mut self, defer: u64, reject: u64, max_queue: u64) -> Self {
        if defer <= reject && reject <= max_queue {
            self.defer_threshold = defer;
            self.reject_threshold = reject;
            self.max_queue = max_queue;
        }
        self
    }

    /// Decide what should happen to a job for `(tenant, job_id)` given the
    /// local pool currently has `queued` messages outstanding.
    #[must_use]
    pub fn decide(&self, tenant: &str, job_id: &str, queued: u64) -> Decision {
        let shard = shard_for(tenant, job_id, self.shard_count);

        if let Some(elector) = &self.elector {
            if !elector.is_leader() {
                return Decision { shard, action: Action::Defer, reason: "not_leader" };
            }
        }

        if queued >= self.reject_threshold {
            return Decision { shard, action: Action::Reject, reason: "queue_overloaded" };
        }
        if queued >= self.defer_threshold {
            return Decision { shard, action: Action::Defer, reason: "queue_high" };
        }
        Decision { shard, action: Action::RouteLocal, reason: "ok" }
    }

    /// Decide, then enact: enqueue on `queue` for `route_local`, otherwise
    /// return the corresponding [`RouterError`].
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Deferred`] or [`RouterError::Rejected`] per
    /// [`Router::decide`], or [`RouterError::Enqueue`] if `route_local` was
    /// chosen but `queue.enqueue` itself failed.
    pub async fn route(
        &self,
        tenant: &str,
        job_id: &str,
        queued: u64,
        queue: &dyn LocalQueue,
    ) -> Result<(), RouterError> {
        match self.decide(tenant, job_id, queued).action {
            Action::RouteLocal => Ok(queue.enqueue(tenant, job_id).await?),
            Action::Defer => Err(RouterError::Deferred("deferred")),
            Action::Reject => Err(RouterError::Rejected("rejected")),
        }
    }
}
