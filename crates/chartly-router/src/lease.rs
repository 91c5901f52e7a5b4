// SPDX-License-Identifier: MIT OR Apache-2.0
use async_trait::async_trait;
use chartly_error::ChartlyError;
use std::time::Duration;

/// A pluggable distributed lease store backing [`crate::LeaderElector`].
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Attempt to acquire `key` for `owner`, valid for `ttl`.
    ///
    /// Returns `Ok(true)` on success, `Ok(false)` if another owner already
    /// holds an unexpired lease.
    ///
    /// # Errors
    ///
    /// Returns [`ChartlyError`] on a backend failure.
    async fn acquire(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool, ChartlyError>;

    /// Extend `owner`'s existing lease on `key` by `ttl`.
    ///
    /// Returns `Ok(true)` on success, `Ok(false)` if `owner` no longer holds
    /// the lease (expired or stolen).
    ///
    /// # Errors
    ///
    /// Returns [`ChartlyError`] on a backend failure.
    async fn renew(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool, ChartlyError>;

    /// Best-effort release of `owner`'s lease on `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ChartlyError`] on a backend failure; callers treat release
    /// as best-effort and do not retry.
    async fn release(&self, key: &str, owner: &str) -> Result<(), ChartlyError>;
}
