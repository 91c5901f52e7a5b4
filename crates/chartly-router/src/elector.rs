// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::lease::LeaseStore;
use crate::sharder::fnv1a_64;
use chartly_runtime::CancellationToken;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Default capacity of the [`LeaderElector`] event channel. Overflow drops
/// the oldest-pending send rather than ever blocking the election loop.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;
/// Floor under which a [`deterministic_sleep`] duration is never allowed to
/// fall, regardless of jitter.
pub const MIN_SLEEP: Duration = Duration::from_millis(50);

/// Resolve this process's owner identity: `$CHARTLY_OWNER_ID` if set and
/// non-empty, else `$HOSTNAME:pid` (falling back to `"unknown-host"` if
/// `$HOSTNAME` is unset).
#[must_use]
pub fn default_owner_identity() -> String {
    if let Ok(v) = std::env::var("CHARTLY_OWNER_ID") {
        if !v.is_empty() {
            return v;
        }
    }
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_string());
    format!("{host}:{}", std::process::id())
}

/// Deterministically perturb `base` by up to ±20%, seeded by
/// `FNV-1a-64(owner|tick)`, floored at [`MIN_SLEEP`].
#[must_use]
pub fn deterministic_sleep(owner: &str, tick: u64, base: Duration) -> Duration {
    let seed = fnv1a_64(format!("{owner}|{tick}").as_bytes());
    let unit = seed as f64 / u64::MAX as f64; // [0, 1)
    let fraction = (unit * 2.0 - 1.0) * 0.20; // ±20%
    let secs = (base.as_secs_f64() * (1.0 + fraction)).max(0.0);
    Duration::from_secs_f64(secs).max(MIN_SLEEP)
}

/// An event emitted by the [`LeaderElector`] loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionEvent {
    /// The lease was acquired; this process is now leader.
    Acquired,
    /// Leadership was lost (refused renewal or renewal failed).
    Lost,
    /// A `renew` call itself returned an error (as opposed to a plain
    /// refusal). Always accompanied by a following [`ElectionEvent::Lost`].
    RenewFailed,
}

/// Runs the acquire/renew loop against a [`LeaseStore`] and exposes the
/// current leadership flag to callers (typically a [`crate::Router`]).
pub struct LeaderElector {
    lease_store: Arc<dyn LeaseStore>,
    key: String,
    owner: String,
    ttl: Duration,
    renew_every: Duration,
    acquire_retry_interval: Duration,
    renew_failure_interval: Duration,
    is_leader: AtomicBool,
    events_tx: mpsc::Sender<ElectionEvent>,
}

impl LeaderElector {
    /// Construct an elector for `key`, identified as `owner`, holding a
    /// lease of `ttl` and renewing every `renew_every`. Returns the elector
    /// plus the receiving half of its bounded event channel.
    #[must_use]
    pub fn new(
        lease_store: Arc<dyn LeaseStore>,
        key: impl Into<String>,
        owner: impl Into<String>,
        ttl: Duration,
        renew_every: Duration,
    ) -> (Self, mpsc::Receiver<ElectionEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let elector = Self {
            lease_store,
            key: key.into(),
            owner: owner.into(),
            ttl,
            renew_every,
            acquire_retry_interval: Duration::from_secs(1),
            renew_failure_interval: Duration::from_millis(250),
            is_leader: AtomicBool::new(false),
            events_tx,
        };
        (elector, events_rx)
    }

    /// Is this process currently the elected leader?
    #[must_use]
    pub fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::SeqCst)
    }

    /// Run the acquire/renew loop until `cancel` fires, best-effort
    /// releasing the lease on the way out.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut tick: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                let _ = self.lease_store.release(&self.key, &self.owner).await;
                return;
            }

            let sleep_for = if self.is_leader() {
                self.tick_as_leader().await
            } else {
                self.tick_as_follower().await
            };

            tick = tick.wrapping_add(1);
            let jittered = deterministic_sleep(&self.owner, tick, sleep_for);
            tokio::select! {
                () = tokio::time::sleep(jittered) => {}
                () = cancel.cancelled() => {
                    let _ = self.lease_store.release(&self.key, &self.owner).await;
                    return;
                }
            }
        }
    }

    async fn tick_as_follower(&self) -> Duration {
        match self.lease_store.acquire(&self.key, &self.owner, self.ttl).await {
            Ok(true) => {
                self.is_leader.store(true, Ordering::SeqCst);
                self.emit(ElectionEvent::Acquired);
                self.renew_every
            }
            _ => self.acquire_retry_interval,
        }
    }

    async fn tick_as_leader(&self) -> Duration {
        match self.lease_store.renew(&self.key, &self.owner, self.ttl).await {
            Ok(true) => self.renew_every,
            Ok(false) => {
                self.is_leader.store(false, Ordering::SeqCst);
                self.emit(ElectionEvent::Lost);
                self.renew_failure_interval
            }
            Err(_) => {
                self.is_leader.store(false, Ordering::SeqCst);
                self.emit(ElectionEvent::RenewFailed);
                self.emit(ElectionEvent::Lost);
                self.renew_failure_interval
            }
        }
    }

    fn emit(&self, event: ElectionEvent) {
        let _ = self.events_tx.try_send(event);
    }
}
