// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::cron::CronSchedule;
use crate::job::{CronJob, Enqueuer, JobRequest, JobsProvider};
use chartly_error::ChartlyError;
use chartly_runtime::CancellationToken;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use chrono_tz::Tz;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Prune threshold: either cache is cleared once it grows past this many
/// entries, bounding memory for tenants with long-lived, high-churn job
/// sets. The spec does not define a partial-eviction policy, so pruning
/// clears the whole cache rather than guessing an LRU order.
pub const MAX_CACHE_ENTRIES: usize = 5000;

/// One job firing, returned by [`Scheduler::tick`] for observability and
/// testing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredJob {
    /// Tenant the job belongs to.
    pub tenant: String,
    /// Job name.
    pub name: String,
    /// The scheduled minute that fired, in UTC.
    pub next_run: DateTime<Utc>,
}

/// Polls a [`JobsProvider`], evaluates each enabled job's cron schedule in
/// its configured timezone, and enqueues work through an [`Enqueuer`] the
/// first time a scheduled minute becomes due.
pub struct Scheduler {
    jobs_provider: Arc<dyn JobsProvider>,
    enqueuer: Arc<dyn Enqueuer>,
    default_tz: Tz,
    max_lookahead: ChronoDuration,
    poll_interval: Duration,
    poll_jitter_pct: u8,
    next_run_cache: Mutex<HashMap<(String, String), DateTime<Utc>>>,
    fired_cache: Mutex<HashSet<(String, String, i64)>>,
}

impl Scheduler {
    /// Construct a scheduler. `default_tz` is the fallback timezone used
    /// when a job's `timezone` is empty or unparseable, itself falling back
    /// to UTC if `default_tz` somehow fails to resolve.
    #[must_use]
    pub fn new(
        jobs_provider: Arc<dyn JobsProvider>,
        enqueuer: Arc<dyn Enqueuer>,
        default_tz: Tz,
        max_lookahead: ChronoDuration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            jobs_provider,
            enqueuer,
            default_tz,
            max_lookahead,
            poll_interval,
            poll_jitter_pct: 20,
            next_run_cache: Mutex::new(HashMap::new()),
            fired_cache: Mutex::new(HashSet::new()),
        }
    }

    /// Override the poll-interval jitter percentage (clamped to 50 inside
    /// [`chartly_retry::apply_jitter`]).
    #[must_use]
    pub fn with_poll_jitter_pct(mut self, pct: u8) -> Self {
        self.poll_jitter_pct = pct;
        self
    }

    /// Poll the jobs provider once and fire every job whose schedule has
    /// become due and has not yet fired for its scheduled minute.
    ///
    /// # Errors
    ///
    /// Returns [`ChartlyError`] only if [`JobsProvider::jobs`] itself fails;
    /// individual job evaluation/enqueue failures are handled per-job and
    /// never abort the tick.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<Vec<FiredJob>, ChartlyError> {
        let jobs = self.jobs_provider.jobs().await?;
        let mut fired = Vec::new();

        for job in &jobs {
            if !job.enabled {
                continue;
            }
            let Ok(cron) = CronSchedule::parse(&job.cron) else { continue };
            let tz = self.resolve_timezone(&job.timezone);
            let key = (job.tenant.clone(), job.name.clone());

            let next_run = match self.cached_next_run(&key) {
                Some(cached) => cached,
                None => {
                    let now_in_tz = now.with_timezone(&tz);
                    let Some(computed) = cron.next_run_after(&now_in_tz) else { continue };
                    let computed_utc = computed.with_timezone(&Utc);
                    self.store_next_run(key.clone(), computed_utc);
                    computed_utc
                }
            };

            if next_run > now + self.max_lookahead {
                continue;
            }

            let unix_minute = next_run.timestamp() / 60;
            let dedup_key = (job.tenant.clone(), job.name.clone(), unix_minute);
            if self.already_fired(&dedup_key) {
                continue;
            }

            let request = JobRequest { source_id: job.source_id.clone(), job_type: job.job_type.clone() };
            if self.enqueuer.enqueue(&job.tenant, request).await.is_err() {
                // Leave caches intact; the next tick retries this job.
                continue;
            }

            self.mark_fired(dedup_key);
            fired.push(FiredJob { tenant: job.tenant.clone(), name: job.name.clone(), next_run });

            let next_run_in_tz = next_run.with_timezone(&tz);
            match cron.next_run_after(&next_run_in_tz) {
                Some(subsequent) => self.store_next_run(key, subsequent.with_timezone(&Utc)),
                None => {
                    self.next_run_cache.lock().expect("lock poisoned").remove(&key);
                }
            }
        }

        Ok(fired)
    }

    /// Run [`Scheduler::tick`] on a jittered `poll_interval` cadence until
    /// `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                return;
            }
            let _ = self.tick(now_utc()).await;
            let sleep_for = chartly_retry::apply_jitter(
                self.poll_interval,
                self.poll_jitter_pct,
                &["scheduler-poll-interval"],
            );
            tokio::select! {
                () = tokio::time::sleep(sleep_for) => {}
                () = cancel.cancelled() => return,
            }
        }
    }

    fn resolve_timezone(&self, job_tz: &str) -> Tz {
        if job_tz.is_empty() {
            return self.default_tz;
        }
        Tz::from_str(job_tz).unwrap_or(self.default_tz)
    }

    fn cached_next_run(&self, key: &(String, String)) -> Option<DateTime<Utc>> {
        self.next_run_cache.lock().expect("lock poisoned").get(key).copied()
    }

    fn store_next_run(&self, key: (String, String), value: DateTime<Utc>) {
        let mut cache = self.next_run_cache.lock().expect("lock poisoned");
        if cache.len() >= MAX_CACHE_ENTRIES {
            cache.clear();
        }
        cache.insert(key, value);
    }

    fn already_fired(&self, dedup_key: &(String, String, i64)) -> bool {
        self.fired_cache.lock().expect("lock poisoned").contains(dedup_key)
    }

    fn mark_fired(&self, dedup_key: (String, String, i64)) {
        let mut cache = self.fired_cache.lock().expect("lock poisoned");
        if cache.len() >= MAX_CACHE_ENTRIES {
            cache.clear();
        }
        cache.insert(dedup_key);
    }
}

fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedJobs(Vec<CronJob>);

    #[async_trait]
    impl JobsProvider for FixedJobs {
        async fn jobs(&self) -> Result<Vec<CronJob>, ChartlyError> {
            Ok(self.0.clone())
        }
    }

    struct CountingEnqueuer {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Enqueuer for CountingEnqueuer {
        async fn enqueue(&self, _tenant: &str, _request: JobRequest) -> Result<(), ChartlyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ChartlyError::new(chartly_error::ErrorCode::DependencyDown, "enqueue failed"))
            } else {
                Ok(())
            }
        }
    }

    fn job(tenant: &str, name: &str, cron: &str) -> CronJob {
        CronJob {
            tenant: tenant.to_string(),
            name: name.to_string(),
            cron: cron.to_string(),
            timezone: String::new(),
            enabled: true,
            source_id: "src-1".to_string(),
            job_type: "report".to_string(),
        }
    }

    #[tokio::test]
    async fn due_job_fires_exactly_once_for_its_scheduled_minute() {
        let jobs = Arc::new(FixedJobs(vec![job("tenant-a", "nightly", "* * * * *")]));
        let enqueuer = Arc::new(CountingEnqueuer { calls: AtomicUsize::new(0), fail: false });
        let scheduler = Scheduler::new(
            jobs,
            enqueuer.clone(),
            Tz::UTC,
            ChronoDuration::minutes(5),
            Duration::from_secs(30),
        );

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let fired_first = scheduler.tick(now).await.unwrap();
        assert_eq!(fired_first.len(), 1);

        let fired_second = scheduler.tick(now + ChronoDuration::seconds(10)).await.unwrap();
        assert!(fired_second.is_empty());
        assert_eq!(enqueuer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn every_minute_job_advances_next_run_by_exactly_one_minute_per_tick() {
        let jobs = Arc::new(FixedJobs(vec![job("tenant-a", "nightly", "* * * * *")]));
        let enqueuer = Arc::new(CountingEnqueuer { calls: AtomicUsize::new(0), fail: false });
        let scheduler = Scheduler::new(
            jobs,
            enqueuer.clone(),
            Tz::UTC,
            ChronoDuration::minutes(5),
            Duration::from_secs(30),
        );

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut fired_minutes = Vec::new();
        for minute in 0..5 {
            let now = start + ChronoDuration::minutes(minute);
            let fired = scheduler.tick(now).await.unwrap();
            assert_eq!(fired.len(), 1, "expected a fire at minute offset {minute}");
            fired_minutes.push(fired[0].next_run);
        }

        // A "* * * * *" schedule must fire every consecutive minute, never
        // skipping one, no matter how `next_run` was cached from the prior fire.
        for pair in fired_minutes.windows(2) {
            assert_eq!(pair[1] - pair[0], ChronoDuration::minutes(1));
        }
    }

    #[tokio::test]
    async fn disabled_jobs_never_fire() {
        let mut disabled = job("tenant-a", "nightly", "* * * * *");
        disabled.enabled = false;
        let jobs = Arc::new(FixedJobs(vec![disabled]));
        let enqueuer = Arc::new(CountingEnqueuer { calls: AtomicUsize::new(0), fail: false });
        let scheduler = Scheduler::new(
            jobs,
            enqueuer,
            Tz::UTC,
            ChronoDuration::minutes(5),
            Duration::from_secs(30),
        );
        let fired = scheduler.tick(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()).await.unwrap();
        assert!(fired.is_empty());
    }

    #[tokio::test]
    async fn enqueue_failure_leaves_the_cache_intact_for_a_retry() {
        let jobs = Arc::new(FixedJobs(vec![job("tenant-a", "nightly", "* * * * *")]));
        let enqueuer = Arc::new(CountingEnqueuer { calls: AtomicUsize::new(0), fail: true });
        let scheduler = Scheduler::new(
            jobs,
            enqueuer.clone(),
            Tz::UTC,
            ChronoDuration::minutes(5),
            Duration::from_secs(30),
        );

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let first = scheduler.tick(now).await.unwrap();
        assert!(first.is_empty());
        let second = scheduler.tick(now).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(enqueuer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn job_outside_lookahead_window_does_not_fire_yet() {
        let jobs = Arc::new(FixedJobs(vec![job("tenant-a", "hourly", "0 * * * *")]));
        let enqueuer = Arc::new(CountingEnqueuer { calls: AtomicUsize::new(0), fail: false });
        let scheduler = Scheduler::new(
            jobs,
            enqueuer.clone(),
            Tz::UTC,
            ChronoDuration::seconds(30),
            Duration::from_secs(30),
        );
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let fired = scheduler.tick(now).await.unwrap();
        assert!(fired.is_empty());
        assert_eq!(enqueuer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unparseable_job_timezone_falls_back_to_the_configured_default() {
        let mut j = job("tenant-a", "nightly", "* * * * *");
        j.timezone = "Not/AZone".to_string();
        let jobs = Arc::new(FixedJobs(vec![j]));
        let enqueuer = Arc::new(CountingEnqueuer { calls: AtomicUsize::new(0), fail: false });
        let scheduler = Scheduler::new(
            jobs,
            enqueuer.clone(),
            Tz::UTC,
            ChronoDuration::minutes(5),
            Duration::from_secs(30),
        );
        let fired = scheduler.tick(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()).await.unwrap();
        assert_eq!(fired.len(), 1);
    }
}
