// SPDX-License-Identifier: MIT OR Apache-2.0
use async_trait::async_trait;
use chartly_error::ChartlyError;
use chartly_router::{Action, LeaderElector, LeaseStore, Router};
use chartly_runtime::CancellationToken;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct AlwaysGrant(AtomicBool);

#[async_trait]
impl LeaseStore for AlwaysGrant {
    async fn acquire(&self, _key: &str, _owner: &str, _ttl: Duration) -> Result<bool, ChartlyError> {
        Ok(self.0.load(Ordering::SeqCst))
    }

    async fn renew(&self, _key: &str, _owner: &str, _ttl: Duration) -> Result<bool, ChartlyError> {
        Ok(true)
    }

    async fn release(&self, _key: &str, _owner: &str) -> Result<(), ChartlyError> {
        Ok(())
    }
}

#[tokio::test]
async fn router_defers_every_decision_until_leadership_is_acquired() {
    let lease_store = Arc::new(AlwaysGrant(AtomicBool::new(false)));
    let (elector, _events) =
        LeaderElector::new(lease_store.clone(), "shard-0", "owner-1", Duration::from_secs(10), Duration::from_secs(3));
    let elector = Arc::new(elector);
    let router = Router::new(4).with_elector(elector.clone()).with_thresholds(10, 20, 30);

    assert_eq!(router.decide("tenant-a", "job-1", 1).action, Action::Defer);
    assert_eq!(router.decide("tenant-a", "job-1", 1).reason, "not_leader");

    lease_store.0.store(true, Ordering::SeqCst);
    let cancel = CancellationToken::new();
    let runner = {
        let elector = elector.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { elector.run(cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    let _ = runner.await;

    assert!(elector.is_leader());
    assert_eq!(router.decide("tenant-a", "job-1", 1).action, Action::RouteLocal);
}
