// SPDX-License-Identifier: MIT OR Apache-2.0
use async_trait::async_trait;
use chartly_envelope::Envelope;

/// Business logic invoked for each dequeued [`Envelope`].
///
/// A handler returns `Err` with a short human-readable description; the
/// worker pool never inspects the string beyond passing it to the
/// configured retry policy and logging it.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process `envelope`. Return `Err` to trigger a retry/DLQ decision.
    async fn handle(&self, envelope: &Envelope) -> Result<(), String>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    pub struct CountingHandler {
        pub calls: Arc<AtomicUsize>,
        pub fail_until: usize,
    }

    #[async_trait]
    impl MessageHandler for CountingHandler {
        async fn handle(&self, _envelope: &Envelope) -> Result<(), String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_until {
                Err("simulated failure".to_string())
            } else {
                Ok(())
            }
        }
    }
}
