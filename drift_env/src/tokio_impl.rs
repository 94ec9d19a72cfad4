//! Production implementation of DriftContext using Tokio.

use crate::DriftContext;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Production context backed by Tokio and OS entropy.
///
/// Time comes from the system clock, randomness from a freshly
/// OS-seeded `StdRng` per requested stream.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DriftContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn spawn<F>(&self, _name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(future);
    }

    fn entropy_source(&self, _stream: u64) -> Box<dyn RngCore + Send> {
        Box::new(StdRng::from_entropy())
    }

    fn seed(&self) -> u64 {
        // Production is not seeded
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_uses_real_clock() {
        let ctx = TokioContext::shared();
        let before = ctx.now();
        ctx.sleep(Duration::from_millis(15)).await;

        assert!(ctx.now() - before >= Duration::from_millis(15));
    }

    #[test]
    fn test_entropy_is_unseeded() {
        let ctx = TokioContext::new();
        let mut a = ctx.entropy_source(1);
        let mut b = ctx.entropy_source(1);

        // Same stream id, independent OS seeds
        assert_ne!(a.next_u64(), b.next_u64());
        assert_eq!(ctx.seed(), 0);
    }

    #[test]
    fn test_wall_clock_timestamps() {
        let ctx = TokioContext::default();
        // Any time after 2024-01-01
        assert!(ctx.timestamp_ms() > 1_704_067_200_000);
    }
}
