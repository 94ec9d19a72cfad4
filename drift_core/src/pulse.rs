//! Background entropy pulse.
//!
//! A task that sleeps for one period through the environment context, then
//! ticks the coordinator. A tick waits for the exclusive section like any
//! other operation, so a busy coordinator delays a firing but never drops it.

use crate::coordinator::DriftCoordinator;
use drift_env::DriftContext;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Control handle for a running pulse.
#[derive(Debug, Clone, Default)]
pub struct PulseHandle {
    stop: Arc<AtomicBool>,
    firings: Arc<AtomicU64>,
}

impl PulseHandle {
    /// Asks the pulse to exit after its current sleep.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Number of ticks applied so far.
    pub fn firings(&self) -> u64 {
        self.firings.load(Ordering::SeqCst)
    }
}

/// Spawns the entropy pulse on the coordinator's context.
pub fn spawn_entropy_pulse<Ctx: DriftContext>(
    coordinator: Arc<DriftCoordinator<Ctx>>,
    period: Duration,
) -> PulseHandle {
    let handle = PulseHandle::default();
    let stop = Arc::clone(&handle.stop);
    let firings = Arc::clone(&handle.firings);
    let ctx = Arc::clone(coordinator.context());

    info!(period_ms = period.as_millis() as u64, "Entropy pulse started");

    ctx.clone().spawn("entropy_pulse", async move {
        loop {
            ctx.sleep(period).await;
            if stop.load(Ordering::SeqCst) {
                break;
            }
            coordinator.tick();
            let n = firings.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(firing = n, "Entropy pulse fired");
        }
        info!(firings = firings.load(Ordering::SeqCst), "Entropy pulse stopped");
    });

    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_env::{SimContext, TokioContext};

    async fn wait_for(handle: &PulseHandle, firings: u64) {
        let waiting = async {
            while handle.firings() < firings {
                tokio::task::yield_now().await;
            }
        };
        tokio::time::timeout(Duration::from_secs(10), waiting)
            .await
            .expect("pulse did not fire in time");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pulse_advances_virtual_time() {
        let ctx = SimContext::shared(31);
        let coord = Arc::new(DriftCoordinator::new(Arc::clone(&ctx)));

        let pulse = spawn_entropy_pulse(Arc::clone(&coord), Duration::from_secs(5));
        wait_for(&pulse, 10).await;
        pulse.stop();

        assert!(pulse.is_stopped());
        assert!(ctx.now() >= Duration::from_secs(50));
        assert!(coord.field().is_within_bounds());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pulse_contends_with_lifecycle() {
        let ctx = SimContext::shared(32);
        let coord = Arc::new(DriftCoordinator::new(ctx));
        let pulse = spawn_entropy_pulse(Arc::clone(&coord), Duration::from_millis(10));

        for _ in 0..100 {
            coord.fork(None);
            tokio::task::yield_now().await;
        }
        wait_for(&pulse, 5).await;
        pulse.stop();

        let log = coord.operation_log();
        assert_eq!(log.len(), 100);
        assert!(log.iter().all(|r| (0.0..=1.0).contains(&r.global_flux)));
    }

    #[tokio::test]
    async fn test_pulse_real_clock() {
        let coord = Arc::new(DriftCoordinator::new(TokioContext::shared()));
        let pulse = spawn_entropy_pulse(Arc::clone(&coord), Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(100)).await;
        pulse.stop();
        let stopped_at = pulse.firings();
        assert!(stopped_at >= 3);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(pulse.firings() <= stopped_at + 1);
    }
}
