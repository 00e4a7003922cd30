//! Periodic release of idle pooled memory.

use std::sync::Arc;
use std::time::Duration;

use iris_core::BufferPool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Trim `pool` every `interval` until `shutdown` fires. A zero interval
/// disables the task.
pub fn spawn(
    pool: Arc<BufferPool>,
    interval: Duration,
    log_stats: bool,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        tracing::info!("memory reclaim disabled");
        return None;
    }
    Some(tokio::spawn(run(pool, interval, log_stats, shutdown)))
}

async fn run(pool: Arc<BufferPool>, interval: Duration, log_stats: bool, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let freed = pool.trim();
                if log_stats {
                    let stats = pool.stats();
                    tracing::info!(
                        pool = pool.name(),
                        freed,
                        target = stats.target,
                        idle = stats.idle,
                        idle_bytes = stats.idle_bytes,
                        acquisitions = stats.acquisitions,
                        reused = stats.reused,
                        allocated = stats.allocated,
                        discarded = stats.discarded,
                        calibrations = stats.calibrations,
                        "memory stats"
                    );
                } else {
                    tracing::debug!(pool = pool.name(), freed, "idle buffers released");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iris_core::PoolSettings;

    #[tokio::test(start_paused = true)]
    async fn trims_on_each_tick_and_stops_on_shutdown() {
        let pool = BufferPool::new(PoolSettings::new("test", 1024).with_max_idle(4));
        drop((pool.acquire(10), pool.acquire(10)));
        assert_eq!(pool.stats().idle, 2);

        let shutdown = CancellationToken::new();
        let handle = spawn(pool.clone(), Duration::from_secs(60), true, shutdown.clone()).unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(pool.stats().idle, 2);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(pool.stats().idle, 0);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn zero_interval_disables_the_task() {
        let pool = BufferPool::new(PoolSettings::new("test", 1024));
        assert!(spawn(pool, Duration::ZERO, false, CancellationToken::new()).is_none());
    }
}
