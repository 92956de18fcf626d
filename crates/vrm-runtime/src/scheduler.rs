//! Fixed-interval background tasks.
//!
//! A run is never interrupted: shutdown is only observed between runs, and a
//! failing or panicking run is logged without stopping the schedule.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vrm_core::Result;

/// Run `task` every `period`, the first time right away
pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    shutdown: CancellationToken,
    task: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    spawn_periodic_after(name, Duration::ZERO, period, shutdown, task)
}

/// Run `task` every `period`, the first time after `first_delay`
pub fn spawn_periodic_after<F, Fut>(
    name: &'static str,
    first_delay: Duration,
    period: Duration,
    shutdown: CancellationToken,
    task: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut timer = time::interval_at(Instant::now() + first_delay, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(task = name, period_secs = period.as_secs(), "Scheduled periodic task");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(task = name, "Periodic task shut down");
                    break;
                }
                _ = timer.tick() => {}
            }

            match AssertUnwindSafe(task()).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(task = name, error = %e, "Periodic task run failed"),
                Err(_) => error!(task = name, "Periodic task panicked"),
            }
        }
    })
}

/// Time left until the next multiple of `range_minutes` since midnight UTC
pub fn delay_to_next_boundary(now: DateTime<Utc>, range_minutes: u64) -> Duration {
    let range_secs = range_minutes.max(1) * 60;
    let since_midnight = now.timestamp().rem_euclid(86_400) as u64;
    let into_range = since_midnight % range_secs;
    Duration::from_secs(range_secs - into_range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use vrm_core::VrmError;

    #[tokio::test(start_paused = true)]
    async fn test_runs_every_period_until_shutdown() {
        let runs = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let counter = runs.clone();
        let handle = spawn_periodic("count", Duration::from_secs(10), shutdown.clone(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        time::sleep(Duration::from_secs(25)).await;
        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_and_panics_do_not_stop_schedule() {
        let runs = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let counter = runs.clone();
        let handle = spawn_periodic("flaky", Duration::from_secs(1), shutdown.clone(), move || {
            let counter = counter.clone();
            async move {
                match counter.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(VrmError::Operation("first run failed".to_string())),
                    1 => panic!("second run panicked"),
                    _ => Ok(()),
                }
            }
        });

        time::sleep(Duration::from_millis(3500)).await;
        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_delay_to_next_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 10, 20, 0).unwrap();
        assert_eq!(delay_to_next_boundary(now, 60), Duration::from_secs(40 * 60));
        assert_eq!(
            delay_to_next_boundary(now, 1440),
            Duration::from_secs((13 * 60 + 40) * 60)
        );
        let on_boundary = Utc.with_ymd_and_hms(2024, 1, 5, 11, 0, 0).unwrap();
        assert_eq!(delay_to_next_boundary(on_boundary, 60), Duration::from_secs(3600));
    }
}
