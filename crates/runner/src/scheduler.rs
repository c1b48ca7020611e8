use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant};
use tracing::{info, warn};

use crate::workflow::{Process, WorkflowManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScheduleReport {
    pub ticks: usize,
    pub failures: usize,
    pub stopped_by_signal: bool,
}

/// Fixed-interval runner. The first tick fires immediately; each later tick
/// is due `interval` after the previous tick started. A tick due at elapsed
/// time `t` only fires while `t <= duration`, and a zero duration never
/// expires.
pub struct Scheduler {
    interval: Duration,
    duration: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration, duration: Duration) -> Self {
        Self { interval, duration }
    }

    /// `job` receives the 1-based tick number and reports success. Setting
    /// the stop channel to `true` lets the in-flight tick finish and then
    /// stops.
    pub async fn run<F, Fut>(&self, mut stop: watch::Receiver<bool>, mut job: F) -> ScheduleReport
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = bool>,
    {
        let start = Instant::now();
        let mut next_due = start;
        let mut report = ScheduleReport::default();

        info!(
            interval_secs = self.interval.as_secs(),
            duration_secs = self.duration.as_secs(),
            "Scheduler started"
        );

        loop {
            if !self.duration.is_zero() && next_due.duration_since(start) > self.duration {
                info!(ticks = report.ticks, "Schedule duration elapsed");
                break;
            }

            tokio::select! {
                _ = time::sleep_until(next_due) => {}
                _ = stop_requested(&mut stop) => {
                    report.stopped_by_signal = true;
                    break;
                }
            }

            let tick_start = Instant::now();
            report.ticks += 1;
            info!(tick = report.ticks, "Scheduled run starting");

            if job(report.ticks).await {
                info!(tick = report.ticks, elapsed_ms = tick_start.elapsed().as_millis(), "Scheduled run finished");
            } else {
                report.failures += 1;
                warn!(tick = report.ticks, "Scheduled run finished with failures");
            }

            if *stop.borrow() {
                report.stopped_by_signal = true;
                break;
            }

            next_due = tick_start + self.interval;
        }

        if report.stopped_by_signal {
            info!(ticks = report.ticks, "Scheduler stopped by signal");
        }
        report
    }
}

/// Resolves once the channel holds `true`. A dropped sender can never stop
/// the schedule, so that case waits forever.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Run the workflow for `process` on a fixed interval
pub async fn schedule(
    manager: &WorkflowManager,
    process: Process,
    interval: Duration,
    duration: Duration,
    stop: watch::Receiver<bool>,
) -> ScheduleReport {
    Scheduler::new(interval, duration)
        .run(stop, move |_| async move { manager.run(process).await.is_success() })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_bounded_schedule_runs_three_times() {
        let (_tx, rx) = watch::channel(false);
        let fired = RefCell::new(Vec::new());
        let start = Instant::now();

        let report = Scheduler::new(5 * MINUTE, 10 * MINUTE)
            .run(rx, |_| {
                fired.borrow_mut().push(start.elapsed());
                async { true }
            })
            .await;

        assert_eq!(report.ticks, 3);
        assert_eq!(report.failures, 0);
        assert!(!report.stopped_by_signal);
        assert_eq!(*fired.borrow(), vec![Duration::ZERO, 5 * MINUTE, 10 * MINUTE]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_indefinite_schedule_until_stop() {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            time::sleep(3 * MINUTE + MINUTE / 2).await;
            tx.send(true).ok();
        });

        let report = Scheduler::new(MINUTE, Duration::ZERO)
            .run(rx, |_| async { true })
            .await;

        // ticks at 0, 1, 2 and 3 minutes
        assert_eq!(report.ticks, 4);
        assert!(report.stopped_by_signal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_timeline() {
        let (_tx, rx) = watch::channel(false);
        let report = Scheduler::new(MINUTE, 2 * MINUTE)
            .run(rx, |tick| async move { tick != 2 })
            .await;

        assert_eq!(report.ticks, 3);
        assert_eq!(report.failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_delays_next_tick() {
        let (_tx, rx) = watch::channel(false);
        let fired = RefCell::new(Vec::new());
        let start = Instant::now();

        let report = Scheduler::new(MINUTE, 3 * MINUTE)
            .run(rx, |tick| {
                fired.borrow_mut().push(start.elapsed());
                async move {
                    if tick == 1 {
                        time::sleep(2 * MINUTE + MINUTE / 2).await;
                    }
                    true
                }
            })
            .await;

        // the second tick fires late, at 2.5 minutes; the next would be due at 3.5
        assert_eq!(report.ticks, 2);
        assert_eq!(*fired.borrow(), vec![Duration::ZERO, 2 * MINUTE + MINUTE / 2]);
    }
}
