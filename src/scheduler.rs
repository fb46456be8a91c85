//! Periodic background tasks
//!
//! Every timer the signage runs (slide advance, ayat rotation, midnight
//! reload) is a tokio task with a stop handle. Each periodic tick runs as
//! its own task, so a slow tick never holds back the next one. Stopping
//! aborts whatever is still in flight.

use chrono::{DateTime, Duration as ChronoDuration, Local, TimeZone};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

/// Handle to a running task
pub struct TaskHandle {
    name: &'static str,
    stop: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        !self.join.is_finished()
    }

    /// Signal the task and wait for it to exit
    pub async fn stop(self) {
        // Err means the task already exited
        let _ = self.stop.send(true);
        if let Err(e) = self.join.await {
            tracing::warn!("Task {} ended abnormally: {}", self.name, e);
        }
        tracing::debug!("Task {} stopped", self.name);
    }
}

/// Run `tick` every `period`, first after one full period
pub fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> TaskHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (stop, mut stopped) = watch::channel(false);

    let join = tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight = JoinSet::new();
        tracing::info!("Task {} started (every {:?})", name, period);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    in_flight.spawn(tick());
                }
                Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = result {
                        tracing::warn!("Task {} tick ended abnormally: {}", name, e);
                    }
                }
                // Also fires when the handle is dropped
                _ = stopped.changed() => break,
            }
        }

        if !in_flight.is_empty() {
            tracing::debug!("Task {}: aborting {} running ticks", name, in_flight.len());
        }
        in_flight.shutdown().await;
    });

    TaskHandle { name, stop, join }
}

/// Time from `now` until the next local midnight
pub fn until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    let fallback = Duration::from_secs(24 * 60 * 60);

    let Some(tomorrow) = now.date_naive().succ_opt() else {
        return fallback;
    };
    let Some(midnight) = tomorrow.and_hms_opt(0, 0, 0) else {
        return fallback;
    };

    // DST can skip midnight; the earliest valid instant after it is close enough
    let next = match now.timezone().from_local_datetime(&midnight).earliest() {
        Some(next) => next,
        None => now.clone() + ChronoDuration::hours(24),
    };

    (next - now.clone()).to_std().unwrap_or(fallback)
}

/// Run `reload` at every local midnight
pub fn spawn_at_midnight<F, Fut>(name: &'static str, mut reload: F) -> TaskHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (stop, mut stopped) = watch::channel(false);

    let join = tokio::spawn(async move {
        loop {
            let wait = until_next_midnight(&Local::now());
            tracing::info!("Task {}: next run in {} minutes", name, wait.as_secs() / 60);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = stopped.changed() => break,
            }

            tokio::select! {
                _ = reload() => {}
                _ = stopped.changed() => break,
            }
        }
    });

    TaskHandle { name, stop, join }
}
