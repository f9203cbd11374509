//! Recurring schedules with disposable handles.
//!
//! Two strategies share the [`Schedule`] interface: [`CronSchedule`] fires
//! on a cron expression in local time, [`IntervalSchedule`] fires every
//! fixed period. [`from_config`] picks cron when it is enabled and the
//! expression parses, and the interval timer otherwise.
//!
//! Disposing a handle stops further runs from starting. A run that is
//! already in progress is left to finish.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Local;
use futures::future::BoxFuture;
use pokebot_core::config::ScheduleConfig;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use crate::cron::CronSpec;

/// A unit of scheduled work.
pub type Job = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Wrap an async closure as a [`Job`].
pub fn job<F, Fut>(f: F) -> Job
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move || -> BoxFuture<'static, ()> { Box::pin(f()) })
}

/// A way of running a job repeatedly.
pub trait Schedule: Send + Sync {
    fn describe(&self) -> String;

    /// Spawn the recurring job. Must be called inside a tokio runtime.
    fn start(&self, job: Job) -> ScheduleHandle;
}

/// Cron-driven schedule, evaluated in local time.
pub struct CronSchedule {
    spec: CronSpec,
}

impl CronSchedule {
    pub fn new(spec: CronSpec) -> Self {
        Self { spec }
    }
}

impl Schedule for CronSchedule {
    fn describe(&self) -> String {
        format!("cron '{}'", self.spec)
    }

    fn start(&self, job: Job) -> ScheduleHandle {
        let (stop_tx, mut stop_rx) = watch::channel(());
        let spec = self.spec.clone();
        let label = self.describe();

        tokio::spawn(async move {
            loop {
                let now = Local::now();
                let Some(next) = spec.next_after(&now) else {
                    tracing::warn!("Cron '{spec}' never fires again, stopping");
                    break;
                };
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                tracing::debug!("Next run of cron '{spec}' at {next}");

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = stop_rx.changed() => break,
                }
                if stop_rx.has_changed().is_err() {
                    break;
                }
                job().await;
            }
        });

        ScheduleHandle::new(label, stop_tx)
    }
}

/// Fixed-period timer. The first run happens one period after start.
pub struct IntervalSchedule {
    period: Duration,
}

impl IntervalSchedule {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
        }
    }
}

impl Schedule for IntervalSchedule {
    fn describe(&self) -> String {
        format!("every {}s", self.period.as_secs_f64())
    }

    fn start(&self, job: Job) -> ScheduleHandle {
        let (stop_tx, mut stop_rx) = watch::channel(());
        let period = self.period;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_rx.changed() => break,
                }
                if stop_rx.has_changed().is_err() {
                    break;
                }
                job().await;
            }
        });

        ScheduleHandle::new(self.describe(), stop_tx)
    }
}

/// Pick the schedule for `config`: cron if enabled and valid, else the interval fallback.
pub fn from_config(config: &ScheduleConfig) -> Box<dyn Schedule> {
    if config.native_cron {
        match CronSpec::parse(&config.cron) {
            Ok(spec) => return Box::new(CronSchedule::new(spec)),
            Err(e) => tracing::warn!("{e}; falling back to interval timer"),
        }
    }
    Box::new(IntervalSchedule::new(Duration::from_secs(
        config.fallback_interval_secs,
    )))
}

/// Registration of a running schedule. Dropping it also stops the schedule.
pub struct ScheduleHandle {
    label: String,
    stop: Option<watch::Sender<()>>,
}

impl ScheduleHandle {
    fn new(label: String, stop: watch::Sender<()>) -> Self {
        Self {
            label,
            stop: Some(stop),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_active(&self) -> bool {
        self.stop.is_some()
    }

    /// Stop future runs. Safe to call more than once.
    pub fn dispose(&mut self) {
        // Dropping the sender wakes the task with a closed channel.
        if self.stop.take().is_some() {
            tracing::debug!("Schedule {} disposed", self.label);
        }
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Holds at most one active schedule. Installing a new one disposes the old first.
#[derive(Default)]
pub struct ScheduleSlot {
    current: Mutex<Option<ScheduleHandle>>,
}

impl ScheduleSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, schedule: &dyn Schedule, job: Job) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mut old) = current.take() {
            old.dispose();
        }
        *current = Some(schedule.start(job));
    }

    pub fn is_active(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| h.is_active())
    }

    pub fn label(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|h| h.label().to_string())
    }

    pub fn dispose(&self) {
        if let Some(mut handle) = self
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.dispose();
        }
    }
}
