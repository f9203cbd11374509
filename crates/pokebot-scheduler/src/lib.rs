//! # Pokebot Scheduler
//!
//! Persisted target sets and the daily batch runs driven from them.
//!
//! ```text
//! ScheduleSlot (one active handle)
//!   ├── CronSchedule: "0 0 * * *" in local time
//!   └── IntervalSchedule: every 24h (fallback)
//!         └── BatchRunner::run_batch
//!               ├── Manual → TargetStore (targets.json, one namespace per feature)
//!               ├── Auto   → BatchAction::discover (live list from the backend)
//!               └── for each id: BatchAction::run_one, pause, next → "x/y succeeded"
//! ```

pub mod batch;
pub mod cron;
pub mod schedule;
pub mod store;

pub use batch::{BatchAction, BatchReport, BatchRunner};
pub use cron::CronSpec;
pub use schedule::{CronSchedule, IntervalSchedule, Job, Schedule, ScheduleHandle, ScheduleSlot};
pub use store::{TargetStore, is_valid_id, parse_target};
