//! Batch runs of one external action over a list of ids.
//!
//! The id list comes from the target store (manual mode) or from the
//! backend at run time (auto mode). Items run in order with a fixed delay
//! between them; a failed item is logged and skipped, never fatal.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pokebot_core::config::BatchMode;
use pokebot_core::error::Result;

use crate::schedule::{Schedule, ScheduleSlot, job};
use crate::store::TargetStore;

/// Per-id action a batch runs, plus how to discover ids in auto mode.
#[async_trait]
pub trait BatchAction: Send + Sync {
    /// Run the action for one id.
    async fn run_one(&self, id: &str) -> Result<()>;

    /// The live id list used in auto mode.
    async fn discover(&self) -> Result<Vec<String>>;
}

/// Outcome of one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub total: usize,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.total - self.succeeded
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.succeeded, self.total)
    }
}

/// One batch feature: its namespace in the target store, its action and its schedule.
pub struct BatchRunner {
    namespace: String,
    mode: BatchMode,
    store: Arc<TargetStore>,
    action: Arc<dyn BatchAction>,
    item_delay: Duration,
    slot: ScheduleSlot,
}

impl BatchRunner {
    pub fn new(
        namespace: &str,
        mode: BatchMode,
        store: Arc<TargetStore>,
        action: Arc<dyn BatchAction>,
        item_delay: Duration,
    ) -> Self {
        Self {
            namespace: namespace.to_string(),
            mode,
            store,
            action,
            item_delay,
            slot: ScheduleSlot::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    pub fn store(&self) -> &Arc<TargetStore> {
        &self.store
    }

    pub fn action(&self) -> &Arc<dyn BatchAction> {
        &self.action
    }

    /// Ids for one run. Auto mode asks the backend; otherwise the stored set.
    pub async fn resolve_ids(&self) -> Vec<String> {
        match self.mode {
            BatchMode::Auto => match self.action.discover().await {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::warn!("[{}] Failed to discover targets: {e}", self.namespace);
                    Vec::new()
                }
            },
            BatchMode::Manual | BatchMode::Off => self.store.get(&self.namespace).await,
        }
    }

    /// Resolve the id list and run the action over it.
    pub async fn run_batch(&self) -> BatchReport {
        let ids = self.resolve_ids().await;
        if ids.is_empty() {
            tracing::info!("[{}] No targets ({} mode), nothing to do", self.namespace, self.mode);
            return BatchReport::default();
        }
        self.run_ids(&ids).await
    }

    /// Run the action over `ids` in order, pausing between items.
    pub async fn run_ids(&self, ids: &[String]) -> BatchReport {
        let mut report = BatchReport {
            succeeded: 0,
            total: ids.len(),
        };
        for (i, id) in ids.iter().enumerate() {
            if i > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }
            match self.action.run_one(id).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => tracing::warn!("[{}] {id} failed: {e}", self.namespace),
            }
        }
        tracing::info!("[{}] Batch finished: {report} succeeded", self.namespace);
        report
    }

    /// Install the recurring run if the mode calls for one.
    /// Returns whether a schedule was installed.
    pub fn start(self: &Arc<Self>, schedule: &dyn Schedule) -> bool {
        if !self.mode.is_recurring() {
            self.slot.dispose();
            return false;
        }
        let runner = Arc::downgrade(self);
        self.slot.install(
            schedule,
            job(move || {
                let runner = runner.clone();
                async move {
                    if let Some(runner) = runner.upgrade() {
                        runner.run_batch().await;
                    }
                }
            }),
        );
        tracing::info!(
            "[{}] Daily batch scheduled ({}, {} mode)",
            self.namespace,
            schedule.describe(),
            self.mode
        );
        true
    }

    pub fn is_scheduled(&self) -> bool {
        self.slot.is_active()
    }

    /// Stop the recurring run. Safe to call repeatedly.
    pub fn dispose(&self) {
        self.slot.dispose();
    }
}
