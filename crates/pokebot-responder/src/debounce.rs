//! Per-actor rate guards.
//!
//! Two independent caches:
//! - [`DebounceGuard`]: one per automatic feature (poke notice, message emoji);
//!   suppresses repeated automatic responses to the same actor.
//! - [`CooldownGuard`]: for human-issued commands; commands issued by an
//!   automatic response pass `triggered_by_system` and neither consult nor
//!   update it.
//!
//! Entries never expire; the maps are bounded by the number of distinct actors.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Minimum-interval guard keyed by actor id.
pub struct DebounceGuard {
    feature: String,
    last_seen: Mutex<HashMap<String, i64>>,
}

impl DebounceGuard {
    pub fn new(feature: &str) -> Self {
        Self {
            feature: feature.to_string(),
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Whether an event from `actor` at `now_ms` may pass. Records `now_ms` when it does.
    ///
    /// `min_interval_ms <= 0` disables the guard: always allowed, nothing recorded.
    pub fn allow(&self, actor: &str, now_ms: i64, min_interval_ms: i64) -> bool {
        if min_interval_ms <= 0 {
            return true;
        }

        let mut last_seen = self.last_seen.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(&last) = last_seen.get(actor)
            && now_ms - last < min_interval_ms
        {
            tracing::debug!(
                "[{}] {} debounced ({}ms since last, need {}ms)",
                self.feature,
                actor,
                now_ms - last,
                min_interval_ms
            );
            return false;
        }
        last_seen.insert(actor.to_string(), now_ms);
        true
    }

    /// Number of actors tracked.
    pub fn tracked(&self) -> usize {
        self.last_seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Result of a cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownDecision {
    /// Human-issued and outside the window; the use was recorded.
    Allowed,
    /// Issued by an automatic response; cooldown skipped, nothing recorded.
    Bypassed,
    /// Still inside the window.
    Cooling { remaining_ms: i64 },
}

impl CooldownDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, CooldownDecision::Cooling { .. })
    }
}

/// Per-actor cooldown for explicit command usage.
pub struct CooldownGuard {
    cooldown_ms: i64,
    last_command: Mutex<HashMap<String, i64>>,
}

impl CooldownGuard {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown_ms: i64::try_from(cooldown.as_millis()).unwrap_or(i64::MAX),
            last_command: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, actor: &str, now_ms: i64, triggered_by_system: bool) -> CooldownDecision {
        if triggered_by_system {
            return CooldownDecision::Bypassed;
        }
        if self.cooldown_ms <= 0 {
            return CooldownDecision::Allowed;
        }

        let mut last_command = self.last_command.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(&last) = last_command.get(actor) {
            let elapsed = now_ms - last;
            if elapsed < self.cooldown_ms {
                return CooldownDecision::Cooling {
                    remaining_ms: self.cooldown_ms - elapsed,
                };
            }
        }
        last_command.insert(actor.to_string(), now_ms);
        CooldownDecision::Allowed
    }

    /// Last recorded human command time for `actor`.
    pub fn last_used(&self, actor: &str) -> Option<i64> {
        self.last_command
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(actor)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_boundary() {
        let guard = DebounceGuard::new("poke");
        assert!(guard.allow("u1", 0, 1000));
        assert!(!guard.allow("u1", 999, 1000));

        let guard = DebounceGuard::new("poke");
        assert!(guard.allow("u1", 0, 1000));
        assert!(guard.allow("u1", 1000, 1000));
    }

    #[test]
    fn test_debounce_rejection_does_not_refresh() {
        let guard = DebounceGuard::new("poke");
        assert!(guard.allow("u1", 0, 1000));
        assert!(!guard.allow("u1", 600, 1000));
        // Window still measured from t=0.
        assert!(guard.allow("u1", 1000, 1000));
    }

    #[test]
    fn test_debounce_per_actor() {
        let guard = DebounceGuard::new("emoji");
        assert!(guard.allow("u1", 0, 1000));
        assert!(guard.allow("u2", 10, 1000));
        assert!(!guard.allow("u1", 20, 1000));
    }

    #[test]
    fn test_debounce_disabled_records_nothing() {
        let guard = DebounceGuard::new("poke");
        for t in 0..10 {
            assert!(guard.allow("u1", t, 0));
            assert!(guard.allow("u2", t, -5));
        }
        assert_eq!(guard.tracked(), 0);
    }

    #[test]
    fn test_cooldown_blocks_human_repeat() {
        let guard = CooldownGuard::new(Duration::from_secs(5));
        assert_eq!(guard.check("u1", 0, false), CooldownDecision::Allowed);
        assert_eq!(
            guard.check("u1", 2000, false),
            CooldownDecision::Cooling { remaining_ms: 3000 }
        );
        assert_eq!(guard.check("u1", 5000, false), CooldownDecision::Allowed);
    }

    #[test]
    fn test_system_trigger_bypasses_without_recording() {
        let guard = CooldownGuard::new(Duration::from_secs(5));
        assert_eq!(guard.check("u1", 0, true), CooldownDecision::Bypassed);
        assert_eq!(guard.last_used("u1"), None);
        // A human command right after is judged on its own.
        assert_eq!(guard.check("u1", 10, false), CooldownDecision::Allowed);
        assert_eq!(guard.last_used("u1"), Some(10));
        // And is still subject to cooldown afterwards.
        assert!(!guard.check("u1", 20, false).is_allowed());
        // System triggers are never blocked by it.
        assert_eq!(guard.check("u1", 30, true), CooldownDecision::Bypassed);
        assert_eq!(guard.last_used("u1"), Some(10));
    }

    #[test]
    fn test_zero_cooldown_always_allows() {
        let guard = CooldownGuard::new(Duration::ZERO);
        assert!(guard.check("u1", 0, false).is_allowed());
        assert!(guard.check("u1", 0, false).is_allowed());
        assert_eq!(guard.last_used("u1"), None);
    }
}
