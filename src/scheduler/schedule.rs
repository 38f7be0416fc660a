//! Per-model run schedule
//!
//! Pure state for the background loop: when each allowed model runs next,
//! plus the last seen auto-enable flag so the disabled-to-enabled edge can
//! be detected and stale schedules discarded.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;

/// Timing knobs for the background loop and its per-model schedule.
///
/// Production uses the defaults; tests inject shorter windows so loop
/// behavior can be observed without multi-second waits.
#[derive(Debug, Clone)]
pub struct SchedulerTiming {
    /// Tick period while enabled.
    pub tick: Duration,
    /// Longer backoff when no allowed models are configured or reachable.
    pub no_models_backoff: Duration,
    /// First run after (re)enable lands uniformly inside
    /// [`first_run_min`, `first_run_max`], so multiple models don't hit the
    /// endpoint at the same instant.
    pub first_run_min: Duration,
    pub first_run_max: Duration,
    /// Jitter added to every reschedule, de-synchronizing models that share
    /// an interval.
    pub reschedule_jitter_max: Duration,
    /// Floor on the effective interval; a misconfigured near-zero interval
    /// must not turn the loop into a tight retry.
    pub min_interval: Duration,
}

impl Default for SchedulerTiming {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(2),
            no_models_backoff: Duration::from_secs(5),
            first_run_min: Duration::from_secs(2),
            first_run_max: Duration::from_secs(20),
            reschedule_jitter_max: Duration::from_secs(15),
            min_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
pub struct Schedule {
    timing: SchedulerTiming,
    next_run: HashMap<String, Instant>,
    last_auto_enabled: Option<bool>,
}

impl Schedule {
    pub fn new(timing: SchedulerTiming) -> Self {
        Self {
            timing,
            next_run: HashMap::new(),
            last_auto_enabled: None,
        }
    }

    /// Remember that auto mode was off this tick.
    pub fn note_disabled(&mut self) {
        self.last_auto_enabled = Some(false);
    }

    /// Remember that auto mode is on. On the disabled-to-enabled edge all
    /// scheduled times are cleared: they may have been computed hours ago
    /// and would otherwise delay the first run arbitrarily.
    pub fn note_enabled(&mut self) {
        if self.last_auto_enabled == Some(false) {
            self.next_run.clear();
        }
        self.last_auto_enabled = Some(true);
    }

    /// Give every model without a scheduled time a randomized first run.
    /// Existing entries are left untouched.
    pub fn ensure_scheduled(&mut self, models: &[String], now: Instant) {
        for model in models {
            let delay = self.first_run_delay();
            self.next_run
                .entry(model.clone())
                .or_insert_with(|| now + delay);
        }
    }

    /// Drop entries for models no longer in the allowed set.
    pub fn prune(&mut self, models: &[String]) {
        self.next_run.retain(|model, _| models.iter().any(|m| m == model));
    }

    pub fn is_due(&self, model: &str, now: Instant) -> bool {
        self.next_run.get(model).is_some_and(|t| *t <= now)
    }

    /// Schedule the next run after an attempt:
    /// `now + max(min_interval, interval_minutes * 60s) + uniform jitter`.
    pub fn reschedule(&mut self, model: &str, interval_minutes: u64, now: Instant) {
        let base = Duration::from_secs(interval_minutes * 60).max(self.timing.min_interval);
        let jitter = self.reschedule_jitter();
        self.next_run.insert(model.to_string(), now + base + jitter);
    }

    #[cfg(test)]
    pub fn next_run_at(&self, model: &str) -> Option<Instant> {
        self.next_run.get(model).copied()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.next_run.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.next_run.is_empty()
    }

    fn first_run_delay(&self) -> Duration {
        let min = self.timing.first_run_min.as_secs_f64();
        let max = self.timing.first_run_max.as_secs_f64();
        Duration::from_secs_f64(rand::rng().random_range(min..=max))
    }

    fn reschedule_jitter(&self) -> Duration {
        let max = self.timing.reschedule_jitter_max.as_secs_f64();
        Duration::from_secs_f64(rand::rng().random_range(0.0..=max))
    }
}
