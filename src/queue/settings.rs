//! Engine policy settings
//!
//! Every heuristic the engine applies (collector scaling, retry grace, drain
//! bounds) is a named field here so deployments can tune it without code
//! changes.

use crate::queue::error::ConfigError;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    /// Collector floor; also the ceiling whenever the last batch was not full
    pub min_collectors: usize,
    /// Collector cap
    pub max_collectors: usize,
    /// Pending calls that justify one collector above the floor
    pub backlog_per_collector: usize,
    /// Period of the retry ticker
    pub retry_interval: Duration,
    /// Age after which a not-yet-started call is re-published
    pub retry_grace: Duration,
    /// Retries only run while the pending count is below this
    pub retry_max_pending: usize,
    /// Upper bound on stop-signal rounds during drain
    pub drain_iterations: usize,
    /// Pause between stop-signal rounds
    pub drain_delay: Duration,
    /// How long an idle collector waits for work before its tick ends
    pub idle_poll_interval: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            min_collectors: 2,
            max_collectors: 10,
            backlog_per_collector: 20,
            retry_interval: Duration::from_secs(5),
            retry_grace: Duration::from_secs(4),
            retry_max_pending: 10,
            drain_iterations: 100,
            drain_delay: Duration::from_millis(100),
            idle_poll_interval: Duration::from_millis(100),
        }
    }
}

impl QueueSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_collectors == 0 {
            return Err(ConfigError::invalid(
                "min-collectors",
                "min-collectors must be at least 1",
            ));
        }
        if self.min_collectors > self.max_collectors {
            return Err(ConfigError::invalid(
                "max-collectors",
                format!(
                    "max-collectors ({}) must not be below min-collectors ({})",
                    self.max_collectors, self.min_collectors
                ),
            ));
        }
        if self.backlog_per_collector == 0 {
            return Err(ConfigError::invalid(
                "backlog-per-collector",
                "backlog-per-collector must be at least 1",
            ));
        }
        for (key, value) in [
            ("retry-interval-ms", self.retry_interval),
            ("drain-delay-ms", self.drain_delay),
            ("idle-poll-interval-ms", self.idle_poll_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::invalid(key, format!("{} must be positive", key)));
            }
        }
        Ok(())
    }

    /// Collector ceiling after a batch: scale with the backlog when the
    /// batch was full, otherwise collapse to the floor.
    pub fn target_collectors(&self, pending: usize, full_batch: bool) -> usize {
        if full_batch {
            let extra = pending.checked_div(self.backlog_per_collector).unwrap_or(0);
            (extra + self.min_collectors).min(self.max_collectors)
        } else {
            self.min_collectors
        }
    }

    /// Whether the retry heuristic applies to this many pending calls
    pub fn retries_enabled_for(&self, pending: usize) -> bool {
        pending > 0 && pending < self.retry_max_pending
    }
}
