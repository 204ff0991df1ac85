//! Graph configuration.
//!
//! `GraphConfig` selects the default notification timing for new stats and
//! how much cycle checking happens when a dependency edge is added. It is
//! plain data and deserializes with `serde`, missing fields falling back to
//! their defaults.

use serde::{Deserialize, Serialize};

/// When a stat's external subscribers hear about changes.
///
/// Internal dependents (modifiers based on the stat, stats bounded by it)
/// are always invalidated immediately; the mode only decides the timing of
/// subscriber callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyMode {
    /// Subscribers hear the fresh value once per write, after it has settled.
    #[default]
    Immediate,
    /// Invalidations only raise a pending flag; `tick` delivers at most one
    /// notification per call.
    Batched,
}

/// How dependency edges are validated when they are added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleCheck {
    /// Reject direct self-references and any edge that closes a longer
    /// cycle. Costs a reachability search per edge.
    #[default]
    Full,
    /// Reject direct self-references only. Longer cycles are the caller's
    /// responsibility; propagation settles each node on one at most once.
    SelfOnly,
}

/// Configuration for a [`StatGraph`](crate::StatGraph).
///
/// # Examples
///
/// ```rust
/// use statbind::{CycleCheck, GraphConfig, NotifyMode};
///
/// let config = GraphConfig::default().with_notify_mode(NotifyMode::Batched);
/// assert_eq!(config.notify_mode, NotifyMode::Batched);
/// assert_eq!(config.cycle_check, CycleCheck::Full);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Notify mode given to newly created stats.
    pub notify_mode: NotifyMode,
    /// Validation applied to every new dependency edge.
    pub cycle_check: CycleCheck,
}

impl GraphConfig {
    /// Set the default notify mode for new stats.
    pub fn with_notify_mode(mut self, notify_mode: NotifyMode) -> Self {
        self.notify_mode = notify_mode;
        self
    }

    /// Set the cycle check strategy.
    pub fn with_cycle_check(mut self, cycle_check: CycleCheck) -> Self {
        self.cycle_check = cycle_check;
        self
    }
}
