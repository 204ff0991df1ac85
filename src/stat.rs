//! Stat nodes.
//!
//! A stat aggregates a base value node, a manual offset and an ordered list
//! of modifiers, optionally clamped by bound nodes. Its final value is
//! cached and only recomputed after an input changed.
//!
//! ```text
//! Clean --[any input changes]--> Dirty --[value read]--> Clean
//! ```
//!
//! In [`NotifyMode::Batched`] a second flag tracks whether subscribers still
//! owe a notification; `tick` flushes it.

use crate::config::NotifyMode;
use crate::numeric::StatValue;
use petgraph::graph::NodeIndex;
use std::cell::Cell;

/// State of a stat node.
///
/// The wiring (base, modifiers, bounds) is held as arena indices and kept
/// in sync with the graph's edges by [`StatGraph`](crate::StatGraph).
#[derive(Debug)]
pub struct Stat {
    pub(crate) base: NodeIndex,
    pub(crate) owns_base: bool,
    pub(crate) modifiers: Vec<NodeIndex>,
    pub(crate) upper_bound: Option<NodeIndex>,
    pub(crate) lower_bound: Option<NodeIndex>,
    use_upper_bound: bool,
    use_lower_bound: bool,
    initial_value: StatValue,
    offset: StatValue,
    notify_mode: NotifyMode,
    pending_notify: bool,
    dirty: Cell<bool>,
    cached_value: Cell<StatValue>,
    recompute_count: Cell<u64>,
}

impl Stat {
    pub(crate) fn new(
        base: NodeIndex,
        owns_base: bool,
        initial_value: StatValue,
        notify_mode: NotifyMode,
    ) -> Self {
        Self {
            base,
            owns_base,
            modifiers: Vec::new(),
            upper_bound: None,
            lower_bound: None,
            use_upper_bound: false,
            use_lower_bound: false,
            initial_value,
            offset: 0.0,
            notify_mode,
            pending_notify: false,
            dirty: Cell::new(true),
            cached_value: Cell::new(initial_value),
            recompute_count: Cell::new(0),
        }
    }

    /// Value restored by `reset`.
    pub fn initial_value(&self) -> StatValue {
        self.initial_value
    }

    /// Manual offset accumulated from value overrides.
    pub fn offset(&self) -> StatValue {
        self.offset
    }

    /// Whether the cached value is stale.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// How many times the value has been recomputed.
    pub fn recompute_count(&self) -> u64 {
        self.recompute_count.get()
    }

    /// When subscribers of this stat are notified.
    pub fn notify_mode(&self) -> NotifyMode {
        self.notify_mode
    }

    /// Whether a batched notification is waiting for the next tick.
    pub fn has_pending_notify(&self) -> bool {
        self.pending_notify
    }

    /// Whether the upper bound, if set, clamps the value.
    pub fn uses_upper_bound(&self) -> bool {
        self.use_upper_bound
    }

    /// Whether the lower bound, if set, clamps the value.
    pub fn uses_lower_bound(&self) -> bool {
        self.use_lower_bound
    }

    /// Upper bound node, when attached and enabled.
    pub(crate) fn active_upper_bound(&self) -> Option<NodeIndex> {
        self.upper_bound.filter(|_| self.use_upper_bound)
    }

    /// Lower bound node, when attached and enabled.
    pub(crate) fn active_lower_bound(&self) -> Option<NodeIndex> {
        self.lower_bound.filter(|_| self.use_lower_bound)
    }

    pub(crate) fn cached_value(&self) -> StatValue {
        self.cached_value.get()
    }

    pub(crate) fn begin_recompute(&self) {
        self.dirty.set(false);
    }

    pub(crate) fn store(&self, value: StatValue) {
        self.cached_value.set(value);
        self.dirty.set(false);
        self.recompute_count.set(self.recompute_count.get() + 1);
    }

    /// Mark the cache stale and, in batched mode, owe a notification.
    pub(crate) fn invalidate(&mut self) {
        self.dirty.set(true);
        if self.notify_mode == NotifyMode::Batched {
            self.pending_notify = true;
        }
    }

    pub(crate) fn take_pending_notify(&mut self) -> bool {
        std::mem::take(&mut self.pending_notify)
    }

    pub(crate) fn set_notify_mode(&mut self, mode: NotifyMode) {
        self.notify_mode = mode;
        if mode == NotifyMode::Immediate {
            self.pending_notify = false;
        }
    }

    pub(crate) fn set_initial_value(&mut self, value: StatValue) {
        self.initial_value = value;
    }

    pub(crate) fn set_offset(&mut self, offset: StatValue) {
        self.offset = offset;
    }

    pub(crate) fn set_use_upper_bound(&mut self, enabled: bool) {
        self.use_upper_bound = enabled;
    }

    pub(crate) fn set_use_lower_bound(&mut self, enabled: bool) {
        self.use_lower_bound = enabled;
    }
}
