//! Bindable values and subscriber registries.
//!
//! A `BindableValue` is the leaf of the graph: a scalar that announces a
//! change only when the stored value actually differs from the previous one.
//! Every node kind carries a `Subscribers` registry so that modifiers and
//! stats can be observed the same way.

use crate::numeric::{exact_eq, StatValue};
use std::fmt;

/// Identifier returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Callback invoked with the new value of the observed node.
pub type Callback = Box<dyn FnMut(StatValue)>;

/// Ordered registry of change callbacks.
///
/// Callbacks run in subscription order. They receive only the new value,
/// never the graph, so the registry cannot be mutated while it dispatches.
#[derive(Default)]
pub struct Subscribers {
    next_id: u64,
    entries: Vec<(SubscriptionId, Callback)>,
}

impl Subscribers {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback and return its id.
    pub fn subscribe(&mut self, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, callback));
        id
    }

    /// Remove a callback. Returns `false` if the id was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        match self.entries.iter().position(|(entry, _)| *entry == id) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Invoke every callback with `value`, in subscription order.
    pub fn notify(&mut self, value: StatValue) {
        for (_, callback) in self.entries.iter_mut() {
            callback(value);
        }
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no callback is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.entries.len())
            .finish()
    }
}

/// A scalar holder with equality-gated change detection.
///
/// # Examples
///
/// ```rust
/// use statbind::bindable::BindableValue;
///
/// let mut value = BindableValue::new(10.0);
/// assert!(value.set(12.0));
/// assert!(!value.set(12.0)); // unchanged, nothing to announce
/// assert_eq!(value.get(), 12.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BindableValue {
    value: StatValue,
}

impl BindableValue {
    /// Create a value holder.
    pub fn new(value: StatValue) -> Self {
        Self { value }
    }

    /// Current value.
    pub fn get(&self) -> StatValue {
        self.value
    }

    /// Assign `value`. Returns `true` if it differs from the previous value
    /// and dependents must be notified.
    pub fn set(&mut self, value: StatValue) -> bool {
        if exact_eq(self.value, value) {
            return false;
        }
        self.value = value;
        true
    }
}
