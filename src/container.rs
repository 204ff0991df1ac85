//! Keyed stat registry.
//!
//! `StatContainer` owns a [`StatGraph`] and maps host-defined keys (usually
//! an enum of stat names) to stats, remembering the order in which they
//! were registered. Container-wide operations (tick, reset, freeze,
//! snapshot) walk the entries in that order.

use crate::config::GraphConfig;
use crate::error::StatError;
use crate::graph::StatGraph;
use crate::handle::{StatHandle, ValueHandle};
use crate::numeric::StatValue;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
struct Entry {
    stat: StatHandle,
    tick: bool,
    /// Constant zero lower bound of a resource stat.
    floor: Option<ValueHandle>,
}

/// A registry of stats addressed by key.
///
/// # Examples
///
/// ```rust
/// use statbind::{ModifierDef, StatContainer};
///
/// #[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// enum Attr {
///     MaxHp,
///     Hp,
/// }
///
/// let mut stats = StatContainer::new();
/// let max_hp = stats.register(Attr::MaxHp, 100.0);
/// stats.register_resource(Attr::Hp, 150.0, &Attr::MaxHp).unwrap();
/// assert_eq!(stats.value(&Attr::Hp), Some(100.0));
///
/// let ring = stats.graph_mut().create_modifier(ModifierDef::flat(80.0)).unwrap();
/// stats.graph_mut().add_modifier(max_hp, ring).unwrap();
/// assert_eq!(stats.value(&Attr::Hp), Some(150.0));
/// ```
pub struct StatContainer<K> {
    graph: StatGraph,
    entries: HashMap<K, Entry>,
    order: Vec<K>,
}

impl<K> StatContainer<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Create an empty container with a default graph.
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    /// Create an empty container whose graph uses `config`.
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            graph: StatGraph::with_config(config),
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// The underlying graph.
    pub fn graph(&self) -> &StatGraph {
        &self.graph
    }

    /// Mutable access to the underlying graph, for wiring modifiers and
    /// bounds.
    pub fn graph_mut(&mut self) -> &mut StatGraph {
        &mut self.graph
    }

    /// Handle of the stat registered under `key`.
    pub fn get(&self, key: &K) -> Option<StatHandle> {
        self.entries.get(key).map(|entry| entry.stat)
    }

    /// Whether `key` is registered.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Current value of the stat under `key`.
    pub fn value(&self, key: &K) -> Option<StatValue> {
        let stat = self.get(key)?;
        self.graph.value(stat).ok()
    }

    /// The stat under `key`, created with `initial_value` if missing.
    pub fn get_or_create(&mut self, key: K, initial_value: StatValue) -> StatHandle {
        match self.get(&key) {
            Some(stat) => stat,
            None => self.insert(key, initial_value, true),
        }
    }

    /// Register a ticked stat. See [`register_with`](Self::register_with).
    pub fn register(&mut self, key: K, value: StatValue) -> StatHandle {
        self.register_with(key, value, true)
    }

    /// Register a stat under `key`.
    ///
    /// If the key already exists, its base and initial value are both set
    /// to `value` and its tick flag is replaced; modifiers and bounds stay.
    /// Stats registered with `tick == false` are skipped by
    /// [`tick_all`](Self::tick_all).
    pub fn register_with(&mut self, key: K, value: StatValue, tick: bool) -> StatHandle {
        let Some(entry) = self.entries.get_mut(&key) else {
            return self.insert(key, value, tick);
        };
        entry.tick = tick;
        let stat = entry.stat;
        if let Err(err) = self.update_existing(stat, value) {
            warn!(key = ?key, %err, "failed to update registered stat");
        }
        stat
    }

    fn update_existing(&mut self, stat: StatHandle, value: StatValue) -> Result<(), StatError> {
        self.graph.set_initial_value(stat, value)?;
        self.graph.set_base_value(stat, value)?;
        Ok(())
    }

    fn insert(&mut self, key: K, value: StatValue, tick: bool) -> StatHandle {
        let stat = self.graph.create_stat(value);
        debug!(key = ?key, %stat, value, "registered stat");
        self.entries.insert(
            key.clone(),
            Entry {
                stat,
                tick,
                floor: None,
            },
        );
        self.order.push(key);
        stat
    }

    /// Register a resource stat, such as current health, capped by another
    /// registered stat and floored at zero.
    ///
    /// # Errors
    ///
    /// `KeyNotFound` if `upper` is not registered; `InvalidDependency` if
    /// `key` and `upper` are the same key; `Cycle` if `upper` already
    /// depends on the stat under `key`.
    pub fn register_resource(
        &mut self,
        key: K,
        value: StatValue,
        upper: &K,
    ) -> Result<StatHandle, StatError> {
        let upper_stat = self
            .get(upper)
            .ok_or_else(|| StatError::KeyNotFound(format!("{upper:?}")))?;
        if key == *upper {
            warn!(key = ?key, "resource stat cannot be capped by itself");
            return Err(StatError::InvalidDependency(upper_stat.node()));
        }

        let previous = match self.entries.get(&key) {
            Some(entry) => Some((
                entry.tick,
                self.graph.initial_value(entry.stat)?,
                self.graph.base_value(entry.stat)?,
            )),
            None => None,
        };
        let stat = self.register(key.clone(), value);
        if let Err(err) = self.graph.set_upper_bound(stat, upper_stat, true) {
            match previous {
                Some((tick, initial, base)) => self.restore(&key, stat, tick, initial, base),
                None => self.discard(&key),
            }
            return Err(err);
        }

        let floor = match self.entries.get(&key).and_then(|entry| entry.floor) {
            Some(floor) => {
                self.graph.set_value(floor, 0.0)?;
                floor
            }
            None => self.graph.create_value(0.0),
        };
        self.graph.set_lower_bound(stat, floor, true)?;
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.floor = Some(floor);
        }
        Ok(stat)
    }

    /// Drop the entry under `key` and remove its nodes from the graph.
    ///
    /// Returns `false` if the key was not registered.
    pub fn remove(&mut self, key: &K) -> Result<bool, StatError> {
        let Some(entry) = self.entries.remove(key) else {
            return Ok(false);
        };
        self.order.retain(|k| k != key);
        self.graph.remove(entry.stat)?;
        if let Some(floor) = entry.floor {
            self.graph.remove(floor)?;
        }
        debug!(key = ?key, "removed stat");
        Ok(true)
    }

    fn restore(&mut self, key: &K, stat: StatHandle, tick: bool, initial: StatValue, base: StatValue) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.tick = tick;
        }
        let restored = self
            .graph
            .set_initial_value(stat, initial)
            .and_then(|()| self.graph.set_base_value(stat, base));
        if let Err(err) = restored {
            warn!(key = ?key, %err, "failed to restore stat");
        }
    }

    fn discard(&mut self, key: &K) {
        if let Err(err) = self.remove(key) {
            warn!(key = ?key, %err, "failed to discard stat");
        }
    }

    /// Remove every entry and its nodes.
    pub fn clear(&mut self) {
        for key in std::mem::take(&mut self.order) {
            if let Some(entry) = self.entries.remove(&key) {
                let removed = self.graph.remove(entry.stat).and_then(|()| match entry.floor {
                    Some(floor) => self.graph.remove(floor),
                    None => Ok(()),
                });
                if let Err(err) = removed {
                    warn!(key = ?key, %err, "failed to remove stat");
                }
            }
        }
        self.entries.clear();
    }

    /// Tick every entry that has its tick flag set, in registration order.
    ///
    /// Returns how many stats delivered a pending notification.
    pub fn tick_all(&mut self) -> usize {
        let mut flushed = 0;
        for key in &self.order {
            let Some(entry) = self.entries.get(key) else {
                continue;
            };
            if !entry.tick {
                continue;
            }
            match self.graph.tick(entry.stat) {
                Ok(true) => flushed += 1,
                Ok(false) => {}
                Err(err) => warn!(key = ?key, %err, "failed to tick stat"),
            }
        }
        flushed
    }

    /// Reset every stat. See [`StatGraph::reset`].
    pub fn reset_all(&mut self, clear_modifiers: bool) -> Result<(), StatError> {
        for stat in self.handles() {
            self.graph.reset(stat, clear_modifiers)?;
        }
        Ok(())
    }

    /// Freeze every stat. See [`StatGraph::freeze`].
    ///
    /// Stats are frozen in registration order, so a stat frozen later sees
    /// the frozen bases of earlier ones.
    pub fn freeze_all(&mut self) -> Result<(), StatError> {
        for stat in self.handles() {
            self.graph.freeze(stat)?;
        }
        Ok(())
    }

    /// Current values of all stats, in registration order.
    pub fn snapshot(&self) -> Vec<(K, StatValue)> {
        self.order
            .iter()
            .filter_map(|key| Some((key.clone(), self.value(key)?)))
            .collect()
    }

    /// Registered keys, in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }

    /// Number of registered stats.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no stats are registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn handles(&self) -> Vec<StatHandle> {
        self.order
            .iter()
            .filter_map(|key| self.get(key))
            .collect()
    }
}

impl<K> Default for StatContainer<K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
