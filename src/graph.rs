//! Dependency graph module.
//!
//! Provides the `StatGraph` type, the arena that owns every value, modifier
//! and stat node. A dependency is an edge from the node being read (the
//! source) to the node reading it (the dependent). A write settles every
//! downstream node once, in dependency order, and notifies subscribers
//! after the whole wave, before returning to the caller. Reads pull a fresh
//! computation through dirty stats only.
//!
//! Because wiring lives in the arena rather than in callbacks held by the
//! nodes, removing a node detaches every edge touching it at once and its
//! dependents are rewired on the spot.

use crate::bindable::{BindableValue, SubscriptionId, Subscribers};
use crate::breakdown::{ClampSide, StatBreakdown};
use crate::config::{CycleCheck, GraphConfig, NotifyMode};
use crate::error::StatError;
use crate::handle::{ModifierHandle, NodeHandle, StatHandle, ValueHandle};
use crate::modifier::{Modifier, ModifierDef, ModifierEffect, ModifierKind};
use crate::numeric::{exact_eq, StatValue};
use crate::stat::Stat;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, error, trace, warn};

/// Role of an edge from a source node to its dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dependency {
    /// Value node backing a stat's base.
    StatBase,
    /// Node a modifier reads from.
    ModifierBase,
    /// Modifier attached to a stat.
    Modifier,
    UpperBound,
    LowerBound,
}

impl From<ClampSide> for Dependency {
    fn from(side: ClampSide) -> Self {
        match side {
            ClampSide::Upper => Dependency::UpperBound,
            ClampSide::Lower => Dependency::LowerBound,
        }
    }
}

enum NodeKind {
    Value(BindableValue),
    Modifier(Modifier),
    Stat(Stat),
}

struct Node {
    generation: u32,
    kind: NodeKind,
    subscribers: Subscribers,
}

/// Arena of reactive stat nodes.
///
/// # Examples
///
/// ```rust
/// use statbind::{ModifierDef, StatGraph};
///
/// let mut graph = StatGraph::new();
/// let hp = graph.create_stat(100.0);
///
/// let flat = graph.create_modifier(ModifierDef::flat(25.0)).unwrap();
/// graph.add_modifier(hp, flat).unwrap();
/// assert_eq!(graph.value(hp).unwrap(), 125.0);
///
/// // +10% of the stat's own base
/// let base = graph.base_of(hp).unwrap();
/// let percent = graph.create_modifier(ModifierDef::percent(0.1, base)).unwrap();
/// graph.add_modifier(hp, percent).unwrap();
/// assert_eq!(graph.value(hp).unwrap(), 135.0);
///
/// graph.remove_modifier(hp, flat).unwrap();
/// assert_eq!(graph.value(hp).unwrap(), 110.0);
/// ```
pub struct StatGraph {
    graph: StableDiGraph<Node, Dependency>,
    config: GraphConfig,
    next_generation: u32,
}

impl StatGraph {
    /// Create an empty graph with the default configuration.
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    /// Create an empty graph with the given configuration.
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            graph: StableDiGraph::default(),
            config,
            next_generation: 0,
        }
    }

    /// The configuration this graph was created with.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Number of live nodes. A stat counts twice when it owns its base.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether the handle still refers to a live node.
    pub fn contains(&self, node: impl Into<NodeHandle>) -> bool {
        self.resolve(node.into()).is_ok()
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create a standalone bindable value.
    pub fn create_value(&mut self, value: StatValue) -> ValueHandle {
        let index = self.insert(NodeKind::Value(BindableValue::new(value)));
        ValueHandle(self.handle_at(index))
    }

    /// Create a modifier from its definition.
    ///
    /// The modifier subscribes to its base, if any, and computes its initial
    /// value immediately. It is active but not yet attached to a stat.
    ///
    /// # Errors
    ///
    /// `StaleHandle` if the base handle no longer refers to a live node.
    pub fn create_modifier(&mut self, def: ModifierDef) -> Result<ModifierHandle, StatError> {
        let base = match def.base {
            Some(handle) => {
                let index = self.resolve(handle)?;
                Some((index, self.read(index)))
            }
            None => None,
        };
        let modifier = Modifier::new(def.magnitude, def.kind, def.effect, base);
        let index = self.insert(NodeKind::Modifier(modifier));
        if let Some((base, _)) = base {
            self.graph.add_edge(base, index, Dependency::ModifierBase);
        }
        let handle = self.handle_at(index);
        debug!(modifier = %handle, magnitude = def.magnitude, kind = ?def.kind, "created modifier");
        Ok(ModifierHandle(handle))
    }

    /// Create a stat with its own base value node.
    pub fn create_stat(&mut self, initial_value: StatValue) -> StatHandle {
        let base = self.insert(NodeKind::Value(BindableValue::new(initial_value)));
        self.attach_stat(base, true, initial_value)
    }

    /// Create a stat whose base is an existing value node.
    ///
    /// The stat does not own the value: removing the stat leaves it alive,
    /// and the value cannot be removed while the stat uses it.
    pub fn create_stat_with_base(&mut self, base: ValueHandle) -> Result<StatHandle, StatError> {
        let index = self.value_index(base)?;
        let initial_value = self.read(index);
        Ok(self.attach_stat(index, false, initial_value))
    }

    fn attach_stat(&mut self, base: NodeIndex, owns_base: bool, initial: StatValue) -> StatHandle {
        let stat = Stat::new(base, owns_base, initial, self.config.notify_mode);
        let index = self.insert(NodeKind::Stat(stat));
        self.graph.add_edge(base, index, Dependency::StatBase);
        let handle = self.handle_at(index);
        debug!(stat = %handle, initial, "created stat");
        StatHandle(handle)
    }

    fn insert(&mut self, kind: NodeKind) -> NodeIndex {
        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);
        self.graph.add_node(Node {
            generation,
            kind,
            subscribers: Subscribers::new(),
        })
    }

    // ------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------

    /// Current value of any node.
    ///
    /// Stats recompute here if dirty; every other node kind holds an
    /// up-to-date value already.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use statbind::StatGraph;
    ///
    /// let mut graph = StatGraph::new();
    /// let speed = graph.create_value(4.5);
    /// assert_eq!(graph.value(speed).unwrap(), 4.5);
    /// ```
    pub fn value(&self, node: impl Into<NodeHandle>) -> Result<StatValue, StatError> {
        let index = self.resolve(node.into())?;
        Ok(self.read(index))
    }

    /// Read-only access to a stat's state.
    pub fn stat(&self, stat: StatHandle) -> Result<&Stat, StatError> {
        let index = self.resolve(stat.0)?;
        self.stat_at(index).ok_or(StatError::StaleHandle(stat.0))
    }

    /// Read-only access to a modifier's state.
    pub fn modifier(&self, modifier: ModifierHandle) -> Result<&Modifier, StatError> {
        let index = self.resolve(modifier.0)?;
        self.modifier_at(index)
            .ok_or(StatError::StaleHandle(modifier.0))
    }

    /// Compute a stat with a full trace of its inputs.
    ///
    /// A dirty stat caches the result, exactly as a `value` read would.
    pub fn breakdown(&self, stat: StatHandle) -> Result<StatBreakdown, StatError> {
        let stat = self.stat(stat)?;
        let breakdown = self.evaluate(stat);
        if stat.is_dirty() {
            stat.store(breakdown.value);
        }
        Ok(breakdown)
    }

    fn read(&self, index: NodeIndex) -> StatValue {
        match &self.graph[index].kind {
            NodeKind::Value(value) => value.get(),
            NodeKind::Modifier(modifier) => modifier.value(),
            NodeKind::Stat(stat) => {
                if stat.is_dirty() {
                    // a read that loops back here sees the previous value
                    stat.begin_recompute();
                    let breakdown = self.evaluate(stat);
                    stat.store(breakdown.value);
                }
                stat.cached_value()
            }
        }
    }

    fn evaluate(&self, stat: &Stat) -> StatBreakdown {
        let modifiers = stat
            .modifiers
            .iter()
            .filter_map(|&index| self.modifier_at(index))
            .filter(|modifier| modifier.is_active())
            .map(|modifier| (modifier.effect(), modifier.value()))
            .collect();
        StatBreakdown::compute(
            self.read(stat.base),
            stat.offset(),
            modifiers,
            stat.active_upper_bound().map(|bound| self.read(bound)),
            stat.active_lower_bound().map(|bound| self.read(bound)),
        )
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Register a callback for changes of any node.
    ///
    /// Values and modifiers call back whenever their value actually changes.
    /// Stats call back according to their [`NotifyMode`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use statbind::StatGraph;
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    ///
    /// let mut graph = StatGraph::new();
    /// let mana = graph.create_value(10.0);
    ///
    /// let seen = Rc::new(RefCell::new(Vec::new()));
    /// let sink = Rc::clone(&seen);
    /// let id = graph.subscribe(mana, move |v| sink.borrow_mut().push(v)).unwrap();
    ///
    /// graph.set_value(mana, 12.0).unwrap();
    /// graph.set_value(mana, 12.0).unwrap(); // unchanged, silent
    /// graph.unsubscribe(mana, id).unwrap();
    /// graph.set_value(mana, 14.0).unwrap();
    ///
    /// assert_eq!(*seen.borrow(), vec![12.0]);
    /// ```
    pub fn subscribe<F>(
        &mut self,
        node: impl Into<NodeHandle>,
        callback: F,
    ) -> Result<SubscriptionId, StatError>
    where
        F: FnMut(StatValue) + 'static,
    {
        let index = self.resolve(node.into())?;
        Ok(self.graph[index].subscribers.subscribe(Box::new(callback)))
    }

    /// Remove a callback. Unknown ids are a no-op returning `false`.
    pub fn unsubscribe(
        &mut self,
        node: impl Into<NodeHandle>,
        id: SubscriptionId,
    ) -> Result<bool, StatError> {
        let index = self.resolve(node.into())?;
        Ok(self.graph[index].subscribers.unsubscribe(id))
    }

    // ------------------------------------------------------------------
    // Bindable values
    // ------------------------------------------------------------------

    /// Assign a value node.
    ///
    /// Subscribers and dependents hear about it only if the new value
    /// differs bit for bit from the old one. Returns whether it changed.
    pub fn set_value(&mut self, value: ValueHandle, new_value: StatValue) -> Result<bool, StatError> {
        let index = self.value_index(value)?;
        let changed = match &mut self.graph[index].kind {
            NodeKind::Value(bindable) => bindable.set(new_value),
            _ => false,
        };
        if changed {
            self.propagate(&[index]);
        }
        Ok(changed)
    }

    // ------------------------------------------------------------------
    // Modifiers
    // ------------------------------------------------------------------

    /// Change a modifier's magnitude and recompute it.
    pub fn set_magnitude(&mut self, modifier: ModifierHandle, magnitude: StatValue) -> Result<(), StatError> {
        let index = self.modifier_index(modifier)?;
        if let Some(state) = self.modifier_at_mut(index) {
            state.set_magnitude(magnitude);
        }
        self.propagate(&[index]);
        Ok(())
    }

    /// Rebind a modifier to a new base, or detach it with `None`.
    ///
    /// The previous base subscription is dropped before the new one is made.
    ///
    /// # Errors
    ///
    /// `InvalidDependency` if the base is the modifier itself or the stat
    /// that owns it; `Cycle` if the base depends on the modifier further up
    /// (only with [`CycleCheck::Full`]). The graph is unchanged on error.
    pub fn set_modifier_base(
        &mut self,
        modifier: ModifierHandle,
        base: Option<NodeHandle>,
    ) -> Result<(), StatError> {
        let index = self.modifier_index(modifier)?;
        let new_base = base.map(|handle| self.resolve(handle)).transpose()?;
        let old_base = self.modifier_at(index).and_then(|state| state.base);
        if new_base == old_base {
            return Ok(());
        }

        if let Some(base) = new_base {
            if self.owner_of(index) == Some(base) {
                warn!(modifier = %modifier, "rejected modifier based on its owning stat");
                return Err(StatError::InvalidDependency(self.handle_at(base)));
            }
            self.check_dependency(base, index)?;
        }

        if let Some(old) = old_base {
            self.disconnect(old, index, Dependency::ModifierBase);
        }
        if let Some(base) = new_base {
            self.graph.add_edge(base, index, Dependency::ModifierBase);
        }
        if let Some(state) = self.modifier_at_mut(index) {
            state.base = new_base;
        }
        debug!(modifier = %modifier, base = ?base, "rebound modifier");
        self.propagate(&[index]);
        Ok(())
    }

    /// The node a modifier reads from.
    pub fn modifier_base(&self, modifier: ModifierHandle) -> Result<Option<NodeHandle>, StatError> {
        let index = self.modifier_index(modifier)?;
        Ok(self
            .modifier_at(index)
            .and_then(|state| state.base)
            .map(|base| self.handle_at(base)))
    }

    /// The stat a modifier is attached to.
    pub fn modifier_owner(&self, modifier: ModifierHandle) -> Result<Option<StatHandle>, StatError> {
        let index = self.modifier_index(modifier)?;
        Ok(self
            .owner_of(index)
            .map(|owner| StatHandle(self.handle_at(owner))))
    }

    /// The modifier's raw magnitude, before any base is applied.
    pub fn magnitude(&self, modifier: ModifierHandle) -> Result<StatValue, StatError> {
        Ok(self.modifier(modifier)?.magnitude())
    }

    /// Whether the modifier is flat or a percentage of its base.
    pub fn modifier_kind(&self, modifier: ModifierHandle) -> Result<ModifierKind, StatError> {
        Ok(self.modifier(modifier)?.kind())
    }

    /// Whether the modifier feeds the stat's add or mult sum.
    pub fn modifier_effect(&self, modifier: ModifierHandle) -> Result<ModifierEffect, StatError> {
        Ok(self.modifier(modifier)?.effect())
    }

    /// Whether the modifier currently counts toward its stat.
    pub fn is_active(&self, modifier: ModifierHandle) -> Result<bool, StatError> {
        Ok(self.modifier(modifier)?.is_active())
    }

    /// Make the owning stat count this modifier again.
    pub fn activate(&mut self, modifier: ModifierHandle) -> Result<(), StatError> {
        self.set_active(modifier, true)
    }

    /// Stop the owning stat from counting this modifier.
    ///
    /// The modifier stays in the stat's list until the next `tick` or
    /// `prune_inactive`.
    pub fn deactivate(&mut self, modifier: ModifierHandle) -> Result<(), StatError> {
        self.set_active(modifier, false)
    }

    fn set_active(&mut self, modifier: ModifierHandle, active: bool) -> Result<(), StatError> {
        let index = self.modifier_index(modifier)?;
        let changed = self
            .modifier_at_mut(index)
            .map(|state| state.set_active(active))
            .unwrap_or(false);
        if changed {
            if let Some(owner) = self.owner_of(index) {
                self.propagate(&[owner]);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Stats
    // ------------------------------------------------------------------

    /// The value node backing a stat's base.
    pub fn base_of(&self, stat: StatHandle) -> Result<ValueHandle, StatError> {
        let base = self.stat(stat)?.base;
        Ok(ValueHandle(self.handle_at(base)))
    }

    /// Current value of the stat's base node.
    pub fn base_value(&self, stat: StatHandle) -> Result<StatValue, StatError> {
        let base = self.stat(stat)?.base;
        Ok(self.read(base))
    }

    /// Assign a stat's base. The stat is invalidated only on actual change.
    pub fn set_base_value(&mut self, stat: StatHandle, value: StatValue) -> Result<bool, StatError> {
        let base = self.base_of(stat)?;
        self.set_value(base, value)
    }

    /// Override a stat's final value.
    ///
    /// The difference to the current value is added to the stat's offset,
    /// so the base and the modifiers keep their meaning.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use statbind::{ModifierDef, StatGraph};
    ///
    /// let mut graph = StatGraph::new();
    /// let hp = graph.create_stat(100.0);
    /// let ring = graph.create_modifier(ModifierDef::flat(20.0)).unwrap();
    /// graph.add_modifier(hp, ring).unwrap();
    ///
    /// graph.set_stat_value(hp, 90.0).unwrap();
    /// assert_eq!(graph.value(hp).unwrap(), 90.0);
    /// assert_eq!(graph.offset(hp).unwrap(), -30.0);
    /// assert_eq!(graph.base_value(hp).unwrap(), 100.0);
    /// ```
    pub fn set_stat_value(&mut self, stat: StatHandle, value: StatValue) -> Result<(), StatError> {
        let index = self.stat_index(stat)?;
        let current = self.read(index);
        if let Some(state) = self.stat_at_mut(index) {
            let offset = state.offset() + (value - current);
            state.set_offset(offset);
        }
        self.propagate(&[index]);
        Ok(())
    }

    /// The manual offset added after modifiers, before clamping.
    pub fn offset(&self, stat: StatHandle) -> Result<StatValue, StatError> {
        Ok(self.stat(stat)?.offset())
    }

    /// Replace a stat's offset.
    pub fn set_offset(&mut self, stat: StatHandle, offset: StatValue) -> Result<(), StatError> {
        let index = self.stat_index(stat)?;
        let changed = match self.stat_at_mut(index) {
            Some(state) if !exact_eq(state.offset(), offset) => {
                state.set_offset(offset);
                true
            }
            _ => false,
        };
        if changed {
            self.propagate(&[index]);
        }
        Ok(())
    }

    /// The value `reset` restores the base to.
    pub fn initial_value(&self, stat: StatHandle) -> Result<StatValue, StatError> {
        Ok(self.stat(stat)?.initial_value())
    }

    /// Change the value `reset` restores. Does not touch the current base.
    pub fn set_initial_value(&mut self, stat: StatHandle, value: StatValue) -> Result<(), StatError> {
        let index = self.stat_index(stat)?;
        if let Some(state) = self.stat_at_mut(index) {
            state.set_initial_value(value);
        }
        Ok(())
    }

    /// Whether the next read will recompute the stat.
    pub fn is_dirty(&self, stat: StatHandle) -> Result<bool, StatError> {
        Ok(self.stat(stat)?.is_dirty())
    }

    /// How many times the stat's value has been computed.
    pub fn recompute_count(&self, stat: StatHandle) -> Result<u64, StatError> {
        Ok(self.stat(stat)?.recompute_count())
    }

    /// When this stat's subscribers are notified.
    pub fn notify_mode(&self, stat: StatHandle) -> Result<NotifyMode, StatError> {
        Ok(self.stat(stat)?.notify_mode())
    }

    /// Switch a stat's notification timing.
    ///
    /// Switching to [`NotifyMode::Immediate`] drops any pending batched
    /// notification.
    pub fn set_notify_mode(&mut self, stat: StatHandle, mode: NotifyMode) -> Result<(), StatError> {
        let index = self.stat_index(stat)?;
        if let Some(state) = self.stat_at_mut(index) {
            state.set_notify_mode(mode);
        }
        Ok(())
    }

    /// Force the stat to recompute on its next read.
    pub fn set_dirty(&mut self, stat: StatHandle) -> Result<(), StatError> {
        let index = self.stat_index(stat)?;
        self.propagate(&[index]);
        Ok(())
    }

    /// Attach a modifier to a stat.
    ///
    /// The modifier is (re)activated. A modifier attached to another stat is
    /// moved; attaching it twice to the same stat keeps a single entry.
    ///
    /// # Errors
    ///
    /// `InvalidDependency` if the modifier's base is the stat itself;
    /// `Cycle` if the stat already feeds the modifier through a longer path.
    pub fn add_modifier(&mut self, stat: StatHandle, modifier: ModifierHandle) -> Result<(), StatError> {
        let stat_index = self.stat_index(stat)?;
        let modifier_index = self.modifier_index(modifier)?;
        let owner = self.owner_of(modifier_index);
        let mut roots = Vec::with_capacity(2);

        if owner != Some(stat_index) {
            let base = self.modifier_at(modifier_index).and_then(|state| state.base);
            if base == Some(stat_index) {
                warn!(stat = %stat, modifier = %modifier, "rejected modifier based on its own stat");
                return Err(StatError::InvalidDependency(stat.0));
            }
            self.check_dependency(modifier_index, stat_index)?;

            if let Some(previous) = owner {
                self.detach_modifier(previous, modifier_index);
                roots.push(previous);
            }
            if let Some(state) = self.stat_at_mut(stat_index) {
                state.modifiers.push(modifier_index);
            }
            self.graph
                .add_edge(modifier_index, stat_index, Dependency::Modifier);
            debug!(stat = %stat, modifier = %modifier, "attached modifier");
        }

        if let Some(state) = self.modifier_at_mut(modifier_index) {
            state.set_active(true);
        }
        roots.push(stat_index);
        self.propagate(&roots);
        Ok(())
    }

    /// Detach a modifier from a stat and deactivate it.
    ///
    /// Returns `false` if the modifier was not attached to this stat.
    pub fn remove_modifier(&mut self, stat: StatHandle, modifier: ModifierHandle) -> Result<bool, StatError> {
        let stat_index = self.stat_index(stat)?;
        let modifier_index = self.modifier_index(modifier)?;
        if self.owner_of(modifier_index) != Some(stat_index) {
            return Ok(false);
        }
        self.detach_modifier(stat_index, modifier_index);
        if let Some(state) = self.modifier_at_mut(modifier_index) {
            state.set_active(false);
        }
        debug!(stat = %stat, modifier = %modifier, "removed modifier");
        self.propagate(&[stat_index]);
        Ok(true)
    }

    /// Detach and deactivate every modifier of a stat.
    pub fn remove_all_modifiers(&mut self, stat: StatHandle) -> Result<(), StatError> {
        let index = self.stat_index(stat)?;
        self.clear_modifiers(index);
        self.propagate(&[index]);
        Ok(())
    }

    /// A stat's modifiers, in insertion order, including inactive ones not
    /// yet pruned.
    pub fn modifiers(&self, stat: StatHandle) -> Result<Vec<ModifierHandle>, StatError> {
        Ok(self
            .stat(stat)?
            .modifiers
            .iter()
            .map(|&index| ModifierHandle(self.handle_at(index)))
            .collect())
    }

    /// Detach every inactive modifier from a stat. Returns how many went.
    ///
    /// Inactive modifiers already contribute nothing, so the stat's value
    /// does not change.
    pub fn prune_inactive(&mut self, stat: StatHandle) -> Result<usize, StatError> {
        let index = self.stat_index(stat)?;
        Ok(self.prune_at(index))
    }

    fn prune_at(&mut self, index: NodeIndex) -> usize {
        let inactive: Vec<NodeIndex> = match self.stat_at(index) {
            Some(state) => state
                .modifiers
                .iter()
                .copied()
                .filter(|&modifier| {
                    self.modifier_at(modifier)
                        .is_some_and(|state| !state.is_active())
                })
                .collect(),
            None => return 0,
        };
        for &modifier in &inactive {
            self.detach_modifier(index, modifier);
        }
        if !inactive.is_empty() {
            trace!(stat = %self.handle_at(index), pruned = inactive.len(), "pruned inactive modifiers");
        }
        inactive.len()
    }

    /// Clamp a stat from above by another node's value.
    ///
    /// Replaces any previous upper bound. `enabled` sets the use flag; a
    /// bound that is attached but disabled is ignored by the computation.
    ///
    /// # Errors
    ///
    /// `InvalidDependency` if the bound is the stat itself; `Cycle` if the
    /// bound depends on the stat.
    pub fn set_upper_bound(
        &mut self,
        stat: StatHandle,
        bound: impl Into<NodeHandle>,
        enabled: bool,
    ) -> Result<(), StatError> {
        self.set_bound(stat, ClampSide::Upper, bound.into(), enabled)
    }

    /// Clamp a stat from below by another node's value.
    ///
    /// See [`set_upper_bound`](Self::set_upper_bound). When both bounds
    /// apply and contradict each other the lower bound wins.
    pub fn set_lower_bound(
        &mut self,
        stat: StatHandle,
        bound: impl Into<NodeHandle>,
        enabled: bool,
    ) -> Result<(), StatError> {
        self.set_bound(stat, ClampSide::Lower, bound.into(), enabled)
    }

    /// Detach the upper bound, if any.
    pub fn remove_upper_bound(&mut self, stat: StatHandle) -> Result<(), StatError> {
        self.remove_bound(stat, ClampSide::Upper)
    }

    /// Detach the lower bound, if any.
    pub fn remove_lower_bound(&mut self, stat: StatHandle) -> Result<(), StatError> {
        self.remove_bound(stat, ClampSide::Lower)
    }

    /// Toggle the upper bound without changing the reference.
    pub fn set_use_upper_bound(&mut self, stat: StatHandle, enabled: bool) -> Result<(), StatError> {
        self.set_use_bound(stat, ClampSide::Upper, enabled)
    }

    /// Toggle the lower bound without changing the reference.
    pub fn set_use_lower_bound(&mut self, stat: StatHandle, enabled: bool) -> Result<(), StatError> {
        self.set_use_bound(stat, ClampSide::Lower, enabled)
    }

    /// The node capping the stat, whether or not the cap is enabled.
    pub fn upper_bound(&self, stat: StatHandle) -> Result<Option<NodeHandle>, StatError> {
        Ok(self.stat(stat)?.upper_bound.map(|index| self.handle_at(index)))
    }

    /// The node flooring the stat, whether or not the floor is enabled.
    pub fn lower_bound(&self, stat: StatHandle) -> Result<Option<NodeHandle>, StatError> {
        Ok(self.stat(stat)?.lower_bound.map(|index| self.handle_at(index)))
    }

    fn set_bound(
        &mut self,
        stat: StatHandle,
        side: ClampSide,
        bound: NodeHandle,
        enabled: bool,
    ) -> Result<(), StatError> {
        let index = self.stat_index(stat)?;
        let bound_index = self.resolve(bound)?;
        let current = self.bound_at(index, side);

        if current != Some(bound_index) {
            self.check_dependency(bound_index, index)?;
            if let Some(old) = current {
                self.disconnect(old, index, side.into());
            }
            self.graph.add_edge(bound_index, index, side.into());
            if let Some(state) = self.stat_at_mut(index) {
                match side {
                    ClampSide::Upper => state.upper_bound = Some(bound_index),
                    ClampSide::Lower => state.lower_bound = Some(bound_index),
                }
            }
            debug!(stat = %stat, bound = %bound, ?side, enabled, "set bound");
        }

        if let Some(state) = self.stat_at_mut(index) {
            match side {
                ClampSide::Upper => state.set_use_upper_bound(enabled),
                ClampSide::Lower => state.set_use_lower_bound(enabled),
            }
        }
        self.propagate(&[index]);
        Ok(())
    }

    fn remove_bound(&mut self, stat: StatHandle, side: ClampSide) -> Result<(), StatError> {
        let index = self.stat_index(stat)?;
        if let Some(old) = self.bound_at(index, side) {
            self.disconnect(old, index, side.into());
            self.clear_bound(index, side);
            self.propagate(&[index]);
        }
        Ok(())
    }

    fn set_use_bound(&mut self, stat: StatHandle, side: ClampSide, enabled: bool) -> Result<(), StatError> {
        let index = self.stat_index(stat)?;
        let changed = match self.stat_at_mut(index) {
            Some(state) => match side {
                ClampSide::Upper if state.uses_upper_bound() != enabled => {
                    state.set_use_upper_bound(enabled);
                    true
                }
                ClampSide::Lower if state.uses_lower_bound() != enabled => {
                    state.set_use_lower_bound(enabled);
                    true
                }
                _ => false,
            },
            None => false,
        };
        if changed {
            self.propagate(&[index]);
        }
        Ok(())
    }

    fn bound_at(&self, index: NodeIndex, side: ClampSide) -> Option<NodeIndex> {
        let state = self.stat_at(index)?;
        match side {
            ClampSide::Upper => state.upper_bound,
            ClampSide::Lower => state.lower_bound,
        }
    }

    fn clear_bound(&mut self, index: NodeIndex, side: ClampSide) {
        if let Some(state) = self.stat_at_mut(index) {
            match side {
                ClampSide::Upper => state.upper_bound = None,
                ClampSide::Lower => state.lower_bound = None,
            }
        }
    }

    /// Restore a stat's base from its initial value and zero its offset.
    ///
    /// With `clear_modifiers` every modifier is detached as well.
    pub fn reset(&mut self, stat: StatHandle, clear_modifiers: bool) -> Result<(), StatError> {
        let index = self.stat_index(stat)?;
        let (base, initial) = match self.stat_at_mut(index) {
            Some(state) => {
                state.set_offset(0.0);
                (state.base, state.initial_value())
            }
            None => return Err(StatError::StaleHandle(stat.0)),
        };
        if clear_modifiers {
            self.clear_modifiers(index);
        }
        self.settle_base(base, initial, index);
        Ok(())
    }

    /// Bake a stat's current value into its base.
    ///
    /// The offset is zeroed and all modifiers are detached, so the value
    /// read afterwards is unchanged. Dependents of the base node see the
    /// new base.
    pub fn freeze(&mut self, stat: StatHandle) -> Result<(), StatError> {
        let index = self.stat_index(stat)?;
        let value = self.read(index);
        self.clear_modifiers(index);
        let base = match self.stat_at_mut(index) {
            Some(state) => {
                state.set_offset(0.0);
                state.base
            }
            None => return Err(StatError::StaleHandle(stat.0)),
        };
        self.settle_base(base, value, index);
        debug!(stat = %stat, value, "froze stat");
        Ok(())
    }

    /// Assign a stat's base and settle the stat in a single wave.
    fn settle_base(&mut self, base: NodeIndex, value: StatValue, stat: NodeIndex) {
        let changed = match &mut self.graph[base].kind {
            NodeKind::Value(bindable) => bindable.set(value),
            _ => false,
        };
        if changed {
            self.propagate(&[base, stat]);
        } else {
            self.propagate(&[stat]);
        }
    }

    /// Per-frame maintenance.
    ///
    /// Prunes inactive modifiers. In [`NotifyMode::Batched`], a pending
    /// notification is delivered to subscribers with the current value and
    /// cleared. Returns whether a notification was flushed.
    pub fn tick(&mut self, stat: StatHandle) -> Result<bool, StatError> {
        let index = self.stat_index(stat)?;
        self.prune_at(index);
        let pending = self
            .stat_at_mut(index)
            .map(|state| state.take_pending_notify())
            .unwrap_or(false);
        if pending {
            let value = self.read(index);
            self.graph[index].subscribers.notify(value);
        }
        Ok(pending)
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Remove a node and every edge touching it.
    ///
    /// Dependents are rewired immediately: modifiers lose their base and
    /// recompute, stats lose the bound or modifier and are invalidated.
    /// Removing a stat also removes the base value it created and detaches
    /// its modifiers, leaving them alive but inactive.
    ///
    /// # Errors
    ///
    /// `BaseInUse` if the node is a value backing some stat's base.
    pub fn remove(&mut self, node: impl Into<NodeHandle>) -> Result<(), StatError> {
        let handle = node.into();
        let index = self.resolve(handle)?;

        let dependents: Vec<(NodeIndex, Dependency)> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .map(|edge| (edge.target(), *edge.weight()))
            .collect();
        if dependents
            .iter()
            .any(|(_, dependency)| *dependency == Dependency::StatBase)
        {
            return Err(StatError::BaseInUse(handle));
        }

        let mut owned_base = None;
        if let Some(state) = self.stat_at(index) {
            if state.owns_base {
                owned_base = Some(state.base);
            }
            let attached = state.modifiers.clone();
            for modifier in attached {
                if let Some(modifier) = self.modifier_at_mut(modifier) {
                    modifier.set_active(false);
                }
            }
        }

        self.graph.remove_node(index);
        debug!(node = %handle, "removed node");

        let mut roots = Vec::with_capacity(dependents.len());
        for (dependent, dependency) in dependents {
            match dependency {
                Dependency::ModifierBase => {
                    if let Some(state) = self.modifier_at_mut(dependent) {
                        state.base = None;
                    }
                }
                Dependency::Modifier => {
                    if let Some(state) = self.stat_at_mut(dependent) {
                        state.modifiers.retain(|&modifier| modifier != index);
                    }
                }
                Dependency::UpperBound => self.clear_bound(dependent, ClampSide::Upper),
                Dependency::LowerBound => self.clear_bound(dependent, ClampSide::Lower),
                Dependency::StatBase => continue,
            }
            if !roots.contains(&dependent) {
                roots.push(dependent);
            }
        }
        self.propagate(&roots);

        if let Some(base) = owned_base {
            let base = self.handle_at(base);
            self.remove(base)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Propagation
    // ------------------------------------------------------------------

    /// Settle everything downstream of `roots` in one wave.
    ///
    /// `roots` are nodes whose own state was just modified. Every node
    /// reachable from them is visited once, in dependency order: a modifier
    /// recomputes and counts as changed only if its value moved, a stat is
    /// invalidated as soon as one of its inputs changed. Subscribers are
    /// notified after the wave, once per node, with settled values.
    fn propagate(&mut self, roots: &[NodeIndex]) {
        let order = self.downstream_order(roots);
        let mut changed: HashSet<NodeIndex> = HashSet::with_capacity(order.len());
        let mut notify = Vec::new();

        for node in order {
            let is_root = roots.contains(&node);
            if !is_root
                && !self
                    .graph
                    .neighbors_directed(node, Direction::Incoming)
                    .any(|input| changed.contains(&input))
            {
                continue;
            }
            if self.settle(node) {
                trace!(node = node.index(), "settled");
                changed.insert(node);
                if self.wants_notify(node) {
                    notify.push(node);
                }
            }
        }

        for node in notify {
            let value = self.read(node);
            self.graph[node].subscribers.notify(value);
        }
    }

    /// Bring a node up to date with its inputs. Returns whether dependents
    /// must hear about it.
    fn settle(&mut self, index: NodeIndex) -> bool {
        if matches!(self.graph[index].kind, NodeKind::Modifier(_)) {
            return self.refresh_modifier(index);
        }
        if let Some(stat) = self.stat_at_mut(index) {
            stat.invalidate();
        }
        true
    }

    fn wants_notify(&self, index: NodeIndex) -> bool {
        let node = &self.graph[index];
        let immediate = match &node.kind {
            NodeKind::Stat(stat) => stat.notify_mode() == NotifyMode::Immediate,
            _ => true,
        };
        immediate && !node.subscribers.is_empty()
    }

    fn refresh_modifier(&mut self, index: NodeIndex) -> bool {
        let base = match self.modifier_at(index) {
            Some(state) => state.base,
            None => return false,
        };
        let base_value = base.map(|base| self.read(base));
        self.modifier_at_mut(index)
            .map(|state| state.refresh(base_value))
            .unwrap_or(false)
    }

    /// `roots` and every node reachable from them, sources before
    /// dependents.
    ///
    /// Nodes on a cycle (only possible with [`CycleCheck::SelfOnly`]) come
    /// last, in discovery order.
    fn downstream_order(&self, roots: &[NodeIndex]) -> Vec<NodeIndex> {
        let mut discovered: Vec<NodeIndex> = Vec::new();
        let mut seen = HashSet::new();
        for &root in roots {
            if seen.insert(root) {
                discovered.push(root);
            }
        }
        let mut stack = discovered.clone();
        while let Some(node) = stack.pop() {
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if seen.insert(next) {
                    discovered.push(next);
                    stack.push(next);
                }
            }
        }

        let mut in_degree: HashMap<NodeIndex, usize> =
            discovered.iter().map(|&node| (node, 0)).collect();
        for &node in &discovered {
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree += 1;
                }
            }
        }

        let mut ready: VecDeque<NodeIndex> = discovered
            .iter()
            .copied()
            .filter(|node| in_degree.get(node) == Some(&0))
            .collect();
        let mut order = Vec::with_capacity(discovered.len());
        while let Some(node) = ready.pop_front() {
            order.push(node);
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(next);
                    }
                }
            }
        }

        if order.len() < discovered.len() {
            error!(
                unordered = discovered.len() - order.len(),
                "dependency cycle, propagation order is arbitrary"
            );
            let placed: HashSet<NodeIndex> = order.iter().copied().collect();
            order.extend(discovered.into_iter().filter(|node| !placed.contains(node)));
        }
        order
    }

    // ------------------------------------------------------------------
    // Wiring helpers
    // ------------------------------------------------------------------

    /// Validate a new edge `source -> dependent`.
    fn check_dependency(&self, source: NodeIndex, dependent: NodeIndex) -> Result<(), StatError> {
        if source == dependent {
            let handle = self.handle_at(source);
            warn!(node = %handle, "rejected self dependency");
            return Err(StatError::InvalidDependency(handle));
        }
        if self.config.cycle_check == CycleCheck::SelfOnly {
            return Ok(());
        }
        if let Some(path) = self.find_path(dependent, source) {
            let mut cycle = Vec::with_capacity(path.len() + 1);
            cycle.push(self.handle_at(source));
            cycle.extend(path.into_iter().map(|index| self.handle_at(index)));
            let err = StatError::Cycle { path: cycle };
            warn!(%err, "rejected dependency");
            return Err(err);
        }
        Ok(())
    }

    /// Shortest path `from -> ... -> to` along dependency edges.
    fn find_path(&self, from: NodeIndex, to: NodeIndex) -> Option<Vec<NodeIndex>> {
        let mut previous: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut visited = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);

        while let Some(node) = queue.pop_front() {
            if node == to {
                let mut path = vec![to];
                let mut current = to;
                while let Some(&prev) = previous.get(&current) {
                    path.push(prev);
                    current = prev;
                }
                path.reverse();
                return Some(path);
            }
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if visited.insert(next) {
                    previous.insert(next, node);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    fn disconnect(&mut self, source: NodeIndex, dependent: NodeIndex, dependency: Dependency) {
        let edge = self
            .graph
            .edges_directed(dependent, Direction::Incoming)
            .find(|edge| edge.source() == source && *edge.weight() == dependency)
            .map(|edge| edge.id());
        if let Some(edge) = edge {
            self.graph.remove_edge(edge);
        }
    }

    fn detach_modifier(&mut self, stat: NodeIndex, modifier: NodeIndex) {
        if let Some(state) = self.stat_at_mut(stat) {
            state.modifiers.retain(|&index| index != modifier);
        }
        self.disconnect(modifier, stat, Dependency::Modifier);
    }

    fn clear_modifiers(&mut self, index: NodeIndex) {
        let attached = match self.stat_at_mut(index) {
            Some(state) => std::mem::take(&mut state.modifiers),
            None => return,
        };
        for modifier in attached {
            self.disconnect(modifier, index, Dependency::Modifier);
            if let Some(state) = self.modifier_at_mut(modifier) {
                state.set_active(false);
            }
        }
    }

    fn owner_of(&self, modifier: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .edges_directed(modifier, Direction::Outgoing)
            .find(|edge| *edge.weight() == Dependency::Modifier)
            .map(|edge| edge.target())
    }

    // ------------------------------------------------------------------
    // Node access
    // ------------------------------------------------------------------

    fn handle_at(&self, index: NodeIndex) -> NodeHandle {
        NodeHandle::new(index, self.graph[index].generation)
    }

    fn resolve(&self, handle: NodeHandle) -> Result<NodeIndex, StatError> {
        match self.graph.node_weight(handle.index) {
            Some(node) if node.generation == handle.generation => Ok(handle.index),
            _ => Err(StatError::StaleHandle(handle)),
        }
    }

    fn value_index(&self, value: ValueHandle) -> Result<NodeIndex, StatError> {
        let index = self.resolve(value.0)?;
        match self.graph[index].kind {
            NodeKind::Value(_) => Ok(index),
            _ => Err(StatError::StaleHandle(value.0)),
        }
    }

    fn modifier_index(&self, modifier: ModifierHandle) -> Result<NodeIndex, StatError> {
        let index = self.resolve(modifier.0)?;
        self.modifier_at(index)
            .map(|_| index)
            .ok_or(StatError::StaleHandle(modifier.0))
    }

    fn stat_index(&self, stat: StatHandle) -> Result<NodeIndex, StatError> {
        let index = self.resolve(stat.0)?;
        self.stat_at(index)
            .map(|_| index)
            .ok_or(StatError::StaleHandle(stat.0))
    }

    fn stat_at(&self, index: NodeIndex) -> Option<&Stat> {
        match &self.graph.node_weight(index)?.kind {
            NodeKind::Stat(stat) => Some(stat),
            _ => None,
        }
    }

    fn stat_at_mut(&mut self, index: NodeIndex) -> Option<&mut Stat> {
        match &mut self.graph.node_weight_mut(index)?.kind {
            NodeKind::Stat(stat) => Some(stat),
            _ => None,
        }
    }

    fn modifier_at(&self, index: NodeIndex) -> Option<&Modifier> {
        match &self.graph.node_weight(index)?.kind {
            NodeKind::Modifier(modifier) => Some(modifier),
            _ => None,
        }
    }

    fn modifier_at_mut(&mut self, index: NodeIndex) -> Option<&mut Modifier> {
        match &mut self.graph.node_weight_mut(index)?.kind {
            NodeKind::Modifier(modifier) => Some(modifier),
            _ => None,
        }
    }
}

impl Default for StatGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(graph: &mut StatGraph, node: impl Into<NodeHandle>) -> Rc<RefCell<Vec<f64>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        graph
            .subscribe(node, move |v| sink.borrow_mut().push(v))
            .unwrap();
        log
    }

    #[test]
    fn test_create_stat() {
        let mut graph = StatGraph::new();
        let hp = graph.create_stat(100.0);
        assert_eq!(graph.value(hp).unwrap(), 100.0);
        assert_eq!(graph.base_value(hp).unwrap(), 100.0);
        assert_eq!(graph.initial_value(hp).unwrap(), 100.0);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_value_cache_hit() {
        let mut graph = StatGraph::new();
        let hp = graph.create_stat(100.0);
        let flat = graph.create_modifier(ModifierDef::flat(5.0)).unwrap();
        graph.add_modifier(hp, flat).unwrap();

        assert!(graph.is_dirty(hp).unwrap());
        assert_eq!(graph.value(hp).unwrap(), 105.0);
        assert_eq!(graph.value(hp).unwrap(), 105.0);
        assert_eq!(graph.recompute_count(hp).unwrap(), 1);
        assert!(!graph.is_dirty(hp).unwrap());
    }

    #[test]
    fn test_set_value_equality_gate() {
        let mut graph = StatGraph::new();
        let value = graph.create_value(1.0);
        let log = recorder(&mut graph, value);

        assert!(graph.set_value(value, 2.0).unwrap());
        assert!(!graph.set_value(value, 2.0).unwrap());
        assert!(graph.set_value(value, 3.0).unwrap());
        assert_eq!(*log.borrow(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_unchanged_base_does_not_dirty() {
        let mut graph = StatGraph::new();
        let hp = graph.create_stat(50.0);
        graph.value(hp).unwrap();
        assert!(!graph.set_base_value(hp, 50.0).unwrap());
        assert!(!graph.is_dirty(hp).unwrap());
        assert!(graph.set_base_value(hp, 60.0).unwrap());
        assert!(graph.is_dirty(hp).unwrap());
    }

    #[test]
    fn test_modifier_follows_base() {
        let mut graph = StatGraph::new();
        let strength = graph.create_value(10.0);
        let scaled = graph
            .create_modifier(ModifierDef::percent(2.0, strength))
            .unwrap();
        assert_eq!(graph.value(scaled).unwrap(), 20.0);

        graph.set_value(strength, 15.0).unwrap();
        assert_eq!(graph.value(scaled).unwrap(), 30.0);
    }

    #[test]
    fn test_modifier_notifies_only_on_change() {
        let mut graph = StatGraph::new();
        let base = graph.create_value(10.0);
        let modifier = graph
            .create_modifier(ModifierDef::percent(0.0, base))
            .unwrap();
        let log = recorder(&mut graph, modifier);

        graph.set_value(base, 20.0).unwrap(); // 20 * 0 is still 0
        assert!(log.borrow().is_empty());

        graph.set_magnitude(modifier, 0.5).unwrap();
        assert_eq!(*log.borrow(), vec![10.0]);
    }

    #[test]
    fn test_mult_effect() {
        let mut graph = StatGraph::new();
        let atk = graph.create_stat(200.0);
        let a = graph.create_modifier(ModifierDef::flat(0.1).mult()).unwrap();
        let b = graph.create_modifier(ModifierDef::flat(0.15).mult()).unwrap();
        graph.add_modifier(atk, a).unwrap();
        graph.add_modifier(atk, b).unwrap();
        // 200 + 200 * 0.25
        assert_eq!(graph.value(atk).unwrap(), 250.0);
        assert_eq!(
            graph.modifier(a).unwrap().effect(),
            ModifierEffect::Mult
        );
    }

    #[test]
    fn test_add_modifier_twice_keeps_one_entry() {
        let mut graph = StatGraph::new();
        let hp = graph.create_stat(10.0);
        let flat = graph.create_modifier(ModifierDef::flat(1.0)).unwrap();
        graph.add_modifier(hp, flat).unwrap();
        graph.add_modifier(hp, flat).unwrap();
        assert_eq!(graph.modifiers(hp).unwrap(), vec![flat]);
        assert_eq!(graph.value(hp).unwrap(), 11.0);
    }

    #[test]
    fn test_add_modifier_moves_between_stats() {
        let mut graph = StatGraph::new();
        let a = graph.create_stat(10.0);
        let b = graph.create_stat(20.0);
        let flat = graph.create_modifier(ModifierDef::flat(5.0)).unwrap();

        graph.add_modifier(a, flat).unwrap();
        assert_eq!(graph.value(a).unwrap(), 15.0);

        graph.add_modifier(b, flat).unwrap();
        assert_eq!(graph.value(a).unwrap(), 10.0);
        assert_eq!(graph.value(b).unwrap(), 25.0);
        assert_eq!(graph.modifier_owner(flat).unwrap(), Some(b));
    }

    #[test]
    fn test_remove_modifier_not_attached() {
        let mut graph = StatGraph::new();
        let hp = graph.create_stat(10.0);
        let flat = graph.create_modifier(ModifierDef::flat(5.0)).unwrap();
        assert!(!graph.remove_modifier(hp, flat).unwrap());
    }

    #[test]
    fn test_deactivate_then_prune() {
        let mut graph = StatGraph::new();
        let hp = graph.create_stat(10.0);
        let flat = graph.create_modifier(ModifierDef::flat(5.0)).unwrap();
        graph.add_modifier(hp, flat).unwrap();
        assert_eq!(graph.value(hp).unwrap(), 15.0);

        graph.deactivate(flat).unwrap();
        assert_eq!(graph.value(hp).unwrap(), 10.0);
        assert_eq!(graph.modifiers(hp).unwrap().len(), 1);

        graph.activate(flat).unwrap();
        assert_eq!(graph.value(hp).unwrap(), 15.0);

        graph.deactivate(flat).unwrap();
        assert_eq!(graph.prune_inactive(hp).unwrap(), 1);
        assert!(graph.modifiers(hp).unwrap().is_empty());
        assert_eq!(graph.modifier_owner(flat).unwrap(), None);
        assert_eq!(graph.value(hp).unwrap(), 10.0);
    }

    #[test]
    fn test_modifier_self_base_rejected() {
        let mut graph = StatGraph::new();
        let flat = graph.create_modifier(ModifierDef::flat(1.0)).unwrap();
        let err = graph
            .set_modifier_base(flat, Some(flat.into()))
            .unwrap_err();
        assert_eq!(err, StatError::InvalidDependency(flat.into()));
        assert_eq!(graph.modifier_base(flat).unwrap(), None);
    }

    #[test]
    fn test_modifier_based_on_own_stat_rejected() {
        let mut graph = StatGraph::new();
        let hp = graph.create_stat(100.0);
        let percent = graph
            .create_modifier(ModifierDef::percent(0.1, hp))
            .unwrap();
        let err = graph.add_modifier(hp, percent).unwrap_err();
        assert_eq!(err, StatError::InvalidDependency(hp.into()));
        assert!(graph.modifiers(hp).unwrap().is_empty());
    }

    #[test]
    fn test_rebase_to_owner_rejected() {
        let mut graph = StatGraph::new();
        let hp = graph.create_stat(100.0);
        let flat = graph.create_modifier(ModifierDef::flat(1.0)).unwrap();
        graph.add_modifier(hp, flat).unwrap();
        let err = graph
            .set_modifier_base(flat, Some(hp.into()))
            .unwrap_err();
        assert!(matches!(err, StatError::InvalidDependency(_)));
    }

    #[test]
    fn test_longer_cycle_rejected() {
        let mut graph = StatGraph::new();
        let a = graph.create_stat(10.0);
        let b = graph.create_stat(20.0);
        // b is bounded by a
        graph.set_upper_bound(b, a, true).unwrap();

        // a gets a modifier reading b: b -> m -> a -> b
        let m = graph.create_modifier(ModifierDef::percent(0.5, b)).unwrap();
        let err = graph.add_modifier(a, m).unwrap_err();
        match err {
            StatError::Cycle { path } => {
                assert_eq!(path.first(), path.last());
                assert!(path.contains(&a.into()));
                assert!(path.contains(&b.into()));
                assert!(path.contains(&m.into()));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_only_allows_longer_cycle_but_terminates() {
        let config = GraphConfig::default().with_cycle_check(CycleCheck::SelfOnly);
        let mut graph = StatGraph::with_config(config);
        let a = graph.create_stat(10.0);
        let b = graph.create_stat(20.0);
        graph.set_upper_bound(b, a, true).unwrap();
        let m = graph.create_modifier(ModifierDef::flat(1.0).based_on(b)).unwrap();
        graph.add_modifier(a, m).unwrap();

        // each node on the loop is settled once per write
        graph.set_base_value(a, 11.0).unwrap();
        assert!(graph.value(a).unwrap().is_finite());
    }

    #[test]
    fn test_bounds() {
        let mut graph = StatGraph::new();
        let hp = graph.create_stat(150.0);
        let max = graph.create_value(100.0);
        let min = graph.create_value(0.0);

        graph.set_upper_bound(hp, max, true).unwrap();
        graph.set_lower_bound(hp, min, true).unwrap();
        assert_eq!(graph.value(hp).unwrap(), 100.0);

        graph.set_value(max, 120.0).unwrap();
        assert_eq!(graph.value(hp).unwrap(), 120.0);

        graph.set_use_upper_bound(hp, false).unwrap();
        assert_eq!(graph.value(hp).unwrap(), 150.0);

        graph.set_base_value(hp, -5.0).unwrap();
        assert_eq!(graph.value(hp).unwrap(), 0.0);

        graph.remove_lower_bound(hp).unwrap();
        assert_eq!(graph.value(hp).unwrap(), -5.0);
        assert_eq!(graph.lower_bound(hp).unwrap(), None);
    }

    #[test]
    fn test_replacing_bound_drops_old_subscription() {
        let mut graph = StatGraph::new();
        let hp = graph.create_stat(50.0);
        let old = graph.create_value(40.0);
        let new = graph.create_value(45.0);

        graph.set_upper_bound(hp, old, true).unwrap();
        graph.set_upper_bound(hp, new, true).unwrap();
        assert_eq!(graph.value(hp).unwrap(), 45.0);

        graph.set_value(old, 10.0).unwrap();
        assert!(!graph.is_dirty(hp).unwrap());
        assert_eq!(graph.upper_bound(hp).unwrap(), Some(new.into()));
    }

    #[test]
    fn test_bound_on_self_rejected() {
        let mut graph = StatGraph::new();
        let hp = graph.create_stat(50.0);
        let err = graph.set_upper_bound(hp, hp, true).unwrap_err();
        assert_eq!(err, StatError::InvalidDependency(hp.into()));
    }

    #[test]
    fn test_reset() {
        let mut graph = StatGraph::new();
        let hp = graph.create_stat(100.0);
        let flat = graph.create_modifier(ModifierDef::flat(10.0)).unwrap();
        graph.add_modifier(hp, flat).unwrap();
        graph.set_base_value(hp, 80.0).unwrap();
        graph.set_stat_value(hp, 200.0).unwrap();

        graph.reset(hp, false).unwrap();
        assert_eq!(graph.offset(hp).unwrap(), 0.0);
        assert_eq!(graph.value(hp).unwrap(), 110.0);

        graph.reset(hp, true).unwrap();
        assert_eq!(graph.value(hp).unwrap(), 100.0);
        assert!(!graph.is_active(flat).unwrap());
    }

    #[test]
    fn test_freeze() {
        let mut graph = StatGraph::new();
        let hp = graph.create_stat(2000.0);
        let flat = graph.create_modifier(ModifierDef::flat(100.0)).unwrap();
        let base = graph.base_of(hp).unwrap();
        let percent = graph
            .create_modifier(ModifierDef::percent(0.1, base))
            .unwrap();
        graph.add_modifier(hp, flat).unwrap();
        graph.add_modifier(hp, percent).unwrap();
        assert_eq!(graph.value(hp).unwrap(), 2300.0);

        graph.freeze(hp).unwrap();
        assert_eq!(graph.value(hp).unwrap(), 2300.0);
        assert_eq!(graph.base_value(hp).unwrap(), 2300.0);
        assert!(graph.modifiers(hp).unwrap().is_empty());
    }

    #[test]
    fn test_reset_notifies_once() {
        let mut graph = StatGraph::new();
        let hp = graph.create_stat(100.0);
        graph.set_base_value(hp, 80.0).unwrap();
        let log = recorder(&mut graph, hp);

        graph.reset(hp, false).unwrap();
        assert_eq!(*log.borrow(), vec![100.0]);

        // base already at its initial value
        graph.reset(hp, false).unwrap();
        assert_eq!(*log.borrow(), vec![100.0, 100.0]);
    }

    #[test]
    fn test_freeze_notifies_once() {
        let mut graph = StatGraph::new();
        let hp = graph.create_stat(100.0);
        let flat = graph.create_modifier(ModifierDef::flat(20.0)).unwrap();
        graph.add_modifier(hp, flat).unwrap();
        let log = recorder(&mut graph, hp);

        graph.freeze(hp).unwrap();
        assert_eq!(*log.borrow(), vec![120.0]);
        assert_eq!(graph.base_value(hp).unwrap(), 120.0);
    }

    #[test]
    fn test_downstream_order_puts_sources_first() {
        let mut graph = StatGraph::new();
        let level = graph.create_value(1.0);
        let scaled = graph
            .create_modifier(ModifierDef::percent(2.0, level))
            .unwrap();
        let a = graph.create_stat(0.0);
        let b = graph.create_stat(0.0);
        graph.add_modifier(a, scaled).unwrap();
        graph.set_upper_bound(b, a, true).unwrap();
        graph.set_lower_bound(b, level, true).unwrap();

        let order = graph.downstream_order(&[level.node().index]);
        let position = |handle: NodeHandle| {
            order.iter().position(|&index| index == handle.index).unwrap()
        };
        assert_eq!(order.len(), 4);
        assert!(position(level.node()) < position(scaled.node()));
        assert!(position(scaled.node()) < position(a.node()));
        assert!(position(a.node()) < position(b.node()));
    }

    #[test]
    fn test_immediate_notifications() {
        let mut graph = StatGraph::new();
        let hp = graph.create_stat(10.0);
        let log = recorder(&mut graph, hp);

        graph.set_base_value(hp, 20.0).unwrap();
        let flat = graph.create_modifier(ModifierDef::flat(5.0)).unwrap();
        graph.add_modifier(hp, flat).unwrap();

        assert_eq!(*log.borrow(), vec![20.0, 25.0]);
        assert!(!graph.tick(hp).unwrap());
    }

    #[test]
    fn test_batched_notifications() {
        let mut graph = StatGraph::with_config(
            GraphConfig::default().with_notify_mode(NotifyMode::Batched),
        );
        let hp = graph.create_stat(10.0);
        let log = recorder(&mut graph, hp);

        graph.set_base_value(hp, 20.0).unwrap();
        graph.set_base_value(hp, 30.0).unwrap();
        graph.set_stat_value(hp, 35.0).unwrap();
        assert!(log.borrow().is_empty());

        assert!(graph.tick(hp).unwrap());
        assert_eq!(*log.borrow(), vec![35.0]);

        assert!(!graph.tick(hp).unwrap());
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_tick_prunes() {
        let mut graph = StatGraph::new();
        let hp = graph.create_stat(10.0);
        let flat = graph.create_modifier(ModifierDef::flat(5.0)).unwrap();
        graph.add_modifier(hp, flat).unwrap();
        graph.deactivate(flat).unwrap();
        graph.tick(hp).unwrap();
        assert!(graph.modifiers(hp).unwrap().is_empty());
    }

    #[test]
    fn test_shared_base() {
        let mut graph = StatGraph::new();
        let level = graph.create_value(5.0);
        let a = graph.create_stat_with_base(level).unwrap();
        let b = graph.create_stat_with_base(level).unwrap();
        graph.set_value(level, 6.0).unwrap();
        assert_eq!(graph.value(a).unwrap(), 6.0);
        assert_eq!(graph.value(b).unwrap(), 6.0);

        assert_eq!(graph.remove(level), Err(StatError::BaseInUse(level.into())));
        graph.remove(a).unwrap();
        graph.remove(b).unwrap();
        assert!(graph.contains(level));
        graph.remove(level).unwrap();
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_remove_bound_node_rewires() {
        let mut graph = StatGraph::new();
        let hp = graph.create_stat(150.0);
        let max = graph.create_stat(100.0);
        graph.set_upper_bound(hp, max, true).unwrap();
        assert_eq!(graph.value(hp).unwrap(), 100.0);

        graph.remove(max).unwrap();
        assert_eq!(graph.upper_bound(hp).unwrap(), None);
        assert_eq!(graph.value(hp).unwrap(), 150.0);
        assert_eq!(graph.value(max), Err(StatError::StaleHandle(max.into())));
    }

    #[test]
    fn test_remove_stat_unbases_modifiers() {
        let mut graph = StatGraph::new();
        let atk = graph.create_stat(60.0);
        let def = graph.create_stat(50.0);
        let base = graph.base_of(atk).unwrap();
        let percent = graph
            .create_modifier(ModifierDef::percent(0.5, base))
            .unwrap();
        graph.add_modifier(def, percent).unwrap();
        assert_eq!(graph.value(def).unwrap(), 80.0);

        graph.remove(atk).unwrap();
        assert!(!graph.contains(base));
        assert_eq!(graph.modifier_base(percent).unwrap(), None);
        // without a base the modifier is its magnitude
        assert_eq!(graph.value(def).unwrap(), 50.5);
    }

    #[test]
    fn test_remove_stat_detaches_modifiers() {
        let mut graph = StatGraph::new();
        let hp = graph.create_stat(10.0);
        let flat = graph.create_modifier(ModifierDef::flat(1.0)).unwrap();
        graph.add_modifier(hp, flat).unwrap();
        graph.remove(hp).unwrap();
        assert_eq!(graph.modifier_owner(flat).unwrap(), None);
        assert!(!graph.is_active(flat).unwrap());
    }

    #[test]
    fn test_stale_handle_after_slot_reuse() {
        let mut graph = StatGraph::new();
        let old = graph.create_value(1.0);
        graph.remove(old).unwrap();
        let new = graph.create_value(2.0);
        assert_eq!(old.node().index(), new.node().index());
        assert_eq!(graph.value(old), Err(StatError::StaleHandle(old.into())));
        assert_eq!(graph.value(new).unwrap(), 2.0);
    }

    #[test]
    fn test_stat_handle_of_wrong_kind_is_stale() {
        let mut graph = StatGraph::new();
        let value = graph.create_value(1.0);
        let fake = StatHandle(value.node());
        assert_eq!(graph.stat(fake).unwrap_err(), StatError::StaleHandle(value.node()));
    }

    #[test]
    fn test_find_path() {
        let mut graph = StatGraph::new();
        let a = graph.create_value(1.0);
        let m = graph.create_modifier(ModifierDef::flat(1.0).based_on(a)).unwrap();
        let s = graph.create_stat(0.0);
        graph.add_modifier(s, m).unwrap();

        let path = graph.find_path(a.node().index, s.node().index).unwrap();
        assert_eq!(path, vec![a.node().index, m.node().index, s.node().index]);
        assert!(graph.find_path(s.node().index, a.node().index).is_none());
    }
}
