//! Modifier nodes.
//!
//! A modifier derives its value from an optional base node and a private
//! magnitude. It is itself observable, so modifiers can be chained or used
//! as bounds. A `Stat` aggregates the modifiers attached to it according to
//! each modifier's [`ModifierEffect`].

use crate::bindable::BindableValue;
use crate::handle::NodeHandle;
use crate::numeric::StatValue;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// How a modifier combines its magnitude with its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    /// `base + magnitude`, or just `magnitude` without a base.
    #[default]
    Flat,
    /// `base * magnitude`, or just `magnitude` without a base.
    Percent,
}

/// How the owning stat aggregates the modifier's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierEffect {
    /// Summed and added to the stat's base.
    #[default]
    Add,
    /// Summed and multiplied by the stat's base before being added.
    Mult,
}

/// Declarative description of a modifier, turned into a node by
/// [`StatGraph::create_modifier`](crate::StatGraph::create_modifier).
///
/// # Examples
///
/// ```rust
/// use statbind::{ModifierDef, ModifierEffect, ModifierKind, StatGraph};
///
/// let mut graph = StatGraph::new();
/// let attack = graph.create_stat(60.0);
///
/// // +10% of attack's base, aggregated additively
/// let def = ModifierDef::percent(0.1, graph.base_of(attack).unwrap());
/// assert_eq!(def.kind, ModifierKind::Percent);
/// assert_eq!(def.effect, ModifierEffect::Add);
///
/// // a plain multiplier: +25% of whatever stat it is attached to
/// let boost = ModifierDef::flat(0.25).mult();
/// assert_eq!(boost.effect, ModifierEffect::Mult);
/// assert!(boost.base.is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModifierDef {
    /// The private magnitude.
    pub magnitude: StatValue,
    /// Combination rule with the base.
    pub kind: ModifierKind,
    /// Aggregation rule in the owning stat.
    pub effect: ModifierEffect,
    /// Node the modifier reads from.
    pub base: Option<NodeHandle>,
}

impl ModifierDef {
    /// A flat modifier without a base: its value is `magnitude`.
    pub fn flat(magnitude: StatValue) -> Self {
        Self {
            magnitude,
            kind: ModifierKind::Flat,
            effect: ModifierEffect::Add,
            base: None,
        }
    }

    /// A percent modifier reading `base`: its value is `base * magnitude`.
    pub fn percent(magnitude: StatValue, base: impl Into<NodeHandle>) -> Self {
        Self {
            magnitude,
            kind: ModifierKind::Percent,
            effect: ModifierEffect::Add,
            base: Some(base.into()),
        }
    }

    /// Read from `base`.
    pub fn based_on(mut self, base: impl Into<NodeHandle>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Set the aggregation rule.
    pub fn with_effect(mut self, effect: ModifierEffect) -> Self {
        self.effect = effect;
        self
    }

    /// Shorthand for `with_effect(ModifierEffect::Mult)`.
    pub fn mult(self) -> Self {
        self.with_effect(ModifierEffect::Mult)
    }
}

/// A computed node holding a magnitude and an optional base reference.
///
/// The graph owns the wiring; this type holds the node's state and the
/// combination rule.
#[derive(Debug, Clone)]
pub struct Modifier {
    magnitude: StatValue,
    kind: ModifierKind,
    effect: ModifierEffect,
    pub(crate) base: Option<NodeIndex>,
    active: bool,
    value: BindableValue,
}

impl Modifier {
    pub(crate) fn new(
        magnitude: StatValue,
        kind: ModifierKind,
        effect: ModifierEffect,
        base: Option<(NodeIndex, StatValue)>,
    ) -> Self {
        let value = compute(kind, magnitude, base.map(|(_, value)| value));
        Self {
            magnitude,
            kind,
            effect,
            base: base.map(|(index, _)| index),
            active: true,
            value: BindableValue::new(value),
        }
    }

    /// The private magnitude.
    pub fn magnitude(&self) -> StatValue {
        self.magnitude
    }

    /// Combination rule with the base.
    pub fn kind(&self) -> ModifierKind {
        self.kind
    }

    /// Aggregation rule in the owning stat.
    pub fn effect(&self) -> ModifierEffect {
        self.effect
    }

    /// Whether the owning stat counts this modifier.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The last computed value.
    pub fn value(&self) -> StatValue {
        self.value.get()
    }

    /// Compute the value for a given base value.
    pub fn calculate(&self, base: Option<StatValue>) -> StatValue {
        compute(self.kind, self.magnitude, base)
    }

    pub(crate) fn set_magnitude(&mut self, magnitude: StatValue) {
        self.magnitude = magnitude;
    }

    pub(crate) fn set_active(&mut self, active: bool) -> bool {
        let changed = self.active != active;
        self.active = active;
        changed
    }

    /// Recompute against `base` through the equality gate.
    pub(crate) fn refresh(&mut self, base: Option<StatValue>) -> bool {
        let value = self.calculate(base);
        self.value.set(value)
    }
}

fn compute(kind: ModifierKind, magnitude: StatValue, base: Option<StatValue>) -> StatValue {
    match (base, kind) {
        (None, _) => magnitude,
        (Some(base), ModifierKind::Flat) => base + magnitude,
        (Some(base), ModifierKind::Percent) => base * magnitude,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_without_base() {
        let modifier = Modifier::new(25.0, ModifierKind::Flat, ModifierEffect::Add, None);
        assert_eq!(modifier.value(), 25.0);
        assert!(modifier.is_active());
    }

    #[test]
    fn test_flat_with_base() {
        let modifier = Modifier::new(
            5.0,
            ModifierKind::Flat,
            ModifierEffect::Add,
            Some((NodeIndex::new(0), 10.0)),
        );
        assert_eq!(modifier.value(), 15.0);
    }

    #[test]
    fn test_percent_with_base() {
        let modifier = Modifier::new(
            0.1,
            ModifierKind::Percent,
            ModifierEffect::Add,
            Some((NodeIndex::new(0), 100.0)),
        );
        assert_eq!(modifier.value(), 10.0);
    }

    #[test]
    fn test_percent_without_base_is_magnitude() {
        let modifier = Modifier::new(0.5, ModifierKind::Percent, ModifierEffect::Mult, None);
        assert_eq!(modifier.value(), 0.5);
    }

    #[test]
    fn test_refresh_is_equality_gated() {
        let mut modifier = Modifier::new(
            2.0,
            ModifierKind::Percent,
            ModifierEffect::Add,
            Some((NodeIndex::new(0), 3.0)),
        );
        assert!(!modifier.refresh(Some(3.0)));
        assert!(modifier.refresh(Some(4.0)));
        assert_eq!(modifier.value(), 8.0);
    }

    #[test]
    fn test_set_active_reports_change() {
        let mut modifier = Modifier::new(1.0, ModifierKind::Flat, ModifierEffect::Add, None);
        assert!(!modifier.set_active(true));
        assert!(modifier.set_active(false));
        assert!(!modifier.is_active());
    }

    #[test]
    fn test_def_builder() {
        let def = ModifierDef::flat(3.0).mult();
        assert_eq!(def.magnitude, 3.0);
        assert_eq!(def.kind, ModifierKind::Flat);
        assert_eq!(def.effect, ModifierEffect::Mult);
        assert!(def.base.is_none());
    }
}
