//! Stat breakdown module.
//!
//! Contains the `StatBreakdown` type, a read-only trace of how a stat's
//! final value was computed. Useful for debugging and tooltips.

use crate::modifier::ModifierEffect;
use crate::numeric::StatValue;
use serde::{Deserialize, Serialize};

/// Which bound clamped the final value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClampSide {
    Upper,
    Lower,
}

/// A full trace of one stat evaluation.
///
/// # Examples
///
/// ```rust
/// use statbind::{ModifierDef, StatGraph};
///
/// let mut graph = StatGraph::new();
/// let hp = graph.create_stat(100.0);
/// let flat = graph.create_modifier(ModifierDef::flat(25.0)).unwrap();
/// let boost = graph.create_modifier(ModifierDef::flat(0.5).mult()).unwrap();
/// graph.add_modifier(hp, flat).unwrap();
/// graph.add_modifier(hp, boost).unwrap();
///
/// let breakdown = graph.breakdown(hp).unwrap();
/// assert_eq!(breakdown.base, 100.0);
/// assert_eq!(breakdown.add_sum, 25.0);
/// assert_eq!(breakdown.mult_sum, 0.5);
/// assert_eq!(breakdown.value, 175.0);
/// assert_eq!(breakdown.modifiers.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatBreakdown {
    /// Base value at evaluation time.
    pub base: StatValue,

    /// Manual offset.
    pub offset: StatValue,

    /// Contributions of the active modifiers, in insertion order.
    pub modifiers: Vec<(ModifierEffect, StatValue)>,

    /// Sum of all `Add` contributions.
    pub add_sum: StatValue,

    /// Sum of all `Mult` contributions.
    pub mult_sum: StatValue,

    /// `base + base * mult_sum + add_sum + offset`.
    pub unclamped: StatValue,

    /// Final value after bound clamping.
    pub value: StatValue,

    /// The bound that produced `value`, if any.
    pub clamped_by: Option<ClampSide>,
}

impl StatBreakdown {
    /// Aggregate a stat from its inputs.
    ///
    /// `upper` and `lower` are the bound values that are both attached and
    /// enabled. The upper clamp is applied first and the lower clamp last,
    /// so the lower bound wins when the two contradict.
    pub fn compute(
        base: StatValue,
        offset: StatValue,
        modifiers: Vec<(ModifierEffect, StatValue)>,
        upper: Option<StatValue>,
        lower: Option<StatValue>,
    ) -> Self {
        let mut add_sum = 0.0;
        let mut mult_sum = 0.0;
        for (effect, value) in &modifiers {
            match effect {
                ModifierEffect::Add => add_sum += value,
                ModifierEffect::Mult => mult_sum += value,
            }
        }

        let unclamped = base + (base * mult_sum) + add_sum + offset;
        let mut value = unclamped;
        let mut clamped_by = None;

        if let Some(upper) = upper {
            if value > upper {
                value = upper;
                clamped_by = Some(ClampSide::Upper);
            }
        }
        if let Some(lower) = lower {
            if value < lower {
                value = lower;
                clamped_by = Some(ClampSide::Lower);
            }
        }

        Self {
            base,
            offset,
            modifiers,
            add_sum,
            mult_sum,
            unclamped,
            value,
            clamped_by,
        }
    }
}
