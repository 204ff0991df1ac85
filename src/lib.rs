//! # statbind - Reactive Stat Graph for Games
//!
//! A small engine for character attributes (health, attack, defence, ...)
//! that stay correct on their own:
//! - **Reactive**: changing a base value, a modifier's magnitude or a bound
//!   updates every stat that depends on it, transitively
//! - **Lazy**: a stat recomputes only when read after one of its inputs
//!   changed
//! - **Cycle-safe**: self-references are rejected, and by default so is any
//!   dependency that would close a longer loop
//! - **Hardcode-free**: stats are addressed by handles or by whatever key
//!   type the host chooses
//!
//! ## Core Concepts
//!
//! ```text
//! [BindableValue] → [Modifier] → [Stat] → (bound of another Stat, base of another Modifier, ...)
//! ```
//!
//! 1. **Values** hold a plain scalar and announce real changes only
//! 2. **Modifiers** compute `base + magnitude` (flat) or `base * magnitude`
//!    (percent) from an optional base node
//! 3. **Stats** aggregate `base + base * Σmult + Σadd + offset`, then clamp
//!    by optional upper and lower bound nodes
//!
//! All nodes live in a single [`StatGraph`] arena and are addressed by
//! generation-checked handles. [`StatContainer`] maps host keys to stats.
//!
//! ## Example
//!
//! ```rust
//! use statbind::{ModifierDef, StatGraph};
//!
//! let mut graph = StatGraph::new();
//! let attack = graph.create_stat(60.0);
//! let defence = graph.create_stat(50.0);
//!
//! // defence gains 10% of attack's base
//! let attack_base = graph.base_of(attack).unwrap();
//! let bonus = graph
//!     .create_modifier(ModifierDef::percent(0.1, attack_base))
//!     .unwrap();
//! graph.add_modifier(defence, bonus).unwrap();
//! assert_eq!(graph.value(defence).unwrap(), 56.0);
//!
//! // no explicit recompute needed
//! graph.set_base_value(attack, 70.0).unwrap();
//! assert_eq!(graph.value(defence).unwrap(), 57.0);
//! ```
//!
//! ## Modules
//!
//! - [`graph`] - The node arena and every wiring operation
//! - [`container`] - Keyed registry of stats
//! - [`bindable`] - Leaf values and subscriber registries
//! - [`modifier`] - Modifier nodes and definitions
//! - [`stat`] - Stat node state
//! - [`breakdown`] - Evaluation traces
//! - [`config`] - Graph configuration
//! - [`handle`] - Node handles
//! - [`error`] - Error types

pub mod bindable;
pub mod breakdown;
pub mod config;
pub mod container;
pub mod error;
pub mod graph;
pub mod handle;
pub mod modifier;
pub mod numeric;
pub mod stat;

// Re-export main types for convenience
pub use container::StatContainer;
pub use error::StatError;
pub use graph::StatGraph;

pub use bindable::{BindableValue, SubscriptionId};
pub use breakdown::{ClampSide, StatBreakdown};
pub use config::{CycleCheck, GraphConfig, NotifyMode};
pub use handle::{ModifierHandle, NodeHandle, StatHandle, ValueHandle};
pub use modifier::{Modifier, ModifierDef, ModifierEffect, ModifierKind};
pub use stat::Stat;

pub use numeric::StatValue;
