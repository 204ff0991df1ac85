//! Error types for graph wiring and lookups.
//!
//! All errors that can occur while building or mutating a stat graph are
//! represented by the `StatError` enum. Numeric edge cases are never
//! errors: contradictory bounds resolve by a fixed tie-break.

use crate::handle::NodeHandle;
use thiserror::Error;

/// Format a cycle path as a readable string.
fn format_cycle_path(path: &[NodeHandle]) -> String {
    if path.is_empty() {
        return String::from("(empty cycle)");
    }
    path.iter()
        .map(|handle| handle.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors raised by [`StatGraph`](crate::StatGraph) and
/// [`StatContainer`](crate::StatContainer).
///
/// Dependency errors are programming errors on the caller's side: they are
/// raised synchronously at the point of attachment and the graph is left
/// unchanged.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatError {
    /// A node was wired to depend directly on itself.
    #[error("Invalid dependency: node {0} cannot depend on itself")]
    InvalidDependency(NodeHandle),

    /// Wiring the dependency would close a longer cycle.
    ///
    /// The path starts at the new dependency's source, follows existing
    /// edges and ends at the same node, e.g. `[A, B, C, A]`.
    #[error("Cycle detected: {}", format_cycle_path(.path))]
    Cycle { path: Vec<NodeHandle> },

    /// The handle refers to a removed node or to a node of another kind.
    #[error("Stale handle: {0}")]
    StaleHandle(NodeHandle),

    /// The value node is the base of a stat and cannot be removed on its own.
    #[error("Value {0} is the base of a stat")]
    BaseInUse(NodeHandle),

    /// A container key that an operation requires is not registered.
    #[error("Stat not registered: {0}")]
    KeyNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::graph::NodeIndex;

    fn handle(index: usize) -> NodeHandle {
        NodeHandle::new(NodeIndex::new(index), 0)
    }

    #[test]
    fn test_error_display() {
        let err = StatError::InvalidDependency(handle(4));
        assert!(err.to_string().contains("#4v0"));

        let err = StatError::KeyNotFound("MaxHp".into());
        assert_eq!(err.to_string(), "Stat not registered: MaxHp");
    }

    #[test]
    fn test_cycle_error_display() {
        let err = StatError::Cycle {
            path: vec![handle(0), handle(1), handle(2), handle(0)],
        };
        let display = err.to_string();
        assert!(display.contains("Cycle detected"));
        assert!(display.contains("#0v0 -> #1v0 -> #2v0 -> #0v0"));
    }

    #[test]
    fn test_empty_cycle_display() {
        let err = StatError::Cycle { path: Vec::new() };
        assert!(err.to_string().contains("(empty cycle)"));
    }
}
