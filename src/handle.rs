//! Handles addressing nodes in a [`StatGraph`](crate::graph::StatGraph).
//!
//! A handle is an arena index paired with the generation of the node that
//! was stored there when the handle was issued. Slots are recycled after a
//! node is removed, so a handle to a removed node never aliases its
//! replacement: the generation no longer matches and the graph reports
//! [`StatError::StaleHandle`](crate::error::StatError::StaleHandle).

use petgraph::graph::NodeIndex;
use std::fmt;

/// Untyped handle to any node in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    pub(crate) index: NodeIndex,
    pub(crate) generation: u32,
}

impl NodeHandle {
    pub(crate) fn new(index: NodeIndex, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot of this node.
    pub fn index(&self) -> usize {
        self.index.index()
    }

    /// Generation of the node this handle was issued for.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index.index(), self.generation)
    }
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub(crate) NodeHandle);

        impl $name {
            /// The untyped handle of this node.
            pub fn node(&self) -> NodeHandle {
                self.0
            }
        }

        impl From<$name> for NodeHandle {
            fn from(handle: $name) -> Self {
                handle.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

typed_handle!(
    /// Handle to a plain [`BindableValue`](crate::bindable::BindableValue) node.
    ValueHandle
);

typed_handle!(
    /// Handle to a [`Modifier`](crate::modifier::Modifier) node.
    ModifierHandle
);

typed_handle!(
    /// Handle to a [`Stat`](crate::stat::Stat) node.
    StatHandle
);
