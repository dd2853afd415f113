//! Graph edge types.
//!
//! An `Edge` carries the output vector of one node into an inlet of another.
//! Several edges into the same inlet are summed.

use super::node::NodeId;

/// Identifier of an edge in the signal graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EdgeId(pub(crate) u32);

impl EdgeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

/// A directed signal connection.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub inlet: usize,
}
