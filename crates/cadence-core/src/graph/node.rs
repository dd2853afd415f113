//! Graph node types.
//!
//! Each node has a [`NodeId`] and a [`NodeKind`]: an external input channel,
//! an output channel, or a signal object. `NodeData` bundles the kind with
//! the adjacency lists the compiler walks.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, vec::Vec};

use super::edge::EdgeId;
use crate::objects::SignalObject;

/// Identifier of a node in the signal graph.
///
/// Ids are assigned sequentially and stay valid for the life of the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// The role of a node.
pub enum NodeKind {
    /// Emits one channel of the host's input block.
    Input(usize),
    /// Sums everything connected to it into one channel of the output block.
    Output(usize),
    /// Runs a signal object.
    Object(Box<dyn SignalObject>),
}

impl NodeKind {
    /// Number of inlets edges and routes may target.
    pub fn num_inlets(&self) -> usize {
        match self {
            NodeKind::Input(_) => 0,
            NodeKind::Output(_) => 1,
            NodeKind::Object(obj) => obj.num_inlets(),
        }
    }

    /// Short label for diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Input(_) => "adc~",
            NodeKind::Output(_) => "dac~",
            NodeKind::Object(obj) => obj.name(),
        }
    }
}

impl core::fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NodeKind::Input(ch) => write!(f, "Input({ch})"),
            NodeKind::Output(ch) => write!(f, "Output({ch})"),
            NodeKind::Object(obj) => write!(f, "Object({})", obj.name()),
        }
    }
}

pub(crate) struct NodeData {
    pub kind: NodeKind,
    /// Edges arriving at this node.
    pub incoming: Vec<EdgeId>,
    /// Edges leaving this node.
    pub outgoing: Vec<EdgeId>,
}

impl NodeData {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }
}
