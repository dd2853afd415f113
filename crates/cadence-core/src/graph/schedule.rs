//! Compiled schedule types.
//!
//! A [`CompiledSchedule`] is produced by
//! [`SignalGraph::compile()`](super::SignalGraph::compile): a flat list of
//! [`ProcessStep`]s in dependency order plus a flat table of input taps. The
//! audio path only walks these arrays; it never touches the adjacency lists.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// One edge as seen by the step that consumes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputTap {
    /// Node whose output vector is read.
    pub source: usize,
    /// Inlet of the consuming node the vector is summed into.
    pub inlet: usize,
}

/// A single instruction in the compiled schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessStep {
    /// Copy one external input channel into the node's output vector.
    ReadInput {
        /// Node index.
        node_idx: usize,
        /// Host input channel.
        channel: usize,
    },
    /// Gather inlet vectors and run the node's signal object.
    RunObject {
        /// Node index.
        node_idx: usize,
        /// First entry in [`CompiledSchedule::taps`].
        taps_start: usize,
        /// Number of taps feeding this node.
        taps_len: usize,
    },
    /// Sum the connected vectors into an output channel.
    WriteOutput {
        /// Host output channel.
        channel: usize,
        /// First entry in [`CompiledSchedule::taps`].
        taps_start: usize,
        /// Number of taps feeding this node.
        taps_len: usize,
    },
}

/// Immutable compiled snapshot of the signal graph.
#[derive(Debug, Default)]
pub struct CompiledSchedule {
    pub(crate) steps: Vec<ProcessStep>,
    pub(crate) taps: Vec<InputTap>,
    pub(crate) max_inlets: usize,
}

impl CompiledSchedule {
    /// Steps in execution order.
    pub fn steps(&self) -> &[ProcessStep] {
        &self.steps
    }

    /// Number of processing steps.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Widest inlet count of any object, the size of the gather space.
    pub fn max_inlets(&self) -> usize {
        self.max_inlets
    }

    /// Node indices of the object steps, in execution order.
    pub fn object_order(&self) -> impl Iterator<Item = usize> + '_ {
        self.steps.iter().filter_map(|s| match s {
            ProcessStep::RunObject { node_idx, .. } => Some(*node_idx),
            ProcessStep::ReadInput { .. } | ProcessStep::WriteOutput { .. } => None,
        })
    }
}
