//! Signal graph: mutation API, cycle detection, and per-vector execution.
//!
//! [`SignalGraph`] owns the nodes (input channels, output channels, signal
//! objects) and the edges between them. [`compile()`](SignalGraph::compile)
//! orders the nodes with Kahn's algorithm and flattens the result into a
//! [`CompiledSchedule`]; [`run_vector()`](SignalGraph::run_vector) then walks
//! that schedule once per vector using pre-allocated per-node vectors.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, collections::VecDeque, vec, vec::Vec};
#[cfg(feature = "std")]
use std::collections::VecDeque;

use super::edge::{Edge, EdgeId};
use super::node::{NodeData, NodeId, NodeKind};
use super::schedule::{CompiledSchedule, InputTap, ProcessStep};
use crate::message::Message;
use crate::objects::{ObjectContext, SignalObject};
use crate::vector::{SILENCE, Vector, accumulate};

/// Errors that can occur while building or driving the graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The node does not exist.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    /// The connection would close a loop.
    #[error("connection would create a cycle")]
    CycleDetected,
    /// The node has no such inlet.
    #[error("node {node} has {num_inlets} inlets, inlet {inlet} requested")]
    InvalidInlet {
        /// Target node.
        node: NodeId,
        /// Requested inlet.
        inlet: usize,
        /// Inlets the node actually has.
        num_inlets: usize,
    },
    /// The channel index exceeds the configured channel count.
    #[error("channel {channel} out of range ({available} configured)")]
    InvalidChannel {
        /// Requested channel.
        channel: usize,
        /// Configured channel count.
        available: usize,
    },
    /// The connection is structurally invalid.
    #[error("invalid connection: {0}")]
    InvalidConnection(&'static str),
    /// The same edge already exists.
    #[error("edge from {0} to {1} inlet {2} already exists")]
    DuplicateEdge(NodeId, NodeId, usize),
}

/// Directed acyclic graph of signal objects.
///
/// # Usage
///
/// 1. Create a graph with [`new()`](Self::new)
/// 2. Add nodes: [`add_input()`](Self::add_input),
///    [`add_output()`](Self::add_output), [`add_object()`](Self::add_object)
/// 3. Connect nodes: [`connect()`](Self::connect)
/// 4. Compile: [`compile()`](Self::compile)
/// 5. Process: [`run_vector()`](Self::run_vector)
///
/// Any mutation after compiling drops the schedule; compile again before
/// processing.
pub struct SignalGraph {
    nodes: Vec<NodeData>,
    edges: Vec<Edge>,
    num_inputs: usize,
    num_outputs: usize,
    compiled: Option<CompiledSchedule>,
    /// Output vector of every node, indexed by node. Sized at compile().
    vectors: Vec<Vector>,
    /// Inlet gather space for the object being run. Sized at compile().
    scratch: Vec<Vector>,
}

impl SignalGraph {
    /// Creates an empty graph for the given channel counts.
    pub fn new(num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            num_inputs,
            num_outputs,
            compiled: None,
            vectors: Vec::new(),
            scratch: Vec::new(),
        }
    }

    // --- Node mutations ---

    /// Adds a node emitting input channel `channel`.
    pub fn add_input(&mut self, channel: usize) -> Result<NodeId, GraphError> {
        if channel >= self.num_inputs {
            return Err(GraphError::InvalidChannel {
                channel,
                available: self.num_inputs,
            });
        }
        Ok(self.add_node(NodeKind::Input(channel)))
    }

    /// Adds a node feeding output channel `channel`.
    pub fn add_output(&mut self, channel: usize) -> Result<NodeId, GraphError> {
        if channel >= self.num_outputs {
            return Err(GraphError::InvalidChannel {
                channel,
                available: self.num_outputs,
            });
        }
        Ok(self.add_node(NodeKind::Output(channel)))
    }

    /// Adds a signal object.
    pub fn add_object(&mut self, object: Box<dyn SignalObject>) -> NodeId {
        self.add_node(NodeKind::Object(object))
    }

    fn add_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData::new(kind));
        self.compiled = None;
        id
    }

    // --- Edge mutations ---

    /// Connects the output of `from` to inlet `inlet` of `to`.
    ///
    /// # Errors
    ///
    /// - [`GraphError::NodeNotFound`] if either node is unknown
    /// - [`GraphError::InvalidInlet`] if `to` has no such inlet
    /// - [`GraphError::InvalidConnection`] if `from` is an output node
    /// - [`GraphError::DuplicateEdge`] if the edge already exists
    /// - [`GraphError::CycleDetected`] if `to` already reaches `from`
    pub fn connect(&mut self, from: NodeId, to: NodeId, inlet: usize) -> Result<EdgeId, GraphError> {
        let source = self.node(from)?;
        if matches!(source.kind, NodeKind::Output(_)) {
            return Err(GraphError::InvalidConnection("output nodes have no outlet"));
        }
        let num_inlets = self.node(to)?.kind.num_inlets();
        if inlet >= num_inlets {
            return Err(GraphError::InvalidInlet {
                node: to,
                inlet,
                num_inlets,
            });
        }
        if self.find_edge(from, to, inlet).is_some() {
            return Err(GraphError::DuplicateEdge(from, to, inlet));
        }
        // A cycle exists if `to` can already reach `from`.
        if self.can_reach(to, from) {
            return Err(GraphError::CycleDetected);
        }

        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge { from, to, inlet });
        self.nodes[from.0 as usize].outgoing.push(id);
        self.nodes[to.0 as usize].incoming.push(id);
        self.compiled = None;

        #[cfg(feature = "tracing")]
        tracing::debug!("graph_connect: {from} → {to}:{inlet}");

        Ok(id)
    }

    // --- Queries ---

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Kind of the node `id`.
    pub fn node_kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0 as usize).map(|n| &n.kind)
    }

    /// True once [`compile()`](Self::compile) succeeded and nothing changed
    /// since.
    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    /// The compiled schedule, if any.
    pub fn schedule(&self) -> Option<&CompiledSchedule> {
        self.compiled.as_ref()
    }

    /// Finds the edge `from → to:inlet`.
    pub fn find_edge(&self, from: NodeId, to: NodeId, inlet: usize) -> Option<EdgeId> {
        let node = self.nodes.get(from.0 as usize)?;
        node.outgoing.iter().copied().find(|e| {
            let edge = &self.edges[e.0 as usize];
            edge.to == to && edge.inlet == inlet
        })
    }

    fn node(&self, id: NodeId) -> Result<&NodeData, GraphError> {
        self.nodes
            .get(id.0 as usize)
            .ok_or(GraphError::NodeNotFound(id))
    }

    fn can_reach(&self, from: NodeId, to: NodeId) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![from];

        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            let idx = current.0 as usize;
            if idx >= visited.len() || visited[idx] {
                continue;
            }
            visited[idx] = true;
            for edge_id in &self.nodes[idx].outgoing {
                stack.push(self.edges[edge_id.0 as usize].to);
            }
        }
        false
    }

    // --- Compilation ---

    /// Orders the nodes and builds the [`CompiledSchedule`].
    ///
    /// Also tells every object which of its inlets are signal-connected and
    /// sizes the per-node vectors, so [`run_vector()`](Self::run_vector)
    /// never allocates.
    ///
    /// # Errors
    ///
    /// [`GraphError::CycleDetected`] if the graph is not acyclic. `connect()`
    /// already rejects cycles, so this only guards the invariant.
    pub fn compile(&mut self) -> Result<(), GraphError> {
        let sorted = self.kahn_sort()?;
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_sort: {} nodes in topo order", sorted.len());

        let mut steps = Vec::with_capacity(sorted.len());
        let mut taps = Vec::with_capacity(self.edges.len());
        let mut max_inlets = 1;

        for &idx in &sorted {
            let taps_start = taps.len();
            let node = &self.nodes[idx];
            for edge_id in &node.incoming {
                let edge = &self.edges[edge_id.0 as usize];
                taps.push(InputTap {
                    source: edge.from.0 as usize,
                    inlet: edge.inlet,
                });
            }
            let taps_len = taps.len() - taps_start;
            let step = match &node.kind {
                NodeKind::Input(channel) => ProcessStep::ReadInput {
                    node_idx: idx,
                    channel: *channel,
                },
                NodeKind::Output(channel) => ProcessStep::WriteOutput {
                    channel: *channel,
                    taps_start,
                    taps_len,
                },
                NodeKind::Object(obj) => {
                    max_inlets = max_inlets.max(obj.num_inlets());
                    ProcessStep::RunObject {
                        node_idx: idx,
                        taps_start,
                        taps_len,
                    }
                }
            };
            #[cfg(feature = "tracing")]
            tracing::trace!("graph_step: {step:?}");
            steps.push(step);
        }

        for node in &mut self.nodes {
            if let NodeKind::Object(obj) = &mut node.kind {
                for inlet in 0..obj.num_inlets() {
                    let connected = node
                        .incoming
                        .iter()
                        .any(|e| self.edges[e.0 as usize].inlet == inlet);
                    obj.set_inlet_connected(inlet, connected);
                }
            }
        }

        self.vectors = vec![SILENCE; self.nodes.len()];
        self.scratch = vec![SILENCE; max_inlets];
        self.compiled = Some(CompiledSchedule {
            steps,
            taps,
            max_inlets,
        });
        Ok(())
    }

    fn kahn_sort(&self) -> Result<Vec<usize>, GraphError> {
        let n = self.nodes.len();
        let mut in_degree: Vec<usize> = self.nodes.iter().map(|n| n.incoming.len()).collect();

        // Seed in insertion order so the schedule is deterministic.
        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut sorted = Vec::with_capacity(n);

        while let Some(idx) = queue.pop_front() {
            sorted.push(idx);
            for edge_id in &self.nodes[idx].outgoing {
                let to = self.edges[edge_id.0 as usize].to.0 as usize;
                in_degree[to] -= 1;
                if in_degree[to] == 0 {
                    queue.push_back(to);
                }
            }
        }

        if sorted.len() != n {
            return Err(GraphError::CycleDetected);
        }
        Ok(sorted)
    }

    // --- Execution ---

    /// Runs every step of the compiled schedule for one vector.
    ///
    /// `inputs` holds one vector per input channel. Results are summed into
    /// `outputs` (one vector per output channel), which the caller clears.
    /// Does nothing if the graph is not compiled.
    pub fn run_vector(
        &mut self,
        cx: &mut ObjectContext<'_>,
        inputs: &[Vector],
        outputs: &mut [Vector],
    ) {
        let Self {
            nodes,
            compiled,
            vectors,
            scratch,
            ..
        } = self;
        let Some(schedule) = compiled.as_ref() else {
            debug_assert!(false, "run_vector on an uncompiled graph");
            return;
        };

        for step in &schedule.steps {
            match *step {
                ProcessStep::ReadInput { node_idx, channel } => {
                    vectors[node_idx] = inputs.get(channel).copied().unwrap_or(SILENCE);
                }
                ProcessStep::RunObject {
                    node_idx,
                    taps_start,
                    taps_len,
                } => {
                    let NodeKind::Object(obj) = &mut nodes[node_idx].kind else {
                        continue;
                    };
                    let n_in = obj.num_inlets();
                    let inlets = &mut scratch[..n_in];
                    inlets.fill(SILENCE);
                    for tap in &schedule.taps[taps_start..taps_start + taps_len] {
                        accumulate(&mut inlets[tap.inlet], &vectors[tap.source]);
                    }
                    let mut out = SILENCE;
                    obj.process(cx, inlets, &mut out);
                    vectors[node_idx] = out;
                }
                ProcessStep::WriteOutput {
                    channel,
                    taps_start,
                    taps_len,
                } => {
                    if let Some(dst) = outputs.get_mut(channel) {
                        for tap in &schedule.taps[taps_start..taps_start + taps_len] {
                            accumulate(dst, &vectors[tap.source]);
                        }
                    }
                }
            }
        }
    }

    /// Delivers a control message to inlet `inlet` of object `node`.
    pub fn send_message(
        &mut self,
        cx: &mut ObjectContext<'_>,
        node: NodeId,
        inlet: usize,
        message: &Message,
    ) -> Result<(), GraphError> {
        let data = self
            .nodes
            .get_mut(node.0 as usize)
            .ok_or(GraphError::NodeNotFound(node))?;
        let num_inlets = match &data.kind {
            NodeKind::Object(obj) => obj.num_inlets(),
            NodeKind::Input(_) | NodeKind::Output(_) => 0,
        };
        match &mut data.kind {
            NodeKind::Object(obj) if inlet < num_inlets => {
                obj.on_message(cx, inlet, message);
                Ok(())
            }
            _ => Err(GraphError::InvalidInlet {
                node,
                inlet,
                num_inlets,
            }),
        }
    }

    /// Checks that a route to `node:inlet` would be deliverable.
    pub fn validate_inlet(&self, node: NodeId, inlet: usize) -> Result<(), GraphError> {
        let data = self.node(node)?;
        let num_inlets = match &data.kind {
            NodeKind::Object(obj) => obj.num_inlets(),
            NodeKind::Input(_) | NodeKind::Output(_) => 0,
        };
        if inlet < num_inlets {
            Ok(())
        } else {
            Err(GraphError::InvalidInlet {
                node,
                inlet,
                num_inlets,
            })
        }
    }

    /// Resets every object and clears the per-node vectors.
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            if let NodeKind::Object(obj) = &mut node.kind {
                obj.reset();
            }
        }
        self.vectors.fill(SILENCE);
    }
}
