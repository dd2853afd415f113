//! Signal graph for the cadence runtime.
//!
//! Patches are wired at load time (add nodes, connect, compile) and executed
//! once per vector from a flat [`CompiledSchedule`], with zero allocations.
//!
//! # Execution model
//!
//! - Every node owns one output [`Vector`](crate::Vector), sized at compile
//!   time.
//! - A node's inlets are gathered by summing the output vectors of every edge
//!   that targets them; unconnected inlets read silence.
//! - Nodes run in topological order (Kahn's algorithm, ties broken by
//!   insertion order), so producers always run before their consumers.
//!
//! # Example
//!
//! ```rust
//! use cadence_core::graph::SignalGraph;
//! use cadence_core::objects::{Binop, BinopKind, Phasor};
//!
//! let mut graph = SignalGraph::new(0, 1);
//! let osc = graph.add_object(Box::new(Phasor::new(220.0)));
//! let gain = graph.add_object(Box::new(Binop::new(BinopKind::Mul, 0.5)));
//! let out = graph.add_output(0).unwrap();
//!
//! graph.connect(osc, gain, 0).unwrap();
//! graph.connect(gain, out, 0).unwrap();
//! graph.compile().unwrap();
//! assert_eq!(graph.schedule().unwrap().step_count(), 3);
//! ```

pub mod edge;
pub mod node;
mod processing;
pub mod schedule;

pub use edge::EdgeId;
pub use node::{NodeId, NodeKind};
pub use processing::{GraphError, SignalGraph};
pub use schedule::{CompiledSchedule, InputTap, ProcessStep};
