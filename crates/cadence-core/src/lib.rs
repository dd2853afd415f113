//! Cadence Core - real-time control/signal dataflow runtime
//!
//! This crate runs compiled audio patches: a graph of signal objects processed
//! a few samples at a time, steered by timestamped control messages that are
//! delivered with sample accuracy. Nothing allocates in the audio path once a
//! patch is compiled, except a table resize requested by a message.
//!
//! # Core Abstractions
//!
//! ## Messages
//!
//! - [`Message`] - Timestamped list of up to [`MAX_ELEMENTS`] typed elements
//! - [`Element`] - Bang, float, symbol or hash
//! - [`MessagePool`] - Byte-budgeted arena for pending messages
//! - [`Scheduler`] - Timestamp-ordered queue, FIFO on ties
//!
//! ## Signal Processing
//!
//! - [`Vector`] - [`VECTOR_WIDTH`] samples, the unit of processing
//! - [`Backend`] - Scalar or four-lane kernels, numerically interchangeable
//! - [`SignalGraph`] - Topologically scheduled object graph
//! - [`SignalObject`] - Object-safe trait for every signal object
//! - [`objects`] - Phasor, table readers and writers, delay, convolution, binops
//!
//! ## Tables
//!
//! - [`Table`] - Named, resizable, vector-aligned sample buffer
//! - [`TableSet`] - Tables addressed by name or [`TableId`]
//!
//! ## Runtime
//!
//! - [`Context`] - Owns everything above and drives it block by block
//! - [`ContextConfig`] - Construction parameters
//! - [`Route`] - Where a named receiver delivers its messages
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible (it needs `alloc`). Disable the default
//! `std` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! cadence-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{Context, ContextConfig, Route};
//! use cadence_core::objects::{Binop, BinopKind, Phasor};
//!
//! let mut cx = Context::with_config(ContextConfig::new(48_000.0).with_channels(0, 1)).unwrap();
//! let osc = cx.add_object(Box::new(Phasor::new(440.0)));
//! let gain = cx.add_object(Box::new(Binop::new(BinopKind::Mul, 0.5)));
//! let out = cx.add_output(0).unwrap();
//! cx.connect(osc, gain, 0).unwrap();
//! cx.connect(gain, out, 0).unwrap();
//! cx.add_route("freq", Route::inlet(osc, 0)).unwrap();
//! cx.compile().unwrap();
//!
//! cx.send_float("freq", 220.0).unwrap();
//! let mut left = [0.0f32; 64];
//! let frames = cx.process(&[], &mut [&mut left], 64).unwrap();
//! assert_eq!(frames, 64);
//! ```
//!
//! # Design Principles
//!
//! - **Real-time safe**: No allocations while processing a compiled patch
//! - **Deterministic**: Same inputs and messages give the same output on
//!   every backend
//! - **Object-safe traits**: Heterogeneous objects behind `Box<dyn SignalObject>`

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod config;
pub mod context;
pub mod graph;
pub mod message;
pub mod objects;
pub mod pool;
pub mod scheduler;
pub mod table;
pub mod vector;

// Re-export main types at crate root
pub use config::ContextConfig;
pub use context::{Context, ContextError, FormatArg, PrintHook, Route, SendHook};
pub use graph::{CompiledSchedule, EdgeId, GraphError, NodeId, NodeKind, SignalGraph};
pub use message::{
    Element, ElementType, MAX_ELEMENTS, Message, MessageError, Symbol, symbol_hash,
};
pub use objects::{ObjectContext, SignalObject};
pub use pool::{DEFAULT_POOL_KB, MAX_POOL_KB, MessageHandle, MessagePool, PoolError, SLOT_BYTES};
pub use scheduler::{ReceiverId, ScheduledEvent, Scheduler};
pub use table::{Table, TableError, TableId, TableSet};
pub use vector::{Backend, SILENCE, VECTOR_WIDTH, Vector};
