//! Signal objects: per-vector computations wired into the graph.
//!
//! Every object implements [`SignalObject`]. The graph calls
//! [`process`](SignalObject::process) once per vector in dependency order, and
//! the context calls [`on_message`](SignalObject::on_message) when a control
//! message is routed to one of the object's inlets. Parameters set by messages
//! are latched and take effect on the next processed vector.
//!
//! ## Design Decisions
//!
//! - **Tables by id**: objects never hold references into a table. They keep a
//!   [`TableId`] and borrow the table through [`ObjectContext`] for the
//!   duration of a call, so control messages may resize tables between
//!   vectors.
//!
//! - **Inlets are shared**: an inlet index names both a signal input (when an
//!   edge is connected to it) and a control input (when a route targets it).
//!   Unconnected signal inlets read silence.
//!
//! - **No allocation in `process`**: the one exception is [`Convolution`],
//!   which regrows its history when its kernel table was resized.

mod binop;
mod convolution;
mod delay;
mod line;
mod phasor;
mod tabread;
mod tabwrite;

pub use binop::{Binop, BinopKind, Var};
pub use convolution::Convolution;
pub use delay::DelayLine;
pub use line::Line;
pub use phasor::Phasor;
pub use tabread::{Tabhead, Tabread, TabreadMode, TabreadRandom};
pub use tabwrite::Tabwrite;

use crate::message::Message;
use crate::table::{TableId, TableSet};
use crate::vector::{Backend, Vector};

/// Shared runtime state handed to objects on every call.
pub struct ObjectContext<'a> {
    /// All tables owned by the context.
    pub tables: &'a mut TableSet,
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Kernel backend for vectorized inner loops.
    pub backend: Backend,
}

impl ObjectContext<'_> {
    /// Converts milliseconds to whole samples, rounding down. Negative and
    /// non-finite values map to 0.
    pub fn ms_to_samples(&self, ms: f64) -> usize {
        let samples = ms * self.sample_rate / 1000.0;
        if samples.is_finite() && samples > 0.0 {
            libm::floor(samples) as usize
        } else {
            0
        }
    }

    /// Resolves a `set <table>` message to a table id.
    pub(crate) fn retarget(&self, message: &Message) -> Option<TableId> {
        if message.len() >= 2 && message.is_symbol_eq(0, "set") && message.is_symbol(1) {
            let name = message.get_symbol(1);
            let id = self.tables.id(name);
            #[cfg(feature = "tracing")]
            if id.is_none() {
                tracing::debug!("retarget: unknown table '{name}'");
            }
            id
        } else {
            None
        }
    }
}

/// A node that produces one output vector per call.
///
/// Implementations must be `Send` so a whole context can move to an audio
/// thread.
pub trait SignalObject: Send {
    /// Short type name used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Number of inlets (signal and control share the numbering).
    fn num_inlets(&self) -> usize {
        1
    }

    /// Computes one output vector.
    ///
    /// `inputs` has one vector per inlet; inlets without signal connections
    /// hold silence.
    fn process(&mut self, cx: &mut ObjectContext<'_>, inputs: &[Vector], output: &mut Vector);

    /// Handles a control message arriving on `inlet`.
    ///
    /// Messages an object does not understand are ignored.
    fn on_message(&mut self, cx: &mut ObjectContext<'_>, inlet: usize, message: &Message) {
        let _ = (cx, inlet, message);
    }

    /// Called at compile time for every inlet, with whether an edge feeds it.
    fn set_inlet_connected(&mut self, inlet: usize, connected: bool) {
        let _ = (inlet, connected);
    }

    /// Clears internal state without changing parameters.
    fn reset(&mut self) {}
}
