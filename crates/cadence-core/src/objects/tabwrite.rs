//! Records a signal into a table.

use super::{ObjectContext, SignalObject};
use crate::message::Message;
use crate::table::TableId;
use crate::vector::{SILENCE, VECTOR_WIDTH, Vector};

/// Writes the inlet-0 signal into a table from an advancing head.
///
/// Writing starts at index 0 as soon as the object runs and stops at the end
/// of the table; a bang restarts at 0, a float restarts at that index, `stop`
/// halts. After every vector the head is published to the table, where
/// [`Tabhead`](super::Tabhead) readers pick it up. The output is silence.
#[derive(Debug, Clone)]
pub struct Tabwrite {
    table: TableId,
    head: usize,
    running: bool,
}

impl Tabwrite {
    /// Creates a writer into `table`.
    pub fn new(table: TableId) -> Self {
        Self {
            table,
            head: 0,
            running: true,
        }
    }

    /// True while the writer is recording.
    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl SignalObject for Tabwrite {
    fn name(&self) -> &'static str {
        "tabwrite~"
    }

    fn process(&mut self, cx: &mut ObjectContext<'_>, inputs: &[Vector], output: &mut Vector) {
        *output = SILENCE;
        if !self.running {
            return;
        }
        let table = cx.tables.get_mut(self.table);
        let len = table.len();
        if self.head >= len {
            self.running = false;
            table.set_head(len);
            return;
        }
        let samples = table.samples_mut();
        for (j, &x) in inputs[0].iter().enumerate() {
            if let Some(s) = samples.get_mut(self.head + j) {
                *s = x;
            }
        }
        self.head = (self.head + VECTOR_WIDTH).min(len);
        if self.head == len {
            self.running = false;
        }
        table.set_head(self.head);
    }

    fn on_message(&mut self, cx: &mut ObjectContext<'_>, _inlet: usize, message: &Message) {
        if message.is_bang(0) {
            self.head = 0;
            self.running = true;
        } else if message.is_float(0) {
            let f = message.get_float(0);
            self.head = if f.is_finite() && f > 0.0 { f as usize } else { 0 };
            self.running = true;
        } else if message.is_symbol_eq(0, "stop") {
            self.running = false;
        } else if let Some(id) = cx.retarget(message) {
            self.table = id;
            self.head = 0;
        }
    }

    fn reset(&mut self) {
        self.head = 0;
        self.running = true;
    }
}
