//! Table readers: random access, linear, stoppable, and head.

use super::{ObjectContext, SignalObject};
use crate::message::Message;
use crate::table::TableId;
use crate::vector::{SILENCE, VECTOR_WIDTH, Vector, floor_to_vector, splat};

/// Head value meaning "not playing".
const STOPPED: u32 = u32::MAX;

/// Reads `table[index]` for each lane of the index signal on inlet 0.
///
/// Indices are truncated toward zero and must lie inside the table's
/// allocated capacity.
#[derive(Debug, Clone)]
pub struct TabreadRandom {
    table: TableId,
}

impl TabreadRandom {
    /// Creates a reader of `table`.
    pub fn new(table: TableId) -> Self {
        Self { table }
    }

    /// Table currently read.
    pub fn table(&self) -> TableId {
        self.table
    }
}

impl SignalObject for TabreadRandom {
    fn name(&self) -> &'static str {
        "tabread~"
    }

    fn process(&mut self, cx: &mut ObjectContext<'_>, inputs: &[Vector], output: &mut Vector) {
        let buffer = cx.tables.get(self.table).buffer();
        *output = cx.backend.gather(buffer, &inputs[0]);
    }

    fn on_message(&mut self, cx: &mut ObjectContext<'_>, _inlet: usize, message: &Message) {
        if let Some(id) = cx.retarget(message) {
            self.table = id;
        }
    }
}

/// How a linear [`Tabread`] moves its head.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TabreadMode {
    /// Head stays on vector boundaries; loops over the table.
    Aligned,
    /// Head may sit anywhere; loops over the table.
    Unaligned,
    /// Plays once from a start position, then emits silence until restarted.
    Stoppable,
}

/// Reads one vector per call from an advancing head.
///
/// Looping modes wrap the head to 0 when the next vector would run past the
/// table's capacity. The stoppable mode starts stopped; a bang starts it at 0
/// and a float starts it at that sample index.
#[derive(Debug, Clone)]
pub struct Tabread {
    table: TableId,
    mode: TabreadMode,
    head: u32,
}

impl Tabread {
    /// Creates a reader of `table` in `mode`.
    pub fn new(table: TableId, mode: TabreadMode) -> Self {
        let head = match mode {
            TabreadMode::Stoppable => STOPPED,
            TabreadMode::Aligned | TabreadMode::Unaligned => 0,
        };
        Self { table, mode, head }
    }

    /// Reading mode.
    pub fn mode(&self) -> TabreadMode {
        self.mode
    }

    /// Current head, or `None` while a stoppable reader is stopped.
    pub fn head(&self) -> Option<usize> {
        (self.head != STOPPED).then_some(self.head as usize)
    }

    /// True while a stoppable reader is stopped.
    pub fn is_stopped(&self) -> bool {
        self.head == STOPPED
    }

    fn seek(&mut self, cx: &ObjectContext<'_>, position: f32) {
        let position = if position.is_finite() && position > 0.0 {
            position as usize
        } else {
            0
        };
        self.head = match self.mode {
            TabreadMode::Aligned => floor_to_vector(position) as u32,
            TabreadMode::Unaligned => position as u32,
            TabreadMode::Stoppable => {
                if position < cx.tables.get(self.table).len() {
                    position as u32
                } else {
                    STOPPED
                }
            }
        };
    }
}

impl SignalObject for Tabread {
    fn name(&self) -> &'static str {
        match self.mode {
            TabreadMode::Aligned => "tabread~",
            TabreadMode::Unaligned => "tabreadu~",
            TabreadMode::Stoppable => "tabread_stoppable~",
        }
    }

    fn process(&mut self, cx: &mut ObjectContext<'_>, _inputs: &[Vector], output: &mut Vector) {
        let table = cx.tables.get(self.table);
        match self.mode {
            TabreadMode::Stoppable => {
                if self.head == STOPPED {
                    *output = SILENCE;
                    return;
                }
                let head = self.head as usize;
                let samples = table.samples();
                for (j, o) in output.iter_mut().enumerate() {
                    *o = samples.get(head + j).copied().unwrap_or(0.0);
                }
                let next = head + VECTOR_WIDTH;
                self.head = if next >= samples.len() {
                    STOPPED
                } else {
                    next as u32
                };
            }
            TabreadMode::Aligned | TabreadMode::Unaligned => {
                let buffer = table.buffer();
                let mut head = self.head as usize;
                if head + VECTOR_WIDTH > buffer.len() {
                    head = 0;
                }
                output.copy_from_slice(&buffer[head..head + VECTOR_WIDTH]);
                self.head = (head + VECTOR_WIDTH) as u32;
            }
        }
    }

    fn on_message(&mut self, cx: &mut ObjectContext<'_>, _inlet: usize, message: &Message) {
        if message.is_bang(0) {
            self.head = 0;
        } else if message.is_float(0) {
            self.seek(cx, message.get_float(0));
        } else if message.is_symbol_eq(0, "stop") {
            if self.mode == TabreadMode::Stoppable {
                self.head = STOPPED;
            }
        } else if let Some(id) = cx.retarget(message) {
            self.table = id;
            if self.mode != TabreadMode::Stoppable {
                self.head = 0;
            }
        }
    }

    fn reset(&mut self) {
        *self = Self::new(self.table, self.mode);
    }
}

/// Emits the head published by the referenced table's writer.
#[derive(Debug, Clone)]
pub struct Tabhead {
    table: TableId,
}

impl Tabhead {
    /// Creates a head reader of `table`.
    pub fn new(table: TableId) -> Self {
        Self { table }
    }
}

impl SignalObject for Tabhead {
    fn name(&self) -> &'static str {
        "tabhead~"
    }

    fn process(&mut self, cx: &mut ObjectContext<'_>, _inputs: &[Vector], output: &mut Vector) {
        *output = splat(cx.tables.get(self.table).head() as f32);
    }

    fn on_message(&mut self, cx: &mut ObjectContext<'_>, _inlet: usize, message: &Message) {
        if let Some(id) = cx.retarget(message) {
            self.table = id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Element;
    use crate::objects::test_util::Harness;
    use crate::table::Table;
    use crate::vector::Backend;

    fn harness_with_ramp(len: usize) -> (Harness, TableId) {
        let mut h = Harness::new(48_000.0);
        let samples: Vec<f32> = (0..len).map(|i| i as f32).collect();
        let id = h
            .tables
            .insert_table(Table::from_samples("ramp", &samples).unwrap())
            .unwrap();
        (h, id)
    }

    fn set_msg(name: &str) -> Message {
        Message::from_elements(0, &[Element::from("set"), Element::from(name)]).unwrap()
    }

    #[test]
    fn random_access_gathers_on_both_backends() {
        let (mut h, id) = harness_with_ramp(8);
        for backend in Backend::ALL {
            h.backend = backend;
            let mut r = TabreadRandom::new(id);
            let out = h.run(&mut r, &[[7.0, 0.0, 3.5, 1.0]]);
            assert_eq!(out, [7.0, 0.0, 3.0, 1.0]);
        }
    }

    #[test]
    fn aligned_reader_loops_over_capacity() {
        let (mut h, id) = harness_with_ramp(6);
        let mut r = Tabread::new(id, TabreadMode::Aligned);
        assert_eq!(h.run(&mut r, &[SILENCE]), [0.0, 1.0, 2.0, 3.0]);
        assert_eq!(h.run(&mut r, &[SILENCE]), [4.0, 5.0, 0.0, 0.0]);
        assert_eq!(h.run(&mut r, &[SILENCE]), [0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn aligned_seek_rounds_down() {
        let (mut h, id) = harness_with_ramp(16);
        let mut r = Tabread::new(id, TabreadMode::Aligned);
        h.send(&mut r, 0, &Message::float(0, 6.0));
        assert_eq!(r.head(), Some(4));
        assert_eq!(h.run(&mut r, &[SILENCE]), [4.0, 5.0, 6.0, 7.0]);

        let mut u = Tabread::new(id, TabreadMode::Unaligned);
        h.send(&mut u, 0, &Message::float(0, 6.0));
        assert_eq!(h.run(&mut u, &[SILENCE]), [6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn stoppable_plays_once() {
        let (mut h, id) = harness_with_ramp(6);
        let mut r = Tabread::new(id, TabreadMode::Stoppable);
        assert!(r.is_stopped());
        assert_eq!(h.run(&mut r, &[SILENCE]), SILENCE);

        h.send(&mut r, 0, &Message::bang(0));
        assert_eq!(h.run(&mut r, &[SILENCE]), [0.0, 1.0, 2.0, 3.0]);
        assert_eq!(h.run(&mut r, &[SILENCE]), [4.0, 5.0, 0.0, 0.0]);
        assert!(r.is_stopped());
        assert_eq!(h.run(&mut r, &[SILENCE]), SILENCE);
    }

    #[test]
    fn stoppable_stop_message_silences() {
        let (mut h, id) = harness_with_ramp(64);
        let mut r = Tabread::new(id, TabreadMode::Stoppable);
        h.send(&mut r, 0, &Message::float(0, 10.0));
        assert_eq!(h.run(&mut r, &[SILENCE]), [10.0, 11.0, 12.0, 13.0]);
        h.send(&mut r, 0, &Message::symbol(0, "stop"));
        assert_eq!(h.run(&mut r, &[SILENCE]), SILENCE);

        h.send(&mut r, 0, &Message::float(0, 1000.0));
        assert!(r.is_stopped());
    }

    #[test]
    fn set_retargets_table() {
        let (mut h, id) = harness_with_ramp(4);
        h.tables
            .insert_table(Table::from_samples("other", &[9.0; 4]).unwrap())
            .unwrap();
        let mut r = Tabread::new(id, TabreadMode::Aligned);
        h.send(&mut r, 0, &set_msg("other"));
        assert_eq!(h.run(&mut r, &[SILENCE]), [9.0; 4]);

        // unknown tables leave the target alone
        h.send(&mut r, 0, &set_msg("nope"));
        assert_eq!(h.run(&mut r, &[SILENCE]), [9.0; 4]);
    }

    #[test]
    fn tabhead_reports_table_head() {
        let (mut h, id) = harness_with_ramp(32);
        h.tables.get_mut(id).set_head(12);
        let mut t = Tabhead::new(id);
        assert_eq!(h.run(&mut t, &[SILENCE]), [12.0; 4]);
    }
}
