//! Integer-sample delay line backed by a table.

use super::{ObjectContext, SignalObject};
use crate::message::Message;
use crate::table::TableId;
use crate::vector::Vector;

/// Delays inlet 0 by a whole number of samples, using a table as ring memory.
///
/// The delay time arrives on inlet 1 in milliseconds and is clamped to
/// `table.len() - 1` samples at processing time, so resizing the table takes
/// effect on the next vector. Each sample is written before the read, which
/// makes a delay of 0 a pass-through.
#[derive(Debug, Clone)]
pub struct DelayLine {
    table: TableId,
    write: usize,
    delay_samples: usize,
}

impl DelayLine {
    /// Creates a delay of `delay_samples` over `table`.
    pub fn new(table: TableId, delay_samples: usize) -> Self {
        Self {
            table,
            write: 0,
            delay_samples,
        }
    }

    /// Requested delay in samples (before clamping to the table).
    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }
}

impl SignalObject for DelayLine {
    fn name(&self) -> &'static str {
        "delay~"
    }

    fn num_inlets(&self) -> usize {
        2
    }

    fn process(&mut self, cx: &mut ObjectContext<'_>, inputs: &[Vector], output: &mut Vector) {
        let ring = cx.tables.get_mut(self.table).samples_mut();
        let len = ring.len();
        let delay = self.delay_samples.min(len - 1);
        let mut w = self.write % len;
        for (o, &x) in output.iter_mut().zip(&inputs[0]) {
            ring[w] = x;
            *o = ring[(w + len - delay) % len];
            w = (w + 1) % len;
        }
        self.write = w;
    }

    fn on_message(&mut self, cx: &mut ObjectContext<'_>, inlet: usize, message: &Message) {
        match inlet {
            1 if message.is_float(0) => {
                self.delay_samples = cx.ms_to_samples(f64::from(message.get_float(0)));
            }
            0 if message.is_symbol_eq(0, "clear") => {
                cx.tables.get_mut(self.table).clear();
                self.write = 0;
            }
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.write = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::test_util::Harness;

    fn impulse_response(delay: usize, ring_len: usize, vectors: usize) -> Vec<f32> {
        let mut h = Harness::new(1000.0);
        let id = h.tables.insert("ring", ring_len).unwrap();
        let mut d = DelayLine::new(id, delay);
        let mut out = Vec::new();
        for v in 0..vectors {
            let input = if v == 0 { [1.0, 0.0, 0.0, 0.0] } else { [0.0; 4] };
            out.extend_from_slice(&h.run(&mut d, &[input, [0.0; 4]]));
        }
        out
    }

    #[test]
    fn zero_delay_passes_through() {
        let out = impulse_response(0, 16, 2);
        assert_eq!(out[0], 1.0);
        assert!(out[1..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn impulse_arrives_after_delay() {
        let out = impulse_response(5, 16, 4);
        let peak = out.iter().position(|&s| s == 1.0);
        assert_eq!(peak, Some(5));
        assert_eq!(out.iter().filter(|&&s| s != 0.0).count(), 1);
    }

    #[test]
    fn delay_is_clamped_to_ring_length() {
        let out = impulse_response(100, 8, 4);
        assert_eq!(out.iter().position(|&s| s == 1.0), Some(7));
    }

    #[test]
    fn delay_message_is_in_milliseconds() {
        let mut h = Harness::new(1000.0);
        let id = h.tables.insert("ring", 64).unwrap();
        let mut d = DelayLine::new(id, 0);
        h.send(&mut d, 1, &Message::float(0, 3.0));
        assert_eq!(d.delay_samples(), 3);
        h.send(&mut d, 1, &Message::float(0, -2.0));
        assert_eq!(d.delay_samples(), 0);
    }
}
