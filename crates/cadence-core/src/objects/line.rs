//! Sample-accurate linear ramp (`line~`).

use super::{ObjectContext, SignalObject};
use crate::message::Message;
use crate::vector::Vector;

/// Ramps linearly from its current value to a target.
///
/// Inlet 0 takes `[target]` (jump, or ramp over a time previously set on
/// inlet 1) or `[target, ms]`. `stop` freezes the ramp where it is. A ramp of
/// `n` samples lands exactly on its target at the `n`-th sample after the
/// vector the message was delivered in starts.
///
/// ```rust
/// use cadence_core::objects::Line;
///
/// let line = Line::new(0.5);
/// assert_eq!(line.value(), 0.5);
/// assert!(line.is_settled());
/// ```
#[derive(Debug, Clone)]
pub struct Line {
    current: f32,
    target: f32,
    increment: f32,
    samples_remaining: usize,
    /// Ramp time for the next bare target, consumed on use.
    pending_ms: Option<f64>,
}

impl Line {
    /// Creates a line resting at `value`.
    pub fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            increment: 0.0,
            samples_remaining: 0,
            pending_ms: None,
        }
    }

    /// Value of the last produced sample.
    pub fn value(&self) -> f32 {
        self.current
    }

    /// Target of the current ramp.
    pub fn target(&self) -> f32 {
        self.target
    }

    /// True once the ramp reached its target or was stopped.
    pub fn is_settled(&self) -> bool {
        self.samples_remaining == 0
    }

    fn start(&mut self, target: f32, samples: usize) {
        self.target = target;
        if samples == 0 {
            self.current = target;
            self.increment = 0.0;
            self.samples_remaining = 0;
        } else {
            self.increment = (target - self.current) / samples as f32;
            self.samples_remaining = samples;
        }
    }

    #[inline]
    fn advance(&mut self) -> f32 {
        if self.samples_remaining > 0 {
            self.current += self.increment;
            self.samples_remaining -= 1;
            if self.samples_remaining == 0 {
                self.current = self.target;
            }
        }
        self.current
    }
}

impl Default for Line {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl SignalObject for Line {
    fn name(&self) -> &'static str {
        "line~"
    }

    fn num_inlets(&self) -> usize {
        2
    }

    fn process(&mut self, _cx: &mut ObjectContext<'_>, _inputs: &[Vector], output: &mut Vector) {
        for o in output.iter_mut() {
            *o = self.advance();
        }
    }

    fn on_message(&mut self, cx: &mut ObjectContext<'_>, inlet: usize, message: &Message) {
        match inlet {
            0 if message.is_float(0) => {
                let target = message.get_float(0);
                if !target.is_finite() {
                    return;
                }
                let ms = if message.len() >= 2 && message.is_float(1) {
                    self.pending_ms = None;
                    Some(f64::from(message.get_float(1)))
                } else {
                    self.pending_ms.take()
                };
                let samples = ms.map_or(0, |ms| cx.ms_to_samples(ms));
                self.start(target, samples);
            }
            0 if message.is_symbol_eq(0, "stop") => {
                self.target = self.current;
                self.increment = 0.0;
                self.samples_remaining = 0;
            }
            1 if message.is_float(0) => {
                self.pending_ms = Some(f64::from(message.get_float(0)));
            }
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.increment = 0.0;
        self.samples_remaining = 0;
        self.current = self.target;
        self.pending_ms = None;
    }
}
