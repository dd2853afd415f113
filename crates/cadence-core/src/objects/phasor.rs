//! Sawtooth ramp in `[0, 1)`.

use super::{ObjectContext, SignalObject};
use crate::message::Message;
use crate::vector::Vector;

/// Largest `f32` strictly below 1.0.
const BELOW_ONE: f32 = 1.0 - f32::EPSILON / 2.0;

/// Phase accumulator producing a rising ramp that wraps at 1.0.
///
/// Inlet 0 sets the frequency in Hz (control float), or carries a per-sample
/// frequency signal for a phasor built with [`Phasor::signal`]. Inlet 1 resets
/// the phase. The accumulator is `f64`, so long renders at low frequencies do
/// not drift. Non-finite frequencies and phases are ignored; the ramp holds
/// still for samples whose signal frequency is not finite.
///
/// ```rust
/// use cadence_core::objects::Phasor;
///
/// let p = Phasor::new(440.0);
/// assert_eq!(p.frequency(), 440.0);
/// ```
#[derive(Debug, Clone)]
pub struct Phasor {
    phase: f64,
    frequency: f64,
    signal_rate: bool,
}

impl Phasor {
    /// Creates a phasor with a control-rate frequency.
    pub fn new(frequency: f64) -> Self {
        Self {
            phase: 0.0,
            frequency,
            signal_rate: false,
        }
    }

    /// Creates a phasor whose frequency comes from the signal on inlet 0.
    pub fn signal() -> Self {
        Self {
            phase: 0.0,
            frequency: 0.0,
            signal_rate: true,
        }
    }

    /// Current control-rate frequency in Hz.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Current phase in `[0, 1)`.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    #[inline]
    fn tick(&mut self, increment: f64) -> f32 {
        let out = (self.phase as f32).min(BELOW_ONE);
        if increment.is_finite() {
            self.phase = wrap(self.phase + increment);
        }
        out
    }
}

#[inline]
fn wrap(phase: f64) -> f64 {
    let p = phase - libm::floor(phase);
    // floor can leave exactly 1.0 for tiny negative inputs
    if p >= 1.0 { 0.0 } else { p }
}

impl SignalObject for Phasor {
    fn name(&self) -> &'static str {
        "phasor"
    }

    fn num_inlets(&self) -> usize {
        2
    }

    fn process(&mut self, cx: &mut ObjectContext<'_>, inputs: &[Vector], output: &mut Vector) {
        let inv_sr = 1.0 / cx.sample_rate;
        if self.signal_rate {
            for (o, &f) in output.iter_mut().zip(&inputs[0]) {
                *o = self.tick(f64::from(f) * inv_sr);
            }
        } else {
            let inc = self.frequency * inv_sr;
            for o in output.iter_mut() {
                *o = self.tick(inc);
            }
        }
    }

    fn on_message(&mut self, _cx: &mut ObjectContext<'_>, inlet: usize, message: &Message) {
        if !message.is_float(0) {
            return;
        }
        let value = f64::from(message.get_float(0));
        if !value.is_finite() {
            return;
        }
        match inlet {
            0 if !self.signal_rate => self.frequency = value,
            1 => self.phase = wrap(value),
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }
}
