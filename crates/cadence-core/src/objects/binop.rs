//! Constant signals and lane-wise arithmetic.

use super::{ObjectContext, SignalObject};
use crate::message::Message;
use crate::vector::{Vector, splat};

/// Signal variable: outputs a constant set by float messages on inlet 0.
#[derive(Debug, Clone)]
pub struct Var {
    value: f32,
}

impl Var {
    /// Creates a variable holding `value`.
    pub fn new(value: f32) -> Self {
        Self { value }
    }

    /// Current value.
    pub fn value(&self) -> f32 {
        self.value
    }
}

impl SignalObject for Var {
    fn name(&self) -> &'static str {
        "sig~"
    }

    fn process(&mut self, _cx: &mut ObjectContext<'_>, _inputs: &[Vector], output: &mut Vector) {
        *output = splat(self.value);
    }

    fn on_message(&mut self, _cx: &mut ObjectContext<'_>, _inlet: usize, message: &Message) {
        if message.is_float(0) {
            self.value = message.get_float(0);
        }
    }
}

/// Arithmetic performed by a [`Binop`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinopKind {
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`, with 0 when `b` is 0.
    Div,
    /// `min(a, b)`
    Min,
    /// `max(a, b)`
    Max,
}

impl BinopKind {
    /// Applies the operation to one pair of samples.
    #[inline]
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            BinopKind::Add => a + b,
            BinopKind::Sub => a - b,
            BinopKind::Mul => a * b,
            BinopKind::Div => {
                if b == 0.0 {
                    0.0
                } else {
                    a / b
                }
            }
            BinopKind::Min => a.min(b),
            BinopKind::Max => a.max(b),
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinopKind::Add => "+~",
            BinopKind::Sub => "-~",
            BinopKind::Mul => "*~",
            BinopKind::Div => "/~",
            BinopKind::Min => "min~",
            BinopKind::Max => "max~",
        }
    }
}

/// Lane-wise `left op right`.
///
/// The left operand is the signal on inlet 0. The right operand is the signal
/// on inlet 1 when an edge feeds it, otherwise a constant latched from float
/// messages on inlet 1.
#[derive(Debug, Clone)]
pub struct Binop {
    kind: BinopKind,
    constant: f32,
    right_is_signal: bool,
}

impl Binop {
    /// Creates an operator with a control-rate right operand.
    pub fn new(kind: BinopKind, constant: f32) -> Self {
        Self {
            kind,
            constant,
            right_is_signal: false,
        }
    }

    /// Operation performed.
    pub fn kind(&self) -> BinopKind {
        self.kind
    }

    /// Latched right operand.
    pub fn constant(&self) -> f32 {
        self.constant
    }
}

impl SignalObject for Binop {
    fn name(&self) -> &'static str {
        self.kind.symbol()
    }

    fn num_inlets(&self) -> usize {
        2
    }

    fn process(&mut self, _cx: &mut ObjectContext<'_>, inputs: &[Vector], output: &mut Vector) {
        let right = if self.right_is_signal {
            inputs[1]
        } else {
            splat(self.constant)
        };
        for ((o, &a), &b) in output.iter_mut().zip(&inputs[0]).zip(&right) {
            *o = self.kind.apply(a, b);
        }
    }

    fn on_message(&mut self, _cx: &mut ObjectContext<'_>, inlet: usize, message: &Message) {
        if inlet == 1 && message.is_float(0) {
            self.constant = message.get_float(0);
        }
    }

    fn set_inlet_connected(&mut self, inlet: usize, connected: bool) {
        if inlet == 1 {
            self.right_is_signal = connected;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::test_util::Harness;
    use crate::vector::SILENCE;

    #[test]
    fn var_follows_messages() {
        let mut h = Harness::new(48_000.0);
        let mut v = Var::new(0.25);
        assert_eq!(h.run(&mut v, &[SILENCE]), [0.25; 4]);
        h.send(&mut v, 0, &Message::float(0, -1.0));
        assert_eq!(h.run(&mut v, &[SILENCE]), [-1.0; 4]);
    }

    #[test]
    fn constant_right_operand() {
        let mut h = Harness::new(48_000.0);
        let mut m = Binop::new(BinopKind::Mul, 2.0);
        let x = [1.0, -2.0, 0.5, 0.0];
        assert_eq!(h.run(&mut m, &[x, SILENCE]), [2.0, -4.0, 1.0, 0.0]);
        h.send(&mut m, 1, &Message::float(0, 0.5));
        assert_eq!(h.run(&mut m, &[x, SILENCE]), [0.5, -1.0, 0.25, 0.0]);
    }

    #[test]
    fn signal_right_operand_overrides_constant() {
        let mut h = Harness::new(48_000.0);
        let mut s = Binop::new(BinopKind::Sub, 100.0);
        s.set_inlet_connected(1, true);
        let out = h.run(&mut s, &[[4.0; 4], [1.0, 2.0, 3.0, 4.0]]);
        assert_eq!(out, [3.0, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn division_by_zero_is_zero() {
        assert_eq!(BinopKind::Div.apply(1.0, 0.0), 0.0);
        assert_eq!(BinopKind::Div.apply(1.0, 4.0), 0.25);
        assert_eq!(BinopKind::Min.apply(1.0, -1.0), -1.0);
        assert_eq!(BinopKind::Max.apply(1.0, -1.0), 1.0);
    }
}
