//! FIR convolution against a kernel table.

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use super::{ObjectContext, SignalObject};
use crate::message::Message;
use crate::table::TableId;
use crate::vector::{VECTOR_WIDTH, Vector};

/// Computes `y[n] = Σ x[n-i] · h[i]` with `h` read from a kernel table.
///
/// The kernel length `K` is the table's logical length. History holds the last
/// `K - 1` inputs followed by the current vector, so every lane's window is a
/// contiguous slice and the dot product goes through the context's
/// [`Backend`](crate::Backend).
#[derive(Debug, Clone)]
pub struct Convolution {
    kernel: TableId,
    history: Vec<f32>,
}

impl Convolution {
    /// Creates a convolution with the kernel in `kernel`.
    pub fn new(kernel: TableId) -> Self {
        Self {
            kernel,
            history: Vec::new(),
        }
    }

    /// Creates a convolution and sizes its history for a kernel of `k` taps,
    /// so the first processed vector does not allocate.
    pub fn with_kernel_len(kernel: TableId, k: usize) -> Self {
        Self {
            kernel,
            history: vec![0.0; k.saturating_sub(1) + VECTOR_WIDTH],
        }
    }

    /// Kernel table.
    pub fn kernel(&self) -> TableId {
        self.kernel
    }
}

impl SignalObject for Convolution {
    fn name(&self) -> &'static str {
        "conv~"
    }

    fn process(&mut self, cx: &mut ObjectContext<'_>, inputs: &[Vector], output: &mut Vector) {
        let coeffs = cx.tables.get(self.kernel).samples();
        let k = coeffs.len();
        let tail = k - 1;
        if self.history.len() != tail + VECTOR_WIDTH {
            #[cfg(feature = "tracing")]
            tracing::debug!("conv: kernel is now {k} taps, history reset");
            self.history.clear();
            self.history.resize(tail + VECTOR_WIDTH, 0.0);
        }

        self.history[tail..].copy_from_slice(&inputs[0]);
        for (j, o) in output.iter_mut().enumerate() {
            *o = cx.backend.dot_reversed(&self.history[j..j + k], coeffs);
        }
        self.history.copy_within(VECTOR_WIDTH.., 0);
    }

    fn on_message(&mut self, cx: &mut ObjectContext<'_>, _inlet: usize, message: &Message) {
        if let Some(id) = cx.retarget(message) {
            self.kernel = id;
        }
    }

    fn reset(&mut self) {
        self.history.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::test_util::Harness;
    use crate::table::Table;
    use crate::vector::Backend;

    fn run(kernel: &[f32], backend: Backend, input: &[f32]) -> Vec<f32> {
        let mut h = Harness::new(48_000.0);
        h.backend = backend;
        let id = h
            .tables
            .insert_table(Table::from_samples("ir", kernel).unwrap())
            .unwrap();
        let mut c = Convolution::with_kernel_len(id, kernel.len());
        input
            .chunks_exact(VECTOR_WIDTH)
            .flat_map(|chunk| {
                let v: Vector = [chunk[0], chunk[1], chunk[2], chunk[3]];
                h.run(&mut c, &[v])
            })
            .collect()
    }

    fn reference(kernel: &[f32], input: &[f32]) -> Vec<f32> {
        (0..input.len())
            .map(|n| {
                kernel
                    .iter()
                    .enumerate()
                    .filter(|&(i, _)| i <= n)
                    .map(|(i, &h)| input[n - i] * h)
                    .sum()
            })
            .collect()
    }

    fn signal(n: usize) -> Vec<f32> {
        (0..n).map(|i| ((i * 7 % 13) as f32 - 6.0) / 6.0).collect()
    }

    #[test]
    fn identity_kernel_reproduces_input() {
        let x = signal(16);
        for backend in Backend::ALL {
            assert_eq!(run(&[1.0, 0.0, 0.0], backend, &x), x);
        }
    }

    #[test]
    fn shifted_kernel_delays_by_one() {
        let x = signal(16);
        for backend in Backend::ALL {
            let y = run(&[0.0, 1.0, 0.0], backend, &x);
            assert_eq!(y[0], 0.0);
            assert_eq!(&y[1..], &x[..15]);
        }
    }

    #[test]
    fn long_kernel_matches_direct_form() {
        let kernel: Vec<f32> = (0..11).map(|i| 1.0 / (i as f32 + 1.0)).collect();
        let x = signal(64);
        let expected = reference(&kernel, &x);
        for backend in Backend::ALL {
            let y = run(&kernel, backend, &x);
            for (n, (a, b)) in y.iter().zip(&expected).enumerate() {
                assert!((a - b).abs() < 1e-5, "{backend:?} sample {n}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn kernel_resize_resets_history() {
        let mut h = Harness::new(48_000.0);
        let id = h
            .tables
            .insert_table(Table::from_samples("ir", &[1.0, 1.0]).unwrap())
            .unwrap();
        let mut c = Convolution::new(id);
        assert_eq!(h.run(&mut c, &[[1.0; 4]]), [1.0, 2.0, 2.0, 2.0]);
        h.tables.get_mut(id).resize(1).unwrap();
        assert_eq!(h.run(&mut c, &[[3.0; 4]]), [3.0; 4]);
    }
}
