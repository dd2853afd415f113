//! Vector width and the kernel backends that run on it.
//!
//! Signal objects work on one [`Vector`] of [`VECTOR_WIDTH`] samples per call.
//! The hot inner loops that benefit from lane parallelism (table gathers and
//! convolution dot products) are routed through [`Backend`], which has a
//! scalar reference implementation and a 4-lane implementation written so the
//! compiler can map it onto SSE/NEON registers. Both produce the same results
//! within floating-point associativity, and the test suite runs every object
//! against both.

/// Samples per vector.
pub const VECTOR_WIDTH: usize = 4;

/// One vector of samples.
pub type Vector = [f32; VECTOR_WIDTH];

/// A vector of zeros.
pub const SILENCE: Vector = [0.0; VECTOR_WIDTH];

/// Rounds `n` down to a multiple of [`VECTOR_WIDTH`].
#[inline]
pub const fn floor_to_vector(n: usize) -> usize {
    n & !(VECTOR_WIDTH - 1)
}

/// Rounds `n` up to a multiple of [`VECTOR_WIDTH`].
#[inline]
pub const fn ceil_to_vector(n: usize) -> usize {
    (n + VECTOR_WIDTH - 1) & !(VECTOR_WIDTH - 1)
}

/// Builds a vector with every lane set to `value`.
#[inline]
pub fn splat(value: f32) -> Vector {
    [value; VECTOR_WIDTH]
}

/// Adds `src` into `dst` lane by lane.
#[inline]
pub fn accumulate(dst: &mut Vector, src: &Vector) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += *s;
    }
}

/// Kernel implementation used by vectorized objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Backend {
    /// One sample at a time, in reference summation order.
    Scalar,
    /// Four independent accumulators; maps onto 128-bit SIMD registers.
    Lanes4,
}

impl Default for Backend {
    fn default() -> Self {
        Self::detect()
    }
}

impl Backend {
    /// All backends, for exhaustive testing.
    pub const ALL: [Backend; 2] = [Backend::Scalar, Backend::Lanes4];

    /// Picks the 4-lane backend when the target has 128-bit SIMD.
    pub fn detect() -> Self {
        if cfg!(any(
            target_feature = "sse2",
            target_feature = "neon",
            target_feature = "simd128"
        )) {
            Backend::Lanes4
        } else {
            Backend::Scalar
        }
    }

    /// Gathers `table[indices[lane]]` into a vector.
    ///
    /// Every index must lie in `[0, table.len())`. An out-of-range lane is a
    /// caller error: it trips a debug assertion and reads as `0.0` otherwise.
    #[inline]
    pub fn gather(self, table: &[f32], indices: &Vector) -> Vector {
        match self {
            Backend::Scalar => {
                let mut out = SILENCE;
                for (o, &x) in out.iter_mut().zip(indices) {
                    *o = lookup(table, x);
                }
                out
            }
            Backend::Lanes4 => {
                let idx = indices.map(to_index);
                let len = table.len() as i64;
                if idx.iter().all(|&i| (0..len).contains(&i)) {
                    idx.map(|i| table[i as usize])
                } else {
                    indices.map(|x| lookup(table, x))
                }
            }
        }
    }

    /// Dot product of `window` with `coeffs` reversed:
    /// `Σ_i window[k-1-i] * coeffs[i]` where `k = coeffs.len()`.
    ///
    /// `window` must be at least as long as `coeffs`; extra samples are
    /// ignored.
    #[inline]
    pub fn dot_reversed(self, window: &[f32], coeffs: &[f32]) -> f32 {
        let k = coeffs.len();
        debug_assert!(window.len() >= k, "convolution window shorter than kernel");
        let window = &window[..k];
        match self {
            Backend::Scalar => {
                let mut acc = 0.0f32;
                for (i, &c) in coeffs.iter().enumerate() {
                    acc += window[k - 1 - i] * c;
                }
                acc
            }
            Backend::Lanes4 => {
                let mut acc = SILENCE;
                let mut rev = window.iter().rev();
                let mut chunks = coeffs.chunks_exact(VECTOR_WIDTH);
                for chunk in &mut chunks {
                    for (a, &c) in acc.iter_mut().zip(chunk) {
                        if let Some(&x) = rev.next() {
                            *a += x * c;
                        }
                    }
                }
                let mut tail = 0.0f32;
                for (&c, &x) in chunks.remainder().iter().zip(rev) {
                    tail += x * c;
                }
                (acc[0] + acc[1]) + (acc[2] + acc[3]) + tail
            }
        }
    }
}

/// Truncating float-to-index conversion. NaN maps to 0.
#[inline]
fn to_index(x: f32) -> i64 {
    x as i64
}

#[inline]
fn lookup(table: &[f32], x: f32) -> f32 {
    let i = to_index(x);
    if i >= 0 && (i as usize) < table.len() {
        table[i as usize]
    } else {
        debug_assert!(
            false,
            "table index {i} out of range (capacity {})",
            table.len()
        );
        0.0
    }
}
