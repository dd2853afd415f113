//! Construction parameters for a [`Context`](crate::Context).

#[cfg(not(feature = "std"))]
use alloc::string::{String, ToString};

use crate::pool::{DEFAULT_POOL_KB, MAX_POOL_KB};
use crate::vector::Backend;

/// Context construction parameters.
///
/// With the `serde` feature every field is optional when deserializing and
/// falls back to its default:
///
/// ```toml
/// sample_rate = 44100.0
/// pool_kb = 10
/// num_input_channels = 0
/// num_output_channels = 2
/// name = "cadence"
/// backend = "lanes4"
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct ContextConfig {
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Message pool budget in kilobytes.
    pub pool_kb: usize,
    /// Number of host input channels.
    pub num_input_channels: usize,
    /// Number of host output channels.
    pub num_output_channels: usize,
    /// Patch name.
    pub name: String,
    /// Directory patch-relative resources are resolved against.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub base_path: Option<String>,
    /// Kernel backend.
    pub backend: Backend,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            pool_kb: DEFAULT_POOL_KB,
            num_input_channels: 0,
            num_output_channels: 2,
            name: "cadence".to_string(),
            base_path: None,
            backend: Backend::detect(),
        }
    }
}

impl ContextConfig {
    /// Default configuration at `sample_rate`.
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Set the message pool budget.
    pub fn with_pool_kb(mut self, kb: usize) -> Self {
        self.pool_kb = kb;
        self
    }

    /// Set the channel counts.
    pub fn with_channels(mut self, inputs: usize, outputs: usize) -> Self {
        self.num_input_channels = inputs;
        self.num_output_channels = outputs;
        self
    }

    /// Set the patch name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the base path.
    pub fn with_base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Set the kernel backend.
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Checks the values a context cannot run with.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err("sample rate must be positive and finite");
        }
        if self.pool_kb == 0 {
            return Err("message pool must be at least 1 KB");
        }
        if self.pool_kb > MAX_POOL_KB {
            return Err("message pool is limited to 16384 KB");
        }
        Ok(())
    }
}
