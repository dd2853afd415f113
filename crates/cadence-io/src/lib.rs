//! File I/O for the cadence runtime.
//!
//! This crate provides:
//!
//! - **WAV file I/O**: [`read_wav`], [`write_wav`] and [`write_wav_interleaved`]
//! - **Table preloading**: [`load_table_from_wav`] fills a context table from a
//!   file, [`save_table_to_wav`] writes one back out
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cadence_core::Context;
//! use cadence_io::load_table_from_wav;
//!
//! let mut cx = Context::new(48_000.0)?;
//! let frames = load_table_from_wav(&mut cx, "ir", "impulse.wav")?;
//! println!("loaded {frames} samples into 'ir'");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod table;
mod wav;

pub use table::{load_table_from_wav, resolve_path, save_table_to_wav, table_from_wav};
pub use wav::{WavFormat, WavInfo, WavSpec, read_wav, read_wav_info, write_wav, write_wav_interleaved};

/// Error types for file I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Table creation or resize failed.
    #[error("table error: {0}")]
    Table(#[from] cadence_core::TableError),

    /// The context refused the table.
    #[error("context error: {0}")]
    Context(#[from] cadence_core::ContextError),

    /// Nothing to load: the file holds no sample frames.
    #[error("WAV file has no samples")]
    Empty,

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for file I/O operations.
pub type Result<T> = std::result::Result<T, Error>;
