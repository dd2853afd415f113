//! Preloading context tables from WAV files.

use std::path::{Path, PathBuf};

use cadence_core::{Context, Table};

use crate::wav::{WavSpec, read_wav, write_wav};
use crate::{Error, Result};

/// Resolves `path` against the context's base path when it is relative.
pub fn resolve_path(cx: &Context, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    match cx.base_path() {
        Some(base) if path.is_relative() => Path::new(base).join(path),
        _ => path.to_path_buf(),
    }
}

/// Reads a WAV file (mixed to mono) into a new table named `name`.
pub fn table_from_wav(name: &str, path: impl AsRef<Path>) -> Result<Table> {
    let (samples, _) = read_wav(path)?;
    if samples.is_empty() {
        return Err(Error::Empty);
    }
    Ok(Table::from_samples(name, &samples)?)
}

/// Loads a WAV file into table `name` of `cx`, returning the number of frames.
///
/// An existing table is resized to the file length and overwritten; otherwise
/// a new table is added. Relative paths are resolved against the context's
/// base path. A sample-rate mismatch is logged but not converted.
pub fn load_table_from_wav(cx: &mut Context, name: &str, path: impl AsRef<Path>) -> Result<usize> {
    let path = resolve_path(cx, path);
    let (samples, spec) = read_wav(&path)?;
    if samples.is_empty() {
        return Err(Error::Empty);
    }
    if f64::from(spec.sample_rate) != cx.sample_rate() {
        tracing::warn!(
            "table '{name}': {} is {} Hz, context runs at {} Hz",
            path.display(),
            spec.sample_rate,
            cx.sample_rate()
        );
    }

    match cx.table_mut(name) {
        Some(table) => {
            table.resize(samples.len())?;
            table.samples_mut().copy_from_slice(&samples);
            table.set_head(0);
        }
        None => {
            cx.insert_table(Table::from_samples(name, &samples)?)?;
        }
    }
    tracing::debug!("table '{name}': loaded {} frames from {}", samples.len(), path.display());
    Ok(samples.len())
}

/// Writes table `name`'s logical contents to a mono float WAV file.
pub fn save_table_to_wav(cx: &Context, name: &str, path: impl AsRef<Path>) -> Result<()> {
    let table = cx
        .table(name)
        .ok_or_else(|| cadence_core::TableError::UnknownTable(name.to_string()))?;
    let spec = WavSpec {
        sample_rate: cx.sample_rate() as u32,
        ..WavSpec::default()
    };
    write_wav(resolve_path(cx, path), table.samples(), spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_ramp(dir: &TempDir, name: &str, n: usize) -> PathBuf {
        let path = dir.path().join(name);
        let samples: Vec<f32> = (0..n).map(|i| i as f32 / n as f32).collect();
        write_wav(&path, &samples, WavSpec::default()).unwrap();
        path
    }

    #[test]
    fn load_creates_table() {
        let dir = TempDir::new().unwrap();
        let path = write_ramp(&dir, "ramp.wav", 10);
        let mut cx = Context::new(48000.0).unwrap();
        assert_eq!(load_table_from_wav(&mut cx, "ramp", &path).unwrap(), 10);
        let table = cx.table("ramp").unwrap();
        assert_eq!(table.len(), 10);
        assert_eq!(table.samples()[5], 0.5);
    }

    #[test]
    fn load_resizes_existing_table() {
        let dir = TempDir::new().unwrap();
        let path = write_ramp(&dir, "ramp.wav", 20);
        let mut cx = Context::new(48000.0).unwrap();
        let id = cx.add_table("ramp", 4).unwrap();
        load_table_from_wav(&mut cx, "ramp", &path).unwrap();
        assert_eq!(cx.tables().get(id).len(), 20);
        assert_eq!(cx.tables().id("ramp"), Some(id));
    }

    #[test]
    fn relative_paths_use_base_path() {
        let dir = TempDir::new().unwrap();
        write_ramp(&dir, "ir.wav", 8);
        let mut cx = Context::new(48000.0).unwrap();
        cx.set_base_path(dir.path().to_string_lossy());
        load_table_from_wav(&mut cx, "ir", "ir.wav").unwrap();
        assert_eq!(cx.table("ir").unwrap().len(), 8);

        save_table_to_wav(&cx, "ir", "copy.wav").unwrap();
        let copy = table_from_wav("copy", dir.path().join("copy.wav")).unwrap();
        assert_eq!(copy.samples(), cx.table("ir").unwrap().samples());
    }

    #[test]
    fn empty_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav(&path, &[], WavSpec::default()).unwrap();
        let mut cx = Context::new(48000.0).unwrap();
        assert!(matches!(
            load_table_from_wav(&mut cx, "x", &path),
            Err(Error::Empty)
        ));
        assert!(matches!(
            save_table_to_wav(&cx, "missing", dir.path().join("m.wav")),
            Err(Error::Table(_))
        ));
    }
}
