use crate::models::RestaurantRecord;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("writing {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("serializing records: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where the batch puts its results. Every call gets the complete list so far, replacing
/// whatever was persisted before.
pub trait RecordSink {
    fn persist(&mut self, records: &[RestaurantRecord]) -> Result<(), OutputError>;
}

/// A JSON array in a file, rewritten in full on every persist.
///
/// The new content goes to a sibling `.tmp` file first and is then renamed over the target, so a
/// reader never sees half a file.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut p = self.path.clone().into_os_string();
        p.push(".tmp");
        PathBuf::from(p)
    }
}

impl RecordSink for JsonFile {
    fn persist(&mut self, records: &[RestaurantRecord]) -> Result<(), OutputError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err(parent))?;
            }
        }

        let tmp = self.tmp_path();
        {
            let file = File::create(&tmp).map_err(io_err(&tmp))?;
            let mut out = BufWriter::new(file);
            write_pretty(&mut out, records)?;
            out.flush().map_err(io_err(&tmp))?;
        }
        fs::rename(&tmp, &self.path).map_err(io_err(&self.path))?;

        debug!(path = %self.path.display(), records = records.len(), "Wrote output");
        Ok(())
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> OutputError + '_ {
    move |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Serialize with four space indentation and non-ASCII text left as is
fn write_pretty<W: Write, T: Serialize + ?Sized>(w: W, value: &T) -> Result<(), OutputError> {
    let mut ser = Serializer::with_formatter(w, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    Ok(())
}

/// Keeps the last persisted list in memory
#[derive(Debug, Clone, Default)]
pub struct Memory {
    pub records: Vec<RestaurantRecord>,
    /// Number of persist calls
    pub writes: usize,
}

impl RecordSink for Memory {
    fn persist(&mut self, records: &[RestaurantRecord]) -> Result<(), OutputError> {
        self.records = records.to_vec();
        self.writes += 1;
        Ok(())
    }
}
