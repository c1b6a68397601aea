use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::warn;

/// Log of worker durations, one integer (ms) per line. Each run starts a
/// fresh file and appends to it as results are collected.
pub struct DurationLog {
    out: BufWriter<Box<dyn Write + Send>>,
}

impl DurationLog {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(file))
    }

    /// Open `path`, or warn and carry on without a log.
    pub fn open_or_warn(path: &Path) -> Option<Self> {
        match Self::create(path) {
            Ok(log) => Some(log),
            Err(e) => {
                warn!("unable to open duration log {}: {e}", path.display());
                None
            }
        }
    }

    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            out: BufWriter::new(Box::new(writer)),
        }
    }

    pub fn record(&mut self, duration_ms: u64) -> Result<()> {
        writeln!(self.out, "{duration_ms}")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
