//! Scratch file staging for uploads.

use spectra_protocol::SpectralReading;
use std::io::{self, BufWriter};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// A reading serialized as headerless CSV in a temporary file.
///
/// The file is removed when the value is dropped, on every exit path of
/// the upload stage.
#[derive(Debug)]
pub struct ScratchFile {
    file: NamedTempFile,
    rows: usize,
}

impl ScratchFile {
    /// Write `reading` to a new scratch file in `dir`, or the system temp dir.
    pub fn write_reading(dir: Option<&Path>, reading: &SpectralReading) -> io::Result<Self> {
        let prefix = format!(".spectra-{}-", reading.spectrometer());
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(".csv.tmp");
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(BufWriter::new(file.as_file()));
            for row in reading.rows() {
                writer.write_record(row.iter().map(|value| value.to_string()))?;
            }
            writer.flush()?;
        }
        file.as_file().sync_data()?;

        debug!(
            path = %file.path().display(),
            rows = reading.num_rows(),
            "Staged spectra in scratch file"
        );
        Ok(Self {
            file,
            rows: reading.num_rows(),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn size_bytes(&self) -> io::Result<u64> {
        Ok(self.file.as_file().metadata()?.len())
    }
}
