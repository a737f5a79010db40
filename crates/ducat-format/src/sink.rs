//! Incremental record output.

use ducat_types::{Record, RecordKind};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::{FormatError, Formatter, OutputFormat};

/// Destination for the ordered record stream.
pub trait OutputSink: Send {
    /// Appends one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn write(&mut self, record: &Record) -> Result<(), FormatError>;

    /// Makes everything written so far durable.
    ///
    /// Returns the committed length: the byte offset a later resume can
    /// truncate back to.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing or syncing fails.
    fn flush(&mut self) -> Result<u64, FormatError>;
}

/// Append-only file sink.
///
/// Rows are buffered and counted so the committed length is known without
/// querying the file.
pub struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    formatter: Box<dyn Formatter>,
    row: Vec<u8>,
    written: u64,
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink")
            .field("path", &self.path)
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}

impl FileSink {
    /// Creates (or replaces) the output file and writes the header.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(
        path: impl AsRef<Path>,
        format: OutputFormat,
        kind: RecordKind,
    ) -> Result<Self, FormatError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        let mut sink = Self::from_file(path, file, format, 0);
        sink.write_header(kind)?;
        Ok(sink)
    }

    /// Reopens an existing output file at a committed length.
    ///
    /// Anything past `committed` was written after the last checkpoint and is
    /// discarded. A committed length of zero starts over with a fresh header.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Truncated`] if the file is shorter than
    /// `committed`, or an I/O error.
    pub fn resume(
        path: impl AsRef<Path>,
        format: OutputFormat,
        kind: RecordKind,
        committed: u64,
    ) -> Result<Self, FormatError> {
        if committed == 0 {
            return Self::create(path, format, kind);
        }

        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().write(true).open(&path)?;
        let actual = file.metadata()?.len();
        if actual < committed {
            return Err(FormatError::Truncated {
                path,
                expected: committed,
                actual,
            });
        }
        if actual > committed {
            tracing::info!(
                path = %path.display(),
                discarded = actual - committed,
                "truncating uncommitted output"
            );
            file.set_len(committed)?;
        }
        file.seek(SeekFrom::Start(committed))?;

        Ok(Self::from_file(path, file, format, committed))
    }

    fn from_file(path: PathBuf, file: File, format: OutputFormat, written: u64) -> Self {
        Self {
            path,
            writer: BufWriter::new(file),
            formatter: format.formatter(),
            row: Vec::with_capacity(128),
            written,
        }
    }

    fn write_header(&mut self, kind: RecordKind) -> Result<(), FormatError> {
        self.row.clear();
        self.formatter.write_header(kind, &mut self.row)?;
        self.append_row()
    }

    fn append_row(&mut self) -> Result<(), FormatError> {
        self.writer.write_all(&self.row)?;
        self.written += self.row.len() as u64;
        Ok(())
    }

    /// Returns the output path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of bytes written, committed or not.
    #[must_use]
    pub const fn written(&self) -> u64 {
        self.written
    }
}

impl OutputSink for FileSink {
    fn write(&mut self, record: &Record) -> Result<(), FormatError> {
        self.row.clear();
        self.formatter.write_record(record, &mut self.row)?;
        self.append_row()
    }

    fn flush(&mut self) -> Result<u64, FormatError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(self.written)
    }
}
