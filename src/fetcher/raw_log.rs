//! Append-only text log shared by the fetcher (writer) and normalizer (reader).

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::models::REPORT_DATE_FORMAT;

pub struct RawLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl RawLog {
    /// Start a fresh log, truncating any previous content.
    pub fn create(path: &Path) -> Result<Self> {
        Self::open_with(path, OpenOptions::new().write(true).create(true).truncate(true))
    }

    /// Continue an existing log (or start one).
    pub fn append(path: &Path) -> Result<Self> {
        Self::open_with(path, OpenOptions::new().append(true).create(true))
    }

    fn open_with(path: &Path, opts: &OpenOptions) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let file = opts
            .open(path)
            .with_context(|| format!("Failed to open raw log {:?}", path))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    /// Append one day's report block and flush it.
    pub fn write_block(&mut self, date: NaiveDate, body: &str) -> Result<()> {
        write!(
            self.writer,
            "{}\n{}\n\n",
            block_marker(date),
            body
        )
        .and_then(|_| self.writer.flush())
        .with_context(|| format!("Failed to write block for {} to {:?}", date, self.path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole log as text. Invalid UTF-8 is replaced, not rejected: the bytes
    /// can only sit in noise lines the normalizer skips anyway.
    pub fn read_to_string(path: &Path) -> Result<String> {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read raw log {:?}", path))?;
        match String::from_utf8(bytes) {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!("{:?}: invalid UTF-8 at byte {}, decoding lossily", path, e.utf8_error().valid_up_to());
                Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
            }
        }
    }
}

/// `Data for 01-Jan-2020:`
pub fn block_marker(date: NaiveDate) -> String {
    format!("Data for {}:", date.format(REPORT_DATE_FORMAT))
}
