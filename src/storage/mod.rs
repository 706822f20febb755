//! Persistence for the two lookup tables.
//!
//! * scheme directory: indented JSON, meant to be read by humans
//! * NAV series: gzip-compressed JSON (thousands of schemes × thousands of dates)
//!
//! Both files carry a `version` envelope. Bare maps written by older tooling
//! are still accepted on load.

use crate::config::StorageConfig;
use crate::models::{NavDataset, NavSeries, SchemeDirectory};
use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use indexmap::IndexMap;
use serde::de::{self, DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer as _, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{path:?}: unsupported schema version {found} (expected {})", SCHEMA_VERSION)]
    UnsupportedVersion { path: PathBuf, found: u32 },
}

// ── On-disk layouts ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct DirectoryOut<'a> {
    version: u32,
    schemes: &'a SchemeDirectory,
}

#[derive(Serialize)]
struct SeriesOut<'a> {
    version: u32,
    series: &'a NavSeries,
}

/// A file as found on disk: either the versioned envelope or a bare map.
#[derive(Debug, PartialEq)]
enum Stored<V> {
    Versioned { version: u32, payload: IndexMap<String, V> },
    Legacy(IndexMap<String, V>),
}

/// Tells the two layouts apart from the keys as they stream past, so the
/// payload is decoded once and never buffered.
struct StoredVisitor<V> {
    payload_key: &'static str,
    marker: PhantomData<V>,
}

impl<'de, V> Visitor<'de> for StoredVisitor<V>
where
    V: Deserialize<'de>,
{
    type Value = Stored<V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a {{\"version\", \"{}\"}} envelope or a bare map", self.payload_key)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
        let mut version = None;
        let mut payload = None;
        let mut legacy = IndexMap::new();

        while let Some(key) = map.next_key::<String>()? {
            let enveloped = legacy.is_empty();
            if enveloped && key == "version" && version.is_none() {
                version = Some(map.next_value::<u32>()?);
            } else if enveloped && key == self.payload_key && payload.is_none() {
                payload = Some(map.next_value::<IndexMap<String, V>>()?);
            } else if version.is_some() || payload.is_some() {
                return Err(de::Error::custom(format!("unexpected key {:?} in versioned file", key)));
            } else {
                let value = map.next_value::<V>()?;
                legacy.insert(key, value);
            }
        }

        match (version, payload) {
            (Some(version), Some(payload)) => Ok(Stored::Versioned { version, payload }),
            (None, None) => Ok(Stored::Legacy(legacy)),
            (Some(_), None) => Err(de::Error::missing_field(self.payload_key)),
            (None, Some(_)) => Err(de::Error::missing_field("version")),
        }
    }
}

fn read_stored<R: Read, V: DeserializeOwned>(reader: R, payload_key: &'static str) -> serde_json::Result<Stored<V>> {
    let mut de = serde_json::Deserializer::from_reader(reader);
    let stored = (&mut de).deserialize_map(StoredVisitor { payload_key, marker: PhantomData })?;
    de.end()?;
    Ok(stored)
}

fn unwrap_stored<V>(path: &Path, stored: Stored<V>) -> Result<IndexMap<String, V>> {
    match stored {
        Stored::Versioned { version, payload } => {
            check_version(path, version)?;
            Ok(payload)
        }
        Stored::Legacy(payload) => Ok(payload),
    }
}

fn check_version(path: &Path, found: u32) -> Result<()> {
    if found != SCHEMA_VERSION {
        return Err(StoreError::UnsupportedVersion { path: path.to_path_buf(), found }.into());
    }
    Ok(())
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Load/save contract between the normalizer and the presenter.
pub struct DatasetStore {
    directory_path: PathBuf,
    nav_series_path: PathBuf,
    level: Compression,
}

impl DatasetStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            directory_path: config.directory_path.clone(),
            nav_series_path: config.nav_series_path.clone(),
            level: Compression::new(config.compression_level.min(9)),
        }
    }

    pub fn save(&self, dataset: &NavDataset) -> Result<()> {
        self.save_directory(&dataset.directory)?;
        self.save_series(&dataset.series)?;
        Ok(())
    }

    pub fn load(&self) -> Result<NavDataset> {
        let directory = self.load_directory()?;
        let series = self.load_series()?;
        info!(
            "Loaded {} schemes, {} series from {:?} / {:?}",
            directory.len(),
            series.len(),
            self.directory_path,
            self.nav_series_path
        );
        Ok(NavDataset { directory, series })
    }

    pub fn save_directory(&self, directory: &SchemeDirectory) -> Result<()> {
        let path = &self.directory_path;
        let mut w = BufWriter::new(create_file(path)?);
        serde_json::to_writer_pretty(&mut w, &DirectoryOut { version: SCHEMA_VERSION, schemes: directory })
            .with_context(|| format!("Failed to serialize scheme directory to {:?}", path))?;
        w.write_all(b"\n")?;
        w.flush()?;
        info!("Wrote {} schemes to {:?}", directory.len(), path);
        Ok(())
    }

    pub fn load_directory(&self) -> Result<SchemeDirectory> {
        let path = &self.directory_path;
        let file = File::open(path).with_context(|| format!("Failed to open scheme directory {:?}", path))?;
        let stored = read_stored(BufReader::new(file), "schemes")
            .with_context(|| format!("Malformed scheme directory {:?}", path))?;
        unwrap_stored(path, stored)
    }

    pub fn save_series(&self, series: &NavSeries) -> Result<()> {
        let path = &self.nav_series_path;
        let mut gz = GzEncoder::new(BufWriter::new(create_file(path)?), self.level);
        serde_json::to_writer(&mut gz, &SeriesOut { version: SCHEMA_VERSION, series })
            .with_context(|| format!("Failed to serialize NAV series to {:?}", path))?;
        gz.finish()
            .and_then(|mut w| w.flush())
            .with_context(|| format!("Failed to finish gzip stream {:?}", path))?;
        info!("Wrote {} series to {:?}", series.len(), path);
        Ok(())
    }

    pub fn load_series(&self) -> Result<NavSeries> {
        let path = &self.nav_series_path;
        let file = File::open(path).with_context(|| format!("Failed to open NAV series {:?}", path))?;
        let stored = read_stored(BufReader::new(GzDecoder::new(BufReader::new(file))), "series")
            .with_context(|| format!("Malformed or non-gzip NAV series {:?}", path))?;
        unwrap_stored(path, stored)
    }
}

fn create_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("Could not create dir {:?}", parent))?;
    }
    File::create(path).with_context(|| format!("Failed to create {:?}", path))
}
