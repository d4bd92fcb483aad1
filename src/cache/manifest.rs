//! The cache's version metadata file.
//!
//! `manifest.json` names the current dataset version, the generation
//! directory holding its files, and one entry per downloaded file. It is the
//! single commit point of a refresh: it is only ever replaced by writing a
//! sibling temp file and renaming it over the old one.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::CacheResult;

/// Manifest file name at the cache root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Bump this when the manifest format changes; older manifests are ignored.
const MANIFEST_FORMAT: u32 = 1;

/// A released dataset version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetVersion {
    /// Version string, e.g. `5.2.2+20240101`.
    pub version: String,
    /// Release date as published, e.g. `2024-01-01`.
    #[serde(default)]
    pub date: Option<String>,
}

impl DatasetVersion {
    pub fn new(version: impl Into<String>, date: Option<String>) -> Self {
        Self {
            version: version.into(),
            date,
        }
    }

    /// Extract the version from a `Meta.json` document.
    ///
    /// The version lives under `data` in current releases and under `meta`
    /// in older ones.
    pub fn from_meta(doc: &serde_json::Value) -> Option<Self> {
        ["data", "meta"].iter().find_map(|key| {
            let section = doc.get(key)?;
            let version = section.get("version")?.as_str()?;
            let date = section
                .get("date")
                .and_then(|d| d.as_str())
                .map(str::to_string);
            Some(Self::new(version, date))
        })
    }
}

/// One fully downloaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub file_id: String,
    /// Path relative to the cache root.
    pub local_path: PathBuf,
    /// Dataset version the file was fetched for.
    pub remote_version_tag: String,
    /// Unix seconds.
    pub fetched_at: u64,
    pub byte_size: u64,
    pub sha256: String,
}

impl CacheEntry {
    pub fn new(
        file_id: impl Into<String>,
        local_path: PathBuf,
        version: &DatasetVersion,
        byte_size: u64,
        sha256: String,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            local_path,
            remote_version_tag: version.version.clone(),
            fetched_at: unix_now(),
            byte_size,
            sha256,
        }
    }
}

/// The current cache generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    format: u32,
    pub version: DatasetVersion,
    /// Directory (relative to the cache root) holding this generation's files.
    pub generation: String,
    pub entries: BTreeMap<String, CacheEntry>,
}

impl Manifest {
    pub fn new(version: DatasetVersion, generation: impl Into<String>) -> Self {
        Self {
            format: MANIFEST_FORMAT,
            version,
            generation: generation.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Load the manifest under `root`.
    ///
    /// A missing, unreadable or outdated manifest yields `None`: the cache is
    /// then treated as empty and repopulated on the next refresh.
    pub fn load(root: &Path) -> CacheResult<Option<Self>> {
        let path = root.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        match serde_json::from_str::<Manifest>(&content) {
            Ok(manifest) if manifest.format == MANIFEST_FORMAT => Ok(Some(manifest)),
            Ok(manifest) => {
                warn!(
                    found = manifest.format,
                    expected = MANIFEST_FORMAT,
                    "ignoring manifest with unsupported format"
                );
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "ignoring unreadable manifest");
                Ok(None)
            }
        }
    }

    /// Atomically replace the manifest under `root`.
    pub fn store(&self, root: &Path) -> CacheResult<()> {
        let path = root.join(MANIFEST_FILE);
        let tmp = root.join(format!("{MANIFEST_FILE}.tmp"));

        let json = serde_json::to_vec_pretty(self)?;
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Directory of this generation under `root`.
    pub fn generation_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.generation)
    }

    /// Absolute path of a recorded file, if it was downloaded.
    pub fn entry_path(&self, root: &Path, file_id: &str) -> Option<PathBuf> {
        self.entries
            .get(file_id)
            .map(|entry| root.join(&entry.local_path))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
