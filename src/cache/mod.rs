//! Versioned on-disk cache of dataset files.
//!
//! # Design
//!
//! - One generation directory per downloaded dataset version
//! - `manifest.json` at the root names the current generation; replacing it
//!   is the only commit step, so a failed refresh never leaves a torn cache
//! - No TTL - staleness is decided by comparing version strings
//! - Files are fetched to `*.part` and renamed only when complete
//!
//! # Layout
//!
//! ```text
//! <root>/manifest.json
//! <root>/gen-<uuid>/Meta.json
//! <root>/gen-<uuid>/parquet/cards.parquet
//! <root>/gen-<uuid>/AllPricesToday.json.gz
//! ```
//!
//! The cache belongs to one process. Concurrent processes pointed at the same
//! root must coordinate refreshes themselves.

mod hash;
mod manifest;
mod remote;

pub use hash::HashingWriter;
pub use manifest::{CacheEntry, DatasetVersion, Manifest, MANIFEST_FILE};
pub use remote::{ChunkProgress, HttpRemote, MirrorRemote, RemoteSource};

use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use flate2::read::GzDecoder;
use tracing::{debug, info, warn};

use crate::catalog;
use crate::config::CacheSettings;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A download or version check could not complete.
    #[error("network failure fetching {file}: {message}")]
    NetworkFailure { file: String, message: String },

    /// A required file is not cached and offline mode forbids fetching it.
    #[error("{file} is not cached and offline mode is enabled")]
    DataUnavailable { file: String },

    /// A cached file failed to parse and was removed.
    #[error("cache file {} was corrupt and has been removed: {reason}", path.display())]
    CorruptCacheFile { path: PathBuf, reason: String },

    #[error("unknown file id: {0}")]
    UnknownFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CacheError {
    pub fn network(file: impl Into<String>, message: impl Display) -> Self {
        Self::NetworkFailure {
            file: file.into(),
            message: message.to_string(),
        }
    }

    fn unavailable(file: impl Into<String>) -> Self {
        Self::DataUnavailable { file: file.into() }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Download progress callback: `(file_name, bytes_downloaded, bytes_total)`.
///
/// The final invocation for a file always has `bytes_downloaded == bytes_total`.
pub type ProgressFn = Arc<dyn Fn(&str, u64, u64) + Send + Sync>;

/// Owns the cache directory and its version lifecycle.
pub struct CacheManager {
    root: PathBuf,
    offline: bool,
    remote: Box<dyn RemoteSource>,
    progress: Option<ProgressFn>,
    manifest: Option<Manifest>,
    remote_version: Option<DatasetVersion>,
}

impl CacheManager {
    /// Open the cache described by `settings`.
    ///
    /// `file://` base URLs are served by [`MirrorRemote`], anything else by
    /// [`HttpRemote`].
    pub fn open(root: impl Into<PathBuf>, settings: &CacheSettings) -> CacheResult<Self> {
        let remote: Box<dyn RemoteSource> = match MirrorRemote::from_url(&settings.base_url) {
            Some(mirror) => Box::new(mirror),
            None => Box::new(HttpRemote::new(
                settings.base_url.clone(),
                Duration::from_secs(settings.timeout_secs),
            )),
        };
        Self::with_remote(root, settings.offline, remote)
    }

    /// Open the cache at `root` with an explicit remote source.
    pub fn with_remote(
        root: impl Into<PathBuf>,
        offline: bool,
        remote: Box<dyn RemoteSource>,
    ) -> CacheResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let manifest = Manifest::load(&root)?;
        if let Some(m) = &manifest {
            debug!(version = %m.version.version, generation = %m.generation, "loaded cache manifest");
        }

        Ok(Self {
            root,
            offline,
            remote,
            progress: None,
            manifest,
            remote_version: None,
        })
    }

    /// Install a download progress callback.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Version of the current local generation.
    pub fn local_version(&self) -> Option<&DatasetVersion> {
        self.manifest.as_ref().map(|m| &m.version)
    }

    /// The current manifest, if any generation has been committed.
    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    /// Version advertised by the remote, memoized until the next refresh.
    ///
    /// Always `None` in offline mode.
    pub fn remote_version(&mut self) -> CacheResult<Option<DatasetVersion>> {
        if self.offline {
            return Ok(None);
        }
        if self.remote_version.is_none() {
            self.remote_version = Some(self.remote.current_version()?);
        }
        Ok(self.remote_version.clone())
    }

    /// Whether the local generation differs from the remote version.
    ///
    /// No local generation is always stale. An unreachable remote or offline
    /// mode counts as fresh.
    pub fn is_stale(&mut self) -> bool {
        let Some(local) = self.local_version().cloned() else {
            return true;
        };
        match self.remote_version() {
            Ok(Some(remote)) => remote.version != local.version,
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "could not check remote version, assuming fresh");
                false
            }
        }
    }

    /// Managed files not present in the current generation.
    pub fn missing_files(&self) -> Vec<&'static str> {
        catalog::managed_files()
            .filter(|id| self.present_path(id).is_none())
            .collect()
    }

    /// Make sure the cache holds the current dataset version.
    ///
    /// Returns `true` when a new generation was committed. In offline mode
    /// the network is never touched: a complete cache returns `false`, an
    /// incomplete one fails with [`CacheError::DataUnavailable`].
    pub fn ensure_fresh(&mut self) -> CacheResult<bool> {
        let missing = self.missing_files();

        if self.offline {
            return match missing.first() {
                Some(file) => Err(CacheError::unavailable(*file)),
                None => Ok(false),
            };
        }

        self.remote_version = None;
        let remote = match self.remote.current_version() {
            Ok(v) => v,
            Err(e) if missing.is_empty() && self.manifest.is_some() => {
                warn!(error = %e, "remote unreachable, serving cached generation");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        self.remote_version = Some(remote.clone());

        let current = self
            .local_version()
            .is_some_and(|local| local.version == remote.version);
        if current {
            for file_id in missing {
                self.fetch_into_current(file_id)?;
            }
            return Ok(false);
        }

        self.commit_generation(remote)?;
        Ok(true)
    }

    /// Path of a file in the current generation.
    ///
    /// Fails with [`CacheError::DataUnavailable`] if the file has not been
    /// downloaded; use [`CacheManager::ensure_file`] to fetch it.
    pub fn path_for(&self, file_id: &str) -> CacheResult<PathBuf> {
        if catalog::remote_path(file_id).is_none() {
            return Err(CacheError::UnknownFile(file_id.to_string()));
        }
        self.present_path(file_id)
            .ok_or_else(|| CacheError::unavailable(file_id))
    }

    /// Path of a file, downloading it into the current generation if needed.
    pub fn ensure_file(&mut self, file_id: &str) -> CacheResult<PathBuf> {
        if catalog::remote_path(file_id).is_none() {
            return Err(CacheError::UnknownFile(file_id.to_string()));
        }
        if let Some(path) = self.present_path(file_id) {
            return Ok(path);
        }
        if self.offline {
            return Err(CacheError::unavailable(file_id));
        }
        self.fetch_into_current(file_id)
    }

    /// Drop every cached generation and the manifest.
    pub fn invalidate_all(&mut self) -> CacheResult<()> {
        let manifest_path = self.root.join(MANIFEST_FILE);
        if manifest_path.exists() {
            fs::remove_file(&manifest_path)?;
        }
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with("gen-") {
                fs::remove_dir_all(entry.path())?;
            }
        }
        self.manifest = None;
        self.remote_version = None;
        info!(root = %self.root.display(), "cache invalidated");
        Ok(())
    }

    /// Open a cached file for buffered reading, gunzipping `.gz` files.
    pub fn open_reader(&mut self, file_id: &str) -> CacheResult<Box<dyn BufRead>> {
        let path = self.ensure_file(file_id)?;
        let file = fs::File::open(&path)?;
        if path.extension().is_some_and(|ext| ext == "gz") {
            Ok(Box::new(BufReader::new(GzDecoder::new(file))))
        } else {
            Ok(Box::new(BufReader::new(file)))
        }
    }

    /// Load and parse a cached JSON document.
    ///
    /// A file that fails to parse is deleted and dropped from the manifest so
    /// the next call fetches a fresh copy.
    pub fn load_json(&mut self, file_id: &str) -> CacheResult<serde_json::Value> {
        let reader = self.open_reader(file_id)?;
        match serde_json::from_reader(reader) {
            Ok(value) => Ok(value),
            Err(e) => Err(self.discard_corrupt(file_id, e.to_string())),
        }
    }

    /// Remove a file that failed to parse and report it as corrupt.
    pub fn discard_corrupt(&mut self, file_id: &str, reason: String) -> CacheError {
        let path = self
            .present_path(file_id)
            .unwrap_or_else(|| self.root.join(file_id));
        warn!(path = %path.display(), reason = %reason, "removing corrupt cache file");

        if let Err(e) = fs::remove_file(&path) {
            debug!(error = %e, "corrupt file already gone");
        }
        if let Some(manifest) = self.manifest.as_mut() {
            if manifest.entries.remove(file_id).is_some() {
                if let Err(e) = manifest.store(&self.root) {
                    warn!(error = %e, "failed to rewrite manifest after removing corrupt file");
                }
            }
        }
        CacheError::CorruptCacheFile { path, reason }
    }

    fn present_path(&self, file_id: &str) -> Option<PathBuf> {
        self.manifest
            .as_ref()?
            .entry_path(&self.root, file_id)
            .filter(|p| p.exists())
    }

    /// Download one file into the current generation, starting a generation
    /// if none exists yet.
    ///
    /// A generation only ever holds files of its own version: if the remote
    /// has moved on, the whole new version is committed instead.
    fn fetch_into_current(&mut self, file_id: &str) -> CacheResult<PathBuf> {
        if self.offline {
            return Err(CacheError::unavailable(file_id));
        }
        // Not the memoized value: the version must match the bytes about to be fetched
        let remote = self.remote.current_version()?;
        self.remote_version = Some(remote.clone());
        let mut manifest = match self.manifest.clone() {
            Some(m) if m.version.version == remote.version => m,
            Some(m) => {
                info!(
                    cached = %m.version.version,
                    remote = %remote.version,
                    file = file_id,
                    "remote version changed, refreshing before fetch"
                );
                self.commit_generation(remote)?;
                return self
                    .present_path(file_id)
                    .ok_or_else(|| CacheError::unavailable(file_id));
            }
            None => Manifest::new(remote, new_generation_name()),
        };

        let gen_dir = manifest.generation_dir(&self.root);
        let entry = self.download(file_id, &manifest.generation, &gen_dir, &manifest.version)?;
        let path = self.root.join(&entry.local_path);
        manifest.entries.insert(file_id.to_string(), entry);
        manifest.store(&self.root)?;
        self.manifest = Some(manifest);
        Ok(path)
    }

    /// Download the whole managed set into a new generation and commit it.
    fn commit_generation(&mut self, version: DatasetVersion) -> CacheResult<()> {
        let mut manifest = Manifest::new(version, new_generation_name());
        let gen_dir = manifest.generation_dir(&self.root);
        info!(version = %manifest.version.version, generation = %manifest.generation, "downloading dataset");

        let fetched = self
            .download_all(&manifest, &gen_dir)
            .and_then(|entries| {
                manifest.entries = entries;
                manifest.store(&self.root)
            });
        if let Err(e) = fetched {
            if let Err(cleanup) = fs::remove_dir_all(&gen_dir) {
                debug!(error = %cleanup, "staging generation cleanup failed");
            }
            return Err(e);
        }

        if let Some(old) = self.manifest.replace(manifest) {
            let old_dir = old.generation_dir(&self.root);
            if old_dir != gen_dir && old_dir.exists() {
                if let Err(e) = fs::remove_dir_all(&old_dir) {
                    warn!(error = %e, dir = %old_dir.display(), "failed to prune old generation");
                }
            }
        }
        info!(
            version = %self.local_version().map(|v| v.version.as_str()).unwrap_or_default(),
            "dataset refreshed"
        );
        Ok(())
    }

    fn download_all(
        &self,
        manifest: &Manifest,
        gen_dir: &Path,
    ) -> CacheResult<BTreeMap<String, CacheEntry>> {
        let mut entries = BTreeMap::new();
        for file_id in catalog::managed_files() {
            let entry = self.download(file_id, &manifest.generation, gen_dir, &manifest.version)?;
            entries.insert(file_id.to_string(), entry);
        }
        Ok(entries)
    }

    /// Fetch one file to `<gen_dir>/<remote path>` via a `.part` temp file.
    fn download(
        &self,
        file_id: &str,
        generation: &str,
        gen_dir: &Path,
        version: &DatasetVersion,
    ) -> CacheResult<CacheEntry> {
        let remote_path = catalog::remote_path(file_id)
            .ok_or_else(|| CacheError::UnknownFile(file_id.to_string()))?;
        let dest = gen_dir.join(remote_path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = dest.with_file_name(format!(
            "{}.part",
            dest.file_name().unwrap_or_default().to_string_lossy()
        ));
        let name = remote_path.rsplit('/').next().unwrap_or(remote_path);
        info!(file = name, "downloading");

        let result = self.stream_to(&tmp, name, remote_path);
        let (byte_size, sha256) = match result {
            Ok(done) => done,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&tmp) {
                    debug!(error = %cleanup, file = name, "partial download cleanup failed");
                }
                return Err(e);
            }
        };
        fs::rename(&tmp, &dest)?;

        debug!(file = name, bytes = byte_size, "download complete");
        Ok(CacheEntry::new(
            file_id,
            Path::new(generation).join(remote_path),
            version,
            byte_size,
            sha256,
        ))
    }

    fn stream_to(&self, tmp: &Path, name: &str, remote_path: &str) -> CacheResult<(u64, String)> {
        let file = fs::File::create(tmp)?;
        let mut writer = HashingWriter::new(BufWriter::new(file));
        let mut last = None;
        let progress = self.progress.clone();

        self.remote
            .fetch(remote_path, &mut writer, &mut |done: u64, total: Option<u64>| {
                let total = total.unwrap_or(done).max(done);
                if let Some(cb) = &progress {
                    cb(name, done, total);
                }
                last = Some((done, total));
            })?;

        let (buffered, bytes, digest) = writer.finish()?;
        buffered.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        if let Some(cb) = &progress {
            if last != Some((bytes, bytes)) {
                cb(name, bytes, bytes);
            }
        }
        Ok((bytes, digest))
    }
}

fn new_generation_name() -> String {
    format!("gen-{}", uuid::Uuid::new_v4().simple())
}
