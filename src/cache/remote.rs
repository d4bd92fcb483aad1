//! Remote dataset sources.
//!
//! A [`RemoteSource`] advertises the current dataset version and streams
//! individual files. [`HttpRemote`] talks to the CDN; [`MirrorRemote`] serves
//! a local directory laid out like the CDN (useful for air-gapped mirrors and
//! tests).

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use super::manifest::DatasetVersion;
use super::{CacheError, CacheResult};
use crate::catalog::META_PATH;

/// Chunk size used when copying a download to disk.
const CHUNK_SIZE: usize = 64 * 1024;

/// Per-chunk progress hook: `(bytes_so_far, total_if_known)`.
pub type ChunkProgress<'a> = &'a mut dyn FnMut(u64, Option<u64>);

/// Source of dataset files.
pub trait RemoteSource: Send {
    /// The version currently advertised by the source.
    fn current_version(&self) -> CacheResult<DatasetVersion>;

    /// Stream `remote_path` into `sink`, reporting progress after each chunk.
    ///
    /// Returns the number of bytes written.
    fn fetch(&self, remote_path: &str, sink: &mut dyn Write, progress: ChunkProgress<'_>)
        -> CacheResult<u64>;
}

/// Copy `reader` to `sink` in chunks, reporting progress.
fn copy_with_progress(
    remote_path: &str,
    reader: &mut dyn Read,
    sink: &mut dyn Write,
    total: Option<u64>,
    progress: ChunkProgress<'_>,
) -> CacheResult<u64> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut downloaded: u64 = 0;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CacheError::network(remote_path, e)),
        };
        sink.write_all(&buf[..n])?;
        downloaded += n as u64;
        progress(downloaded, total);
    }

    if let Some(expected) = total {
        if downloaded != expected {
            return Err(CacheError::network(
                remote_path,
                format!("truncated download: {downloaded} of {expected} bytes"),
            ));
        }
    }

    Ok(downloaded)
}

/// HTTP(S) source backed by `ureq`.
pub struct HttpRemote {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, remote_path: &str) -> String {
        format!("{}/{}", self.base_url, remote_path)
    }

    fn get(&self, remote_path: &str) -> CacheResult<ureq::Response> {
        let url = self.url(remote_path);
        debug!(url = %url, "GET");
        self.agent
            .get(&url)
            .call()
            .map_err(|e| CacheError::network(remote_path, e))
    }
}

impl RemoteSource for HttpRemote {
    fn current_version(&self) -> CacheResult<DatasetVersion> {
        let resp = self.get(META_PATH)?;
        let doc: serde_json::Value = serde_json::from_reader(resp.into_reader())
            .map_err(|e| CacheError::network(META_PATH, e))?;
        DatasetVersion::from_meta(&doc)
            .ok_or_else(|| CacheError::network(META_PATH, "no version in metadata document"))
    }

    fn fetch(
        &self,
        remote_path: &str,
        sink: &mut dyn Write,
        progress: ChunkProgress<'_>,
    ) -> CacheResult<u64> {
        let resp = self.get(remote_path)?;
        let total = resp
            .header("content-length")
            .and_then(|s| s.parse::<u64>().ok());
        let mut reader = resp.into_reader();
        copy_with_progress(remote_path, &mut reader, sink, total, progress)
    }
}

/// Source serving a local directory with the same layout as the CDN.
pub struct MirrorRemote {
    root: PathBuf,
}

impl MirrorRemote {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Build from a `file://` URL, if `url` is one.
    pub fn from_url(url: &str) -> Option<Self> {
        url.strip_prefix("file://").map(Self::new)
    }
}

impl RemoteSource for MirrorRemote {
    fn current_version(&self) -> CacheResult<DatasetVersion> {
        let path = self.root.join(META_PATH);
        let content = fs::read(&path).map_err(|e| CacheError::network(META_PATH, e))?;
        let doc: serde_json::Value =
            serde_json::from_slice(&content).map_err(|e| CacheError::network(META_PATH, e))?;
        DatasetVersion::from_meta(&doc)
            .ok_or_else(|| CacheError::network(META_PATH, "no version in metadata document"))
    }

    fn fetch(
        &self,
        remote_path: &str,
        sink: &mut dyn Write,
        progress: ChunkProgress<'_>,
    ) -> CacheResult<u64> {
        let path = self.root.join(remote_path);
        let mut file = fs::File::open(&path).map_err(|e| CacheError::network(remote_path, e))?;
        let total = file.metadata().ok().map(|m| m.len());
        copy_with_progress(remote_path, &mut file, sink, total, progress)
    }
}
