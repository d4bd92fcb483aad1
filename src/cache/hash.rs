//! Content hashing for downloaded files.

use std::io::{self, Write};

use sha2::{Digest, Sha256};

/// A writer that hashes and counts everything passing through it.
///
/// Used while streaming a download to disk so the digest recorded in the
/// manifest matches the bytes actually written, without a second read.
pub struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush the inner writer and return it with the byte count and the
    /// lowercase hex SHA-256 digest.
    pub fn finish(mut self) -> io::Result<(W, u64, String)> {
        self.inner.flush()?;
        let digest = format!("{:x}", self.hasher.finalize());
        Ok((self.inner, self.written, digest))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
