//! File identity: cheap stamps and strong content hashes.
//!
//! Two fingerprints exist for every media file, and they answer different
//! questions:
//!
//! - **[`Stamp`]** — "did this file probably change?" Built from `stat` data
//!   only (schema version, creation time, size, change time, modification
//!   time), so computing it never reads file content. A matching set of stamps
//!   is what lets the [`cache`](crate::cache) trust metadata extracted on a
//!   previous run.
//!
//! - **Content hash** — "what bytes are these?" SHA-256 of the full file
//!   content, hex encoded. This is the input to content-addressed artifact
//!   names, so two copies of the same photo produce the same output file.
//!
//! Hashing is the dominant per-file cost for large collections, which is why
//! it only runs when the stamp check fails.
//!
//! Videos are hashed with [`hash_file_streaming`], which reads fixed-size
//! chunks instead of loading the whole file.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{File, Metadata};
use std::io::{self, Read};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Chunk size used by [`hash_file_streaming`].
pub const STREAM_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// Stat-derived fingerprint of a file. Hex-encoded SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stamp(String);

impl Stamp {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Stamp {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the stamp of `path` under the given item schema version.
///
/// Bumping `version` invalidates every stamp recorded by older builds.
pub fn stamp_of(version: u32, path: &Path) -> io::Result<Stamp> {
    let meta = std::fs::metadata(path)?;
    Ok(stamp_from_metadata(version, &meta))
}

fn stamp_from_metadata(version: u32, meta: &Metadata) -> Stamp {
    let mut hasher = Sha256::new();
    hasher.update(b"stamp\0");
    hasher.update(version.to_le_bytes());
    // Birth time is unavailable on some filesystems; absence is still stable.
    match meta.created().ok().and_then(nanos_since_epoch) {
        Some(created) => {
            hasher.update(b"\x01");
            hasher.update(created.to_le_bytes());
        }
        None => hasher.update(b"\x00"),
    }
    hasher.update(meta.len().to_le_bytes());
    hasher.update(change_time_nanos(meta).to_le_bytes());
    hasher.update(
        meta.modified()
            .ok()
            .and_then(nanos_since_epoch)
            .unwrap_or_default()
            .to_le_bytes(),
    );
    Stamp(format!("{:x}", hasher.finalize()))
}

fn nanos_since_epoch(time: SystemTime) -> Option<i128> {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => Some(d.as_nanos() as i128),
        Err(e) => Some(-(e.duration().as_nanos() as i128)),
    }
}

#[cfg(unix)]
fn change_time_nanos(meta: &Metadata) -> i128 {
    use std::os::unix::fs::MetadataExt;
    meta.ctime() as i128 * 1_000_000_000 + meta.ctime_nsec() as i128
}

#[cfg(not(unix))]
fn change_time_nanos(meta: &Metadata) -> i128 {
    meta.modified()
        .ok()
        .and_then(nanos_since_epoch)
        .unwrap_or_default()
}

/// SHA-256 of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// SHA-256 of a file's contents, read in [`STREAM_CHUNK_SIZE`] chunks.
///
/// Produces the same digest as [`hash_file`] with memory bounded by the chunk size.
pub fn hash_file_streaming(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; STREAM_CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// SHA-256 of a string, hex encoded.
pub fn hash_str(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

/// Order-insensitive comparison of two stamp lists.
///
/// Duplicates count: `[a, a]` does not match `[a]`.
pub fn stamps_match(current: &[Stamp], recorded: &[Stamp]) -> bool {
    if current.len() != recorded.len() {
        return false;
    }
    let mut current: Vec<&Stamp> = current.iter().collect();
    let mut recorded: Vec<&Stamp> = recorded.iter().collect();
    current.sort();
    recorded.sort();
    current == recorded
}
