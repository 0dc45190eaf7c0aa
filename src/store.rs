//! Storage seam for resolving chunk byte ranges.
//!
//! The combiners never touch storage; a [`MergedManifest`](crate::MergedManifest)
//! resolves chunk bytes through the [`ByteRangeReader`] trait when a
//! consumer opens a key. Reads are synchronous and independently
//! retryable by the caller. [`LocalFileReader`] serves ranges from the
//! local filesystem; [`InMemoryStore`] is an in-memory implementation for
//! tests.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/* ===================== errors ===================== */

/// Error from the storage layer.
#[derive(Debug, Clone)]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    NotFound,
    InvalidRange,
    Io,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

/* ===================== options ===================== */

/// Access options for the storage layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageOptions {
    /// Anonymous (unauthenticated) access.
    pub anonymous: bool,
    /// Provider-specific options passed through to the storage layer.
    pub extra: BTreeMap<String, String>,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            anonymous: true,
            extra: BTreeMap::new(),
        }
    }
}

impl StorageOptions {
    #[must_use]
    pub fn authenticated() -> Self {
        Self {
            anonymous: false,
            extra: BTreeMap::new(),
        }
    }

    /// Builder-style extra option.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/* ===================== traits ===================== */

/// Reads a byte range from a physical file.
pub trait ByteRangeReader: Send + Sync {
    /// Read exactly `length` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the path does not exist, `InvalidRange` if the file is
    /// shorter than the requested range, `Io` otherwise.
    fn read_range(&self, path: &str, offset: u64, length: u64) -> StoreResult<Vec<u8>>;
}

/// Resolves a source item into a cached location, fetching it if absent.
///
/// This is the seam to the upstream download stage: the combiners only ever
/// consume its output, never its retry or caching behavior.
pub trait SourceFetcher: Send + Sync {
    /// # Errors
    ///
    /// `NotFound` if the source does not exist, `Io` on transfer failure.
    fn fetch(&self, source_url: &str, cache_location: &str) -> StoreResult<String>;
}

/* ===================== LocalFileReader ===================== */

/// Serves byte ranges from files on the local filesystem.
#[derive(Clone, Debug, Default)]
pub struct LocalFileReader {
    root: Option<PathBuf>,
}

impl LocalFileReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve all paths relative to `root`.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path),
            None => PathBuf::from(path),
        }
    }
}

impl ByteRangeReader for LocalFileReader {
    fn read_range(&self, path: &str, offset: u64, length: u64) -> StoreResult<Vec<u8>> {
        let resolved = self.resolve(path);
        let mut file = File::open(&resolved).map_err(|e| {
            let kind = if e.kind() == std::io::ErrorKind::NotFound {
                StoreErrorKind::NotFound
            } else {
                StoreErrorKind::Io
            };
            StoreError::new(kind, format!("{}: {e}", resolved.display()))
        })?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| StoreError::new(StoreErrorKind::Io, e.to_string()))?;
        let mut bytes = Vec::with_capacity(length as usize);
        file.take(length)
            .read_to_end(&mut bytes)
            .map_err(|e| StoreError::new(StoreErrorKind::Io, e.to_string()))?;
        if bytes.len() as u64 != length {
            return Err(StoreError::new(
                StoreErrorKind::InvalidRange,
                format!(
                    "{}: wanted {length} bytes at offset {offset}, file has {}",
                    resolved.display(),
                    bytes.len()
                ),
            ));
        }
        Ok(bytes)
    }
}

/* ===================== InMemoryStore ===================== */

/// In-memory object store for tests.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object, replacing any previous bytes at the path.
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the objects is poisoned.
    pub fn insert(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .expect("objects mutex poisoned")
            .insert(path.into(), bytes.into());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects
            .lock()
            .expect("objects mutex poisoned")
            .contains_key(path)
    }
}

impl ByteRangeReader for InMemoryStore {
    fn read_range(&self, path: &str, offset: u64, length: u64) -> StoreResult<Vec<u8>> {
        let objects = self.objects.lock().expect("objects mutex poisoned");
        let bytes = objects
            .get(path)
            .ok_or_else(|| StoreError::new(StoreErrorKind::NotFound, path))?;
        let start = offset as usize;
        let end = start + length as usize;
        if end > bytes.len() {
            return Err(StoreError::new(
                StoreErrorKind::InvalidRange,
                format!(
                    "{path}: wanted {length} bytes at offset {offset}, object has {}",
                    bytes.len()
                ),
            ));
        }
        Ok(bytes[start..end].to_vec())
    }
}

impl SourceFetcher for InMemoryStore {
    fn fetch(&self, source_url: &str, cache_location: &str) -> StoreResult<String> {
        let mut hasher = DefaultHasher::new();
        source_url.hash(&mut hasher);
        let target = format!("{cache_location}/{:016x}", hasher.finish());

        let mut objects = self.objects.lock().expect("objects mutex poisoned");
        if objects.contains_key(&target) {
            return Ok(target);
        }
        let bytes = objects
            .get(source_url)
            .ok_or_else(|| StoreError::new(StoreErrorKind::NotFound, source_url))?
            .clone();
        objects.insert(target.clone(), bytes);
        Ok(target)
    }
}
