//! The merged virtual manifest.

use crate::refs::{ChunkKey, ChunkLocation};
use crate::store::{ByteRangeReader, StorageOptions, StoreError, StoreErrorKind, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Final output of a manifest reduction: one mapping from every logical
/// chunk key of the merged dataset to its physical location.
///
/// The manifest is a key-addressable view over the virtual dataset: keys
/// can be listed and opened individually, and opening a chunk resolves only
/// that chunk's bytes; nothing is copied or rewritten up front. Byte-range
/// resolution is delegated to a [`ByteRangeReader`] supplied by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergedManifest {
    arrays: BTreeMap<String, Vec<String>>,
    refs: BTreeMap<ChunkKey, ChunkLocation>,
    remote_protocol: Option<String>,
    remote_options: StorageOptions,
    target_options: StorageOptions,
}

impl MergedManifest {
    pub(crate) fn new(
        arrays: BTreeMap<String, Vec<String>>,
        refs: BTreeMap<ChunkKey, ChunkLocation>,
        remote_protocol: Option<String>,
        remote_options: StorageOptions,
        target_options: StorageOptions,
    ) -> Self {
        Self {
            arrays,
            refs,
            remote_protocol,
            remote_options,
            target_options,
        }
    }

    /// All chunk keys, in canonical (sorted) order.
    pub fn chunk_keys(&self) -> impl Iterator<Item = &ChunkKey> {
        self.refs.keys()
    }

    /// All chunk keys in their string encoding, in canonical order.
    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.refs.keys().map(ChunkKey::to_string)
    }

    /// Names of the arrays the manifest covers.
    pub fn array_names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }

    /// Dimension names of one array, in key-coordinate order.
    pub fn array_dims(&self, name: &str) -> Option<&[String]> {
        self.arrays.get(name).map(Vec::as_slice)
    }

    /// Physical location recorded for a chunk key.
    pub fn location(&self, key: &ChunkKey) -> Option<&ChunkLocation> {
        self.refs.get(key)
    }

    /// Physical location recorded for a chunk key in string form.
    pub fn get(&self, key: &str) -> Option<&ChunkLocation> {
        self.refs.get(&ChunkKey::parse(key))
    }

    pub fn contains_key(&self, key: &ChunkKey) -> bool {
        self.refs.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Protocol tag for resolving the fragments' source files.
    pub fn remote_protocol(&self) -> Option<&str> {
        self.remote_protocol.as_deref()
    }

    pub fn remote_options(&self) -> &StorageOptions {
        &self.remote_options
    }

    pub fn target_options(&self) -> &StorageOptions {
        &self.target_options
    }

    /// Resolve one chunk's bytes.
    ///
    /// Inline chunks are returned directly; file ranges are read through
    /// `reader`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the key is not in the manifest, or whatever the reader
    /// reports for the recorded range.
    pub fn open_chunk(&self, key: &ChunkKey, reader: &dyn ByteRangeReader) -> StoreResult<Vec<u8>> {
        let location = self.refs.get(key).ok_or_else(|| {
            StoreError::new(
                StoreErrorKind::NotFound,
                format!("chunk key `{key}` is not in the manifest"),
            )
        })?;
        match location {
            ChunkLocation::Inline(bytes) => Ok(bytes.clone()),
            ChunkLocation::FileRange {
                path,
                offset,
                length,
            } => reader.read_range(path, *offset, *length),
        }
    }
}
