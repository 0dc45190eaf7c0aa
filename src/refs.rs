//! Virtual chunk references.
//!
//! A [`ReferenceFragment`] maps chunk keys to physical locations for one
//! source file: either bytes stored inline or a `(path, offset, length)`
//! range into an underlying file. Merging fragments produces a
//! [`crate::MergedManifest`] covering the full logical dataset.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Logical coordinate of one storage-addressable chunk, encoded as
/// `"array/0.0.1"`.
///
/// The coordinate order matches the array's dimension order as declared by
/// its fragment. A key with no coordinates addresses the array itself.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkKey {
    pub array: String,
    pub coords: Vec<u64>,
}

impl ChunkKey {
    pub fn new(array: impl Into<String>, coords: Vec<u64>) -> Self {
        Self {
            array: array.into(),
            coords,
        }
    }

    /// Parse a key string. The suffix after the last `/` is read as a
    /// dot-separated coordinate list; anything else is an array name with
    /// no coordinates.
    pub fn parse(s: &str) -> Self {
        if let Some((array, tail)) = s.rsplit_once('/') {
            if !array.is_empty() && !tail.is_empty() {
                let coords: Option<Vec<u64>> =
                    tail.split('.').map(|part| part.parse().ok()).collect();
                if let Some(coords) = coords {
                    return Self {
                        array: array.to_string(),
                        coords,
                    };
                }
            }
        }
        Self {
            array: s.to_string(),
            coords: Vec::new(),
        }
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.coords.is_empty() {
            return f.write_str(&self.array);
        }
        write!(f, "{}/", self.array)?;
        for (i, coord) in self.coords.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{coord}")?;
        }
        Ok(())
    }
}

// Keys serialize as their string form so reference maps stay plain JSON
// objects.
impl Serialize for ChunkKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChunkKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Physical location of one stored chunk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkLocation {
    /// Chunk bytes stored inline in the reference set.
    Inline(Vec<u8>),
    /// Byte range in an underlying physical file.
    FileRange {
        path: String,
        offset: u64,
        length: u64,
    },
}

impl ChunkLocation {
    pub fn file_range(path: impl Into<String>, offset: u64, length: u64) -> Self {
        Self::FileRange {
            path: path.into(),
            offset,
            length,
        }
    }

    pub fn inline(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Inline(bytes.into())
    }
}

/// Chunk references contributed by one physical source file.
///
/// `arrays` declares, for each array, its dimension names in key-coordinate
/// order; every referenced array must be declared.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFragment {
    /// Dimension names per array, in key-coordinate order.
    pub arrays: BTreeMap<String, Vec<String>>,
    /// Chunk coordinate to physical location.
    pub refs: BTreeMap<ChunkKey, ChunkLocation>,
}

impl ReferenceFragment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style array declaration.
    #[must_use]
    pub fn with_array(mut self, name: impl Into<String>, dims: Vec<String>) -> Self {
        self.arrays.insert(name.into(), dims);
        self
    }

    /// Builder-style reference.
    #[must_use]
    pub fn with_ref(mut self, key: ChunkKey, location: ChunkLocation) -> Self {
        self.refs.insert(key, location);
        self
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}
