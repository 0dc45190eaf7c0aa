//! Schema descriptors for chunked array datasets.
//!
//! A [`DatasetSchema`] describes the shape of one fragment (or of the merged
//! logical dataset): dimension sizes, element type, attribute dictionary,
//! and chunk structure. It carries no data. Schemas are plain serde values
//! so they can cross an execution-engine boundary between workers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Element type of the dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        };
        f.write_str(name)
    }
}

/// Shape, dtype, attribute, and chunk-structure description of one fragment
/// or of a merged dataset.
///
/// Invariants across fragments of one reduction: the dtype must match, the
/// sizes of every non-concatenated dimension must match, and attribute
/// values must be reconcilable (equal, or present on only one side).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Size of each named dimension.
    pub dims: BTreeMap<String, u64>,
    /// Element type.
    pub dtype: DataType,
    /// Attribute dictionary.
    pub attrs: BTreeMap<String, Value>,
    /// Chunk length per dimension. A dimension absent from this map is
    /// unchunked.
    pub chunks: BTreeMap<String, u64>,
}

impl DatasetSchema {
    pub fn new(dtype: DataType) -> Self {
        Self {
            dims: BTreeMap::new(),
            dtype,
            attrs: BTreeMap::new(),
            chunks: BTreeMap::new(),
        }
    }

    /// Builder-style dimension size.
    #[must_use]
    pub fn with_dim(mut self, name: impl Into<String>, size: u64) -> Self {
        self.dims.insert(name.into(), size);
        self
    }

    /// Builder-style chunk length.
    #[must_use]
    pub fn with_chunk(mut self, name: impl Into<String>, length: u64) -> Self {
        self.chunks.insert(name.into(), length);
        self
    }

    /// Builder-style attribute.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    /// Size along the named dimension.
    pub fn size(&self, dim: &str) -> Option<u64> {
        self.dims.get(dim).copied()
    }
}
