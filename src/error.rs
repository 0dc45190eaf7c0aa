//! Error taxonomy for the combine algebra.
//!
//! Every variant indicates a structural inconsistency in the input dataset,
//! not a transient fault. Errors are returned synchronously from the combine
//! call that detects them and are never retried internally: once a fold or
//! merge fails, the accumulator is poisoned and must not be reused.

use std::error::Error;
use std::fmt;

/// Structural inconsistency detected while combining fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombineError {
    /// Fragments expected to be compatible disagree on dtype, shape,
    /// chunking, or an attribute required to be identical.
    SchemaConflict { detail: String },
    /// Two fragments claim the same position along a dimension.
    InconsistentIndex {
        dimension: String,
        position: i64,
        detail: String,
    },
    /// Two fragments produced the same rewritten chunk key with different
    /// physical locations.
    DuplicateKey { key: String },
    /// A fragment lacks a dimension the logical dataset requires.
    MissingDimension { dimension: String, detail: String },
}

impl CombineError {
    pub(crate) fn conflict(detail: impl Into<String>) -> Self {
        Self::SchemaConflict {
            detail: detail.into(),
        }
    }

    pub(crate) fn inconsistent_index(
        dimension: impl Into<String>,
        position: i64,
        detail: impl Into<String>,
    ) -> Self {
        Self::InconsistentIndex {
            dimension: dimension.into(),
            position,
            detail: detail.into(),
        }
    }

    pub(crate) fn duplicate_key(key: impl Into<String>) -> Self {
        Self::DuplicateKey { key: key.into() }
    }

    pub(crate) fn missing_dimension(dimension: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MissingDimension {
            dimension: dimension.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for CombineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaConflict { detail } => write!(f, "schema conflict: {detail}"),
            Self::InconsistentIndex {
                dimension,
                position,
                detail,
            } => write!(
                f,
                "inconsistent index at position {position} along `{dimension}`: {detail}"
            ),
            Self::DuplicateKey { key } => {
                write!(f, "chunk key `{key}` maps to more than one physical location")
            }
            Self::MissingDimension { dimension, detail } => {
                write!(f, "missing dimension `{dimension}`: {detail}")
            }
        }
    }
}

impl Error for CombineError {}

pub type CombineResult<T> = Result<T, CombineError>;
