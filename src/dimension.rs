//! Dimension and index value model.
//!
//! Every fragment entering a reduction is tagged with an [`Index`]: its
//! position along each [`Dimension`] of the logical dataset. The index is
//! assigned upstream, before the fragment reaches a combiner, and travels
//! with the fragment as an [`Indexed`] pair.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How fragments relate along one axis of the logical dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CombineOp {
    /// Fragments are laid end-to-end along this axis.
    Concat,
    /// Fragments share this axis; no repositioning.
    Merge,
}

/// A named axis of the logical dataset plus the operation applied along it.
///
/// Immutable value; compared by name and operation.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub op: CombineOp,
}

impl Dimension {
    /// A dimension along which fragments are concatenated.
    pub fn concat(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: CombineOp::Concat,
        }
    }

    /// A dimension shared across fragments.
    pub fn merge(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: CombineOp::Merge,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            CombineOp::Concat => "concat",
            CombineOp::Merge => "merge",
        };
        write!(f, "{}:{}", self.name, op)
    }
}

/// Position of one fragment along each dimension relevant to a reduction.
///
/// Order-irrelevant as a mapping: two indexes with the same entries are
/// equal regardless of insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index(BTreeMap<Dimension, i64>);

impl Index {
    /// New empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, dim: Dimension, position: i64) -> Self {
        self.0.insert(dim, position);
        self
    }

    pub fn insert(&mut self, dim: Dimension, position: i64) {
        self.0.insert(dim, position);
    }

    /// Position along the given dimension, if the index carries it.
    pub fn position(&self, dim: &Dimension) -> Option<i64> {
        self.0.get(dim).copied()
    }

    /// Position along the dimension with the given name, regardless of its
    /// combine operation.
    pub fn position_along(&self, name: &str) -> Option<i64> {
        self.0
            .iter()
            .find(|(dim, _)| dim.name == name)
            .map(|(_, position)| *position)
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &Dimension> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Dimension, i64)> for Index {
    fn from_iter<I: IntoIterator<Item = (Dimension, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A fragment paired with its index, as delivered by the upstream
/// index-assignment stage.
pub type Indexed<T> = (Index, T);
