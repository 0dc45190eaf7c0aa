//! Built-in combiners for dataset-fragment reductions.
//!
//! Both implement [`CombineFn`](crate::CombineFn) and are driven by an
//! external reduction engine (or by the local [`runner`](crate::runner)):
//!
//! - [`SchemaCombiner`] -- merges per-fragment schema descriptors along one
//!   declared dimension.
//! - [`ManifestCombiner`] -- merges per-fragment chunk references into one
//!   virtual manifest, along any number of concatenation dimensions plus a
//!   set of identical dimensions.
//!
//! Each combiner specifies its accumulator type and output type; both honor
//! the associativity and commutativity laws documented on the trait.

mod manifest;
mod schema;

pub use manifest::{ManifestCombiner, RefAccumulator, RefGroup};
pub use schema::{SchemaAccumulator, SchemaCombiner};
