//! # Chunkforge
//!
//! **Order-independent combine functions** for merging independently
//! produced fragments of a large, chunked, multi-dimensional dataset into
//! one consistent description of the whole: either a unified *schema*
//! (shape, dtype, attributes, chunk structure) or a unified *virtual
//! reference manifest* (logical chunk coordinates to physical byte ranges).
//!
//! The merge is an associative, commutative reduction. An external
//! distributed-execution engine may fold fragments in arbitrary order and
//! merge partial accumulators in arbitrary groupings across workers; the
//! extracted result is bit-identical regardless of how the work was
//! partitioned. Chunkforge performs no network I/O, schedules no workers,
//! and never materializes the dataset's numeric content.
//!
//! ## Quick Start
//!
//! ```ignore
//! use chunkforge::*;
//!
//! // Merge three daily schema fragments along "time".
//! let combiner = SchemaCombiner::new(Dimension::concat("time"));
//! let fragments: Vec<(Index, DatasetSchema)> = load_fragments();
//! let schema = combine_seq(&combiner, fragments)?;
//! assert_eq!(schema.size("time"), Some(3));
//!
//! // Merge the matching chunk references into one virtual manifest.
//! let combiner = ManifestCombiner::new(vec!["time".into()], vec!["lat".into(), "lon".into()])
//!     .with_remote_protocol("s3");
//! let manifest = combine_seq(&combiner, load_reference_fragments())?;
//! let bytes = manifest.open_chunk(&ChunkKey::parse("temperature/0.0.0"), &reader)?;
//! # Ok::<_, anyhow::Error>(())
//! ```
//!
//! ## Core Concepts
//!
//! ### Fragments and indexes
//!
//! A *fragment* is one unit of input: the schema or chunk references of one
//! physical source file. Before a fragment reaches a combiner, an upstream
//! stage pairs it with an [`Index`] giving its position along each
//! [`Dimension`] of the logical dataset. A dimension is either
//! concatenated ([`CombineOp::Concat`], fragments laid end-to-end) or
//! shared ([`CombineOp::Merge`], no repositioning).
//!
//! ### The combine contract
//!
//! Both combiners implement [`CombineFn`]: create an empty accumulator,
//! fold inputs in, merge accumulators, extract the output. Every call
//! consumes its accumulator(s) and returns a new owned value, which makes
//! the engine's single-writer discipline structural. See the trait docs
//! for the algebraic laws implementations uphold.
//!
//! ### Combiners
//!
//! - [`SchemaCombiner`] merges [`DatasetSchema`] fragments along one
//!   dimension, validating dtype, non-concatenated sizes, chunking, and
//!   attributes as it goes.
//! - [`ManifestCombiner`] merges [`ReferenceFragment`]s along any number of
//!   concatenation dimensions, requires the listed identical dimensions to
//!   agree value-for-value, rewrites chunk keys into the global chunk-index
//!   space, and produces a [`MergedManifest`].
//!
//! ### Errors
//!
//! All failures are structural inconsistencies in the input dataset,
//! enumerated by [`CombineError`], and propagate to the driving engine
//! unretried. Storage faults live in a separate [`StoreError`] so the two
//! never mix.
//!
//! ### Resolving chunks
//!
//! A [`MergedManifest`] is a key-addressable view: list keys, look up
//! locations, and open individual chunks through a [`ByteRangeReader`]
//! without copying the underlying files. [`LocalFileReader`] serves local
//! files; [`InMemoryStore`] backs tests.
//!
//! ## Module Overview
//!
//! - [`combine`] - the generic four-operation combiner contract
//! - [`combiners`] - the schema and manifest combiners
//! - [`dimension`] - dimension, combine-operation, and index value model
//! - [`schema`] - dataset schema descriptors
//! - [`refs`] - chunk keys, locations, and reference fragments
//! - [`manifest`] - the merged virtual manifest
//! - [`store`] - byte-range and fetch seams to the storage layer
//! - [`runner`] - local sequential and parallel reduction drivers
//! - [`testing`] - fixtures and assertions for reduction tests

pub mod combine;
pub mod combiners;
pub mod dimension;
pub mod error;
pub mod manifest;
pub mod refs;
pub mod runner;
pub mod schema;
pub mod store;
pub mod testing;

// General re-exports
pub use combine::CombineFn;
pub use combiners::{ManifestCombiner, RefAccumulator, RefGroup, SchemaAccumulator, SchemaCombiner};
pub use dimension::{CombineOp, Dimension, Index, Indexed};
pub use error::{CombineError, CombineResult};
pub use manifest::MergedManifest;
pub use refs::{ChunkKey, ChunkLocation, ReferenceFragment};
pub use runner::combine_seq;
pub use schema::{DataType, DatasetSchema};
pub use store::{
    ByteRangeReader, InMemoryStore, LocalFileReader, SourceFetcher, StorageOptions, StoreError,
    StoreErrorKind, StoreResult,
};

// Gated re-exports
#[cfg(feature = "parallel-runner")]
pub use runner::combine_par;
