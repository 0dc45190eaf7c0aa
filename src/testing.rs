//! Testing utilities for chunkforge reductions.
//!
//! Fixture fragments modeled on a daily climate time series: one file per
//! day, a `temperature` variable over `(time, lat, lon)` with shared 10×10
//! `lat`/`lon` coordinate arrays, plus scratch-file helpers and manifest
//! assertions.
//!
//! # Quick Start
//!
//! ```ignore
//! use chunkforge::testing::*;
//! use chunkforge::{combine_seq, SchemaCombiner};
//!
//! let combiner = SchemaCombiner::new(time_dimension());
//! let merged = combine_seq(&combiner, daily_schema_set(3))?;
//! assert_eq!(merged.size("time"), Some(3));
//! ```

use crate::dimension::{Dimension, Index, Indexed};
use crate::manifest::MergedManifest;
use crate::refs::{ChunkKey, ChunkLocation, ReferenceFragment};
use crate::schema::{DataType, DatasetSchema};
use serde_json::json;
use tempfile::TempDir;

/// The fixture dataset's concatenation dimension.
#[must_use]
pub fn time_dimension() -> Dimension {
    Dimension::concat("time")
}

/// Index placing a fragment at `position` along `time`.
#[must_use]
pub fn time_index(position: i64) -> Index {
    Index::new().with(time_dimension(), position)
}

fn coord_bytes(n: u64) -> Vec<u8> {
    (0..n).flat_map(|v| (v as f32).to_le_bytes()).collect()
}

/// Schema fragment for one daily slice of the fixture dataset.
#[must_use]
pub fn daily_schema(position: i64) -> Indexed<DatasetSchema> {
    let schema = DatasetSchema::new(DataType::Float32)
        .with_dim("time", 1)
        .with_dim("lat", 10)
        .with_dim("lon", 10)
        .with_chunk("time", 1)
        .with_chunk("lat", 10)
        .with_chunk("lon", 10)
        .with_attr("title", json!("daily temperature"))
        .with_attr("units", json!("K"));
    (time_index(position), schema)
}

/// Reference fragment for one daily slice of the fixture dataset.
///
/// The `temperature` chunk points into that day's source file; the shared
/// `lat`/`lon` coordinate chunks are inlined and byte-identical across
/// fragments.
#[must_use]
pub fn daily_refs(position: i64) -> Indexed<ReferenceFragment> {
    let fragment = ReferenceFragment::new()
        .with_array("temperature", vec!["time".into(), "lat".into(), "lon".into()])
        .with_array("lat", vec!["lat".into()])
        .with_array("lon", vec!["lon".into()])
        .with_ref(
            ChunkKey::new("temperature", vec![0, 0, 0]),
            ChunkLocation::file_range(format!("day-{position:04}.nc"), 512, 400),
        )
        .with_ref(
            ChunkKey::new("lat", vec![0]),
            ChunkLocation::inline(coord_bytes(10)),
        )
        .with_ref(
            ChunkKey::new("lon", vec![0]),
            ChunkLocation::inline(coord_bytes(10)),
        );
    (time_index(position), fragment)
}

/// Schema fragments for `n` consecutive days.
#[must_use]
pub fn daily_schema_set(n: i64) -> Vec<Indexed<DatasetSchema>> {
    (0..n).map(daily_schema).collect()
}

/// Reference fragments for `n` consecutive days.
#[must_use]
pub fn daily_ref_set(n: i64) -> Vec<Indexed<ReferenceFragment>> {
    (0..n).map(daily_refs).collect()
}

/// Write `bytes` into a scratch file and return the directory guard plus
/// the file's name relative to it.
///
/// Keep the [`TempDir`] alive for as long as the file is read.
///
/// # Panics
///
/// Panics if the scratch directory or file cannot be created.
#[must_use]
pub fn scratch_file(name: &str, bytes: &[u8]) -> (TempDir, String) {
    let dir = tempfile::tempdir().expect("create scratch dir");
    std::fs::write(dir.path().join(name), bytes).expect("write scratch file");
    (dir, name.to_string())
}

/// Assert two manifests cover the same keys with the same locations.
///
/// # Panics
///
/// Panics with a descriptive message on the first difference.
pub fn assert_same_manifest(left: &MergedManifest, right: &MergedManifest) {
    let left_keys: Vec<String> = left.keys().collect();
    let right_keys: Vec<String> = right.keys().collect();
    assert_eq!(left_keys, right_keys, "manifests cover different key sets");
    for key in left.chunk_keys() {
        assert_eq!(
            left.location(key),
            right.location(key),
            "location differs at key `{key}`"
        );
    }
}
