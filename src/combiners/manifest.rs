//! Manifest combiner: merge per-fragment chunk references into one virtual
//! reference manifest.
//!
//! Fragments are combined along one or more concatenation dimensions;
//! identical dimensions are required to agree value-for-value across
//! fragments. Normalization is deferred: `add_input` only appends, and the
//! expensive merge (position ordering, offset computation, key rewriting)
//! runs once per merge level rather than once per fragment.
//!
//! Until the final extract, chunk coordinates along concatenation
//! dimensions are held in `(fragment position, local chunk index)` space.
//! Global chunk offsets depend on the chunk counts of every preceding
//! fragment, which are only all known at the end; keeping position space
//! also lets the engine group fragments whose positions interleave without
//! breaking associativity.

use crate::combine::CombineFn;
use crate::dimension::{Index, Indexed};
use crate::error::{CombineError, CombineResult};
use crate::manifest::MergedManifest;
use crate::refs::{ChunkKey, ChunkLocation, ReferenceFragment};
use crate::store::StorageOptions;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/* ===================== position-space keys ===================== */

/// One coordinate of a chunk key before global renumbering.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
enum PosCoord {
    /// Plain local index along a non-concatenated dimension.
    Local(u64),
    /// `(fragment position, local chunk index)` along a concatenation
    /// dimension.
    Offset(i64, u64),
}

impl fmt::Display for PosCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(i) => write!(f, "{i}"),
            Self::Offset(pos, local) => write!(f, "{local}@{pos}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
struct PosKey {
    array: String,
    coords: Vec<PosCoord>,
}

impl fmt::Display for PosKey {
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

/* ===================== RefGroup ===================== */

/// One group of references: a single lifted fragment, or the partially
/// merged union of several.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RefGroup {
    /// Dimension names per array, in key-coordinate order.
    arrays: BTreeMap<String, Vec<String>>,
    /// Position-space chunk references.
    refs: BTreeMap<PosKey, ChunkLocation>,
    /// Position tuples (one entry per concatenation dimension, in
    /// configuration order) of the fragments folded in. Two fragments tie
    /// only when their full tuples are equal; sharing a position along one
    /// dimension of a multi-dimensional grid is legitimate.
    coverage: BTreeSet<Vec<i64>>,
}

impl RefGroup {
    /// Number of references held.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

/// Accumulator for a manifest reduction: groups collected so far,
/// unresolved until a merge or the final extract.
pub type RefAccumulator = Vec<RefGroup>;

/* ===================== ManifestCombiner ===================== */

/// Combines per-fragment [`ReferenceFragment`]s into a [`MergedManifest`].
///
/// - Input: `(Index, ReferenceFragment)`
/// - Accumulator: [`RefAccumulator`]
/// - Output: [`MergedManifest`]
///
/// `merge_accumulators` collapses each input accumulator to one merged
/// group and returns the list of these per-group results; the final
/// single-manifest collapse happens in `extract_output`.
#[derive(Clone, Debug)]
pub struct ManifestCombiner {
    /// Dimensions along which fragments are concatenated.
    pub concat_dims: Vec<String>,
    /// Dimensions required identical across fragments.
    pub identical_dims: Vec<String>,
    /// Network protocol tag for lazily resolving byte ranges.
    pub remote_protocol: Option<String>,
    /// Storage access options for the fragments' source files.
    pub remote_options: StorageOptions,
    /// Storage access options for the merged target.
    pub target_options: StorageOptions,
    /// Insert missing concatenation dimensions into each input before
    /// folding it in.
    pub precombine_inputs: bool,
}

impl ManifestCombiner {
    pub fn new(concat_dims: Vec<String>, identical_dims: Vec<String>) -> Self {
        Self {
            concat_dims,
            identical_dims,
            remote_protocol: None,
            remote_options: StorageOptions::default(),
            target_options: StorageOptions::default(),
            precombine_inputs: false,
        }
    }

    #[must_use]
    pub fn with_remote_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.remote_protocol = Some(protocol.into());
        self
    }

    #[must_use]
    pub fn with_remote_options(mut self, options: StorageOptions) -> Self {
        self.remote_options = options;
        self
    }

    #[must_use]
    pub fn with_target_options(mut self, options: StorageOptions) -> Self {
        self.target_options = options;
        self
    }

    #[must_use]
    pub fn with_precombine_inputs(mut self, precombine: bool) -> Self {
        self.precombine_inputs = precombine;
        self
    }

    /// The coordinate array of an identical dimension is shared across
    /// fragments and never carries a concatenation dimension.
    fn is_shared_array(&self, name: &str) -> bool {
        self.identical_dims.iter().any(|dim| dim == name)
    }

    /// Consolidate multiple reference records from one physical source file
    /// into a single fragment.
    ///
    /// Multi-record source formats yield several reference sets per file;
    /// they must be unioned before the file can be folded into a multi-file
    /// accumulator. All records share the file's index.
    ///
    /// # Errors
    ///
    /// `SchemaConflict` if two records declare the same array with
    /// different dimensions; `DuplicateKey` if two records reference the
    /// same chunk key with different locations.
    pub fn consolidate_records(
        &self,
        records: Vec<ReferenceFragment>,
        index: Index,
    ) -> CombineResult<Indexed<ReferenceFragment>> {
        let mut arrays: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut refs: BTreeMap<ChunkKey, ChunkLocation> = BTreeMap::new();
        for record in records {
            for (name, dims) in record.arrays {
                match arrays.entry(name) {
                    Entry::Vacant(slot) => {
                        slot.insert(dims);
                    }
                    Entry::Occupied(slot) => {
                        if *slot.get() != dims {
                            return Err(CombineError::conflict(format!(
                                "records disagree on dimensions of array `{}`",
                                slot.key()
                            )));
                        }
                    }
                }
            }
            for (key, location) in record.refs {
                match refs.entry(key) {
                    Entry::Vacant(slot) => {
                        slot.insert(location);
                    }
                    Entry::Occupied(slot) => {
                        if *slot.get() != location {
                            return Err(CombineError::duplicate_key(slot.key().to_string()));
                        }
                    }
                }
            }
        }
        Ok((index, ReferenceFragment { arrays, refs }))
    }

    /// Insert a size-1 synthetic axis for every concatenation dimension a
    /// fragment's arrays lack.
    ///
    /// Coordinate arrays of identical dimensions are left untouched. For
    /// every other array the missing dimension is prepended and each of its
    /// chunk keys gains a leading `0` coordinate, so the fragment's
    /// dimensionality matches its later merge partners.
    pub fn insert_missing_dims(
        &self,
        item: Indexed<ReferenceFragment>,
    ) -> CombineResult<Indexed<ReferenceFragment>> {
        let (index, mut fragment) = item;
        for dim in &self.concat_dims {
            let mut inserted: BTreeSet<String> = BTreeSet::new();
            for (name, dims) in &mut fragment.arrays {
                if dims.iter().any(|d| d == dim) || self.is_shared_array(name) {
                    continue;
                }
                dims.insert(0, dim.clone());
                inserted.insert(name.clone());
            }
            if !inserted.is_empty() {
                fragment.refs = fragment
                    .refs
                    .into_iter()
                    .map(|(mut key, location)| {
                        if inserted.contains(&key.array) {
                            key.coords.insert(0, 0);
                        }
                        (key, location)
                    })
                    .collect();
            }
        }
        Ok((index, fragment))
    }

    /// Lift a raw fragment into position space.
    fn lift(&self, index: &Index, fragment: ReferenceFragment) -> CombineResult<RefGroup> {
        let mut positions: BTreeMap<&str, i64> = BTreeMap::new();
        for dim in &self.concat_dims {
            let position = index.position_along(dim).ok_or_else(|| {
                CombineError::missing_dimension(
                    dim,
                    "fragment index carries no position along this concatenation dimension",
                )
            })?;
            positions.insert(dim.as_str(), position);
        }

        for (name, dims) in &fragment.arrays {
            for dim in &self.concat_dims {
                if !dims.iter().any(|d| d == dim) && !self.is_shared_array(name) {
                    return Err(CombineError::missing_dimension(
                        dim,
                        format!(
                            "array `{name}` lacks it; enable precombine_inputs to insert it"
                        ),
                    ));
                }
            }
        }

        let mut refs: BTreeMap<PosKey, ChunkLocation> = BTreeMap::new();
        for (key, location) in fragment.refs {
            let dims = fragment.arrays.get(&key.array).ok_or_else(|| {
                CombineError::conflict(format!(
                    "references for undeclared array `{}`",
                    key.array
                ))
            })?;
            if dims.len() != key.coords.len() {
                return Err(CombineError::conflict(format!(
                    "key `{key}` has {} coordinates but array `{}` declares {} dimensions",
                    key.coords.len(),
                    key.array,
                    dims.len()
                )));
            }
            let coords = dims
                .iter()
                .zip(key.coords)
                .map(|(dim, local)| match positions.get(dim.as_str()) {
                    Some(&position) => PosCoord::Offset(position, local),
                    None => PosCoord::Local(local),
                })
                .collect();
            refs.insert(
                PosKey {
                    array: key.array,
                    coords,
                },
                location,
            );
        }

        let mut coverage = BTreeSet::new();
        if !self.concat_dims.is_empty() {
            let tuple = self
                .concat_dims
                .iter()
                .filter_map(|dim| positions.get(dim.as_str()).copied())
                .collect();
            coverage.insert(tuple);
        }
        Ok(RefGroup {
            arrays: fragment.arrays,
            refs,
            coverage,
        })
    }

    /// Union `src` into `dst`, validating consistency.
    fn merge_into(&self, dst: &mut RefGroup, src: RefGroup) -> CombineResult<()> {
        if let Some(tuple) = src.coverage.intersection(&dst.coverage).next() {
            let dimension = self.concat_dims.first().cloned().unwrap_or_default();
            let position = tuple.first().copied().unwrap_or(0);
            return Err(CombineError::inconsistent_index(
                dimension,
                position,
                format!("position tuple {tuple:?} claimed by more than one fragment"),
            ));
        }

        for (name, dims) in src.arrays {
            match dst.arrays.entry(name) {
                Entry::Vacant(slot) => {
                    slot.insert(dims);
                }
                Entry::Occupied(slot) => {
                    if *slot.get() != dims {
                        return Err(CombineError::conflict(format!(
                            "fragments disagree on dimensions of array `{}`",
                            slot.key()
                        )));
                    }
                }
            }
        }

        for (key, location) in src.refs {
            match dst.refs.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(location);
                }
                Entry::Occupied(slot) => {
                    if *slot.get() == location {
                        continue;
                    }
                    if self.is_shared_array(&slot.key().array) {
                        return Err(CombineError::conflict(format!(
                            "identical-dimension content differs at key `{}`",
                            slot.key()
                        )));
                    }
                    return Err(CombineError::duplicate_key(slot.key().to_string()));
                }
            }
        }

        dst.coverage.extend(src.coverage);
        Ok(())
    }

    /// Collapse a list of groups into one.
    fn reduce_groups(&self, groups: Vec<RefGroup>) -> CombineResult<RefGroup> {
        let mut iter = groups.into_iter();
        let mut merged = iter.next().unwrap_or_default();
        for group in iter {
            self.merge_into(&mut merged, group)?;
        }
        Ok(merged)
    }

    /// Rewrite position-space coordinates into the global chunk-index space
    /// and wrap the result as a manifest.
    ///
    /// For each array and concatenated axis, fragments are ordered by
    /// position and each receives the cumulative chunk count of every
    /// fragment before it as its offset.
    fn renumber(&self, group: RefGroup) -> CombineResult<MergedManifest> {
        // chunk counts per array, axis, and fragment position
        let mut counts: BTreeMap<String, BTreeMap<usize, BTreeMap<i64, u64>>> = BTreeMap::new();
        for key in group.refs.keys() {
            for (axis, coord) in key.coords.iter().enumerate() {
                if let PosCoord::Offset(position, local) = coord {
                    let count = counts
                        .entry(key.array.clone())
                        .or_default()
                        .entry(axis)
                        .or_default()
                        .entry(*position)
                        .or_insert(0);
                    *count = (*count).max(local + 1);
                }
            }
        }

        let offsets: BTreeMap<String, BTreeMap<usize, BTreeMap<i64, u64>>> = counts
            .into_iter()
            .map(|(array, per_axis)| {
                let per_axis = per_axis
                    .into_iter()
                    .map(|(axis, per_position)| {
                        let mut running = 0;
                        let mut offsets = BTreeMap::new();
                        for (position, count) in per_position {
                            offsets.insert(position, running);
                            running += count;
                        }
                        (axis, offsets)
                    })
                    .collect();
                (array, per_axis)
            })
            .collect();

        let mut refs: BTreeMap<ChunkKey, ChunkLocation> = BTreeMap::new();
        for (key, location) in group.refs {
            let coords = key
                .coords
                .iter()
                .enumerate()
                .map(|(axis, coord)| match coord {
                    PosCoord::Local(local) => *local,
                    PosCoord::Offset(position, local) => {
                        let base = offsets
                            .get(&key.array)
                            .and_then(|per_axis| per_axis.get(&axis))
                            .and_then(|per_position| per_position.get(position))
                            .copied()
                            .unwrap_or(0);
                        base + local
                    }
                })
                .collect();
            match refs.entry(ChunkKey::new(key.array, coords)) {
                Entry::Vacant(slot) => {
                    slot.insert(location);
                }
                Entry::Occupied(slot) => {
                    if *slot.get() != location {
                        return Err(CombineError::duplicate_key(slot.key().to_string()));
                    }
                }
            }
        }

        Ok(MergedManifest::new(
            group.arrays,
            refs,
            self.remote_protocol.clone(),
            self.remote_options.clone(),
            self.target_options.clone(),
        ))
    }
}

impl CombineFn<Indexed<ReferenceFragment>, RefAccumulator, MergedManifest> for ManifestCombiner {
    fn create_accumulator(&self) -> RefAccumulator {
        Vec::new()
    }

    fn add_input(
        &self,
        acc: RefAccumulator,
        item: Indexed<ReferenceFragment>,
    ) -> CombineResult<RefAccumulator> {
        let item = if self.precombine_inputs {
            self.insert_missing_dims(item)?
        } else {
            item
        };
        let (index, fragment) = item;
        let mut acc = acc;
        acc.push(self.lift(&index, fragment)?);
        Ok(acc)
    }

    fn merge_accumulators(&self, accs: Vec<RefAccumulator>) -> CombineResult<RefAccumulator> {
        let mut accs = accs;
        if accs.len() == 1 {
            if let Some(only) = accs.pop() {
                return Ok(only);
            }
        }

        let mut merged = Vec::with_capacity(accs.len());
        for groups in accs {
            if groups.is_empty() {
                continue;
            }
            merged.push(self.reduce_groups(groups)?);
        }
        Ok(merged)
    }

    fn extract_output(&self, acc: RefAccumulator) -> CombineResult<MergedManifest> {
        let merged = self.reduce_groups(acc)?;
        self.renumber(merged)
    }
}
