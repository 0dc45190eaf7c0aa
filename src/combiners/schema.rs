//! Schema combiner: merge per-fragment schemas along one dimension.

use crate::combine::CombineFn;
use crate::dimension::{CombineOp, Dimension, Index, Indexed};
use crate::error::{CombineError, CombineResult};
use crate::schema::DatasetSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/* ===================== SchemaAccumulator ===================== */

/// Running merge state for a schema reduction.
///
/// The structural part (dtype, non-concatenated dimension sizes, attributes,
/// chunking) is merged progressively; sizes along the concatenation
/// dimension are recorded per position and only summed at extract time, so
/// the result does not depend on fold order or grouping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaAccumulator {
    concat_dim: Option<String>,
    merged: Option<DatasetSchema>,
    /// Fragment size along the concat dimension, keyed by position.
    concat_sizes: BTreeMap<i64, u64>,
}

impl SchemaAccumulator {
    fn new(concat_dim: Option<String>) -> Self {
        Self {
            concat_dim,
            merged: None,
            concat_sizes: BTreeMap::new(),
        }
    }

    /// Number of fragments recorded along the concat dimension.
    pub fn positions_seen(&self) -> usize {
        self.concat_sizes.len()
    }
}

/// Merge `src` into the structural state, verifying compatibility.
///
/// Dimension sizes, chunk lengths, and attribute values must be equal where
/// both sides carry them; entries present on only one side are unioned in.
fn merge_structure(dst: &mut Option<DatasetSchema>, src: DatasetSchema) -> CombineResult<()> {
    let Some(merged) = dst else {
        *dst = Some(src);
        return Ok(());
    };

    if merged.dtype != src.dtype {
        return Err(CombineError::conflict(format!(
            "dtype mismatch: {} vs {}",
            merged.dtype, src.dtype
        )));
    }
    for (name, size) in src.dims {
        match merged.dims.get(&name) {
            Some(&have) if have != size => {
                return Err(CombineError::conflict(format!(
                    "size mismatch on dimension `{name}`: {have} vs {size}"
                )));
            }
            Some(_) => {}
            None => {
                merged.dims.insert(name, size);
            }
        }
    }
    for (name, length) in src.chunks {
        match merged.chunks.get(&name) {
            Some(&have) if have != length => {
                return Err(CombineError::conflict(format!(
                    "chunk length mismatch on dimension `{name}`: {have} vs {length}"
                )));
            }
            Some(_) => {}
            None => {
                merged.chunks.insert(name, length);
            }
        }
    }
    for (key, value) in src.attrs {
        match merged.attrs.get(&key) {
            Some(have) if *have != value => {
                return Err(CombineError::conflict(format!(
                    "conflicting values for attribute `{key}`"
                )));
            }
            Some(_) => {}
            None => {
                merged.attrs.insert(key, value);
            }
        }
    }
    Ok(())
}

/* ===================== SchemaCombiner ===================== */

/// Combines per-fragment [`DatasetSchema`]s along a single [`Dimension`].
///
/// - Input: `(Index, DatasetSchema)`
/// - Accumulator: [`SchemaAccumulator`]
/// - Output: the merged [`DatasetSchema`]
///
/// With a `Concat` dimension the merged size along it is the sum of the
/// per-fragment sizes, ordered by position. With a `Merge` dimension the
/// reduction is a pure structural-compatibility merge.
#[derive(Clone, Debug)]
pub struct SchemaCombiner {
    /// The dimension along which fragments are combined.
    pub dimension: Dimension,
}

impl SchemaCombiner {
    pub fn new(dimension: Dimension) -> Self {
        Self { dimension }
    }

    fn position(&self, index: &Index) -> CombineResult<i64> {
        index.position(&self.dimension).ok_or_else(|| {
            CombineError::missing_dimension(
                &self.dimension.name,
                "fragment index carries no position along the combine dimension",
            )
        })
    }
}

impl CombineFn<Indexed<DatasetSchema>, SchemaAccumulator, DatasetSchema> for SchemaCombiner {
    fn create_accumulator(&self) -> SchemaAccumulator {
        let concat_dim = match self.dimension.op {
            CombineOp::Concat => Some(self.dimension.name.clone()),
            CombineOp::Merge => None,
        };
        SchemaAccumulator::new(concat_dim)
    }

    fn add_input(
        &self,
        acc: SchemaAccumulator,
        item: Indexed<DatasetSchema>,
    ) -> CombineResult<SchemaAccumulator> {
        let (index, mut schema) = item;
        let position = self.position(&index)?;
        let mut acc = acc;

        if let Some(concat_dim) = acc.concat_dim.clone() {
            let size = schema.dims.remove(&concat_dim).ok_or_else(|| {
                CombineError::missing_dimension(
                    &concat_dim,
                    "fragment schema has no size along the concatenation dimension",
                )
            })?;
            if acc.concat_sizes.contains_key(&position) {
                return Err(CombineError::inconsistent_index(
                    &concat_dim,
                    position,
                    "position already claimed by another fragment",
                ));
            }
            acc.concat_sizes.insert(position, size);
            // chunk length along the concat dimension must be uniform
            // across fragments; the structural merge checks it
        }

        merge_structure(&mut acc.merged, schema)?;
        Ok(acc)
    }

    fn merge_accumulators(
        &self,
        accs: Vec<SchemaAccumulator>,
    ) -> CombineResult<SchemaAccumulator> {
        let mut accs = accs;
        if accs.len() == 1 {
            if let Some(only) = accs.pop() {
                return Ok(only);
            }
        }

        let mut iter = accs.into_iter();
        let Some(mut first) = iter.next() else {
            return Ok(self.create_accumulator());
        };
        for other in iter {
            if first.concat_dim != other.concat_dim {
                return Err(CombineError::conflict(
                    "accumulators are bound to different concatenation dimensions",
                ));
            }
            for (position, size) in other.concat_sizes {
                if first.concat_sizes.contains_key(&position) {
                    let dim = first.concat_dim.clone().unwrap_or_default();
                    return Err(CombineError::inconsistent_index(
                        dim,
                        position,
                        "position already claimed by another fragment",
                    ));
                }
                first.concat_sizes.insert(position, size);
            }
            if let Some(schema) = other.merged {
                merge_structure(&mut first.merged, schema)?;
            }
        }
        Ok(first)
    }

    fn extract_output(&self, acc: SchemaAccumulator) -> CombineResult<DatasetSchema> {
        let mut schema = acc.merged.ok_or_else(|| {
            CombineError::conflict("cannot extract a schema from an empty accumulator")
        })?;
        if let Some(concat_dim) = acc.concat_dim {
            let total: u64 = acc.concat_sizes.values().sum();
            schema.dims.insert(concat_dim, total);
        }
        Ok(schema)
    }
}
