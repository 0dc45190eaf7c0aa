//! Reference reduction drivers.
//!
//! Stand-ins for the external execution engine: [`combine_seq`] folds every
//! item into one accumulator, [`combine_par`] partitions the items across
//! rayon workers and merges the per-partition accumulators in rounds. By
//! the associativity laws on [`CombineFn`], both produce identical output
//! for the same input set; the parallel path is how tests exercise
//! arbitrary grouping.
//!
//! The combiners themselves never depend on this module; any engine that
//! honors the trait contract can drive them instead.

use crate::combine::CombineFn;
use crate::error::CombineResult;

/// Fold all items into one accumulator and extract.
///
/// # Errors
///
/// Propagates the first [`crate::CombineError`] a fold or the extract
/// reports.
pub fn combine_seq<C, V, A, O>(comb: &C, items: Vec<V>) -> CombineResult<O>
where
    C: CombineFn<V, A, O>,
{
    let mut acc = comb.create_accumulator();
    for item in items {
        acc = comb.add_input(acc, item)?;
    }
    comb.extract_output(acc)
}

/// Partitioned parallel reduction.
///
/// Items are split into `partitions` batches (default: `2 * num_cpus`,
/// matching typical engine fan-out), each batch is folded on a rayon
/// worker, and the per-batch accumulators are merged in rounds of at most
/// `fanout` (default: all at once).
///
/// # Errors
///
/// Propagates the first [`crate::CombineError`] any fold, merge, or the
/// extract reports.
#[cfg(feature = "parallel-runner")]
pub fn combine_par<C, V, A, O>(
    comb: &C,
    items: Vec<V>,
    partitions: Option<usize>,
    fanout: Option<usize>,
) -> CombineResult<O>
where
    C: CombineFn<V, A, O>,
    V: Send,
    A: Send,
{
    use rayon::prelude::*;

    let partitions = partitions
        .unwrap_or_else(|| 2 * num_cpus::get().max(2))
        .max(1);
    let batch = items.len().div_ceil(partitions).max(1);

    let mut accs: Vec<A> = items
        .into_par_iter()
        .chunks(batch)
        .map(|part| {
            let mut acc = comb.create_accumulator();
            for item in part {
                acc = comb.add_input(acc, item)?;
            }
            Ok(acc)
        })
        .collect::<CombineResult<Vec<A>>>()?;

    // fanout < 2 would merge single-accumulator lists forever
    let fanout = fanout.unwrap_or(usize::MAX).max(2);
    while accs.len() > 1 {
        let mut rounds: Vec<Vec<A>> = Vec::new();
        let mut iter = accs.into_iter().peekable();
        while iter.peek().is_some() {
            rounds.push(iter.by_ref().take(fanout).collect());
        }
        accs = rounds
            .into_par_iter()
            .map(|group| comb.merge_accumulators(group))
            .collect::<CombineResult<Vec<A>>>()?;
    }

    let acc = match accs.pop() {
        Some(acc) => acc,
        None => comb.create_accumulator(),
    };
    comb.extract_output(acc)
}
