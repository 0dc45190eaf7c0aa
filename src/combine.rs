//! The generic combine-function contract.
//!
//! An external reduction engine drives a combiner through four operations:
//! create an empty accumulator, fold inputs in one at a time, merge
//! accumulators pairwise or in groups, and extract the final output. The
//! engine may run folds and merges in parallel across workers, in any
//! grouping and any order; implementations must be associative and
//! commutative so the output is identical regardless of how work was
//! partitioned.
//!
//! Ownership: every call consumes its accumulator(s) and returns a new
//! owned value. Callers must use the returned accumulator and never retain
//! a consumed one; this makes the engine's single-writer discipline
//! structural. An accumulator whose fold or merge returned an error is
//! poisoned and must not be reused.

use crate::error::CombineResult;

/// A combiner over values `V`, accumulating into `A` and producing `O`.
///
/// Laws every implementation must uphold:
///
/// - merging accumulators built from any partition of the inputs yields the
///   same extracted output as folding all inputs into one accumulator;
/// - `merge_accumulators(vec![a])` returns `a` unchanged;
/// - `extract_output` on a clone of an unmutated accumulator is
///   bit-identical across calls.
pub trait CombineFn<V, A, O>: Send + Sync + 'static {
    /// New empty accumulator.
    fn create_accumulator(&self) -> A;

    /// Fold one input into the accumulator.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::CombineError`] if the input is structurally
    /// inconsistent with what the accumulator has already absorbed.
    fn add_input(&self, acc: A, value: V) -> CombineResult<A>;

    /// Combine any number of accumulators into one.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::CombineError`] if two accumulators are mutually
    /// inconsistent.
    fn merge_accumulators(&self, accs: Vec<A>) -> CombineResult<A>;

    /// Produce the final output and release the accumulator.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::CombineError`] if a deferred validation fails or
    /// the accumulator cannot yield an output.
    fn extract_output(&self, acc: A) -> CombineResult<O>;
}
