use anyhow::Result;
use chunkforge::testing::*;
use chunkforge::*;

#[test]
fn parallel_schema_reduction_matches_sequential() -> Result<()> {
    let combiner = SchemaCombiner::new(time_dimension());
    let sequential = combine_seq(&combiner, daily_schema_set(24))?;
    let parallel = combine_par(&combiner, daily_schema_set(24), None, None)?;

    assert_eq!(sequential, parallel);
    Ok(())
}

#[test]
fn parallel_manifest_reduction_matches_sequential() -> Result<()> {
    let combiner = ManifestCombiner::new(vec!["time".into()], vec!["lat".into(), "lon".into()]);
    let sequential = combine_seq(&combiner, daily_ref_set(24))?;
    let parallel = combine_par(&combiner, daily_ref_set(24), Some(5), None)?;

    assert_same_manifest(&sequential, &parallel);
    Ok(())
}

#[test]
fn fanout_does_not_change_the_result() -> Result<()> {
    let combiner = ManifestCombiner::new(vec!["time".into()], vec!["lat".into(), "lon".into()]);
    let direct = combine_seq(&combiner, daily_ref_set(40))?;

    for fanout in [2, 4, 8, 16] {
        let merged = combine_par(&combiner, daily_ref_set(40), Some(16), Some(fanout))?;
        assert_same_manifest(&direct, &merged);
    }
    Ok(())
}

#[test]
fn partition_count_does_not_change_the_result() -> Result<()> {
    let combiner = SchemaCombiner::new(time_dimension());
    let direct = combine_seq(&combiner, daily_schema_set(17))?;

    for partitions in [1, 2, 3, 17, 64] {
        let merged = combine_par(&combiner, daily_schema_set(17), Some(partitions), Some(3))?;
        assert_eq!(direct, merged);
    }
    Ok(())
}

#[test]
fn empty_parallel_manifest_reduction_is_empty() -> Result<()> {
    let combiner = ManifestCombiner::new(vec!["time".into()], vec![]);
    let manifest = combine_par(&combiner, Vec::new(), None, None)?;
    assert!(manifest.is_empty());
    Ok(())
}

#[test]
fn empty_schema_reduction_fails_in_both_drivers() {
    let combiner = SchemaCombiner::new(time_dimension());
    assert!(combine_seq(&combiner, Vec::new()).is_err());
    assert!(combine_par(&combiner, Vec::new(), None, None).is_err());
}

#[test]
fn conflicts_propagate_out_of_the_parallel_driver() {
    let combiner = SchemaCombiner::new(time_dimension());
    let mut fragments = daily_schema_set(8);
    fragments.push(daily_schema(3)); // position 3 claimed twice

    let err = combine_par(&combiner, fragments, Some(4), Some(2)).unwrap_err();
    assert!(matches!(err, CombineError::InconsistentIndex { .. }), "{err}");
}
