use anyhow::Result;
use chunkforge::testing::*;
use chunkforge::*;

/// Fragment at `position` along `time` contributing `chunks` time-chunks of
/// a one-dimensional `var` array.
fn var_fragment(position: i64, chunks: u64) -> Indexed<ReferenceFragment> {
    let mut fragment = ReferenceFragment::new().with_array("var", vec!["time".into()]);
    for local in 0..chunks {
        fragment = fragment.with_ref(
            ChunkKey::new("var", vec![local]),
            ChunkLocation::file_range(format!("frag-{position}.nc"), 100 * local, 100),
        );
    }
    (time_index(position), fragment)
}

#[test]
fn offsets_accumulate_over_preceding_fragments() -> Result<()> {
    let combiner = ManifestCombiner::new(vec!["time".into()], vec![]);
    let manifest = combine_seq(
        &combiner,
        vec![var_fragment(0, 2), var_fragment(1, 3), var_fragment(2, 1)],
    )?;

    let keys: Vec<String> = manifest.keys().collect();
    assert_eq!(keys, ["var/0", "var/1", "var/2", "var/3", "var/4", "var/5"]);

    // fragment boundaries at 0, 2, 5
    assert_eq!(
        manifest.get("var/2"),
        Some(&ChunkLocation::file_range("frag-1.nc", 0, 100))
    );
    assert_eq!(
        manifest.get("var/5"),
        Some(&ChunkLocation::file_range("frag-2.nc", 0, 100))
    );
    Ok(())
}

#[test]
fn fold_order_does_not_change_the_manifest() -> Result<()> {
    let combiner = ManifestCombiner::new(vec!["time".into()], vec![]);
    let forward = combine_seq(
        &combiner,
        vec![var_fragment(0, 2), var_fragment(1, 3), var_fragment(2, 1)],
    )?;
    let shuffled = combine_seq(
        &combiner,
        vec![var_fragment(2, 1), var_fragment(0, 2), var_fragment(1, 3)],
    )?;

    assert_same_manifest(&forward, &shuffled);
    Ok(())
}

#[test]
fn interleaved_groupings_merge_associatively() -> Result<()> {
    let combiner = ManifestCombiner::new(vec!["time".into()], vec![]);

    // group A holds positions {0, 2}, group B holds {1}
    let mut a = combiner.create_accumulator();
    a = combiner.add_input(a, var_fragment(0, 2))?;
    a = combiner.add_input(a, var_fragment(2, 1))?;
    let b = combiner.add_input(combiner.create_accumulator(), var_fragment(1, 3))?;

    let merged = combiner.merge_accumulators(vec![a, b])?;
    assert_eq!(merged.len(), 2);
    assert_eq!(merged.iter().map(RefGroup::len).sum::<usize>(), 6);
    let grouped = combiner.extract_output(merged)?;

    let direct = combine_seq(
        &combiner,
        vec![var_fragment(0, 2), var_fragment(1, 3), var_fragment(2, 1)],
    )?;
    assert_same_manifest(&grouped, &direct);
    Ok(())
}

#[test]
fn merging_a_single_accumulator_returns_it_unchanged() -> Result<()> {
    let combiner = ManifestCombiner::new(vec!["time".into()], vec![]);
    let mut acc = combiner.create_accumulator();
    acc = combiner.add_input(acc, var_fragment(0, 2))?;
    acc = combiner.add_input(acc, var_fragment(1, 1))?;

    let merged = combiner.merge_accumulators(vec![acc.clone()])?;
    assert_eq!(merged, acc);
    Ok(())
}

#[test]
fn extract_is_idempotent() -> Result<()> {
    let combiner = ManifestCombiner::new(vec!["time".into()], vec!["lat".into(), "lon".into()]);
    let mut acc = combiner.create_accumulator();
    for fragment in daily_ref_set(4) {
        acc = combiner.add_input(acc, fragment)?;
    }

    let first = combiner.extract_output(acc.clone())?;
    let second = combiner.extract_output(acc)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn shared_coordinate_arrays_collapse_to_one_reference() -> Result<()> {
    let combiner = ManifestCombiner::new(vec!["time".into()], vec!["lat".into(), "lon".into()]);
    let manifest = combine_seq(&combiner, daily_ref_set(3))?;

    let keys: Vec<String> = manifest.keys().collect();
    assert_eq!(
        keys,
        [
            "lat/0",
            "lon/0",
            "temperature/0.0.0",
            "temperature/1.0.0",
            "temperature/2.0.0",
        ]
    );
    assert_eq!(manifest.array_dims("temperature"), Some(&["time".to_string(), "lat".into(), "lon".into()][..]));
    Ok(())
}

#[test]
fn same_position_from_two_fragments_is_inconsistent() {
    let combiner = ManifestCombiner::new(vec!["time".into()], vec![]);
    let err = combine_seq(&combiner, vec![var_fragment(0, 2), var_fragment(0, 1)]).unwrap_err();
    assert!(
        matches!(
            err,
            CombineError::InconsistentIndex { position: 0, .. }
        ),
        "{err}"
    );
}

#[test]
fn duplicate_keys_with_different_locations_are_rejected() {
    // pure union: no concatenation dimensions at all
    let combiner = ManifestCombiner::new(vec![], vec![]);
    let fragment = |path: &str| {
        (
            Index::new(),
            ReferenceFragment::new()
                .with_array("var", vec!["x".into()])
                .with_ref(
                    ChunkKey::new("var", vec![0]),
                    ChunkLocation::file_range(path, 0, 64),
                ),
        )
    };

    let err = combine_seq(&combiner, vec![fragment("a.nc"), fragment("b.nc")]).unwrap_err();
    assert!(matches!(err, CombineError::DuplicateKey { .. }), "{err}");
}

#[test]
fn equal_duplicate_keys_union_silently() -> Result<()> {
    let combiner = ManifestCombiner::new(vec![], vec![]);
    let fragment = || {
        (
            Index::new(),
            ReferenceFragment::new()
                .with_array("var", vec!["x".into()])
                .with_ref(
                    ChunkKey::new("var", vec![0]),
                    ChunkLocation::file_range("same.nc", 0, 64),
                ),
        )
    };

    let manifest = combine_seq(&combiner, vec![fragment(), fragment()])?;
    assert_eq!(manifest.len(), 1);
    Ok(())
}

#[test]
fn identical_dimension_content_must_agree() {
    let combiner = ManifestCombiner::new(vec!["time".into()], vec!["lat".into()]);
    let fragment = |position: i64, lat_bytes: &[u8]| {
        (
            time_index(position),
            ReferenceFragment::new()
                .with_array("var", vec!["time".into()])
                .with_array("lat", vec!["lat".into()])
                .with_ref(
                    ChunkKey::new("var", vec![0]),
                    ChunkLocation::file_range(format!("f{position}.nc"), 0, 10),
                )
                .with_ref(ChunkKey::new("lat", vec![0]), ChunkLocation::inline(lat_bytes)),
        )
    };

    let err = combine_seq(
        &combiner,
        vec![fragment(0, b"north-up"), fragment(1, b"south-up")],
    )
    .unwrap_err();
    assert!(matches!(err, CombineError::SchemaConflict { .. }), "{err}");
}

#[test]
fn missing_concat_dimension_is_rejected_without_precombine() {
    let combiner = ManifestCombiner::new(vec!["time".into()], vec!["lat".into()]);
    let snapshot = (
        time_index(0),
        ReferenceFragment::new()
            .with_array("var", vec!["lat".into(), "lon".into()])
            .with_ref(
                ChunkKey::new("var", vec![0, 0]),
                ChunkLocation::file_range("snap.nc", 0, 100),
            ),
    );

    let err = combine_seq(&combiner, vec![snapshot]).unwrap_err();
    assert!(
        matches!(err, CombineError::MissingDimension { ref dimension, .. } if dimension == "time"),
        "{err}"
    );
}

#[test]
fn precombine_inserts_the_missing_dimension() -> Result<()> {
    let combiner = ManifestCombiner::new(vec!["time".into()], vec!["lat".into(), "lon".into()])
        .with_precombine_inputs(true);
    let snapshot = |position: i64| {
        (
            time_index(position),
            ReferenceFragment::new()
                .with_array("var", vec!["lat".into(), "lon".into()])
                .with_ref(
                    ChunkKey::new("var", vec![0, 0]),
                    ChunkLocation::file_range(format!("snap-{position}.nc"), 0, 100),
                ),
        )
    };

    let manifest = combine_seq(&combiner, vec![snapshot(0), snapshot(1)])?;
    let keys: Vec<String> = manifest.keys().collect();
    assert_eq!(keys, ["var/0.0.0", "var/1.0.0"]);
    assert_eq!(
        manifest.array_dims("var"),
        Some(&["time".to_string(), "lat".into(), "lon".into()][..])
    );
    Ok(())
}

#[test]
fn consolidation_unions_records_from_one_file() -> Result<()> {
    let combiner = ManifestCombiner::new(vec!["time".into()], vec![]);
    let records = vec![
        ReferenceFragment::new()
            .with_array("temperature", vec!["time".into()])
            .with_ref(
                ChunkKey::new("temperature", vec![0]),
                ChunkLocation::file_range("multi.grib2", 0, 512),
            ),
        ReferenceFragment::new()
            .with_array("humidity", vec!["time".into()])
            .with_ref(
                ChunkKey::new("humidity", vec![0]),
                ChunkLocation::file_range("multi.grib2", 512, 512),
            ),
    ];

    let consolidated = combiner.consolidate_records(records, time_index(0))?;
    assert_eq!(consolidated.1.len(), 2);

    let manifest = combine_seq(&combiner, vec![consolidated, var_fragment(1, 1)])?;
    assert!(manifest.get("temperature/0").is_some());
    assert!(manifest.get("humidity/0").is_some());
    Ok(())
}

#[test]
fn consolidation_rejects_conflicting_records() {
    let combiner = ManifestCombiner::new(vec!["time".into()], vec![]);
    let record = |offset: u64| {
        ReferenceFragment::new()
            .with_array("var", vec!["time".into()])
            .with_ref(
                ChunkKey::new("var", vec![0]),
                ChunkLocation::file_range("multi.grib2", offset, 512),
            )
    };

    let err = combiner
        .consolidate_records(vec![record(0), record(512)], time_index(0))
        .unwrap_err();
    assert!(matches!(err, CombineError::DuplicateKey { .. }), "{err}");
}

#[test]
fn references_for_undeclared_arrays_are_rejected() {
    let combiner = ManifestCombiner::new(vec!["time".into()], vec![]);
    let fragment = (
        time_index(0),
        ReferenceFragment::new().with_ref(
            ChunkKey::new("ghost", vec![0]),
            ChunkLocation::file_range("f.nc", 0, 8),
        ),
    );

    let err = combine_seq(&combiner, vec![fragment]).unwrap_err();
    assert!(matches!(err, CombineError::SchemaConflict { .. }), "{err}");
}

#[test]
fn empty_reduction_yields_an_empty_manifest() -> Result<()> {
    let combiner = ManifestCombiner::new(vec!["time".into()], vec![]);
    let manifest = combine_seq(&combiner, Vec::new())?;
    assert!(manifest.is_empty());
    Ok(())
}

#[test]
fn two_concat_dimensions_offset_independently() -> Result<()> {
    let combiner = ManifestCombiner::new(vec!["time".into(), "level".into()], vec![]);
    let fragment = |t: i64, l: i64| {
        let index = Index::new()
            .with(Dimension::concat("time"), t)
            .with(Dimension::concat("level"), l);
        (
            index,
            ReferenceFragment::new()
                .with_array("var", vec!["time".into(), "level".into()])
                .with_ref(
                    ChunkKey::new("var", vec![0, 0]),
                    ChunkLocation::file_range(format!("t{t}-l{l}.nc"), 0, 100),
                ),
        )
    };

    // full 2x2 grid: fragments share a time position across different
    // level positions, which is not a tie
    let manifest = combine_seq(
        &combiner,
        vec![fragment(0, 0), fragment(0, 1), fragment(1, 0), fragment(1, 1)],
    )?;

    let keys: Vec<String> = manifest.keys().collect();
    assert_eq!(keys, ["var/0.0", "var/0.1", "var/1.0", "var/1.1"]);
    assert_eq!(
        manifest.get("var/1.0"),
        Some(&ChunkLocation::file_range("t1-l0.nc", 0, 100))
    );

    // the same tuple twice is a tie
    let err = combine_seq(&combiner, vec![fragment(0, 0), fragment(0, 0)]).unwrap_err();
    assert!(matches!(err, CombineError::InconsistentIndex { .. }), "{err}");
    Ok(())
}
