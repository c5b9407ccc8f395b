use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, DictionaryArray, Float64Array, Int32Array, StringArray};
use arrow::datatypes::Int32Type;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use tempfile::TempDir;
use trade_volume::data::aggregate::{DEFAULT_ROOT_COLUMN, DEFAULT_SYMBOL_COLUMN};
use trade_volume::data::manifest::{discover_partitions, DEFAULT_PARTITION_PREFIX};
use trade_volume::{AggregateOptions, ErrorKind, Manifest, ParquetReader, VolumeAggregator};

fn write_parquet(path: &Path, batch: &RecordBatch) {
    let file = File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(batch).unwrap();
    writer.close().unwrap();
}

fn trades(rows: &[(&str, f64)]) -> RecordBatch {
    let syms: StringArray = rows.iter().map(|(s, _)| Some(*s)).collect();
    let vols: Float64Array = rows.iter().map(|(_, v)| Some(*v)).collect();
    RecordBatch::try_from_iter(vec![
        ("sym_suffix", Arc::new(syms) as ArrayRef),
        ("n_trades", Arc::new(vols) as ArrayRef),
    ])
    .unwrap()
}

/// Write each batch as `sym_root=<name>/part-0.parquet` under a fresh root
/// and return the root with the file locations, in the given order.
fn dataset(parts: &[(&str, RecordBatch)]) -> (TempDir, Vec<String>) {
    let dir = tempfile::tempdir().unwrap();
    let mut locations = Vec::new();
    for (name, batch) in parts {
        let part_dir = dir.path().join(format!("{DEFAULT_PARTITION_PREFIX}{name}"));
        std::fs::create_dir(&part_dir).unwrap();
        let path = part_dir.join("part-0.parquet");
        write_parquet(&path, batch);
        locations.push(path.to_str().unwrap().to_string());
    }
    (dir, locations)
}

fn pairs(report: &trade_volume::VolumeReport) -> Vec<(String, i64)> {
    report.clone().into_pairs()
}

fn expected(items: &[(&str, i64)]) -> Vec<(String, i64)> {
    items.iter().map(|(s, t)| (s.to_string(), *t)).collect()
}

#[test]
fn partition_order_does_not_change_totals() {
    let (_dir, locs) = dataset(&[
        ("A", trades(&[("AAPL", 10.0), ("MSFT", 5.0)])),
        ("B", trades(&[("AAPL", 7.0)])),
    ]);
    let agg = VolumeAggregator::new(ParquetReader);

    let forward = agg.aggregate(&locs).unwrap();
    let reversed: Vec<_> = locs.iter().rev().cloned().collect();
    let backward = agg.aggregate(&reversed).unwrap();

    assert_eq!(pairs(&forward), expected(&[("AAPL", 17), ("MSFT", 5)]));
    assert_eq!(forward, backward);
    assert_eq!(agg.aggregate(&locs).unwrap(), forward);
}

#[test]
fn parallel_and_sequential_agree_on_real_files() {
    let (_dir, locs) = dataset(&[
        ("A", trades(&[("X", 1.0), ("Y", 2.0), ("X", 3.0)])),
        ("B", trades(&[])),
        ("C", trades(&[("Y", 4.5), ("Z", 0.5)])),
        ("D", trades(&[("X", 100.0)])),
    ]);
    let agg = VolumeAggregator::new(ParquetReader);

    let seq = agg.aggregate(&locs).unwrap();
    let par = agg.aggregate_parallel(&locs).unwrap();
    assert_eq!(seq, par);
    assert_eq!(pairs(&seq), expected(&[("X", 104), ("Y", 6), ("Z", 0)]));
    assert_eq!(seq.stats().partitions, 4);
    assert_eq!(seq.stats().rows, 6);
}

#[test]
fn missing_partition_fails_the_whole_run() {
    let (dir, mut locs) = dataset(&[("A", trades(&[("AAPL", 1.0)]))]);
    let ghost: PathBuf = dir.path().join("sym_root=GHOST").join("part-0.parquet");
    locs.push(ghost.to_str().unwrap().to_string());

    let err = VolumeAggregator::new(ParquetReader)
        .aggregate(&locs)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
    assert_eq!(err.partition(), ghost.to_str().unwrap());
}

#[test]
fn partition_without_volume_column_is_a_schema_mismatch() {
    let no_volume = RecordBatch::try_from_iter(vec![(
        "sym_suffix",
        Arc::new(StringArray::from(vec!["AAPL"])) as ArrayRef,
    )])
    .unwrap();
    let (_dir, locs) = dataset(&[("A", trades(&[("AAPL", 1.0)])), ("B", no_volume)]);

    let err = VolumeAggregator::new(ParquetReader)
        .aggregate(&locs)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    assert_eq!(err.partition(), locs[1]);
}

#[test]
fn dictionary_symbols_and_integer_volumes_round_trip_through_parquet() {
    let syms: DictionaryArray<Int32Type> =
        vec![Some("A"), Some("B"), None, Some("A")].into_iter().collect();
    let batch = RecordBatch::try_from_iter(vec![
        ("sym_suffix", Arc::new(syms) as ArrayRef),
        ("n_trades", Arc::new(Int32Array::from(vec![1, 2, 3, 4])) as ArrayRef),
    ])
    .unwrap();
    let (_dir, locs) = dataset(&[("P", batch)]);

    let report = VolumeAggregator::new(ParquetReader).aggregate(&locs).unwrap();
    assert_eq!(pairs(&report), expected(&[("", 3), ("A", 5), ("B", 2)]));
}

#[test]
fn discovered_manifest_drives_aggregation() {
    let (dir, _locs) = dataset(&[
        ("MSFT", trades(&[("", 5.0)])),
        ("AAPL", trades(&[("", 10.0), ("", 7.0)])),
    ]);

    let found = discover_partitions(dir.path(), DEFAULT_PARTITION_PREFIX).unwrap();
    let manifest_path = dir.path().join("manifest.json");
    Manifest::from_discovered(&found).save(&manifest_path).unwrap();

    let manifest = Manifest::load(&manifest_path).unwrap();
    assert_eq!(manifest.len(), 2);
    let report = VolumeAggregator::new(ParquetReader)
        .aggregate(manifest.partitions())
        .unwrap();
    assert_eq!(pairs(&report), expected(&[("", 22)]));
}

#[test]
fn partition_directories_are_valid_locations() {
    let (dir, _locs) = dataset(&[("A", trades(&[("Q", 2.0)]))]);
    let part_dir = dir.path().join("sym_root=A");
    write_parquet(&part_dir.join("part-1.parquet"), &trades(&[("Q", 3.0)]));

    let report = VolumeAggregator::new(ParquetReader)
        .aggregate(&[part_dir.to_str().unwrap()])
        .unwrap();
    assert_eq!(report.get("Q"), Some(5));
}

#[test]
fn directory_names_supply_the_root_of_composite_keys() {
    let (_dir, locs) = dataset(&[
        ("BRK", trades(&[("A", 1.0), ("B", 2.0)])),
        ("PBR", trades(&[("A", 4.0), ("", 3.0)])),
    ]);
    let options = AggregateOptions {
        key_columns: vec![DEFAULT_ROOT_COLUMN.into(), DEFAULT_SYMBOL_COLUMN.into()],
        ..AggregateOptions::default()
    };

    let report = VolumeAggregator::with_options(ParquetReader, options)
        .aggregate(&locs)
        .unwrap();
    assert_eq!(
        pairs(&report),
        expected(&[("BRK.A", 1), ("BRK.B", 2), ("PBR.", 3), ("PBR.A", 4)])
    );
}
