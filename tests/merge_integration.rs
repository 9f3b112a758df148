// Integration tests for part concatenation and the split runner
//
// Parts are written with arrow's ArrowWriter into temporary directories and
// read back with the parquet arrow reader.

use arrow::array::{Array, ArrayRef, Int32Array, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use partcat::config::{RuntimeConfig, SplitConfig};
use partcat::{concatenate, merge_splits, ConcatOptions, MergeError, Reconciliation, SplitStatus};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn xy_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("x", DataType::Int64, false),
        Field::new("y", DataType::Utf8, true),
    ]))
}

fn write_batch(path: &Path, batch: &RecordBatch) {
    let file = File::create(path).expect("create part");
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).expect("open writer");
    writer.write(batch).expect("write batch");
    writer.close().expect("close writer");
}

/// Write an {x: Int64, y: Utf8} part with x = start..start+rows and y = "{tag}-{i}".
fn write_xy_part(path: &Path, start: i64, rows: usize, tag: &str) {
    let xs: Vec<i64> = (start..start + rows as i64).collect();
    let ys: Vec<String> = (0..rows).map(|i| format!("{}-{}", tag, i)).collect();
    let batch = RecordBatch::try_new(
        xy_schema(),
        vec![
            Arc::new(Int64Array::from(xs)) as ArrayRef,
            Arc::new(StringArray::from(ys)) as ArrayRef,
        ],
    )
    .unwrap();
    write_batch(path, &batch);
}

fn read_output(path: &Path) -> (SchemaRef, Vec<RecordBatch>) {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path).unwrap()).unwrap();
    let schema = builder.schema().clone();
    let batches = builder
        .build()
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    (schema, batches)
}

fn column_values_i64(batches: &[RecordBatch], name: &str) -> Vec<i64> {
    batches
        .iter()
        .flat_map(|batch| {
            let column = batch.column_by_name(name).unwrap();
            let values = column.as_any().downcast_ref::<Int64Array>().unwrap();
            values.values().to_vec()
        })
        .collect()
}

fn column_strings(batches: &[RecordBatch], name: &str) -> Vec<Option<String>> {
    batches
        .iter()
        .flat_map(|batch| {
            let column = batch.column_by_name(name).unwrap();
            let values = column.as_any().downcast_ref::<StringArray>().unwrap();
            (0..values.len())
                .map(|i| (!values.is_null(i)).then(|| values.value(i).to_string()))
                .collect::<Vec<_>>()
        })
        .collect()
}

#[test]
fn test_concatenates_parts_in_order() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.parquet");
    let b = dir.path().join("b.parquet");
    write_xy_part(&a, 0, 10, "a");
    write_xy_part(&b, 100, 5, "b");

    let destination = dir.path().join("out.parquet");
    let report = concatenate(&[a, b], &destination, &ConcatOptions::default()).unwrap();

    assert_eq!(report.rows_written, 15);
    assert_eq!(report.parts.len(), 2);
    assert!(report
        .parts
        .iter()
        .all(|p| p.reconciliation == Reconciliation::Unchanged));
    assert_eq!(report.lossy_parts().count(), 0);
    assert_eq!(
        report.bytes_written,
        std::fs::metadata(&destination).unwrap().len()
    );

    let (schema, batches) = read_output(&destination);
    let names: Vec<_> = schema.fields().iter().map(|f| f.name().clone()).collect();
    assert_eq!(names, vec!["x", "y"]);

    let xs = column_values_i64(&batches, "x");
    assert_eq!(xs.len(), 15);
    assert_eq!(&xs[..10], &(0..10).collect::<Vec<_>>()[..]);
    assert_eq!(&xs[10..], &[100, 101, 102, 103, 104]);

    let ys = column_strings(&batches, "y");
    assert_eq!(ys[9].as_deref(), Some("a-9"));
    assert_eq!(ys[10].as_deref(), Some("b-0"));
}

#[test]
fn test_empty_part_list_does_not_create_destination() {
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("out.parquet");

    let err = concatenate(&[], &destination, &ConcatOptions::default()).unwrap_err();
    assert!(matches!(err, MergeError::NoInput { .. }));
    assert!(!destination.exists());
}

#[test]
fn test_subset_part_is_intersected_with_warning_outcome() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.parquet");
    let b = dir.path().join("b.parquet");
    write_xy_part(&a, 0, 3, "a");

    let x_only = Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, false)]));
    let batch = RecordBatch::try_new(x_only, vec![Arc::new(Int64Array::from(vec![7, 8]))]).unwrap();
    write_batch(&b, &batch);

    let destination = dir.path().join("out.parquet");
    let report = concatenate(&[a, b], &destination, &ConcatOptions::default()).unwrap();

    assert_eq!(
        report.parts[1].reconciliation,
        Reconciliation::Intersected {
            dropped: vec!["y".to_string()],
            ignored: vec![],
        }
    );
    assert_eq!(report.lossy_parts().count(), 1);
    assert_eq!(report.rows_written, 5);

    let (_, batches) = read_output(&destination);
    assert_eq!(column_values_i64(&batches, "x"), vec![0, 1, 2, 7, 8]);
    let ys = column_strings(&batches, "y");
    assert_eq!(ys[2].as_deref(), Some("a-2"));
    assert_eq!(ys[3], None);
    assert_eq!(ys[4], None);
}

#[test]
fn test_castable_part_is_cast_to_reference_types() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.parquet");
    let b = dir.path().join("b.parquet");
    write_xy_part(&a, 0, 2, "a");

    let narrow = Arc::new(Schema::new(vec![
        Field::new("x", DataType::Int32, false),
        Field::new("y", DataType::Utf8, true),
    ]));
    let batch = RecordBatch::try_new(
        narrow,
        vec![
            Arc::new(Int32Array::from(vec![40, 41])) as ArrayRef,
            Arc::new(StringArray::from(vec![Some("b-0"), None])) as ArrayRef,
        ],
    )
    .unwrap();
    write_batch(&b, &batch);

    let destination = dir.path().join("out.parquet");
    let report = concatenate(&[a, b], &destination, &ConcatOptions::default()).unwrap();
    assert_eq!(report.parts[1].reconciliation, Reconciliation::Cast);

    let (schema, batches) = read_output(&destination);
    assert_eq!(schema.field(0).data_type(), &DataType::Int64);
    assert_eq!(column_values_i64(&batches, "x"), vec![0, 1, 40, 41]);
}

#[test]
fn test_unrepresentable_part_is_skipped_and_run_continues() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.parquet");
    let b = dir.path().join("b.parquet");
    let c = dir.path().join("c.parquet");
    write_xy_part(&a, 0, 2, "a");
    write_xy_part(&c, 10, 2, "c");

    // No "x", which the reference declares non-nullable.
    let y_only = Arc::new(Schema::new(vec![Field::new("y", DataType::Utf8, true)]));
    let batch = RecordBatch::try_new(y_only, vec![Arc::new(StringArray::from(vec!["b-0"]))]).unwrap();
    write_batch(&b, &batch);

    let destination = dir.path().join("out.parquet");
    let report = concatenate(&[a, b, c], &destination, &ConcatOptions::default()).unwrap();

    assert!(matches!(
        report.parts[1].reconciliation,
        Reconciliation::Skipped { .. }
    ));
    assert_eq!(report.parts[1].rows, 1);
    assert_eq!(report.rows_written, 4);

    let (_, batches) = read_output(&destination);
    assert_eq!(column_values_i64(&batches, "x"), vec![0, 1, 10, 11]);
}

#[test]
fn test_rerun_overwrites_destination_deterministically() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.parquet");
    let b = dir.path().join("b.parquet");
    write_xy_part(&a, 0, 50, "a");
    write_xy_part(&b, 50, 50, "b");
    let parts = vec![a, b];

    let destination = dir.path().join("out.parquet");
    std::fs::write(&destination, b"stale contents").unwrap();

    let first = concatenate(&parts, &destination, &ConcatOptions::default()).unwrap();
    let first_bytes = std::fs::read(&destination).unwrap();
    let second = concatenate(&parts, &destination, &ConcatOptions::default()).unwrap();
    let second_bytes = std::fs::read(&destination).unwrap();

    assert_eq!(first.content_hash, second.content_hash);
    assert_eq!(first_bytes, second_bytes);
    assert_eq!(&first_bytes[0..4], b"PAR1");
    assert_eq!(
        first.content_hash,
        blake3::hash(&first_bytes).to_hex().to_string()
    );
}

#[test]
fn test_provenance_column_records_source_part() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("part-0.parquet");
    let b = dir.path().join("part-1.parquet");
    write_xy_part(&a, 0, 2, "a");
    write_xy_part(&b, 2, 1, "b");

    let options = ConcatOptions {
        provenance_column: Some("source_file".to_string()),
        ..ConcatOptions::default()
    };
    let destination = dir.path().join("out.parquet");
    concatenate(&[a, b], &destination, &options).unwrap();

    let (schema, batches) = read_output(&destination);
    assert_eq!(schema.fields().len(), 3);
    let sources = column_strings(&batches, "source_file");
    assert_eq!(
        sources,
        vec![
            Some("part-0.parquet".to_string()),
            Some("part-0.parquet".to_string()),
            Some("part-1.parquet".to_string()),
        ]
    );
}

fn split_config(output_dir: &Path) -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.output.dir = output_dir.to_string_lossy().to_string();
    config
}

#[test]
fn test_empty_split_is_skipped_and_sibling_is_produced() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let train = root.path().join("train_parts");
    std::fs::create_dir(&train).unwrap();
    std::fs::create_dir(root.path().join("test_parts")).unwrap();
    write_xy_part(&train.join("part-00000.parquet"), 0, 4, "t0");
    write_xy_part(&train.join("part-00001.parquet"), 4, 4, "t1");

    let outcomes = merge_splits(root.path(), &split_config(out.path())).unwrap();
    assert_eq!(outcomes.len(), 2);

    match &outcomes[0].status {
        SplitStatus::Merged { report } => assert_eq!(report.rows_written, 8),
        other => panic!("expected train to merge, got {:?}", other),
    }
    assert!(matches!(outcomes[1].status, SplitStatus::Skipped { .. }));
    assert!(out.path().join("train.parquet").exists());
    assert!(!out.path().join("test.parquet").exists());
}

#[test]
fn test_missing_split_directory_fails_only_that_split() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let test = root.path().join("test_parts");
    std::fs::create_dir(&test).unwrap();
    write_xy_part(&test.join("part-00000.parquet"), 0, 3, "t");

    let outcomes = merge_splits(root.path(), &split_config(out.path())).unwrap();
    assert!(outcomes[0].is_failed());
    assert!(matches!(outcomes[1].status, SplitStatus::Merged { .. }));
    assert!(out.path().join("test.parquet").exists());
}

#[test]
fn test_missing_root_is_fatal() {
    let out = TempDir::new().unwrap();
    let missing: PathBuf = out.path().join("nope");
    let err = merge_splits(&missing, &split_config(out.path())).unwrap_err();
    assert!(matches!(err, MergeError::InputNotFound { .. }));
}

#[test]
fn test_custom_splits_and_output_directory_creation() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let val = root.path().join("val_parts");
    std::fs::create_dir(&val).unwrap();
    write_xy_part(&val.join("0.parquet"), 0, 2, "v");

    let nested_output = out.path().join("nested").join("merged");
    let mut config = split_config(&nested_output);
    config.merge.splits = vec![SplitConfig::new("val", "val_parts", "val.parquet")];

    let outcomes = merge_splits(root.path(), &config).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(nested_output.join("val.parquet").exists());

    let json = serde_json::to_value(&outcomes).unwrap();
    assert_eq!(json[0]["status"], "merged");
    assert_eq!(json[0]["report"]["rows_written"], 2);
    assert_eq!(json[0]["report"]["parts"][0]["reconciliation"]["kind"], "unchanged");
}
