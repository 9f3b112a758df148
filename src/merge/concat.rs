//! Schema-reconciling concatenation of Parquet part files.
//!
//! Parts are read in the order given. The first part's schema becomes the
//! reference schema of the output; every later part is reconciled against it
//! (see [`SchemaReconciler`]) and appended. Output is written to a temporary
//! file beside the destination and renamed into place only after the Parquet
//! footer has been written and synced, so a failed merge never leaves a
//! truncated file at the destination.

use super::encoding::writer_properties;
use super::error::{MergeError, Result};
use super::reconcile::{Reconciliation, SchemaReconciler};
use crate::config::{ParquetConfig, RuntimeConfig};
use crate::space::{self, SpaceCheck};
use arrow::array::{ArrayRef, RecordBatch, RecordBatchOptions, StringArray};
use arrow::datatypes::{DataType, Field, FieldRef, Schema, SchemaRef};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Settings for a single concatenation, resolved once by the caller.
#[derive(Debug, Clone)]
pub struct ConcatOptions {
    pub parquet: ParquetConfig,
    /// Rows per record batch when reading parts
    pub batch_size: usize,
    pub low_space_ratio: f64,
    /// Name of a Utf8 column recording each row's source part file
    pub provenance_column: Option<String>,
}

impl Default for ConcatOptions {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}

impl ConcatOptions {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            parquet: config.parquet.clone(),
            batch_size: config.merge.batch_size,
            low_space_ratio: config.merge.low_space_ratio,
            provenance_column: config.merge.provenance_column.clone(),
        }
    }
}

/// Per-part entry of a [`MergeReport`].
#[derive(Debug, Clone, Serialize)]
pub struct PartReport {
    pub path: PathBuf,
    /// Rows read from the part
    pub rows: u64,
    pub reconciliation: Reconciliation,
}

/// Summary of a finalized merge.
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub destination: PathBuf,
    pub rows_written: u64,
    pub bytes_written: u64,
    /// blake3 digest of the output file, hex encoded
    pub content_hash: String,
    pub space: SpaceCheck,
    pub parts: Vec<PartReport>,
}

impl MergeReport {
    /// Parts whose rows or columns did not reach the output intact.
    pub fn lossy_parts(&self) -> impl Iterator<Item = &PartReport> {
        self.parts.iter().filter(|p| p.reconciliation.is_lossy())
    }
}

/// Concatenate `parts`, in order, into a single Parquet file at `destination`.
///
/// An empty `parts` list fails with [`MergeError::NoInput`] without touching
/// the destination. An existing destination file is replaced.
pub fn concatenate(
    parts: &[PathBuf],
    destination: &Path,
    options: &ConcatOptions,
) -> Result<MergeReport> {
    let Some((first, rest)) = parts.split_first() else {
        warn!(destination = %destination.display(), "No part files found");
        return Err(MergeError::no_input(destination));
    };

    let output_dir = parent_dir(destination);
    let space = space::check(parts, output_dir, options.low_space_ratio)?;
    info!(
        parts = parts.len(),
        input_bytes = space.input_bytes,
        available_bytes = ?space.available_bytes,
        destination = %destination.display(),
        "Found parts"
    );

    info!(part = %file_name(first), "Reading schema");
    let (reference, first_batches) = read_part(first, options.batch_size)?;
    let reconciler = SchemaReconciler::new(reference);

    let mut sink = OutputSink::create(destination, reconciler.reference(), options)?;
    let mut reports = Vec::with_capacity(parts.len());

    info!(part = %file_name(first), destination = %destination.display(), "Writing part");
    let rows = sink.append(first, &first_batches)?;
    reports.push(PartReport {
        path: first.clone(),
        rows,
        reconciliation: Reconciliation::Unchanged,
    });

    for path in rest {
        info!(part = %file_name(path), "Appending part");
        let (schema, batches) = read_part(path, options.batch_size)?;
        let rows: u64 = batches.iter().map(|b| b.num_rows() as u64).sum();
        let part = reconciler.reconcile(&schema, batches);

        match &part.reconciliation {
            Reconciliation::Unchanged => {}
            Reconciliation::Cast => {
                debug!(part = %file_name(path), "Cast part to reference schema");
            }
            Reconciliation::Intersected { dropped, ignored } => {
                warn!(
                    part = %file_name(path),
                    dropped = ?dropped,
                    ignored = ?ignored,
                    "Schema mismatch, aligning columns"
                );
            }
            Reconciliation::Skipped { reason } => {
                warn!(
                    part = %file_name(path),
                    reason = %reason,
                    rows,
                    "Schema mismatch, part not written"
                );
            }
        }

        sink.append(path, &part.batches)?;
        reports.push(PartReport {
            path: path.clone(),
            rows,
            reconciliation: part.reconciliation,
        });
    }

    let finished = sink.finish(destination)?;
    info!(
        destination = %destination.display(),
        rows = finished.rows,
        bytes = finished.bytes,
        "Merge complete"
    );

    Ok(MergeReport {
        destination: destination.to_path_buf(),
        rows_written: finished.rows,
        bytes_written: finished.bytes,
        content_hash: finished.content_hash,
        space,
        parts: reports,
    })
}

fn read_part(path: &Path, batch_size: usize) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let file = File::open(path).map_err(|e| MergeError::read_failure(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| MergeError::read_failure(path, e))?;
    let schema = builder.schema().clone();
    let reader = builder
        .with_batch_size(batch_size)
        .build()
        .map_err(|e| MergeError::read_failure(path, e))?;

    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| MergeError::read_failure(path, e))?;
    Ok((schema, batches))
}

/// Streams bytes to the inner writer while hashing them.
struct HashingWriter<W> {
    inner: W,
    hasher: blake3::Hasher,
    bytes: u64,
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        self.bytes += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct FinishedOutput {
    rows: u64,
    bytes: u64,
    content_hash: String,
}

/// The open output writer. Dropping it without `finish` closes and deletes
/// the temporary file.
struct OutputSink {
    writer: ArrowWriter<HashingWriter<NamedTempFile>>,
    schema: SchemaRef,
    provenance: bool,
    rows: u64,
}

impl OutputSink {
    fn create(destination: &Path, reference: &SchemaRef, options: &ConcatOptions) -> Result<Self> {
        let schema = output_schema(reference, options.provenance_column.as_deref())?;

        let temp = tempfile::Builder::new()
            .prefix(".partcat-")
            .suffix(".tmp")
            .tempfile_in(parent_dir(destination))
            .map_err(|e| MergeError::write_failure(destination, e))?;
        debug!(temp = %temp.path().display(), "Opened temporary output");

        let sink = HashingWriter {
            inner: temp,
            hasher: blake3::Hasher::new(),
            bytes: 0,
        };
        let props = writer_properties(&options.parquet);
        let writer = ArrowWriter::try_new(sink, schema.clone(), Some(props))
            .map_err(|e| MergeError::write_failure(destination, e))?;

        Ok(Self {
            writer,
            schema,
            provenance: options.provenance_column.is_some(),
            rows: 0,
        })
    }

    /// Append batches already conforming to the reference schema. Returns the rows written.
    fn append(&mut self, source: &Path, batches: &[RecordBatch]) -> Result<u64> {
        let mut rows = 0u64;
        for batch in batches {
            let batch = if self.provenance {
                self.with_provenance(batch, source)?
            } else {
                batch.clone()
            };
            self.writer
                .write(&batch)
                .map_err(|e| MergeError::write_failure(source, e))?;
            rows += batch.num_rows() as u64;
        }
        self.rows += rows;
        Ok(rows)
    }

    fn with_provenance(&self, batch: &RecordBatch, source: &Path) -> Result<RecordBatch> {
        let name = file_name(source);
        let mut columns = batch.columns().to_vec();
        let sources: ArrayRef = Arc::new(StringArray::from(vec![name.as_str(); batch.num_rows()]));
        columns.push(sources);
        RecordBatch::try_new_with_options(
            self.schema.clone(),
            columns,
            &RecordBatchOptions::new().with_row_count(Some(batch.num_rows())),
        )
        .map_err(|e| MergeError::write_failure(source, e))
    }

    /// Write the footer, sync, and move the temporary file onto `destination`.
    fn finish(self, destination: &Path) -> Result<FinishedOutput> {
        let Self { writer, rows, .. } = self;

        let HashingWriter {
            inner: mut temp,
            hasher,
            bytes,
        } = writer
            .into_inner()
            .map_err(|e| MergeError::write_failure(destination, e))?;

        temp.flush()
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| MergeError::write_failure(destination, e))?;
        temp.persist(destination)
            .map_err(|e| MergeError::write_failure(destination, e.error))?;

        Ok(FinishedOutput {
            rows,
            bytes,
            content_hash: hasher.finalize().to_hex().to_string(),
        })
    }
}

fn output_schema(reference: &SchemaRef, provenance_column: Option<&str>) -> Result<SchemaRef> {
    let Some(column) = provenance_column else {
        return Ok(reference.clone());
    };

    if reference.index_of(column).is_ok() {
        return Err(MergeError::invalid_config(format!(
            "provenance column '{}' collides with an existing column",
            column
        )));
    }

    let mut fields: Vec<FieldRef> = reference.fields().iter().cloned().collect();
    fields.push(Arc::new(Field::new(column, DataType::Utf8, false)));
    Ok(Arc::new(Schema::new_with_metadata(
        fields,
        reference.metadata().clone(),
    )))
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
