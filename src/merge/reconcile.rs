//! Schema reconciliation against the reference schema.
//!
//! Every part after the first is brought into the reference schema in two
//! steps. A part whose columns carry the reference names in the same order is
//! cast column by column; a failed cast (or a different set of names) falls
//! back to intersecting columns by name, with the reference columns the part
//! cannot supply filled with nulls.

use arrow::array::{new_null_array, Array, ArrayRef, RecordBatch, RecordBatchOptions};
use arrow::compute::kernels::cast::{can_cast_types, cast_with_options, CastOptions};
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use serde::Serialize;
use tracing::debug;

/// How a part was brought into the reference schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reconciliation {
    /// Schema already matched the reference.
    Unchanged,
    /// Columns were cast to the reference types.
    Cast,
    /// Only the shared columns were kept.
    Intersected {
        /// Reference columns written as nulls for this part's rows
        dropped: Vec<String>,
        /// Part columns that do not exist in the reference schema
        ignored: Vec<String>,
    },
    /// The part could not be represented in the reference schema and was not written.
    Skipped { reason: String },
}

impl Reconciliation {
    /// True when rows or columns of the part did not reach the output intact.
    pub fn is_lossy(&self) -> bool {
        matches!(self, Self::Intersected { .. } | Self::Skipped { .. })
    }
}

/// A part's record batches after reconciliation, conforming to the reference schema.
#[derive(Debug)]
pub struct ReconciledPart {
    pub reconciliation: Reconciliation,
    pub batches: Vec<RecordBatch>,
}

impl ReconciledPart {
    fn skipped(reason: String) -> Self {
        Self {
            reconciliation: Reconciliation::Skipped { reason },
            batches: Vec::new(),
        }
    }
}

pub struct SchemaReconciler {
    reference: SchemaRef,
}

impl SchemaReconciler {
    pub fn new(reference: SchemaRef) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> &SchemaRef {
        &self.reference
    }

    /// Bring `batches`, read under `schema`, into the reference schema.
    pub fn reconcile(&self, schema: &Schema, batches: Vec<RecordBatch>) -> ReconciledPart {
        if names_match(schema, &self.reference) {
            let identical = fields_match(schema, &self.reference);
            match batches
                .iter()
                .map(|batch| self.cast_batch(batch))
                .collect::<Result<Vec<_>, ArrowError>>()
            {
                Ok(cast) => {
                    let reconciliation = if identical {
                        Reconciliation::Unchanged
                    } else {
                        Reconciliation::Cast
                    };
                    return ReconciledPart {
                        reconciliation,
                        batches: cast,
                    };
                }
                Err(e) => debug!(error = %e, "Cast to reference schema failed"),
            }
        }

        self.intersect(schema, &batches)
    }

    fn cast_batch(&self, batch: &RecordBatch) -> Result<RecordBatch, ArrowError> {
        let columns = self
            .reference
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(field, column)| cast_column(column, field))
            .collect::<Result<Vec<_>, _>>()?;
        conform(&self.reference, columns, batch.num_rows())
    }

    fn intersect(&self, schema: &Schema, batches: &[RecordBatch]) -> ReconciledPart {
        // Column-major: one Vec of arrays (one per batch) per reference field.
        let mut columns: Vec<Vec<ArrayRef>> = Vec::with_capacity(self.reference.fields().len());
        let mut dropped = Vec::new();

        for field in self.reference.fields() {
            let kept = schema.index_of(field.name()).ok().and_then(|index| {
                batches
                    .iter()
                    .map(|batch| cast_column(batch.column(index), field))
                    .collect::<Result<Vec<_>, _>>()
                    .ok()
            });

            match kept {
                Some(arrays) => columns.push(arrays),
                None if field.is_nullable() => {
                    dropped.push(field.name().clone());
                    columns.push(
                        batches
                            .iter()
                            .map(|batch| new_null_array(field.data_type(), batch.num_rows()))
                            .collect(),
                    );
                }
                None => {
                    return ReconciledPart::skipped(format!(
                        "required column '{}' is missing or incompatible",
                        field.name()
                    ));
                }
            }
        }

        let width = self.reference.fields().len();
        if width > 0 && dropped.len() == width {
            return ReconciledPart::skipped(
                "no columns in common with the reference schema".to_string(),
            );
        }

        let ignored = schema
            .fields()
            .iter()
            .filter(|field| self.reference.index_of(field.name()).is_err())
            .map(|field| field.name().clone())
            .collect();

        let mut reconciled = Vec::with_capacity(batches.len());
        for (i, batch) in batches.iter().enumerate() {
            let batch_columns = columns.iter().map(|arrays| arrays[i].clone()).collect();
            match conform(&self.reference, batch_columns, batch.num_rows()) {
                Ok(batch) => reconciled.push(batch),
                Err(e) => return ReconciledPart::skipped(e.to_string()),
            }
        }

        ReconciledPart {
            reconciliation: Reconciliation::Intersected { dropped, ignored },
            batches: reconciled,
        }
    }
}

/// Same names, types and nullability in the same order. Metadata is ignored.
fn fields_match(left: &Schema, right: &Schema) -> bool {
    left.fields().len() == right.fields().len()
        && left.fields().iter().zip(right.fields()).all(|(l, r)| {
            l.name() == r.name()
                && l.data_type() == r.data_type()
                && l.is_nullable() == r.is_nullable()
        })
}

fn names_match(left: &Schema, right: &Schema) -> bool {
    left.fields().len() == right.fields().len()
        && left
            .fields()
            .iter()
            .zip(right.fields())
            .all(|(l, r)| l.name() == r.name())
}

/// Strict cast: values that overflow or fail to parse are errors, never nulls.
fn cast_column(column: &ArrayRef, field: &Field) -> Result<ArrayRef, ArrowError> {
    let cast = if column.data_type() == field.data_type() {
        column.clone()
    } else if can_cast_types(column.data_type(), field.data_type()) {
        let options = CastOptions {
            safe: false,
            ..Default::default()
        };
        cast_with_options(column, field.data_type(), &options)?
    } else {
        return Err(ArrowError::CastError(format!(
            "cannot cast column '{}' from {} to {}",
            field.name(),
            column.data_type(),
            field.data_type()
        )));
    };

    if !field.is_nullable() && cast.null_count() > 0 {
        return Err(ArrowError::InvalidArgumentError(format!(
            "column '{}' is non-nullable but contains nulls",
            field.name()
        )));
    }
    Ok(cast)
}

fn conform(
    schema: &SchemaRef,
    columns: Vec<ArrayRef>,
    num_rows: usize,
) -> Result<RecordBatch, ArrowError> {
    RecordBatch::try_new_with_options(
        schema.clone(),
        columns,
        &RecordBatchOptions::new().with_row_count(Some(num_rows)),
    )
}
