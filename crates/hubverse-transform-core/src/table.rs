//! In-memory model-output table.

use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

/// Column holding the round id parsed from the file name.
pub const ROUND_ID_COLUMN: &str = "round_id";

/// Column holding the model id parsed from the file name.
pub const MODEL_ID_COLUMN: &str = "model_id";

/// One submission's rows, held as a single Arrow record batch.
///
/// Created by the reader, consumed by [`ModelOutputTable::with_identity`],
/// and consumed again by the writer.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutputTable(RecordBatch);

impl ModelOutputTable {
    /// Wrap a record batch.
    pub fn new(batch: RecordBatch) -> Self {
        ModelOutputTable(batch)
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.0.num_rows()
    }

    /// Number of columns.
    pub fn num_columns(&self) -> usize {
        self.0.num_columns()
    }

    /// Arrow schema of the table.
    pub fn schema(&self) -> SchemaRef {
        self.0.schema()
    }

    /// Column by name.
    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.0.column_by_name(name)
    }

    /// Borrow the underlying batch.
    pub fn batch(&self) -> &RecordBatch {
        &self.0
    }

    /// Unwrap into the underlying batch.
    pub fn into_batch(self) -> RecordBatch {
        self.0
    }

    /// Append constant `round_id` and `model_id` string columns.
    ///
    /// Every other column is kept as-is. A column that already carries one
    /// of these names is replaced in place rather than duplicated.
    pub fn with_identity(self, round_id: &str, model_id: &str) -> Result<Self, ArrowError> {
        let rows = self.num_rows();
        log::debug!(rows = rows; "adding round_id and model_id columns");

        let schema = self.0.schema();
        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        let mut columns: Vec<ArrayRef> = self.0.columns().to_vec();

        for (name, value) in [(ROUND_ID_COLUMN, round_id), (MODEL_ID_COLUMN, model_id)] {
            let field = Field::new(name, DataType::Utf8, true);
            let array: ArrayRef = Arc::new(StringArray::from(vec![value; rows]));
            match schema.index_of(name) {
                Ok(i) => {
                    fields[i] = field;
                    columns[i] = array;
                }
                Err(_) => {
                    fields.push(field);
                    columns.push(array);
                }
            }
        }

        let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
        let options = RecordBatchOptions::new().with_row_count(Some(rows));
        RecordBatch::try_new_with_options(schema, columns, &options).map(ModelOutputTable)
    }
}

impl From<RecordBatch> for ModelOutputTable {
    fn from(batch: RecordBatch) -> Self {
        ModelOutputTable(batch)
    }
}
