// ============================================================
// Layer 4 — Parquet Writer
// ============================================================
// Writes a Table as a single-row-group Parquet file.
// Numeric columns become nullable Float64, text columns
// nullable Utf8.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use crate::data::table::{ColumnData, Table};

pub fn table_to_batch(table: &Table) -> Result<RecordBatch> {
    if table.n_cols() == 0 {
        bail!("cannot write a table without columns");
    }
    let mut fields = Vec::with_capacity(table.n_cols());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.n_cols());

    for col in table.columns() {
        match &col.data {
            ColumnData::Numeric(v) => {
                fields.push(Field::new(col.name.as_str(), DataType::Float64, true));
                arrays.push(Arc::new(Float64Array::from(v.clone())));
            }
            ColumnData::Text(v) => {
                fields.push(Field::new(col.name.as_str(), DataType::Utf8, true));
                arrays.push(Arc::new(StringArray::from(v.clone())));
            }
        }
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

pub fn write_parquet(table: &Table, path: &Path) -> Result<()> {
    let batch = table_to_batch(table)?;
    let file = File::create(path).with_context(|| format!("Cannot create '{}'", path.display()))?;

    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;

    tracing::debug!("Wrote '{}' ({} rows x {} cols)", path.display(), table.n_rows(), table.n_cols());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::Column;

    #[test]
    fn test_batch_keeps_column_order_and_types() {
        let t = Table::from_columns(vec![
            Column::text("user_id", vec![Some("u1".into()), None]),
            Column::numeric("churned_14d", vec![Some(1.0), Some(0.0)]),
        ])
        .unwrap();
        let batch = table_to_batch(&t).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(0).name(), "user_id");
        assert_eq!(batch.schema().field(1).data_type(), &DataType::Float64);
    }

    #[test]
    fn test_empty_table_is_refused() {
        assert!(table_to_batch(&Table::new()).is_err());
    }
}
