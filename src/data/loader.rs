// ============================================================
// Layer 4 — Table Loader
// ============================================================
// Reads raw activity snapshots into a Table.
//
// Accepted inputs:
//   - a single file: tried as Parquet first, then as CSV
//   - a directory (walked recursively):
//       1. every *.parquet file, if there are any
//       2. otherwise every *.csv file
//       3. otherwise every extension-less file (query engine
//          output), each tried as Parquet then CSV
//
// Parquet and CSV are decoded with arrow; every Arrow column is
// cast to either Float64 (numbers, booleans) or Utf8 (everything
// else, dates included) before landing in the Table.

use std::fs::{self, File};
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::data::table::{Column, Table};
use crate::domain::traits::TableSource;

/// Rows sampled when inferring a CSV schema.
const CSV_INFER_ROWS: usize = 1000;

/// Loads a file or a directory of files into one Table.
/// Implements the TableSource trait from Layer 3.
pub struct TableLoader {
    path: PathBuf,
}

impl TableLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TableSource for TableLoader {
    fn load(&self) -> Result<Table> {
        if self.path.is_dir() {
            load_dir(&self.path)
        } else {
            load_file(&self.path)
        }
    }
}

/// Parquet first, CSV as fallback. Both errors are reported on failure.
pub fn load_file(path: &Path) -> Result<Table> {
    let parquet_err = match read_parquet(path) {
        Ok(t) => return Ok(t),
        Err(e) => e,
    };
    let csv_err = match read_csv(path) {
        Ok(t) => return Ok(t),
        Err(e) => e,
    };
    bail!(
        "Failed to read input as Parquet or CSV: {}\nParquet error: {parquet_err:#}\nCSV error: {csv_err:#}",
        path.display()
    )
}

fn load_dir(dir: &Path) -> Result<Table> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    let with_ext = |ext: &str| -> Vec<PathBuf> {
        files
            .iter()
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(ext))
            })
            .cloned()
            .collect()
    };

    let parquet_files = with_ext("parquet");
    if !parquet_files.is_empty() {
        tracing::info!("Reading {} parquet files under '{}'", parquet_files.len(), dir.display());
        return concat_files(&parquet_files, read_parquet);
    }

    let csv_files = with_ext("csv");
    if !csv_files.is_empty() {
        tracing::info!("Reading {} csv files under '{}'", csv_files.len(), dir.display());
        return concat_files(&csv_files, read_csv);
    }

    let bare: Vec<PathBuf> = files.iter().filter(|p| p.extension().is_none()).cloned().collect();
    if !bare.is_empty() {
        tracing::info!("Reading {} extension-less files under '{}'", bare.len(), dir.display());
        return concat_files(&bare, load_file);
    }

    bail!("No readable data files found under: {}", dir.display())
}

fn concat_files(files: &[PathBuf], read: fn(&Path) -> Result<Table>) -> Result<Table> {
    let mut parts = Vec::with_capacity(files.len());
    for f in files {
        let t = read(f)?;
        tracing::debug!("Loaded '{}' ({} rows)", f.display(), t.n_rows());
        parts.push(t);
    }
    Ok(Table::concat(parts))
}

/// Recursive walk; empty files (folder markers) are skipped.
fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("Cannot read directory '{}'", dir.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false) {
            out.push(path);
        }
    }
    Ok(())
}

pub fn read_parquet(path: &Path) -> Result<Table> {
    let file = File::open(path).with_context(|| format!("Cannot open '{}'", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut parts = Vec::new();
    for batch in reader {
        parts.push(batch_to_table(&batch?)?);
    }
    if parts.is_empty() {
        return empty_table(&schema);
    }
    Ok(Table::concat(parts))
}

pub fn read_csv(path: &Path) -> Result<Table> {
    let mut file = File::open(path).with_context(|| format!("Cannot open '{}'", path.display()))?;
    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut file, Some(CSV_INFER_ROWS))?;
    file.seek(SeekFrom::Start(0))?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(schema.clone()).with_header(true).build(file)?;

    let mut parts = Vec::new();
    for batch in reader {
        parts.push(batch_to_table(&batch?)?);
    }
    if parts.is_empty() {
        return empty_table(&schema);
    }
    Ok(Table::concat(parts))
}

fn batch_to_table(batch: &RecordBatch) -> Result<Table> {
    let schema = batch.schema();
    let columns = schema
        .fields()
        .iter()
        .zip(batch.columns())
        .map(|(field, array)| array_to_column(field.name(), array))
        .collect::<Result<Vec<_>>>()?;
    Table::from_columns(columns)
}

fn is_numeric_type(dt: &DataType) -> bool {
    dt.is_numeric() || matches!(dt, DataType::Boolean)
}

fn array_to_column(name: &str, array: &ArrayRef) -> Result<Column> {
    if is_numeric_type(array.data_type()) {
        let casted = cast(array.as_ref(), &DataType::Float64)?;
        let values = casted
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| anyhow!("column '{name}': cast to Float64 failed"))?;
        // NaN is a null in the raw layer
        let data = values.iter().map(|v| v.filter(|f| !f.is_nan())).collect();
        Ok(Column::numeric(name, data))
    } else {
        let casted = cast(array.as_ref(), &DataType::Utf8)?;
        let values = casted
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| anyhow!("column '{name}': cast to Utf8 failed"))?;
        let data = values.iter().map(|v| v.map(str::to_string)).collect();
        Ok(Column::text(name, data))
    }
}

fn empty_table(schema: &Schema) -> Result<Table> {
    let columns = schema
        .fields()
        .iter()
        .map(|f| {
            if is_numeric_type(f.data_type()) {
                Column::numeric(f.name().as_str(), Vec::new())
            } else {
                Column::text(f.name().as_str(), Vec::new())
            }
        })
        .collect();
    Table::from_columns(columns)
}
