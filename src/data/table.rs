// ============================================================
// Layer 4 — In-memory Table
// ============================================================
// A small column store for the raw and processed layers.
// Each column is either numeric or text; every cell may be
// null (None). All columns of a table have the same length.
//
// Arrow RecordBatches are converted into a Table on load and
// back on write (see loader.rs / writer.rs).

use std::ops::Range;

use anyhow::{bail, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric(_))
    }

    pub fn null_count(&self) -> usize {
        match self {
            Self::Numeric(v) => v.iter().filter(|x| x.is_none()).count(),
            Self::Text(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Numbers as-is; text parsed, unparsable text becomes null.
    pub fn to_numeric(&self) -> Vec<Option<f64>> {
        match self {
            Self::Numeric(v) => v.clone(),
            Self::Text(v) => v
                .iter()
                .map(|s| s.as_deref().and_then(|s| s.trim().parse::<f64>().ok()))
                .map(|x| x.filter(|f| !f.is_nan()))
                .collect(),
        }
    }

    /// Text as-is; numbers rendered with their shortest representation.
    pub fn to_text(&self) -> Vec<Option<String>> {
        match self {
            Self::Numeric(v) => v.iter().map(|x| x.map(|f| f.to_string())).collect(),
            Self::Text(v) => v.clone(),
        }
    }

    fn take(&self, rows: &[usize]) -> Self {
        match self {
            Self::Numeric(v) => Self::Numeric(rows.iter().map(|&i| v[i]).collect()),
            Self::Text(v) => Self::Text(rows.iter().map(|&i| v[i].clone()).collect()),
        }
    }

    fn nulls_like(&self, len: usize) -> Self {
        match self {
            Self::Numeric(_) => Self::Numeric(vec![None; len]),
            Self::Text(_) => Self::Text(vec![None; len]),
        }
    }

    fn append(&mut self, other: &ColumnData) {
        if let (Self::Numeric(a), Self::Numeric(b)) = (&mut *self, other) {
            a.extend_from_slice(b);
            return;
        }
        let mut text = self.to_text();
        text.extend(other.to_text());
        *self = Self::Text(text);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self { name: name.into(), data: ColumnData::Numeric(values) }
    }

    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self { name: name.into(), data: ColumnData::Text(values) }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows:    usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table, checking equal lengths and unique names.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let mut table = Self::new();
        for c in columns {
            table.push_column(c)?;
        }
        Ok(table)
    }

    pub fn n_rows(&self) -> usize {
        self.rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.columns.len())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn numeric(&self, name: &str) -> Option<&[Option<f64>]> {
        match self.column(name).map(|c| &c.data) {
            Some(ColumnData::Numeric(v)) => Some(v),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&[Option<String>]> {
        match self.column(name).map(|c| &c.data) {
            Some(ColumnData::Text(v)) => Some(v),
            _ => None,
        }
    }

    /// Append a new column. The first column fixes the row count.
    pub fn push_column(&mut self, column: Column) -> Result<()> {
        if self.has_column(&column.name) {
            bail!("duplicate column '{}'", column.name);
        }
        if self.columns.is_empty() {
            self.rows = column.data.len();
        } else if column.data.len() != self.rows {
            bail!(
                "column '{}' has {} rows, table has {}",
                column.name,
                column.data.len(),
                self.rows
            );
        }
        self.columns.push(column);
        Ok(())
    }

    /// Replace the data of an existing column in place, or append it.
    pub fn set_column(&mut self, column: Column) -> Result<()> {
        match self.index_of(&column.name) {
            Some(i) => {
                if column.data.len() != self.rows {
                    bail!(
                        "column '{}' has {} rows, table has {}",
                        column.name,
                        column.data.len(),
                        self.rows
                    );
                }
                self.columns[i] = column;
                Ok(())
            }
            None => self.push_column(column),
        }
    }

    pub fn drop_column(&mut self, name: &str) -> Option<Column> {
        let idx = self.index_of(name)?;
        let col = self.columns.remove(idx);
        if self.columns.is_empty() {
            self.rows = 0;
        }
        Some(col)
    }

    /// New table with the given rows, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column { name: c.name.clone(), data: c.data.take(rows) })
                .collect(),
            rows: rows.len(),
        }
    }

    pub fn slice(&self, range: Range<usize>) -> Table {
        let rows: Vec<usize> = range.collect();
        self.take_rows(&rows)
    }

    /// Stack tables vertically. Columns are matched by name; a column
    /// missing from one part is null there. Mixed numeric/text columns
    /// end up as text.
    pub fn concat(parts: Vec<Table>) -> Table {
        let mut out = Table::new();
        for part in parts {
            let before = out.rows;
            for col in &part.columns {
                if !out.has_column(&col.name) {
                    out.columns.push(Column {
                        name: col.name.clone(),
                        data: col.data.nulls_like(before),
                    });
                }
            }
            for out_col in out.columns.iter_mut() {
                match part.column(&out_col.name) {
                    Some(col) => out_col.data.append(&col.data),
                    None => {
                        let nulls = out_col.data.nulls_like(part.rows);
                        out_col.data.append(&nulls);
                    }
                }
            }
            out.rows = before + part.rows;
        }
        out
    }
}
