//! Flat, typed tabular model shared by both pipelines: raw vendor records are
//! reshaped into [`Table`]s (one fixed [`Schema`] per entity type) which the
//! loader then materializes as CSV, workbook or JSON artifacts.

mod schema;

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{EtlError, Result};

pub use schema::{ColumnDef, ColumnKind, Entity, RowBuilder, Schema};

/// One cell: a typed scalar or `Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// JSON rendering: numbers stay numbers, dates become ISO strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => {
                serde_json::Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
        }
    }
}

/// Text rendering used for CSV fields and workbook cells. `Null` is empty.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Str(s) => f.write_str(s),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Ordered rows sharing one schema. Rows are appended during transform and
/// never mutated afterwards; every row has exactly one cell per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    schema: Schema,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(schema: Schema) -> Self {
        Table {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn entity(&self) -> Entity {
        self.schema.entity
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Append a row from a builder. Builders are constructed against the same
    /// schema the table was, so the row is always well-shaped.
    pub fn push_row(&mut self, builder: RowBuilder<'_>) {
        let row = builder.finish();
        debug_assert_eq!(row.len(), self.schema.len());
        self.rows.push(row);
    }

    /// Append a raw cell vector, enforcing the one-cell-per-column invariant.
    pub fn push(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.schema.len() {
            return Err(EtlError::RowShape {
                entity: self.schema.entity.name().to_string(),
                expected: self.schema.len(),
                got: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Cell lookup by row index and column name.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.schema.index_of(column)?;
        self.rows.get(row).map(|r| &r[col])
    }

    /// Iterate one column's cells, if the column exists.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value>> {
        let idx = self.schema.index_of(name)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }
}

/// Everything one run exports: the per-entity tables in a fixed order plus an
/// optional derived summary, written as one artifact (or one artifact per
/// table for CSV).
#[derive(Debug, Clone)]
pub struct ExportBundle {
    /// Artifact name prefix, e.g. `ga` or `mailchimp`.
    pub source: &'static str,
    pub tables: Vec<Table>,
    pub summary: Option<Table>,
}

impl ExportBundle {
    pub fn new(source: &'static str) -> Self {
        ExportBundle {
            source,
            tables: Vec::new(),
            summary: None,
        }
    }
}
