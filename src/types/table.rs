//! Ordered column/row result tables.

use serde::{Deserialize, Serialize};

use super::value::{ColumnType, Value};

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Errors raised when building a table row by row.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TableError {
    #[error("Row has {actual} values, table has {expected} columns")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("Value for column '{column}' has type {actual}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        actual: ColumnType,
    },
}

/// A result table: ordered columns and ordered rows. `Value::Null` marks nulls.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Single-column, single-row table. Common shape for procedure results.
    pub fn single(name: impl Into<String>, ty: ColumnType, value: Value) -> Self {
        Self {
            columns: vec![Column::new(name, ty)],
            rows: vec![vec![value]],
        }
    }

    /// Table holding a modified-tuple count, the shape returned by DML statements.
    pub fn affected_rows(count: i64) -> Self {
        Self::single("modified_tuples", ColumnType::BigInt, Value::BigInt(count))
    }

    /// Append a row, coercing each value to its column type.
    pub fn add_row(&mut self, row: Vec<Value>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::ArityMismatch {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        let mut coerced = Vec::with_capacity(row.len());
        for (value, column) in row.into_iter().zip(&self.columns) {
            match value.coerce_to(column.ty) {
                Some(v) => coerced.push(v),
                None => {
                    return Err(TableError::TypeMismatch {
                        column: column.name.clone(),
                        expected: column.ty,
                        // coerce_to only fails for non-null values
                        actual: value.column_type().unwrap_or(column.ty),
                    })
                }
            }
        }
        self.rows.push(coerced);
        Ok(())
    }

    /// Builder-style `add_row`.
    pub fn with_row(mut self, row: Vec<Value>) -> Result<Self, TableError> {
        self.add_row(row)?;
        Ok(self)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Case-insensitive column lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Value at (row, column index).
    pub fn get(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Value at (row, column name).
    pub fn get_named(&self, row: usize, column: &str) -> Option<&Value> {
        self.column_index(column).and_then(|c| self.get(row, c))
    }

    /// First column of the first row.
    pub fn scalar(&self) -> Option<&Value> {
        self.get(0, 0)
    }
}
