//! Sub-call responses.

use serde::{Deserialize, Serialize};

use super::table::Table;
use super::value::Value;

/// Status of one dispatched sub-call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallStatus {
    Success,
    Failure(String),
}

/// Result of one dispatched sub-call. Immutable after delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: CallStatus,
    pub tables: Vec<Table>,
}

impl Response {
    pub fn success(tables: Vec<Table>) -> Self {
        Self {
            status: CallStatus::Success,
            tables,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            status: CallStatus::Failure(reason.into()),
            tables: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, CallStatus::Success)
    }

    /// Failure reason, if the call failed.
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            CallStatus::Failure(reason) => Some(reason),
            CallStatus::Success => None,
        }
    }

    pub fn table(&self, index: usize) -> Option<&Table> {
        self.tables.get(index)
    }

    /// First column of the first row of the first table.
    pub fn scalar(&self) -> Option<&Value> {
        self.tables.first().and_then(Table::scalar)
    }

    /// Modified-tuple count reported by a DML sub-call, if any.
    pub fn affected_rows(&self) -> Option<i64> {
        self.scalar().and_then(Value::as_i64)
    }
}
