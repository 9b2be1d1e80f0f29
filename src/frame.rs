use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{FrameError, QueryError};
use crate::types::{Cell, SemanticKind};

/// One query of a batch, as submitted by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub ref_id: String,
    pub sql: String,
}

impl QuerySpec {
    pub fn new(ref_id: impl Into<String>, sql: impl Into<String>) -> Self {
        Self { ref_id: ref_id.into(), sql: sql.into() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRequest {
    pub queries: Vec<QuerySpec>,
}

/// Column descriptor of a result frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: SemanticKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: SemanticKind) -> Self {
        Self { name: name.into(), kind }
    }
}

/// Typed result of one query: ordered columns plus rows aligned to them
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultFrame {
    pub ref_id: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
}

impl ResultFrame {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Values of one column in row order
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().filter_map(move |row| row.get(index))
    }
}

/// Accumulates one query's columns and rows in backend order
#[derive(Debug)]
pub struct FrameBuilder {
    ref_id: String,
    columns: Option<Vec<Column>>,
    rows: Vec<Vec<Cell>>,
}

impl FrameBuilder {
    pub fn new(ref_id: impl Into<String>) -> Self {
        Self { ref_id: ref_id.into(), columns: None, rows: Vec::new() }
    }

    /// Set the column sequence; allowed exactly once, before any row
    pub fn set_columns(&mut self, columns: Vec<Column>) -> Result<(), FrameError> {
        if self.columns.is_some() {
            return Err(FrameError::ColumnsAlreadySet);
        }
        self.columns = Some(columns);
        Ok(())
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<(), FrameError> {
        let columns = self.columns.as_ref().ok_or(FrameError::ColumnsNotSet)?;
        if row.len() != columns.len() {
            return Err(FrameError::RowWidth { expected: columns.len(), actual: row.len() });
        }
        if let Some(index) = row.iter().zip(columns).position(|(cell, col)| !cell.fits(col.kind)) {
            return Err(FrameError::CellKind { index, expected: columns[index].kind });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn finish(self) -> ResultFrame {
        ResultFrame {
            ref_id: self.ref_id,
            columns: self.columns.unwrap_or_default(),
            rows: self.rows,
        }
    }
}

/// Outcome of one query inside a batch result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryOutcome {
    Frame(ResultFrame),
    Error { kind: String, message: String },
}

impl QueryOutcome {
    pub fn frame(&self) -> Option<&ResultFrame> {
        match self {
            QueryOutcome::Frame(frame) => Some(frame),
            QueryOutcome::Error { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<&str> {
        match self {
            QueryOutcome::Frame(_) => None,
            QueryOutcome::Error { kind, .. } => Some(kind),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.error_kind() == Some(QueryError::Cancelled.kind())
    }
}

impl From<Result<ResultFrame, QueryError>> for QueryOutcome {
    fn from(result: Result<ResultFrame, QueryError>) -> Self {
        match result {
            Ok(frame) => QueryOutcome::Frame(frame),
            Err(err) => err.into(),
        }
    }
}

impl From<QueryError> for QueryOutcome {
    fn from(err: QueryError) -> Self {
        QueryOutcome::Error { kind: err.kind().to_string(), message: err.to_string() }
    }
}

/// Per-query outcomes of a batch, keyed by ref id
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BatchResult {
    outcomes: BTreeMap<String, QueryOutcome>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome; an identifier already present keeps its first outcome
    pub fn insert(&mut self, ref_id: String, outcome: QueryOutcome) -> bool {
        match self.outcomes.entry(ref_id) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(outcome);
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, ref_id: &str) -> Option<&QueryOutcome> {
        self.outcomes.get(ref_id)
    }

    pub fn contains(&self, ref_id: &str) -> bool {
        self.outcomes.contains_key(ref_id)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &QueryOutcome)> {
        self.outcomes.iter()
    }
}
