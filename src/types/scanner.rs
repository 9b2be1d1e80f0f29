use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};

use super::datetime_utils::{parse_timestamp, timestamp_from_unix_seconds};
use super::{Cell, SemanticKind};
use crate::frame::Column;

/// Nullable scan target, one variant per semantic kind
#[derive(Debug, Clone, PartialEq)]
pub enum NullableValue {
    Boolean(Option<bool>),
    Integer64(Option<i64>),
    Float64(Option<f64>),
    Timestamp(Option<DateTime<Utc>>),
    Text(Option<String>),
}

impl NullableValue {
    /// Empty holder whose scan target is chosen by `kind`
    pub fn for_kind(kind: SemanticKind) -> Self {
        match kind {
            SemanticKind::Boolean => NullableValue::Boolean(None),
            SemanticKind::Integer64 => NullableValue::Integer64(None),
            SemanticKind::Float64 => NullableValue::Float64(None),
            SemanticKind::Timestamp => NullableValue::Timestamp(None),
            SemanticKind::Text => NullableValue::Text(None),
        }
    }

    pub fn kind(&self) -> SemanticKind {
        match self {
            NullableValue::Boolean(_) => SemanticKind::Boolean,
            NullableValue::Integer64(_) => SemanticKind::Integer64,
            NullableValue::Float64(_) => SemanticKind::Float64,
            NullableValue::Timestamp(_) => SemanticKind::Timestamp,
            NullableValue::Text(_) => SemanticKind::Text,
        }
    }

    /// False when the last scan read SQL NULL
    pub fn has_value(&self) -> bool {
        match self {
            NullableValue::Boolean(v) => v.is_some(),
            NullableValue::Integer64(v) => v.is_some(),
            NullableValue::Float64(v) => v.is_some(),
            NullableValue::Timestamp(v) => v.is_some(),
            NullableValue::Text(v) => v.is_some(),
        }
    }

    /// Read field `idx` of `row` into this holder
    pub fn scan(&mut self, row: &Row<'_>, idx: usize) -> rusqlite::Result<()> {
        match self {
            NullableValue::Boolean(v) => *v = row.get(idx)?,
            NullableValue::Integer64(v) => *v = row.get(idx)?,
            NullableValue::Float64(v) => *v = row.get(idx)?,
            NullableValue::Timestamp(v) => *v = row.get::<_, Option<SqlTimestamp>>(idx)?.map(|t| t.0),
            NullableValue::Text(v) => *v = row.get::<_, Option<SqlText>>(idx)?.map(|t| t.0),
        }
        Ok(())
    }

    /// Move the scanned value out as a cell, leaving the holder empty
    pub fn take_cell(&mut self) -> Cell {
        match self {
            NullableValue::Boolean(v) => v.take().map_or(Cell::Null, Cell::Boolean),
            NullableValue::Integer64(v) => v.take().map_or(Cell::Null, Cell::Integer64),
            NullableValue::Float64(v) => v.take().map_or(Cell::Null, Cell::Float64),
            NullableValue::Timestamp(v) => v.take().map_or(Cell::Null, Cell::Timestamp),
            NullableValue::Text(v) => v.take().map_or(Cell::Null, Cell::Text),
        }
    }
}

/// Timestamp stored either as text or as unix seconds
struct SqlTimestamp(DateTime<Utc>);

impl FromSql for SqlTimestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let parsed = match value {
            ValueRef::Text(bytes) => {
                let text = std::str::from_utf8(bytes).map_err(|e| FromSqlError::Other(Box::new(e)))?;
                parse_timestamp(text).ok_or_else(|| {
                    FromSqlError::Other(format!("invalid timestamp '{text}'").into())
                })?
            }
            ValueRef::Integer(seconds) => timestamp_from_unix_seconds(seconds)
                .ok_or(FromSqlError::OutOfRange(seconds))?,
            _ => return Err(FromSqlError::InvalidType),
        };
        Ok(SqlTimestamp(parsed))
    }
}

/// Any storage class rendered as a string
struct SqlText(String);

impl FromSql for SqlText {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = match value {
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            ValueRef::Integer(i) => i.to_string(),
            ValueRef::Real(f) => f.to_string(),
            ValueRef::Null => return Err(FromSqlError::InvalidType),
        };
        Ok(SqlText(text))
    }
}

/// Scans rows of one result set into cells aligned with its columns.
///
/// Holders are created once from the resolved columns and reused for every row.
pub struct RowScanner {
    holders: Vec<NullableValue>,
}

impl RowScanner {
    pub fn new(columns: &[Column]) -> Self {
        Self {
            holders: columns.iter().map(|c| NullableValue::for_kind(c.kind)).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.holders.len()
    }

    pub fn scan(&mut self, row: &Row<'_>) -> rusqlite::Result<Vec<Cell>> {
        for (idx, holder) in self.holders.iter_mut().enumerate() {
            holder.scan(row, idx)?;
        }
        Ok(self.holders.iter_mut().map(NullableValue::take_cell).collect())
    }
}
