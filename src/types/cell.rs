use chrono::{DateTime, Utc};
use serde::Serialize;

use super::SemanticKind;

/// One value of a result row.
///
/// `Null` is the explicit "no value" marker and is never conflated with a
/// zero or empty value of any kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Boolean(bool),
    Integer64(i64),
    Float64(f64),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl Cell {
    /// Kind of the carried value, `None` for the null marker
    pub fn kind(&self) -> Option<SemanticKind> {
        match self {
            Cell::Null => None,
            Cell::Boolean(_) => Some(SemanticKind::Boolean),
            Cell::Integer64(_) => Some(SemanticKind::Integer64),
            Cell::Float64(_) => Some(SemanticKind::Float64),
            Cell::Timestamp(_) => Some(SemanticKind::Timestamp),
            Cell::Text(_) => Some(SemanticKind::Text),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// True when the cell may live in a column of `kind`
    pub fn fits(&self, kind: SemanticKind) -> bool {
        self.kind().is_none_or(|k| k == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_is_not_zero() {
        assert_ne!(Cell::Null, Cell::Integer64(0));
        assert_ne!(Cell::Null, Cell::Float64(0.0));
        assert_ne!(Cell::Null, Cell::Text(String::new()));
        assert!(Cell::Null.is_null());
        assert!(!Cell::Boolean(false).is_null());
    }

    #[test]
    fn test_fits() {
        assert!(Cell::Null.fits(SemanticKind::Float64));
        assert!(Cell::Integer64(1).fits(SemanticKind::Integer64));
        assert!(!Cell::Integer64(1).fits(SemanticKind::Float64));
    }

    #[test]
    fn test_serialization() {
        assert_eq!(serde_json::to_value(Cell::Null).unwrap(), json!(null));
        assert_eq!(serde_json::to_value(Cell::Boolean(true)).unwrap(), json!(true));
        assert_eq!(serde_json::to_value(Cell::Integer64(42)).unwrap(), json!(42));
        assert_eq!(serde_json::to_value(Cell::Float64(1.5)).unwrap(), json!(1.5));
        assert_eq!(serde_json::to_value(Cell::Text("a".into())).unwrap(), json!("a"));

        let ts = DateTime::from_timestamp(0, 0).unwrap();
        assert_eq!(serde_json::to_value(Cell::Timestamp(ts)).unwrap(), json!("1970-01-01T00:00:00Z"));
    }
}
