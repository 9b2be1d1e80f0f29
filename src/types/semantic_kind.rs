use rusqlite::types::Type;
use serde::{Deserialize, Serialize};

/// The closed set of value kinds every backend column is mapped onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemanticKind {
    Boolean,
    Integer64,
    Float64,
    Timestamp,
    Text,
}

impl SemanticKind {
    pub fn name(&self) -> &'static str {
        match self {
            SemanticKind::Boolean => "Boolean",
            SemanticKind::Integer64 => "Integer64",
            SemanticKind::Float64 => "Float64",
            SemanticKind::Timestamp => "Timestamp",
            SemanticKind::Text => "Text",
        }
    }
}

impl std::fmt::Display for SemanticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime type descriptor of one result column.
///
/// SQLite only reports a declared type for columns that come straight from a
/// table. Expression columns (`SELECT 1 AS a`) carry no declaration, so the
/// storage class of the first row's value is recorded instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnType {
    pub decl_type: Option<String>,
    pub storage: Option<Type>,
}

impl ColumnType {
    pub fn declared(decl_type: &str) -> Self {
        Self { decl_type: Some(decl_type.to_string()), storage: None }
    }

    pub fn undeclared(storage: Option<Type>) -> Self {
        Self { decl_type: None, storage }
    }
}

/// Map a column type descriptor to its semantic kind.
///
/// A declared type always wins over the observed storage class.
pub fn resolve_kind(column_type: &ColumnType) -> SemanticKind {
    match &column_type.decl_type {
        Some(decl) => kind_from_decl_type(decl),
        None => match column_type.storage {
            Some(Type::Integer) => SemanticKind::Integer64,
            Some(Type::Real) => SemanticKind::Float64,
            Some(Type::Text) | Some(Type::Blob) | Some(Type::Null) | None => SemanticKind::Text,
        },
    }
}

/// Convert a SQLite type declaration to a semantic kind
pub fn kind_from_decl_type(decl_type: &str) -> SemanticKind {
    let type_upper = decl_type.trim().to_uppercase();

    // BOOL first so that e.g. "BOOLEAN INTEGER" aliases stay booleans
    if type_upper.contains("BOOL") {
        return SemanticKind::Boolean;
    }

    // Timestamps before INT so "DATETIME" and "TIMESTAMP" never hit the INT arm
    if type_upper.contains("TIMESTAMP") || type_upper.contains("DATETIME") || type_upper == "DATE" {
        return SemanticKind::Timestamp;
    }

    if type_upper.contains("INT") {
        return SemanticKind::Integer64;
    }

    if type_upper.contains("REAL") || type_upper.contains("FLOA") || type_upper.contains("DOUB") {
        return SemanticKind::Float64;
    }

    SemanticKind::Text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_types() {
        assert_eq!(kind_from_decl_type("BOOLEAN"), SemanticKind::Boolean);
        assert_eq!(kind_from_decl_type("bool"), SemanticKind::Boolean);
        assert_eq!(kind_from_decl_type("INTEGER"), SemanticKind::Integer64);
        assert_eq!(kind_from_decl_type("BIGINT"), SemanticKind::Integer64);
        assert_eq!(kind_from_decl_type("smallint"), SemanticKind::Integer64);
        assert_eq!(kind_from_decl_type("REAL"), SemanticKind::Float64);
        assert_eq!(kind_from_decl_type("DOUBLE PRECISION"), SemanticKind::Float64);
        assert_eq!(kind_from_decl_type("FLOAT"), SemanticKind::Float64);
        assert_eq!(kind_from_decl_type("TIMESTAMP"), SemanticKind::Timestamp);
        assert_eq!(kind_from_decl_type("DATETIME"), SemanticKind::Timestamp);
        assert_eq!(kind_from_decl_type("date"), SemanticKind::Timestamp);
    }

    #[test]
    fn test_fallback_to_text() {
        assert_eq!(kind_from_decl_type("TEXT"), SemanticKind::Text);
        assert_eq!(kind_from_decl_type("VARCHAR(255)"), SemanticKind::Text);
        assert_eq!(kind_from_decl_type("BLOB"), SemanticKind::Text);
        assert_eq!(kind_from_decl_type("NUMERIC(10,2)"), SemanticKind::Text);
        assert_eq!(kind_from_decl_type("TIME"), SemanticKind::Text);
        assert_eq!(kind_from_decl_type(""), SemanticKind::Text);
    }

    #[test]
    fn test_undeclared_columns_use_storage_class() {
        assert_eq!(resolve_kind(&ColumnType::undeclared(Some(Type::Integer))), SemanticKind::Integer64);
        assert_eq!(resolve_kind(&ColumnType::undeclared(Some(Type::Real))), SemanticKind::Float64);
        assert_eq!(resolve_kind(&ColumnType::undeclared(Some(Type::Text))), SemanticKind::Text);
        assert_eq!(resolve_kind(&ColumnType::undeclared(Some(Type::Null))), SemanticKind::Text);
        assert_eq!(resolve_kind(&ColumnType::undeclared(None)), SemanticKind::Text);
    }

    #[test]
    fn test_declared_type_wins_over_storage() {
        let column_type = ColumnType { decl_type: Some("REAL".to_string()), storage: Some(Type::Integer) };
        assert_eq!(resolve_kind(&column_type), SemanticKind::Float64);
    }

    #[test]
    fn test_resolution_is_stable() {
        let descriptors = [
            ColumnType::declared("INTEGER"),
            ColumnType::declared("whatever"),
            ColumnType::undeclared(Some(Type::Real)),
        ];
        for descriptor in &descriptors {
            assert_eq!(resolve_kind(descriptor), resolve_kind(descriptor));
        }
    }
}
