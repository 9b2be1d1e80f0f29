// Module for column kind resolution and null-safe row conversion
pub mod cell;
pub mod datetime_utils;
pub mod scanner;
pub mod semantic_kind;

pub use cell::Cell;
pub use scanner::{NullableValue, RowScanner};
pub use semantic_kind::{ColumnType, SemanticKind, kind_from_decl_type, resolve_kind};
