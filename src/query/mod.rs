pub mod executor;
pub mod orchestrator;
pub mod splitter;

pub use executor::QueryExecutor;
pub use orchestrator::{DEFAULT_MAX_CONCURRENCY, QueryOrchestrator};
pub use splitter::{StatementPlan, is_comment_only, split_statements};
