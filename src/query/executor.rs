use rusqlite::{Connection, Row};
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, warn};

use crate::error::QueryError;
use crate::frame::{Column, FrameBuilder, QuerySpec, ResultFrame};
use crate::query::splitter::{StatementPlan, is_comment_only};
use crate::session::PooledConnection;
use crate::types::{ColumnType, RowScanner, resolve_kind};

/// Runs one query on one borrowed connection and builds its frame
pub struct QueryExecutor;

impl QueryExecutor {
    /// Execute `spec` on `conn`, observing `cancel` between statements and rows.
    ///
    /// The connection is moved onto the blocking pool and handed back to its
    /// pool before this returns, whatever the outcome. Cancellation interrupts
    /// a statement that is already running on the backend; the connection is
    /// only released once the interrupt can no longer reach it.
    pub async fn execute(
        conn: PooledConnection,
        spec: &QuerySpec,
        cancel: &CancellationToken,
    ) -> Result<ResultFrame, QueryError> {
        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }

        let interrupt = conn.get_interrupt_handle();
        let spec_owned = spec.clone();
        let token = cancel.clone();
        let span = Span::current();
        let mut task = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let result = Self::execute_blocking(&conn, &spec_owned, &token);
            (conn, result)
        });

        let joined = tokio::select! {
            joined = &mut task => joined,
            _ = cancel.cancelled() => {
                debug!("Interrupting query {}", spec.ref_id);
                interrupt.interrupt();
                task.await
            }
        };

        match joined {
            Ok((conn, result)) => {
                drop(conn);
                match result {
                    Err(err) if cancel.is_cancelled() && err.is_interrupt() => Err(QueryError::Cancelled),
                    result => result,
                }
            }
            Err(join_err) => {
                warn!("Query {} worker failed: {}", spec.ref_id, join_err);
                Err(QueryError::Internal(join_err.to_string()))
            }
        }
    }

    /// Synchronous body of [`execute`](Self::execute)
    pub fn execute_blocking(
        conn: &Connection,
        spec: &QuerySpec,
        cancel: &CancellationToken,
    ) -> Result<ResultFrame, QueryError> {
        let plan = StatementPlan::parse(&spec.sql)?;

        // Setup statements share the connection, and so the session, with the
        // result statement. No transaction is opened around them.
        for (index, statement) in plan.setup.iter().enumerate() {
            check_cancelled(cancel)?;
            debug!("Executing setup statement {} of {}: {}", index, spec.ref_id, statement);
            conn.execute_batch(statement)
                .map_err(|cause| QueryError::SetupError { index, cause })?;
        }

        check_cancelled(cancel)?;
        debug!("Executing result statement of {}: {}", spec.ref_id, plan.result);
        if is_comment_only(plan.result) {
            return Err(QueryError::ExecutionError(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_MISUSE),
                Some("result statement contains only comments".to_string()),
            )));
        }
        let mut stmt = conn.prepare(plan.result).map_err(QueryError::ExecutionError)?;

        let mut names = Vec::with_capacity(stmt.column_count());
        for i in 0..stmt.column_count() {
            let name = stmt
                .column_name(i)
                .map_err(|e| QueryError::MetadataError(e.to_string()))?;
            names.push(name.to_string());
        }
        let decl_types: Vec<Option<String>> = stmt
            .columns()
            .iter()
            .map(|c| c.decl_type().map(str::to_string))
            .collect();

        let mut builder = FrameBuilder::new(spec.ref_id.clone());
        let mut rows = stmt.query([]).map_err(QueryError::ExecutionError)?;
        let mut current = rows.next().map_err(QueryError::ExecutionError)?;

        let columns = resolve_columns(names, decl_types, current)?;
        let mut scanner = RowScanner::new(&columns);
        builder
            .set_columns(columns)
            .map_err(|e| QueryError::MetadataError(e.to_string()))?;

        let mut row_index = 0usize;
        while let Some(row) = current {
            let cells = scanner.scan(row).map_err(|cause| QueryError::ScanError {
                row_index: Some(row_index),
                cause,
            })?;
            builder
                .push_row(cells)
                .map_err(|e| QueryError::MetadataError(e.to_string()))?;
            row_index += 1;

            check_cancelled(cancel)?;
            current = rows.next().map_err(QueryError::ExecutionError)?;
        }

        debug!("Query {} returned {} rows in {} columns", spec.ref_id, row_index, scanner.width());
        Ok(builder.finish())
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), QueryError> {
    if cancel.is_cancelled() {
        Err(QueryError::Cancelled)
    } else {
        Ok(())
    }
}

/// Resolve every column's kind once, before any row is converted.
///
/// `first_row` only supplies storage classes for columns SQLite reports no
/// declared type for.
fn resolve_columns(
    names: Vec<String>,
    decl_types: Vec<Option<String>>,
    first_row: Option<&Row<'_>>,
) -> Result<Vec<Column>, QueryError> {
    if names.len() != decl_types.len() {
        return Err(QueryError::MetadataError(format!(
            "{} column names but {} column types",
            names.len(),
            decl_types.len()
        )));
    }

    names
        .into_iter()
        .zip(decl_types)
        .enumerate()
        .map(|(idx, (name, decl_type))| -> Result<Column, QueryError> {
            let column_type = match decl_type {
                Some(decl) => ColumnType::declared(&decl),
                None => {
                    let storage = first_row
                        .map(|row| row.get_ref(idx).map(|value| value.data_type()))
                        .transpose()
                        .map_err(|e| QueryError::MetadataError(e.to_string()))?;
                    ColumnType::undeclared(storage)
                }
            };
            Ok(Column::new(name, resolve_kind(&column_type)))
        })
        .collect()
}
