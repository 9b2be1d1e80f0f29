use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, info_span, warn};
use uuid::Uuid;

use crate::error::QueryError;
use crate::frame::{BatchResult, QueryOutcome, QuerySpec};
use crate::query::executor::QueryExecutor;
use crate::session::SqlitePool;

pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Fans a batch of queries out over a bounded set of worker tasks.
///
/// Each worker borrows one connection per query and runs it to completion
/// before taking the next query off the shared queue. Outcomes flow back over
/// a channel to a single accumulation point, keyed by ref id.
#[derive(Clone)]
pub struct QueryOrchestrator {
    pool: SqlitePool,
    max_concurrency: usize,
    span: Span,
}

impl QueryOrchestrator {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            span: Span::none(),
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Parent span for every batch and query span this orchestrator emits
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub async fn run(&self, queries: Vec<QuerySpec>) -> BatchResult {
        self.run_with_cancel(queries, &CancellationToken::new()).await
    }

    /// Run every query and return exactly one outcome per distinct ref id.
    ///
    /// Queries that have not finished when `cancel` fires report `Cancelled`;
    /// outcomes already produced are kept.
    pub async fn run_with_cancel(&self, queries: Vec<QuerySpec>, cancel: &CancellationToken) -> BatchResult {
        let batch_id = Uuid::new_v4();
        let batch_span = info_span!(parent: &self.span, "batch", %batch_id, queries = queries.len());

        async move {
            let queue = Self::dedupe(queries);
            let ref_ids: Vec<String> = queue.iter().map(|q| q.ref_id.clone()).collect();
            let workers = self.max_concurrency.min(queue.len());
            info!("Running {} queries on {} workers", queue.len(), workers);

            let queue = Arc::new(Mutex::new(queue));
            let (tx, mut rx) = mpsc::unbounded_channel::<(String, QueryOutcome)>();

            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    let worker_fut = Self::worker(
                        worker,
                        self.pool.clone(),
                        queue.clone(),
                        tx.clone(),
                        cancel.clone(),
                    );
                    tokio::spawn(worker_fut.in_current_span())
                })
                .collect();
            drop(tx);

            let mut result = BatchResult::new();
            while let Some((ref_id, outcome)) = rx.recv().await {
                result.insert(ref_id, outcome);
            }

            for joined in futures::future::join_all(handles).await {
                if let Err(err) = joined {
                    warn!("Worker task failed: {}", err);
                }
            }

            // Anything still missing was never reported by a worker
            for ref_id in ref_ids {
                if !result.contains(&ref_id) {
                    let err = if cancel.is_cancelled() {
                        QueryError::Cancelled
                    } else {
                        QueryError::Internal("query was not executed".to_string())
                    };
                    result.insert(ref_id, err.into());
                }
            }

            info!("Batch finished with {} outcomes", result.len());
            result
        }
        .instrument(batch_span)
        .await
    }

    /// Keep the first query of each ref id
    fn dedupe(queries: Vec<QuerySpec>) -> VecDeque<QuerySpec> {
        let mut seen = HashSet::new();
        queries
            .into_iter()
            .filter(|q| {
                let fresh = seen.insert(q.ref_id.clone());
                if !fresh {
                    warn!("Skipping duplicate query ref id {}", q.ref_id);
                }
                fresh
            })
            .collect()
    }

    async fn worker(
        worker: usize,
        pool: SqlitePool,
        queue: Arc<Mutex<VecDeque<QuerySpec>>>,
        results: mpsc::UnboundedSender<(String, QueryOutcome)>,
        cancel: CancellationToken,
    ) {
        loop {
            let Some(spec) = queue.lock().pop_front() else {
                break;
            };

            let query_span = info_span!("query", worker, ref_id = %spec.ref_id);
            let outcome = Self::run_one(&pool, &spec, &cancel).instrument(query_span).await;

            if results.send((spec.ref_id, outcome)).is_err() {
                break;
            }
        }
    }

    async fn run_one(pool: &SqlitePool, spec: &QuerySpec, cancel: &CancellationToken) -> QueryOutcome {
        if cancel.is_cancelled() {
            return QueryError::Cancelled.into();
        }

        let conn = match pool.acquire_with_cancel(cancel).await {
            Ok(conn) => conn,
            Err(crate::error::PoolError::Cancelled) => return QueryError::Cancelled.into(),
            Err(err) => {
                warn!("Failed to borrow connection: {}", err);
                return QueryError::ConnectionError(err).into();
            }
        };

        let result = QueryExecutor::execute(conn, spec, cancel).await;
        match &result {
            Ok(frame) => debug!("Query produced {} rows", frame.row_count()),
            Err(err) => warn!("Query failed: {}", err),
        }
        result.into()
    }
}
