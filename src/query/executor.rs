//! Query Executor
//!
//! Sends built queries through a [`Transport`] and drives the paging
//! protocol for select queries.
//!
//! # Paging
//!
//! ```text
//! page(n) → fingerprint → fetch missing pages 1..n-1 in order → fetch page n
//!                              │                                    │
//!                              └── cache[p] = advance(token_p) ─────┘
//! ```
//!
//! The token for page `n` only exists once page `n-1` has been fetched, so
//! preparatory fetches run one after another and never concurrently.

use std::sync::Arc;
use std::time::Instant;

use crate::query::ast::{Query, QueryType};
use crate::query::builder::QueryBuilder;
use crate::query::error::{QueryError, QueryResult};
use crate::query::paging::{advance, Fingerprint, PagingSpec};
use crate::query::result::ResultSet;
use crate::transport::Transport;

/// Executes queries against a Druid endpoint
#[derive(Clone)]
pub struct QueryExecutor {
    transport: Arc<dyn Transport>,
}

impl QueryExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Build and execute the builder's query
    ///
    /// Select queries are sent with a first-page paging directive.
    pub async fn execute(&self, builder: &QueryBuilder) -> QueryResult<ResultSet> {
        let mut query = builder.build()?;
        if query.query_type() == QueryType::Select {
            query = query.with_paging(PagingSpec::first(builder.page_threshold()))?;
        }
        self.execute_query(&query).await
    }

    /// Execute a prebuilt query snapshot
    pub async fn execute_query(&self, query: &Query) -> QueryResult<ResultSet> {
        let start = Instant::now();
        let body = query.to_json()?;

        let raw = self.transport.post_json(&body).await?;

        let result = ResultSet::new(query.query_type(), raw, start.elapsed().as_millis() as u64);
        tracing::debug!(
            query_type = %query.query_type(),
            data_source = query.data_source(),
            rows = result.len(),
            elapsed_ms = result.execution_time_ms,
            "query executed"
        );
        Ok(result)
    }

    /// Fetch page `n` (1-based) of the builder's select query
    ///
    /// Any page before `n` whose continuation token is not cached yet is
    /// fetched first, in increasing order, and its token cached.
    pub async fn page(&self, builder: &mut QueryBuilder, n: u32) -> QueryResult<ResultSet> {
        if n == 0 {
            return Err(QueryError::InvalidPage(n));
        }

        let query = builder.build()?;
        if query.query_type() != QueryType::Select {
            return Err(QueryError::SchemaViolation(format!(
                "paging applies to select queries, not {}",
                query.query_type()
            )));
        }

        let fingerprint = Fingerprint::of(&query)?;
        let threshold = builder.page_threshold();

        let missing = builder.paging().missing_before(fingerprint, n);
        if missing.is_empty() {
            tracing::debug!(%fingerprint, page = n, "paging cache hit");
        } else {
            tracing::debug!(%fingerprint, page = n, missing = ?missing, "paging cache miss");
        }

        for p in missing {
            let token = builder
                .paging()
                .token_for(fingerprint, p)
                .ok_or(QueryError::ContinuationMissing { page: p - 1 })?;
            let paged = query.clone().with_paging(PagingSpec::resume(token, threshold))?;

            tracing::info!(%fingerprint, page = p, target = n, "prefetching page");
            let result = self.execute_query(&paged).await?;
            let identifiers = result
                .paging_identifiers()
                .ok_or(QueryError::ContinuationMissing { page: p })?;
            builder
                .paging_mut()
                .record(fingerprint, p, advance(&identifiers));
        }

        let token = builder
            .paging()
            .token_for(fingerprint, n)
            .ok_or(QueryError::ContinuationMissing { page: n - 1 })?;
        let paged = query.with_paging(PagingSpec::resume(token, threshold))?;

        tracing::info!(%fingerprint, page = n, "fetching page");
        let result = self.execute_query(&paged).await?;
        if let Some(identifiers) = result.paging_identifiers() {
            builder
                .paging_mut()
                .record(fingerprint, n, advance(&identifiers));
        }

        Ok(result)
    }
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("endpoint", &self.transport.endpoint())
            .finish()
    }
}
