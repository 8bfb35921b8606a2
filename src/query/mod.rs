//! Druid Query Engine
//!
//! Builds Druid native JSON queries from a fluent API and small string
//! expressions, then executes them with ordered paging:
//!
//! - **AST**: Per-type query payloads and their tree nodes
//! - **Compiler**: Filter, having and post-aggregation expressions
//! - **Registry**: Named aggregations derived from `sum(...)`-style calls
//! - **Builder**: The fluent query surface
//! - **Executor**: Execution and the paging protocol
//!
//! # Expression Language
//!
//! ```text
//! filter:        country = 'US' and (clicks > 10 or views ~ [1, 5])
//! having:        revenue > 100 or clicks < 3
//! column:        sum(price * qty) as gross
//! arithmetic:    sum(clicks) // sum(views) ** 100 as ctr
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use claw_druid::query::{QueryBuilder, QueryExecutor};
//!
//! let mut builder = QueryBuilder::new("ads");
//! builder
//!     .last_days(7)
//!     .group(&["country"])
//!     .select("sum(clicks) // sum(views) as ctr")?
//!     .order(&["ctr desc"])
//!     .top(10);
//!
//! let result = executor.execute(&builder).await?;
//! for row in result.rows() {
//!     println!("{}", row);
//! }
//! ```

mod ast;
mod builder;
mod compiler;
mod error;
mod executor;
mod paging;
mod registry;
mod result;

pub use ast::{
    AggregationSpec, AggregatorType, ArithmeticOp, BoundOrdering, DataSourceMetadataQuery,
    Direction, FilterNode, GroupByQuery, HavingNode, HavingOp, Interval, LimitSpec,
    OrderByColumn, PostAggregationSpec, Query, QueryType, ScriptedAggregation,
    SegmentMetadataQuery, SelectQuery, SimpleAggregation, TimeBound, TimeBoundaryQuery,
    TimeseriesQuery, TopNMetric, TopNQuery, DEFAULT_GRANULARITY, DEFAULT_LIMIT,
};
pub use builder::{FilterValue, QueryBuilder, DEFAULT_PAGE_THRESHOLD};
pub use compiler::{compile_filter, compile_having, compile_post_aggregation};
pub use error::{QueryError, QueryResult};
pub use executor::QueryExecutor;
pub use paging::{Fingerprint, PagingCache, PagingIdentifiers, PagingSpec};
pub use registry::{AggregateKind, AggregationRegistry};
pub use result::ResultSet;
