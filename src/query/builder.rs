//! Query Builder
//!
//! Fluent, chainable construction of a Druid query. Every operation mutates
//! the builder in place and returns it; operations that parse text return a
//! `Result` so compile errors surface at the call that introduced them.
//!
//! The builder tracks the query type as operations arrive: aggregating
//! upgrades `select` to `timeseries`, `group` switches to `groupBy`, and
//! `top` switches to `topN`. [`QueryBuilder::build`] turns the accumulated
//! state into a [`Query`] snapshot holding only the fields that type accepts.
//!
//! # Example
//!
//! ```rust,ignore
//! use claw_druid::query::{FilterValue, QueryBuilder};
//!
//! let mut builder = QueryBuilder::new("ads");
//! builder
//!     .group(&["country"])
//!     .sum(&["revenue"])?
//!     .filter([
//!         ("begin_date", FilterValue::from("2020-01-01")),
//!         ("end_date", FilterValue::from("2020-01-02")),
//!         ("country", FilterValue::from(vec!["US", "CA"])),
//!     ])
//!     .having("revenue > 100")?
//!     .order(&["revenue desc"]);
//! let query = builder.build()?;
//! ```

use regex::Regex;
use std::sync::OnceLock;

use crate::query::ast::*;
use crate::query::compiler::{
    compile_filter, compile_having, compile_post_aggregation, has_post_arithmetic,
    parse_aggregate_call,
};
use crate::query::error::{QueryError, QueryResult};
use crate::query::paging::PagingCache;
use crate::query::registry::{AggregateKind, AggregationRegistry};

/// Rows per page when no threshold is configured
pub const DEFAULT_PAGE_THRESHOLD: usize = 1000;

/// Reserved filter keys extracted into the query interval
const BEGIN_DATE: &str = "begin_date";
const END_DATE: &str = "end_date";

/// Right-hand side of a key/value filter condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    One(String),
    Many(Vec<String>),
}

impl FilterValue {
    fn first(&self) -> Option<&str> {
        match self {
            Self::One(v) => Some(v),
            Self::Many(vs) => vs.first().map(String::as_str),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::One(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::One(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::One(v.to_string())
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(vs: Vec<String>) -> Self {
        Self::Many(vs)
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(vs: Vec<&str>) -> Self {
        Self::Many(vs.into_iter().map(String::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for FilterValue {
    fn from(vs: [&str; N]) -> Self {
        Self::Many(vs.into_iter().map(String::from).collect())
    }
}

/// Mutable description of one query plus its paging state
#[derive(Debug)]
pub struct QueryBuilder {
    data_source: String,
    query_type: QueryType,
    granularity: String,
    dimensions: Vec<String>,
    metrics: Vec<String>,
    aggregations: AggregationRegistry,
    post_aggregations: Vec<PostAggregationSpec>,
    filters: Vec<FilterNode>,
    having: Option<HavingNode>,
    limit_spec: Option<LimitSpec>,
    ordering: Vec<OrderByColumn>,
    descending: bool,
    top_metric: Option<OrderByColumn>,
    threshold: Option<usize>,
    begin: Option<String>,
    end: Option<String>,
    bound: Option<TimeBound>,
    page_size: usize,
    paging: PagingCache,
}

impl QueryBuilder {
    /// Create a select query over a data source
    pub fn new(data_source: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            query_type: QueryType::Select,
            granularity: DEFAULT_GRANULARITY.to_string(),
            dimensions: Vec::new(),
            metrics: Vec::new(),
            aggregations: AggregationRegistry::new(),
            post_aggregations: Vec::new(),
            filters: Vec::new(),
            having: None,
            limit_spec: None,
            ordering: Vec::new(),
            descending: false,
            top_metric: None,
            threshold: None,
            begin: None,
            end: None,
            bound: None,
            page_size: DEFAULT_PAGE_THRESHOLD,
            paging: PagingCache::new(),
        }
    }

    // ------------------------------------------------------------
    // Grouping and columns
    // ------------------------------------------------------------

    /// Group by dimensions; switches to a groupBy query and clears metrics
    pub fn group(&mut self, dimensions: &[&str]) -> &mut Self {
        self.query_type = QueryType::GroupBy;
        for dimension in dimensions {
            push_unique(&mut self.dimensions, dimension.trim());
        }
        self.metrics.clear();
        self
    }

    /// Add comma-separated columns
    ///
    /// Each column is a plain dimension, an aggregate call such as
    /// `sum(x) as total`, or arithmetic over aggregates such as
    /// `sum(a) // sum(b) as ratio`. A failing column leaves the builder as it
    /// was before the call.
    pub fn select(&mut self, columns: &str) -> QueryResult<&mut Self> {
        self.atomically(|builder| {
            for column in split_columns(columns) {
                let (expr, alias) = split_alias(column);
                if expr.is_empty() {
                    continue;
                }

                if has_post_arithmetic(expr) {
                    builder.post_aggregate(expr, alias)?;
                } else if let Some((kind, inner)) = parse_aggregate_call(expr) {
                    builder.aggregations.register(kind, inner, alias)?;
                    builder.mark_aggregating();
                } else {
                    push_unique(&mut builder.dimensions, expr);
                }
            }
            Ok(())
        })
    }

    /// Metric columns returned by select queries
    pub fn metrics(&mut self, columns: &[&str]) -> &mut Self {
        for column in columns {
            push_unique(&mut self.metrics, column.trim());
        }
        self
    }

    // ------------------------------------------------------------
    // Aggregation
    // ------------------------------------------------------------

    /// Sum each column (`"revenue"`, `"price * qty as gross"`)
    pub fn sum(&mut self, columns: &[&str]) -> QueryResult<&mut Self> {
        self.aggregate(AggregateKind::Sum, columns)
    }

    pub fn max(&mut self, columns: &[&str]) -> QueryResult<&mut Self> {
        self.aggregate(AggregateKind::Max, columns)
    }

    pub fn min(&mut self, columns: &[&str]) -> QueryResult<&mut Self> {
        self.aggregate(AggregateKind::Min, columns)
    }

    /// Count rows (`"*"`) or distinct values of the listed fields
    pub fn count(&mut self, columns: &[&str]) -> QueryResult<&mut Self> {
        self.aggregate(AggregateKind::Count, columns)
    }

    /// Aggregations called directly are named after their column unless aliased
    ///
    /// An unaliased call shares an equivalent aggregation already on the
    /// query, and takes the `kw(column)` name when the column name is held by
    /// a different aggregation.
    fn aggregate(&mut self, kind: AggregateKind, columns: &[&str]) -> QueryResult<&mut Self> {
        if columns.is_empty() {
            return Ok(self);
        }
        self.atomically(|builder| {
            for column in columns {
                let (expr, alias) = split_alias(column);
                match alias {
                    Some(alias) => builder.aggregations.register(kind, expr, Some(alias))?,
                    None if kind == AggregateKind::Count && (expr.is_empty() || expr == "*") => {
                        builder.aggregations.register_shared(kind, expr, "count")?
                    }
                    None => builder.aggregations.register_shared(kind, expr, expr)?,
                };
            }
            builder.mark_aggregating();
            Ok(())
        })
    }

    /// Add an arithmetic column over aggregates, optionally renamed
    pub fn post_aggregate(&mut self, expr: &str, alias: Option<&str>) -> QueryResult<&mut Self> {
        self.atomically(|builder| {
            let mut post = compile_post_aggregation(expr, &mut builder.aggregations)?;
            if let Some(alias) = alias {
                post = post.renamed(alias);
            }
            if !builder.post_aggregations.contains(&post) {
                builder.post_aggregations.push(post);
            }
            builder.mark_aggregating();
            Ok(())
        })
    }

    /// Run `op`, restoring the column and aggregation state if it fails
    fn atomically<F>(&mut self, op: F) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut Self) -> QueryResult<()>,
    {
        let query_type = self.query_type;
        let dimensions = self.dimensions.clone();
        let aggregations = self.aggregations.clone();
        let post_aggregations = self.post_aggregations.clone();

        if let Err(e) = op(&mut *self) {
            self.query_type = query_type;
            self.dimensions = dimensions;
            self.aggregations = aggregations;
            self.post_aggregations = post_aggregations;
            return Err(e);
        }
        Ok(self)
    }

    fn mark_aggregating(&mut self) {
        if !self.query_type.is_aggregating() {
            self.query_type = QueryType::Timeseries;
        }
    }

    // ------------------------------------------------------------
    // Filtering
    // ------------------------------------------------------------

    /// AND key/value conditions onto the filter
    ///
    /// `begin_date` and `end_date` set the query interval. A single value
    /// becomes a `selector`, several values an `in` filter.
    pub fn filter<I, K, V>(&mut self, conditions: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FilterValue>,
    {
        for (key, value) in conditions {
            let key = key.as_ref();
            let value = value.into();
            match key {
                BEGIN_DATE => self.begin = value.first().map(String::from),
                END_DATE => self.end = value.first().map(String::from),
                _ => match value {
                    FilterValue::One(v) => self.filters.push(FilterNode::selector(key, v)),
                    FilterValue::Many(mut vs) => match vs.len() {
                        0 => tracing::debug!(dimension = key, "skipping empty value list"),
                        1 => self.filters.push(FilterNode::selector(key, vs.remove(0))),
                        _ => self.filters.push(FilterNode::in_values(key, vs)),
                    },
                },
            }
        }
        self
    }

    /// AND a compiled filter expression onto the filter
    pub fn filter_expr(&mut self, expr: &str) -> QueryResult<&mut Self> {
        if let Some(node) = compile_filter(expr)? {
            self.filters.push(node);
        }
        Ok(self)
    }

    /// Set the having clause from an expression
    ///
    /// An expression with no recognised comparison clears the clause.
    pub fn having(&mut self, expr: &str) -> QueryResult<&mut Self> {
        self.having = compile_having(expr)?;
        Ok(self)
    }

    pub fn interval(&mut self, begin: impl Into<String>, end: impl Into<String>) -> &mut Self {
        self.begin = Some(begin.into());
        self.end = Some(end.into());
        self
    }

    pub fn last_days(&mut self, days: i64) -> &mut Self {
        let interval = Interval::last_days(days);
        self.interval(interval.begin, interval.end)
    }

    pub fn granularity(&mut self, granularity: impl Into<String>) -> &mut Self {
        self.granularity = granularity.into();
        self
    }

    // ------------------------------------------------------------
    // Ordering and truncation
    // ------------------------------------------------------------

    /// Order by columns: `"clicks"`, `"clicks desc"`, or `"clicks", "desc"`
    ///
    /// GroupBy queries get a `limitSpec`; other types record the columns and a
    /// single `descending` flag.
    pub fn order(&mut self, columns: &[&str]) -> &mut Self {
        let columns = parse_order(columns);
        if self.query_type == QueryType::GroupBy {
            let limit = self.limit_spec.as_ref().map_or(DEFAULT_LIMIT, |spec| spec.limit);
            self.limit_spec = Some(LimitSpec::new(limit, columns));
        } else {
            self.descending = columns
                .iter()
                .any(|c| c.direction == Direction::Descending);
            if self.query_type == QueryType::TopN {
                self.top_metric = columns.first().cloned();
            }
            self.ordering = columns;
        }
        self
    }

    /// Cap the number of rows
    pub fn limit(&mut self, n: usize) -> &mut Self {
        self.limit_spec
            .get_or_insert_with(|| LimitSpec::new(n, Vec::new()))
            .limit = n;
        self
    }

    /// Switch to a topN query returning `n` rows
    ///
    /// Consumes any `limitSpec`, taking its first column as the ranking metric.
    pub fn top(&mut self, n: usize) -> &mut Self {
        self.query_type = QueryType::TopN;
        self.threshold = Some(n);
        if let Some(spec) = self.limit_spec.take() {
            if let Some(first) = spec.columns.into_iter().next() {
                self.top_metric = Some(first);
            }
        }
        if self.top_metric.is_none() {
            self.top_metric = self.ordering.first().cloned();
        }
        self
    }

    /// Rows per page for select queries
    pub fn page_size(&mut self, threshold: usize) -> &mut Self {
        self.page_size = threshold;
        self
    }

    // ------------------------------------------------------------
    // Metadata queries
    // ------------------------------------------------------------

    pub fn time_boundary(&mut self) -> &mut Self {
        self.query_type = QueryType::TimeBoundary;
        self.bound = None;
        self
    }

    pub fn min_time(&mut self) -> &mut Self {
        self.query_type = QueryType::TimeBoundary;
        self.bound = Some(TimeBound::MinTime);
        self
    }

    pub fn max_time(&mut self) -> &mut Self {
        self.query_type = QueryType::TimeBoundary;
        self.bound = Some(TimeBound::MaxTime);
        self
    }

    pub fn source_meta(&mut self) -> &mut Self {
        self.query_type = QueryType::DataSourceMetadata;
        self
    }

    pub fn segment_meta(&mut self) -> &mut Self {
        self.query_type = QueryType::SegmentMetadata;
        self
    }

    // ------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    pub fn data_source(&self) -> &str {
        &self.data_source
    }

    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    pub fn aggregations(&self) -> &[AggregationSpec] {
        self.aggregations.specs()
    }

    pub fn post_aggregations(&self) -> &[PostAggregationSpec] {
        &self.post_aggregations
    }

    /// Current filter root
    pub fn filter_node(&self) -> Option<FilterNode> {
        FilterNode::all(self.filters.clone())
    }

    pub fn having_node(&self) -> Option<&HavingNode> {
        self.having.as_ref()
    }

    pub fn limit_spec(&self) -> Option<&LimitSpec> {
        self.limit_spec.as_ref()
    }

    pub fn threshold(&self) -> Option<usize> {
        self.threshold
    }

    pub fn page_threshold(&self) -> usize {
        self.page_size
    }

    pub(crate) fn paging_mut(&mut self) -> &mut PagingCache {
        &mut self.paging
    }

    pub fn paging(&self) -> &PagingCache {
        &self.paging
    }

    // ------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------

    fn intervals(&self) -> QueryResult<Option<Vec<String>>> {
        match (&self.begin, &self.end) {
            (Some(begin), Some(end)) => Ok(Some(vec![Interval::new(begin, end).to_string()])),
            (None, None) => Ok(None),
            _ => Err(QueryError::SchemaViolation(
                "both begin_date and end_date are required for an interval".to_string(),
            )),
        }
    }

    /// Builder state the current query type has no field for
    fn dropped_fields(&self) -> Vec<&'static str> {
        use QueryType::*;

        let query_type = self.query_type;
        let metadata = matches!(query_type, TimeBoundary | SegmentMetadata | DataSourceMetadata);
        let mut dropped = Vec::new();

        if !self.dimensions.is_empty() && !matches!(query_type, Select | GroupBy | TopN) {
            dropped.push("dimensions");
        } else if query_type == TopN && self.dimensions.len() > 1 {
            dropped.push("dimensions");
        }
        if !self.metrics.is_empty() && query_type != Select {
            dropped.push("metrics");
        }
        if !self.aggregations.is_empty() && !query_type.is_aggregating() {
            dropped.push("aggregations");
        }
        if !self.post_aggregations.is_empty() && !query_type.is_aggregating() {
            dropped.push("postAggregations");
        }
        if self.limit_spec.is_some() && query_type != GroupBy {
            dropped.push("limitSpec");
        }
        if !self.ordering.is_empty() && (metadata || query_type == GroupBy) {
            dropped.push("ordering");
        }
        if !self.filters.is_empty() && matches!(query_type, SegmentMetadata | DataSourceMetadata) {
            dropped.push("filter");
        }
        if metadata && self.granularity != DEFAULT_GRANULARITY {
            dropped.push("granularity");
        }
        if self.begin.is_some() && matches!(query_type, TimeBoundary | DataSourceMetadata) {
            dropped.push("intervals");
        }
        if self.threshold.is_some() && query_type != TopN {
            dropped.push("threshold");
        }
        if self.bound.is_some() && query_type != TimeBoundary {
            dropped.push("bound");
        }
        dropped
    }

    /// Produce the query snapshot for the current type
    pub fn build(&self) -> QueryResult<Query> {
        if self.having.is_some() && self.query_type != QueryType::GroupBy {
            return Err(QueryError::SchemaViolation(format!(
                "having is only permitted on groupBy queries, not {}",
                self.query_type
            )));
        }

        let intervals = self.intervals()?;
        if intervals.is_none() && self.query_type.requires_intervals() {
            return Err(QueryError::SchemaViolation(format!(
                "{} queries require an interval (begin_date/end_date)",
                self.query_type
            )));
        }

        for field in self.dropped_fields() {
            tracing::warn!(query_type = %self.query_type, field, "dropping field not accepted by this query type");
        }

        let data_source = self.data_source.clone();
        let granularity = self.granularity.clone();
        let filter = self.filter_node();
        let aggregations = self.aggregations.specs().to_vec();
        let post_aggregations = self.post_aggregations.clone();

        let query = match self.query_type {
            QueryType::Select => Query::Select(SelectQuery {
                data_source,
                intervals: intervals.unwrap_or_default(),
                granularity,
                filter,
                dimensions: self.dimensions.clone(),
                metrics: self.metrics.clone(),
                descending: self.descending,
                paging_spec: None,
            }),
            QueryType::GroupBy => Query::GroupBy(GroupByQuery {
                data_source,
                intervals: intervals.unwrap_or_default(),
                granularity,
                filter,
                dimensions: self.dimensions.clone(),
                aggregations,
                post_aggregations,
                having: self.having.clone(),
                limit_spec: self.limit_spec.clone(),
            }),
            QueryType::Timeseries => Query::Timeseries(TimeseriesQuery {
                data_source,
                intervals: intervals.unwrap_or_default(),
                granularity,
                filter,
                aggregations,
                post_aggregations,
                descending: self.descending,
            }),
            QueryType::TopN => {
                let dimension = self.dimensions.first().cloned().ok_or_else(|| {
                    QueryError::SchemaViolation("topN queries require a dimension".to_string())
                })?;
                let metric = self
                    .top_metric
                    .as_ref()
                    .or(self.ordering.first())
                    .map(TopNMetric::from)
                    .ok_or_else(|| {
                        QueryError::SchemaViolation(
                            "topN queries require an ordering metric".to_string(),
                        )
                    })?;
                Query::TopN(TopNQuery {
                    data_source,
                    intervals: intervals.unwrap_or_default(),
                    granularity,
                    filter,
                    dimension,
                    metric,
                    threshold: self.threshold.unwrap_or(self.page_size),
                    aggregations,
                    post_aggregations,
                })
            }
            QueryType::TimeBoundary => Query::TimeBoundary(TimeBoundaryQuery {
                data_source,
                bound: self.bound,
                filter,
            }),
            QueryType::SegmentMetadata => Query::SegmentMetadata(SegmentMetadataQuery {
                data_source,
                intervals,
            }),
            QueryType::DataSourceMetadata => {
                Query::DataSourceMetadata(DataSourceMetadataQuery { data_source })
            }
        };

        Ok(query)
    }

    /// Pretty JSON rendering of the built query
    pub fn to_json(&self) -> QueryResult<String> {
        Ok(serde_json::to_string_pretty(&self.build()?)?)
    }
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !item.is_empty() && !list.iter().any(|existing| existing == item) {
        list.push(item.to_string());
    }
}

/// Split on commas outside parentheses
fn split_columns(columns: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in columns.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(columns[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(columns[start..].trim());
    parts
}

fn alias_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(.*\S)\s+as\s+([A-Za-z_][A-Za-z0-9_]*)$").expect("valid alias regex")
    })
}

/// Split `expr as alias` into its parts
fn split_alias(column: &str) -> (&str, Option<&str>) {
    let column = column.trim();
    match alias_regex().captures(column) {
        Some(caps) => match (caps.get(1), caps.get(2)) {
            (Some(expr), Some(alias)) => (expr.as_str().trim(), Some(alias.as_str())),
            _ => (column, None),
        },
        None => (column, None),
    }
}

/// Parse ordering arguments; a bare direction token applies to the column before it
fn parse_order(columns: &[&str]) -> Vec<OrderByColumn> {
    let mut parsed: Vec<OrderByColumn> = Vec::new();
    for column in columns {
        let mut words = column.split_whitespace();
        let Some(first) = words.next() else {
            continue;
        };

        if let Some(direction) = Direction::from_token(first) {
            if let Some(previous) = parsed.last_mut() {
                previous.direction = direction;
                continue;
            }
        }

        let direction = words
            .next()
            .and_then(Direction::from_token)
            .unwrap_or_default();
        parsed.push(OrderByColumn::new(first, direction));
    }
    parsed
}
