//! Query model
//!
//! Value types describing one Druid native query. Each query type carries
//! its own payload struct, so a serialized [`Query`] only ever contains the
//! fields Druid accepts for that `queryType`.
//!
//! # Wire shapes
//!
//! ```text
//! {"queryType": "groupBy", "dataSource": "ads", "dimensions": ["country"],
//!  "aggregations": [{"type": "doubleSum", "name": "revenue", "fieldName": "revenue"}],
//!  "filter": {"type": "in", "dimension": "country", "values": ["US", "CA"]},
//!  "intervals": ["2020-01-01/2020-01-02"], "granularity": "all"}
//! ```

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::query::error::{QueryError, QueryResult};
use crate::query::paging::PagingSpec;

/// Granularity used when none is requested: one bucket spanning all time
pub const DEFAULT_GRANULARITY: &str = "all";

/// Row cap attached to a groupBy `limitSpec` built by `order`
pub const DEFAULT_LIMIT: usize = 1_000_000;

/// Druid native query types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryType {
    Select,
    GroupBy,
    Timeseries,
    TopN,
    TimeBoundary,
    SegmentMetadata,
    DataSourceMetadata,
}

impl QueryType {
    /// Whether this query type aggregates rows
    pub fn is_aggregating(&self) -> bool {
        matches!(self, Self::GroupBy | Self::Timeseries | Self::TopN)
    }

    /// Whether Druid requires `intervals` for this query type
    pub fn requires_intervals(&self) -> bool {
        matches!(
            self,
            Self::Select | Self::GroupBy | Self::Timeseries | Self::TopN
        )
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Select => write!(f, "select"),
            Self::GroupBy => write!(f, "groupBy"),
            Self::Timeseries => write!(f, "timeseries"),
            Self::TopN => write!(f, "topN"),
            Self::TimeBoundary => write!(f, "timeBoundary"),
            Self::SegmentMetadata => write!(f, "segmentMetadata"),
            Self::DataSourceMetadata => write!(f, "dataSourceMetadata"),
        }
    }
}

/// Half-open time range rendered as `"<begin>/<end>"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub begin: String,
    pub end: String,
}

impl Interval {
    pub fn new(begin: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            begin: begin.into(),
            end: end.into(),
        }
    }

    /// Interval covering the last `days` days up to tomorrow (UTC dates)
    pub fn last_days(days: i64) -> Self {
        let today = chrono::Utc::now().date_naive();
        let begin = today - chrono::Duration::days(days);
        let end = today + chrono::Duration::days(1);
        Self::new(
            begin.format("%Y-%m-%d").to_string(),
            end.format("%Y-%m-%d").to_string(),
        )
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.begin, self.end)
    }
}

// ============================================
// Filters
// ============================================

/// Ordering used by `bound` filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundOrdering {
    #[default]
    Numeric,
    Lexicographic,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A row filter tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FilterNode {
    /// Exact match on a dimension value
    Selector { dimension: String, value: String },
    /// Range match; either side may be open
    Bound {
        dimension: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        lower: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        upper: Option<String>,
        #[serde(rename = "lowerStrict", skip_serializing_if = "is_false")]
        lower_strict: bool,
        #[serde(rename = "upperStrict", skip_serializing_if = "is_false")]
        upper_strict: bool,
        ordering: BoundOrdering,
    },
    /// Set membership
    In { dimension: String, values: Vec<String> },
    /// Java regular expression match
    Regex { dimension: String, pattern: String },
    And { fields: Vec<FilterNode> },
    Or { fields: Vec<FilterNode> },
}

impl FilterNode {
    pub fn selector(dimension: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Selector {
            dimension: dimension.into(),
            value: value.into(),
        }
    }

    /// `dimension > lower` (strict) or `dimension >= lower`
    pub fn lower_bound(dimension: impl Into<String>, lower: impl Into<String>, strict: bool) -> Self {
        Self::Bound {
            dimension: dimension.into(),
            lower: Some(lower.into()),
            upper: None,
            lower_strict: strict,
            upper_strict: false,
            ordering: BoundOrdering::Numeric,
        }
    }

    /// `dimension < upper` (strict) or `dimension <= upper`
    pub fn upper_bound(dimension: impl Into<String>, upper: impl Into<String>, strict: bool) -> Self {
        Self::Bound {
            dimension: dimension.into(),
            lower: None,
            upper: Some(upper.into()),
            lower_strict: false,
            upper_strict: strict,
            ordering: BoundOrdering::Numeric,
        }
    }

    /// Inclusive range on both sides
    pub fn range(
        dimension: impl Into<String>,
        lower: impl Into<String>,
        upper: impl Into<String>,
    ) -> Self {
        Self::Bound {
            dimension: dimension.into(),
            lower: Some(lower.into()),
            upper: Some(upper.into()),
            lower_strict: false,
            upper_strict: false,
            ordering: BoundOrdering::Numeric,
        }
    }

    pub fn in_values(dimension: impl Into<String>, values: Vec<String>) -> Self {
        Self::In {
            dimension: dimension.into(),
            values,
        }
    }

    /// Set the ordering of a bound filter; other nodes are returned unchanged
    pub fn with_ordering(mut self, ordering: BoundOrdering) -> Self {
        if let Self::Bound { ordering: current, .. } = &mut self {
            *current = ordering;
        }
        self
    }

    pub fn regex(dimension: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Regex {
            dimension: dimension.into(),
            pattern: pattern.into(),
        }
    }

    /// Conjunction, collapsing a single child to itself
    pub fn all(mut fields: Vec<FilterNode>) -> Option<Self> {
        match fields.len() {
            0 => None,
            1 => fields.pop(),
            _ => Some(Self::And { fields }),
        }
    }

    /// Disjunction, collapsing a single child to itself
    pub fn any(mut fields: Vec<FilterNode>) -> Option<Self> {
        match fields.len() {
            0 => None,
            1 => fields.pop(),
            _ => Some(Self::Or { fields }),
        }
    }
}

// ============================================
// Having
// ============================================

/// Comparison operators available to having clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HavingOp {
    LessThan,
    GreaterThan,
    EqualTo,
}

impl HavingOp {
    /// Parse from the single-character symbol
    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '<' => Some(Self::LessThan),
            '>' => Some(Self::GreaterThan),
            '=' => Some(Self::EqualTo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LessThan => "lessThan",
            Self::GreaterThan => "greaterThan",
            Self::EqualTo => "equalTo",
        }
    }
}

/// A post-grouping predicate over aggregate values
#[derive(Debug, Clone, PartialEq)]
pub enum HavingNode {
    Comparison {
        aggregation: String,
        op: HavingOp,
        value: f64,
    },
    And(Vec<HavingNode>),
    Or(Vec<HavingNode>),
}

impl HavingNode {
    pub fn comparison(aggregation: impl Into<String>, op: HavingOp, value: f64) -> Self {
        Self::Comparison {
            aggregation: aggregation.into(),
            op,
            value,
        }
    }

    pub fn all(mut children: Vec<HavingNode>) -> Option<Self> {
        match children.len() {
            0 => None,
            1 => children.pop(),
            _ => Some(Self::And(children)),
        }
    }

    pub fn any(mut children: Vec<HavingNode>) -> Option<Self> {
        match children.len() {
            0 => None,
            1 => children.pop(),
            _ => Some(Self::Or(children)),
        }
    }
}

impl Serialize for HavingNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Comparison {
                aggregation,
                op,
                value,
            } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("type", op.as_str())?;
                map.serialize_entry("aggregation", aggregation)?;
                map.serialize_entry("value", value)?;
                map.end()
            }
            Self::And(children) | Self::Or(children) => {
                let kind = if matches!(self, Self::And(_)) { "and" } else { "or" };
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", kind)?;
                map.serialize_entry("havingSpecs", children)?;
                map.end()
            }
        }
    }
}

// ============================================
// Aggregations
// ============================================

/// Engine-native aggregator types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregatorType {
    DoubleSum,
    DoubleMax,
    DoubleMin,
    Count,
    Cardinality,
}

/// Aggregator backed by a single native Druid aggregator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimpleAggregation {
    #[serde(rename = "type")]
    pub kind: AggregatorType,
    pub name: String,
    #[serde(rename = "fieldName", skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLanguage {
    Javascript,
}

/// Aggregator defined by accumulate/combine/reset scripts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptedAggregation {
    #[serde(rename = "type")]
    pub language: ScriptLanguage,
    pub name: String,
    #[serde(rename = "fieldNames")]
    pub field_names: Vec<String>,
    #[serde(rename = "fnAggregate")]
    pub aggregate_expr: String,
    #[serde(rename = "fnCombine")]
    pub combine_expr: String,
    #[serde(rename = "fnReset")]
    pub reset_expr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AggregationSpec {
    Simple(SimpleAggregation),
    Scripted(ScriptedAggregation),
}

impl AggregationSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Simple(agg) => &agg.name,
            Self::Scripted(agg) => &agg.name,
        }
    }

    /// Whether both specs compute the same value, ignoring their names
    pub fn same_computation(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Simple(a), Self::Simple(b)) => {
                a.kind == b.kind && a.field_name == b.field_name && a.fields == b.fields
            }
            (Self::Scripted(a), Self::Scripted(b)) => {
                a.language == b.language
                    && a.field_names == b.field_names
                    && a.aggregate_expr == b.aggregate_expr
                    && a.combine_expr == b.combine_expr
                    && a.reset_expr == b.reset_expr
            }
            _ => false,
        }
    }
}

// ============================================
// Post-aggregations
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArithmeticOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
}

/// Derived value computed from declared aggregations
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PostAggregationSpec {
    FieldAccess {
        name: String,
        #[serde(rename = "fieldName")]
        field_name: String,
    },
    Arithmetic {
        name: String,
        #[serde(rename = "fn")]
        op: ArithmeticOp,
        fields: Vec<PostAggregationSpec>,
    },
    Constant { name: String, value: f64 },
}

impl PostAggregationSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::FieldAccess { name, .. } | Self::Arithmetic { name, .. } | Self::Constant { name, .. } => {
                name
            }
        }
    }

    /// Replace the output name of this node
    pub fn renamed(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        match &mut self {
            Self::FieldAccess { name, .. } | Self::Arithmetic { name, .. } | Self::Constant { name, .. } => {
                *name = alias
            }
        }
        self
    }
}

// ============================================
// Ordering
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    /// Parse `asc`/`desc` style tokens
    pub fn from_token(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Ascending),
            "desc" | "descending" => Some(Self::Descending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderByColumn {
    pub dimension: String,
    pub direction: Direction,
}

impl OrderByColumn {
    pub fn new(dimension: impl Into<String>, direction: Direction) -> Self {
        Self {
            dimension: dimension.into(),
            direction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitSpecType {
    Default,
}

/// Ordering and truncation for groupBy queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitSpec {
    #[serde(rename = "type")]
    pub kind: LimitSpecType,
    pub limit: usize,
    pub columns: Vec<OrderByColumn>,
}

impl LimitSpec {
    pub fn new(limit: usize, columns: Vec<OrderByColumn>) -> Self {
        Self {
            kind: LimitSpecType::Default,
            limit,
            columns,
        }
    }
}

/// Ranking metric of a topN query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopNMetric {
    /// Highest values first
    Numeric(String),
    /// Lowest values first
    Inverted(String),
}

impl From<&OrderByColumn> for TopNMetric {
    fn from(column: &OrderByColumn) -> Self {
        match column.direction {
            Direction::Descending => Self::Numeric(column.dimension.clone()),
            Direction::Ascending => Self::Inverted(column.dimension.clone()),
        }
    }
}

impl Serialize for TopNMetric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Numeric(metric) => serializer.serialize_str(metric),
            Self::Inverted(metric) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "inverted")?;
                map.serialize_entry("metric", metric)?;
                map.end()
            }
        }
    }
}

/// Which end of the time boundary to report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeBound {
    MinTime,
    MaxTime,
}

// ============================================
// Per-type query payloads
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectQuery {
    pub data_source: String,
    pub intervals: Vec<String>,
    pub granularity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterNode>,
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    pub descending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paging_spec: Option<PagingSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupByQuery {
    pub data_source: String,
    pub intervals: Vec<String>,
    pub granularity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterNode>,
    pub dimensions: Vec<String>,
    pub aggregations: Vec<AggregationSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub post_aggregations: Vec<PostAggregationSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub having: Option<HavingNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_spec: Option<LimitSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeseriesQuery {
    pub data_source: String,
    pub intervals: Vec<String>,
    pub granularity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterNode>,
    pub aggregations: Vec<AggregationSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub post_aggregations: Vec<PostAggregationSpec>,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopNQuery {
    pub data_source: String,
    pub intervals: Vec<String>,
    pub granularity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterNode>,
    pub dimension: String,
    pub metric: TopNMetric,
    pub threshold: usize,
    pub aggregations: Vec<AggregationSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub post_aggregations: Vec<PostAggregationSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBoundaryQuery {
    pub data_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound: Option<TimeBound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentMetadataQuery {
    pub data_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intervals: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceMetadataQuery {
    pub data_source: String,
}

/// An immutable, serializable query snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "queryType", rename_all = "camelCase")]
pub enum Query {
    Select(SelectQuery),
    GroupBy(GroupByQuery),
    Timeseries(TimeseriesQuery),
    TopN(TopNQuery),
    TimeBoundary(TimeBoundaryQuery),
    SegmentMetadata(SegmentMetadataQuery),
    DataSourceMetadata(DataSourceMetadataQuery),
}

impl Query {
    pub fn query_type(&self) -> QueryType {
        match self {
            Self::Select(_) => QueryType::Select,
            Self::GroupBy(_) => QueryType::GroupBy,
            Self::Timeseries(_) => QueryType::Timeseries,
            Self::TopN(_) => QueryType::TopN,
            Self::TimeBoundary(_) => QueryType::TimeBoundary,
            Self::SegmentMetadata(_) => QueryType::SegmentMetadata,
            Self::DataSourceMetadata(_) => QueryType::DataSourceMetadata,
        }
    }

    pub fn data_source(&self) -> &str {
        match self {
            Self::Select(q) => &q.data_source,
            Self::GroupBy(q) => &q.data_source,
            Self::Timeseries(q) => &q.data_source,
            Self::TopN(q) => &q.data_source,
            Self::TimeBoundary(q) => &q.data_source,
            Self::SegmentMetadata(q) => &q.data_source,
            Self::DataSourceMetadata(q) => &q.data_source,
        }
    }

    /// Attach a paging directive; only select queries page
    pub fn with_paging(self, paging: PagingSpec) -> QueryResult<Self> {
        match self {
            Self::Select(mut q) => {
                q.paging_spec = Some(paging);
                Ok(Self::Select(q))
            }
            other => Err(QueryError::SchemaViolation(format!(
                "pagingSpec is not permitted on {} queries",
                other.query_type()
            ))),
        }
    }

    /// The same query with any paging directive removed
    pub fn without_paging(&self) -> Self {
        match self {
            Self::Select(q) => Self::Select(SelectQuery {
                paging_spec: None,
                ..q.clone()
            }),
            other => other.clone(),
        }
    }

    pub fn to_json(&self) -> QueryResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_serialization() {
        let filter = FilterNode::lower_bound("a", "1", true);
        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({"type": "bound", "dimension": "a", "lower": "1", "lowerStrict": true, "ordering": "numeric"})
        );

        let filter = FilterNode::in_values("country", vec!["US".into(), "CA".into()]);
        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({"type": "in", "dimension": "country", "values": ["US", "CA"]})
        );
    }

    #[test]
    fn test_lexicographic_bound() {
        let filter = FilterNode::upper_bound("day", "2020-02-01", false)
            .with_ordering(BoundOrdering::Lexicographic);
        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({"type": "bound", "dimension": "day", "upper": "2020-02-01", "ordering": "lexicographic"})
        );

        let selector = FilterNode::selector("a", "1").with_ordering(BoundOrdering::Lexicographic);
        assert_eq!(selector, FilterNode::selector("a", "1"));
    }

    #[test]
    fn test_same_computation_ignores_name() {
        let simple = |name: &str, field: &str| {
            AggregationSpec::Simple(SimpleAggregation {
                kind: AggregatorType::DoubleSum,
                name: name.to_string(),
                field_name: Some(field.to_string()),
                fields: None,
            })
        };
        assert!(simple("clicks", "clicks").same_computation(&simple("sum(clicks)", "clicks")));
        assert!(!simple("clicks", "clicks").same_computation(&simple("clicks", "views")));
    }

    #[test]
    fn test_interval_requirements() {
        assert!(QueryType::Select.requires_intervals());
        assert!(QueryType::TopN.requires_intervals());
        assert!(!QueryType::SegmentMetadata.requires_intervals());
        assert!(!QueryType::TimeBoundary.requires_intervals());
    }

    #[test]
    fn test_filter_collapse() {
        assert!(FilterNode::all(vec![]).is_none());
        let single = FilterNode::all(vec![FilterNode::selector("a", "1")]).unwrap();
        assert_eq!(single, FilterNode::selector("a", "1"));
        let both = FilterNode::any(vec![
            FilterNode::selector("a", "1"),
            FilterNode::selector("b", "2"),
        ])
        .unwrap();
        assert!(matches!(both, FilterNode::Or { ref fields } if fields.len() == 2));
    }

    #[test]
    fn test_having_serialization() {
        let having = HavingNode::And(vec![
            HavingNode::comparison("clicks", HavingOp::GreaterThan, 10.0),
            HavingNode::comparison("cost", HavingOp::LessThan, 2.5),
        ]);
        assert_eq!(
            serde_json::to_value(&having).unwrap(),
            json!({"type": "and", "havingSpecs": [
                {"type": "greaterThan", "aggregation": "clicks", "value": 10.0},
                {"type": "lessThan", "aggregation": "cost", "value": 2.5}
            ]})
        );
    }

    #[test]
    fn test_post_aggregation_serialization() {
        let post = PostAggregationSpec::Arithmetic {
            name: "ctr".into(),
            op: ArithmeticOp::Divide,
            fields: vec![
                PostAggregationSpec::FieldAccess {
                    name: "sum(clicks)".into(),
                    field_name: "sum(clicks)".into(),
                },
                PostAggregationSpec::Constant {
                    name: "100".into(),
                    value: 100.0,
                },
            ],
        };
        assert_eq!(
            serde_json::to_value(&post).unwrap(),
            json!({"type": "arithmetic", "name": "ctr", "fn": "/", "fields": [
                {"type": "fieldAccess", "name": "sum(clicks)", "fieldName": "sum(clicks)"},
                {"type": "constant", "name": "100", "value": 100.0}
            ]})
        );
        assert_eq!(post.renamed("rate").name(), "rate");
    }

    #[test]
    fn test_topn_metric_serialization() {
        let desc = TopNMetric::from(&OrderByColumn::new("clicks", Direction::Descending));
        assert_eq!(serde_json::to_value(&desc).unwrap(), json!("clicks"));

        let asc = TopNMetric::from(&OrderByColumn::new("clicks", Direction::Ascending));
        assert_eq!(
            serde_json::to_value(&asc).unwrap(),
            json!({"type": "inverted", "metric": "clicks"})
        );
    }

    #[test]
    fn test_query_type_tag() {
        let query = Query::DataSourceMetadata(DataSourceMetadataQuery {
            data_source: "ads".into(),
        });
        assert_eq!(
            query.to_json().unwrap(),
            json!({"queryType": "dataSourceMetadata", "dataSource": "ads"})
        );
        assert_eq!(query.query_type().to_string(), "dataSourceMetadata");
        assert!(query.with_paging(PagingSpec::first(10)).is_err());
    }

    #[test]
    fn test_interval_display() {
        let interval = Interval::new("2020-01-01", "2020-01-02");
        assert_eq!(interval.to_string(), "2020-01-01/2020-01-02");

        let recent = Interval::last_days(7);
        assert!(recent.begin < recent.end);
    }

    #[test]
    fn test_direction_tokens() {
        assert_eq!(Direction::from_token("DESC"), Some(Direction::Descending));
        assert_eq!(Direction::from_token("asc"), Some(Direction::Ascending));
        assert_eq!(Direction::from_token("sideways"), None);
    }
}
