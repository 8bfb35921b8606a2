//! Aggregation Registry
//!
//! Derives Druid aggregator descriptors from column expressions and keeps
//! them as an insertion-ordered set. Plain columns map onto native
//! aggregators; expressions with infix arithmetic become JavaScript
//! aggregators.

use regex::Regex;
use std::sync::OnceLock;

use crate::query::ast::{
    AggregationSpec, AggregatorType, ScriptLanguage, ScriptedAggregation, SimpleAggregation,
};
use crate::query::error::{QueryError, QueryResult};

/// Aggregate keywords usable in select and post-aggregation text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    Sum,
    Max,
    Min,
    Count,
}

impl AggregateKind {
    /// Parse from the keyword used in expressions
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Some(Self::Sum),
            "max" => Some(Self::Max),
            "min" => Some(Self::Min),
            "count" => Some(Self::Count),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Max => "max",
            Self::Min => "min",
            Self::Count => "count",
        }
    }

    /// Native aggregator for a plain column
    fn native_type(&self) -> AggregatorType {
        match self {
            Self::Sum => AggregatorType::DoubleSum,
            Self::Max => AggregatorType::DoubleMax,
            Self::Min => AggregatorType::DoubleMin,
            Self::Count => AggregatorType::Count,
        }
    }
}

impl std::fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// `"<keyword>(<expression>)"`, the name used when no alias is given
pub fn canonical_name(kind: AggregateKind, expr: &str) -> String {
    format!("{}({})", kind.keyword(), expr.trim())
}

/// Whether a column expression contains infix arithmetic
pub fn has_arithmetic(expr: &str) -> bool {
    expr.contains(['+', '*', '/']) || expr.contains(" - ")
}

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("valid identifier regex"))
}

/// Distinct field names referenced by an expression, in order of appearance
pub fn field_names(expr: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for m in identifier_regex().find_iter(expr) {
        // exponent of a numeric literal such as `1e3`
        if expr[..m.start()].ends_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        if !names.iter().any(|n| n == m.as_str()) {
            names.push(m.as_str().to_string());
        }
    }
    names
}

/// Build the aggregator for `kind` over `expr` named `name`
pub fn derive_aggregation(kind: AggregateKind, expr: &str, name: &str) -> AggregationSpec {
    let expr = expr.trim();

    if kind == AggregateKind::Count {
        if expr.is_empty() || expr == "*" {
            return AggregationSpec::Simple(SimpleAggregation {
                kind: AggregatorType::Count,
                name: name.to_string(),
                field_name: None,
                fields: None,
            });
        }
        let fields = expr
            .split(',')
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        return AggregationSpec::Simple(SimpleAggregation {
            kind: AggregatorType::Cardinality,
            name: name.to_string(),
            field_name: None,
            fields: Some(fields),
        });
    }

    if !has_arithmetic(expr) {
        return AggregationSpec::Simple(SimpleAggregation {
            kind: kind.native_type(),
            name: name.to_string(),
            field_name: Some(expr.to_string()),
            fields: None,
        });
    }

    let field_names = field_names(expr);
    let params = field_names.join(", ");
    let (step, combine, reset) = match kind {
        AggregateKind::Max => (
            format!("Math.max(current, ({}))", expr),
            "Math.max(partialA, partialB)",
            "-Infinity",
        ),
        AggregateKind::Min => (
            format!("Math.min(current, ({}))", expr),
            "Math.min(partialA, partialB)",
            "Infinity",
        ),
        _ => (format!("current + ({})", expr), "partialA + partialB", "0"),
    };

    AggregationSpec::Scripted(ScriptedAggregation {
        language: ScriptLanguage::Javascript,
        name: name.to_string(),
        field_names,
        aggregate_expr: format!("function(current, {}) {{ return {}; }}", params, step),
        combine_expr: format!("function(partialA, partialB) {{ return {}; }}", combine),
        reset_expr: format!("function() {{ return {}; }}", reset),
    })
}

/// Insertion-ordered set of aggregations with unique names
#[derive(Debug, Clone, Default)]
pub struct AggregationRegistry {
    specs: Vec<AggregationSpec>,
}

impl AggregationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an aggregate over a column expression and return its name
    ///
    /// An aliased aggregate is registered under exactly that name: an identical
    /// spec is a no-op and a different spec under the name is a schema
    /// violation. Without an alias the canonical `kw(expr)` name is preferred
    /// and an existing equivalent aggregation is shared.
    pub fn register(
        &mut self,
        kind: AggregateKind,
        expr: &str,
        name: Option<&str>,
    ) -> QueryResult<String> {
        match name {
            Some(alias) => self.insert(derive_aggregation(kind, expr, alias.trim())),
            None => self.register_shared(kind, expr, &canonical_name(kind, expr)),
        }
    }

    /// Register an unaliased aggregate and return the name it is reachable under
    ///
    /// An aggregation computing the same value is reused whatever it is called.
    /// Otherwise the aggregate is named `preferred`, falling back to the
    /// canonical `kw(expr)` name when `preferred` belongs to another aggregation.
    pub fn register_shared(
        &mut self,
        kind: AggregateKind,
        expr: &str,
        preferred: &str,
    ) -> QueryResult<String> {
        let spec = derive_aggregation(kind, expr, preferred);
        if let Some(existing) = self.specs.iter().find(|s| s.same_computation(&spec)) {
            tracing::debug!(aggregation = existing.name(), "sharing existing aggregation");
            return Ok(existing.name().to_string());
        }
        if self.contains(preferred) {
            return self.insert(derive_aggregation(kind, expr, &canonical_name(kind, expr)));
        }
        self.insert(spec)
    }

    /// Insert a prebuilt spec with the same set semantics as [`register`](Self::register)
    pub fn insert(&mut self, spec: AggregationSpec) -> QueryResult<String> {
        let name = spec.name().to_string();
        match self.get(&name) {
            Some(existing) if *existing == spec => {
                tracing::debug!(aggregation = %name, "aggregation already registered");
            }
            Some(_) => {
                return Err(QueryError::SchemaViolation(format!(
                    "aggregation '{}' is already defined with a different spec",
                    name
                )));
            }
            None => self.specs.push(spec),
        }
        Ok(name)
    }

    pub fn get(&self, name: &str) -> Option<&AggregationSpec> {
        self.specs.iter().find(|spec| spec.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn specs(&self) -> &[AggregationSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keyword_dispatch() {
        assert_eq!(AggregateKind::from_keyword("SUM"), Some(AggregateKind::Sum));
        assert_eq!(AggregateKind::from_keyword(" max "), Some(AggregateKind::Max));
        assert_eq!(AggregateKind::from_keyword("avg"), None);
    }

    #[test]
    fn test_plain_column_aggregations() {
        let spec = derive_aggregation(AggregateKind::Sum, "revenue", "revenue");
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({"type": "doubleSum", "name": "revenue", "fieldName": "revenue"})
        );

        let spec = derive_aggregation(AggregateKind::Min, "latency", "min(latency)");
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({"type": "doubleMin", "name": "min(latency)", "fieldName": "latency"})
        );
    }

    #[test]
    fn test_count_and_cardinality() {
        let spec = derive_aggregation(AggregateKind::Count, "*", "rows");
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({"type": "count", "name": "rows"})
        );

        let spec = derive_aggregation(AggregateKind::Count, "user_id, device", "users");
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({"type": "cardinality", "name": "users", "fields": ["user_id", "device"]})
        );
    }

    #[test]
    fn test_scripted_aggregation() {
        let spec = derive_aggregation(AggregateKind::Sum, "price * quantity", "sum(price * quantity)");
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({
                "type": "javascript",
                "name": "sum(price * quantity)",
                "fieldNames": ["price", "quantity"],
                "fnAggregate": "function(current, price, quantity) { return current + (price * quantity); }",
                "fnCombine": "function(partialA, partialB) { return partialA + partialB; }",
                "fnReset": "function() { return 0; }"
            })
        );

        let spec = derive_aggregation(AggregateKind::Max, "a - b", "spread");
        match spec {
            AggregationSpec::Scripted(agg) => {
                assert_eq!(
                    agg.aggregate_expr,
                    "function(current, a, b) { return Math.max(current, (a - b)); }"
                );
                assert_eq!(agg.field_names, vec!["a", "b"]);
            }
            other => panic!("expected scripted aggregation, got {:?}", other),
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = AggregationRegistry::new();
        let first = registry.register(AggregateKind::Sum, "x", None).unwrap();
        let second = registry.register(AggregateKind::Sum, "x", None).unwrap();
        assert_eq!(first, "sum(x)");
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);

        registry.register(AggregateKind::Sum, "x", Some("total")).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("total"));
    }

    #[test]
    fn test_register_name_conflict() {
        let mut registry = AggregationRegistry::new();
        registry.register(AggregateKind::Sum, "x", Some("x")).unwrap();
        let err = registry.register(AggregateKind::Max, "x", Some("x")).unwrap_err();
        assert!(matches!(err, QueryError::SchemaViolation(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_shares_equivalent_aggregation() {
        let mut registry = AggregationRegistry::new();
        let direct = registry
            .register_shared(AggregateKind::Sum, "clicks", "clicks")
            .unwrap();
        assert_eq!(direct, "clicks");

        let referenced = registry.register(AggregateKind::Sum, "clicks", None).unwrap();
        assert_eq!(referenced, "clicks");
        assert_eq!(registry.len(), 1);

        // An alias always gets its own entry
        registry.register(AggregateKind::Sum, "clicks", Some("total")).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_shared_falls_back_to_canonical_name() {
        let mut registry = AggregationRegistry::new();
        registry.register_shared(AggregateKind::Max, "cost", "cost").unwrap();
        let name = registry.register_shared(AggregateKind::Min, "cost", "cost").unwrap();
        assert_eq!(name, "min(cost)");

        let names: Vec<_> = registry.specs().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["cost", "min(cost)"]);
        assert_eq!(
            serde_json::to_value(registry.get("min(cost)").unwrap()).unwrap(),
            json!({"type": "doubleMin", "name": "min(cost)", "fieldName": "cost"})
        );
    }

    #[test]
    fn test_scripted_combine_and_reset_per_kind() {
        let steps = |kind| match derive_aggregation(kind, "a * b", "v") {
            AggregationSpec::Scripted(agg) => (agg.combine_expr, agg.reset_expr),
            other => panic!("expected scripted aggregation, got {:?}", other),
        };

        // Partials of a max or min are folded with the same operator, not summed
        let (combine, reset) = steps(AggregateKind::Max);
        assert_eq!(combine, "function(partialA, partialB) { return Math.max(partialA, partialB); }");
        assert_eq!(reset, "function() { return -Infinity; }");

        let (combine, reset) = steps(AggregateKind::Min);
        assert_eq!(combine, "function(partialA, partialB) { return Math.min(partialA, partialB); }");
        assert_eq!(reset, "function() { return Infinity; }");

        let (combine, reset) = steps(AggregateKind::Sum);
        assert_eq!(combine, "function(partialA, partialB) { return partialA + partialB; }");
        assert_eq!(reset, "function() { return 0; }");
    }

    #[test]
    fn test_field_names_skip_exponents() {
        assert_eq!(field_names("price * 1e3"), vec!["price"]);
        assert_eq!(field_names("x2 * 2.5E-3 + y"), vec!["x2", "y"]);

        let spec = derive_aggregation(AggregateKind::Sum, "price * 1e3", "scaled");
        assert_eq!(
            serde_json::to_value(&spec).unwrap()["fnAggregate"],
            "function(current, price) { return current + (price * 1e3); }"
        );
    }

    #[test]
    fn test_field_names_dedup() {
        assert_eq!(field_names("a * b + a / 2"), vec!["a", "b"]);
        assert!(has_arithmetic("a * b"));
        assert!(has_arithmetic("a - b"));
        assert!(!has_arithmetic("user-id"));
    }
}
