//! Post-aggregation arithmetic
//!
//! ```text
//! sum(clicks) // sum(views)            ratio of two aggregates
//! sum(a * b) ++ max(c) ** 2            scripted aggregate plus scaled max
//! ```
//!
//! Leaves are aggregate calls, numeric constants, or names of aggregations
//! already declared on the query. Aggregate calls are registered as a side
//! effect and referenced through `fieldAccess`.

use super::{parse_aggregate_call, split_balanced, strip_parens};
use crate::query::ast::{ArithmeticOp, PostAggregationSpec};
use crate::query::error::{QueryError, QueryResult};
use crate::query::registry::AggregationRegistry;

/// Doubled arithmetic markers, loosest binding first
const ARITHMETIC: [(&str, ArithmeticOp); 4] = [
    (" ++ ", ArithmeticOp::Add),
    (" -- ", ArithmeticOp::Subtract),
    (" ** ", ArithmeticOp::Multiply),
    (" // ", ArithmeticOp::Divide),
];

/// Whether the text contains any doubled arithmetic marker
pub(crate) fn has_post_arithmetic(text: &str) -> bool {
    ARITHMETIC.iter().any(|(marker, _)| text.contains(marker))
}

/// Compile an arithmetic expression over aggregates
///
/// Each arithmetic node is named after its own source text; callers rename
/// the root when an alias is supplied.
pub fn compile_post_aggregation(
    text: &str,
    registry: &mut AggregationRegistry,
) -> QueryResult<PostAggregationSpec> {
    let text = strip_parens(text);
    if text.is_empty() {
        return Err(QueryError::compile(text, "empty operand"));
    }

    for (marker, op) in ARITHMETIC {
        if let Some(split) = split_balanced(text, marker) {
            let mut fields = Vec::new();
            for part in split.into_parts() {
                fields.push(compile_post_aggregation(part, registry)?);
            }
            return Ok(PostAggregationSpec::Arithmetic {
                name: text.to_string(),
                op,
                fields,
            });
        }
    }

    if has_post_arithmetic(text) {
        return Err(QueryError::compile(
            text,
            "unbalanced parentheses: no split keeps both sides balanced",
        ));
    }

    compile_operand(text, registry)
}

fn compile_operand(
    text: &str,
    registry: &mut AggregationRegistry,
) -> QueryResult<PostAggregationSpec> {
    if let Some((kind, inner)) = parse_aggregate_call(text) {
        let name = registry.register(kind, inner, None)?;
        return Ok(PostAggregationSpec::FieldAccess {
            name: name.clone(),
            field_name: name,
        });
    }

    if let Ok(value) = text.parse::<f64>() {
        return Ok(PostAggregationSpec::Constant {
            name: text.to_string(),
            value,
        });
    }

    if registry.contains(text) {
        return Ok(PostAggregationSpec::FieldAccess {
            name: text.to_string(),
            field_name: text.to_string(),
        });
    }

    Err(QueryError::compile(
        text,
        "expected an aggregate call, a number, or a declared aggregation",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::registry::AggregateKind;
    use serde_json::json;

    fn field(name: &str) -> PostAggregationSpec {
        PostAggregationSpec::FieldAccess {
            name: name.into(),
            field_name: name.into(),
        }
    }

    #[test]
    fn test_ratio_registers_aggregations() {
        let mut registry = AggregationRegistry::new();
        let post = compile_post_aggregation("sum(clicks) // sum(views)", &mut registry).unwrap();

        assert_eq!(
            post,
            PostAggregationSpec::Arithmetic {
                name: "sum(clicks) // sum(views)".into(),
                op: ArithmeticOp::Divide,
                fields: vec![field("sum(clicks)"), field("sum(views)")],
            }
        );
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("sum(clicks)"));
        assert!(registry.contains("sum(views)"));
    }

    #[test]
    fn test_precedence_and_constants() {
        let mut registry = AggregationRegistry::new();
        let post = compile_post_aggregation("sum(a) ++ max(b) ** 2", &mut registry).unwrap();
        let json = serde_json::to_value(&post).unwrap();

        assert_eq!(json["fn"], "+");
        assert_eq!(json["fields"][0], json!({"type": "fieldAccess", "name": "sum(a)", "fieldName": "sum(a)"}));
        assert_eq!(json["fields"][1]["fn"], "*");
        assert_eq!(json["fields"][1]["fields"][1], json!({"type": "constant", "name": "2", "value": 2.0}));
    }

    #[test]
    fn test_nary_same_operator() {
        let mut registry = AggregationRegistry::new();
        let post = compile_post_aggregation("sum(a) -- sum(b) -- sum(c)", &mut registry).unwrap();
        match post {
            PostAggregationSpec::Arithmetic { op, fields, .. } => {
                assert_eq!(op, ArithmeticOp::Subtract);
                assert_eq!(fields.len(), 3);
            }
            other => panic!("expected arithmetic, got {:?}", other),
        }
    }

    #[test]
    fn test_parenthesised_operand() {
        let mut registry = AggregationRegistry::new();
        let post =
            compile_post_aggregation("(sum(a) ++ sum(b)) // count(*)", &mut registry).unwrap();
        match post {
            PostAggregationSpec::Arithmetic { op, fields, .. } => {
                assert_eq!(op, ArithmeticOp::Divide);
                assert!(matches!(
                    &fields[0],
                    PostAggregationSpec::Arithmetic { op: ArithmeticOp::Add, .. }
                ));
                assert_eq!(fields[1], field("count(*)"));
            }
            other => panic!("expected arithmetic, got {:?}", other),
        }
    }

    #[test]
    fn test_inner_arithmetic_stays_in_aggregate() {
        let mut registry = AggregationRegistry::new();
        let post = compile_post_aggregation("sum(price * qty) // sum(qty)", &mut registry).unwrap();
        assert_eq!(post.name(), "sum(price * qty) // sum(qty)");

        let scripted = serde_json::to_value(registry.get("sum(price * qty)").unwrap()).unwrap();
        assert_eq!(scripted["type"], "javascript");
        assert_eq!(scripted["fieldNames"], json!(["price", "qty"]));
    }

    #[test]
    fn test_shared_column_is_deduplicated() {
        let mut registry = AggregationRegistry::new();
        registry.register(AggregateKind::Sum, "clicks", None).unwrap();
        compile_post_aggregation("sum(clicks) // sum(views)", &mut registry).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_call_reuses_directly_named_aggregation() {
        let mut registry = AggregationRegistry::new();
        registry
            .register_shared(AggregateKind::Sum, "clicks", "clicks")
            .unwrap();
        let post = compile_post_aggregation("sum(clicks) // sum(views)", &mut registry).unwrap();
        match post {
            PostAggregationSpec::Arithmetic { fields, .. } => {
                assert_eq!(fields, vec![field("clicks"), field("sum(views)")]);
            }
            other => panic!("expected arithmetic, got {:?}", other),
        }
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_declared_alias_reference() {
        let mut registry = AggregationRegistry::new();
        registry.register(AggregateKind::Sum, "clicks", Some("total")).unwrap();
        let post = compile_post_aggregation("total // 100", &mut registry).unwrap();
        match post {
            PostAggregationSpec::Arithmetic { fields, .. } => assert_eq!(fields[0], field("total")),
            other => panic!("expected arithmetic, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_operand_fails() {
        let mut registry = AggregationRegistry::new();
        let err = compile_post_aggregation("avg(x) ++ sum(y)", &mut registry).unwrap_err();
        assert!(matches!(err, QueryError::Compile { .. }));

        let err = compile_post_aggregation("(sum(x) ++ sum(y)", &mut registry).unwrap_err();
        assert!(matches!(err, QueryError::Compile { .. }));
    }
}
