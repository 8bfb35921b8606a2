//! Having expressions
//!
//! Comparisons of an aggregation name against a number, joined with
//! `and` / `or`: `sum(clicks) > 100 and cost < 2.5`.

use nom::{
    bytes::complete::take_till1, character::complete::one_of, combinator::map_opt, IResult,
};

use super::{compile_boolean, BooleanTree};
use crate::query::ast::{HavingNode, HavingOp};
use crate::query::error::{QueryError, QueryResult};

/// Compile a having expression
///
/// Returns `Ok(None)` when no fragment carries `<`, `>` or `=`.
pub fn compile_having(text: &str) -> QueryResult<Option<HavingNode>> {
    let node = compile_boolean::<HavingNode>(text)?;
    tracing::debug!(expression = text, compiled = ?node, "compiled having");
    Ok(node)
}

impl BooleanTree for HavingNode {
    fn all(children: Vec<Self>) -> Option<Self> {
        HavingNode::all(children)
    }

    fn any(children: Vec<Self>) -> Option<Self> {
        HavingNode::any(children)
    }

    fn leaf(text: &str) -> QueryResult<Option<Self>> {
        let (rest, (aggregation, op)) = match parse_comparison(text) {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(fragment = text, "dropping having fragment with no recognised operator");
                return Ok(None);
            }
        };

        let aggregation = aggregation.trim();
        if aggregation.is_empty() {
            return Err(QueryError::compile(text, "missing aggregation name"));
        }

        let value: f64 = rest.trim().parse().map_err(|_| {
            QueryError::compile(text, format!("'{}' is not a number", rest.trim()))
        })?;

        Ok(Some(HavingNode::comparison(aggregation, op, value)))
    }
}

fn parse_comparison(input: &str) -> IResult<&str, (&str, HavingOp)> {
    let (input, aggregation) = take_till1(|c: char| matches!(c, '<' | '>' | '='))(input)?;
    let (input, op) = map_opt(one_of("<>="), HavingOp::from_symbol)(input)?;
    Ok((input, (aggregation, op)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_comparison() {
        let node = compile_having("sum(clicks) > 100").unwrap().unwrap();
        assert_eq!(
            node,
            HavingNode::comparison("sum(clicks)", HavingOp::GreaterThan, 100.0)
        );

        let node = compile_having("cost=2.5").unwrap().unwrap();
        assert_eq!(node, HavingNode::comparison("cost", HavingOp::EqualTo, 2.5));
    }

    #[test]
    fn test_connectives() {
        let node = compile_having("clicks > 10 and (cost < 2 or views = 0)")
            .unwrap()
            .unwrap();
        assert_eq!(
            node,
            HavingNode::And(vec![
                HavingNode::comparison("clicks", HavingOp::GreaterThan, 10.0),
                HavingNode::Or(vec![
                    HavingNode::comparison("cost", HavingOp::LessThan, 2.0),
                    HavingNode::comparison("views", HavingOp::EqualTo, 0.0),
                ]),
            ])
        );
    }

    #[test]
    fn test_value_must_be_numeric() {
        let err = compile_having("clicks > many").unwrap_err();
        assert!(matches!(err, QueryError::Compile { .. }));

        // `>=` is not a having operator; the `=` is left in the value
        let err = compile_having("clicks >= 1").unwrap_err();
        assert!(matches!(err, QueryError::Compile { .. }));
    }

    #[test]
    fn test_no_operator_is_dropped() {
        assert_eq!(compile_having("clicks").unwrap(), None);
    }
}
