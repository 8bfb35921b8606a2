//! Filter expressions
//!
//! ```text
//! country = 'US'                  selector
//! clicks > 10                     bound, lowerStrict
//! clicks <= 10                    bound, upper
//! day < '2020-02-01'              bound, lexicographic
//! price ~ [10, 20]                bound, both sides inclusive
//! name regex '^foo'               regex
//! country in ["US", "CA"]         in
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1},
    character::complete::{multispace0, multispace1},
    combinator::value,
    sequence::terminated,
    IResult,
};

use super::{compile_boolean, unquote, BooleanTree};
use crate::query::ast::{BoundOrdering, FilterNode};
use crate::query::error::{QueryError, QueryResult};

/// Compile a filter expression
///
/// Returns `Ok(None)` when nothing in the expression carries a recognised
/// comparison operator.
pub fn compile_filter(text: &str) -> QueryResult<Option<FilterNode>> {
    let node = compile_boolean::<FilterNode>(text)?;
    tracing::debug!(expression = text, compiled = ?node, "compiled filter");
    Ok(node)
}

impl BooleanTree for FilterNode {
    fn all(children: Vec<Self>) -> Option<Self> {
        FilterNode::all(children)
    }

    fn any(children: Vec<Self>) -> Option<Self> {
        FilterNode::any(children)
    }

    fn leaf(text: &str) -> QueryResult<Option<Self>> {
        let (rest, (dimension, op)) = match parse_comparison(text) {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(fragment = text, "dropping filter fragment with no recognised operator");
                return Ok(None);
            }
        };

        let literal = rest.trim();
        if literal.is_empty() {
            return Err(QueryError::compile(text, "missing value"));
        }

        // Quoted bound literals compare as strings
        let ordering = if unquote(literal).len() < literal.len() {
            BoundOrdering::Lexicographic
        } else {
            BoundOrdering::Numeric
        };

        let node = match op {
            FilterOp::Eq => FilterNode::selector(dimension, unquote(literal)),
            FilterOp::Gt => {
                FilterNode::lower_bound(dimension, unquote(literal), true).with_ordering(ordering)
            }
            FilterOp::Gte => {
                FilterNode::lower_bound(dimension, unquote(literal), false).with_ordering(ordering)
            }
            FilterOp::Lt => {
                FilterNode::upper_bound(dimension, unquote(literal), true).with_ordering(ordering)
            }
            FilterOp::Lte => {
                FilterNode::upper_bound(dimension, unquote(literal), false).with_ordering(ordering)
            }
            FilterOp::Regex => FilterNode::regex(dimension, unquote(literal)),
            FilterOp::In => FilterNode::in_values(dimension, parse_array(text, literal)?),
            FilterOp::Range => {
                let bounds = parse_array(text, literal)?;
                match bounds.as_slice() {
                    [lower, upper] => FilterNode::range(dimension, lower.clone(), upper.clone()),
                    _ => {
                        return Err(QueryError::compile(
                            text,
                            "range expects a two-element array",
                        ))
                    }
                }
            }
        };
        Ok(Some(node))
    }
}

/// Comparison operators of a filter leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Range,
    Regex,
    In,
}

fn is_dimension_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '$' | ':')
}

/// Parse `<dimension> <op>` and leave the literal as remaining input
fn parse_comparison(input: &str) -> IResult<&str, (&str, FilterOp)> {
    let (input, _) = multispace0(input)?;
    let (input, dimension) = take_while1(is_dimension_char)(input)?;
    let (input, _) = multispace0(input)?;
    let (input, op) = alt((
        value(FilterOp::Gte, tag(">=")),
        value(FilterOp::Lte, tag("<=")),
        value(FilterOp::Gt, tag(">")),
        value(FilterOp::Lt, tag("<")),
        value(FilterOp::Eq, alt((tag("=="), tag("=")))),
        value(FilterOp::Range, tag("~")),
        value(FilterOp::Regex, terminated(tag_no_case("regex"), multispace1)),
        value(FilterOp::In, terminated(tag_no_case("in"), multispace1)),
    ))(input)?;
    Ok((input, (dimension, op)))
}

/// Parse a literal JSON-style array into string values
///
/// Single-quoted strings are accepted alongside double-quoted ones.
fn parse_array(fragment: &str, literal: &str) -> QueryResult<Vec<String>> {
    let parsed: serde_json::Value = serde_json::from_str(literal)
        .or_else(|_| serde_json::from_str(&literal.replace('\'', "\"")))
        .map_err(|e| QueryError::compile(fragment, format!("invalid array literal: {}", e)))?;

    let items = parsed
        .as_array()
        .ok_or_else(|| QueryError::compile(fragment, "expected an array literal"))?;

    Ok(items
        .iter()
        .map(|item| match item {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect())
}
