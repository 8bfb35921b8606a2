//! Expression Compiler
//!
//! Turns the three embedded mini-languages into query trees:
//!
//! - **Filters**: `a > 1 and (b < 2 or c = 3)` → [`FilterNode`]
//! - **Having**: `sum(clicks) > 100 or cost < 2` → [`HavingNode`]
//! - **Post-aggregations**: `sum(clicks) // sum(views) ** 100` → [`PostAggregationSpec`]
//!
//! # Splitting
//!
//! Connectives are found by substring search rather than tokenizing. For a
//! marker such as `" or "` the text is cut at every occurrence; if every
//! fragment has as many `(` as `)` the fragments become the children of one
//! n-ary node. Otherwise the cut points are tried one at a time from the
//! rightmost leftwards, and the first one leaving both halves balanced
//! yields a binary node.
//!
//! Markers are tried loosest first: `or` before `and`, and for arithmetic
//! `++`, `--`, `**`, `//` (doubled so single-character arithmetic inside an
//! aggregate call such as `sum(a * b)` is left alone).
//!
//! [`FilterNode`]: crate::query::ast::FilterNode
//! [`HavingNode`]: crate::query::ast::HavingNode
//! [`PostAggregationSpec`]: crate::query::ast::PostAggregationSpec

mod filter;
mod having;
mod post_aggregation;

pub use filter::compile_filter;
pub use having::compile_having;
pub use post_aggregation::compile_post_aggregation;
pub(crate) use post_aggregation::has_post_arithmetic;

use crate::query::error::{QueryError, QueryResult};
use crate::query::registry::AggregateKind;

pub(crate) const OR: &str = " or ";
pub(crate) const AND: &str = " and ";

/// Outcome of cutting an expression on one marker
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Split<'a> {
    /// Every occurrence was a valid cut point
    Nary(Vec<&'a str>),
    /// Only the returned cut point keeps both sides balanced
    Binary(&'a str, &'a str),
}

impl<'a> Split<'a> {
    pub(crate) fn into_parts(self) -> Vec<&'a str> {
        match self {
            Split::Nary(parts) => parts,
            Split::Binary(left, right) => vec![left, right],
        }
    }
}

/// Equal number of opening and closing parentheses
pub(crate) fn is_balanced(text: &str) -> bool {
    text.matches('(').count() == text.matches(')').count()
}

/// Whether the `(` at the start of `text` is closed by its last character
pub(crate) fn wrapped_in_parens(text: &str) -> bool {
    if !text.starts_with('(') || !text.ends_with(')') {
        return false;
    }
    let mut depth = 0i32;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return i == text.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

/// Strip fully enclosing parentheses, repeatedly
pub(crate) fn strip_parens(text: &str) -> &str {
    let mut text = text.trim();
    while wrapped_in_parens(text) {
        text = text[1..text.len() - 1].trim();
    }
    text
}

/// Cut `text` on `marker` following the balanced-split rule
///
/// Returns `None` when the marker is absent or no cut keeps both sides
/// balanced.
pub(crate) fn split_balanced<'a>(text: &'a str, marker: &str) -> Option<Split<'a>> {
    let cuts: Vec<usize> = text.match_indices(marker).map(|(i, _)| i).collect();
    if cuts.is_empty() {
        return None;
    }

    let fragments: Vec<&str> = text.split(marker).collect();
    if fragments.iter().all(|f| is_balanced(f)) {
        return Some(Split::Nary(fragments));
    }

    cuts.iter().rev().find_map(|&cut| {
        let left = &text[..cut];
        let right = &text[cut + marker.len()..];
        (is_balanced(left) && is_balanced(right)).then_some(Split::Binary(left, right))
    })
}

/// A boolean tree built from `and`/`or` connectives over leaves
pub(crate) trait BooleanTree: Sized {
    fn all(children: Vec<Self>) -> Option<Self>;
    fn any(children: Vec<Self>) -> Option<Self>;
    /// Compile a connective-free fragment; `None` when it has no known operator
    fn leaf(text: &str) -> QueryResult<Option<Self>>;
}

/// Shared driver for filter and having expressions
pub(crate) fn compile_boolean<T: BooleanTree>(text: &str) -> QueryResult<Option<T>> {
    let text = strip_parens(text);
    if text.is_empty() {
        return Err(QueryError::compile(text, "empty operand"));
    }

    let connectives: [(&str, fn(Vec<T>) -> Option<T>); 2] = [(OR, T::any), (AND, T::all)];
    for (marker, combine) in connectives {
        if let Some(split) = split_balanced(text, marker) {
            let mut children = Vec::new();
            for part in split.into_parts() {
                if let Some(child) = compile_boolean::<T>(part)? {
                    children.push(child);
                }
            }
            return Ok(combine(children));
        }
    }

    if text.contains(OR) || text.contains(AND) || !is_balanced(text) {
        return Err(QueryError::compile(
            text,
            "unbalanced parentheses: no split keeps both sides balanced",
        ));
    }

    T::leaf(text)
}

/// Split `keyword(inner)` into its aggregate kind and inner expression
pub(crate) fn parse_aggregate_call(text: &str) -> Option<(AggregateKind, &str)> {
    let text = text.trim();
    let open = text.find('(')?;
    let kind = AggregateKind::from_keyword(&text[..open])?;
    if !wrapped_in_parens(&text[open..]) {
        return None;
    }
    Some((kind, text[open + 1..text.len() - 1].trim()))
}

/// Remove one layer of matching single or double quotes
pub(crate) fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
