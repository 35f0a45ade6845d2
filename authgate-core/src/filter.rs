//! Filter trees and the filter algebra
//!
//! A [`Filter`] is an entity-agnostic tree of field conditions joined by
//! `And`/`Or` combinators. Three sources of constraints are combined with
//! [`and_all`] during request handling: the consolidated ACL filter, the
//! caller-supplied filter, and any filter inherited from a parent
//! relationship scope or attached by a before-hook.
//!
//! # Combining Semantics
//!
//! - `None` means "no constraint" and is the identity for AND.
//! - Nested combinators of the same kind are flattened rather than nested,
//!   to keep trees shallow and debuggable.
//! - Duplicate branches are dropped, so repeated application is idempotent.
//! - An unconstrained (absent) disjunct makes a whole OR unconstrained.
//!
//! # Residual Evaluation
//!
//! [`matches`] evaluates a filter against a JSON record using two-valued
//! logic: a missing field or a type mismatch yields `false` for the
//! condition, never an error. It is the fallback path when a provider
//! cannot execute a clause natively.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A dot-separated field path.
///
/// A single segment addresses a field on the current entity. Additional
/// segments traverse relationship fields into related entities, implying a
/// join or cross-provider correlation when executed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Build a path from explicit segments
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Parse a dot-separated path such as `assignee.username`
    pub fn parse(path: &str) -> Self {
        Self(path.split('.').map(str::to_string).collect())
    }

    /// Path segments in traversal order
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// First segment (the field on the current entity)
    pub fn head(&self) -> &str {
        &self.0[0]
    }

    /// True when the path addresses only the current entity's own field
    pub fn is_local(&self) -> bool {
        self.0.len() == 1
    }

    /// Number of relationship hops implied by the path
    pub fn hops(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    /// The path with the first segment removed.
    ///
    /// Only meaningful for non-local paths.
    pub fn tail(&self) -> FieldPath {
        FieldPath(self.0[1..].to_vec())
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Comparison operators supported by filter conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Field value is a member of the literal array
    In,
    /// String containment, or array membership when the field is an array
    Contains,
}

/// A single field condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub path: FieldPath,
    pub op: CompareOp,
    pub value: Value,
}

impl Condition {
    pub fn new(path: impl Into<FieldPath>, op: CompareOp, value: Value) -> Self {
        Self {
            path: path.into(),
            op,
            value,
        }
    }
}

/// An entity-agnostic constraint tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Cond(Condition),
}

impl Filter {
    /// Equality condition shorthand
    pub fn eq(path: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        Filter::Cond(Condition::new(path, CompareOp::Eq, value.into()))
    }

    /// Arbitrary condition shorthand
    pub fn cond(path: impl Into<FieldPath>, op: CompareOp, value: impl Into<Value>) -> Self {
        Filter::Cond(Condition::new(path, op, value.into()))
    }

    /// Every condition in the tree, in left-to-right order
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<&'a Condition>) {
        match self {
            Filter::And(branches) | Filter::Or(branches) => {
                for b in branches {
                    b.collect_conditions(out);
                }
            }
            Filter::Cond(c) => out.push(c),
        }
    }

    /// True when every condition addresses the current entity's own fields
    pub fn is_local(&self) -> bool {
        self.conditions().iter().all(|c| c.path.is_local())
    }
}

/// Combine constraints with AND.
///
/// `None` inputs contribute nothing (identity). Nested `And` branches are
/// flattened and duplicate branches dropped, so the operation is associative
/// and idempotent under repeated application; neither side's constraints are
/// ever lost. Returns `None` when no constraint remains.
pub fn and_all<I>(filters: I) -> Option<Filter>
where
    I: IntoIterator<Item = Option<Filter>>,
{
    let mut branches: Vec<Filter> = Vec::new();
    for filter in filters.into_iter().flatten() {
        flatten_into(true, filter, &mut branches);
    }
    combine(true, branches)
}

/// Combine constraints with OR.
///
/// Nested `Or` branches are flattened and duplicates dropped. An empty input
/// yields `None` ("no constraint"); callers that need "deny" semantics for
/// an empty disjunction must handle that before calling.
pub fn or_all(filters: Vec<Filter>) -> Option<Filter> {
    let mut branches: Vec<Filter> = Vec::new();
    for filter in filters {
        flatten_into(false, filter, &mut branches);
    }
    combine(false, branches)
}

fn flatten_into(conjunctive: bool, filter: Filter, out: &mut Vec<Filter>) {
    match (conjunctive, filter) {
        (true, Filter::And(inner)) | (false, Filter::Or(inner)) => {
            for f in inner {
                flatten_into(conjunctive, f, out);
            }
        }
        (_, other) => {
            if !out.contains(&other) {
                out.push(other);
            }
        }
    }
}

fn combine(conjunctive: bool, mut branches: Vec<Filter>) -> Option<Filter> {
    match branches.len() {
        0 => None,
        1 => Some(branches.remove(0)),
        _ if conjunctive => Some(Filter::And(branches)),
        _ => Some(Filter::Or(branches)),
    }
}

/// Evaluate a filter against a JSON record (two-valued logic).
///
/// Multi-segment paths navigate nested objects within the record; a path
/// that runs off the record yields `false` for that condition.
pub fn matches(record: &serde_json::Map<String, Value>, filter: &Filter) -> bool {
    match filter {
        Filter::And(branches) => branches.iter().all(|f| matches(record, f)),
        Filter::Or(branches) => branches.iter().any(|f| matches(record, f)),
        Filter::Cond(cond) => match lookup(record, cond.path.segments()) {
            Some(field) => compare(field, cond.op, &cond.value),
            None => false,
        },
    }
}

fn lookup<'a>(record: &'a serde_json::Map<String, Value>, segments: &[String]) -> Option<&'a Value> {
    let (head, rest) = segments.split_first()?;
    let value = record.get(head)?;
    if rest.is_empty() {
        Some(value)
    } else {
        lookup(value.as_object()?, rest)
    }
}

fn compare(field: &Value, op: CompareOp, literal: &Value) -> bool {
    match op {
        CompareOp::Eq => field == literal,
        CompareOp::Ne => field != literal,
        CompareOp::Gt => ordering(field, literal).map_or(false, |o| o.is_gt()),
        CompareOp::Gte => ordering(field, literal).map_or(false, |o| o.is_ge()),
        CompareOp::Lt => ordering(field, literal).map_or(false, |o| o.is_lt()),
        CompareOp::Lte => ordering(field, literal).map_or(false, |o| o.is_le()),
        CompareOp::In => literal
            .as_array()
            .map_or(false, |values| values.contains(field)),
        CompareOp::Contains => match (field, literal) {
            (Value::String(s), Value::String(needle)) => s.contains(needle.as_str()),
            (Value::Array(values), v) => values.contains(v),
            _ => false,
        },
    }
}

/// Partial ordering over JSON scalars; incompatible types are unordered.
fn ordering(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
