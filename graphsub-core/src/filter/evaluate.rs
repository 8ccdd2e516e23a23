use std::cmp::Ordering;

use serde_json::Value;

use super::{FilterTree, Operator, Predicate, Scope};
use crate::events::Properties;
use crate::schema::ScalarKind;

/// The data one subscription's filter is evaluated against
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Subscribing node; the post-image for updates
    pub node: &'a Properties,
    pub node_type: &'a str,
    pub relationship: Option<RelationshipContext<'a>>,
}

#[derive(Debug, Clone, Copy)]
pub struct RelationshipContext<'a> {
    /// Relationship field on the subscribing type the event fired through
    pub field_name: &'a str,
    pub edge: &'a Properties,
    pub other_node: &'a Properties,
    /// `None` when the other node only resolved to interfaces
    pub other_type: Option<&'a str>,
}

impl<'a> EvaluationContext<'a> {
    pub fn node(node: &'a Properties, node_type: &'a str) -> Self {
        Self {
            node,
            node_type,
            relationship: None,
        }
    }

    pub fn with_relationship(mut self, relationship: RelationshipContext<'a>) -> Self {
        self.relationship = Some(relationship);
        self
    }

    fn properties(&self, scope: Scope) -> Option<&'a Properties> {
        match scope {
            Scope::Node => Some(self.node),
            Scope::Edge => self.relationship.map(|r| r.edge),
            Scope::OtherNode => self.relationship.map(|r| r.other_node),
        }
    }

    fn resolved_type(&self, scope: Scope) -> Option<&'a str> {
        match scope {
            Scope::Node => Some(self.node_type),
            Scope::Edge => None,
            Scope::OtherNode => self.relationship.and_then(|r| r.other_type),
        }
    }
}

/// Evaluate a compiled filter. Total: data that does not fit the predicate
/// is a non-match, never an error.
pub fn matches(ctx: &EvaluationContext<'_>, tree: &FilterTree) -> bool {
    evaluate(ctx, tree).unwrap_or(false)
}

/// `None` when the tree cannot be decided on this event: a required field is
/// missing or holds a value of the wrong shape. Negation keeps `None`, so
/// `NOT` never turns unusable data into a match.
fn evaluate(ctx: &EvaluationContext<'_>, tree: &FilterTree) -> Option<bool> {
    match tree {
        FilterTree::And(children) => {
            let mut decided = true;
            for child in children {
                match evaluate(ctx, child) {
                    Some(false) => return Some(false),
                    Some(true) => {}
                    None => decided = false,
                }
            }
            decided.then_some(true)
        }
        FilterTree::Or(children) => {
            let mut decided = true;
            for child in children {
                match evaluate(ctx, child) {
                    Some(true) => return Some(true),
                    Some(false) => {}
                    None => decided = false,
                }
            }
            decided.then_some(false)
        }
        FilterTree::Not(child) => evaluate(ctx, child).map(|result| !result),
        FilterTree::Leaf(predicate) => {
            evaluate_predicate(predicate, ctx.properties(predicate.scope)?)
        }
        FilterTree::OnType {
            scope,
            type_name,
            tree,
        } => match ctx.resolved_type(*scope) {
            Some(resolved) if resolved == type_name => evaluate(ctx, tree),
            // Branches for other concrete types do not apply
            _ => Some(true),
        },
        FilterTree::RelationshipField { field, tree } => match ctx.relationship {
            Some(relationship) if relationship.field_name == field => evaluate(ctx, tree),
            _ => Some(false),
        },
    }
}

fn evaluate_predicate(predicate: &Predicate, properties: &Properties) -> Option<bool> {
    let actual = properties.get(&predicate.field).filter(|v| !v.is_null());

    if predicate.operator == Operator::Eq && predicate.value.is_null() {
        return Some(actual.is_none() != predicate.negated);
    }

    let Some(actual) = actual else {
        // A legitimately absent value fails positive operators only
        return predicate.nullable.then_some(predicate.negated);
    };

    let result = match predicate.operator {
        Operator::Eq => values_equal(predicate.kind, actual, &predicate.value),
        Operator::In => predicate
            .value
            .as_array()
            .map_or(false, |items| {
                items.iter().any(|item| values_equal(predicate.kind, actual, item))
            }),
        Operator::Includes => actual
            .as_array()?
            .iter()
            .any(|item| values_equal(predicate.kind, item, &predicate.value)),
        Operator::StartsWith | Operator::EndsWith | Operator::Contains => {
            let (actual, expected) = (text(actual)?, predicate.value.as_str()?);
            match predicate.operator {
                Operator::StartsWith => actual.starts_with(expected),
                Operator::EndsWith => actual.ends_with(expected),
                _ => actual.contains(expected),
            }
        }
        Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => {
            let ordering = compare(predicate.kind, actual, &predicate.value)?;
            match predicate.operator {
                Operator::Lt => ordering == Ordering::Less,
                Operator::Lte => ordering != Ordering::Greater,
                Operator::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }
        }
    };

    Some(result != predicate.negated)
}

/// String form used by the string-matching operators; integer IDs match on
/// their decimal representation
fn text(value: &Value) -> Option<std::borrow::Cow<'_, str>> {
    match value {
        Value::String(s) => Some(s.as_str().into()),
        Value::Number(n) => Some(n.to_string().into()),
        _ => None,
    }
}

fn values_equal(kind: ScalarKind, actual: &Value, expected: &Value) -> bool {
    match kind {
        ScalarKind::Id => text(actual).is_some() && text(actual) == text(expected),
        ScalarKind::Int | ScalarKind::Float | ScalarKind::BigInt | ScalarKind::DateTime => {
            match compare(kind, actual, expected) {
                Some(ordering) => ordering == Ordering::Equal,
                None => actual == expected,
            }
        }
        _ => actual == expected,
    }
}

fn compare(kind: ScalarKind, actual: &Value, expected: &Value) -> Option<Ordering> {
    match kind {
        ScalarKind::DateTime => {
            let parse = |v: &Value| {
                v.as_str()
                    .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            };
            Some(parse(actual)?.cmp(&parse(expected)?))
        }
        ScalarKind::BigInt => {
            let parse = |v: &Value| match v {
                Value::String(s) => s.parse::<i128>().ok(),
                Value::Number(n) => n.as_i64().map(i128::from),
                _ => None,
            };
            Some(parse(actual)?.cmp(&parse(expected)?))
        }
        _ => actual.as_f64()?.partial_cmp(&expected.as_f64()?),
    }
}
