//! Compiled subscription filters
//!
//! A `where` argument is compiled once, at subscribe time, into a
//! [`FilterTree`]. Compilation is where every validation happens (unknown
//! fields, operators the scalar kind does not define, badly shaped values),
//! so evaluation can stay a pure, total function over event data.

mod compile;
mod evaluate;

pub use compile::{compile_node_where, compile_relationship_where};
pub use evaluate::{matches, EvaluationContext, RelationshipContext};

use std::fmt;

use serde_json::Value;

use crate::schema::ScalarKind;

/// Which object of an event a predicate reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The subscribing node
    Node,
    /// Relationship properties
    Edge,
    /// The node at the other end of the relationship
    OtherNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    In,
    Lt,
    Lte,
    Gt,
    Gte,
    StartsWith,
    EndsWith,
    Contains,
    Includes,
}

impl Operator {
    /// `where` key suffixes, longest first so `_NOT_IN` wins over `_IN`
    pub(crate) const SUFFIXES: &'static [(&'static str, Operator, bool)] = &[
        ("_NOT_STARTS_WITH", Operator::StartsWith, true),
        ("_NOT_ENDS_WITH", Operator::EndsWith, true),
        ("_NOT_CONTAINS", Operator::Contains, true),
        ("_NOT_INCLUDES", Operator::Includes, true),
        ("_STARTS_WITH", Operator::StartsWith, false),
        ("_ENDS_WITH", Operator::EndsWith, false),
        ("_CONTAINS", Operator::Contains, false),
        ("_INCLUDES", Operator::Includes, false),
        ("_NOT_IN", Operator::In, true),
        ("_NOT", Operator::Eq, true),
        ("_LTE", Operator::Lte, false),
        ("_GTE", Operator::Gte, false),
        ("_IN", Operator::In, false),
        ("_LT", Operator::Lt, false),
        ("_GT", Operator::Gt, false),
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "EQ",
            Operator::In => "IN",
            Operator::Lt => "LT",
            Operator::Lte => "LTE",
            Operator::Gt => "GT",
            Operator::Gte => "GTE",
            Operator::StartsWith => "STARTS_WITH",
            Operator::EndsWith => "ENDS_WITH",
            Operator::Contains => "CONTAINS",
            Operator::Includes => "INCLUDES",
        }
    }

    pub fn is_string_match(self) -> bool {
        matches!(
            self,
            Operator::StartsWith | Operator::EndsWith | Operator::Contains
        )
    }

    pub fn is_ordering(self) -> bool {
        matches!(self, Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leaf of a filter tree: `{ field, operator, value }` plus what the schema
/// says about the field
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub scope: Scope,
    pub field: String,
    pub kind: ScalarKind,
    pub list: bool,
    pub nullable: bool,
    pub operator: Operator,
    pub negated: bool,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterTree {
    And(Vec<FilterTree>),
    Or(Vec<FilterTree>),
    Not(Box<FilterTree>),
    Leaf(Predicate),
    /// Applies only when the node in `scope` resolved to `type_name`;
    /// ignored otherwise
    OnType {
        scope: Scope,
        type_name: String,
        tree: Box<FilterTree>,
    },
    /// Passes only for events fired through relationship field `field`
    RelationshipField { field: String, tree: Box<FilterTree> },
}

impl FilterTree {
    /// A filter every event passes
    pub fn always() -> Self {
        FilterTree::And(Vec::new())
    }

    pub fn is_always(&self) -> bool {
        matches!(self, FilterTree::And(children) if children.is_empty())
    }

    /// Collapse single-child conjunctions
    pub(crate) fn and(mut children: Vec<FilterTree>) -> Self {
        children.retain(|child| !child.is_always());
        if children.len() == 1 {
            children.pop().unwrap_or_else(FilterTree::always)
        } else {
            FilterTree::And(children)
        }
    }
}
