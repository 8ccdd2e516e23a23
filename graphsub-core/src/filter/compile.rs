use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::{FilterTree, Operator, Predicate, Scope};
use crate::errors::{SubscribeError, SubscribeResult};
use crate::schema::{
    camel_case, ConcreteType, FieldDefinition, RelationshipField, RelationshipTarget, ScalarKind,
    TypeRegistry,
};

const RELATIONSHIP_KEYS: [&str; 3] = ["relationship", "createdRelationship", "deletedRelationship"];

/// Compile the `where` argument of a CREATED/UPDATED/DELETED subscription
pub fn compile_node_where(target: &ConcreteType, where_arg: &Value) -> SubscribeResult<FilterTree> {
    if where_arg.is_null() {
        return Ok(FilterTree::always());
    }
    NodeFilterCompiler {
        scope: Scope::Node,
        owner: &target.name,
        fields: &target.fields,
        on_types: None,
    }
    .compile(where_arg)
}

/// Compile the `where` argument of a CONNECTED/DISCONNECTED subscription.
///
/// Accepted keys: the subscribing type's camel-cased name (or `node`) for a
/// filter on the subscribing node, `relationship` (or `createdRelationship`/
/// `deletedRelationship`) keyed by relationship field, and `AND`/`OR`/`NOT`.
pub fn compile_relationship_where(
    registry: &TypeRegistry,
    target: &ConcreteType,
    where_arg: &Value,
) -> SubscribeResult<FilterTree> {
    if where_arg.is_null() {
        return Ok(FilterTree::always());
    }
    let object = expect_object(&target.name, where_arg)?;
    let node_key = camel_case(&target.name);

    let mut children = Vec::with_capacity(object.len());
    for (key, value) in object {
        let child = match key.as_str() {
            "AND" => FilterTree::And(map_array(key, value, |item| {
                compile_relationship_where(registry, target, item)
            })?),
            "OR" => FilterTree::Or(map_array(key, value, |item| {
                compile_relationship_where(registry, target, item)
            })?),
            "NOT" => FilterTree::Not(Box::new(compile_relationship_where(
                registry, target, value,
            )?)),
            "node" => compile_node_where(target, value)?,
            k if k == node_key => compile_node_where(target, value)?,
            k if RELATIONSHIP_KEYS.contains(&k) => {
                compile_relationship_clauses(registry, target, value)?
            }
            _ => {
                return Err(SubscribeError::UnknownField {
                    type_name: target.name.clone(),
                    field: key.clone(),
                })
            }
        };
        children.push(child);
    }
    Ok(FilterTree::and(children))
}

/// `{ actors: {...}, directors: {...} }`: an event passes if it fired
/// through one of the named fields and that field's clause matches
fn compile_relationship_clauses(
    registry: &TypeRegistry,
    target: &ConcreteType,
    value: &Value,
) -> SubscribeResult<FilterTree> {
    let object = expect_object("relationship", value)?;
    if object.is_empty() {
        return Ok(FilterTree::always());
    }

    let mut clauses = Vec::with_capacity(object.len());
    for (field_name, clause) in object {
        let field = target.relationship(field_name).ok_or_else(|| SubscribeError::UnknownField {
            type_name: target.name.clone(),
            field: field_name.clone(),
        })?;
        let tree = if clause.is_null() {
            FilterTree::always()
        } else {
            compile_field_clause(registry, field, clause)?
        };
        clauses.push(FilterTree::RelationshipField {
            field: field_name.clone(),
            tree: Box::new(tree),
        });
    }
    Ok(FilterTree::Or(clauses))
}

fn compile_field_clause(
    registry: &TypeRegistry,
    field: &RelationshipField,
    clause: &Value,
) -> SubscribeResult<FilterTree> {
    match &field.target {
        RelationshipTarget::Union(union_name) => {
            let union = registry.union(union_name).ok_or_else(|| SubscribeError::UnknownType(
                union_name.clone(),
            ))?;
            let object = expect_object(&field.field_name, clause)?;
            let mut branches = Vec::with_capacity(object.len());
            for (member, member_clause) in object {
                if !union.members.contains(member) {
                    return Err(SubscribeError::UnknownField {
                        type_name: union_name.clone(),
                        field: member.clone(),
                    });
                }
                let concrete = registry
                    .concrete(member)
                    .ok_or_else(|| SubscribeError::UnknownType(member.clone()))?;
                let tree = compile_edge_node_clause(field, &concrete.fields, None, member_clause)?;
                branches.push(FilterTree::OnType {
                    scope: Scope::OtherNode,
                    type_name: member.clone(),
                    tree: Box::new(tree),
                });
            }
            Ok(FilterTree::and(branches))
        }
        RelationshipTarget::Interface(interface_name) => {
            let interface = registry
                .interface(interface_name)
                .ok_or_else(|| SubscribeError::UnknownType(interface_name.clone()))?;
            compile_edge_node_clause(field, &interface.fields, Some(registry), clause)
        }
        RelationshipTarget::Node(type_name) => {
            let concrete = registry
                .concrete(type_name)
                .ok_or_else(|| SubscribeError::UnknownType(type_name.clone()))?;
            compile_edge_node_clause(field, &concrete.fields, None, clause)
        }
    }
}

/// `{ edge: {...}, node: {...} }` for one relationship field or union member
fn compile_edge_node_clause(
    field: &RelationshipField,
    node_fields: &IndexMap<String, FieldDefinition>,
    on_types: Option<&TypeRegistry>,
    clause: &Value,
) -> SubscribeResult<FilterTree> {
    let object = expect_object(&field.field_name, clause)?;
    let mut children = Vec::with_capacity(object.len());

    for (key, value) in object {
        let child = match key.as_str() {
            "AND" => FilterTree::And(map_array(key, value, |item| {
                compile_edge_node_clause(field, node_fields, on_types, item)
            })?),
            "OR" => FilterTree::Or(map_array(key, value, |item| {
                compile_edge_node_clause(field, node_fields, on_types, item)
            })?),
            "NOT" => FilterTree::Not(Box::new(compile_edge_node_clause(
                field,
                node_fields,
                on_types,
                value,
            )?)),
            "edge" => NodeFilterCompiler {
                scope: Scope::Edge,
                owner: &field.field_name,
                fields: &field.properties,
                on_types: None,
            }
            .compile(value)?,
            "node" => NodeFilterCompiler {
                scope: Scope::OtherNode,
                owner: field.target.type_name(),
                fields: node_fields,
                on_types: on_types.map(|registry| (registry, &field.target)),
            }
            .compile(value)?,
            _ => {
                return Err(SubscribeError::UnknownField {
                    type_name: field.field_name.clone(),
                    field: key.clone(),
                })
            }
        };
        children.push(child);
    }
    Ok(FilterTree::and(children))
}

/// Compiles property filters (`title_STARTS_WITH`, `AND`, `_on`, ...) over a
/// fixed set of scalar fields
struct NodeFilterCompiler<'a> {
    scope: Scope,
    owner: &'a str,
    fields: &'a IndexMap<String, FieldDefinition>,
    /// Set for interface nodes, enabling `_on`
    on_types: Option<(&'a TypeRegistry, &'a RelationshipTarget)>,
}

impl NodeFilterCompiler<'_> {
    fn compile(&self, value: &Value) -> SubscribeResult<FilterTree> {
        if value.is_null() {
            return Ok(FilterTree::always());
        }
        let object = expect_object(self.owner, value)?;
        let mut children = Vec::with_capacity(object.len());

        for (key, value) in object {
            let child = match key.as_str() {
                "AND" => FilterTree::And(map_array(key, value, |item| self.compile(item))?),
                "OR" => FilterTree::Or(map_array(key, value, |item| self.compile(item))?),
                "NOT" => FilterTree::Not(Box::new(self.compile(value)?)),
                "_on" if self.on_types.is_some() => self.compile_on(value)?,
                _ => FilterTree::Leaf(self.compile_leaf(key, value)?),
            };
            children.push(child);
        }
        Ok(FilterTree::and(children))
    }

    fn compile_on(&self, value: &Value) -> SubscribeResult<FilterTree> {
        let Some((registry, target)) = self.on_types else {
            return Ok(FilterTree::always());
        };
        let possible = registry.possible_types(target);
        let object = expect_object("_on", value)?;

        let mut branches = Vec::with_capacity(object.len());
        for (type_name, branch) in object {
            let concrete = possible
                .iter()
                .find(|c| &c.name == type_name)
                .ok_or_else(|| SubscribeError::UnknownField {
                    type_name: target.type_name().to_string(),
                    field: type_name.clone(),
                })?;
            let tree = NodeFilterCompiler {
                scope: self.scope,
                owner: &concrete.name,
                fields: &concrete.fields,
                on_types: None,
            }
            .compile(branch)?;
            branches.push(FilterTree::OnType {
                scope: self.scope,
                type_name: type_name.clone(),
                tree: Box::new(tree),
            });
        }
        Ok(FilterTree::and(branches))
    }

    fn compile_leaf(&self, key: &str, value: &Value) -> SubscribeResult<Predicate> {
        let (field, operator, negated) = self.parse_key(key)?;
        check_operator(field, operator)?;
        let value = coerce_value(field, operator, value)?;

        Ok(Predicate {
            scope: self.scope,
            field: field.name.clone(),
            kind: field.kind,
            list: field.list,
            nullable: field.nullable,
            operator,
            negated,
            value,
        })
    }

    fn parse_key(&self, key: &str) -> SubscribeResult<(&FieldDefinition, Operator, bool)> {
        if let Some(field) = self.fields.get(key) {
            return Ok((field, Operator::Eq, false));
        }
        for (suffix, operator, negated) in Operator::SUFFIXES {
            if let Some(name) = key.strip_suffix(suffix) {
                if let Some(field) = self.fields.get(name) {
                    return Ok((field, *operator, *negated));
                }
            }
        }
        Err(SubscribeError::UnknownField {
            type_name: self.owner.to_string(),
            field: key.to_string(),
        })
    }
}

fn check_operator(field: &FieldDefinition, operator: Operator) -> SubscribeResult<()> {
    let supported = match operator {
        Operator::Eq => true,
        Operator::In => !field.list,
        Operator::Includes => field.list,
        Operator::StartsWith | Operator::EndsWith | Operator::Contains => {
            !field.list && field.kind.is_textual()
        }
        Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => {
            !field.list && (field.kind.is_numeric() || field.kind == ScalarKind::DateTime)
        }
    };

    if supported {
        Ok(())
    } else {
        let kind = if field.list {
            format!("[{}]", field.kind)
        } else {
            field.kind.to_string()
        };
        Err(SubscribeError::UnsupportedOperator {
            field: field.name.clone(),
            operator: operator.as_str().to_string(),
            kind,
        })
    }
}

/// Validate the shape of a filter value and normalise it for evaluation
fn coerce_value(field: &FieldDefinition, operator: Operator, value: &Value) -> SubscribeResult<Value> {
    let invalid = |reason: &str| SubscribeError::InvalidFilterValue {
        field: field.name.clone(),
        reason: reason.to_string(),
    };

    match operator {
        Operator::In => match value {
            Value::Array(items) => Ok(Value::Array(items.clone())),
            _ => Err(invalid("expected a list")),
        },
        Operator::StartsWith | Operator::EndsWith | Operator::Contains => match value {
            Value::String(_) => Ok(value.clone()),
            // IDs stored as integers are matched on their decimal form
            Value::Number(n) if field.kind == ScalarKind::Id => Ok(Value::String(n.to_string())),
            _ => Err(invalid("expected a string")),
        },
        Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => {
            if field.kind == ScalarKind::DateTime {
                let parsed = value
                    .as_str()
                    .map(chrono::DateTime::parse_from_rfc3339)
                    .and_then(Result::ok);
                match parsed {
                    Some(_) => Ok(value.clone()),
                    None => Err(invalid("expected an RFC 3339 timestamp")),
                }
            } else if value.is_number()
                || (field.kind == ScalarKind::BigInt
                    && value.as_str().map_or(false, |s| s.parse::<i128>().is_ok()))
            {
                Ok(value.clone())
            } else {
                Err(invalid("expected a number"))
            }
        }
        Operator::Eq | Operator::Includes => Ok(value.clone()),
    }
}

fn expect_object<'v>(owner: &str, value: &'v Value) -> SubscribeResult<&'v Map<String, Value>> {
    value.as_object().ok_or_else(|| SubscribeError::InvalidFilterValue {
        field: owner.to_string(),
        reason: "expected an object".to_string(),
    })
}

fn map_array<F>(key: &str, value: &Value, mut compile: F) -> SubscribeResult<Vec<FilterTree>>
where
    F: FnMut(&Value) -> SubscribeResult<FilterTree>,
{
    let items = value.as_array().ok_or_else(|| SubscribeError::InvalidFilterValue {
        field: key.to_string(),
        reason: "expected a list".to_string(),
    })?;
    items.iter().map(|item| compile(item)).collect()
}
