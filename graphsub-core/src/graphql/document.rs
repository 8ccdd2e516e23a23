use std::collections::HashMap;

use async_graphql::parser::types::{
    DocumentOperations, FragmentDefinition, OperationDefinition, OperationType,
    Selection as DocumentSelection, SelectionSet as DocumentSelectionSet,
};
use async_graphql::parser::{parse_query, Positioned};
use async_graphql::{Name, Value as ConstValue};
use serde_json::Value;

use crate::errors::{SubscribeError, SubscribeResult};
use crate::schema::TypeRegistry;
use crate::selection::{Field, Selection, SelectionSet};
use crate::subscriptions::{Operation, SubscriptionRequest};

type Fragments = HashMap<Name, Positioned<FragmentDefinition>>;

/// Turn a GraphQL subscription document into a [`SubscriptionRequest`].
///
/// The document must hold one subscription operation (picked by
/// `operation_name` when there are several) with exactly one root field,
/// e.g. `movieCreated` or `movieActorsConnected`. `variables` is a JSON
/// object, or `null`.
pub fn parse_subscription(
    registry: &TypeRegistry,
    source: &str,
    variables: &Value,
    operation_name: Option<&str>,
) -> SubscribeResult<SubscriptionRequest> {
    let document = parse_query(source).map_err(|err| invalid(err.to_string()))?;
    let operation = pick_operation(&document.operations, operation_name)?;
    if operation.ty != OperationType::Subscription {
        let found = match operation.ty {
            OperationType::Query => "query",
            OperationType::Mutation => "mutation",
            OperationType::Subscription => "subscription",
        };
        return Err(invalid(format!("expected a subscription, found a {}", found)));
    }

    let mut root_fields = operation
        .selection_set
        .node
        .items
        .iter()
        .map(|item| match &item.node {
            DocumentSelection::Field(field) => Ok(&field.node),
            _ => Err(invalid("root selection must be a single field")),
        });
    let root = match (root_fields.next(), root_fields.next()) {
        (Some(field), None) => field?,
        _ => return Err(invalid("subscription must select exactly one root field")),
    };

    let (target, operation_kind) = Operation::parse_root_field(registry, root.name.node.as_str())?;

    let where_arg = match root.get_argument("where") {
        Some(argument) => argument
            .node
            .clone()
            .into_const_with(|name| variable(operation, variables, &name))?
            .into_json()
            .map_err(|err| invalid(format!("where argument is not valid JSON: {}", err)))?,
        None => Value::Null,
    };

    let mut visiting = Vec::new();
    let selection = lower(&root.selection_set.node, &document.fragments, &mut visiting)?;
    let response_key = root
        .alias
        .as_ref()
        .map(|alias| alias.node.to_string())
        .unwrap_or_else(|| root.name.node.to_string());

    Ok(SubscriptionRequest::new(target.name.clone(), operation_kind)
        .with_where(where_arg)
        .with_selection(selection)
        .with_response_key(response_key))
}

fn pick_operation<'d>(
    operations: &'d DocumentOperations,
    operation_name: Option<&str>,
) -> SubscribeResult<&'d OperationDefinition> {
    match (operations, operation_name) {
        (DocumentOperations::Single(operation), None) => Ok(&operation.node),
        (DocumentOperations::Single(_), Some(name)) => {
            Err(invalid(format!("unknown operation '{}'", name)))
        }
        (DocumentOperations::Multiple(operations), Some(name)) => operations
            .iter()
            .find(|(operation_name, _)| operation_name.as_str() == name)
            .map(|(_, operation)| &operation.node)
            .ok_or_else(|| invalid(format!("unknown operation '{}'", name))),
        (DocumentOperations::Multiple(operations), None) => {
            let mut all = operations.values();
            match (all.next(), all.next()) {
                (Some(operation), None) => Ok(&operation.node),
                _ => Err(invalid("operation name required for documents with several operations")),
            }
        }
    }
}

fn variable(
    operation: &OperationDefinition,
    variables: &Value,
    name: &Name,
) -> SubscribeResult<ConstValue> {
    if let Some(value) = variables.get(name.as_str()) {
        return ConstValue::from_json(value.clone())
            .map_err(|err| invalid(format!("variable ${}: {}", name, err)));
    }
    let default = operation
        .variable_definitions
        .iter()
        .find(|definition| definition.node.name.node == *name)
        .and_then(|definition| definition.node.default_value.as_ref())
        .map(|default| default.node.clone());
    Ok(default.unwrap_or(ConstValue::Null))
}

/// Lower a document selection set. Named fragment spreads become inline
/// fragments on the fragment's type condition.
fn lower(
    selection_set: &DocumentSelectionSet,
    fragments: &Fragments,
    visiting: &mut Vec<String>,
) -> SubscribeResult<SelectionSet> {
    let mut lowered = SelectionSet::new();
    for item in &selection_set.items {
        let selection = match &item.node {
            DocumentSelection::Field(field) => {
                let field = &field.node;
                Selection::Field(Field {
                    name: field.name.node.to_string(),
                    alias: field.alias.as_ref().map(|alias| alias.node.to_string()),
                    selection: lower(&field.selection_set.node, fragments, visiting)?,
                })
            }
            DocumentSelection::InlineFragment(fragment) => Selection::InlineFragment {
                type_condition: fragment
                    .node
                    .type_condition
                    .as_ref()
                    .map(|condition| condition.node.on.node.to_string()),
                selection: lower(&fragment.node.selection_set.node, fragments, visiting)?,
            },
            DocumentSelection::FragmentSpread(spread) => {
                let name = spread.node.fragment_name.node.as_str();
                if visiting.iter().any(|seen| seen == name) {
                    return Err(invalid(format!("fragment '{}' spreads itself", name)));
                }
                let definition = fragments
                    .iter()
                    .find(|(fragment_name, _)| fragment_name.as_str() == name)
                    .map(|(_, definition)| &definition.node)
                    .ok_or_else(|| invalid(format!("unknown fragment '{}'", name)))?;

                visiting.push(name.to_string());
                let selection = lower(&definition.selection_set.node, fragments, visiting)?;
                visiting.pop();

                Selection::InlineFragment {
                    type_condition: Some(definition.type_condition.node.on.node.to_string()),
                    selection,
                }
            }
        };
        lowered.items.push(selection);
    }
    Ok(lowered)
}

fn invalid(reason: impl Into<String>) -> SubscribeError {
    SubscribeError::InvalidDocument(reason.into())
}
