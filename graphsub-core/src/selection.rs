//! Requested selection sets
//!
//! A subscription keeps the selection set of its root field so the payload
//! builder only materialises the branches that were asked for. An empty
//! selection set on an object means "every field".

use std::borrow::Cow;

use indexmap::IndexMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    pub items: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Field(Field),
    InlineFragment {
        type_condition: Option<String>,
        selection: SelectionSet,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub alias: Option<String>,
    pub selection: SelectionSet,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            selection: SelectionSet::default(),
        }
    }

    /// Key the field's value is written under
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Select a leaf field
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.items.push(Selection::Field(Field::new(name)));
        self
    }

    /// Select an object field with a sub-selection
    pub fn object(mut self, name: impl Into<String>, selection: SelectionSet) -> Self {
        self.items.push(Selection::Field(Field {
            selection,
            ..Field::new(name)
        }));
        self
    }

    pub fn aliased(
        mut self,
        alias: impl Into<String>,
        name: impl Into<String>,
        selection: SelectionSet,
    ) -> Self {
        self.items.push(Selection::Field(Field {
            name: name.into(),
            alias: Some(alias.into()),
            selection,
        }));
        self
    }

    /// Add an inline fragment `... on <type_condition> { ... }`
    pub fn on(mut self, type_condition: impl Into<String>, selection: SelectionSet) -> Self {
        self.items.push(Selection::InlineFragment {
            type_condition: Some(type_condition.into()),
            selection,
        });
        self
    }

    /// Fields that apply to an object, fragments flattened, grouped by
    /// response key in first-seen order.
    ///
    /// `applies` decides whether a fragment's type condition holds for the
    /// object being built.
    pub fn collect_fields<'s, F>(&'s self, applies: &F) -> IndexMap<&'s str, Vec<&'s Field>>
    where
        F: Fn(&str) -> bool,
    {
        let mut grouped = IndexMap::new();
        self.collect_into(applies, &mut grouped);
        grouped
    }

    fn collect_into<'s, F>(&'s self, applies: &F, grouped: &mut IndexMap<&'s str, Vec<&'s Field>>)
    where
        F: Fn(&str) -> bool,
    {
        for item in &self.items {
            match item {
                Selection::Field(field) => {
                    grouped.entry(field.response_key()).or_default().push(field);
                }
                Selection::InlineFragment {
                    type_condition,
                    selection,
                } => {
                    if type_condition.as_deref().map_or(true, applies) {
                        selection.collect_into(applies, grouped);
                    }
                }
            }
        }
    }

    /// Every type condition used directly on this object
    pub fn type_conditions(&self) -> Vec<&str> {
        let mut conditions = Vec::new();
        for item in &self.items {
            if let Selection::InlineFragment {
                type_condition,
                selection,
            } = item
            {
                if let Some(condition) = type_condition {
                    conditions.push(condition.as_str());
                }
                conditions.extend(selection.type_conditions());
            }
        }
        conditions
    }

    /// Whether any field named `name` is selected directly on this object,
    /// including through fragments
    pub fn selects(&self, name: &str) -> bool {
        self.items.iter().any(|item| match item {
            Selection::Field(field) => field.name == name,
            Selection::InlineFragment { selection, .. } => selection.selects(name),
        })
    }
}

/// Sub-selection of a field, merged across repeated occurrences
pub fn merged_selection<'s>(fields: &[&'s Field]) -> Cow<'s, SelectionSet> {
    match fields {
        [single] => Cow::Borrowed(&single.selection),
        _ => Cow::Owned(SelectionSet {
            items: fields
                .iter()
                .flat_map(|field| field.selection.items.iter().cloned())
                .collect(),
        }),
    }
}
