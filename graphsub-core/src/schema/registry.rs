use indexmap::IndexMap;
use tracing::debug;

use super::{
    Direction, FieldDefinition, InterfaceDefinition, SchemaMetadata, TypeDefinition,
    UnionDefinition,
};
use crate::errors::{SchemaError, SchemaResult};

/// GraphQL object type name used for a node type inside event payloads
pub fn payload_type_name(type_name: &str) -> String {
    format!("{}EventPayload", type_name)
}

/// `Movie` -> `movie`, `TVShow` -> `tVShow`
pub fn camel_case(type_name: &str) -> String {
    let mut chars = type_name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `actors` -> `Actors`
pub fn pascal_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// What sits at the far end of a relationship field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipTarget {
    Node(String),
    Union(String),
    Interface(String),
}

impl RelationshipTarget {
    pub fn type_name(&self) -> &str {
        match self {
            RelationshipTarget::Node(name)
            | RelationshipTarget::Union(name)
            | RelationshipTarget::Interface(name) => name,
        }
    }

    pub fn is_polymorphic(&self) -> bool {
        !matches!(self, RelationshipTarget::Node(_))
    }
}

#[derive(Debug, Clone)]
pub struct RelationshipField {
    pub field_name: String,
    pub relationship_type: String,
    pub direction: Direction,
    pub target: RelationshipTarget,
    pub properties: IndexMap<String, FieldDefinition>,
}

#[derive(Debug, Clone)]
pub struct ConcreteType {
    pub name: String,
    pub fields: IndexMap<String, FieldDefinition>,
    pub relationships: IndexMap<String, RelationshipField>,
    pub interfaces: Vec<String>,
    pub unions: Vec<String>,
}

impl ConcreteType {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipField> {
        self.relationships.get(name)
    }

    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|i| i == interface)
    }

    pub fn payload_type_name(&self) -> String {
        payload_type_name(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct InterfaceType {
    pub name: String,
    pub fields: IndexMap<String, FieldDefinition>,
    pub implementers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UnionType {
    pub name: String,
    pub members: Vec<String>,
}

/// Outcome of resolving a node's type tag and labels.
///
/// `Partial` means no concrete type was recognised but some of the labels
/// name registered interfaces, so interface-common fields are still known.
#[derive(Debug, Clone)]
pub enum Resolution<'a> {
    Concrete(&'a ConcreteType),
    Partial(Vec<&'a InterfaceType>),
    NotFound,
}

impl<'a> Resolution<'a> {
    pub fn concrete(&self) -> Option<&'a ConcreteType> {
        match self {
            Resolution::Concrete(concrete) => Some(concrete),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, Resolution::NotFound)
    }

    /// Whether the resolved node is known to satisfy `interface`
    pub fn satisfies_interface(&self, interface: &str) -> bool {
        match self {
            Resolution::Concrete(concrete) => concrete.implements(interface),
            Resolution::Partial(interfaces) => interfaces.iter().any(|i| i.name == interface),
            Resolution::NotFound => false,
        }
    }
}

/// Static registry of schema types, built once at startup.
///
/// Maps each concrete type to its interfaces, union memberships and declared
/// fields, and answers the polymorphic questions the payload builder and the
/// filter evaluator need: which concrete type an event node is, and whether
/// it can stand in a given relationship field.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: IndexMap<String, ConcreteType>,
    interfaces: IndexMap<String, InterfaceType>,
    unions: IndexMap<String, UnionType>,
}

impl TypeRegistry {
    pub fn from_metadata(metadata: SchemaMetadata) -> SchemaResult<Self> {
        let SchemaMetadata {
            types,
            interfaces,
            unions,
        } = metadata;

        let mut names = std::collections::HashSet::new();
        for name in types
            .iter()
            .map(|t| &t.name)
            .chain(interfaces.iter().map(|i| &i.name))
            .chain(unions.iter().map(|u| &u.name))
        {
            if !names.insert(name.clone()) {
                return Err(SchemaError::DuplicateType(name.clone()));
            }
        }

        let mut registry = Self {
            types: IndexMap::new(),
            interfaces: IndexMap::new(),
            unions: IndexMap::new(),
        };

        for interface in interfaces {
            registry.add_interface(interface)?;
        }
        for union in unions {
            registry.add_union(union, &types)?;
        }
        for definition in types {
            registry.add_type(definition)?;
        }
        registry.link_memberships();
        registry.validate_relationship_targets()?;

        debug!(
            "Type registry built: {} types, {} interfaces, {} unions",
            registry.types.len(),
            registry.interfaces.len(),
            registry.unions.len()
        );

        Ok(registry)
    }

    fn add_interface(&mut self, definition: InterfaceDefinition) -> SchemaResult<()> {
        let fields = collect_fields(&definition.name, definition.fields)?;
        self.interfaces.insert(
            definition.name.clone(),
            InterfaceType {
                name: definition.name,
                fields,
                implementers: Vec::new(),
            },
        );
        Ok(())
    }

    fn add_union(&mut self, definition: UnionDefinition, types: &[TypeDefinition]) -> SchemaResult<()> {
        for member in &definition.members {
            if !types.iter().any(|t| &t.name == member) {
                return Err(SchemaError::InvalidUnionMember {
                    union: definition.name.clone(),
                    member: member.clone(),
                });
            }
        }
        self.unions.insert(
            definition.name.clone(),
            UnionType {
                name: definition.name,
                members: definition.members,
            },
        );
        Ok(())
    }

    fn add_type(&mut self, definition: TypeDefinition) -> SchemaResult<()> {
        let fields = collect_fields(&definition.name, definition.fields)?;

        for interface_name in &definition.implements {
            let interface = self.interfaces.get(interface_name).ok_or_else(|| {
                SchemaError::UnknownType {
                    referenced: interface_name.clone(),
                    by: definition.name.clone(),
                }
            })?;
            if let Some(missing) = interface.fields.keys().find(|f| !fields.contains_key(*f)) {
                return Err(SchemaError::MissingInterfaceField {
                    type_name: definition.name.clone(),
                    interface: interface_name.clone(),
                    field: missing.clone(),
                });
            }
        }

        let mut relationships = IndexMap::new();
        for relationship in definition.relationships {
            if fields.contains_key(&relationship.name) || relationships.contains_key(&relationship.name) {
                return Err(SchemaError::DuplicateField {
                    type_name: definition.name.clone(),
                    field: relationship.name,
                });
            }
            let properties = collect_fields(
                &format!("{}.{}", definition.name, relationship.name),
                relationship.properties,
            )?;
            relationships.insert(
                relationship.name.clone(),
                RelationshipField {
                    field_name: relationship.name,
                    relationship_type: relationship.relationship_type,
                    direction: relationship.direction,
                    // Resolved against the full registry once every type is known
                    target: RelationshipTarget::Node(relationship.target),
                    properties,
                },
            );
        }

        self.types.insert(
            definition.name.clone(),
            ConcreteType {
                name: definition.name,
                fields,
                relationships,
                interfaces: definition.implements,
                unions: Vec::new(),
            },
        );
        Ok(())
    }

    fn link_memberships(&mut self) {
        for union in self.unions.values() {
            for member in &union.members {
                if let Some(concrete) = self.types.get_mut(member) {
                    concrete.unions.push(union.name.clone());
                }
            }
        }
        for concrete in self.types.values() {
            for interface in &concrete.interfaces {
                if let Some(interface) = self.interfaces.get_mut(interface) {
                    interface.implementers.push(concrete.name.clone());
                }
            }
        }
    }

    fn validate_relationship_targets(&mut self) -> SchemaResult<()> {
        let interfaces = &self.interfaces;
        let unions = &self.unions;
        let type_names: Vec<String> = self.types.keys().cloned().collect();

        for concrete in self.types.values_mut() {
            for relationship in concrete.relationships.values_mut() {
                let target = relationship.target.type_name().to_string();
                relationship.target = if type_names.contains(&target) {
                    RelationshipTarget::Node(target)
                } else if unions.contains_key(&target) {
                    RelationshipTarget::Union(target)
                } else if interfaces.contains_key(&target) {
                    RelationshipTarget::Interface(target)
                } else {
                    return Err(SchemaError::UnknownType {
                        referenced: target,
                        by: format!("{}.{}", concrete.name, relationship.field_name),
                    });
                };
            }
        }
        Ok(())
    }

    /// Resolve a single raw type tag to a concrete type
    pub fn resolve(&self, tag: &str) -> Option<&ConcreteType> {
        self.types.get(tag)
    }

    /// Resolve a node from its type tag and full label set.
    ///
    /// The tag wins when it is concrete; otherwise the first concrete label
    /// is used; otherwise the labels naming registered interfaces give a
    /// partial resolution.
    pub fn resolve_labels(&self, tag: &str, labels: &[String]) -> Resolution<'_> {
        if let Some(concrete) = self.resolve(tag) {
            return Resolution::Concrete(concrete);
        }
        if let Some(concrete) = labels.iter().find_map(|label| self.resolve(label)) {
            return Resolution::Concrete(concrete);
        }

        let interfaces: Vec<&InterfaceType> = std::iter::once(tag)
            .chain(labels.iter().map(String::as_str))
            .filter_map(|label| self.interfaces.get(label))
            .collect();
        if interfaces.is_empty() {
            Resolution::NotFound
        } else {
            Resolution::Partial(interfaces)
        }
    }

    pub fn concrete(&self, name: &str) -> Option<&ConcreteType> {
        self.types.get(name)
    }

    pub fn interface(&self, name: &str) -> Option<&InterfaceType> {
        self.interfaces.get(name)
    }

    pub fn union(&self, name: &str) -> Option<&UnionType> {
        self.unions.get(name)
    }

    pub fn concrete_types(&self) -> impl Iterator<Item = &ConcreteType> {
        self.types.values()
    }

    /// Whether a node resolved as `resolution` may stand at the end of `target`
    pub fn accepts(&self, target: &RelationshipTarget, resolution: &Resolution<'_>) -> bool {
        match target {
            RelationshipTarget::Node(name) => {
                resolution.concrete().map_or(false, |c| &c.name == name)
            }
            RelationshipTarget::Union(name) => resolution
                .concrete()
                .map_or(false, |c| c.unions.iter().any(|u| u == name)),
            RelationshipTarget::Interface(name) => resolution.satisfies_interface(name),
        }
    }

    /// Find the relationship field on `subscriber` that a relationship of
    /// `relationship_type`, seen from the subscriber's side as `direction`,
    /// with `other` at the far end, was made through.
    ///
    /// `None` means the subscriber's type does not declare the relationship
    /// in that direction, so the event is not delivered on that side.
    pub fn find_relationship_field<'r>(
        &self,
        subscriber: &'r ConcreteType,
        relationship_type: &str,
        direction: Direction,
        other: &Resolution<'_>,
    ) -> Option<&'r RelationshipField> {
        subscriber.relationships.values().find(|field| {
            field.relationship_type == relationship_type
                && field.direction == direction
                && self.accepts(&field.target, other)
        })
    }

    /// Scalar fields known for a relationship target, before narrowing.
    ///
    /// Unions expose none; interfaces expose their common fields.
    pub fn target_common_fields(
        &self,
        target: &RelationshipTarget,
    ) -> Option<&IndexMap<String, FieldDefinition>> {
        match target {
            RelationshipTarget::Node(name) => self.concrete(name).map(|c| &c.fields),
            RelationshipTarget::Interface(name) => self.interface(name).map(|i| &i.fields),
            RelationshipTarget::Union(_) => None,
        }
    }

    /// Concrete types a relationship target may narrow to
    pub fn possible_types(&self, target: &RelationshipTarget) -> Vec<&ConcreteType> {
        match target {
            RelationshipTarget::Node(name) => self.concrete(name).into_iter().collect(),
            RelationshipTarget::Union(name) => self
                .union(name)
                .map(|u| u.members.iter().filter_map(|m| self.concrete(m)).collect())
                .unwrap_or_default(),
            RelationshipTarget::Interface(name) => self
                .interface(name)
                .map(|i| i.implementers.iter().filter_map(|m| self.concrete(m)).collect())
                .unwrap_or_default(),
        }
    }
}

fn collect_fields(
    owner: &str,
    definitions: Vec<FieldDefinition>,
) -> SchemaResult<IndexMap<String, FieldDefinition>> {
    let mut fields = IndexMap::with_capacity(definitions.len());
    for field in definitions {
        if fields.contains_key(&field.name) {
            return Err(SchemaError::DuplicateField {
                type_name: owner.to_string(),
                field: field.name,
            });
        }
        fields.insert(field.name.clone(), field);
    }
    Ok(fields)
}
