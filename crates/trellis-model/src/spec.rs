//! Shape of one emitted type

use serde::{Deserialize, Serialize};

use trellis_schema::BuiltinType;

use crate::name::TypeName;

/// What sort of target-language artifact a generator emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    /// Data-bearing interface for a composite schema node.
    Interface,
    /// Extension payload attached to a target interface by an `augment`.
    Augmentation,
    /// Value type derived from a `typedef`.
    Typedef,
    /// Marker type for an `identity`.
    Identity,
    /// Key object of a keyed list.
    Key,
    /// Marker type for a `feature`.
    Feature,
    /// Legacy aggregate surface (notification listener / operation service).
    Aggregate,
}

/// Resolved type of one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyType {
    /// Terminal builtin primitive.
    Builtin(BuiltinType),
    /// Reference to another emitted type.
    Named(TypeName),
    /// Collection of the inner type (`leaf-list` and `list` nodes).
    ListOf(Box<PropertyType>),
    /// Reference constrained to one or more identity types.
    IdentityRef(Vec<TypeName>),
    /// Choice of member shapes with deterministic member names.
    Union(Vec<UnionMember>),
    /// Indirection that could not be resolved at the definition site; the
    /// target-language equivalent of "some object".
    Opaque,
}

/// One alternative of a union property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionMember {
    /// Stable member name derived from the branch type and position.
    pub name: String,
    pub ty: PropertyType,
}

/// One property of an emitted type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    /// Lower-camel-case property name.
    pub name: String,
    pub ty: PropertyType,
}

/// Everything the emitter needs to render one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub name: TypeName,
    pub kind: TypeKind,
    /// Types this one extends or implements: used groupings for interfaces,
    /// base identities for identities.
    pub implements: Vec<TypeName>,
    /// Properties in schema declaration order.
    pub properties: Vec<Property>,
}

impl TypeSpec {
    /// Creates an empty spec of the given kind.
    pub fn new(name: TypeName, kind: TypeKind) -> Self {
        Self {
            name,
            kind,
            implements: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Looks up a property by name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}
