//! Type vocabulary carried by `type` statements
//!
//! The reactor only needs enough type structure to perform linkage: builtin
//! primitives terminate resolution, derived names point at `typedef`
//! statements, and `leafref`/`identityref`/`union` carry indirections that the
//! type linker chases. Constructs with no linkage behavior (enumeration
//! members, bit positions, range restrictions) are an emission concern and are
//! not modeled here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::qname::QName;

/// Builtin schema types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Decimal64,
    String,
    Binary,
    Empty,
    /// Indirect reference to another data node; resolved by the type linker.
    Leafref,
    /// Reference to one or more `identity` statements; resolved eagerly.
    Identityref,
    /// Choice of member types, each resolved recursively.
    Union,
    InstanceIdentifier,
}

impl BuiltinType {
    /// The schema-language keyword for this type.
    pub fn keyword(self) -> &'static str {
        match self {
            BuiltinType::Boolean => "boolean",
            BuiltinType::Int8 => "int8",
            BuiltinType::Int16 => "int16",
            BuiltinType::Int32 => "int32",
            BuiltinType::Int64 => "int64",
            BuiltinType::Uint8 => "uint8",
            BuiltinType::Uint16 => "uint16",
            BuiltinType::Uint32 => "uint32",
            BuiltinType::Uint64 => "uint64",
            BuiltinType::Decimal64 => "decimal64",
            BuiltinType::String => "string",
            BuiltinType::Binary => "binary",
            BuiltinType::Empty => "empty",
            BuiltinType::Leafref => "leafref",
            BuiltinType::Identityref => "identityref",
            BuiltinType::Union => "union",
            BuiltinType::InstanceIdentifier => "instance-identifier",
        }
    }
}

impl fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Argument of a `type` statement: a builtin keyword or a `typedef` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeArgument {
    Builtin(BuiltinType),
    Derived(QName),
}

impl fmt::Display for TypeArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeArgument::Builtin(b) => b.fmt(f),
            TypeArgument::Derived(q) => q.fmt(f),
        }
    }
}

/// One step of a leafref path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeafrefStep {
    /// `..` — move to the enclosing node.
    Parent,
    /// Descend to the named child.
    Child(QName),
}

/// Argument of the `path` substatement of a leafref type.
///
/// Relative paths are resolved against the node carrying the type; absolute
/// paths against the module root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeafrefPath {
    absolute: bool,
    steps: Vec<LeafrefStep>,
}

impl LeafrefPath {
    /// Creates an absolute leafref path.
    pub fn absolute(steps: Vec<LeafrefStep>) -> Self {
        Self {
            absolute: true,
            steps,
        }
    }

    /// Creates a relative leafref path.
    pub fn relative(steps: Vec<LeafrefStep>) -> Self {
        Self {
            absolute: false,
            steps,
        }
    }

    /// Whether the path starts at the module root.
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Path steps in traversal order.
    pub fn steps(&self) -> &[LeafrefStep] {
        &self.steps
    }
}

impl fmt::Display for LeafrefPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for step in &self.steps {
            if !first || self.absolute {
                f.write_str("/")?;
            }
            first = false;
            match step {
                LeafrefStep::Parent => f.write_str("..")?,
                LeafrefStep::Child(q) => write!(f, "{q}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_keywords() {
        assert_eq!(BuiltinType::Leafref.keyword(), "leafref");
        assert_eq!(BuiltinType::InstanceIdentifier.keyword(), "instance-identifier");
    }

    #[test]
    fn test_leafref_path_display() {
        let path = LeafrefPath::relative(vec![
            LeafrefStep::Parent,
            LeafrefStep::Child(QName::new("m", "sibling")),
        ]);
        assert_eq!(path.to_string(), "../m:sibling");
    }

    #[test]
    fn test_absolute_leafref_path_display() {
        let path = LeafrefPath::absolute(vec![LeafrefStep::Child(QName::new("m", "top"))]);
        assert_eq!(path.to_string(), "/m:top");
    }
}
