//! Fully-qualified names of emitted types

use std::fmt;

use serde::{Deserialize, Serialize};

/// A (namespace-segment, unqualified-name) pair assigned by the naming
/// resolver.
///
/// Two emitted types are distinct exactly when their `TypeName`s differ in at
/// least one component; the naming resolver guarantees this holds for all
/// members of one collision domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeName {
    /// Dot-separated namespace path.
    pub package: String,
    /// Unqualified type name within the package.
    pub name: String,
}

impl TypeName {
    /// Creates a type name.
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.package, self.name)
    }
}
