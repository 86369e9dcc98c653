//! Qualified names for schema statements
//!
//! Every addressable statement carries a [`QName`]: a name qualified by the
//! [`ModuleId`] of the module whose namespace it lives in. Reuse mechanisms
//! (`uses`, `augment`) re-bind names between namespaces, which is what
//! [`QName::bind_to`] exists for.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one module's namespace.
///
/// Modules are identified by their name; the surrounding tooling guarantees
/// names are unique within one compilation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(String);

impl ModuleId {
    /// Creates a new module identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The module name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A module-qualified statement name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QName {
    /// Namespace the name is bound to.
    pub module: ModuleId,
    /// Unqualified local name.
    pub local: String,
}

impl QName {
    /// Creates a qualified name.
    pub fn new(module: impl Into<ModuleId>, local: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            local: local.into(),
        }
    }

    /// Re-binds this name into another module's namespace, keeping the local
    /// part.
    ///
    /// This is the primitive behind namespace squashing: when resolution
    /// crosses from a use site into a `grouping`'s own namespace (or back
    /// along the copy axis), the same local name has to be looked up under a
    /// different module.
    pub fn bind_to(&self, module: &ModuleId) -> QName {
        QName {
            module: module.clone(),
            local: self.local.clone(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.local)
    }
}

impl From<ModuleId> for QName {
    fn from(module: ModuleId) -> Self {
        let local = module.name().to_string();
        Self { module, local }
    }
}

/// A path of qualified names addressing a node in the schema tree.
///
/// `augment` statements carry these as their argument. Module-level augments
/// use absolute paths; augments nested in a `uses` statement use descendant
/// paths relative to the used grouping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaPath {
    absolute: bool,
    segments: Vec<QName>,
}

impl SchemaPath {
    /// Creates an absolute path (`/a/b/c`).
    ///
    /// # Panics
    ///
    /// Panics if `segments` is empty; an augment target always names at least
    /// one node.
    pub fn absolute(segments: Vec<QName>) -> Self {
        assert!(!segments.is_empty(), "empty schema path");
        Self {
            absolute: true,
            segments,
        }
    }

    /// Creates a descendant path (`a/b/c`), relative to an implicit root.
    ///
    /// # Panics
    ///
    /// Panics if `segments` is empty.
    pub fn descendant(segments: Vec<QName>) -> Self {
        assert!(!segments.is_empty(), "empty schema path");
        Self {
            absolute: false,
            segments,
        }
    }

    /// Whether this path is absolute.
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// The path segments, outermost first.
    pub fn segments(&self) -> &[QName] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// A path is never empty; this exists to satisfy the usual pairing.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 || self.absolute {
                f.write_str("/")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}
