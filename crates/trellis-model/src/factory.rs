//! Emitter injection seam
//!
//! The reactor materializes types through a caller-supplied
//! [`TypeBuilderFactory`]. A real emitter interns specs into its own
//! representation; [`DefaultTypeBuilderFactory`] simply freezes the spec and
//! is what the test suites use.

use std::fmt;
use std::sync::Arc;

use crate::name::TypeName;
use crate::spec::TypeSpec;

/// Cheap shared handle to one materialized type.
#[derive(Debug, Clone)]
pub struct EmittedType {
    spec: Arc<TypeSpec>,
}

impl EmittedType {
    /// Wraps a finished spec.
    pub fn new(spec: TypeSpec) -> Self {
        Self {
            spec: Arc::new(spec),
        }
    }

    /// The assigned type name.
    pub fn name(&self) -> &TypeName {
        &self.spec.name
    }

    /// The full spec.
    pub fn spec(&self) -> &TypeSpec {
        &self.spec
    }
}

impl fmt::Display for EmittedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.spec.name.fmt(f)
    }
}

/// Strategy for turning a [`TypeSpec`] into an [`EmittedType`].
///
/// Implementations may normalize or decorate the spec before freezing it; the
/// reactor calls this exactly once per type-emitting generator.
pub trait TypeBuilderFactory {
    fn create(&self, spec: TypeSpec) -> EmittedType;
}

/// Factory that freezes specs as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTypeBuilderFactory;

impl TypeBuilderFactory for DefaultTypeBuilderFactory {
    fn create(&self, spec: TypeSpec) -> EmittedType {
        EmittedType::new(spec)
    }
}
