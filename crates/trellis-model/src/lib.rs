// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Emitted-type model for the Trellis schema compiler.
//!
//! The reactor resolves every generator to a [`TypeName`] and, for generators
//! that emit a type, a [`TypeSpec`] describing the target-language shape. The
//! actual rendering of those specs into source text is the emitter's job and
//! lives outside this workspace; the [`TypeBuilderFactory`] trait is the seam
//! through which an emitter is injected.

pub mod factory;
pub mod name;
pub mod spec;

pub use factory::{DefaultTypeBuilderFactory, EmittedType, TypeBuilderFactory};
pub use name::TypeName;
pub use spec::{Property, PropertyType, TypeKind, TypeSpec, UnionMember};
