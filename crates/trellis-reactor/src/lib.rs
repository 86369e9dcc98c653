// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Multi-stage reactor for the Trellis schema compiler.
//!
//! This crate turns a [`trellis_schema::SchemaContext`] into a forest of
//! generators, one per emitted type. The hard part is linkage, not emission:
//! `uses` references must be resolved to their `grouping` definitions,
//! `augment` targets must be located across module and namespace boundaries,
//! every copy-introduced node must be traced back to its original definition,
//! type indirections (`typedef`, `leafref`, `identityref`) must be chased to
//! concrete targets, and every generator must receive a collision-free
//! (package, name) pair.
//!
//! [`Reactor`] sequences those passes in dependency order:
//!
//! 1. build the generator tree, filtering copy-introduced nodes
//! 2. link `uses` statements to grouping generators
//! 3. resolve augment targets and original definitions to a fixed point
//! 4. bind type references
//! 5. solve collision-domain naming to a fixed point
//! 6. materialize types through a caller-supplied
//!    [`trellis_model::TypeBuilderFactory`]

pub mod arena;
mod builder;
pub mod error;
pub mod generator;
mod link;
mod naming;
pub mod reactor;
mod scope;

pub use arena::{Arena, GeneratorId};
pub use error::{ErrorKind, ReactorError};
pub use generator::{
    Generator, GeneratorKind, Lazy, OriginalLink, Placement, TypeReference, TypeState, UnionBranch,
};
pub use naming::MemberId;
pub use reactor::Reactor;
