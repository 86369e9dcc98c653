// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Statement model for the Trellis schema compiler.
//!
//! This crate defines the immutable input consumed by the generator reactor:
//! qualified names, schema-node paths, the tagged [`Statement`] tree with its
//! copy-history flags, and the [`SchemaContext`] module forest. Parsing schema
//! source text into this model is the job of surrounding tooling; everything
//! here is already validated and dependency-ordered.

pub mod context;
pub mod qname;
pub mod statement;
pub mod types;

pub use context::{SchemaContext, SchemaError};
pub use qname::{ModuleId, QName, SchemaPath};
pub use statement::{CopyHistory, Statement, StatementKind};
pub use types::{BuiltinType, LeafrefPath, LeafrefStep, TypeArgument};
