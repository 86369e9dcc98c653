//! The module forest handed to the reactor
//!
//! A [`SchemaContext`] is an ordered collection of module statement trees.
//! The order is a contract with the surrounding tooling: a module never
//! precedes a module it depends on. Dependency sorting itself is out of scope
//! here; this type only validates the shape of what it is given.

use thiserror::Error;

use crate::qname::ModuleId;
use crate::statement::{Statement, StatementKind};

/// Errors detected while assembling a [`SchemaContext`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("top-level statement is a '{0}', expected 'module'")]
    NotAModule(String),
    #[error("duplicate module '{0}'")]
    DuplicateModule(ModuleId),
}

/// Dependency-ordered forest of module statement trees.
#[derive(Debug, Clone)]
pub struct SchemaContext {
    modules: Vec<Statement>,
}

impl SchemaContext {
    /// Wraps a dependency-ordered list of module statements.
    ///
    /// # Errors
    ///
    /// Fails if any root statement is not a module, or two modules share a
    /// name.
    pub fn new(modules: Vec<Statement>) -> Result<Self, SchemaError> {
        let mut seen: Vec<&ModuleId> = Vec::new();
        for stmt in &modules {
            let StatementKind::Module { name } = &stmt.kind else {
                return Err(SchemaError::NotAModule(stmt.kind.keyword().to_string()));
            };
            if seen.contains(&name) {
                return Err(SchemaError::DuplicateModule(name.clone()));
            }
            seen.push(name);
        }
        Ok(Self { modules })
    }

    /// Module statements in dependency order.
    pub fn modules(&self) -> &[Statement] {
        &self.modules
    }

    /// Looks up one module by name.
    pub fn module(&self, name: &ModuleId) -> Option<&Statement> {
        self.modules.iter().find(|m| match &m.kind {
            StatementKind::Module { name: n } => n == name,
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_modules() {
        let ctx = SchemaContext::new(vec![Statement::module("a"), Statement::module("b")]).unwrap();
        assert_eq!(ctx.modules().len(), 2);
        assert!(ctx.module(&ModuleId::new("a")).is_some());
        assert!(ctx.module(&ModuleId::new("c")).is_none());
    }

    #[test]
    fn test_rejects_non_module_root() {
        let err = SchemaContext::new(vec![Statement::container(crate::QName::new("m", "c"))])
            .unwrap_err();
        assert_eq!(err, SchemaError::NotAModule("container".to_string()));
    }

    #[test]
    fn test_rejects_duplicate_module() {
        let err =
            SchemaContext::new(vec![Statement::module("a"), Statement::module("a")]).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateModule(ModuleId::new("a")));
    }
}
