//! Reactor error reporting
//!
//! The reactor is all-or-nothing per compilation: every error here aborts the
//! run and no partial output is published. Errors carry the offending
//! statement's identity and, where one was being built, the partial
//! resolution chain, so a bad schema model can be root-caused without
//! re-running under a debugger.

use std::fmt;

/// Category of reactor failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input the surrounding tooling should have rejected.
    InvalidInput,
    /// A `uses` statement's grouping could not be found in scope.
    UnresolvedGrouping,
    /// A `type` statement's typedef reference could not be found in scope.
    UnresolvedTypedef,
    /// An identity reference could not be found.
    UnresolvedIdentity,
    /// An augment target path did not resolve after the fixed point settled.
    UnresolvedAugment,
    /// A strict (non-grouping) leafref path did not resolve.
    UnresolvedLeafref,
    /// A typedef chain loops back on itself.
    RecursiveType,
    /// Two members of one collision domain ran out of naming fallbacks.
    NamingCollision,
    /// A link that may be established once was established twice.
    DuplicateLink,
    /// Internal invariant violation; a bug in the reactor, not the model.
    Invariant,
}

impl ErrorKind {
    /// Human-readable category name.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::UnresolvedGrouping => "unresolved grouping",
            ErrorKind::UnresolvedTypedef => "unresolved typedef",
            ErrorKind::UnresolvedIdentity => "unresolved identity",
            ErrorKind::UnresolvedAugment => "unresolved augment",
            ErrorKind::UnresolvedLeafref => "unresolved leafref",
            ErrorKind::RecursiveType => "recursive type",
            ErrorKind::NamingCollision => "naming collision",
            ErrorKind::DuplicateLink => "duplicate link",
            ErrorKind::Invariant => "reactor invariant violated",
        }
    }
}

/// A fatal reactor diagnostic.
///
/// `origin` identifies the statement the failure is about; `chain` records
/// the partially-built resolution (path segments already consumed, links
/// already established) when a multi-step resolution was interrupted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactorError {
    pub kind: ErrorKind,
    pub origin: Option<String>,
    pub message: String,
    pub chain: Vec<String>,
}

impl ReactorError {
    /// Creates an error about a specific statement.
    pub fn new(kind: ErrorKind, origin: impl fmt::Display, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin: Some(origin.to_string()),
            message: message.into(),
            chain: Vec::new(),
        }
    }

    /// Creates an error with no single offending statement.
    pub fn general(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin: None,
            message: message.into(),
            chain: Vec::new(),
        }
    }

    /// Appends one step of the partial resolution chain, builder style.
    pub fn with_chain(mut self, step: impl Into<String>) -> Self {
        self.chain.push(step.into());
        self
    }
}

impl fmt::Display for ReactorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.name(), self.message)?;
        if let Some(origin) = &self.origin {
            write!(f, " (at {origin})")?;
        }
        for step in &self.chain {
            write!(f, "\n  via {step}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ReactorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_origin() {
        let err = ReactorError::new(ErrorKind::UnresolvedGrouping, "m:grp", "no such grouping");
        let text = err.to_string();
        assert!(text.contains("unresolved grouping"));
        assert!(text.contains("no such grouping"));
        assert!(text.contains("(at m:grp)"));
    }

    #[test]
    fn test_chain_steps_render() {
        let err = ReactorError::general(ErrorKind::UnresolvedAugment, "target not found")
            .with_chain("resolved m:a")
            .with_chain("stuck at m:b");
        let text = err.to_string();
        assert!(text.contains("via resolved m:a"));
        assert!(text.contains("via stuck at m:b"));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ErrorKind::RecursiveType.name(), "recursive type");
        assert_eq!(ErrorKind::NamingCollision.name(), "naming collision");
    }
}
