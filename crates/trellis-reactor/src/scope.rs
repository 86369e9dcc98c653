//! Scope-aware definition lookup
//!
//! `uses`, `typedef` references and identity `base` references resolve by
//! tree-scoped name lookup: walk the active lexical scope outward until the
//! defining module is reached, or jump straight to another module's top level
//! when the reference is cross-module. The scope is an explicit value
//! threaded through the linker passes, not shared reactor state.

use indexmap::IndexMap;
use tracing::trace;

use trellis_schema::{ModuleId, QName};

use crate::arena::{Arena, GeneratorId};
use crate::error::{ErrorKind, ReactorError};
use crate::generator::GeneratorKind;

/// Map from module namespace to its root generator, in dependency order.
pub(crate) type ModuleMap = IndexMap<ModuleId, GeneratorId>;

/// Which definition namespace a lookup searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DefinitionKind {
    Grouping,
    Typedef,
    Identity,
}

impl DefinitionKind {
    fn matches(self, kind: &GeneratorKind) -> bool {
        match self {
            DefinitionKind::Grouping => matches!(kind, GeneratorKind::Grouping),
            DefinitionKind::Typedef => matches!(kind, GeneratorKind::Typedef),
            DefinitionKind::Identity => matches!(kind, GeneratorKind::Identity),
        }
    }

    fn error_kind(self) -> ErrorKind {
        match self {
            DefinitionKind::Grouping => ErrorKind::UnresolvedGrouping,
            DefinitionKind::Typedef => ErrorKind::UnresolvedTypedef,
            DefinitionKind::Identity => ErrorKind::UnresolvedIdentity,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            DefinitionKind::Grouping => "grouping",
            DefinitionKind::Typedef => "typedef",
            DefinitionKind::Identity => "identity",
        }
    }
}

/// The active lexical scope: composite generators from the current module
/// root down to the statement being linked.
#[derive(Debug, Default)]
pub(crate) struct ScopeStack {
    frames: Vec<GeneratorId>,
}

impl ScopeStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, frame: GeneratorId) {
        self.frames.push(frame);
    }

    pub(crate) fn pop(&mut self) {
        self.frames.pop();
    }

    /// Frames from the innermost scope outward.
    fn innermost_first(&self) -> impl Iterator<Item = GeneratorId> + '_ {
        self.frames.iter().rev().copied()
    }

    /// The module generator at the bottom of the stack.
    fn module_frame(&self) -> Option<GeneratorId> {
        self.frames.first().copied()
    }
}

/// Resolves a definition reference by tree-scoped lookup.
///
/// Same-module references walk the scope stack outward; cross-module
/// references search the referenced module's top level directly.
pub(crate) fn resolve_tree_scoped(
    arena: &Arena<'_>,
    modules: &ModuleMap,
    scope: &ScopeStack,
    kind: DefinitionKind,
    name: &QName,
) -> Result<GeneratorId, ReactorError> {
    trace!(%name, ?kind, "tree-scoped lookup");

    let module_frame = scope.module_frame().ok_or_else(|| {
        ReactorError::general(ErrorKind::Invariant, "tree-scoped lookup with empty scope")
    })?;

    if arena[module_frame].module == name.module {
        for frame in scope.innermost_first() {
            if let Some(found) = find_in_children(arena, frame, kind, name) {
                return Ok(found);
            }
        }
    } else if let Some(&module) = modules.get(&name.module) {
        if let Some(found) = find_in_children(arena, module, kind, name) {
            return Ok(found);
        }
    }

    Err(ReactorError::new(
        kind.error_kind(),
        name,
        format!("no {} named '{name}' in scope", kind.keyword()),
    ))
}

fn find_in_children(
    arena: &Arena<'_>,
    parent: GeneratorId,
    kind: DefinitionKind,
    name: &QName,
) -> Option<GeneratorId> {
    arena[parent]
        .children
        .iter()
        .copied()
        .find(|&c| kind.matches(&arena[c].kind) && arena[c].qname() == Some(name))
}
