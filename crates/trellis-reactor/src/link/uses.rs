//! Uses/grouping linkage
//!
//! Resolves every `uses` substatement of every composite to its `grouping`
//! definition generator and records it as a dependency of the composite, in
//! declaration order. While a `uses` is being resolved, any augment generator
//! created from that same `uses` statement receives the resolved grouping as
//! an anchor, so augment resolution never has to re-derive the grouping
//! relationship.

use tracing::trace;

use trellis_schema::StatementKind;

use crate::arena::{Arena, GeneratorId};
use crate::error::ReactorError;
use crate::generator::GeneratorKind;
use crate::scope::{resolve_tree_scoped, DefinitionKind, ModuleMap, ScopeStack};

/// Links `uses` statements for every composite of every module.
pub(crate) fn link_uses(
    arena: &mut Arena<'_>,
    modules: &ModuleMap,
) -> Result<(), ReactorError> {
    let roots: Vec<GeneratorId> = modules.values().copied().collect();
    for root in roots {
        let mut scope = ScopeStack::new();
        visit(arena, modules, &mut scope, root)?;
    }
    Ok(())
}

fn visit(
    arena: &mut Arena<'_>,
    modules: &ModuleMap,
    scope: &mut ScopeStack,
    id: GeneratorId,
) -> Result<(), ReactorError> {
    if !arena[id].is_composite() {
        return Ok(());
    }

    scope.push(id);
    link_composite(arena, modules, scope, id)?;
    let children = arena[id].children.clone();
    for child in children {
        visit(arena, modules, scope, child)?;
    }
    scope.pop();
    Ok(())
}

fn link_composite(
    arena: &mut Arena<'_>,
    modules: &ModuleMap,
    scope: &ScopeStack,
    id: GeneratorId,
) -> Result<(), ReactorError> {
    let Some(stmt) = arena[id].stmt else {
        return Ok(());
    };

    for sub in &stmt.substatements {
        let StatementKind::Uses { grouping } = &sub.kind else {
            continue;
        };

        let resolved = resolve_tree_scoped(arena, modules, scope, DefinitionKind::Grouping, grouping)?;
        trace!(uses = %grouping, grouping = %resolved, at = %id, "linked uses to grouping");
        arena[id].groupings.push(resolved);

        // Anchor augments that were carried by this very uses statement.
        let children = arena[id].children.clone();
        for child in children {
            if matches!(arena[child].kind, GeneratorKind::UsesAugment)
                && arena[child]
                    .uses_stmt
                    .is_some_and(|u| std::ptr::eq(u, sub))
            {
                arena[child].uses_grouping = Some(resolved);
            }
        }
    }
    Ok(())
}
