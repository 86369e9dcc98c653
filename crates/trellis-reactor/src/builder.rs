//! Generator tree construction
//!
//! Walks each module's statement tree once, producing the parallel generator
//! tree. Copy-introduced nodes are filtered according to per-kind rules:
//! composites (container, list, choice) are materialized only at their
//! original declaration, while data leaves are materialized at every site so
//! instantiation-site type resolution has a node to hang off.
//!
//! Augment generators are appended after all ordinary children, ordered by a
//! deterministic comparator (shorter target path first, then lexicographic by
//! the path's qname sequence). Child iteration order then always reflects
//! potential interdependencies between stacked augments, independent of the
//! order modules were written in.

use std::cmp::Ordering;

use tracing::{debug, trace};

use trellis_schema::{ModuleId, SchemaContext, SchemaPath, Statement, StatementKind};

use crate::arena::{Arena, GeneratorId};
use crate::error::{ErrorKind, ReactorError};
use crate::generator::{Generator, GeneratorKind, Placement, TypeState};
use crate::scope::ModuleMap;

/// Builds the generator forest for all modules in dependency order.
pub(crate) fn build_forest<'s>(
    context: &'s SchemaContext,
) -> Result<(Arena<'s>, ModuleMap), ReactorError> {
    let mut arena = Arena::new();
    let mut modules = ModuleMap::new();

    for stmt in context.modules() {
        let StatementKind::Module { name } = &stmt.kind else {
            return Err(ReactorError::general(
                ErrorKind::InvalidInput,
                "schema context root is not a module",
            ));
        };

        let id = arena.alloc(Generator::explicit(
            GeneratorKind::Module {
                module: name.clone(),
            },
            stmt,
            name.clone(),
            None,
            Placement::TopLevel,
        ));
        create_children(&mut arena, id, stmt, name)?;
        modules.insert(name.clone(), id);
        trace!(module = %name, root = %id, "built module generator tree");
    }

    debug!(
        modules = modules.len(),
        generators = arena.len(),
        "generator forest built"
    );
    Ok((arena, modules))
}

/// One collected `augment` statement awaiting ordered insertion.
struct PendingAugment<'s> {
    target: &'s SchemaPath,
    stmt: &'s Statement,
    /// The enclosing `uses` statement for uses-scoped augments.
    uses: Option<&'s Statement>,
}

fn create_children<'s>(
    arena: &mut Arena<'s>,
    parent: GeneratorId,
    stmt: &'s Statement,
    module: &ModuleId,
) -> Result<(), ReactorError> {
    let parent_is_module = matches!(arena[parent].kind, GeneratorKind::Module { .. });
    let mut children = Vec::new();
    let mut augments: Vec<PendingAugment<'s>> = Vec::new();

    for sub in &stmt.substatements {
        match &sub.kind {
            StatementKind::Container { .. } => {
                if sub.copy.is_original() {
                    children.push(composite(arena, GeneratorKind::Container, sub, module, parent)?);
                }
            }
            StatementKind::List { .. } => {
                if sub.copy.is_original() {
                    let list = composite(arena, GeneratorKind::List, sub, module, parent)?;
                    children.push(list);
                    if sub.find_key().is_some() {
                        children.push(arena.alloc(Generator::implicit(
                            GeneratorKind::ListKey { list },
                            module.clone(),
                            Some(parent),
                            Placement::Member,
                        )));
                    }
                }
            }
            StatementKind::Leaf { .. } => {
                if !sub.copy.is_augmenting() {
                    children.push(leaf_like(arena, GeneratorKind::Leaf, sub, module, parent));
                }
            }
            StatementKind::LeafList { .. } => {
                if !sub.copy.is_augmenting() {
                    children.push(leaf_like(arena, GeneratorKind::LeafList, sub, module, parent));
                }
            }
            StatementKind::AnyData { .. } => {
                if !sub.copy.is_augmenting() {
                    children.push(leaf_like(arena, GeneratorKind::AnyData, sub, module, parent));
                }
            }
            StatementKind::AnyXml { .. } => {
                if !sub.copy.is_augmenting() {
                    children.push(leaf_like(arena, GeneratorKind::AnyXml, sub, module, parent));
                }
            }
            StatementKind::Choice { .. } => {
                if !sub.copy.is_added_by_uses() {
                    children.push(composite(arena, GeneratorKind::Choice, sub, module, parent)?);
                }
            }
            StatementKind::Case { .. } => {
                children.push(composite(arena, GeneratorKind::Case, sub, module, parent)?);
            }
            StatementKind::Grouping { .. } => {
                children.push(composite(arena, GeneratorKind::Grouping, sub, module, parent)?);
            }
            StatementKind::Typedef { .. } => {
                children.push(leaf_like(arena, GeneratorKind::Typedef, sub, module, parent));
            }
            StatementKind::Identity { .. } => {
                children.push(leaf_like(arena, GeneratorKind::Identity, sub, module, parent));
            }
            StatementKind::Feature { .. } => {
                if parent_is_module {
                    children.push(leaf_like(arena, GeneratorKind::Feature, sub, module, parent));
                }
            }
            StatementKind::Rpc { .. } => {
                if parent_is_module {
                    children.push(composite(arena, GeneratorKind::Rpc, sub, module, parent)?);
                }
            }
            StatementKind::Action { .. } => {
                if !sub.copy.is_augmenting() {
                    children.push(composite(arena, GeneratorKind::Action, sub, module, parent)?);
                }
            }
            StatementKind::Input { .. } => {
                children.push(composite(arena, GeneratorKind::Input, sub, module, parent)?);
            }
            StatementKind::Output { .. } => {
                children.push(composite(arena, GeneratorKind::Output, sub, module, parent)?);
            }
            StatementKind::Notification { .. } => {
                if !sub.copy.is_augmenting() {
                    children.push(composite(
                        arena,
                        GeneratorKind::Notification,
                        sub,
                        module,
                        parent,
                    )?);
                }
            }
            StatementKind::Uses { .. } => {
                for usub in &sub.substatements {
                    if let StatementKind::Augment { target } = &usub.kind {
                        augments.push(PendingAugment {
                            target,
                            stmt: usub,
                            uses: Some(sub),
                        });
                    }
                }
            }
            StatementKind::Augment { target } => {
                // Augments not at module level arrive through 'uses'
                // processing above; anything else has no declaration site
                // of its own here.
                if parent_is_module {
                    augments.push(PendingAugment {
                        target,
                        stmt: sub,
                        uses: None,
                    });
                }
            }
            _ => trace!(keyword = sub.kind.keyword(), "ignoring statement"),
        }
    }

    // Augments are evaluated after ordinary children and after any augment
    // with a shorter target path, so stacked augments resolve the same way
    // regardless of declaration order.
    augments.sort_by(|a, b| augment_order(a.target, b.target));
    for pending in augments {
        let (kind, placement) = match pending.uses {
            Some(_) => (GeneratorKind::UsesAugment, Placement::None),
            None => (GeneratorKind::ModuleAugment, Placement::TopLevel),
        };
        let id = arena.alloc(Generator::explicit(
            kind,
            pending.stmt,
            module.clone(),
            Some(parent),
            placement,
        ));
        arena[id].uses_stmt = pending.uses;
        create_children(arena, id, pending.stmt, module)?;
        children.push(id);
    }

    // Legacy aggregate surface: one listener per module with notifications,
    // one service per module with rpcs.
    if parent_is_module {
        let notifications: Vec<GeneratorId> = children
            .iter()
            .copied()
            .filter(|&c| matches!(arena[c].kind, GeneratorKind::Notification))
            .collect();
        if !notifications.is_empty() {
            children.push(arena.alloc(Generator::implicit(
                GeneratorKind::NotificationAggregate { notifications },
                module.clone(),
                Some(parent),
                Placement::TopLevel,
            )));
        }

        let rpcs: Vec<GeneratorId> = children
            .iter()
            .copied()
            .filter(|&c| matches!(arena[c].kind, GeneratorKind::Rpc))
            .collect();
        if !rpcs.is_empty() {
            children.push(arena.alloc(Generator::implicit(
                GeneratorKind::RpcAggregate { rpcs },
                module.clone(),
                Some(parent),
                Placement::TopLevel,
            )));
        }
    }

    arena[parent].children = children;
    Ok(())
}

/// Allocates a composite generator and recurses into its substatements.
fn composite<'s>(
    arena: &mut Arena<'s>,
    kind: GeneratorKind,
    stmt: &'s Statement,
    module: &ModuleId,
    parent: GeneratorId,
) -> Result<GeneratorId, ReactorError> {
    let placement = if stmt.copy.is_original() {
        default_placement(&kind)
    } else {
        Placement::None
    };
    let id = arena.alloc(Generator::explicit(
        kind,
        stmt,
        module.clone(),
        Some(parent),
        placement,
    ));
    create_children(arena, id, stmt, module)?;
    Ok(id)
}

/// Allocates a childless generator.
fn leaf_like<'s>(
    arena: &mut Arena<'s>,
    kind: GeneratorKind,
    stmt: &'s Statement,
    module: &ModuleId,
    parent: GeneratorId,
) -> GeneratorId {
    let placement = if stmt.copy.is_original() {
        default_placement(&kind)
    } else {
        Placement::None
    };
    let id = arena.alloc(Generator::explicit(
        kind,
        stmt,
        module.clone(),
        Some(parent),
        placement,
    ));
    if arena[id].is_type_bearing() {
        arena[id].type_state = TypeState::Unresolved;
    }
    id
}

fn default_placement(kind: &GeneratorKind) -> Placement {
    match kind {
        GeneratorKind::Leaf
        | GeneratorKind::LeafList
        | GeneratorKind::AnyData
        | GeneratorKind::AnyXml
        | GeneratorKind::UsesAugment => Placement::None,
        GeneratorKind::Rpc | GeneratorKind::Action => Placement::Phantom,
        GeneratorKind::ListKey { .. } => Placement::Member,
        _ => Placement::TopLevel,
    }
}

fn augment_order(a: &SchemaPath, b: &SchemaPath) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| {
        for (x, y) in a.segments().iter().zip(b.segments()) {
            let ord = x
                .module
                .name()
                .cmp(y.module.name())
                .then_with(|| x.local.cmp(&y.local));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    })
}
