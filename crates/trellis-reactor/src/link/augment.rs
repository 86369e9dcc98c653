//! Augment target resolution
//!
//! Each `augment` statement becomes one [`AugmentRequirement`]: a cursor over
//! its target path, a frontier generator the cursor has reached, and the set
//! of namespaces to squash when traversal has crossed into a grouping's own
//! namespace. Requirements advance monotonically; the reactor re-runs pending
//! requirements once per round until a round makes no progress, at which point
//! anything still pending is an unresolvable target.
//!
//! A path step tries, in order: a direct child of the frontier, the children
//! injected by augments already attached to the frontier, the groupings the
//! frontier uses (re-binding the step into the grouping's namespace and
//! remembering that namespace for later steps), and finally the step re-bound
//! into any previously squashed namespace.

use std::collections::VecDeque;

use indexmap::IndexSet;
use tracing::{debug, trace};

use trellis_schema::{ModuleId, QName, StatementKind};

use crate::arena::{Arena, GeneratorId};
use crate::error::{ErrorKind, ReactorError};
use crate::generator::{namespace_of, GeneratorKind};
use crate::link::{find_schema_tree, LinkageProgress};
use crate::scope::ModuleMap;

/// Resolution state of one `augment` statement.
#[derive(Debug)]
pub(crate) struct AugmentRequirement {
    /// The augment generator being resolved.
    augment: GeneratorId,
    /// Path segments not yet consumed.
    remaining: VecDeque<QName>,
    /// The generator the consumed prefix has reached.
    frontier: GeneratorId,
    /// Namespaces to translate into when a step does not match as written.
    squashed: IndexSet<ModuleId>,
}

impl AugmentRequirement {
    /// Description of the statement for diagnostics.
    pub(crate) fn describe(&self, arena: &Arena<'_>) -> String {
        let target = arena[self.augment]
            .stmt
            .and_then(|s| match &s.kind {
                StatementKind::Augment { target } => Some(target.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| "?".to_string());
        format!(
            "augment {target} ({} segments pending at {})",
            self.remaining.len(),
            self.frontier
        )
    }

    /// Attempts to advance this requirement as far as it will go.
    pub(crate) fn resolve(
        &mut self,
        arena: &mut Arena<'_>,
    ) -> Result<LinkageProgress, ReactorError> {
        let mut moved = false;

        while let Some(qname) = self.remaining.front().cloned() {
            match self.step(arena, &qname) {
                Some((next, squash)) => {
                    if let Some(ns) = squash {
                        self.squashed.insert(ns);
                    }
                    trace!(augment = %self.augment, step = %qname, frontier = %next, "augment path step");
                    self.frontier = next;
                    self.remaining.pop_front();
                    moved = true;
                }
                None => {
                    return Ok(if moved {
                        LinkageProgress::Some
                    } else {
                        LinkageProgress::None
                    })
                }
            }
        }

        // Cursor exhausted: attach. Module-level augments attach to the
        // frontier as reached; uses-scoped augments must attach to the single
        // canonical definition, which requires the frontier's original link.
        let attach_to = match arena[self.augment].kind {
            GeneratorKind::ModuleAugment => self.frontier,
            GeneratorKind::UsesAugment => match crate::link::original_of(arena, self.frontier) {
                Ok(original) => original,
                Err(_) => {
                    return Ok(if moved {
                        LinkageProgress::Some
                    } else {
                        LinkageProgress::None
                    })
                }
            },
            _ => {
                return Err(ReactorError::general(
                    ErrorKind::Invariant,
                    format!("generator {} is not an augment", self.augment),
                ))
            }
        };

        if arena[self.augment].augment_target.is_some() {
            return Err(ReactorError::general(
                ErrorKind::DuplicateLink,
                format!("augment {} target linked twice", self.augment),
            ));
        }
        arena[self.augment].augment_target = Some(attach_to);
        if !arena[attach_to].augments.contains(&self.augment) {
            arena[attach_to].augments.push(self.augment);
        }
        debug!(augment = %self.augment, target = %attach_to, "augment target resolved");
        Ok(LinkageProgress::Done)
    }

    /// Tries to match one path segment against the frontier. On success
    /// returns the new frontier and, when the match went through a grouping,
    /// the namespace to squash from here on.
    fn step(
        &self,
        arena: &Arena<'_>,
        qname: &QName,
    ) -> Option<(GeneratorId, Option<ModuleId>)> {
        if let Some(hit) = search_frontier(arena, self.frontier, qname) {
            return Some(hit);
        }
        for ns in &self.squashed {
            let bound = qname.bind_to(ns);
            if bound != *qname {
                if let Some(hit) = search_frontier(arena, self.frontier, &bound) {
                    return Some(hit);
                }
            }
        }
        None
    }
}

fn search_frontier(
    arena: &Arena<'_>,
    frontier: GeneratorId,
    qname: &QName,
) -> Option<(GeneratorId, Option<ModuleId>)> {
    // Direct child.
    for &child in &arena[frontier].children {
        if let Some(stmt) = arena[child].stmt {
            if stmt.schema_tree_name() == Some(qname) {
                return Some((child, None));
            }
        }
    }
    // Children injected by augments already attached here.
    for &augment in &arena[frontier].augments {
        if let Some(found) = find_schema_tree(arena, augment, qname) {
            return Some((found, None));
        }
    }
    // Groupings used here; entering one squashes its namespace.
    for &grouping in &arena[frontier].groupings {
        let ns = namespace_of(arena, grouping);
        let bound = qname.bind_to(&ns);
        if let Some(found) = find_schema_tree(arena, grouping, &bound) {
            return Some((found, Some(ns)));
        }
    }
    None
}

/// Creates the requirement for every augment generator: module augments
/// first, then uses-scoped augments, matching the order their resolution can
/// possibly succeed in.
pub(crate) fn create_requirements(
    arena: &Arena<'_>,
    modules: &ModuleMap,
) -> Result<Vec<AugmentRequirement>, ReactorError> {
    let mut requirements = Vec::new();

    for id in arena.ids() {
        if !matches!(arena[id].kind, GeneratorKind::ModuleAugment) {
            continue;
        }
        let target = augment_target_path(arena, id)?;
        let first = &target[0];
        let Some(&frontier) = modules.get(&first.module) else {
            return Err(ReactorError::new(
                ErrorKind::UnresolvedAugment,
                first,
                "augment path starts in an unknown module",
            ));
        };
        requirements.push(AugmentRequirement {
            augment: id,
            remaining: target.iter().cloned().collect(),
            frontier,
            squashed: IndexSet::new(),
        });
    }

    for id in arena.ids() {
        if !matches!(arena[id].kind, GeneratorKind::UsesAugment) {
            continue;
        }
        let target = augment_target_path(arena, id)?;
        let Some(grouping) = arena[id].uses_grouping else {
            return Err(ReactorError::general(
                ErrorKind::Invariant,
                format!("uses-scoped augment {id} has no grouping anchor"),
            ));
        };
        let mut squashed = IndexSet::new();
        squashed.insert(namespace_of(arena, grouping));
        requirements.push(AugmentRequirement {
            augment: id,
            remaining: target.iter().cloned().collect(),
            frontier: grouping,
            squashed,
        });
    }

    debug!(count = requirements.len(), "augment requirements created");
    Ok(requirements)
}

/// Builds the diagnostic for requirements still pending after the fixed
/// point settled.
pub(crate) fn unresolved_error(
    arena: &Arena<'_>,
    pending: &[AugmentRequirement],
) -> ReactorError {
    let mut err = ReactorError::general(
        ErrorKind::UnresolvedAugment,
        format!("{} augment target(s) cannot be resolved", pending.len()),
    );
    for requirement in pending {
        err = err.with_chain(requirement.describe(arena));
    }
    err
}

fn augment_target_path<'a>(
    arena: &Arena<'a>,
    id: GeneratorId,
) -> Result<&'a [QName], ReactorError> {
    match arena[id].stmt.map(|s| &s.kind) {
        Some(StatementKind::Augment { target }) => Ok(target.segments()),
        _ => Err(ReactorError::general(
            ErrorKind::Invariant,
            format!("generator {id} is not backed by an augment statement"),
        )),
    }
}
