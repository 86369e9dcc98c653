//! Linkage passes
//!
//! Each submodule is one pass of the reactor: `uses` resolution, augment
//! target resolution, original-definition linkage, and type binding. The
//! helpers here implement the schema-tree search shared by the passes,
//! including the descent into used groupings and attached augments that makes
//! copy-site lookups work.

use trellis_schema::QName;

use crate::arena::{Arena, GeneratorId};
use crate::error::{ErrorKind, ReactorError};
use crate::generator::namespace_of;

pub mod augment;
pub mod origin;
pub mod types;
pub mod uses;

/// Outcome of one linkage attempt on one work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkageProgress {
    /// Nothing moved.
    None,
    /// Something moved, more remains.
    Some,
    /// The item is finished and can leave the work list.
    Done,
}

/// Runs `f` over every item, removing finished ones. Returns whether any
/// item made progress, which is what keeps the reactor's fixed-point loops
/// honest: a full pass without progress means the remaining items can never
/// resolve.
pub(crate) fn progress_and_clean<'s, T>(
    arena: &mut Arena<'s>,
    items: &mut Vec<T>,
    mut f: impl FnMut(&mut Arena<'s>, &mut T) -> Result<LinkageProgress, ReactorError>,
) -> Result<bool, ReactorError> {
    let mut progress = false;
    let mut index = 0;
    while index < items.len() {
        match f(arena, &mut items[index])? {
            LinkageProgress::None => index += 1,
            LinkageProgress::Some => {
                progress = true;
                index += 1;
            }
            LinkageProgress::Done => {
                progress = true;
                items.remove(index);
            }
        }
    }
    Ok(progress)
}

/// Finds a schema-tree child of `parent` by qualified name, searching local
/// children first and then the inferred axis (used groupings, attached
/// augments).
pub(crate) fn find_schema_tree(
    arena: &Arena<'_>,
    parent: GeneratorId,
    qname: &QName,
) -> Option<GeneratorId> {
    for &child in &arena[parent].children {
        if let Some(stmt) = arena[child].stmt {
            if stmt.schema_tree_name() == Some(qname) {
                return Some(child);
            }
        }
    }
    find_inferred(arena, parent, qname)
}

/// Searches only the inferred axis of `parent`: groupings first (the lookup
/// name re-bound into each grouping's own namespace), then attached
/// augments, which may carry groupings themselves.
pub(crate) fn find_inferred(
    arena: &Arena<'_>,
    parent: GeneratorId,
    qname: &QName,
) -> Option<GeneratorId> {
    for &grouping in &arena[parent].groupings {
        let bound = qname.bind_to(&namespace_of(arena, grouping));
        if let Some(found) = find_schema_tree(arena, grouping, &bound) {
            return Some(found);
        }
    }
    for &augment in &arena[parent].augments {
        if let Some(found) = find_schema_tree(arena, augment, qname) {
            return Some(found);
        }
    }
    None
}

/// The previous incarnation of `id` along the copy axis, or `None` when it
/// is its own original.
///
/// # Errors
///
/// Fails when linkage has not progressed far enough to know; callers are
/// ordered so this only happens on a reactor bug.
pub(crate) fn previous_of(
    arena: &Arena<'_>,
    id: GeneratorId,
) -> Result<Option<GeneratorId>, ReactorError> {
    use crate::generator::OriginalLink::*;
    match arena[id].original {
        Original => Ok(None),
        Partial(prev) | Complete { prev, .. } => Ok(Some(prev)),
        Unlinked => Err(ReactorError::general(
            ErrorKind::Invariant,
            format!("generator {id} has no linkage to its previous incarnation"),
        )),
    }
}

/// The original definition of `id`.
///
/// # Errors
///
/// Fails when original linkage has not completed for `id`.
pub(crate) fn original_of(arena: &Arena<'_>, id: GeneratorId) -> Result<GeneratorId, ReactorError> {
    use crate::generator::OriginalLink::*;
    match arena[id].original {
        Original => Ok(id),
        Complete { original, .. } => Ok(original),
        Unlinked | Partial(_) => Err(ReactorError::general(
            ErrorKind::Invariant,
            format!("generator {id} has no linkage to its original definition"),
        )),
    }
}
