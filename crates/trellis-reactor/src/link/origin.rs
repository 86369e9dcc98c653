//! Original-definition linkage
//!
//! Every copy-introduced generator is traced back to the generator of its
//! original (pre-copy) definition, recursively, to fixed point. Copies can
//! be layered: a grouping used inside another grouping, augmented from a
//! third place. The trace therefore proceeds one incarnation at a time:
//! first to the previous incarnation, then along its link until the chain
//! terminates.
//!
//! Tree iteration order does not match dependency order, so each composite
//! keeps two work lists: children whose originals are not yet linked, and
//! composite children whose subtrees still have unlinked work. A single
//! top-down pass is insufficient because a deeper node may depend on a node
//! elsewhere in the tree that this round has not visited yet.

use tracing::trace;

use crate::arena::{Arena, GeneratorId};
use crate::error::ReactorError;
use crate::generator::OriginalLink;
use crate::link::{find_inferred, find_schema_tree, previous_of, LinkageProgress};

/// Attempts to link one generator to its original definition.
///
/// Returns `true` when the terminal original is known after this call.
pub(crate) fn link_original(
    arena: &mut Arena<'_>,
    id: GeneratorId,
) -> Result<bool, ReactorError> {
    match arena[id].original {
        OriginalLink::Original | OriginalLink::Complete { .. } => Ok(true),
        OriginalLink::Partial(prev) => finish_from_previous(arena, id, prev),
        OriginalLink::Unlinked => {
            if !arena[id].is_copy() {
                arena[id].original = OriginalLink::Original;
                trace!(generator = %id, "linked to self");
                return Ok(true);
            }

            let Some(parent) = arena[id].parent else {
                return Err(ReactorError::general(
                    crate::error::ErrorKind::Invariant,
                    format!("copy-introduced generator {id} has no parent"),
                ));
            };
            let Some(qname) = arena[id].qname().cloned() else {
                return Err(ReactorError::general(
                    crate::error::ErrorKind::Invariant,
                    format!("copy-introduced generator {id} has no name"),
                ));
            };

            match original_child(arena, parent, &qname)? {
                None => Ok(false),
                Some(link @ OriginalLink::Complete { .. }) => {
                    arena[id].original = link;
                    trace!(generator = %id, "linked to original");
                    Ok(true)
                }
                Some(OriginalLink::Partial(prev)) => {
                    arena[id].original = OriginalLink::Partial(prev);
                    trace!(generator = %id, previous = %prev, "linked to intermediate");
                    Ok(false)
                }
                Some(_) => Err(ReactorError::general(
                    crate::error::ErrorKind::Invariant,
                    "original-child lookup produced a non-link",
                )),
            }
        }
    }
}

fn finish_from_previous(
    arena: &mut Arena<'_>,
    id: GeneratorId,
    prev: GeneratorId,
) -> Result<bool, ReactorError> {
    match arena[prev].original {
        OriginalLink::Original => {
            arena[id].original = OriginalLink::Complete {
                prev,
                original: prev,
            };
            Ok(true)
        }
        OriginalLink::Complete { original, .. } => {
            arena[id].original = OriginalLink::Complete { prev, original };
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Looks for the previous incarnation of a child named `qname` from the
/// perspective of `parent`: first through the parent's own groupings and
/// augments, then through the parent's previous incarnation with the name
/// re-bound into that incarnation's namespace.
fn original_child(
    arena: &Arena<'_>,
    parent: GeneratorId,
    qname: &trellis_schema::QName,
) -> Result<Option<OriginalLink>, ReactorError> {
    if let Some(found) = find_inferred(arena, parent, qname) {
        return Ok(Some(link_toward(arena, found)));
    }

    if let Some(prev) = previous_of(arena, parent)? {
        let bound = qname.bind_to(&crate::generator::namespace_of(arena, prev));
        if let Some(found) = find_schema_tree(arena, prev, &bound) {
            return Ok(Some(link_toward(arena, found)));
        }
    }

    Ok(None)
}

/// The link a generator should adopt when `found` is its previous
/// incarnation.
fn link_toward(arena: &Arena<'_>, found: GeneratorId) -> OriginalLink {
    match arena[found].original {
        OriginalLink::Original => OriginalLink::Complete {
            prev: found,
            original: found,
        },
        OriginalLink::Complete { original, .. } => OriginalLink::Complete {
            prev: found,
            original,
        },
        _ => OriginalLink::Partial(found),
    }
}

/// Attempts to link the subtree rooted at `id`, consuming the composite's
/// work lists as children complete.
pub(crate) fn link_original_recursive(
    arena: &mut Arena<'_>,
    id: GeneratorId,
) -> Result<LinkageProgress, ReactorError> {
    if arena[id].origin_done {
        return Ok(LinkageProgress::Done);
    }

    if arena[id].origin_children.is_none() {
        let explicit: Vec<GeneratorId> = arena[id]
            .children
            .iter()
            .copied()
            .filter(|&c| arena[c].stmt.is_some())
            .collect();
        arena[id].origin_children = Some(explicit);
    }

    let mut progress = LinkageProgress::None;

    // Children first; composites that link get queued for recursion.
    let children = arena[id].origin_children.take().unwrap_or_default();
    let mut remaining = Vec::new();
    for child in children {
        if link_original(arena, child)? {
            progress = LinkageProgress::Some;
            if arena[child].is_composite() {
                arena[id].origin_composites.push(child);
            }
        } else {
            remaining.push(child);
        }
    }
    arena[id].origin_children = Some(remaining);

    // Then composite subtrees queued so far.
    let composites = std::mem::take(&mut arena[id].origin_composites);
    let mut keep = Vec::new();
    for composite in composites {
        match link_original_recursive(arena, composite)? {
            LinkageProgress::Done => progress = LinkageProgress::Some,
            LinkageProgress::Some => {
                progress = LinkageProgress::Some;
                keep.push(composite);
            }
            LinkageProgress::None => keep.push(composite),
        }
    }
    arena[id].origin_composites = keep;

    let children_empty = arena[id]
        .origin_children
        .as_ref()
        .is_some_and(Vec::is_empty);
    if children_empty && arena[id].origin_composites.is_empty() {
        arena[id].origin_done = true;
        return Ok(LinkageProgress::Done);
    }
    Ok(progress)
}
