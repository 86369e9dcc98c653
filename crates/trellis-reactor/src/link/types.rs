//! Type and typedef linkage
//!
//! Resolves the declared type of every type-bearing generator (leaf,
//! leaf-list, typedef): builtin primitives terminate immediately, typedef
//! references are linked tree-scoped, `identityref` resolves eagerly to its
//! base identity generators, and `union` branches are resolved recursively
//! with structural duplicates removed and member names fixed.
//!
//! Leafref resolution is position-sensitive. Inside a grouping it is lenient:
//! the path may target a sibling that only exists per instantiation, so an
//! unresolved path becomes an opaque placeholder carrying the path. Outside a
//! grouping it is strict and failure is fatal. Copy-introduced leaves inherit
//! their original's resolution and, at concrete instantiation sites,
//! re-attempt any leftover lenient leafref against their own position.

use tracing::{debug, trace};

use trellis_schema::{
    BuiltinType, LeafrefPath, LeafrefStep, QName, Statement, StatementKind, TypeArgument,
};

use crate::arena::{Arena, GeneratorId};
use crate::error::{ErrorKind, ReactorError};
use crate::generator::{GeneratorKind, TypeReference, TypeState, UnionBranch};
use crate::link::{find_schema_tree, original_of};
use crate::naming::lower_camel_case;
use crate::scope::{resolve_tree_scoped, DefinitionKind, ModuleMap, ScopeStack};

/// Resolves declared types for all original (non-copy) type-bearing
/// generators and links identity bases.
pub(crate) fn bind_types(arena: &mut Arena<'_>, modules: &ModuleMap) -> Result<(), ReactorError> {
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
    let composite = arena[id].is_composite();
    if composite {
        scope.push(id);
    }

    let children = arena[id].children.clone();
    for child in children {
        let is_identity = matches!(arena[child].kind, GeneratorKind::Identity);
        if is_identity {
            link_identity(arena, modules, scope, child)?;
        } else if arena[child].is_type_bearing() && !arena[child].is_copy() {
            link_type(arena, modules, scope, child)?;
        }
        if arena[child].is_composite() {
            visit(arena, modules, scope, child)?;
        }
    }

    if composite {
        scope.pop();
    }
    Ok(())
}

fn link_identity(
    arena: &mut Arena<'_>,
    modules: &ModuleMap,
    scope: &ScopeStack,
    id: GeneratorId,
) -> Result<(), ReactorError> {
    let Some(stmt) = arena[id].stmt else {
        return Ok(());
    };
    let bases: Vec<QName> = stmt.base_identities().cloned().collect();
    let mut resolved = Vec::with_capacity(bases.len());
    for base in &bases {
        resolved.push(resolve_tree_scoped(
            arena,
            modules,
            scope,
            DefinitionKind::Identity,
            base,
        )?);
    }
    arena[id].base_identities = resolved;
    Ok(())
}

fn link_type(
    arena: &mut Arena<'_>,
    modules: &ModuleMap,
    scope: &ScopeStack,
    id: GeneratorId,
) -> Result<(), ReactorError> {
    let Some(stmt) = arena[id].stmt else {
        return Err(ReactorError::general(
            ErrorKind::Invariant,
            format!("type-bearing generator {id} has no statement"),
        ));
    };
    let Some(type_stmt) = stmt.find_type() else {
        return Err(ReactorError::new(
            ErrorKind::InvalidInput,
            stmt.argument_name().map(|q| q.to_string()).unwrap_or_default(),
            "type-bearing statement has no 'type' substatement",
        ));
    };

    let resolved = resolve_type(arena, modules, scope, id, type_stmt)?;
    trace!(generator = %id, "type reference bound");
    arena[id].type_state = TypeState::Resolved(resolved);
    Ok(())
}

fn resolve_type<'s>(
    arena: &Arena<'s>,
    modules: &ModuleMap,
    scope: &ScopeStack,
    at: GeneratorId,
    type_stmt: &'s Statement,
) -> Result<TypeReference<'s>, ReactorError> {
    let StatementKind::Type { argument } = &type_stmt.kind else {
        return Err(ReactorError::general(
            ErrorKind::Invariant,
            "resolve_type called on a non-type statement",
        ));
    };

    match argument {
        TypeArgument::Derived(name) => Ok(TypeReference::Typedef(resolve_tree_scoped(
            arena,
            modules,
            scope,
            DefinitionKind::Typedef,
            name,
        )?)),
        TypeArgument::Builtin(BuiltinType::Leafref) => {
            let Some(path) = type_stmt.find_path() else {
                return Err(ReactorError::new(
                    ErrorKind::InvalidInput,
                    describe(arena, at),
                    "leafref type has no 'path' substatement",
                ));
            };
            match resolve_leafref(arena, modules, at, path) {
                Some(target) => Ok(TypeReference::Leafref(target)),
                None if in_grouping(arena, at) => {
                    debug!(generator = %at, path = %path, "leafref deferred to instantiation");
                    Ok(TypeReference::UnresolvedLeafref(path))
                }
                None => Err(ReactorError::new(
                    ErrorKind::UnresolvedLeafref,
                    describe(arena, at),
                    format!("leafref path '{path}' does not resolve"),
                )),
            }
        }
        TypeArgument::Builtin(BuiltinType::Identityref) => {
            let bases: Vec<&QName> = type_stmt.base_identities().collect();
            if bases.is_empty() {
                return Err(ReactorError::new(
                    ErrorKind::InvalidInput,
                    describe(arena, at),
                    "identityref type has no 'base' substatement",
                ));
            }
            let mut resolved = Vec::with_capacity(bases.len());
            for base in bases {
                resolved.push(resolve_tree_scoped(
                    arena,
                    modules,
                    scope,
                    DefinitionKind::Identity,
                    base,
                )?);
            }
            Ok(TypeReference::IdentityRef(resolved))
        }
        TypeArgument::Builtin(BuiltinType::Union) => {
            let mut branches = Vec::new();
            for member in type_stmt.member_types() {
                branches.push(resolve_type(arena, modules, scope, at, member)?);
            }
            if branches.is_empty() {
                return Err(ReactorError::new(
                    ErrorKind::InvalidInput,
                    describe(arena, at),
                    "union type has no member types",
                ));
            }
            Ok(TypeReference::Union(union_branches(arena, branches)))
        }
        TypeArgument::Builtin(builtin) => Ok(TypeReference::Builtin(*builtin)),
    }
}

/// Removes structural duplicates and assigns deterministic member names
/// derived from each branch's source and position, keeping output stable
/// across runs.
fn union_branches<'s>(
    arena: &Arena<'s>,
    resolved: Vec<TypeReference<'s>>,
) -> Vec<UnionBranch<'s>> {
    let mut kept: Vec<(usize, TypeReference<'s>)> = Vec::new();
    for (position, branch) in resolved.into_iter().enumerate() {
        if !kept.iter().any(|(_, existing)| *existing == branch) {
            kept.push((position, branch));
        }
    }

    let mut names: Vec<String> = Vec::new();
    let mut branches = Vec::with_capacity(kept.len());
    for (position, ty) in kept {
        let base = branch_base_name(arena, &ty);
        let name = if names.contains(&base) {
            format!("{base}{}", position + 1)
        } else {
            base
        };
        names.push(name.clone());
        branches.push(UnionBranch { name, ty });
    }
    branches
}

fn branch_base_name(arena: &Arena<'_>, ty: &TypeReference<'_>) -> String {
    match ty {
        TypeReference::Builtin(b) => lower_camel_case(b.keyword()),
        TypeReference::Typedef(id) => lower_camel_case(
            arena[*id]
                .qname()
                .map(|q| q.local.as_str())
                .unwrap_or("typedef"),
        ),
        TypeReference::Leafref(_) | TypeReference::UnresolvedLeafref(_) => "leafref".to_string(),
        TypeReference::IdentityRef(_) => "identityref".to_string(),
        TypeReference::Union(_) => "union".to_string(),
    }
}

/// Resolves a leafref path from the position of `at`. Relative paths start
/// at the node itself; absolute paths at the root of the module the first
/// segment names.
pub(crate) fn resolve_leafref(
    arena: &Arena<'_>,
    modules: &ModuleMap,
    at: GeneratorId,
    path: &LeafrefPath,
) -> Option<GeneratorId> {
    let mut current = if path.is_absolute() {
        let first = match path.steps().first()? {
            LeafrefStep::Child(q) => q,
            LeafrefStep::Parent => return None,
        };
        *modules.get(&first.module)?
    } else {
        at
    };

    for step in path.steps() {
        current = match step {
            LeafrefStep::Parent => arena[current].parent?,
            LeafrefStep::Child(q) => find_schema_tree(arena, current, q)?,
        };
    }

    arena[current].is_type_bearing().then_some(current)
}

/// Whether a generator sits inside a `grouping` definition.
pub(crate) fn in_grouping(arena: &Arena<'_>, id: GeneratorId) -> bool {
    let mut current = arena[id].parent;
    while let Some(ancestor) = current {
        if matches!(arena[ancestor].kind, GeneratorKind::Grouping) {
            return true;
        }
        current = arena[ancestor].parent;
    }
    false
}

/// Cascades type resolution onto copy-introduced generators.
///
/// Copies inherit their original definition's resolution. At a concrete
/// (non-grouping) site, a leftover lenient leafref is re-attempted against
/// the copy's own position; this is where differently-typed siblings at
/// different instantiation sites get their own concrete types. Lenient
/// leafrefs nested inside unions keep their opaque placeholder.
pub(crate) fn inherit_copy_types(
    arena: &mut Arena<'_>,
    modules: &ModuleMap,
) -> Result<(), ReactorError> {
    let ids: Vec<GeneratorId> = arena.ids().collect();
    for id in ids {
        if !arena[id].is_type_bearing() || !arena[id].is_copy() {
            continue;
        }

        let original = original_of(arena, id)?;
        arena[id].type_state = arena[original].type_state.clone();

        if in_grouping(arena, id) {
            continue;
        }
        let TypeReference::UnresolvedLeafref(path) = effective_type(arena, id)? else {
            continue;
        };
        match resolve_leafref(arena, modules, id, path) {
            Some(target) => {
                trace!(generator = %id, target = %target, "leafref re-resolved at instantiation");
                arena[id].type_state = TypeState::Resolved(TypeReference::Leafref(target));
                arena[id].type_overridden = true;
            }
            None => {
                return Err(ReactorError::new(
                    ErrorKind::UnresolvedLeafref,
                    describe(arena, id),
                    format!("leafref path '{path}' does not resolve at instantiation site"),
                )
                .with_chain(format!("original definition at {}", describe(arena, original))));
            }
        }
    }
    Ok(())
}

/// Chases the typedef-derivation chain to the terminal type reference.
///
/// # Errors
///
/// Fails with [`ErrorKind::RecursiveType`] when the chain loops back on
/// itself.
pub(crate) fn effective_type<'s>(
    arena: &Arena<'s>,
    id: GeneratorId,
) -> Result<TypeReference<'s>, ReactorError> {
    let mut visited = vec![id];
    let mut current = arena[id]
        .type_state
        .resolved()
        .cloned()
        .ok_or_else(|| {
            ReactorError::general(
                ErrorKind::Invariant,
                format!("effective type requested before resolution of {id}"),
            )
        })?;

    loop {
        match current {
            TypeReference::Typedef(td) => {
                if visited.contains(&td) {
                    let mut err = ReactorError::new(
                        ErrorKind::RecursiveType,
                        describe(arena, id),
                        "type derivation chain loops back on itself",
                    );
                    for step in &visited {
                        err = err.with_chain(describe(arena, *step));
                    }
                    return Err(err);
                }
                visited.push(td);
                current = arena[td].type_state.resolved().cloned().ok_or_else(|| {
                    ReactorError::general(
                        ErrorKind::Invariant,
                        format!("typedef {td} used before resolution"),
                    )
                })?;
            }
            other => return Ok(other),
        }
    }
}

/// Verifies every type-bearing generator has a finite derivation chain,
/// including chains that pass through leafref targets.
pub(crate) fn validate_type_chains(arena: &Arena<'_>) -> Result<(), ReactorError> {
    for id in arena.ids() {
        if !arena[id].is_type_bearing() || arena[id].type_state.resolved().is_none() {
            continue;
        }
        let mut visited = Vec::new();
        check_chain(arena, id, &mut visited)?;
    }
    Ok(())
}

fn check_chain(
    arena: &Arena<'_>,
    id: GeneratorId,
    visited: &mut Vec<GeneratorId>,
) -> Result<(), ReactorError> {
    if visited.contains(&id) {
        return Err(ReactorError::new(
            ErrorKind::RecursiveType,
            describe(arena, id),
            "leafref chain loops back on itself",
        ));
    }
    visited.push(id);
    if let TypeReference::Leafref(target) = effective_type(arena, id)? {
        check_chain(arena, target, visited)?;
    }
    Ok(())
}

fn describe(arena: &Arena<'_>, id: GeneratorId) -> String {
    arena[id]
        .qname()
        .map(|q| q.to_string())
        .unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_forest;
    use trellis_schema::{ModuleId, SchemaContext};

    fn qn(local: &str) -> QName {
        QName::new("m", local)
    }

    fn string_type() -> Statement {
        Statement::type_stmt(TypeArgument::Builtin(BuiltinType::String))
    }

    fn linked(modules: Vec<Statement>) -> (SchemaContext, ()) {
        (SchemaContext::new(modules).unwrap(), ())
    }

    #[test]
    fn test_builtin_resolution() {
        let module = Statement::module("m")
            .with_child(Statement::leaf(qn("x")).with_child(string_type()));
        let (ctx, ()) = linked(vec![module]);
        let (mut arena, modules) = build_forest(&ctx).unwrap();
        bind_types(&mut arena, &modules).unwrap();

        let root = modules[&ModuleId::new("m")];
        let leaf = arena[root].children[0];
        assert_eq!(
            arena[leaf].type_state.resolved(),
            Some(&TypeReference::Builtin(BuiltinType::String))
        );
    }

    #[test]
    fn test_typedef_reference_and_effective_chase() {
        let module = Statement::module("m")
            .with_child(Statement::typedef(qn("mtype")).with_child(string_type()))
            .with_child(Statement::leaf(qn("x")).with_child(Statement::type_stmt(
                TypeArgument::Derived(qn("mtype")),
            )));
        let (ctx, ()) = linked(vec![module]);
        let (mut arena, modules) = build_forest(&ctx).unwrap();
        bind_types(&mut arena, &modules).unwrap();

        let root = modules[&ModuleId::new("m")];
        let td = arena[root].children[0];
        let leaf = arena[root].children[1];
        assert_eq!(
            arena[leaf].type_state.resolved(),
            Some(&TypeReference::Typedef(td))
        );
        assert_eq!(
            effective_type(&arena, leaf).unwrap(),
            TypeReference::Builtin(BuiltinType::String)
        );
    }

    #[test]
    fn test_self_referencing_typedef_is_fatal() {
        let module = Statement::module("m").with_child(
            Statement::typedef(qn("loop")).with_child(Statement::type_stmt(
                TypeArgument::Derived(qn("loop")),
            )),
        );
        let (ctx, ()) = linked(vec![module]);
        let (mut arena, modules) = build_forest(&ctx).unwrap();
        bind_types(&mut arena, &modules).unwrap();

        let err = validate_type_chains(&arena).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RecursiveType);
    }

    #[test]
    fn test_strict_leafref_resolves_sibling() {
        let module = Statement::module("m").with_child(
            Statement::container(qn("box")).with_children([
                Statement::leaf(qn("a")).with_child(string_type()),
                Statement::leaf(qn("b")).with_child(
                    Statement::type_stmt(TypeArgument::Builtin(BuiltinType::Leafref)).with_child(
                        Statement::path_stmt(trellis_schema::LeafrefPath::relative(vec![
                            LeafrefStep::Parent,
                            LeafrefStep::Child(qn("a")),
                        ])),
                    ),
                ),
            ]),
        );
        let (ctx, ()) = linked(vec![module]);
        let (mut arena, modules) = build_forest(&ctx).unwrap();
        bind_types(&mut arena, &modules).unwrap();

        let root = modules[&ModuleId::new("m")];
        let boxed = arena[root].children[0];
        let a = arena[boxed].children[0];
        let b = arena[boxed].children[1];
        assert_eq!(
            arena[b].type_state.resolved(),
            Some(&TypeReference::Leafref(a))
        );
    }

    #[test]
    fn test_strict_leafref_failure_is_fatal() {
        let module = Statement::module("m").with_child(
            Statement::container(qn("box")).with_child(
                Statement::leaf(qn("b")).with_child(
                    Statement::type_stmt(TypeArgument::Builtin(BuiltinType::Leafref)).with_child(
                        Statement::path_stmt(trellis_schema::LeafrefPath::relative(vec![
                            LeafrefStep::Parent,
                            LeafrefStep::Child(qn("missing")),
                        ])),
                    ),
                ),
            ),
        );
        let (ctx, ()) = linked(vec![module]);
        let (mut arena, modules) = build_forest(&ctx).unwrap();
        let err = bind_types(&mut arena, &modules).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnresolvedLeafref);
    }

    #[test]
    fn test_grouping_leafref_is_lenient() {
        let module = Statement::module("m").with_child(
            Statement::grouping(qn("grp")).with_child(
                Statement::leaf(qn("ref")).with_child(
                    Statement::type_stmt(TypeArgument::Builtin(BuiltinType::Leafref)).with_child(
                        Statement::path_stmt(trellis_schema::LeafrefPath::relative(vec![
                            LeafrefStep::Parent,
                            LeafrefStep::Child(qn("sibling")),
                        ])),
                    ),
                ),
            ),
        );
        let (ctx, ()) = linked(vec![module]);
        let (mut arena, modules) = build_forest(&ctx).unwrap();
        bind_types(&mut arena, &modules).unwrap();

        let root = modules[&ModuleId::new("m")];
        let grp = arena[root].children[0];
        let leaf = arena[grp].children[0];
        assert!(matches!(
            arena[leaf].type_state.resolved(),
            Some(TypeReference::UnresolvedLeafref(_))
        ));
    }

    #[test]
    fn test_union_dedup_and_member_names() {
        let module = Statement::module("m").with_child(
            Statement::leaf(qn("u")).with_child(
                Statement::type_stmt(TypeArgument::Builtin(BuiltinType::Union))
                    .with_child(string_type())
                    .with_child(string_type())
                    .with_child(Statement::type_stmt(TypeArgument::Builtin(
                        BuiltinType::Int32,
                    ))),
            ),
        );
        let (ctx, ()) = linked(vec![module]);
        let (mut arena, modules) = build_forest(&ctx).unwrap();
        bind_types(&mut arena, &modules).unwrap();

        let root = modules[&ModuleId::new("m")];
        let leaf = arena[root].children[0];
        let Some(TypeReference::Union(branches)) = arena[leaf].type_state.resolved() else {
            panic!("expected union");
        };
        // Duplicate string branch removed; names stable.
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].name, "string");
        assert_eq!(branches[1].name, "int32");
    }

    #[test]
    fn test_identityref_resolves_bases() {
        let module = Statement::module("m")
            .with_child(Statement::identity(qn("iden")))
            .with_child(Statement::leaf(qn("kind")).with_child(
                Statement::type_stmt(TypeArgument::Builtin(BuiltinType::Identityref))
                    .with_child(Statement::base(qn("iden"))),
            ));
        let (ctx, ()) = linked(vec![module]);
        let (mut arena, modules) = build_forest(&ctx).unwrap();
        bind_types(&mut arena, &modules).unwrap();

        let root = modules[&ModuleId::new("m")];
        let iden = arena[root].children[0];
        let leaf = arena[root].children[1];
        assert_eq!(
            arena[leaf].type_state.resolved(),
            Some(&TypeReference::IdentityRef(vec![iden]))
        );
    }

    #[test]
    fn test_identity_base_hierarchy() {
        let module = Statement::module("m")
            .with_child(Statement::identity(qn("base-kind")))
            .with_child(
                Statement::identity(qn("derived-kind"))
                    .with_child(Statement::base(qn("base-kind"))),
            );
        let (ctx, ()) = linked(vec![module]);
        let (mut arena, modules) = build_forest(&ctx).unwrap();
        bind_types(&mut arena, &modules).unwrap();

        let root = modules[&ModuleId::new("m")];
        let base = arena[root].children[0];
        let derived = arena[root].children[1];
        assert_eq!(arena[derived].base_identities, vec![base]);
        assert!(arena[base].base_identities.is_empty());
    }
}
