//! Reactor orchestration
//!
//! [`Reactor`] sequences the linkage passes in dependency order and exposes
//! the finished generator forest. A reactor executes once: re-executing a
//! finished reactor returns the cached result, and re-entering a running one
//! is an error, never a restart.

use tracing::debug;

use trellis_model::{
    EmittedType, Property, PropertyType, TypeBuilderFactory, TypeKind, TypeName, TypeSpec,
    UnionMember,
};
use trellis_schema::{ModuleId, SchemaContext};

use crate::arena::{Arena, GeneratorId};
use crate::builder::build_forest;
use crate::error::{ErrorKind, ReactorError};
use crate::generator::{Generator, GeneratorKind, Lazy, Placement, TypeReference};
use crate::link::augment::{create_requirements, unresolved_error};
use crate::link::origin::{link_original, link_original_recursive};
use crate::link::types::{bind_types, effective_type, inherit_copy_types, validate_type_chains};
use crate::link::uses::link_uses;
use crate::link::progress_and_clean;
use crate::naming::{ensure_members, finalize_names, lower_camel_case, NamingTable};
use crate::scope::ModuleMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initialized,
    Executing,
    Finished,
}

/// A single-use, multi-stage reactor turning a statement forest into a
/// resolved generator forest.
#[derive(Debug)]
pub struct Reactor<'s> {
    arena: Arena<'s>,
    modules: ModuleMap,
    naming: NamingTable,
    state: State,
}

impl<'s> Reactor<'s> {
    /// Builds the generator forest for a schema context. Copy filtering and
    /// augment ordering happen here; linkage happens in [`Self::execute`].
    pub fn new(context: &'s SchemaContext) -> Result<Self, ReactorError> {
        let (arena, modules) = build_forest(context)?;
        Ok(Self {
            arena,
            modules,
            naming: NamingTable::new(),
            state: State::Initialized,
        })
    }

    /// Executes the reactor:
    ///
    /// 1. link `uses` statements to grouping generators
    /// 2. start augment requirements and original-definition linkage, then
    ///    drive both to a common fixed point
    /// 3. bind type references and cascade them onto copies
    /// 4. solve collision-domain naming to a fixed point
    /// 5. materialize types through `factory`
    ///
    /// Executing a finished reactor is a no-op; the resolved forest stays
    /// available through the accessors.
    pub fn execute(&mut self, factory: &dyn TypeBuilderFactory) -> Result<(), ReactorError> {
        match self.state {
            State::Finished => return Ok(()),
            State::Executing => {
                return Err(ReactorError::general(
                    ErrorKind::Invariant,
                    "cannot resume partial reactor execution",
                ))
            }
            State::Initialized => self.state = State::Executing,
        }

        // Step 1: uses/grouping linkage. This also anchors uses-scoped
        // augments to their groupings.
        link_uses(&mut self.arena, &self.modules)?;

        // Step 2: augment requirements plus original-definition linkage.
        // Neither can finish without the other in general (augments may
        // traverse nodes whose originals are still unlinked, originals of
        // augment-introduced nodes need the augment attached), so both run
        // in one fixed-point loop driven by work-list progress.
        let mut augments = create_requirements(&self.arena, &self.modules)?;
        debug!(augments = augments.len(), "starting linkage fixed point");

        let roots: Vec<GeneratorId> = self.modules.values().copied().collect();
        for &root in &roots {
            if !link_original(&mut self.arena, root)? {
                return Err(ReactorError::general(
                    ErrorKind::Invariant,
                    format!("module generator {root} failed to self-link"),
                ));
            }
        }

        let mut unlinked = roots.clone();
        loop {
            let origins_progressed =
                progress_and_clean(&mut self.arena, &mut unlinked, |arena, id| {
                    link_original_recursive(arena, *id)
                })?;
            let augments_progressed =
                progress_and_clean(&mut self.arena, &mut augments, |arena, requirement| {
                    requirement.resolve(arena)
                })?;

            if unlinked.is_empty() && augments.is_empty() {
                break;
            }
            if !origins_progressed && !augments_progressed {
                let mut err = unresolved_error(&self.arena, &augments);
                for id in &unlinked {
                    err = err.with_chain(format!("module subtree {id} remains unlinked"));
                }
                return Err(err);
            }
        }

        // Steps 3 and 4: type binding, then the cascade along the copy axis,
        // then the derivation-chain sanity check.
        bind_types(&mut self.arena, &self.modules)?;
        inherit_copy_types(&mut self.arena, &self.modules)?;
        validate_type_chains(&self.arena)?;

        // Step 5: naming. Members first, then the global solve loop, then
        // the final (package, name) assignment.
        ensure_members(&mut self.arena, &self.modules, &mut self.naming)?;
        self.naming.solve_all(&self.arena)?;
        finalize_names(&mut self.arena, &self.modules, &mut self.naming);

        // Step 6: materialize types.
        for &root in &roots {
            self.ensure_type(factory, root)?;
        }

        debug!(modules = self.modules.len(), "reactor finished");
        self.state = State::Finished;
        Ok(())
    }

    /// Module namespaces and their root generators, in dependency order.
    pub fn modules(&self) -> impl Iterator<Item = (&ModuleId, GeneratorId)> {
        self.modules.iter().map(|(m, &g)| (m, g))
    }

    /// Borrow of one generator node.
    pub fn generator(&self, id: GeneratorId) -> &Generator<'s> {
        &self.arena[id]
    }

    /// The assigned (package, name) pair of a generator that claims a name.
    pub fn type_name(&self, id: GeneratorId) -> Option<&TypeName> {
        self.arena[id].assigned_name.as_ref()
    }

    /// The materialized type of a generator that emits one.
    pub fn emitted(&self, id: GeneratorId) -> Option<&EmittedType> {
        self.arena[id].emitted.done().and_then(Option::as_ref)
    }

    /// The original definition of a generator, once linkage has finished.
    pub fn original(&self, id: GeneratorId) -> Option<GeneratorId> {
        crate::link::original_of(&self.arena, id).ok()
    }

    /// The previous incarnation of a generator along the copy axis.
    pub fn previous(&self, id: GeneratorId) -> Option<GeneratorId> {
        crate::link::previous_of(&self.arena, id).ok().flatten()
    }

    /// The resolved target of an augment generator.
    pub fn augment_target(&self, id: GeneratorId) -> Option<GeneratorId> {
        self.arena[id].augment_target
    }

    /// Walks materialized children by local name, for inspection and tests.
    pub fn find(&self, module: &ModuleId, path: &[&str]) -> Option<GeneratorId> {
        let mut current = *self.modules.get(module)?;
        for segment in path {
            current = self.arena[current]
                .children
                .iter()
                .copied()
                .find(|&c| {
                    self.arena[c]
                        .qname()
                        .is_some_and(|q| q.local == *segment)
                })?;
        }
        Some(current)
    }

    fn ensure_type(
        &mut self,
        factory: &dyn TypeBuilderFactory,
        id: GeneratorId,
    ) -> Result<(), ReactorError> {
        match self.arena[id].emitted {
            Lazy::Done(_) => return Ok(()),
            Lazy::InProgress => {
                return Err(ReactorError::general(
                    ErrorKind::Invariant,
                    format!("re-entrant type materialization of {id}"),
                ))
            }
            Lazy::NotStarted => {}
        }

        self.arena[id].emitted = Lazy::InProgress;
        let emitted = match self.arena[id].placement {
            Placement::None | Placement::Phantom => None,
            Placement::Member | Placement::TopLevel => {
                Some(factory.create(build_spec(&self.arena, id)?))
            }
        };
        self.arena[id].emitted = Lazy::Done(emitted);

        let children = self.arena[id].children.clone();
        for child in children {
            self.ensure_type(factory, child)?;
        }
        Ok(())
    }
}

fn build_spec(arena: &Arena<'_>, id: GeneratorId) -> Result<TypeSpec, ReactorError> {
    let name = arena[id].assigned_name.clone().ok_or_else(|| {
        ReactorError::general(
            ErrorKind::Invariant,
            format!("emitting generator {id} has no assigned name"),
        )
    })?;

    let spec = match &arena[id].kind {
        GeneratorKind::Module { .. }
        | GeneratorKind::Container
        | GeneratorKind::List
        | GeneratorKind::Choice
        | GeneratorKind::Case
        | GeneratorKind::Input
        | GeneratorKind::Output
        | GeneratorKind::Notification
        | GeneratorKind::Grouping => {
            let mut spec = TypeSpec::new(name, TypeKind::Interface);
            for &grouping in &arena[id].groupings {
                if let Some(grouping_name) = &arena[grouping].assigned_name {
                    spec.implements.push(grouping_name.clone());
                }
            }
            spec.properties = child_properties(arena, id)?;
            spec
        }
        GeneratorKind::ModuleAugment => {
            let mut spec = TypeSpec::new(name, TypeKind::Augmentation);
            if let Some(target) = arena[id].augment_target {
                if let Some(target_name) = &arena[target].assigned_name {
                    spec.implements.push(target_name.clone());
                }
            }
            spec.properties = child_properties(arena, id)?;
            spec
        }
        GeneratorKind::Typedef => {
            let mut spec = TypeSpec::new(name, TypeKind::Typedef);
            let mut visited = Vec::new();
            spec.properties.push(Property {
                name: "value".to_string(),
                ty: data_property_type(arena, id, &mut visited)?,
            });
            spec
        }
        GeneratorKind::Identity => {
            let mut spec = TypeSpec::new(name, TypeKind::Identity);
            for &base in &arena[id].base_identities {
                if let Some(base_name) = &arena[base].assigned_name {
                    spec.implements.push(base_name.clone());
                }
            }
            spec
        }
        GeneratorKind::ListKey { list } => {
            let mut spec = TypeSpec::new(name, TypeKind::Key);
            let leaves = arena[*list]
                .stmt
                .and_then(|s| s.find_key())
                .unwrap_or_default();
            for &child in &arena[*list].children {
                let Some(qname) = arena[child].qname() else {
                    continue;
                };
                if matches!(arena[child].kind, GeneratorKind::Leaf)
                    && leaves.contains(&qname.local)
                {
                    let mut visited = Vec::new();
                    spec.properties.push(Property {
                        name: lower_camel_case(&qname.local),
                        ty: data_property_type(arena, child, &mut visited)?,
                    });
                }
            }
            spec
        }
        GeneratorKind::Feature => TypeSpec::new(name, TypeKind::Feature),
        GeneratorKind::NotificationAggregate {
            notifications: members,
        }
        | GeneratorKind::RpcAggregate { rpcs: members } => {
            let mut spec = TypeSpec::new(name, TypeKind::Aggregate);
            for &member in members {
                let Some(qname) = arena[member].qname() else {
                    continue;
                };
                // Phantom members still carry an assigned name.
                let target = match arena[member].assigned_name.as_ref() {
                    Some(member_name) => PropertyType::Named(member_name.clone()),
                    None => PropertyType::Opaque,
                };
                spec.properties.push(Property {
                    name: lower_camel_case(&qname.local),
                    ty: target,
                });
            }
            spec
        }
        GeneratorKind::Leaf
        | GeneratorKind::LeafList
        | GeneratorKind::AnyData
        | GeneratorKind::AnyXml
        | GeneratorKind::Rpc
        | GeneratorKind::Action
        | GeneratorKind::UsesAugment => {
            return Err(ReactorError::general(
                ErrorKind::Invariant,
                format!("generator {id} does not emit a type but was asked to"),
            ))
        }
    };
    Ok(spec)
}

/// Properties contributed by a composite's children.
///
/// Augment-introduced children belong to their augment's type and are
/// skipped. Children added by `uses` are covered by the grouping interface
/// and are skipped too, with one exception: a leaf whose lenient leafref was
/// re-resolved at this instantiation site contributes an overriding property
/// with the concrete type.
fn child_properties(arena: &Arena<'_>, id: GeneratorId) -> Result<Vec<Property>, ReactorError> {
    let mut properties = Vec::new();
    for &child in &arena[id].children {
        let copy = arena[child].copy_history();
        if copy.is_augmenting() {
            continue;
        }
        let Some(qname) = arena[child].qname() else {
            continue;
        };

        match arena[child].kind {
            GeneratorKind::Leaf | GeneratorKind::LeafList => {
                if copy.is_added_by_uses() && !arena[child].type_overridden {
                    continue;
                }
                let mut visited = Vec::new();
                let mut ty = data_property_type(arena, child, &mut visited)?;
                if matches!(arena[child].kind, GeneratorKind::LeafList) {
                    ty = PropertyType::ListOf(Box::new(ty));
                }
                properties.push(Property {
                    name: lower_camel_case(&qname.local),
                    ty,
                });
            }
            GeneratorKind::AnyData | GeneratorKind::AnyXml => {
                if copy.is_added_by_uses() {
                    continue;
                }
                properties.push(Property {
                    name: lower_camel_case(&qname.local),
                    ty: PropertyType::Opaque,
                });
            }
            GeneratorKind::Container | GeneratorKind::Choice | GeneratorKind::List => {
                let Some(child_name) = &arena[child].assigned_name else {
                    continue;
                };
                let mut ty = PropertyType::Named(child_name.clone());
                if matches!(arena[child].kind, GeneratorKind::List) {
                    ty = PropertyType::ListOf(Box::new(ty));
                }
                properties.push(Property {
                    name: lower_camel_case(&qname.local),
                    ty,
                });
            }
            _ => {}
        }
    }
    Ok(properties)
}

/// Maps a type-bearing generator's effective type to a property type,
/// chasing leafref targets to their concrete representation.
fn data_property_type(
    arena: &Arena<'_>,
    id: GeneratorId,
    visited: &mut Vec<GeneratorId>,
) -> Result<PropertyType, ReactorError> {
    if visited.contains(&id) {
        return Err(ReactorError::general(
            ErrorKind::RecursiveType,
            format!("leafref chain loops through {id}"),
        ));
    }
    visited.push(id);
    let reference = effective_type(arena, id)?;
    map_reference(arena, &reference, visited)
}

fn map_reference(
    arena: &Arena<'_>,
    reference: &TypeReference<'_>,
    visited: &mut Vec<GeneratorId>,
) -> Result<PropertyType, ReactorError> {
    match reference {
        TypeReference::Builtin(builtin) => Ok(PropertyType::Builtin(*builtin)),
        TypeReference::Leafref(target) => data_property_type(arena, *target, visited),
        TypeReference::UnresolvedLeafref(_) => Ok(PropertyType::Opaque),
        TypeReference::IdentityRef(identities) => {
            let mut names = Vec::with_capacity(identities.len());
            for &identity in identities {
                let name = arena[identity].assigned_name.clone().ok_or_else(|| {
                    ReactorError::general(
                        ErrorKind::Invariant,
                        format!("identity {identity} has no assigned name"),
                    )
                })?;
                names.push(name);
            }
            Ok(PropertyType::IdentityRef(names))
        }
        TypeReference::Union(branches) => {
            let mut members = Vec::with_capacity(branches.len());
            for branch in branches {
                members.push(UnionMember {
                    name: branch.name.clone(),
                    ty: map_reference(arena, &branch.ty, visited)?,
                });
            }
            Ok(PropertyType::Union(members))
        }
        TypeReference::Typedef(_) => Err(ReactorError::general(
            ErrorKind::Invariant,
            "effective type chase left a typedef reference",
        )),
    }
}
