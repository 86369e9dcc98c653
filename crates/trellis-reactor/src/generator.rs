//! Generator tree nodes
//!
//! A [`Generator`] is one node of the output tree and will eventually emit at
//! most one target-language type. Kinds are a tagged union matched
//! exhaustively; the shared linkage state (copy origin, resolved groupings,
//! attached augments, type reference, naming member) lives directly on the
//! node and is mutated by the pass that owns it.

use trellis_model::{EmittedType, TypeName};
use trellis_schema::{BuiltinType, CopyHistory, LeafrefPath, ModuleId, QName, Statement};

use crate::arena::{Arena, GeneratorId};
use crate::naming::MemberId;

/// What kind of statement a generator stands for.
///
/// `ListKey`, `NotificationAggregate` and `RpcAggregate` are implicit: they
/// have no statement of their own and exist to emit companion artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorKind {
    Module { module: ModuleId },
    Container,
    List,
    ListKey { list: GeneratorId },
    Leaf,
    LeafList,
    Choice,
    Case,
    AnyData,
    AnyXml,
    Grouping,
    Typedef,
    Identity,
    Feature,
    Rpc,
    Action,
    Input,
    Output,
    Notification,
    ModuleAugment,
    UsesAugment,
    NotificationAggregate { notifications: Vec<GeneratorId> },
    RpcAggregate { rpcs: Vec<GeneratorId> },
}

/// Where a generator's emitted artifact lives, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// No type and no naming claim. Copy-introduced nodes and plain data
    /// leaves land here.
    None,
    /// Emits a type enclosed in the parent's type.
    Member,
    /// Claims a naming slot but emits no type of its own; its children emit.
    Phantom,
    /// Emits a top-level type.
    TopLevel,
}

/// Link from a copy-introduced generator back toward its original definition.
///
/// Following `prev` handles from any generator terminates: copy relationships
/// in the source language are acyclic by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OriginalLink {
    /// Linkage not yet attempted.
    #[default]
    Unlinked,
    /// This generator is the original definition.
    Original,
    /// One step toward the original is known; the terminal is not yet.
    Partial(GeneratorId),
    /// Fully resolved.
    Complete {
        prev: GeneratorId,
        original: GeneratorId,
    },
}

impl OriginalLink {
    /// Whether the terminal original is known.
    pub fn is_linked(self) -> bool {
        matches!(self, OriginalLink::Original | OriginalLink::Complete { .. })
    }
}

/// Explicit state of a lazily-computed field.
///
/// Observing `InProgress` during computation means re-entrant
/// initialization, which is a detectable bug rather than a silent re-run.
#[derive(Debug, Clone, Default)]
pub enum Lazy<T> {
    #[default]
    NotStarted,
    InProgress,
    Done(T),
}

impl<T> Lazy<T> {
    pub fn done(&self) -> Option<&T> {
        match self {
            Lazy::Done(value) => Some(value),
            _ => None,
        }
    }
}

/// Resolved type indirection of a type-bearing generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeReference<'s> {
    /// Terminal builtin primitive.
    Builtin(BuiltinType),
    /// Reference to a `typedef` generator; chased when the effective type is
    /// needed.
    Typedef(GeneratorId),
    /// Leafref resolved to its target type-bearing generator.
    Leafref(GeneratorId),
    /// Leafref whose path only resolves at a concrete instantiation site.
    /// Carries the path so instantiations can re-attempt resolution.
    UnresolvedLeafref(&'s LeafrefPath),
    /// Identityref resolved to its base identity generators.
    IdentityRef(Vec<GeneratorId>),
    /// Union with branches resolved recursively, structural duplicates
    /// removed, and member names fixed.
    Union(Vec<UnionBranch<'s>>),
}

/// One alternative of a resolved union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionBranch<'s> {
    /// Deterministic member name derived from the branch type and position.
    pub name: String,
    pub ty: TypeReference<'s>,
}

/// Type resolution state of a generator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TypeState<'s> {
    /// This generator kind does not carry a type.
    #[default]
    NotApplicable,
    /// Declared but not yet resolved.
    Unresolved,
    Resolved(TypeReference<'s>),
}

impl<'s> TypeState<'s> {
    pub fn resolved(&self) -> Option<&TypeReference<'s>> {
        match self {
            TypeState::Resolved(r) => Some(r),
            _ => None,
        }
    }
}

/// One node of the generator tree.
#[derive(Debug)]
pub struct Generator<'s> {
    pub kind: GeneratorKind,
    /// Source statement; absent for implicit generators.
    pub stmt: Option<&'s Statement>,
    /// Module whose tree this generator was built from.
    pub module: ModuleId,
    /// Back-reference; `None` only for module roots.
    pub parent: Option<GeneratorId>,
    /// Owned children in evaluation order: ordinary children first, then
    /// augments in deterministic order, then implicit aggregates.
    pub children: Vec<GeneratorId>,
    pub placement: Placement,

    /// Groupings referenced by this composite's `uses` statements, in
    /// declaration order.
    pub groupings: Vec<GeneratorId>,
    /// Augment generators attached to this generator as their target.
    pub augments: Vec<GeneratorId>,

    /// Linkage back to the original definition.
    pub original: OriginalLink,

    /// For augment generators: the resolved target.
    pub augment_target: Option<GeneratorId>,
    /// For uses-scoped augments: the enclosing `uses` statement.
    pub uses_stmt: Option<&'s Statement>,
    /// For uses-scoped augments: the grouping the enclosing `uses` resolved
    /// to. Set during uses linkage.
    pub uses_grouping: Option<GeneratorId>,

    pub type_state: TypeState<'s>,
    /// Whether an instantiation-site leafref re-resolution replaced the
    /// inherited type.
    pub type_overridden: bool,
    /// For identities: resolved `base` identity generators.
    pub base_identities: Vec<GeneratorId>,

    /// Naming claim in the parent's collision domain.
    pub member: Option<MemberId>,
    /// Package this generator's children are placed under. Assigned after
    /// naming settles.
    pub package: Option<String>,
    /// Final (package, name) pair. Assigned after naming settles, for
    /// generators that claim a name.
    pub assigned_name: Option<TypeName>,

    /// Materialized type, if this generator emits one.
    pub emitted: Lazy<Option<EmittedType>>,

    // Original-definition linkage work queues, see link::origin.
    pub(crate) origin_children: Option<Vec<GeneratorId>>,
    pub(crate) origin_composites: Vec<GeneratorId>,
    pub(crate) origin_done: bool,
}

impl<'s> Generator<'s> {
    /// Creates a generator bound to a statement.
    pub fn explicit(
        kind: GeneratorKind,
        stmt: &'s Statement,
        module: ModuleId,
        parent: Option<GeneratorId>,
        placement: Placement,
    ) -> Self {
        Self::build(kind, Some(stmt), module, parent, placement)
    }

    /// Creates a synthetic generator with no statement.
    pub fn implicit(
        kind: GeneratorKind,
        module: ModuleId,
        parent: Option<GeneratorId>,
        placement: Placement,
    ) -> Self {
        Self::build(kind, None, module, parent, placement)
    }

    fn build(
        kind: GeneratorKind,
        stmt: Option<&'s Statement>,
        module: ModuleId,
        parent: Option<GeneratorId>,
        placement: Placement,
    ) -> Self {
        Self {
            kind,
            stmt,
            module,
            parent,
            children: Vec::new(),
            placement,
            groupings: Vec::new(),
            augments: Vec::new(),
            original: OriginalLink::Unlinked,
            augment_target: None,
            uses_stmt: None,
            uses_grouping: None,
            type_state: TypeState::NotApplicable,
            type_overridden: false,
            base_identities: Vec::new(),
            member: None,
            package: None,
            assigned_name: None,
            emitted: Lazy::NotStarted,
            origin_children: None,
            origin_composites: Vec::new(),
            origin_done: false,
        }
    }

    /// The qualified name of the underlying statement, when it has one.
    pub fn qname(&self) -> Option<&QName> {
        self.stmt.and_then(Statement::argument_name)
    }

    /// Copy history of the underlying statement; implicit generators are
    /// always original.
    pub fn copy_history(&self) -> CopyHistory {
        self.stmt.map(|s| s.copy).unwrap_or_default()
    }

    /// Whether this generator stands for a copy-introduced statement.
    pub fn is_copy(&self) -> bool {
        let copy = self.copy_history();
        copy.is_added_by_uses() || copy.is_augmenting()
    }

    /// Whether this generator may own children.
    pub fn is_composite(&self) -> bool {
        matches!(
            self.kind,
            GeneratorKind::Module { .. }
                | GeneratorKind::Container
                | GeneratorKind::List
                | GeneratorKind::Choice
                | GeneratorKind::Case
                | GeneratorKind::Grouping
                | GeneratorKind::Rpc
                | GeneratorKind::Action
                | GeneratorKind::Input
                | GeneratorKind::Output
                | GeneratorKind::Notification
                | GeneratorKind::ModuleAugment
                | GeneratorKind::UsesAugment
        )
    }

    /// Whether this generator is an augment of either flavor.
    pub fn is_augment(&self) -> bool {
        matches!(
            self.kind,
            GeneratorKind::ModuleAugment | GeneratorKind::UsesAugment
        )
    }

    /// Whether this generator carries a `type` statement to resolve.
    pub fn is_type_bearing(&self) -> bool {
        matches!(
            self.kind,
            GeneratorKind::Leaf | GeneratorKind::LeafList | GeneratorKind::Typedef
        )
    }
}

/// The namespace a generator's name lives in, seen from its defining
/// statement. Groupings keep their defining module's namespace even when
/// reached from a use site.
pub(crate) fn namespace_of<'s>(arena: &Arena<'s>, id: GeneratorId) -> ModuleId {
    match arena[id].qname() {
        Some(q) => q.module.clone(),
        None => arena[id].module.clone(),
    }
}
