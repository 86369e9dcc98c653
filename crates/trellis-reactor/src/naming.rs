//! Collision-domain naming
//!
//! Every generator that needs a name claims a [`Member`] in its parent's
//! collision domain. Members are either primary (a camel-cased rendering of
//! the statement's local name, with a fallback chain behind it) or secondary
//! (a primary member plus a fixed suffix, delegating conflict handling to its
//! primary).
//!
//! Solving a domain groups members by their current name: singleton groups
//! are conflict-free, every other group signals conflict to its members, and
//! each member advances to its next fallback (namespace-derived suffix, then
//! a module- or augment-path-derived name). A member with no fallback left is
//! a fatal collision. Because advancing one primary can perturb a domain that
//! was already solved, the reactor re-runs [`NamingTable::solve_all`] until a
//! full pass changes nothing.

use std::fmt;

use indexmap::IndexMap;
use tracing::{debug, trace};

use trellis_model::TypeName;

use crate::arena::{Arena, GeneratorId};
use crate::error::{ErrorKind, ReactorError};
use crate::generator::{GeneratorKind, Placement};
use crate::scope::ModuleMap;

/// Handle of one naming member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberId(u32);

impl MemberId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// The definition namespace a primary member's name comes from. The suffix
/// is the namespace-derived disambiguator applied on first conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NamingSpace {
    Module,
    SchemaTree,
    Grouping,
    Typedef,
    Identity,
    Feature,
    Augment,
}

impl NamingSpace {
    fn suffix(self) -> &'static str {
        match self {
            NamingSpace::Module => "Data",
            NamingSpace::SchemaTree => "",
            NamingSpace::Grouping => "Grouping",
            NamingSpace::Typedef => "Typedef",
            NamingSpace::Identity => "Identity",
            NamingSpace::Feature => "Feature",
            NamingSpace::Augment => "Augment",
        }
    }
}

#[derive(Debug)]
enum MemberKind {
    Primary {
        /// Camel-cased rendering of the local name.
        base: String,
        space: NamingSpace,
        /// Last-resort name; module-derived, or augment-path-derived for
        /// augment members.
        fallback: String,
        /// Fallback chain position: 0 = base, 1 = namespace suffix,
        /// 2 = fallback. Advancing past 2 is a fatal collision.
        stage: u8,
    },
    Secondary {
        primary: MemberId,
        suffix: &'static str,
    },
}

#[derive(Debug)]
struct Member {
    generator: GeneratorId,
    kind: MemberKind,
    cached: Option<String>,
}

#[derive(Debug)]
struct Domain {
    owner: GeneratorId,
    members: Vec<MemberId>,
    solved: bool,
}

/// All naming state of one reactor run.
#[derive(Debug, Default)]
pub(crate) struct NamingTable {
    members: Vec<Member>,
    domains: Vec<Domain>,
    domain_of: IndexMap<GeneratorId, usize>,
}

impl NamingTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn domain_index(&mut self, owner: GeneratorId) -> usize {
        if let Some(&index) = self.domain_of.get(&owner) {
            return index;
        }
        let index = self.domains.len();
        self.domains.push(Domain {
            owner,
            members: Vec::new(),
            solved: false,
        });
        self.domain_of.insert(owner, index);
        index
    }

    fn add_primary(
        &mut self,
        domain: GeneratorId,
        generator: GeneratorId,
        base: String,
        space: NamingSpace,
        fallback: String,
    ) -> MemberId {
        self.add_member(
            domain,
            Member {
                generator,
                kind: MemberKind::Primary {
                    base,
                    space,
                    fallback,
                    stage: 0,
                },
                cached: None,
            },
        )
    }

    fn add_secondary(
        &mut self,
        domain: GeneratorId,
        generator: GeneratorId,
        primary: MemberId,
        suffix: &'static str,
    ) -> MemberId {
        self.add_member(
            domain,
            Member {
                generator,
                kind: MemberKind::Secondary { primary, suffix },
                cached: None,
            },
        )
    }

    fn add_member(&mut self, domain: GeneratorId, member: Member) -> MemberId {
        let id = MemberId(self.members.len() as u32);
        self.members.push(member);
        let index = self.domain_index(domain);
        self.domains[index].members.push(id);
        id
    }

    /// The member's current class name, computed and cached.
    pub(crate) fn current_name(&mut self, id: MemberId) -> String {
        if let Some(cached) = &self.members[id.index()].cached {
            return cached.clone();
        }
        // Split the computation so the member borrow ends before the
        // recursive call for a secondary's primary.
        enum Computed {
            Direct(String),
            FromPrimary(MemberId, &'static str),
        }
        let computed = match &self.members[id.index()].kind {
            MemberKind::Primary {
                base,
                space,
                fallback,
                stage,
            } => Computed::Direct(match stage {
                0 => base.clone(),
                1 => format!("{base}{}", space.suffix()),
                _ => fallback.clone(),
            }),
            MemberKind::Secondary { primary, suffix } => Computed::FromPrimary(*primary, *suffix),
        };
        let name = match computed {
            Computed::Direct(name) => name,
            Computed::FromPrimary(primary, suffix) => {
                format!("{}{suffix}", self.current_name(primary))
            }
        };
        self.members[id.index()].cached = Some(name.clone());
        name
    }

    /// Signals a conflict to a member. Primaries advance their fallback
    /// chain; secondaries delegate to their primary. Returns `false` when no
    /// fallback remains.
    fn signal_conflict(&mut self, id: MemberId) -> bool {
        enum Signalled {
            NoFallback,
            Advanced,
            Delegate(MemberId),
        }
        let outcome = match &mut self.members[id.index()].kind {
            MemberKind::Primary { stage, .. } => {
                if *stage >= 2 {
                    Signalled::NoFallback
                } else {
                    *stage += 1;
                    Signalled::Advanced
                }
            }
            MemberKind::Secondary { primary, .. } => Signalled::Delegate(*primary),
        };
        match outcome {
            Signalled::NoFallback => false,
            Signalled::Advanced => {
                self.invalidate(id);
                true
            }
            Signalled::Delegate(primary) => self.signal_conflict(primary),
        }
    }

    /// Drops the cached name of a member and of every secondary derived from
    /// it.
    fn invalidate(&mut self, id: MemberId) {
        self.members[id.index()].cached = None;
        for index in 0..self.members.len() {
            if let MemberKind::Secondary { primary, .. } = self.members[index].kind {
                if primary == id {
                    self.members[index].cached = None;
                }
            }
        }
    }

    /// Attempts to solve one domain. Returns whether anything changed.
    fn find_solution(&mut self, index: usize, arena: &Arena<'_>) -> Result<bool, ReactorError> {
        let member_ids = self.domains[index].members.clone();
        let mut groups: IndexMap<String, Vec<MemberId>> = IndexMap::new();
        for id in &member_ids {
            let name = self.current_name(*id);
            groups.entry(name).or_default().push(*id);
        }

        let conflicts: Vec<(String, Vec<MemberId>)> = groups
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .collect();
        if conflicts.is_empty() {
            self.domains[index].solved = true;
            return Ok(false);
        }

        self.domains[index].solved = false;
        let mut changed = false;
        for (name, members) in conflicts {
            let mut group_changed = false;
            for member in &members {
                if self.signal_conflict(*member) {
                    group_changed = true;
                }
            }
            if !group_changed {
                let owner = self.domains[index].owner;
                let mut err = ReactorError::new(
                    ErrorKind::NamingCollision,
                    describe(arena, owner),
                    format!("no naming fallback left for '{name}'"),
                );
                for member in &members {
                    let gen = self.members[member.index()].generator;
                    err = err.with_chain(describe(arena, gen));
                }
                return Err(err);
            }
            trace!(name = %name, members = members.len(), "naming conflict signalled");
            changed = true;
        }
        Ok(changed)
    }

    /// Runs [`Self::find_solution`] over all domains until a full pass makes
    /// no change. Solving one domain can perturb another through shared
    /// primaries, so previously-solved domains are re-validated each pass.
    pub(crate) fn solve_all(&mut self, arena: &Arena<'_>) -> Result<(), ReactorError> {
        loop {
            let mut changed = false;
            for index in 0..self.domains.len() {
                if self.find_solution(index, arena)? {
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        debug!(
            domains = self.domains.iter().filter(|d| d.solved).count(),
            members = self.members.len(),
            "naming solved"
        );
        Ok(())
    }
}

/// Creates naming members for every generator that participates in naming,
/// in tree order, and records them on the generators.
pub(crate) fn ensure_members(
    arena: &mut Arena<'_>,
    modules: &ModuleMap,
    table: &mut NamingTable,
) -> Result<(), ReactorError> {
    let roots: Vec<GeneratorId> = modules.values().copied().collect();
    for root in roots {
        ensure_member_recursive(arena, table, root)?;
    }
    Ok(())
}

fn ensure_member_recursive(
    arena: &mut Arena<'_>,
    table: &mut NamingTable,
    id: GeneratorId,
) -> Result<(), ReactorError> {
    if arena[id].member.is_none() && arena[id].placement != Placement::None {
        let member = create_member(arena, table, id)?;
        arena[id].member = Some(member);
    }
    let children = arena[id].children.clone();
    for child in children {
        ensure_member_recursive(arena, table, child)?;
    }
    Ok(())
}

fn create_member(
    arena: &Arena<'_>,
    table: &mut NamingTable,
    id: GeneratorId,
) -> Result<MemberId, ReactorError> {
    let parent = arena[id].parent;
    let parent_domain = || {
        parent.ok_or_else(|| {
            ReactorError::general(
                ErrorKind::Invariant,
                format!("generator {id} needs a parent domain but has no parent"),
            )
        })
    };
    let primary_of = |target: GeneratorId| {
        arena[target].member.ok_or_else(|| {
            ReactorError::general(
                ErrorKind::Invariant,
                format!("secondary member of {id} created before its primary on {target}"),
            )
        })
    };

    match &arena[id].kind {
        GeneratorKind::Module { module } => {
            let base = camel_case(module.name());
            Ok(table.add_primary(id, id, base.clone(), NamingSpace::Module, base))
        }
        GeneratorKind::ListKey { list } => {
            Ok(table.add_secondary(parent_domain()?, id, primary_of(*list)?, "Key"))
        }
        GeneratorKind::Input => {
            let rpc = parent_domain()?;
            Ok(table.add_secondary(rpc, id, primary_of(rpc)?, "Input"))
        }
        GeneratorKind::Output => {
            let rpc = parent_domain()?;
            Ok(table.add_secondary(rpc, id, primary_of(rpc)?, "Output"))
        }
        GeneratorKind::NotificationAggregate { .. } => {
            let module = parent_domain()?;
            Ok(table.add_secondary(module, id, primary_of(module)?, "Listener"))
        }
        GeneratorKind::RpcAggregate { .. } => {
            let module = parent_domain()?;
            Ok(table.add_secondary(module, id, primary_of(module)?, "Service"))
        }
        GeneratorKind::ModuleAugment => {
            let parent = parent_domain()?;
            let segments = match arena[id].stmt.map(|s| &s.kind) {
                Some(trellis_schema::StatementKind::Augment { target }) => target.segments(),
                _ => {
                    return Err(ReactorError::general(
                        ErrorKind::Invariant,
                        format!("augment generator {id} has no augment statement"),
                    ))
                }
            };
            let base = camel_case(&segments[segments.len() - 1].local);
            // Last resort: the full path plus this augment's position among
            // its siblings, which is unique by construction.
            let ordinal = arena[parent]
                .children
                .iter()
                .filter(|&&c| arena[c].is_augment())
                .position(|&c| c == id)
                .map(|p| p + 1)
                .unwrap_or(0);
            let path_name: String = segments
                .iter()
                .map(|q| camel_case(&q.local))
                .collect::<Vec<_>>()
                .join("");
            let fallback = format!("{path_name}Augment{ordinal}");
            Ok(table.add_primary(parent, id, base, NamingSpace::Augment, fallback))
        }
        kind => {
            let parent = parent_domain()?;
            let Some(qname) = arena[id].qname() else {
                return Err(ReactorError::general(
                    ErrorKind::Invariant,
                    format!("generator {id} participates in naming but has no name"),
                ));
            };
            let base = camel_case(&qname.local);
            let fallback = format!("{base}{}", camel_case(qname.module.name()));
            let space = match kind {
                GeneratorKind::Grouping => NamingSpace::Grouping,
                GeneratorKind::Typedef => NamingSpace::Typedef,
                GeneratorKind::Identity => NamingSpace::Identity,
                GeneratorKind::Feature => NamingSpace::Feature,
                _ => NamingSpace::SchemaTree,
            };
            Ok(table.add_primary(parent, id, base, space, fallback))
        }
    }
}

/// Assigns the final (package, name) pair to every named generator and the
/// child package to every generator. Must run after [`NamingTable::solve_all`]
/// converges.
pub(crate) fn finalize_names(
    arena: &mut Arena<'_>,
    modules: &ModuleMap,
    table: &mut NamingTable,
) {
    let roots: Vec<(GeneratorId, String)> = modules
        .iter()
        .map(|(module, &root)| (root, root_package(module.name())))
        .collect();
    for (root, package) in roots {
        assign(arena, table, root, &package, true);
    }
}

fn assign(
    arena: &mut Arena<'_>,
    table: &mut NamingTable,
    id: GeneratorId,
    parent_package: &str,
    is_module: bool,
) {
    if let Some(member) = arena[id].member {
        let name = table.current_name(member);
        arena[id].assigned_name = Some(TypeName::new(parent_package, name.clone()));
        // Module children stay in the module's root package; everything
        // else nests under a segment derived from its class name.
        arena[id].package = Some(if is_module {
            parent_package.to_string()
        } else {
            format!("{parent_package}.{}", package_segment(&name))
        });
    } else {
        arena[id].package = Some(parent_package.to_string());
    }

    let own_package = arena[id].package.clone().unwrap_or_default();
    let children = arena[id].children.clone();
    for child in children {
        assign(arena, table, child, &own_package, false);
    }
}

fn describe(arena: &Arena<'_>, id: GeneratorId) -> String {
    arena[id]
        .qname()
        .map(|q| q.to_string())
        .unwrap_or_else(|| id.to_string())
}

/// Camel-cases an identifier: `foo-bar_baz` becomes `FooBarBaz`.
pub(crate) fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.' | ' ') {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Lower-camel-cases an identifier: `foo-bar` becomes `fooBar`.
pub(crate) fn lower_camel_case(name: &str) -> String {
    let camel = camel_case(name);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => camel,
    }
}

/// Package segment derived from a class name.
pub(crate) fn package_segment(class_name: &str) -> String {
    class_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// Root package of a module.
pub(crate) fn root_package(module_name: &str) -> String {
    module_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
