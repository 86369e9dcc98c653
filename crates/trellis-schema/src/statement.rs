//! The statement tree
//!
//! A [`Statement`] is one declarative node of the schema language: a tagged
//! kind with its argument payload, its substatements, and the copy-history
//! flags recorded when the surrounding tooling instantiated `uses` and
//! `augment` effects. The tree is effective, not declared: reused and
//! augmenting nodes appear at every site they are logically present, flagged
//! with the mechanism that introduced them, and their names are already
//! re-bound into the namespace of the site.

use serde::{Deserialize, Serialize};

use crate::qname::{ModuleId, QName, SchemaPath};
use crate::types::{LeafrefPath, TypeArgument};

/// How a statement came to exist at its position in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CopyHistory {
    /// Declared right here; the original definition.
    #[default]
    Original,
    /// Copied in by a `uses` statement.
    AddedByUses,
    /// Injected by an `augment` statement.
    Augmenting,
    /// Copied by `uses` and then also carried through an `augment`.
    AddedByUsesAugmenting,
}

impl CopyHistory {
    /// Whether a `uses` statement introduced this copy.
    pub fn is_added_by_uses(self) -> bool {
        matches!(self, CopyHistory::AddedByUses | CopyHistory::AddedByUsesAugmenting)
    }

    /// Whether an `augment` statement introduced this copy.
    pub fn is_augmenting(self) -> bool {
        matches!(self, CopyHistory::Augmenting | CopyHistory::AddedByUsesAugmenting)
    }

    /// Whether this statement is its own original definition.
    pub fn is_original(self) -> bool {
        matches!(self, CopyHistory::Original)
    }
}

/// Statement kind with its argument payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    Module { name: ModuleId },
    Container { name: QName },
    List { name: QName },
    /// `key` substatement of a list; names the key leaves in order.
    Key { leaves: Vec<String> },
    Leaf { name: QName },
    LeafList { name: QName },
    Choice { name: QName },
    Case { name: QName },
    AnyData { name: QName },
    AnyXml { name: QName },
    Grouping { name: QName },
    Uses { grouping: QName },
    Augment { target: SchemaPath },
    Typedef { name: QName },
    Type { argument: TypeArgument },
    /// `path` substatement of a leafref type.
    Path { path: LeafrefPath },
    Identity { name: QName },
    /// `base` substatement of an identity or identityref type.
    Base { identity: QName },
    Feature { name: QName },
    Rpc { name: QName },
    Action { name: QName },
    Input { name: QName },
    Output { name: QName },
    Notification { name: QName },
    Description { text: String },
}

impl StatementKind {
    /// The keyword of this statement kind.
    pub fn keyword(&self) -> &'static str {
        match self {
            StatementKind::Module { .. } => "module",
            StatementKind::Container { .. } => "container",
            StatementKind::List { .. } => "list",
            StatementKind::Key { .. } => "key",
            StatementKind::Leaf { .. } => "leaf",
            StatementKind::LeafList { .. } => "leaf-list",
            StatementKind::Choice { .. } => "choice",
            StatementKind::Case { .. } => "case",
            StatementKind::AnyData { .. } => "anydata",
            StatementKind::AnyXml { .. } => "anyxml",
            StatementKind::Grouping { .. } => "grouping",
            StatementKind::Uses { .. } => "uses",
            StatementKind::Augment { .. } => "augment",
            StatementKind::Typedef { .. } => "typedef",
            StatementKind::Type { .. } => "type",
            StatementKind::Path { .. } => "path",
            StatementKind::Identity { .. } => "identity",
            StatementKind::Base { .. } => "base",
            StatementKind::Feature { .. } => "feature",
            StatementKind::Rpc { .. } => "rpc",
            StatementKind::Action { .. } => "action",
            StatementKind::Input { .. } => "input",
            StatementKind::Output { .. } => "output",
            StatementKind::Notification { .. } => "notification",
            StatementKind::Description { .. } => "description",
        }
    }
}

/// One node of the statement tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// Kind and argument.
    pub kind: StatementKind,
    /// How this node came to exist at this position.
    pub copy: CopyHistory,
    /// Substatements in declaration order.
    pub substatements: Vec<Statement>,
}

impl Statement {
    /// Creates a statement with no substatements.
    pub fn new(kind: StatementKind) -> Self {
        Self {
            kind,
            copy: CopyHistory::Original,
            substatements: Vec::new(),
        }
    }

    /// Sets the copy history, builder style.
    pub fn with_copy(mut self, copy: CopyHistory) -> Self {
        self.copy = copy;
        self
    }

    /// Appends a substatement, builder style.
    pub fn with_child(mut self, child: Statement) -> Self {
        self.substatements.push(child);
        self
    }

    /// Appends substatements, builder style.
    pub fn with_children(mut self, children: impl IntoIterator<Item = Statement>) -> Self {
        self.substatements.extend(children);
        self
    }

    // Constructors for the common kinds, mirroring schema keywords.

    pub fn module(name: impl Into<ModuleId>) -> Self {
        Self::new(StatementKind::Module { name: name.into() })
    }

    pub fn container(name: QName) -> Self {
        Self::new(StatementKind::Container { name })
    }

    pub fn list(name: QName) -> Self {
        Self::new(StatementKind::List { name })
    }

    pub fn key(leaves: Vec<String>) -> Self {
        Self::new(StatementKind::Key { leaves })
    }

    pub fn leaf(name: QName) -> Self {
        Self::new(StatementKind::Leaf { name })
    }

    pub fn leaf_list(name: QName) -> Self {
        Self::new(StatementKind::LeafList { name })
    }

    pub fn choice(name: QName) -> Self {
        Self::new(StatementKind::Choice { name })
    }

    pub fn case(name: QName) -> Self {
        Self::new(StatementKind::Case { name })
    }

    pub fn anydata(name: QName) -> Self {
        Self::new(StatementKind::AnyData { name })
    }

    pub fn anyxml(name: QName) -> Self {
        Self::new(StatementKind::AnyXml { name })
    }

    pub fn grouping(name: QName) -> Self {
        Self::new(StatementKind::Grouping { name })
    }

    pub fn uses(grouping: QName) -> Self {
        Self::new(StatementKind::Uses { grouping })
    }

    pub fn augment(target: SchemaPath) -> Self {
        Self::new(StatementKind::Augment { target })
    }

    pub fn typedef(name: QName) -> Self {
        Self::new(StatementKind::Typedef { name })
    }

    pub fn type_stmt(argument: TypeArgument) -> Self {
        Self::new(StatementKind::Type { argument })
    }

    pub fn path_stmt(path: LeafrefPath) -> Self {
        Self::new(StatementKind::Path { path })
    }

    pub fn identity(name: QName) -> Self {
        Self::new(StatementKind::Identity { name })
    }

    pub fn base(identity: QName) -> Self {
        Self::new(StatementKind::Base { identity })
    }

    pub fn feature(name: QName) -> Self {
        Self::new(StatementKind::Feature { name })
    }

    pub fn rpc(name: QName) -> Self {
        Self::new(StatementKind::Rpc { name })
    }

    pub fn action(name: QName) -> Self {
        Self::new(StatementKind::Action { name })
    }

    pub fn input(name: QName) -> Self {
        Self::new(StatementKind::Input { name })
    }

    pub fn output(name: QName) -> Self {
        Self::new(StatementKind::Output { name })
    }

    pub fn notification(name: QName) -> Self {
        Self::new(StatementKind::Notification { name })
    }

    pub fn description(text: impl Into<String>) -> Self {
        Self::new(StatementKind::Description { text: text.into() })
    }

    /// The name under which this statement is addressable in the schema tree,
    /// if it is a schema-tree node.
    ///
    /// `grouping`, `typedef`, `identity` and similar definitions live in their
    /// own namespaces and return `None` here.
    pub fn schema_tree_name(&self) -> Option<&QName> {
        match &self.kind {
            StatementKind::Container { name }
            | StatementKind::List { name }
            | StatementKind::Leaf { name }
            | StatementKind::LeafList { name }
            | StatementKind::Choice { name }
            | StatementKind::Case { name }
            | StatementKind::AnyData { name }
            | StatementKind::AnyXml { name }
            | StatementKind::Rpc { name }
            | StatementKind::Action { name }
            | StatementKind::Input { name }
            | StatementKind::Output { name }
            | StatementKind::Notification { name } => Some(name),
            _ => None,
        }
    }

    /// The argument name of this statement regardless of namespace, when it
    /// has one.
    pub fn argument_name(&self) -> Option<&QName> {
        match &self.kind {
            StatementKind::Grouping { name }
            | StatementKind::Typedef { name }
            | StatementKind::Identity { name }
            | StatementKind::Feature { name } => Some(name),
            _ => self.schema_tree_name(),
        }
    }

    /// The first `type` substatement, if any.
    pub fn find_type(&self) -> Option<&Statement> {
        self.substatements
            .iter()
            .find(|s| matches!(s.kind, StatementKind::Type { .. }))
    }

    /// The first `key` substatement's leaf names, if any.
    pub fn find_key(&self) -> Option<&[String]> {
        self.substatements.iter().find_map(|s| match &s.kind {
            StatementKind::Key { leaves } => Some(leaves.as_slice()),
            _ => None,
        })
    }

    /// The first `path` substatement's leafref path, if any.
    pub fn find_path(&self) -> Option<&LeafrefPath> {
        self.substatements.iter().find_map(|s| match &s.kind {
            StatementKind::Path { path } => Some(path),
            _ => None,
        })
    }

    /// All `base` substatement arguments, in declaration order.
    pub fn base_identities(&self) -> impl Iterator<Item = &QName> {
        self.substatements.iter().filter_map(|s| match &s.kind {
            StatementKind::Base { identity } => Some(identity),
            _ => None,
        })
    }

    /// All `type` substatements, in declaration order. Union types carry
    /// their member types this way.
    pub fn member_types(&self) -> impl Iterator<Item = &Statement> {
        self.substatements
            .iter()
            .filter(|s| matches!(s.kind, StatementKind::Type { .. }))
    }
}
