//! End-to-end reactor scenarios.
//!
//! These tests drive the full pipeline — tree building, uses/augment/origin
//! linkage, type binding, naming, materialization — over hand-built
//! effective statement forests, the way the surrounding tooling would supply
//! them: copies present at every logical site, flagged with their
//! copy-history, names bound to the namespace of the site.

use trellis_model::{PropertyType, TypeKind};
use trellis_reactor::{ErrorKind, GeneratorKind};
use trellis_schema::{
    BuiltinType, CopyHistory, LeafrefPath, LeafrefStep, QName, SchemaPath, Statement, TypeArgument,
};
use trellis_tests::TestHarness;

fn qn(local: &str) -> QName {
    QName::new("m", local)
}

fn string_type() -> Statement {
    Statement::type_stmt(TypeArgument::Builtin(BuiltinType::String))
}

fn int32_type() -> Statement {
    Statement::type_stmt(TypeArgument::Builtin(BuiltinType::Int32))
}

/// grouping grp { leaf x; }  container site { uses grp; }  augment /site/x
///
/// The augment must attach to the copy of `x` inside `site`, not to the
/// definition inside the grouping.
#[test]
fn augment_attaches_to_instantiation_not_grouping() {
    let module = Statement::module("m")
        .with_child(
            Statement::grouping(qn("grp"))
                .with_child(Statement::leaf(qn("x")).with_child(string_type())),
        )
        .with_child(Statement::container(qn("site")).with_children([
            Statement::uses(qn("grp")),
            Statement::leaf(qn("x"))
                .with_copy(CopyHistory::AddedByUses)
                .with_child(string_type()),
        ]))
        .with_child(
            Statement::augment(SchemaPath::absolute(vec![qn("site"), qn("x")]))
                .with_child(Statement::description("augmented")),
        );

    let harness = TestHarness::from_modules(vec![module]);
    let copy_in_site = harness.find("m", &["site", "x"]);
    let original_in_grp = harness.find("m", &["grp", "x"]);

    let augments = harness.reactor().generator(copy_in_site).augments.clone();
    assert_eq!(augments.len(), 1, "augment must attach to the copy in site");
    assert_eq!(
        harness.reactor().augment_target(augments[0]),
        Some(copy_in_site)
    );
    assert!(harness
        .reactor()
        .generator(original_in_grp)
        .augments
        .is_empty());

    // The copy still traces back to the grouping's definition.
    assert_eq!(
        harness.reactor().original(copy_in_site),
        Some(original_in_grp)
    );
}

/// container site { uses grp { augment x { container y; } } } plus a
/// module-level augment /site/x/y.
///
/// Resolving the deep augment has to traverse the grouping (namespace
/// squash) and then the children injected by the uses-scoped augment, ending
/// at the single canonical `y` generator.
#[test]
fn layered_augments_resolve_through_each_other() {
    let module = Statement::module("m")
        .with_child(
            Statement::grouping(qn("grp")).with_child(Statement::container(qn("x"))),
        )
        .with_child(
            Statement::container(qn("site")).with_child(
                Statement::uses(qn("grp")).with_child(
                    Statement::augment(SchemaPath::descendant(vec![qn("x")]))
                        .with_child(Statement::container(qn("y"))),
                ),
            ),
        )
        .with_child(
            Statement::augment(SchemaPath::absolute(vec![qn("site"), qn("x"), qn("y")]))
                .with_child(Statement::leaf(qn("z")).with_child(string_type())),
        );

    let harness = TestHarness::from_modules(vec![module]);
    let x_in_grp = harness.find("m", &["grp", "x"]);

    // The uses-scoped augment attached to the canonical definition of x.
    let uses_augments = harness.reactor().generator(x_in_grp).augments.clone();
    assert_eq!(uses_augments.len(), 1);
    let y = harness.reactor().generator(uses_augments[0]).children[0];
    assert!(matches!(
        harness.reactor().generator(y).kind,
        GeneratorKind::Container
    ));
    assert_eq!(
        harness.reactor().generator(y).qname().map(|q| q.local.as_str()),
        Some("y")
    );

    // The module-level augment attached to y, passing through both layers.
    let y_augments = harness.reactor().generator(y).augments.clone();
    assert_eq!(y_augments.len(), 1);
    assert_eq!(harness.reactor().augment_target(y_augments[0]), Some(y));

    // z lives under the module-level augment and is its own original.
    let z = harness.reactor().generator(y_augments[0]).children[0];
    assert_eq!(
        harness.reactor().generator(z).qname().map(|q| q.local.as_str()),
        Some("z")
    );
    assert_eq!(harness.reactor().original(z), Some(z));
}

/// Stacked augments: one augment creates /site/x, a second one targets the
/// node the first injected. The shorter path must resolve no later than the
/// longer one regardless of declaration order.
#[test]
fn stacked_augments_resolve_in_path_order() {
    let module = Statement::module("m")
        .with_child(Statement::container(qn("site")))
        // Deliberately declared deep-first.
        .with_child(
            Statement::augment(SchemaPath::absolute(vec![qn("site"), qn("x")]))
                .with_child(Statement::leaf(qn("deep")).with_child(string_type())),
        )
        .with_child(
            Statement::augment(SchemaPath::absolute(vec![qn("site")]))
                .with_child(Statement::container(qn("x"))),
        );

    let harness = TestHarness::from_modules(vec![module]);
    let site = harness.find("m", &["site"]);

    let site_augments = harness.reactor().generator(site).augments.clone();
    assert_eq!(site_augments.len(), 1);
    let x = harness.reactor().generator(site_augments[0]).children[0];
    assert_eq!(
        harness.reactor().generator(x).qname().map(|q| q.local.as_str()),
        Some("x")
    );

    let x_augments = harness.reactor().generator(x).augments.clone();
    assert_eq!(x_augments.len(), 1);
    assert_eq!(harness.reactor().augment_target(x_augments[0]), Some(x));
}

/// Cross-module augment: module `app` injects a leaf into a container of
/// module `lib`. The copy in lib's effective tree must trace to the
/// declaration under app's augment.
#[test]
fn cross_module_augment_and_origin() {
    let lib = Statement::module("lib").with_child(
        Statement::container(QName::new("lib", "box")).with_child(
            Statement::leaf(QName::new("app", "extra"))
                .with_copy(CopyHistory::Augmenting)
                .with_child(string_type()),
        ),
    );
    let app = Statement::module("app").with_child(
        Statement::augment(SchemaPath::absolute(vec![
            QName::new("lib", "box"),
            // Path addresses the augmented node in app's namespace.
        ]))
        .with_child(Statement::leaf(QName::new("app", "extra")).with_child(string_type())),
    );

    let harness = TestHarness::from_modules(vec![lib, app]);
    let boxed = harness.find("lib", &["box"]);
    let copy = harness.find("lib", &["box", "extra"]);

    let augments = harness.reactor().generator(boxed).augments.clone();
    assert_eq!(augments.len(), 1);
    let declared = harness.reactor().generator(augments[0]).children[0];
    assert_eq!(harness.reactor().original(copy), Some(declared));
}

/// An augment whose target path never resolves must fail the whole
/// compilation once the fixed point stabilizes.
#[test]
fn unresolvable_augment_is_fatal() {
    let module = Statement::module("m")
        .with_child(Statement::container(qn("site")))
        .with_child(
            Statement::augment(SchemaPath::absolute(vec![qn("site"), qn("missing")]))
                .with_child(Statement::leaf(qn("z")).with_child(string_type())),
        );

    let err = TestHarness::try_from_modules(vec![module]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnresolvedAugment);
    assert!(!err.chain.is_empty(), "diagnostic should carry the pending requirement");
}

/// Layered copies: grouping-in-grouping-in-container. Following previous()
/// terminates within the copy-nesting depth.
#[test]
fn original_links_are_acyclic_and_bounded() {
    let module = Statement::module("m")
        .with_child(
            Statement::grouping(qn("inner"))
                .with_child(Statement::leaf(qn("x")).with_child(string_type())),
        )
        .with_child(Statement::grouping(qn("outer")).with_children([
            Statement::uses(qn("inner")),
            Statement::leaf(qn("x"))
                .with_copy(CopyHistory::AddedByUses)
                .with_child(string_type()),
        ]))
        .with_child(Statement::container(qn("site")).with_children([
            Statement::uses(qn("outer")),
            Statement::leaf(qn("x"))
                .with_copy(CopyHistory::AddedByUses)
                .with_child(string_type()),
        ]));

    let harness = TestHarness::from_modules(vec![module]);
    let site_copy = harness.find("m", &["site", "x"]);
    let canonical = harness.find("m", &["inner", "x"]);

    let mut steps = 0;
    let mut cursor = site_copy;
    while let Some(prev) = harness.reactor().previous(cursor) {
        cursor = prev;
        steps += 1;
        assert!(steps <= 2, "previous() chain exceeds copy-nesting depth");
    }
    assert_eq!(cursor, canonical);
    assert_eq!(harness.reactor().original(site_copy), Some(canonical));
}

/// Two siblings from different namespaces normalizing to the same class
/// name: one keeps the plain name, the other gets the namespace-derived
/// suffix. Nothing is dropped and nothing collides.
#[test]
fn naming_fallback_disambiguates_namespaces() {
    let module = Statement::module("m")
        .with_child(Statement::container(qn("foo")))
        .with_child(Statement::grouping(qn("foo")));

    let harness = TestHarness::from_modules(vec![module]);
    let names = harness.name_assignments();
    let rendered: Vec<&str> = names.iter().map(|(_, n)| n.name.as_str()).collect();

    assert!(rendered.contains(&"Foo"));
    assert!(rendered.contains(&"FooGrouping"));

    // Uniqueness of (package, name) across the module's domain.
    let mut pairs: Vec<_> = names.iter().map(|(_, n)| n.clone()).collect();
    pairs.sort();
    pairs.dedup();
    assert_eq!(pairs.len(), names.len());
}

/// typedef-in-grouping with a lenient leafref, used by two containers whose
/// `sibling` leaves have different types: each instantiation resolves to its
/// own concrete sibling type, while the grouping's own copy stays opaque.
#[test]
fn lenient_leafref_resolves_per_instantiation() {
    let ref_typedef = Statement::typedef(qn("ref")).with_child(
        Statement::type_stmt(TypeArgument::Builtin(BuiltinType::Leafref)).with_child(
            Statement::path_stmt(LeafrefPath::relative(vec![
                LeafrefStep::Parent,
                LeafrefStep::Child(qn("sibling")),
            ])),
        ),
    );
    let grouping = Statement::grouping(qn("grp"))
        .with_child(ref_typedef)
        .with_child(Statement::leaf(qn("foo")).with_child(Statement::type_stmt(
            TypeArgument::Derived(qn("ref")),
        )));

    let site = |name: &str, sibling_type: Statement| {
        Statement::container(qn(name)).with_children([
            Statement::uses(qn("grp")),
            Statement::leaf(qn("foo"))
                .with_copy(CopyHistory::AddedByUses)
                .with_child(Statement::type_stmt(TypeArgument::Derived(qn("ref")))),
            Statement::leaf(qn("sibling")).with_child(sibling_type),
        ])
    };

    let module = Statement::module("m")
        .with_child(grouping)
        .with_child(site("bar", string_type()))
        .with_child(site("baz", int32_type()));

    let harness = TestHarness::from_modules(vec![module]);

    let bar = harness.spec("m", &["bar"]);
    assert_eq!(
        bar.property("foo").map(|p| &p.ty),
        Some(&PropertyType::Builtin(BuiltinType::String)),
        "bar's instantiation must see its own string sibling"
    );

    let baz = harness.spec("m", &["baz"]);
    assert_eq!(
        baz.property("foo").map(|p| &p.ty),
        Some(&PropertyType::Builtin(BuiltinType::Int32)),
        "baz's instantiation must see its own int32 sibling"
    );

    let grp = harness.spec("m", &["grp"]);
    assert_eq!(
        grp.property("foo").map(|p| &p.ty),
        Some(&PropertyType::Opaque),
        "the definition site cannot know the concrete type"
    );
}

/// Re-running the reactor over the same model with shuffled sibling
/// declaration order yields identical (package, name) assignments.
#[test]
fn name_assignment_is_deterministic_under_reordering() {
    let pieces = || {
        (
            Statement::grouping(qn("foo"))
                .with_child(Statement::leaf(qn("a")).with_child(string_type())),
            Statement::container(qn("foo")),
            Statement::container(qn("site")).with_children([
                Statement::uses(qn("foo")),
                Statement::leaf(qn("a"))
                    .with_copy(CopyHistory::AddedByUses)
                    .with_child(string_type()),
            ]),
            Statement::typedef(qn("foo")).with_child(string_type()),
        )
    };

    let (g1, c1, s1, t1) = pieces();
    let first = TestHarness::from_modules(vec![Statement::module("m")
        .with_child(g1)
        .with_child(c1)
        .with_child(s1)
        .with_child(t1)]);

    let (g2, c2, s2, t2) = pieces();
    let second = TestHarness::from_modules(vec![Statement::module("m")
        .with_child(t2)
        .with_child(s2)
        .with_child(c2)
        .with_child(g2)]);

    assert_eq!(first.name_assignments(), second.name_assignments());
}

/// Choice/case trees materialize as interfaces, and the parent exposes the
/// choice as a property.
#[test]
fn choice_and_cases_materialize() {
    let module = Statement::module("m").with_child(
        Statement::container(qn("site")).with_child(
            Statement::choice(qn("transport")).with_children([
                Statement::case(qn("tcp"))
                    .with_child(Statement::leaf(qn("port")).with_child(int32_type())),
                Statement::case(qn("tls"))
                    .with_child(Statement::leaf(qn("cert")).with_child(string_type())),
            ]),
        ),
    );

    let harness = TestHarness::from_modules(vec![module]);
    let site = harness.spec("m", &["site"]);
    let choice_name = harness.type_name("m", &["site", "transport"]);
    assert_eq!(
        site.property("transport").map(|p| &p.ty),
        Some(&PropertyType::Named(choice_name))
    );

    let tcp = harness.spec("m", &["site", "transport", "tcp"]);
    assert_eq!(tcp.kind, TypeKind::Interface);
    assert!(tcp.property("port").is_some());
}

/// Modules with notifications and rpcs gain the legacy aggregate surface.
#[test]
fn module_aggregates_cover_notifications_and_rpcs() {
    let module = Statement::module("sys")
        .with_child(
            Statement::notification(QName::new("sys", "alarm")).with_child(
                Statement::leaf(QName::new("sys", "severity")).with_child(string_type()),
            ),
        )
        .with_child(Statement::rpc(QName::new("sys", "reset")).with_children([
            Statement::input(QName::new("sys", "input")),
            Statement::output(QName::new("sys", "output")),
        ]));

    let harness = TestHarness::from_modules(vec![module]);
    let root = harness.find("sys", &[]);
    let children = harness.reactor().generator(root).children.clone();

    let listener = children
        .iter()
        .copied()
        .find(|&c| {
            matches!(
                harness.reactor().generator(c).kind,
                GeneratorKind::NotificationAggregate { .. }
            )
        })
        .expect("listener aggregate");
    let spec = harness.reactor().emitted(listener).unwrap().spec();
    assert_eq!(spec.kind, TypeKind::Aggregate);
    assert!(spec.property("alarm").is_some());

    let service = children
        .iter()
        .copied()
        .find(|&c| {
            matches!(
                harness.reactor().generator(c).kind,
                GeneratorKind::RpcAggregate { .. }
            )
        })
        .expect("service aggregate");
    let service_spec = harness.reactor().emitted(service).unwrap().spec();
    assert!(service_spec.property("reset").is_some());
}

/// Identity hierarchies link across modules and identityref leaves surface
/// the base identities' emitted names.
#[test]
fn identity_hierarchy_and_identityref() {
    let base = Statement::module("base")
        .with_child(Statement::identity(QName::new("base", "kind")));
    let derived = Statement::module("derived")
        .with_child(
            Statement::identity(QName::new("derived", "special"))
                .with_child(Statement::base(QName::new("base", "kind"))),
        )
        .with_child(Statement::leaf(QName::new("derived", "what")).with_child(
            Statement::type_stmt(TypeArgument::Builtin(BuiltinType::Identityref))
                .with_child(Statement::base(QName::new("base", "kind"))),
        ));

    let harness = TestHarness::from_modules(vec![base, derived]);

    let special = harness.spec("derived", &["special"]);
    assert_eq!(special.kind, TypeKind::Identity);
    let base_name = harness.type_name("base", &["kind"]);
    assert_eq!(special.implements, vec![base_name.clone()]);

    let root = harness.spec("derived", &[]);
    assert_eq!(
        root.property("what").map(|p| &p.ty),
        Some(&PropertyType::IdentityRef(vec![base_name]))
    );
}
