//! Test harness for end-to-end reactor runs.
//!
//! Builds a statement forest, runs the full reactor pipeline, and exposes
//! query helpers over the resolved generator forest.

use trellis_model::{DefaultTypeBuilderFactory, TypeName, TypeSpec};
use trellis_reactor::{GeneratorId, Reactor, ReactorError};
use trellis_schema::{ModuleId, SchemaContext, Statement};

/// One fully-executed reactor over a statement forest.
#[derive(Debug)]
pub struct TestHarness {
    reactor: Reactor<'static>,
}

impl TestHarness {
    /// Compiles a module forest, panicking on any reactor failure.
    pub fn from_modules(modules: Vec<Statement>) -> Self {
        Self::try_from_modules(modules).expect("reactor execution failed")
    }

    /// Compiles a module forest, returning reactor failures for error-path
    /// tests.
    pub fn try_from_modules(modules: Vec<Statement>) -> Result<Self, ReactorError> {
        init_logging();
        // Test binaries are short-lived; leaking the context keeps the
        // harness free of self-referential borrows.
        let context: &'static SchemaContext = Box::leak(Box::new(
            SchemaContext::new(modules).expect("invalid module forest"),
        ));
        let mut reactor = Reactor::new(context)?;
        reactor.execute(&DefaultTypeBuilderFactory)?;
        Ok(Self { reactor })
    }

    /// The underlying reactor.
    pub fn reactor(&self) -> &Reactor<'static> {
        &self.reactor
    }

    /// Looks up a generator by module and local-name path, panicking when it
    /// does not exist.
    pub fn find(&self, module: &str, path: &[&str]) -> GeneratorId {
        self.reactor
            .find(&ModuleId::new(module), path)
            .unwrap_or_else(|| panic!("no generator at {module}:{}", path.join("/")))
    }

    /// The assigned (package, name) pair of a generator.
    pub fn type_name(&self, module: &str, path: &[&str]) -> TypeName {
        let id = self.find(module, path);
        self.reactor
            .type_name(id)
            .unwrap_or_else(|| panic!("no assigned name at {module}:{}", path.join("/")))
            .clone()
    }

    /// The materialized spec of a generator.
    pub fn spec(&self, module: &str, path: &[&str]) -> &TypeSpec {
        let id = self.find(module, path);
        self.reactor
            .emitted(id)
            .unwrap_or_else(|| panic!("no emitted type at {module}:{}", path.join("/")))
            .spec()
    }

    /// Augment generators attached to the generator at `path`.
    pub fn augments_of(&self, module: &str, path: &[&str]) -> Vec<GeneratorId> {
        let id = self.find(module, path);
        self.reactor.generator(id).augments.clone()
    }

    /// Collects `(slash-joined-path, type name)` for every named generator,
    /// keyed independently of arena allocation order.
    pub fn name_assignments(&self) -> Vec<(String, TypeName)> {
        let mut out = Vec::new();
        for (module, root) in self.reactor.modules() {
            self.collect_names(root, &format!("{module}"), &mut out);
        }
        out.sort();
        out
    }

    fn collect_names(&self, id: GeneratorId, prefix: &str, out: &mut Vec<(String, TypeName)>) {
        use trellis_reactor::GeneratorKind;

        let gen = self.reactor.generator(id);
        let label = match gen.qname() {
            Some(q) => format!("{prefix}/{}", q.local),
            // Implicit generators get stable labels independent of
            // allocation order.
            None => match &gen.kind {
                GeneratorKind::ListKey { list } => {
                    let list_name = self
                        .reactor
                        .generator(*list)
                        .qname()
                        .map(|q| q.local.clone())
                        .unwrap_or_default();
                    format!("{prefix}/{list_name}#key")
                }
                GeneratorKind::NotificationAggregate { .. } => format!("{prefix}/#listener"),
                GeneratorKind::RpcAggregate { .. } => format!("{prefix}/#service"),
                _ => format!("{prefix}/#{id}"),
            },
        };
        if let Some(name) = self.reactor.type_name(id) {
            out.push((label.clone(), name.clone()));
        }
        for &child in &gen.children {
            self.collect_names(child, &label, out);
        }
    }
}

fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}
