//! Application context: the consumer of [`BootstrapArgs`].
//!
//! Lifecycle: `Unrefreshed → Refreshing → Active → Closed`. Construction
//! with `refresh = true` drives the context to `Active` before `new`
//! returns; otherwise the caller triggers [`ApplicationContext::refresh`]
//! later.
//!
//! Sources are loaded in a fixed order: every pre-resolved resource first,
//! then every location resolved through the [`ResourceLoader`]. Definitions
//! from later sources replace earlier ones with the same name.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::args::BootstrapArgs;
use crate::error::ContextError;
use crate::factory::{DefaultObjectFactory, InstantiatorRegistry, ObjectFactory, ObjectRef};
use crate::loader::{DefaultResourceLoader, ResourceLoader};
use crate::reader::DefinitionReader;
use crate::registry::{ContextHandle, ContextId, ContextRegistry};
use crate::resource::Resource;

/// Name given to contexts whose bootstrap args carry none.
pub const DEFAULT_CONTEXT_NAME: &str = "beankit.root";

/// Case policy applied when bootstrap args leave it unset.
pub const DEFAULT_CASE_SENSITIVE: bool = true;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    Unrefreshed,
    Refreshing,
    Active,
    Closed,
}

/// Services a context delegates to while refreshing.
#[derive(Clone)]
pub struct ContextCollaborators {
    pub loader: Arc<dyn ResourceLoader>,
    /// Required as soon as the context has at least one source.
    pub reader: Option<Arc<dyn DefinitionReader>>,
    pub instantiators: Arc<InstantiatorRegistry>,
}

impl ContextCollaborators {
    pub fn new(loader: Arc<dyn ResourceLoader>) -> Self {
        Self {
            loader,
            reader: None,
            instantiators: Arc::new(InstantiatorRegistry::new()),
        }
    }

    pub fn with_reader(mut self, reader: Arc<dyn DefinitionReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn with_instantiators(mut self, instantiators: Arc<InstantiatorRegistry>) -> Self {
        self.instantiators = instantiators;
        self
    }
}

impl Default for ContextCollaborators {
    fn default() -> Self {
        Self::new(Arc::new(DefaultResourceLoader::default()))
    }
}

pub struct ApplicationContext {
    id: ContextId,
    name: String,
    case_sensitive: bool,
    configuration_locations: Vec<String>,
    configuration_resources: Vec<Arc<dyn Resource>>,
    parent: RwLock<Option<ContextHandle>>,
    state: RwLock<ContextState>,
    factory: RwLock<DefaultObjectFactory>,
    collaborators: ContextCollaborators,
    registry: Arc<ContextRegistry>,
}

impl fmt::Debug for ApplicationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &*self.state.read())
            .field("parent", &*self.parent.read())
            .field("case_sensitive", &self.case_sensitive)
            .field("configuration_locations", &self.configuration_locations)
            .field("configuration_resources", &self.configuration_resources.len())
            .finish()
    }
}

impl ApplicationContext {
    /// Build a context from `args`, registering it in `registry`.
    ///
    /// The args are read once and not retained. Fails if the parent handle
    /// does not resolve, or if `args.refresh()` is set and refreshing fails.
    pub fn new(
        args: BootstrapArgs,
        collaborators: ContextCollaborators,
        registry: Arc<ContextRegistry>,
    ) -> Result<Arc<Self>, ContextError> {
        if let Some(parent) = args.parent_context() {
            registry.resolve(parent)?;
        }

        let case_sensitive = args
            .case_sensitive_override()
            .unwrap_or(DEFAULT_CASE_SENSITIVE);
        let name = args.name().unwrap_or(DEFAULT_CONTEXT_NAME).to_string();
        let refresh = args.refresh();

        let ctx = Arc::new(Self {
            id: ContextId::new(),
            name,
            case_sensitive,
            configuration_locations: args.configuration_locations().to_vec(),
            configuration_resources: args.configuration_resources().to_vec(),
            parent: RwLock::new(args.parent_context()),
            state: RwLock::new(ContextState::Unrefreshed),
            factory: RwLock::new(DefaultObjectFactory::new(
                case_sensitive,
                collaborators.instantiators.clone(),
            )),
            collaborators,
            registry: registry.clone(),
        });
        registry.register(&ctx);

        tracing::info!(
            context = %ctx.name,
            id = %ctx.id,
            parent = ?args.parent_context().map(|h| h.id().to_string()),
            locations = ctx.configuration_locations.len(),
            resources = ctx.configuration_resources.len(),
            refresh,
            "Application context created"
        );

        if refresh {
            if let Err(e) = ctx.refresh() {
                registry.deregister(ctx.id);
                return Err(e);
            }
        }
        Ok(ctx)
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn handle(&self) -> ContextHandle {
        ContextHandle::from_id(self.id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective case policy (explicit args value or [`DEFAULT_CASE_SENSITIVE`]).
    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn configuration_locations(&self) -> &[String] {
        &self.configuration_locations
    }

    pub fn configuration_resources(&self) -> &[Arc<dyn Resource>] {
        &self.configuration_resources
    }

    pub fn parent(&self) -> Option<ContextHandle> {
        *self.parent.read()
    }

    /// Resolve the parent handle; `Ok(None)` for a root context.
    pub fn parent_context(&self) -> Result<Option<Arc<ApplicationContext>>, ContextError> {
        self.parent()
            .map(|h| self.registry.resolve(h))
            .transpose()
    }

    pub fn state(&self) -> ContextState {
        *self.state.read()
    }

    pub fn is_active(&self) -> bool {
        self.state() == ContextState::Active
    }

    /// Re-parent a context that has not been refreshed yet.
    ///
    /// Rejects a parent whose ancestry already contains this context.
    pub fn set_parent(&self, parent: Option<ContextHandle>) -> Result<(), ContextError> {
        let state = self.state.read();
        match *state {
            ContextState::Unrefreshed => {}
            ContextState::Closed => {
                return Err(ContextError::Closed {
                    name: self.name.clone(),
                })
            }
            _ => {
                return Err(ContextError::ParentFrozen {
                    name: self.name.clone(),
                })
            }
        }

        let guard = self.registry.reparent_guard();
        let mut path = vec![self.name.clone()];
        let mut seen = HashSet::from([self.id]);
        let mut current = parent;
        while let Some(handle) = current {
            let ancestor = self.registry.resolve(handle)?;
            path.push(ancestor.name().to_string());
            if !seen.insert(handle.id()) {
                return Err(ContextError::CircularParentChain { path });
            }
            current = ancestor.parent();
        }

        *self.parent.write() = parent;
        drop(guard);
        drop(state);
        tracing::debug!(context = %self.name, parent = ?parent.map(|h| h.id().to_string()), "Parent changed");
        Ok(())
    }

    /// Ordered load plan: pre-resolved resources first, then resolved locations.
    pub fn resolve_sources(&self) -> Result<Vec<Arc<dyn Resource>>, ContextError> {
        let mut sources = self.configuration_resources.clone();
        for location in &self.configuration_locations {
            sources.push(self.collaborators.loader.get_resource(location)?);
        }
        Ok(sources)
    }

    /// Load definitions and pre-instantiate eager singletons.
    ///
    /// Legal from `Unrefreshed` and `Active`; a repeated refresh rebuilds the
    /// object factory from scratch. On failure the context returns to
    /// `Unrefreshed` with an empty factory.
    pub fn refresh(&self) -> Result<(), ContextError> {
        {
            let mut state = self.state.write();
            match *state {
                ContextState::Refreshing => {
                    return Err(ContextError::RefreshInProgress {
                        name: self.name.clone(),
                    })
                }
                ContextState::Closed => {
                    return Err(ContextError::Closed {
                        name: self.name.clone(),
                    })
                }
                ContextState::Unrefreshed | ContextState::Active => {
                    *state = ContextState::Refreshing;
                }
            }
        }

        let started = Instant::now();
        let outcome = self.load();

        let mut state = self.state.write();
        if *state != ContextState::Refreshing {
            // closed while loading
            return Err(ContextError::Closed {
                name: self.name.clone(),
            });
        }

        match outcome {
            Ok((factory, sources, created)) => {
                let definitions = factory.len();
                let previous = std::mem::replace(&mut *self.factory.write(), factory);
                previous.destroy_singletons();
                *state = ContextState::Active;
                tracing::info!(
                    context = %self.name,
                    sources,
                    definitions,
                    singletons = created,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Application context refreshed"
                );
                Ok(())
            }
            Err(e) => {
                let empty = DefaultObjectFactory::new(
                    self.case_sensitive,
                    self.collaborators.instantiators.clone(),
                );
                let previous = std::mem::replace(&mut *self.factory.write(), empty);
                previous.destroy_singletons();
                *state = ContextState::Unrefreshed;
                tracing::warn!(context = %self.name, error = %e, "Application context refresh failed");
                Err(e)
            }
        }
    }

    fn load(&self) -> Result<(DefaultObjectFactory, usize, usize), ContextError> {
        let sources = self.resolve_sources()?;
        let mut factory = DefaultObjectFactory::new(
            self.case_sensitive,
            self.collaborators.instantiators.clone(),
        );

        if !sources.is_empty() {
            let reader =
                self.collaborators
                    .reader
                    .as_ref()
                    .ok_or_else(|| ContextError::NoDefinitionReader {
                        name: self.name.clone(),
                    })?;
            for resource in &sources {
                let count = reader.load_definitions(resource.as_ref(), &mut factory)?;
                tracing::debug!(
                    context = %self.name,
                    resource = %resource.description(),
                    definitions = count,
                    "Loaded object definitions"
                );
            }
        }

        let created = factory.preinstantiate_singletons()?;
        Ok((factory, sources.len(), created))
    }

    /// Destroy cached singletons and leave the registry. Idempotent.
    pub fn close(&self) {
        {
            let mut state = self.state.write();
            if *state == ContextState::Closed {
                return;
            }
            *state = ContextState::Closed;
        }
        self.factory.read().destroy_singletons();
        self.registry.deregister(self.id);
        tracing::info!(context = %self.name, id = %self.id, "Application context closed");
    }

    fn ensure_active(&self) -> Result<(), ContextError> {
        match self.state() {
            ContextState::Active => Ok(()),
            ContextState::Closed => Err(ContextError::Closed {
                name: self.name.clone(),
            }),
            state => Err(ContextError::NotActive {
                name: self.name.clone(),
                state,
            }),
        }
    }

    /// Visit this context, then each ancestor, until `visit` yields a value.
    ///
    /// Fails with `CircularParentChain` if an ancestor repeats.
    fn walk_chain<T>(
        &self,
        mut visit: impl FnMut(&ApplicationContext) -> Result<Option<T>, ContextError>,
    ) -> Result<Option<T>, ContextError> {
        if let Some(found) = visit(self)? {
            return Ok(Some(found));
        }
        let mut seen = HashSet::from([self.id]);
        let mut path = vec![self.name.clone()];
        let mut next = self.parent_context()?;
        while let Some(ctx) = next {
            path.push(ctx.name.clone());
            if !seen.insert(ctx.id) {
                return Err(ContextError::CircularParentChain { path });
            }
            if let Some(found) = visit(ctx.as_ref())? {
                return Ok(Some(found));
            }
            next = ctx.parent_context()?;
        }
        Ok(None)
    }

    fn local_object(&self, name: &str) -> Result<Option<ObjectRef>, ContextError> {
        self.ensure_active()?;
        let factory = self.factory.read();
        if !factory.contains_object(name) {
            return Ok(None);
        }
        Ok(Some(factory.get_object(name)?))
    }

    /// Look `name` up locally, then along the parent chain.
    pub fn get_object(&self, name: &str) -> Result<ObjectRef, ContextError> {
        self.walk_chain(|ctx| ctx.local_object(name))?
            .ok_or_else(|| ContextError::NoSuchObject(name.to_string()))
    }

    pub fn get_object_as<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ContextError> {
        self.get_object(name)?
            .downcast::<T>()
            .map_err(|_| ContextError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn contains_local_object(&self, name: &str) -> bool {
        self.factory.read().contains_object(name)
    }

    /// True if `name` is defined here or in any reachable ancestor.
    pub fn contains_object(&self, name: &str) -> bool {
        self.walk_chain(|ctx| Ok(ctx.contains_local_object(name).then_some(())))
            .is_ok_and(|found| found.is_some())
    }

    /// Locally defined object names in registration order.
    pub fn object_names(&self) -> Vec<String> {
        self.factory.read().object_names()
    }
}

impl Drop for ApplicationContext {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{DefinitionError, ObjectDefinition};
    use crate::resource::InMemoryResource;

    /// Reads one definition per non-empty line: `name=type_name`.
    struct LineReader;

    impl DefinitionReader for LineReader {
        fn load_definitions(
            &self,
            resource: &dyn Resource,
            factory: &mut dyn ObjectFactory,
        ) -> Result<usize, DefinitionError> {
            let text = resource
                .read_to_string()
                .map_err(|e| DefinitionError::Parse {
                    resource: resource.description(),
                    message: e.to_string(),
                })?;
            let mut count = 0;
            for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                let (name, ty) = line.split_once('=').ok_or_else(|| DefinitionError::Parse {
                    resource: resource.description(),
                    message: format!("bad line '{line}'"),
                })?;
                factory.register_definition(ObjectDefinition::new(name, ty))?;
                count += 1;
            }
            Ok(count)
        }
    }

    fn collaborators() -> ContextCollaborators {
        let inst = InstantiatorRegistry::new();
        inst.register("text", || Ok(String::from("hello")));
        ContextCollaborators::default()
            .with_reader(Arc::new(LineReader))
            .with_instantiators(Arc::new(inst))
    }

    fn mem(name: &str, body: &str) -> Arc<dyn Resource> {
        Arc::new(InMemoryResource::new(name, body))
    }

    #[test]
    fn deferred_context_stays_unrefreshed() {
        let registry = Arc::new(ContextRegistry::new());
        let args = BootstrapArgs::new().with_configuration_resources([mem("a", "greeting=text")]);
        let ctx = ApplicationContext::new(args, collaborators(), registry).unwrap();

        assert_eq!(ctx.state(), ContextState::Unrefreshed);
        assert!(ctx.object_names().is_empty());
        assert!(matches!(
            ctx.get_object("greeting"),
            Err(ContextError::NotActive { .. })
        ));

        ctx.refresh().unwrap();
        assert!(ctx.is_active());
        assert_eq!(*ctx.get_object_as::<String>("greeting").unwrap(), "hello");
    }

    #[test]
    fn eager_context_is_active_after_new() {
        let registry = Arc::new(ContextRegistry::new());
        let args = BootstrapArgs::new()
            .with_configuration_resources([mem("a", "greeting=text")])
            .with_refresh(true);
        let ctx = ApplicationContext::new(args, collaborators(), registry).unwrap();
        assert_eq!(ctx.state(), ContextState::Active);
        assert_eq!(ctx.object_names(), vec!["greeting".to_string()]);
    }

    #[test]
    fn defaults_apply_when_args_are_unset() {
        let registry = Arc::new(ContextRegistry::new());
        let ctx = ApplicationContext::new(BootstrapArgs::new(), collaborators(), registry).unwrap();
        assert_eq!(ctx.name(), DEFAULT_CONTEXT_NAME);
        assert_eq!(ctx.case_sensitive(), DEFAULT_CASE_SENSITIVE);
        assert!(ctx.parent().is_none());
    }

    #[test]
    fn empty_bootstrap_refreshes_without_reader() {
        let registry = Arc::new(ContextRegistry::new());
        let args = BootstrapArgs::new().with_refresh(true);
        let ctx = ApplicationContext::new(args, ContextCollaborators::default(), registry).unwrap();
        assert!(ctx.is_active());
        assert!(ctx.object_names().is_empty());
    }

    #[test]
    fn sources_without_reader_fail_and_deregister() {
        let registry = Arc::new(ContextRegistry::new());
        let args = BootstrapArgs::new()
            .with_configuration_resources([mem("a", "x=text")])
            .with_refresh(true);
        let err = ApplicationContext::new(args, ContextCollaborators::default(), registry.clone())
            .unwrap_err();
        assert!(matches!(err, ContextError::NoDefinitionReader { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn failed_refresh_returns_to_unrefreshed() {
        let registry = Arc::new(ContextRegistry::new());
        let args = BootstrapArgs::new().with_configuration_resources([mem("bad", "no-equals")]);
        let ctx = ApplicationContext::new(args, collaborators(), registry).unwrap();

        let err = ctx.refresh().unwrap_err();
        assert!(matches!(
            err,
            ContextError::Definition(DefinitionError::Parse { .. })
        ));
        assert_eq!(ctx.state(), ContextState::Unrefreshed);
    }

    #[test]
    fn closed_context_rejects_refresh_and_lookup() {
        let registry = Arc::new(ContextRegistry::new());
        let ctx = ApplicationContext::new(
            BootstrapArgs::new().with_refresh(true),
            collaborators(),
            registry.clone(),
        )
        .unwrap();
        assert_eq!(registry.len(), 1);

        ctx.close();
        ctx.close();
        assert_eq!(ctx.state(), ContextState::Closed);
        assert!(registry.is_empty());
        assert!(matches!(ctx.refresh(), Err(ContextError::Closed { .. })));
        assert!(matches!(
            ctx.get_object("x"),
            Err(ContextError::Closed { .. })
        ));
    }

    #[test]
    fn concurrent_reparenting_never_forms_a_cycle() {
        let registry = Arc::new(ContextRegistry::new());
        let named = |name: &str| {
            ApplicationContext::new(
                BootstrapArgs::new().with_name(name),
                collaborators(),
                registry.clone(),
            )
            .unwrap()
        };
        let a = named("a");
        let b = named("b");

        for _ in 0..500 {
            a.set_parent(None).unwrap();
            b.set_parent(None).unwrap();
            let barrier = std::sync::Barrier::new(2);
            let (ra, rb) = std::thread::scope(|s| {
                let ta = s.spawn(|| {
                    barrier.wait();
                    a.set_parent(Some(b.handle()))
                });
                let tb = s.spawn(|| {
                    barrier.wait();
                    b.set_parent(Some(a.handle()))
                });
                (ta.join().unwrap(), tb.join().unwrap())
            });
            assert!(ra.is_ok() != rb.is_ok(), "exactly one re-parent must win");
            assert!(registry.ancestry(a.handle()).is_ok());
        }
    }

    #[test]
    fn lookup_through_a_parent_cycle_fails_instead_of_recursing() {
        let registry = Arc::new(ContextRegistry::new());
        let eager = |name: &str| {
            ApplicationContext::new(
                BootstrapArgs::new().with_name(name).with_refresh(true),
                collaborators(),
                registry.clone(),
            )
            .unwrap()
        };
        let a = eager("a");
        let b = eager("b");
        // bypass set_parent to build a loop
        *a.parent.write() = Some(b.handle());
        *b.parent.write() = Some(a.handle());

        match a.get_object("missing") {
            Err(ContextError::CircularParentChain { path }) => {
                assert_eq!(path, vec!["a", "b", "a"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(!a.contains_object("missing"));
        assert!(matches!(
            b.set_parent(Some(a.handle())),
            Err(ContextError::ParentFrozen { .. })
        ));
    }

    #[test]
    fn type_mismatch_is_reported() {
        let registry = Arc::new(ContextRegistry::new());
        let args = BootstrapArgs::new()
            .with_configuration_resources([mem("a", "greeting=text")])
            .with_refresh(true);
        let ctx = ApplicationContext::new(args, collaborators(), registry).unwrap();
        match ctx.get_object_as::<u32>("greeting") {
            Err(ContextError::TypeMismatch { name, expected }) => {
                assert_eq!(name, "greeting");
                assert_eq!(expected, "u32");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
