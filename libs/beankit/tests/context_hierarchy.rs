use std::sync::Arc;

use beankit::{
    ApplicationContext, BootstrapArgs, ContextCollaborators, ContextError, ContextRegistry,
    ContextState, DefaultResourceLoader, DefinitionError, DefinitionReader, InMemoryResource,
    InstantiatorRegistry, ObjectDefinition, ObjectFactory, Resource, Scope,
};
use parking_lot::Mutex;

/// Test reader: one `name=type[,prototype][,lazy]` definition per line.
/// Records the description of every resource it reads.
#[derive(Default)]
struct RecordingReader {
    seen: Mutex<Vec<String>>,
}

impl RecordingReader {
    fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

impl DefinitionReader for RecordingReader {
    fn load_definitions(
        &self,
        resource: &dyn Resource,
        factory: &mut dyn ObjectFactory,
    ) -> Result<usize, DefinitionError> {
        self.seen.lock().push(resource.description());
        let text = resource
            .read_to_string()
            .map_err(|e| DefinitionError::Parse {
                resource: resource.description(),
                message: e.to_string(),
            })?;

        let mut count = 0;
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let mut parts = line.split(',');
            let head = parts.next().unwrap_or_default();
            let (name, ty) = head.split_once('=').ok_or_else(|| DefinitionError::Parse {
                resource: resource.description(),
                message: format!("expected name=type, got '{head}'"),
            })?;
            let mut def = ObjectDefinition::new(name, ty);
            for flag in parts {
                match flag {
                    "prototype" => def = def.with_scope(Scope::Prototype),
                    "lazy" => def = def.lazy(),
                    alias => def = def.with_alias(alias),
                }
            }
            factory.register_definition(def)?;
            count += 1;
        }
        Ok(count)
    }
}

#[derive(Debug, PartialEq)]
struct Greeting(&'static str);

fn instantiators() -> Arc<InstantiatorRegistry> {
    let reg = InstantiatorRegistry::new();
    reg.register("hello", || Ok(Greeting("hello")));
    reg.register("hola", || Ok(Greeting("hola")));
    Arc::new(reg)
}

fn mem(name: &str, body: &str) -> Arc<dyn Resource> {
    Arc::new(InMemoryResource::new(name, body))
}

struct Fixture {
    registry: Arc<ContextRegistry>,
    reader: Arc<RecordingReader>,
    loader: Arc<DefaultResourceLoader>,
}

impl Fixture {
    fn new(loader: DefaultResourceLoader) -> Self {
        Self {
            registry: Arc::new(ContextRegistry::new()),
            reader: Arc::new(RecordingReader::default()),
            loader: Arc::new(loader),
        }
    }

    fn collaborators(&self) -> ContextCollaborators {
        ContextCollaborators::new(self.loader.clone())
            .with_reader(self.reader.clone())
            .with_instantiators(instantiators())
    }

    fn context(&self, args: BootstrapArgs) -> Result<Arc<ApplicationContext>, ContextError> {
        ApplicationContext::new(args, self.collaborators(), self.registry.clone())
    }
}

#[test]
fn resources_load_before_locations_and_later_sources_win() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.xml"), "greeting=hello\nfarewell=hello").unwrap();
    std::fs::write(dir.path().join("b.xml"), "greeting=hola").unwrap();

    let fx = Fixture::new(DefaultResourceLoader::new(dir.path()));
    let args = BootstrapArgs::new()
        .with_configuration_locations(["a.xml", "b.xml"])
        .with_configuration_resources([mem("base", "greeting=hello\nbase=hello")])
        .with_refresh(true);
    let ctx = fx.context(args).unwrap();

    let seen = fx.reader.seen();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0], "in-memory [base]");
    assert!(seen[1].ends_with("a.xml]"));
    assert!(seen[2].ends_with("b.xml]"));

    assert_eq!(
        ctx.object_names(),
        vec![
            "greeting".to_string(),
            "base".to_string(),
            "farewell".to_string()
        ]
    );
    assert_eq!(
        *ctx.get_object_as::<Greeting>("greeting").unwrap(),
        Greeting("hola")
    );
}

#[test]
fn resolve_sources_reports_the_load_plan_without_loading() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.xml"), "").unwrap();

    let fx = Fixture::new(DefaultResourceLoader::new(dir.path()));
    let ctx = fx
        .context(
            BootstrapArgs::new()
                .with_configuration_locations(["a.xml"])
                .with_configuration_resources([mem("first", "")]),
        )
        .unwrap();

    let plan: Vec<String> = ctx
        .resolve_sources()
        .unwrap()
        .iter()
        .map(|r| r.description())
        .collect();
    assert_eq!(plan[0], "in-memory [first]");
    assert!(plan[1].ends_with("a.xml]"));
    assert!(fx.reader.seen().is_empty());
    assert_eq!(ctx.state(), ContextState::Unrefreshed);
}

#[test]
fn missing_location_fails_eager_construction() {
    let dir = tempfile::tempdir().unwrap();
    let fx = Fixture::new(DefaultResourceLoader::new(dir.path()));
    let err = fx
        .context(
            BootstrapArgs::new()
                .with_configuration_locations(["missing.xml"])
                .with_refresh(true),
        )
        .unwrap_err();
    assert!(matches!(err, ContextError::Resource(_)));
    assert!(fx.registry.is_empty());
}

#[test]
fn child_falls_back_to_parent_and_can_shadow_it() {
    let fx = Fixture::new(DefaultResourceLoader::default());
    let root = fx
        .context(
            BootstrapArgs::new()
                .with_name("root")
                .with_configuration_resources([mem("root", "shared=hello\ngreeting=hello")])
                .with_refresh(true),
        )
        .unwrap();
    let child = fx
        .context(
            BootstrapArgs::new()
                .with_name("child")
                .with_parent_context(root.handle())
                .with_configuration_resources([mem("child", "greeting=hola")])
                .with_refresh(true),
        )
        .unwrap();

    let shared_from_child = child.get_object("shared").unwrap();
    let shared_from_root = root.get_object("shared").unwrap();
    assert!(Arc::ptr_eq(&shared_from_child, &shared_from_root));

    assert_eq!(
        *child.get_object_as::<Greeting>("greeting").unwrap(),
        Greeting("hola")
    );
    assert_eq!(
        *root.get_object_as::<Greeting>("greeting").unwrap(),
        Greeting("hello")
    );

    assert!(child.contains_object("shared"));
    assert!(!child.contains_local_object("shared"));
    assert!(matches!(
        child.get_object("nothing"),
        Err(ContextError::NoSuchObject(name)) if name == "nothing"
    ));
}

#[test]
fn case_policy_follows_args_or_framework_default() {
    let fx = Fixture::new(DefaultResourceLoader::default());
    let strict = fx
        .context(
            BootstrapArgs::new()
                .with_configuration_resources([mem("s", "dataSource=hello,DS")])
                .with_refresh(true),
        )
        .unwrap();
    assert!(strict.case_sensitive());
    assert!(strict.contains_object("dataSource"));
    assert!(!strict.contains_object("datasource"));
    assert!(strict.contains_object("DS"));

    let relaxed = fx
        .context(
            BootstrapArgs::new()
                .with_case_sensitive(false)
                .with_configuration_resources([mem("r", "dataSource=hello,DS")])
                .with_refresh(true),
        )
        .unwrap();
    assert!(!relaxed.case_sensitive());
    assert!(relaxed.contains_object("DATASOURCE"));
    assert!(relaxed.get_object("ds").is_ok());
}

#[test]
fn lazy_and_prototype_objects_are_created_on_demand() {
    let fx = Fixture::new(DefaultResourceLoader::default());
    let ctx = fx
        .context(
            BootstrapArgs::new()
                .with_configuration_resources([mem("m", "p=hello,prototype\nl=hello,lazy")])
                .with_refresh(true),
        )
        .unwrap();

    let p1 = ctx.get_object("p").unwrap();
    let p2 = ctx.get_object("p").unwrap();
    assert!(!Arc::ptr_eq(&p1, &p2));

    let l1 = ctx.get_object("l").unwrap();
    let l2 = ctx.get_object("l").unwrap();
    assert!(Arc::ptr_eq(&l1, &l2));
}

#[test]
fn refresh_again_reloads_changed_sources() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.xml");
    std::fs::write(&path, "greeting=hello").unwrap();

    let fx = Fixture::new(DefaultResourceLoader::new(dir.path()));
    let ctx = fx
        .context(
            BootstrapArgs::new()
                .with_configuration_locations(["app.xml"])
                .with_refresh(true),
        )
        .unwrap();
    let before = ctx.get_object("greeting").unwrap();

    std::fs::write(&path, "greeting=hola\nextra=hello").unwrap();
    ctx.refresh().unwrap();

    let after = ctx.get_object_as::<Greeting>("greeting").unwrap();
    assert_eq!(*after, Greeting("hola"));
    assert!(!Arc::ptr_eq(&before, &(after as Arc<dyn std::any::Any + Send + Sync>)));
    assert_eq!(ctx.object_names().len(), 2);
}

#[test]
fn set_parent_rejects_cycles() {
    let fx = Fixture::new(DefaultResourceLoader::default());
    let a = fx.context(BootstrapArgs::new().with_name("a")).unwrap();
    let b = fx
        .context(
            BootstrapArgs::new()
                .with_name("b")
                .with_parent_context(a.handle()),
        )
        .unwrap();

    match a.set_parent(Some(b.handle())) {
        Err(ContextError::CircularParentChain { path }) => {
            assert_eq!(path, vec!["a", "b", "a"]);
            let msg = ContextError::CircularParentChain { path }.to_string();
            assert!(msg.contains("a -> b -> a"));
        }
        other => panic!("expected CircularParentChain, got {other:?}"),
    }
    assert!(matches!(
        a.set_parent(Some(a.handle())),
        Err(ContextError::CircularParentChain { .. })
    ));
    assert!(a.parent().is_none());

    let c = fx.context(BootstrapArgs::new().with_name("c")).unwrap();
    a.set_parent(Some(c.handle())).unwrap();
    assert_eq!(
        fx.registry.ancestry(b.handle()).unwrap(),
        vec!["b".to_string(), "a".to_string(), "c".to_string()]
    );

    a.refresh().unwrap();
    assert!(matches!(
        a.set_parent(None),
        Err(ContextError::ParentFrozen { .. })
    ));
}

#[test]
fn unknown_or_dropped_parent_is_unavailable() {
    let fx = Fixture::new(DefaultResourceLoader::default());
    let parent = fx
        .context(BootstrapArgs::new().with_name("p").with_refresh(true))
        .unwrap();
    let handle = parent.handle();
    let child = fx
        .context(
            BootstrapArgs::new()
                .with_parent_context(handle)
                .with_refresh(true),
        )
        .unwrap();

    drop(parent);
    assert!(matches!(
        child.get_object("anything"),
        Err(ContextError::ParentUnavailable { .. })
    ));
    assert!(!child.contains_object("anything"));

    let err = fx
        .context(BootstrapArgs::new().with_parent_context(handle))
        .unwrap_err();
    assert!(matches!(err, ContextError::ParentUnavailable { id } if id == handle.id()));
}

#[test]
fn closing_parent_makes_it_unreachable_from_children() {
    let fx = Fixture::new(DefaultResourceLoader::default());
    let parent = fx
        .context(
            BootstrapArgs::new()
                .with_configuration_resources([mem("p", "shared=hello")])
                .with_refresh(true),
        )
        .unwrap();
    let child = fx
        .context(
            BootstrapArgs::new()
                .with_parent_context(parent.handle())
                .with_refresh(true),
        )
        .unwrap();
    assert!(child.get_object("shared").is_ok());

    parent.close();
    assert!(matches!(
        child.get_object("shared"),
        Err(ContextError::ParentUnavailable { .. })
    ));
}
