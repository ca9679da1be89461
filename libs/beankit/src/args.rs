//! Bootstrap arguments consumed by [`ApplicationContext::new`](crate::context::ApplicationContext::new).

use std::fmt;
use std::sync::Arc;

use crate::registry::ContextHandle;
use crate::resource::Resource;

/// Everything a context constructor needs to decide what to load, under which
/// name and parent, with which name-matching policy, and whether to load now.
///
/// Every operation is infallible and free of I/O; resolution of locations and
/// parsing of definitions happen in the consuming context. Fields are
/// independent: setting one never clears or rewrites another.
///
/// ```
/// use beankit::BootstrapArgs;
///
/// let args = BootstrapArgs::new()
///     .with_configuration_locations(["a.xml", "b.xml"])
///     .with_name("root")
///     .with_refresh(true);
///
/// assert_eq!(args.configuration_locations(), ["a.xml", "b.xml"]);
/// assert!(args.configuration_resources().is_empty());
/// assert!(args.parent_context().is_none());
/// ```
#[derive(Clone, Default)]
pub struct BootstrapArgs {
    case_sensitive: Option<bool>,
    configuration_locations: Vec<String>,
    configuration_resources: Vec<Arc<dyn Resource>>,
    name: Option<String>,
    parent_context: Option<ContextHandle>,
    refresh: bool,
}

impl BootstrapArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case policy for object-name and alias lookups; `false` when never set.
    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive.unwrap_or(false)
    }

    /// The explicitly assigned case policy, if any. Contexts fall back to
    /// their own default when this is `None`.
    pub fn case_sensitive_override(&self) -> Option<bool> {
        self.case_sensitive
    }

    pub fn set_case_sensitive(&mut self, case_sensitive: bool) {
        self.case_sensitive = Some(case_sensitive);
    }

    pub fn configuration_locations(&self) -> &[String] {
        &self.configuration_locations
    }

    pub fn set_configuration_locations<I, S>(&mut self, locations: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.configuration_locations = locations.into_iter().map(Into::into).collect();
    }

    pub fn configuration_resources(&self) -> &[Arc<dyn Resource>] {
        &self.configuration_resources
    }

    pub fn set_configuration_resources<I>(&mut self, resources: I)
    where
        I: IntoIterator<Item = Arc<dyn Resource>>,
    {
        self.configuration_resources = resources.into_iter().collect();
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn clear_name(&mut self) {
        self.name = None;
    }

    /// Handle of the parent context; `None` for a root context.
    pub fn parent_context(&self) -> Option<ContextHandle> {
        self.parent_context
    }

    pub fn set_parent_context(&mut self, parent: Option<ContextHandle>) {
        self.parent_context = parent;
    }

    pub fn refresh(&self) -> bool {
        self.refresh
    }

    pub fn set_refresh(&mut self, refresh: bool) {
        self.refresh = refresh;
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.set_case_sensitive(case_sensitive);
        self
    }

    pub fn with_configuration_locations<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_configuration_locations(locations);
        self
    }

    pub fn with_configuration_resources<I>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Resource>>,
    {
        self.set_configuration_resources(resources);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.set_name(name);
        self
    }

    pub fn with_parent_context(mut self, parent: ContextHandle) -> Self {
        self.parent_context = Some(parent);
        self
    }

    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }
}

impl fmt::Debug for BootstrapArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resources: Vec<String> = self
            .configuration_resources
            .iter()
            .map(|r| r.description())
            .collect();
        f.debug_struct("BootstrapArgs")
            .field("case_sensitive", &self.case_sensitive)
            .field("configuration_locations", &self.configuration_locations)
            .field("configuration_resources", &resources)
            .field("name", &self.name)
            .field("parent_context", &self.parent_context)
            .field("refresh", &self.refresh)
            .finish()
    }
}
