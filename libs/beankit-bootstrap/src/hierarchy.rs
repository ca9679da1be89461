//! Builds the configured context tree and reports on it.
//!
//! Contexts are created in declaration order; a `parent` name is resolved to
//! the handle of the context declared under that name earlier in the list.

use std::collections::HashMap;
use std::sync::Arc;

use beankit::{
    ApplicationContext, ContextCollaborators, ContextError, ContextRegistry,
    DefaultResourceLoader,
};
use serde::Serialize;

use crate::config::{AppConfig, ConfigError};

/// Whether `refresh: true` entries are honoured while building.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RefreshMode {
    #[default]
    AsConfigured,
    /// Build every context unrefreshed; used for planning and checks.
    Never,
}

#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to bootstrap context '{name}'")]
    Context {
        name: String,
        #[source]
        source: ContextError,
    },
}

/// One source of a context's load plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourcePlan {
    pub description: String,
    pub exists: bool,
}

/// Effective settings and resolved sources of one context.
#[derive(Debug, Clone, Serialize)]
pub struct ContextPlan {
    pub name: String,
    pub parent: Option<String>,
    /// Names from this context up to the root.
    pub ancestry: Vec<String>,
    pub case_sensitive: bool,
    pub state: String,
    pub sources: Vec<SourcePlan>,
    /// Set when the sources or the parent chain could not be resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Something `check` found wrong with a context's sources.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckIssue {
    pub context: String,
    pub message: String,
}

impl std::fmt::Display for CheckIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.context, self.message)
    }
}

/// Collaborators with a file loader anchored at the configured `home_dir`.
pub fn default_collaborators(config: &AppConfig) -> ContextCollaborators {
    ContextCollaborators::new(Arc::new(DefaultResourceLoader::new(config.home_dir())))
}

/// The contexts built from one [`AppConfig`], in declaration order.
pub struct ContextHierarchy {
    registry: Arc<ContextRegistry>,
    contexts: Vec<Arc<ApplicationContext>>,
    parents: Vec<Option<String>>,
}

impl std::fmt::Debug for ContextHierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextHierarchy")
            .field(
                "contexts",
                &self.contexts.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ContextHierarchy {
    pub fn build(
        config: &AppConfig,
        collaborators: ContextCollaborators,
        mode: RefreshMode,
    ) -> Result<Self, HierarchyError> {
        config.validate()?;

        let registry = Arc::new(ContextRegistry::new());
        let mut by_name: HashMap<&str, Arc<ApplicationContext>> = HashMap::new();
        let mut contexts = Vec::with_capacity(config.contexts.len());
        let mut parents = Vec::with_capacity(config.contexts.len());

        for (index, entry) in config.contexts.iter().enumerate() {
            let parent = match entry.parent.as_deref() {
                Some(p) => Some(by_name.get(p).map(|c| c.handle()).ok_or_else(|| {
                    ConfigError::UnknownParent {
                        index,
                        parent: p.to_string(),
                    }
                })?),
                None => None,
            };

            let mut args = entry.to_bootstrap_args(parent);
            if mode == RefreshMode::Never {
                args.set_refresh(false);
            }

            let ctx = ApplicationContext::new(args, collaborators.clone(), registry.clone())
                .map_err(|source| HierarchyError::Context {
                    name: entry
                        .name
                        .clone()
                        .unwrap_or_else(|| beankit::DEFAULT_CONTEXT_NAME.to_string()),
                    source,
                })?;

            if let Some(name) = entry.name.as_deref() {
                by_name.insert(name, ctx.clone());
            }
            parents.push(entry.parent.clone());
            contexts.push(ctx);
        }

        tracing::info!(contexts = contexts.len(), ?mode, "Context hierarchy built");
        Ok(Self {
            registry,
            contexts,
            parents,
        })
    }

    pub fn contexts(&self) -> &[Arc<ApplicationContext>] {
        &self.contexts
    }

    /// First context declared under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<ApplicationContext>> {
        self.registry.find_by_name(name)
    }

    pub fn registry(&self) -> &Arc<ContextRegistry> {
        &self.registry
    }

    /// Resolve every context's sources without loading them.
    pub fn plan(&self) -> Vec<ContextPlan> {
        self.contexts
            .iter()
            .zip(&self.parents)
            .map(|(ctx, parent)| {
                let mut errors = Vec::new();
                let sources = match ctx.resolve_sources() {
                    Ok(resources) => resources
                        .iter()
                        .map(|r| SourcePlan {
                            description: r.description(),
                            exists: r.exists(),
                        })
                        .collect(),
                    Err(e) => {
                        errors.push(e.to_string());
                        Vec::new()
                    }
                };
                let ancestry = match self.registry.ancestry(ctx.handle()) {
                    Ok(names) => names,
                    Err(e) => {
                        errors.push(e.to_string());
                        Vec::new()
                    }
                };
                ContextPlan {
                    name: ctx.name().to_string(),
                    parent: parent.clone(),
                    ancestry,
                    case_sensitive: ctx.case_sensitive(),
                    state: format!("{:?}", ctx.state()),
                    sources,
                    error: (!errors.is_empty()).then(|| errors.join("; ")),
                }
            })
            .collect()
    }

    /// Every plan error and every missing source, across all contexts.
    ///
    /// `DefaultResourceLoader` already rejects missing files while resolving,
    /// so missing sources only show up here for embedded entries, custom
    /// loaders and pre-resolved resources.
    pub fn check(&self) -> Vec<CheckIssue> {
        let mut issues = Vec::new();
        for plan in self.plan() {
            if let Some(error) = plan.error {
                issues.push(CheckIssue {
                    context: plan.name.clone(),
                    message: error,
                });
            }
            for source in plan.sources.iter().filter(|s| !s.exists) {
                issues.push(CheckIssue {
                    context: plan.name.clone(),
                    message: format!("{} does not exist", source.description),
                });
            }
        }
        if issues.is_empty() {
            tracing::info!("Context hierarchy check passed");
        } else {
            tracing::warn!(issues = issues.len(), "Context hierarchy check found problems");
        }
        issues
    }

    /// Close children before their parents.
    pub fn close(&self) {
        for ctx in self.contexts.iter().rev() {
            ctx.close();
        }
    }
}
