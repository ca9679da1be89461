//! Declarative object descriptions registered with an [`ObjectFactory`](crate::factory::ObjectFactory).

use thiserror::Error;

/// Lifetime of the objects produced from a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// One shared instance per context.
    #[default]
    Singleton,
    /// A new instance for every lookup.
    Prototype,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDefinition {
    pub name: String,
    /// Key into the [`InstantiatorRegistry`](crate::factory::InstantiatorRegistry).
    pub type_name: String,
    pub aliases: Vec<String>,
    pub scope: Scope,
    /// Lazy singletons are skipped by pre-instantiation and created on first lookup.
    pub lazy_init: bool,
}

impl ObjectDefinition {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            aliases: Vec::new(),
            scope: Scope::default(),
            lazy_init: false,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn lazy(mut self) -> Self {
        self.lazy_init = true;
        self
    }

    pub fn is_singleton(&self) -> bool {
        self.scope == Scope::Singleton
    }

    /// Whether refresh should create this object eagerly.
    pub fn is_eager_singleton(&self) -> bool {
        self.is_singleton() && !self.lazy_init
    }
}

/// Errors raised while registering definitions or producing objects from them.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to parse definitions from {resource}: {message}")]
    Parse { resource: String, message: String },
    #[error("alias '{alias}' for '{name}' conflicts with an existing object name")]
    AliasConflict { alias: String, name: String },
    #[error("object '{name}' cannot be its own alias")]
    SelfAlias { name: String },
    #[error("no definition named '{0}'")]
    NoSuchDefinition(String),
    #[error("no instantiator registered for type '{type_name}' (object '{name}')")]
    NoInstantiator { name: String, type_name: String },
    #[error("instantiation failed for object '{name}'")]
    Instantiation {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}
