//! Object factory: definition storage, name matching and instantiation.
//!
//! There is no reflection in Rust, so objects are produced by constructor
//! functions registered per type name in an [`InstantiatorRegistry`]. A
//! definition's `type_name` selects the constructor.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::definition::{DefinitionError, ObjectDefinition, Scope};

/// Shared, type-erased object produced by a factory.
pub type ObjectRef = Arc<dyn Any + Send + Sync>;

/// Constructor function for one type name.
pub type Instantiator = Arc<dyn Fn() -> anyhow::Result<ObjectRef> + Send + Sync>;

/// Type name → constructor table shared by every context that needs it.
#[derive(Default)]
pub struct InstantiatorRegistry {
    map: DashMap<String, Instantiator>,
}

impl std::fmt::Debug for InstantiatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let types: Vec<String> = self.map.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("InstantiatorRegistry")
            .field("types", &types)
            .finish()
    }
}

impl InstantiatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed constructor. Replaces an earlier constructor for the same type name.
    pub fn register<T, F>(&self, type_name: impl Into<String>, ctor: F)
    where
        T: Any + Send + Sync,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let erased: Instantiator = Arc::new(move || ctor().map(|v| Arc::new(v) as ObjectRef));
        self.map.insert(type_name.into(), erased);
    }

    pub fn register_erased(&self, type_name: impl Into<String>, ctor: Instantiator) {
        self.map.insert(type_name.into(), ctor);
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.map.contains_key(type_name)
    }

    /// Returns `None` when nothing is registered for `type_name`.
    pub fn instantiate(&self, type_name: &str) -> Option<anyhow::Result<ObjectRef>> {
        // Clone the constructor out so the shard lock is not held while it runs.
        let ctor = self.map.get(type_name).map(|e| e.value().clone())?;
        Some(ctor())
    }
}

/// Storage and lookup of object definitions.
pub trait ObjectFactory: Send + Sync {
    /// Whether names and aliases are matched case-sensitively.
    fn case_sensitive(&self) -> bool;

    /// Register a definition and its aliases. A definition with an existing name replaces it.
    fn register_definition(&mut self, definition: ObjectDefinition) -> Result<(), DefinitionError>;

    fn register_alias(&mut self, name: &str, alias: &str) -> Result<(), DefinitionError>;

    /// True if `name` is a definition name or alias known to this factory.
    fn contains_object(&self, name: &str) -> bool;

    fn definition(&self, name: &str) -> Option<&ObjectDefinition>;

    /// Definition names in registration order.
    fn object_names(&self) -> Vec<String>;

    fn get_object(&self, name: &str) -> Result<ObjectRef, DefinitionError>;

    /// Create every non-lazy singleton; returns how many were created.
    fn preinstantiate_singletons(&self) -> Result<usize, DefinitionError>;

    fn destroy_singletons(&self);
}

/// In-memory [`ObjectFactory`].
pub struct DefaultObjectFactory {
    case_sensitive: bool,
    instantiators: Arc<InstantiatorRegistry>,
    /// Keyed by the normalized name.
    definitions: HashMap<String, ObjectDefinition>,
    order: Vec<String>,
    /// Normalized alias → normalized definition name.
    aliases: HashMap<String, String>,
    singletons: DashMap<String, ObjectRef>,
}

impl std::fmt::Debug for DefaultObjectFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultObjectFactory")
            .field("case_sensitive", &self.case_sensitive)
            .field("definitions", &self.order)
            .field("aliases", &self.aliases.len())
            .field("singletons", &self.singletons.len())
            .finish()
    }
}

impl DefaultObjectFactory {
    pub fn new(case_sensitive: bool, instantiators: Arc<InstantiatorRegistry>) -> Self {
        Self {
            case_sensitive,
            instantiators,
            definitions: HashMap::new(),
            order: Vec::new(),
            aliases: HashMap::new(),
            singletons: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn key(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }

    /// Normalized definition name for a name or alias.
    fn canonical(&self, name: &str) -> Option<String> {
        let key = self.key(name);
        if self.definitions.contains_key(&key) {
            return Some(key);
        }
        self.aliases.get(&key).cloned()
    }

    fn create(&self, def: &ObjectDefinition) -> Result<ObjectRef, DefinitionError> {
        match self.instantiators.instantiate(&def.type_name) {
            Some(Ok(obj)) => Ok(obj),
            Some(Err(source)) => Err(DefinitionError::Instantiation {
                name: def.name.clone(),
                source,
            }),
            None => Err(DefinitionError::NoInstantiator {
                name: def.name.clone(),
                type_name: def.type_name.clone(),
            }),
        }
    }

    fn singleton(&self, key: &str, def: &ObjectDefinition) -> Result<ObjectRef, DefinitionError> {
        let entry = self
            .singletons
            .entry(key.to_string())
            .or_try_insert_with(|| self.create(def))?;
        Ok(entry.value().clone())
    }
}

impl ObjectFactory for DefaultObjectFactory {
    fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn register_definition(&mut self, definition: ObjectDefinition) -> Result<(), DefinitionError> {
        let key = self.key(&definition.name);
        let name = definition.name.clone();
        let aliases = definition.aliases.clone();

        // Reject bad aliases before touching any table.
        for alias in &aliases {
            let alias_key = self.key(alias);
            if alias_key == key {
                return Err(DefinitionError::SelfAlias { name: name.clone() });
            }
            if self.definitions.contains_key(&alias_key) {
                return Err(DefinitionError::AliasConflict {
                    alias: alias.clone(),
                    name: name.clone(),
                });
            }
        }

        if self.aliases.remove(&key).is_some() {
            tracing::debug!(name = %name, "Definition name shadows an existing alias");
        }

        if self.definitions.insert(key.clone(), definition).is_some() {
            tracing::debug!(name = %name, "Overriding object definition");
            self.singletons.remove(&key);
        } else {
            self.order.push(key);
        }

        for alias in aliases {
            self.register_alias(&name, &alias)?;
        }
        Ok(())
    }

    fn register_alias(&mut self, name: &str, alias: &str) -> Result<(), DefinitionError> {
        let name_key = self.key(name);
        let alias_key = self.key(alias);
        if alias_key == name_key {
            return Err(DefinitionError::SelfAlias {
                name: name.to_string(),
            });
        }
        if self.definitions.contains_key(&alias_key) {
            return Err(DefinitionError::AliasConflict {
                alias: alias.to_string(),
                name: name.to_string(),
            });
        }
        let target = self
            .canonical(name)
            .ok_or_else(|| DefinitionError::NoSuchDefinition(name.to_string()))?;
        self.aliases.insert(alias_key, target);
        Ok(())
    }

    fn contains_object(&self, name: &str) -> bool {
        self.canonical(name).is_some()
    }

    fn definition(&self, name: &str) -> Option<&ObjectDefinition> {
        self.canonical(name).and_then(|k| self.definitions.get(&k))
    }

    fn object_names(&self) -> Vec<String> {
        self.order
            .iter()
            .filter_map(|k| self.definitions.get(k))
            .map(|d| d.name.clone())
            .collect()
    }

    fn get_object(&self, name: &str) -> Result<ObjectRef, DefinitionError> {
        let key = self
            .canonical(name)
            .ok_or_else(|| DefinitionError::NoSuchDefinition(name.to_string()))?;
        let def = self
            .definitions
            .get(&key)
            .ok_or_else(|| DefinitionError::NoSuchDefinition(name.to_string()))?;
        match def.scope {
            Scope::Singleton => self.singleton(&key, def),
            Scope::Prototype => self.create(def),
        }
    }

    fn preinstantiate_singletons(&self) -> Result<usize, DefinitionError> {
        let mut created = 0;
        for key in &self.order {
            let Some(def) = self.definitions.get(key) else {
                continue;
            };
            if !def.is_eager_singleton() || self.singletons.contains_key(key) {
                continue;
            }
            self.singleton(key, def)?;
            created += 1;
        }
        Ok(created)
    }

    fn destroy_singletons(&self) {
        self.singletons.clear();
    }
}
