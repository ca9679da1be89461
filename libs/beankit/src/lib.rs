//! # BeanKit - Hierarchical Object Container Bootstrap
//!
//! BeanKit assembles object graphs from declarative definitions. This crate
//! covers the bootstrap side of the container:
//!
//! - **Bootstrap args**: [`BootstrapArgs`] says what to load (locations and/or
//!   pre-resolved resources), under which name and parent, with which
//!   name-matching policy, and whether to load during construction
//! - **Resources**: [`Resource`] handles and a [`ResourceLoader`] that turns
//!   location strings into them
//! - **Definitions**: [`ObjectDefinition`] storage in an [`ObjectFactory`],
//!   filled by an external [`DefinitionReader`]
//! - **Contexts**: [`ApplicationContext`] with the
//!   `Unrefreshed → Refreshing → Active → Closed` lifecycle and parent lookup
//!   through a non-owning [`ContextRegistry`]
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use beankit::{ApplicationContext, BootstrapArgs, ContextCollaborators, ContextRegistry};
//!
//! let registry = Arc::new(ContextRegistry::new());
//!
//! let root = ApplicationContext::new(
//!     BootstrapArgs::new().with_name("root").with_refresh(true),
//!     ContextCollaborators::default(),
//!     registry.clone(),
//! )?;
//!
//! let child = ApplicationContext::new(
//!     BootstrapArgs::new()
//!         .with_name("child")
//!         .with_parent_context(root.handle()),
//!     ContextCollaborators::default(),
//!     registry.clone(),
//! )?;
//!
//! assert!(root.is_active());
//! assert!(!child.is_active());
//! child.refresh()?;
//! assert_eq!(child.parent_context()?.unwrap().name(), "root");
//! # Ok::<(), beankit::ContextError>(())
//! ```

pub mod args;
pub mod context;
pub mod definition;
pub mod error;
pub mod factory;
pub mod loader;
pub mod reader;
pub mod registry;
pub mod resource;

pub use args::BootstrapArgs;
pub use context::{
    ApplicationContext, ContextCollaborators, ContextState, DEFAULT_CASE_SENSITIVE,
    DEFAULT_CONTEXT_NAME,
};
pub use definition::{DefinitionError, ObjectDefinition, Scope};
pub use error::ContextError;
pub use factory::{
    DefaultObjectFactory, Instantiator, InstantiatorRegistry, ObjectFactory, ObjectRef,
};
pub use loader::{DefaultResourceLoader, ResourceLoader};
pub use reader::DefinitionReader;
pub use registry::{ContextHandle, ContextId, ContextRegistry};
pub use resource::{FileResource, InMemoryResource, Resource, ResourceError, StaticResource};
