use thiserror::Error;

use crate::context::ContextState;
use crate::definition::DefinitionError;
use crate::registry::ContextId;
use crate::resource::ResourceError;

/// Errors raised by [`ApplicationContext`](crate::context::ApplicationContext).
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("parent context {id} is not available (dropped, closed or never registered)")]
    ParentUnavailable { id: ContextId },
    #[error("circular parent chain: {}", path.join(" -> "))]
    CircularParentChain { path: Vec<String> },
    #[error("context '{name}' is already refreshing")]
    RefreshInProgress { name: String },
    #[error("context '{name}' is closed")]
    Closed { name: String },
    #[error("context '{name}' is not active (state: {state:?})")]
    NotActive { name: String, state: ContextState },
    #[error("context '{name}' cannot change its parent once refreshed")]
    ParentFrozen { name: String },
    #[error("context '{name}' has configuration sources but no definition reader")]
    NoDefinitionReader { name: String },
    #[error("no object named '{0}' in the context hierarchy")]
    NoSuchObject(String),
    #[error("object '{name}' is not of type {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
    },
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Definition(#[from] DefinitionError),
}
