//! Non-owning registry of live application contexts.
//!
//! Child contexts refer to their parent through a [`ContextHandle`]. The
//! registry resolves handles to contexts but only stores `Weak` pointers, so
//! it never keeps a context alive.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::context::ApplicationContext;
use crate::error::ContextError;

/// Unique identity of one context instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Non-owning reference to a context, resolved through a [`ContextRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextHandle {
    id: ContextId,
}

impl ContextHandle {
    pub fn from_id(id: ContextId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }
}

struct RegistryEntry {
    seq: u64,
    context: Weak<ApplicationContext>,
}

#[derive(Default)]
pub struct ContextRegistry {
    entries: DashMap<ContextId, RegistryEntry>,
    next_seq: AtomicU64,
    // Serializes parent-chain checks with parent writes across all contexts.
    reparent: Mutex<()>,
}

impl fmt::Debug for ContextRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextRegistry")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, context: &Arc<ApplicationContext>) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            context.id(),
            RegistryEntry {
                seq,
                context: Arc::downgrade(context),
            },
        );
        tracing::debug!(context = %context.name(), id = %context.id(), "Context registered");
    }

    pub fn deregister(&self, id: ContextId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Resolve a handle to its live context.
    pub fn resolve(&self, handle: ContextHandle) -> Result<Arc<ApplicationContext>, ContextError> {
        self.entries
            .get(&handle.id())
            .and_then(|e| e.context.upgrade())
            .ok_or(ContextError::ParentUnavailable { id: handle.id() })
    }

    /// First live context registered under exactly `name`.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<ApplicationContext>> {
        // Upgrade first, filter after: dropping a last strong ref while the
        // shard lock is held would re-enter `deregister` from `Drop`.
        let live: Vec<(u64, Arc<ApplicationContext>)> = self
            .entries
            .iter()
            .filter_map(|e| e.context.upgrade().map(|ctx| (e.seq, ctx)))
            .collect();
        let mut matches: Vec<_> = live
            .into_iter()
            .filter(|(_, ctx)| ctx.name() == name)
            .collect();
        matches.sort_by_key(|(seq, _)| *seq);
        matches.into_iter().next().map(|(_, ctx)| ctx)
    }

    /// Names from the context identified by `handle` up to its root.
    pub fn ancestry(&self, handle: ContextHandle) -> Result<Vec<String>, ContextError> {
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(handle);
        while let Some(h) = current {
            let ctx = self.resolve(h)?;
            names.push(ctx.name().to_string());
            if !seen.insert(h.id()) {
                return Err(ContextError::CircularParentChain { path: names });
            }
            current = ctx.parent();
        }
        Ok(names)
    }

    /// Held by `set_parent` for the whole cycle check and write.
    pub(crate) fn reparent_guard(&self) -> MutexGuard<'_, ()> {
        self.reparent.lock()
    }

    /// Number of live registered contexts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
