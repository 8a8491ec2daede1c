//! In-flight calls, addressed by the integer handle passed to the guest.
//!
//! The guest cannot hold a reference to host memory, so every call gets a
//! small id. The guest hands it back on every callback and the router
//! resolves it here.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, LazyLock, OnceLock, PoisonError, RwLock};

use wasmtime::Memory;

use crate::sandbox::config::ResolvedOptions;
use crate::types::{MessageFn, MessageLevel, TableAction, TableActionFn, Tag};

/// Host-side state of one call into the sandbox.
pub struct Session {
    id: u32,
    table_action: TableActionFn,
    messages: MessageFn,
    max_size: u32,
    /// Memory of the instance serving this call, set once it exists.
    memory: OnceLock<Memory>,
}

impl Session {
    pub(crate) fn new(id: u32, options: &ResolvedOptions) -> Self {
        Self {
            id,
            table_action: Arc::clone(&options.table_action),
            messages: Arc::clone(&options.messages),
            max_size: options.max_size,
            memory: OnceLock::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Output bound written into the guest's size cell.
    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    /// The instance memory, if the instance has been created yet.
    pub fn memory(&self) -> Option<Memory> {
        self.memory.get().copied()
    }

    pub(crate) fn attach_memory(&self, memory: Memory) {
        // A session serves exactly one instance; a second attach is a no-op.
        let _ = self.memory.set(memory);
    }

    pub(crate) fn table_action(&self, tag: Tag) -> TableAction {
        (self.table_action)(tag)
    }

    pub(crate) fn message(&self, level: MessageLevel, msg: &str) {
        (self.messages)(level, msg)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("max_size", &self.max_size)
            .field("attached", &self.memory.get().is_some())
            .finish()
    }
}

/// Concurrent map from session id to the live session.
///
/// The registry only holds lookup entries; the call that created a session
/// owns it and removes it through [`SessionGuard`].
#[derive(Debug, Default)]
pub struct SessionRegistry {
    next_id: AtomicU32,
    sessions: RwLock<HashMap<u32, Arc<Session>>>,
}

impl SessionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next id from the counter. Wraps at `u32::MAX`.
    pub fn allocate(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Insert a session under its id.
    ///
    /// Returns the session back if its id is already taken by a live call.
    pub fn register(&self, session: Arc<Session>) -> Result<(), Arc<Session>> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        match sessions.entry(session.id()) {
            Entry::Occupied(_) => Err(session),
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    /// Find the session for an id.
    pub fn lookup(&self, id: u32) -> Option<Arc<Session>> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(&id).cloned()
    }

    /// Remove a session. Removing an unknown id is a no-op.
    pub fn deregister(&self, id: u32) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(&id);
    }

    /// Create and register a session under a fresh id.
    ///
    /// The counter is 32 bits wide because the guest ABI is; after a wrap,
    /// ids still held by live sessions and the reserved id 0 are skipped.
    pub(crate) fn open(&self, options: &ResolvedOptions) -> SessionGuard<'_> {
        loop {
            let id = self.allocate();
            if id == 0 {
                continue;
            }
            match self.register(Arc::new(Session::new(id, options))) {
                Ok(()) => {
                    tracing::trace!(session = id, "session registered");
                    return SessionGuard { registry: self, id };
                }
                Err(_) => {
                    tracing::debug!(session = id, "session id still live after wraparound, skipping");
                }
            }
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if no session is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Deregisters its session when dropped, on success, error and unwind alike.
#[derive(Debug)]
pub struct SessionGuard<'a> {
    registry: &'a SessionRegistry,
    id: u32,
}

impl SessionGuard<'_> {
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The registered session.
    pub fn session(&self) -> Option<Arc<Session>> {
        self.registry.lookup(self.id)
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
        tracing::trace!(session = self.id, "session deregistered");
    }
}

static SESSIONS: LazyLock<SessionRegistry> = LazyLock::new(SessionRegistry::new);

/// The process-wide registry consulted by the guest callbacks.
pub fn sessions() -> &'static SessionRegistry {
    &SESSIONS
}
