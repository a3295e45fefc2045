//! Identifier to session bookkeeping
//!
//! Maps application-chosen identifiers (robot names, device ids) to live
//! session handles and back. Both directions are updated under one lock, so
//! the maps are always inverses of each other.

use crate::transport::SessionHandle;
use parking_lot::Mutex;
use rosbridge_protocol::SessionId;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Weak};

/// Key a session can be registered under
pub trait Identifier: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> Identifier for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

struct Entry {
    session_id: SessionId,
    handle: Weak<dyn SessionHandle>,
}

struct Maps<I> {
    by_identifier: HashMap<I, Entry>,
    by_session: HashMap<SessionId, I>,
}

impl<I: Identifier> Maps<I> {
    fn remove_identifier(&mut self, identifier: &I) -> Option<SessionId> {
        let entry = self.by_identifier.remove(identifier)?;
        self.by_session.remove(&entry.session_id);
        Some(entry.session_id)
    }

    fn remove_session(&mut self, session_id: &SessionId) -> Option<I> {
        let identifier = self.by_session.remove(session_id)?;
        self.by_identifier.remove(&identifier);
        Some(identifier)
    }
}

/// Bidirectional identifier/session map
///
/// The registry holds handles weakly; a handle dropped by its transport
/// resolves as absent and is pruned on the next lookup.
pub struct SessionRegistry<I> {
    maps: Mutex<Maps<I>>,
}

impl<I: Identifier> SessionRegistry<I> {
    pub fn new() -> Self {
        Self {
            maps: Mutex::new(Maps {
                by_identifier: HashMap::new(),
                by_session: HashMap::new(),
            }),
        }
    }

    /// Registers `handle` under `identifier`
    ///
    /// Any previous session under `identifier` and any previous identifier of
    /// `handle` are dropped first. Returns the session that was replaced, if
    /// it was a different one.
    pub fn register(&self, identifier: I, handle: &Arc<dyn SessionHandle>) -> Option<SessionId> {
        let session_id = handle.session_id();
        let mut maps = self.maps.lock();

        maps.remove_session(&session_id);
        let replaced = maps.remove_identifier(&identifier);

        maps.by_session.insert(session_id, identifier.clone());
        maps.by_identifier.insert(
            identifier,
            Entry {
                session_id,
                handle: Arc::downgrade(handle),
            },
        );

        replaced.filter(|old| *old != session_id)
    }

    /// Removes the session registered under `identifier`
    pub fn deregister_identifier(&self, identifier: &I) -> Option<SessionId> {
        self.maps.lock().remove_identifier(identifier)
    }

    /// Removes `session_id`, returning the identifier it was registered under
    pub fn deregister_session(&self, session_id: &SessionId) -> Option<I> {
        self.maps.lock().remove_session(session_id)
    }

    /// Returns the live handle for `identifier`
    pub fn resolve(&self, identifier: &I) -> Option<Arc<dyn SessionHandle>> {
        let mut maps = self.maps.lock();
        let handle = maps.by_identifier.get(identifier)?.handle.upgrade();

        if handle.is_none() {
            tracing::debug!(identifier = ?identifier, "Pruning session whose transport is gone");
            maps.remove_identifier(identifier);
        }
        handle
    }

    pub fn identifier_of(&self, session_id: &SessionId) -> Option<I> {
        self.maps.lock().by_session.get(session_id).cloned()
    }

    pub fn session_of(&self, identifier: &I) -> Option<SessionId> {
        self.maps
            .lock()
            .by_identifier
            .get(identifier)
            .map(|entry| entry.session_id)
    }

    pub fn identifiers(&self) -> Vec<I> {
        self.maps.lock().by_identifier.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.maps.lock().by_identifier.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<I: Identifier> Default for SessionRegistry<I> {
    fn default() -> Self {
        Self::new()
    }
}
