// src/session.rs

//! Session-scoped identity cache.
//!
//! The first successful handshake in a session stores its [`Principal`];
//! later requests in the same session reuse it. Entries live until the
//! session store invalidates them. Nothing here expires entries.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::auth::Principal;

/// Slot holding the verified principal.
pub const PRINCIPAL_KEY: &str = "negotiate_filter.principal";

/// Identifier of a client session, assigned outside this crate.
///
/// Insert one into the request extensions, or configure a session cookie on
/// the filter, to enable caching.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(Arc<str>);

impl SessionId {
    pub fn new(id: impl AsRef<str>) -> Self {
        SessionId(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // session ids are bearer secrets too
        write!(f, "SessionId({}..)", self.0.chars().take(4).collect::<String>())
    }
}

/// Key/value storage partitioned by session.
///
/// Implementations must be safe under concurrent access to the same
/// session: a reader sees either no value or a complete one.
pub trait SessionStore: Send + Sync {
    fn get(&self, session: &SessionId, key: &str) -> Option<Principal>;

    fn put(&self, session: &SessionId, key: &str, value: Principal);

    /// Store `value` unless the slot is already filled, and return whichever
    /// value the slot holds afterwards.
    ///
    /// Must be atomic: when several callers race on an empty slot, exactly
    /// one value is stored and every caller gets that value back.
    fn put_if_absent(&self, session: &SessionId, key: &str, value: Principal) -> Principal;

    /// Drop everything held for the session.
    fn invalidate(&self, session: &SessionId);
}

/// An in-process [`SessionStore`].
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, HashMap<String, Principal>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        MemorySessionStore::default()
    }

    /// Number of sessions holding at least one value.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, session: &SessionId, key: &str) -> Option<Principal> {
        self.sessions
            .read()
            .get(session)
            .and_then(|slots| slots.get(key))
            .cloned()
    }

    fn put(&self, session: &SessionId, key: &str, value: Principal) {
        self.sessions
            .write()
            .entry(session.clone())
            .or_default()
            .insert(key.to_owned(), value);
    }

    fn put_if_absent(&self, session: &SessionId, key: &str, value: Principal) -> Principal {
        let mut sessions = self.sessions.write();
        sessions
            .entry(session.clone())
            .or_default()
            .entry(key.to_owned())
            .or_insert(value)
            .clone()
    }

    fn invalidate(&self, session: &SessionId) {
        self.sessions.write().remove(session);
    }
}

impl fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySessionStore")
            .field("sessions", &self.len())
            .finish()
    }
}

/// Caches the verified principal of each session.
#[derive(Clone)]
pub struct SessionIdentityCache {
    store: Arc<dyn SessionStore>,
}

impl SessionIdentityCache {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        SessionIdentityCache { store }
    }

    pub fn get(&self, session: &SessionId) -> Option<Principal> {
        self.store.get(session, PRINCIPAL_KEY)
    }

    /// Cache `principal` unless the session already holds one.
    ///
    /// Returns the principal the session holds afterwards, which is the
    /// earlier one when two requests race.
    pub fn put(&self, session: &SessionId, principal: Principal) -> Principal {
        let stored = self.store.put_if_absent(session, PRINCIPAL_KEY, principal);
        log::debug!("session identity cached: {}", stored);
        stored
    }

    pub fn invalidate(&self, session: &SessionId) {
        log::debug!("session invalidated");
        self.store.invalidate(session);
    }

    /// A view of one session.
    pub fn session<'a>(&'a self, id: &'a SessionId) -> Session<'a> {
        Session { cache: self, id }
    }
}

impl Default for SessionIdentityCache {
    fn default() -> Self {
        SessionIdentityCache::new(Arc::new(MemorySessionStore::new()))
    }
}

impl fmt::Debug for SessionIdentityCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIdentityCache").finish()
    }
}

/// The identity slot of one session.
#[derive(Clone, Copy, Debug)]
pub struct Session<'a> {
    cache: &'a SessionIdentityCache,
    id: &'a SessionId,
}

impl<'a> Session<'a> {
    pub fn id(&self) -> &SessionId {
        self.id
    }

    pub fn get(&self) -> Option<Principal> {
        self.cache.get(self.id)
    }

    pub fn put(&self, principal: Principal) -> Principal {
        self.cache.put(self.id, principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_get_put_invalidate() {
        let cache = SessionIdentityCache::default();
        let id = SessionId::new("abc");

        assert!(cache.get(&id).is_none());
        cache.put(&id, Principal::new("alice"));
        assert_eq!(cache.get(&id).unwrap().name(), "alice");

        cache.invalidate(&id);
        assert!(cache.get(&id).is_none());
    }

    #[test]
    fn test_first_write_wins() {
        let cache = SessionIdentityCache::default();
        let id = SessionId::new("abc");

        let first = cache.put(&id, Principal::new("alice"));
        let second = cache.put(&id, Principal::new("mallory"));

        assert_eq!(first.name(), "alice");
        assert_eq!(second.name(), "alice");
    }

    #[test]
    fn test_sessions_are_partitioned() {
        let store = Arc::new(MemorySessionStore::new());
        let cache = SessionIdentityCache::new(store.clone());

        cache.put(&SessionId::new("one"), Principal::new("alice"));
        cache.put(&SessionId::new("two"), Principal::new("bob"));
        cache.invalidate(&SessionId::new("one"));

        assert_eq!(store.len(), 1);
        assert_eq!(cache.get(&SessionId::new("two")).unwrap().name(), "bob");
    }

    #[test]
    fn test_concurrent_puts_agree() {
        let cache = SessionIdentityCache::default();
        let id = SessionId::new("race");

        let winners: Vec<Principal> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let cache = &cache;
                    let id = &id;
                    s.spawn(move || cache.put(id, Principal::new(format!("user{}", i))))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let stored = cache.get(&id).unwrap();
        assert!(winners.iter().all(|w| w == &stored));
    }

    #[test]
    fn test_debug_truncates_id() {
        let id = SessionId::new("0123456789");
        assert_eq!(format!("{:?}", id), "SessionId(0123..)");
    }
}
