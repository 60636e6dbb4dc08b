//! Per-(session, user) state with idle eviction.
//!
//! Every stateful pipeline component keeps its state in one of these stores
//! so that sessions never see each other's data and memory can be bounded
//! by sweeping idle keys.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey {
    session: String,
    user: String,
}

impl SessionKey {
    pub fn new(session: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            user: user.into(),
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn user(&self) -> &str {
        &self.user
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.session, self.user)
    }
}

/// Decides when a key's state may be dropped.
pub trait EvictionPolicy: Send + Sync {
    fn should_evict(&self, last_seen: Instant, now: Instant) -> bool;
}

/// Keeps state for the life of the process.
pub struct NeverEvict;

impl EvictionPolicy for NeverEvict {
    fn should_evict(&self, _last_seen: Instant, _now: Instant) -> bool {
        false
    }
}

/// Drops state untouched for at least `timeout`.
pub struct IdleTimeout {
    timeout: Duration,
}

impl IdleTimeout {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl EvictionPolicy for IdleTimeout {
    fn should_evict(&self, last_seen: Instant, now: Instant) -> bool {
        now.saturating_duration_since(last_seen) >= self.timeout
    }
}

struct Entry<T> {
    value: T,
    last_seen: Instant,
}

pub struct SessionStore<T> {
    entries: Mutex<HashMap<SessionKey, Entry<T>>>,
    policy: Arc<dyn EvictionPolicy>,
}

impl<T: Default> SessionStore<T> {
    pub fn new(policy: Arc<dyn EvictionPolicy>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            policy,
        }
    }

    /// Runs `f` on the key's state, creating it on first use.
    pub fn with_entry<R>(&self, key: &SessionKey, f: impl FnOnce(&mut T) -> R) -> R {
        let now = Instant::now();
        let mut entries = self.lock();
        let entry = entries.entry(key.clone()).or_insert_with(|| Entry {
            value: T::default(),
            last_seen: now,
        });
        entry.last_seen = now;
        f(&mut entry.value)
    }

    /// Reads existing state without creating or touching it.
    pub fn peek<R>(&self, key: &SessionKey, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.lock().get(key).map(|e| f(&e.value))
    }

    pub fn remove(&self, key: &SessionKey) -> Option<T> {
        self.lock().remove(key).map(|e| e.value)
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry the policy considers idle at `now`.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| !self.policy.should_evict(e.last_seen, now));
        before - entries.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionKey, Entry<T>>> {
        // A panic while holding the lock leaves plain data behind; keep serving.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T: Default> Default for SessionStore<T> {
    fn default() -> Self {
        Self::new(Arc::new(NeverEvict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> SessionKey {
        SessionKey::new(s, "alice")
    }

    #[test]
    fn test_entry_created_lazily() {
        let store: SessionStore<Vec<u32>> = SessionStore::default();
        assert!(store.is_empty());
        store.with_entry(&key("a"), |v| v.push(1));
        assert_eq!(store.len(), 1);
        assert_eq!(store.peek(&key("a"), |v| v.clone()), Some(vec![1]));
    }

    #[test]
    fn test_keys_are_independent() {
        let store: SessionStore<u32> = SessionStore::default();
        store.with_entry(&key("a"), |v| *v += 5);
        store.with_entry(&SessionKey::new("a", "bob"), |v| *v += 1);
        assert_eq!(store.peek(&key("a"), |v| *v), Some(5));
        assert_eq!(store.peek(&SessionKey::new("a", "bob"), |v| *v), Some(1));
    }

    #[test]
    fn test_peek_does_not_create() {
        let store: SessionStore<u32> = SessionStore::default();
        assert_eq!(store.peek(&key("a"), |v| *v), None);
        assert!(!store.contains(&key("a")));
    }

    #[test]
    fn test_never_evict_keeps_entries() {
        let store: SessionStore<u32> = SessionStore::default();
        store.with_entry(&key("a"), |_| ());
        let later = Instant::now() + Duration::from_secs(3600);
        assert_eq!(store.evict_idle(later), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_idle_timeout_evicts_stale_entries() {
        let policy = Arc::new(IdleTimeout::new(Duration::from_secs(60)));
        let store: SessionStore<u32> = SessionStore::new(policy);
        store.with_entry(&key("a"), |_| ());
        store.with_entry(&key("b"), |_| ());

        assert_eq!(store.evict_idle(Instant::now()), 0);
        let later = Instant::now() + Duration::from_secs(120);
        assert_eq!(store.evict_idle(later), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_returns_state() {
        let store: SessionStore<u32> = SessionStore::default();
        store.with_entry(&key("a"), |v| *v = 9);
        assert_eq!(store.remove(&key("a")), Some(9));
        assert!(!store.contains(&key("a")));
    }

    #[test]
    fn test_display_joins_session_and_user() {
        assert_eq!(SessionKey::new("room1", "bob").to_string(), "room1:bob");
    }
}
