//! In-memory lock table.
//!
//! Shared through an `Arc`, one instance can stand in for a distributed store
//! when every "host" lives in the same process (tests, single-node setups).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::{LockStore, LockToken, ScheduleError};
use crate::util::clock::Clock;

/// Lock store keeping tokens in a mutex-guarded map.
#[derive(Debug)]
pub struct InMemoryLockStore {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, LockToken>>,
}

impl InMemoryLockStore {
    /// Create an empty store reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live entries.
    pub fn held(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .lock()
            .values()
            .filter(|token| !token.is_expired(now))
            .count()
    }
}

impl LockStore for InMemoryLockStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn try_acquire(&self, key: &str, ttl_secs: u64) -> Result<Option<LockToken>, ScheduleError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        if let Some(current) = entries.get(key) {
            if !current.is_expired(now) {
                return Ok(None);
            }
            tracing::debug!(key, owner = %current.owner, "evicting expired lock");
        }
        let token = LockToken::issue(key, now, ttl_secs);
        entries.insert(key.to_string(), token.clone());
        Ok(Some(token))
    }

    fn release(&self, token: &LockToken) -> Result<(), ScheduleError> {
        let mut entries = self.entries.lock();
        if entries
            .get(&token.key)
            .is_some_and(|current| current.owner == token.owner)
        {
            entries.remove(&token.key);
        }
        Ok(())
    }

    fn is_locked(&self, key: &str) -> Result<bool, ScheduleError> {
        let now = self.clock.now();
        Ok(self
            .entries
            .lock()
            .get(key)
            .is_some_and(|token| !token.is_expired(now)))
    }
}
