//! Named, TTL-bounded exclusive locks.
//!
//! A [`LockStore`] is the persistence capability (local or distributed). A
//! [`Lock`] is one acquired lease on a key; it is released explicitly by the
//! owning locking extension and, as a backstop, when dropped.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ScheduleError;

/// Default lock lifetime in seconds.
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Proof of ownership returned by a store on successful acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockToken {
    /// Namespaced lock key.
    pub key: String,
    /// Random owner id; release only succeeds for the matching owner.
    pub owner: String,
    /// Acquisition instant.
    pub acquired_at: DateTime<Utc>,
    /// Instant after which the lock is considered stale.
    pub expires_at: DateTime<Utc>,
}

impl LockToken {
    /// Create a token for a fresh acquisition at `now`.
    pub fn issue(key: &str, now: DateTime<Utc>, ttl_secs: u64) -> Self {
        Self {
            key: key.to_string(),
            owner: uuid::Uuid::new_v4().to_string(),
            acquired_at: now,
            expires_at: expiry(now, ttl_secs),
        }
    }

    /// Whether the token has outlived its TTL at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Compute `now + ttl_secs`, saturating instead of overflowing.
pub fn expiry(now: DateTime<Utc>, ttl_secs: u64) -> DateTime<Utc> {
    i64::try_from(ttl_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Persistence backend for named exclusive locks.
///
/// Implementations must never block: contention is reported as `Ok(None)`.
pub trait LockStore: Send + Sync + fmt::Debug {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Try to take `key` for `ttl_secs`. Stale (expired) holders are evicted.
    fn try_acquire(&self, key: &str, ttl_secs: u64) -> Result<Option<LockToken>, ScheduleError>;

    /// Release a previously acquired lock.
    ///
    /// Idempotent: releasing an unknown, expired or re-acquired key is a no-op.
    fn release(&self, token: &LockToken) -> Result<(), ScheduleError>;

    /// Whether a live (non-expired) lock currently exists for `key`.
    fn is_locked(&self, key: &str) -> Result<bool, ScheduleError>;
}

/// An acquired lock lease.
pub struct Lock {
    token: LockToken,
    ttl_secs: u64,
    store: Arc<dyn LockStore>,
    released: AtomicBool,
}

impl Lock {
    /// Non-blocking acquisition. Returns `Ok(None)` when the key is held.
    pub fn acquire(
        store: &Arc<dyn LockStore>,
        key: &str,
        ttl_secs: u64,
    ) -> Result<Option<Self>, ScheduleError> {
        let token = store.try_acquire(key, ttl_secs)?;
        Ok(token.map(|token| Self {
            token,
            ttl_secs,
            store: Arc::clone(store),
            released: AtomicBool::new(false),
        }))
    }

    /// Lock key.
    pub fn key(&self) -> &str {
        &self.token.key
    }

    /// Configured lifetime.
    pub const fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Acquisition instant.
    pub const fn acquired_at(&self) -> DateTime<Utc> {
        self.token.acquired_at
    }

    /// Ownership token.
    pub const fn token(&self) -> &LockToken {
        &self.token
    }

    /// Whether `release` already ran.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Release the lease. Subsequent calls are no-ops.
    pub fn release(&self) -> Result<(), ScheduleError> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::debug!(key = %self.token.key, store = self.store.name(), "releasing lock");
        self.store.release(&self.token)
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("key", &self.token.key)
            .field("ttl_secs", &self.ttl_secs)
            .field("store", &self.store.name())
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::warn!(key = %self.token.key, error = %err, "failed to release lock on drop");
        }
    }
}
