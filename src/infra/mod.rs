//! Infrastructure adapters: lock store backends.

pub mod lock;

pub use lock::{local_store, FileLockStore, InMemoryLockStore};
