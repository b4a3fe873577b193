//! Lock store backends and local store selection.

pub mod file;
pub mod memory;

use std::path::Path;
use std::sync::Arc;

pub use file::FileLockStore;
pub use memory::InMemoryLockStore;

use crate::config::LocalStoreKind;
use crate::core::{LockStore, ScheduleError};
use crate::util::clock::Clock;

/// Build the host-local store.
///
/// `Auto` and `File` lock files under `lock_dir`, visible to every process on
/// the host. `Memory` only excludes runs within this process.
pub fn local_store(
    kind: LocalStoreKind,
    lock_dir: &Path,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn LockStore>, ScheduleError> {
    let store: Arc<dyn LockStore> = match kind {
        LocalStoreKind::Auto | LocalStoreKind::File => {
            Arc::new(FileLockStore::new(lock_dir, clock)?)
        }
        LocalStoreKind::Memory => Arc::new(InMemoryLockStore::new(clock)),
    };
    tracing::debug!(store = store.name(), dir = %lock_dir.display(), "selected local lock store");
    Ok(store)
}
