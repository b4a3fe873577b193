//! Advisory lock files.
//!
//! Each key maps to a `<key>-<digest>.lock` file under a shared directory. A
//! lock is an exclusive OS advisory lock (`flock` / `LockFileEx`) on that
//! file, so every process on the host sharing the directory observes it and
//! the kernel frees it when the holder exits. The file body carries the JSON
//! token for diagnostics only. Files are never unlinked: removing a locked
//! path would let a second holder lock a fresh inode under the same name.
//!
//! TTL expiry is enforced for leases held through this store instance. A
//! lease held by another live process stays held until that process releases
//! it or exits.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::core::{LockStore, LockToken, ScheduleError};
use crate::util::clock::Clock;

/// Lock store backed by one advisory-locked file per key.
#[derive(Debug)]
pub struct FileLockStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
    held: Mutex<HashMap<String, (LockToken, File)>>,
}

impl FileLockStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self, ScheduleError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| backend(&dir, &e))?;
        Ok(Self {
            dir,
            clock,
            held: Mutex::new(HashMap::new()),
        })
    }

    /// Default lock directory under the system temp dir.
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join("prometheus-schedule-locks")
    }

    /// Directory holding the lock files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lock file for `key`: a readable prefix plus a digest of the full key.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let readable: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        let digest = format!("{:x}", Sha256::digest(key.as_bytes()));
        self.dir.join(format!("{readable}-{}.lock", &digest[..16]))
    }

    fn open(path: &Path) -> Result<File, ScheduleError> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| backend(path, &e))
    }

    /// Take the OS lock on `path`. `None` means another holder has it.
    fn lock_file(path: &Path) -> Result<Option<File>, ScheduleError> {
        let file = Self::open(path)?;
        match file.try_lock() {
            Ok(()) => Ok(Some(file)),
            Err(TryLockError::WouldBlock) => Ok(None),
            Err(TryLockError::Error(e)) => Err(backend(path, &e)),
        }
    }

    fn write_token(path: &Path, file: &mut File, token: &LockToken) -> Result<(), ScheduleError> {
        let body = serde_json::to_vec(token).map_err(|e| ScheduleError::Backend(e.to_string()))?;
        file.set_len(0)
            .and_then(|()| file.write_all(&body))
            .map_err(|e| backend(path, &e))
    }
}

impl LockStore for FileLockStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn try_acquire(&self, key: &str, ttl_secs: u64) -> Result<Option<LockToken>, ScheduleError> {
        let now = self.clock.now();
        let mut held = self.held.lock();

        if let Some((current, _)) = held.get(key) {
            if !current.is_expired(now) {
                return Ok(None);
            }
            tracing::debug!(key, owner = %current.owner, "dropping expired file lock");
            // dropping the handle unlocks the file
            held.remove(key);
        }

        let path = self.path_for(key);
        let Some(mut file) = Self::lock_file(&path)? else {
            return Ok(None);
        };
        let token = LockToken::issue(key, now, ttl_secs);
        Self::write_token(&path, &mut file, &token)?;
        held.insert(key.to_string(), (token.clone(), file));
        Ok(Some(token))
    }

    fn release(&self, token: &LockToken) -> Result<(), ScheduleError> {
        let mut held = self.held.lock();
        if held
            .get(&token.key)
            .is_some_and(|(current, _)| current.owner == token.owner)
        {
            if let Some((_, file)) = held.remove(&token.key) {
                let path = self.path_for(&token.key);
                file.set_len(0)
                    .and_then(|()| file.unlock())
                    .map_err(|e| backend(&path, &e))?;
            }
        }
        Ok(())
    }

    fn is_locked(&self, key: &str) -> Result<bool, ScheduleError> {
        let now = self.clock.now();
        if let Some((current, _)) = self.held.lock().get(key) {
            return Ok(!current.is_expired(now));
        }

        let path = self.path_for(key);
        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(backend(&path, &e)),
        };
        match file.try_lock() {
            Ok(()) => {
                file.unlock().map_err(|e| backend(&path, &e))?;
                Ok(false)
            }
            Err(TryLockError::WouldBlock) => Ok(true),
            Err(TryLockError::Error(e)) => Err(backend(&path, &e)),
        }
    }
}

fn backend(path: &Path, err: &std::io::Error) -> ScheduleError {
    ScheduleError::Backend(format!("{}: {err}", path.display()))
}
