//! Behavior shared by every lock store backend

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{TimeZone, Utc};
use prometheus_schedule::core::{Lock, LockStore};
use prometheus_schedule::infra::lock::{FileLockStore, InMemoryLockStore};
use prometheus_schedule::util::clock::SystemClock;
use prometheus_schedule::util::clock::ManualClock;

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()))
}

/// Every backend, plus the directory backing the file store.
fn stores(clock: &Arc<ManualClock>) -> (tempfile::TempDir, Vec<Arc<dyn LockStore>>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let stores: Vec<Arc<dyn LockStore>> = vec![
        Arc::new(InMemoryLockStore::new(clock.clone())),
        Arc::new(FileLockStore::new(dir.path(), clock.clone()).unwrap()),
    ];
    (dir, stores)
}

#[test]
fn test_acquire_is_exclusive_until_release() {
    let clock = clock();
    let (_dir, stores) = stores(&clock);
    for store in stores {
        let token = store.try_acquire("without_overlapping:abc", 60).unwrap().unwrap();
        assert!(store.is_locked("without_overlapping:abc").unwrap(), "{}", store.name());
        assert!(store.try_acquire("without_overlapping:abc", 60).unwrap().is_none(), "{}", store.name());
        // other keys are independent
        assert!(store.try_acquire("without_overlapping:def", 60).unwrap().is_some(), "{}", store.name());

        store.release(&token).unwrap();
        assert!(!store.is_locked("without_overlapping:abc").unwrap(), "{}", store.name());
        assert!(store.try_acquire("without_overlapping:abc", 60).unwrap().is_some(), "{}", store.name());
    }
}

#[test]
fn test_expired_lock_can_be_taken_over() {
    let clock = clock();
    let (_dir, stores) = stores(&clock);
    for store in stores {
        let stale = store.try_acquire("job", 60).unwrap().unwrap();
        clock.advance(chrono::Duration::seconds(59));
        assert!(store.try_acquire("job", 60).unwrap().is_none(), "{}", store.name());

        clock.advance(chrono::Duration::seconds(1));
        assert!(!store.is_locked("job").unwrap(), "{}", store.name());
        let fresh = store.try_acquire("job", 60).unwrap().unwrap();
        assert_ne!(stale.owner, fresh.owner);

        // the stale holder releasing late must not free the new holder
        store.release(&stale).unwrap();
        assert!(store.is_locked("job").unwrap(), "{}", store.name());
        store.release(&fresh).unwrap();
    }
}

#[test]
fn test_release_is_idempotent() {
    let clock = clock();
    let (_dir, stores) = stores(&clock);
    for store in stores {
        let token = store.try_acquire("job", 60).unwrap().unwrap();
        store.release(&token).unwrap();
        store.release(&token).unwrap();
        assert!(!store.is_locked("job").unwrap(), "{}", store.name());
    }
}

#[test]
fn test_lock_guard_releases_on_drop() {
    let clock = clock();
    let (_dir, stores) = stores(&clock);
    for store in stores {
        {
            let lock = Lock::acquire(&store, "guarded", 60).unwrap().unwrap();
            assert_eq!(lock.key(), "guarded");
            assert!(Lock::acquire(&store, "guarded", 60).unwrap().is_none(), "{}", store.name());
        }
        assert!(!store.is_locked("guarded").unwrap(), "{}", store.name());
    }
}

#[test]
fn test_explicit_release_then_drop_releases_once() {
    let clock = clock();
    let (_dir, stores) = stores(&clock);
    for store in stores {
        let lock = Lock::acquire(&store, "once", 60).unwrap().unwrap();
        lock.release().unwrap();
        assert!(lock.is_released());

        // someone else takes the key; dropping the old guard must not free it
        let next = store.try_acquire("once", 60).unwrap().unwrap();
        drop(lock);
        assert!(store.is_locked("once").unwrap(), "{}", store.name());
        store.release(&next).unwrap();
    }
}

// ============================================================================
// File store shared between independent instances
// ============================================================================

#[test]
fn test_file_store_instances_exclude_each_other_under_contention() {
    const CONTENDERS: usize = 8;
    const ROUNDS: usize = 200;

    let dir = tempfile::tempdir().expect("tempdir");
    for round in 0..ROUNDS {
        let key = format!("without_overlapping:round-{round}");
        let barrier = Arc::new(Barrier::new(CONTENDERS));
        let handles: Vec<_> = (0..CONTENDERS)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let path = dir.path().to_path_buf();
                let key = key.clone();
                thread::spawn(move || {
                    // one store per thread, as separate scheduler processes would have
                    let store = FileLockStore::new(&path, Arc::new(SystemClock)).unwrap();
                    barrier.wait();
                    let token = store.try_acquire(&key, 60).unwrap();
                    // hold until every contender has tried
                    barrier.wait();
                    token.is_some()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1, "round {round}");
    }
}

#[test]
fn test_file_store_keys_do_not_collide_after_sanitising() {
    let clock = clock();
    let dir = tempfile::tempdir().expect("tempdir");
    let first = FileLockStore::new(dir.path(), clock.clone()).unwrap();
    let second = FileLockStore::new(dir.path(), clock).unwrap();

    let token = first.try_acquire("single_server:a:b", 60).unwrap().unwrap();
    assert!(second.try_acquire("single_server:a_b", 60).unwrap().is_some());
    assert!(!second.is_locked("single_server:a.b").unwrap());
    assert!(second.try_acquire("single_server:a:b", 60).unwrap().is_none());
    first.release(&token).unwrap();
}
