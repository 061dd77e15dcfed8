//! Per-model mutual exclusion for read-modify-write sequences.
//!
//! Slots are created on demand and dropped again once the last guard or
//! waiter for an id is gone, so the map only holds ids in use.

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
}

/// Guard for one model id; the lock is released when it drops.
pub struct ModelGuard<'a> {
    locks: &'a KeyedLocks,
    id: u64,
    held: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl KeyedLocks {
    pub fn new() -> Self { Self::default() }

    /// Blocks until no other holder exists for `id`.
    pub fn lock(&self, id: u64) -> ModelGuard<'_> {
        let slot = self.slots.lock().entry(id).or_default().clone();
        ModelGuard { locks: self, id, held: Some(slot.lock_arc()) }
    }

    #[cfg(test)]
    pub fn tracked(&self) -> usize { self.slots.lock().len() }
}

impl Drop for ModelGuard<'_> {
    fn drop(&mut self) {
        drop(self.held.take());
        let mut slots = self.locks.slots.lock();
        // Waiters clone the slot under `slots`, so a count of 1 means the map
        // holds the only reference.
        if slots.get(&self.id).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn same_id_is_serialized() {
        let locks = Arc::new(KeyedLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let (locks, inside, max_seen) = (locks.clone(), inside.clone(), max_seen.clone());
                thread::spawn(move || {
                    let _g = locks.lock(9);
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn different_ids_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.lock(1);
        let _b = locks.lock(2);
        assert_eq!(locks.tracked(), 2);
    }

    #[test]
    fn released_slots_are_dropped() {
        let locks = KeyedLocks::new();
        for id in 0..50 {
            drop(locks.lock(id));
        }
        assert_eq!(locks.tracked(), 0);

        let held = locks.lock(3);
        drop(locks.lock(4));
        assert_eq!(locks.tracked(), 1);
        drop(held);
        assert_eq!(locks.tracked(), 0);
    }

    #[test]
    fn slot_survives_while_a_waiter_is_queued() {
        let locks = Arc::new(KeyedLocks::new());
        let first = locks.lock(8);
        let waiter = {
            let locks = locks.clone();
            thread::spawn(move || {
                let _g = locks.lock(8);
            })
        };
        // map + held guard + queued waiter
        while Arc::strong_count(&locks.slots.lock()[&8]) < 3 {
            thread::sleep(Duration::from_millis(1));
        }
        drop(first);
        waiter.join().unwrap();
        assert_eq!(locks.tracked(), 0);
    }

    #[test]
    fn guard_release_allows_relock() {
        let locks = KeyedLocks::new();
        drop(locks.lock(4));
        let _again = locks.lock(4);
    }
}
