//! Game lock table: a process-wide map from object identity to a
//! per-object readers-preferred lock (spec §4.10), grounded on
//! `original_source/src/gamelock.h`'s `pok_game_modify_enter/exit` /
//! `pok_game_lock/unlock` and the teacher's closure-based `with`/`with_mut`
//! access pattern in `server/src/network_manager.rs`.
//!
//! `parking_lot::RwLock` already implements the readers-preferred
//! discipline spec §4.10 describes (multiple concurrent readers, an
//! exclusive writer, locks created lazily under a global lock) — see
//! DESIGN.md's Open Question resolution for why we don't hand-roll a
//! mutex + counter + condvar here. Access is closure-scoped rather than
//! guard-returning so the per-object lock never needs to outlive this
//! module in an unsafe way.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Stable identity for a lockable object: the address of whatever owns
/// it, as a `usize` (so the table can be keyed in a `BTreeMap` without
/// requiring `Hash` on arbitrary game objects).
pub type ObjectKey = usize;

pub fn key_of<T>(ptr: &T) -> ObjectKey {
    ptr as *const T as usize
}

#[derive(Default)]
pub struct GameLockTable {
    locks: Mutex<BTreeMap<ObjectKey, Arc<RwLock<()>>>>,
}

impl GameLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: ObjectKey) -> Arc<RwLock<()>> {
        let mut table = self.locks.lock();
        table
            .entry(key)
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Exclusive writer section (`modify_enter`/`modify_exit` collapsed
    /// into one scoped call).
    pub fn modify<R>(&self, key: ObjectKey, f: impl FnOnce() -> R) -> R {
        let lock = self.lock_for(key);
        let _guard = lock.write();
        f()
    }

    /// Shared reader section (multiple readers, no writer).
    pub fn read<R>(&self, key: ObjectKey, f: impl FnOnce() -> R) -> R {
        let lock = self.lock_for(key);
        let _guard = lock.read();
        f()
    }

    pub fn known_object_count(&self) -> usize {
        self.locks.lock().len()
    }
}
