//! Process-wide `u32 id -> NetObj` registry (spec §4.4), grounded on
//! `original_source/src/netobj.h`'s global netobj database and the
//! teacher's `NetworkManager::with`/`with_mut` `OnceLock` pattern
//! (`server/src/network_manager.rs`) for exposing process-wide state as a
//! typed handle rather than a bare `static mut`.

use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::error::{ErrorKind, NetObjError, PokError};

/// Marker trait for anything with a protocol-visible 32-bit identity.
/// `netread` on a concrete type reads the id as its first field and
/// inserts itself into the registry via [`NetObjRegistry::insert`].
pub trait NetObj {
    fn netobj_id(&self) -> u32;
}

#[derive(Default)]
struct RegistryState {
    next_local_id: u32,
    live: HashMap<u32, ()>,
}

/// The process-wide registry. We don't store trait objects here (the
/// concrete owners — chunks, catalogs — live in their natural owning
/// structures); the registry's job per §4.4 is solely to police id
/// uniqueness and hand out fresh local ids.
pub struct NetObjRegistry {
    state: Mutex<RegistryState>,
}

impl NetObjRegistry {
    fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                next_local_id: 1,
                live: HashMap::new(),
            }),
        }
    }

    /// Registers `id`, failing with `NetObj::BadId` if it is 0 (the unused
    /// sentinel) or already live.
    pub fn register(&self, id: u32) -> Result<(), PokError> {
        if id == 0 {
            return Err(PokError::new(
                ErrorKind::NetObj(NetObjError::BadId),
                "id 0 is reserved (unused)",
            ));
        }
        let mut state = self.state.lock();
        if state.live.insert(id, ()).is_some() {
            state.live.remove(&id);
            return Err(PokError::new(
                ErrorKind::NetObj(NetObjError::BadId),
                format!("duplicate netobj id {id}"),
            ));
        }
        Ok(())
    }

    /// Mints a fresh monotonic local id and registers it.
    pub fn allocate(&self) -> u32 {
        let mut state = self.state.lock();
        loop {
            let id = state.next_local_id;
            state.next_local_id = state.next_local_id.wrapping_add(1).max(1);
            if state.live.insert(id, ()).is_none() {
                return id;
            }
        }
    }

    pub fn unregister(&self, id: u32) {
        self.state.lock().live.remove(&id);
    }

    pub fn is_live(&self, id: u32) -> bool {
        self.state.lock().live.contains_key(&id)
    }
}

static REGISTRY: OnceLock<NetObjRegistry> = OnceLock::new();

/// The single process-wide registry, initialized lazily on first access
/// (Design Notes §9: expose global state as a typed handle, not a true
/// global).
pub fn registry() -> &'static NetObjRegistry {
    REGISTRY.get_or_init(NetObjRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_id_is_rejected() {
        let reg = NetObjRegistry::new();
        reg.register(42).unwrap();
        assert!(reg.register(42).is_err());
    }

    #[test]
    fn zero_id_is_rejected() {
        let reg = NetObjRegistry::new();
        assert!(reg.register(0).is_err());
    }

    #[test]
    fn allocate_is_monotonic_and_unique() {
        let reg = NetObjRegistry::new();
        let a = reg.allocate();
        let b = reg.allocate();
        assert!(b > a);
        assert!(reg.is_live(a));
        assert!(reg.is_live(b));
    }

    #[test]
    fn unregister_frees_the_id() {
        let reg = NetObjRegistry::new();
        reg.register(7).unwrap();
        reg.unregister(7);
        assert!(!reg.is_live(7));
        reg.register(7).unwrap();
    }
}
