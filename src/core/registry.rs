//! Process-wide callback registry.
//!
//! A foreign-convention call carries no context beyond the receiver
//! address, so trampolines can only recover host-side state through a
//! process-wide map keyed by that address. An entry is inserted when a
//! callback object is built and removed when its reference count reaches
//! zero; any lookup after removal is a lifetime violation by the foreign
//! caller and fails closed.
//!
//! Lookups clone the entry's `Arc` and drop the lock before dispatching,
//! so application handlers never run under the registry lock and
//! insert/remove stay linearizable with trampoline lookups.

use std::sync::atomic::AtomicU32;
use std::sync::{Arc, Mutex, OnceLock};

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::core::callback::SlotHandler;
use crate::core::error::Result;
use crate::types::guid::Guid;

/// Host-side backing state for one callback object.
pub(crate) struct CallbackState {
    /// The method-table allocation the object header points into. Held
    /// here so it lives exactly as long as the registration.
    pub(crate) vtable: Box<[usize]>,
    /// Starts at 1: the single implicit reference held by the creator.
    pub(crate) ref_count: AtomicU32,
    /// Interface ids answered by QueryInterface beyond IUnknown.
    pub(crate) interfaces: Vec<Guid>,
    /// Application slot handlers, in vtable order after the base three.
    pub(crate) handlers: Vec<SlotHandler>,
}

static REGISTRY: OnceLock<Mutex<FxHashMap<usize, Arc<CallbackState>>>> = OnceLock::new();

fn global() -> &'static Mutex<FxHashMap<usize, Arc<CallbackState>>> {
    REGISTRY.get_or_init(|| Mutex::new(FxHashMap::default()))
}

pub(crate) fn register(address: usize, state: Arc<CallbackState>) -> Result<()> {
    let mut map = global().lock()?;
    let previous = map.insert(address, state);
    // A live entry under a freshly allocated address means the registry
    // no longer reflects reality; nothing can be trusted past this point.
    assert!(
        previous.is_none(),
        "callback registry corrupted: duplicate registration at {address:#x}"
    );
    debug!(address = address as u64, "callback object registered");
    Ok(())
}

/// Recovers the state for a trampoline's receiver address. `None` means
/// the address was never registered or was already destroyed.
pub(crate) fn lookup(address: usize) -> Option<Arc<CallbackState>> {
    let map = global().lock().ok()?;
    map.get(&address).cloned()
}

/// Removes an entry at refcount zero. Returns the state so the caller can
/// finish teardown; `None` means another path already removed it.
pub(crate) fn deregister(address: usize) -> Option<Arc<CallbackState>> {
    let mut map = global().lock().ok()?;
    let state = map.remove(&address);
    if state.is_some() {
        debug!(address = address as u64, "callback object deregistered");
    }
    state
}

/// Whether `address` currently backs a live callback object.
pub fn contains(address: usize) -> bool {
    global().lock().map(|m| m.contains_key(&address)).unwrap_or(false)
}

/// Number of live callback objects in the process.
pub fn live_objects() -> usize {
    global().lock().map(|m| m.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    fn state() -> Arc<CallbackState> {
        Arc::new(CallbackState {
            vtable: Vec::new().into_boxed_slice(),
            ref_count: AtomicU32::new(1),
            interfaces: Vec::new(),
            handlers: Vec::new(),
        })
    }

    #[test]
    fn insert_lookup_remove_lifecycle() {
        let address = 0xf00d_0000;
        register(address, state()).unwrap();
        assert!(contains(address));

        let found = lookup(address).expect("registered entry");
        assert_eq!(found.ref_count.load(Ordering::Relaxed), 1);

        assert!(deregister(address).is_some());
        assert!(!contains(address));
        assert!(lookup(address).is_none());
    }

    #[test]
    fn deregister_is_idempotent_per_entry() {
        let address = 0xf00d_1000;
        register(address, state()).unwrap();
        assert!(deregister(address).is_some());
        assert!(deregister(address).is_none());
    }

    #[test]
    fn unknown_addresses_miss() {
        assert!(lookup(0xdead_beef).is_none());
        assert!(!contains(0xdead_beef));
    }
}
