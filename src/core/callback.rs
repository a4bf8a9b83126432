//! Host-implemented foreign objects.
//!
//! [`CallbackBuilder`] synthesizes, at run time, a block of memory laid
//! out exactly like a foreign object: offset zero holds a pointer to an
//! ordered table of function-pointer slots. Foreign code, which only ever
//! deals in raw addresses and vtables, cannot distinguish the result from
//! a natively implemented object.
//!
//! Slots 0-2 are trampolines for QueryInterface/AddRef/Release; the
//! remaining slots are one trampoline per application method. A
//! trampoline's only job is to take the receiver address it was handed,
//! recover host state through the [`registry`], and dispatch. If the
//! lookup fails the call fails closed with an error status; the address
//! is never dereferenced.
//!
//! Application methods follow the delegate convention used throughout the
//! consumed catalog: receiver plus two machine-word arguments, returning
//! a status. Event handlers (`Invoke(sender, args)`) and async completion
//! handlers (`Invoke(operation, status)`) both have this shape.

use std::ffi::c_void;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::warn;

use crate::core::error::{Error, Result};
use crate::core::handle::ObjectHandle;
use crate::core::registry::{self, CallbackState};
use crate::types::guid::{Guid, IID_IUNKNOWN};
use crate::types::hresult::HResult;

/// Most application slots a single callback object may expose.
pub const MAX_APP_SLOTS: usize = 8;

/// One invocation of an application slot, as seen by its handler.
pub struct SlotCall {
    /// The callback object the foreign side invoked.
    pub object: ObjectHandle,
    /// The two trailing machine words, uninterpreted. Pointer arguments
    /// arrive as addresses; by-value words (e.g. an async status) arrive
    /// as the word itself.
    pub args: [usize; 2],
}

pub type SlotHandlerFn = dyn Fn(&SlotCall) -> HResult + Send + Sync;
pub type SlotHandler = Arc<SlotHandlerFn>;

/// Object header: foreign code reads the method-table pointer from offset
/// zero and nothing else.
#[repr(C)]
struct ObjectHeader {
    vtable: *const usize,
}

const _: () = assert!(size_of::<ObjectHeader>() == size_of::<usize>());
const _: () = assert!(align_of::<ObjectHeader>() == align_of::<usize>());
const _: () = assert!(size_of::<extern "system" fn(*mut c_void) -> u32>() == size_of::<usize>());

/// Builder for a host-implemented foreign object.
#[derive(Default)]
pub struct CallbackBuilder {
    interfaces: Vec<Guid>,
    handlers: Vec<SlotHandler>,
}

impl CallbackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an interface id QueryInterface answers for, beyond the
    /// always-accepted IUnknown.
    pub fn interface(mut self, iid: Guid) -> Self {
        self.interfaces.push(iid);
        self
    }

    /// Appends one application method; slots are assigned in call order,
    /// starting right after Release.
    pub fn method(
        mut self,
        handler: impl Fn(&SlotCall) -> HResult + Send + Sync + 'static,
    ) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Allocates the object and its method table, installs the
    /// trampolines, registers the address, and hands back the creator's
    /// reference (count starts at 1).
    pub fn build(self) -> Result<CallbackObject> {
        if self.handlers.len() > MAX_APP_SLOTS {
            return Err(Error::TooManyMethods {
                given: self.handlers.len(),
                max: MAX_APP_SLOTS,
            });
        }

        let mut vtable = Vec::with_capacity(3 + self.handlers.len());
        vtable.push(query_interface_trampoline as usize);
        vtable.push(add_ref_trampoline as usize);
        vtable.push(release_trampoline as usize);
        for slot in 0..self.handlers.len() {
            vtable.push(APP_TRAMPOLINES[slot] as usize);
        }
        let vtable = vtable.into_boxed_slice();

        let header = Box::new(ObjectHeader {
            vtable: vtable.as_ptr(),
        });
        let address = Box::into_raw(header) as usize;

        let state = Arc::new(CallbackState {
            vtable,
            ref_count: AtomicU32::new(1),
            interfaces: self.interfaces,
            handlers: self.handlers,
        });
        registry::register(address, state)?;

        Ok(CallbackObject {
            handle: ObjectHandle::from_address(address),
        })
    }
}

/// A live host-implemented foreign object.
///
/// Holds the creator's single implicit reference and releases it on drop.
/// The object itself survives as long as any reference, host or foreign,
/// remains; the backing memory is torn down when the count reaches zero.
#[derive(Debug)]
pub struct CallbackObject {
    handle: ObjectHandle,
}

impl CallbackObject {
    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    pub fn address(&self) -> usize {
        self.handle.address()
    }

    /// Current reference count, or `None` once destroyed.
    pub fn ref_count(&self) -> Option<u32> {
        ref_count_of(self.handle).ok()
    }

    /// Gives up the creator's reference without releasing it; the caller
    /// (typically foreign code) now owns it.
    pub fn into_handle(self) -> ObjectHandle {
        let handle = self.handle;
        std::mem::forget(self);
        handle
    }
}

impl Drop for CallbackObject {
    fn drop(&mut self) {
        release_address(self.handle.address());
    }
}

/// Reference count of a live callback object. [`Error::InvalidHandle`]
/// once the address is deregistered or was never one of ours.
pub fn ref_count_of(handle: ObjectHandle) -> Result<u32> {
    registry::lookup(handle.address())
        .map(|state| state.ref_count.load(Ordering::Acquire))
        .ok_or(Error::InvalidHandle {
            address: handle.address(),
        })
}

/// AddRef on a registered address. Shared by the trampoline and host-side
/// owners.
pub(crate) fn add_ref_address(address: usize) -> u32 {
    match registry::lookup(address) {
        Some(state) => state.ref_count.fetch_add(1, Ordering::Relaxed) + 1,
        None => {
            warn!(address = address as u64, "AddRef on unregistered callback object");
            0
        }
    }
}

/// Release on a registered address; tears the object down at zero.
pub(crate) fn release_address(address: usize) -> u32 {
    let Some(state) = registry::lookup(address) else {
        warn!(address = address as u64, "Release on unregistered callback object");
        return 0;
    };
    let previous = state.ref_count.fetch_sub(1, Ordering::AcqRel);
    match previous {
        1 => {
            // Exactly one thread observes the 1 -> 0 transition; the
            // registry removal below can therefore only succeed once.
            if registry::deregister(address).is_some() {
                // Reclaim the header allocated in `build`. The method
                // table is freed with the state once the last Arc clone
                // drops.
                unsafe { drop(Box::from_raw(address as *mut ObjectHeader)) };
            }
            0
        }
        // A racing foreign over-release lost to the thread that saw the
        // 1 -> 0 transition and owns teardown. Report dead, never wrap.
        0 => {
            warn!(address = address as u64, "Release past zero on callback object");
            0
        }
        n => n - 1,
    }
}

extern "system" fn query_interface_trampoline(
    this: *mut c_void,
    riid: *const Guid,
    out: *mut *mut c_void,
) -> i32 {
    if out.is_null() {
        return HResult::POINTER.code();
    }
    unsafe { *out = std::ptr::null_mut() };
    if this.is_null() || riid.is_null() {
        return HResult::INVALID_ARG.code();
    }
    let Some(state) = registry::lookup(this as usize) else {
        warn!(
            address = this as u64,
            "QueryInterface on unregistered callback object"
        );
        return HResult::INVALID_ARG.code();
    };
    let iid = unsafe { *riid };
    if iid == IID_IUNKNOWN || state.interfaces.contains(&iid) {
        // The negotiated view is the same address; hand out a fresh
        // reference with it.
        state.ref_count.fetch_add(1, Ordering::Relaxed);
        unsafe { *out = this };
        HResult::OK.code()
    } else {
        HResult::NO_INTERFACE.code()
    }
}

extern "system" fn add_ref_trampoline(this: *mut c_void) -> u32 {
    if this.is_null() {
        return 0;
    }
    add_ref_address(this as usize)
}

extern "system" fn release_trampoline(this: *mut c_void) -> u32 {
    if this.is_null() {
        return 0;
    }
    release_address(this as usize)
}

extern "system" fn app_trampoline<const SLOT: usize>(
    this: *mut c_void,
    arg0: usize,
    arg1: usize,
) -> i32 {
    let Some(state) = registry::lookup(this as usize) else {
        warn!(
            address = this as u64,
            slot = SLOT as u64,
            "application slot invoked on unregistered callback object"
        );
        return HResult::INVALID_ARG.code();
    };
    let Some(handler) = state.handlers.get(SLOT) else {
        return HResult::NOT_IMPL.code();
    };
    let call = SlotCall {
        object: ObjectHandle::from_address(this as usize),
        args: [arg0, arg1],
    };
    // A panic must not unwind into foreign code.
    match catch_unwind(AssertUnwindSafe(|| handler.as_ref()(&call))) {
        Ok(hr) => hr.code(),
        Err(_) => {
            warn!(slot = SLOT as u64, "application slot handler panicked");
            HResult::FAIL.code()
        }
    }
}

type AppTrampoline = extern "system" fn(*mut c_void, usize, usize) -> i32;

const APP_TRAMPOLINES: [AppTrampoline; MAX_APP_SLOTS] = [
    app_trampoline::<0>,
    app_trampoline::<1>,
    app_trampoline::<2>,
    app_trampoline::<3>,
    app_trampoline::<4>,
    app_trampoline::<5>,
    app_trampoline::<6>,
    app_trampoline::<7>,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::guid::IID_IAGILEOBJECT;

    fn qi(address: usize, iid: &Guid) -> (i32, *mut c_void) {
        let mut out: *mut c_void = std::ptr::null_mut();
        let hr = query_interface_trampoline(address as *mut c_void, iid, &mut out);
        (hr, out)
    }

    #[test]
    fn build_starts_at_one_reference_and_registers() {
        let object = CallbackBuilder::new().build().unwrap();
        assert_eq!(object.ref_count(), Some(1));
        assert!(registry::contains(object.address()));
    }

    #[test]
    fn add_ref_then_release_is_neutral() {
        let object = CallbackBuilder::new().build().unwrap();
        let address = object.address();

        assert_eq!(add_ref_trampoline(address as *mut c_void), 2);
        assert_eq!(release_trampoline(address as *mut c_void), 1);
        assert_eq!(object.ref_count(), Some(1));
        assert!(registry::contains(address));
    }

    #[test]
    fn query_interface_answers_declared_set_with_increment() {
        let object = CallbackBuilder::new()
            .interface(IID_IAGILEOBJECT)
            .build()
            .unwrap();
        let address = object.address();

        let (hr, out) = qi(address, &IID_IUNKNOWN);
        assert_eq!(hr, HResult::OK.code());
        assert_eq!(out as usize, address);
        assert_eq!(object.ref_count(), Some(2));

        let (hr, out) = qi(address, &IID_IAGILEOBJECT);
        assert_eq!(hr, HResult::OK.code());
        assert_eq!(out as usize, address);
        assert_eq!(object.ref_count(), Some(3));

        // Balance the two negotiated references.
        release_trampoline(address as *mut c_void);
        release_trampoline(address as *mut c_void);
    }

    #[test]
    fn query_interface_rejects_undeclared_ids_without_state_change() {
        let object = CallbackBuilder::new().build().unwrap();
        let undeclared = Guid::new(0x1234, 0, 0, [0; 8]);

        let (hr, out) = qi(object.address(), &undeclared);
        assert_eq!(hr, HResult::NO_INTERFACE.code());
        assert!(out.is_null());
        assert_eq!(object.ref_count(), Some(1));
    }

    #[test]
    fn query_interface_validates_pointers() {
        let object = CallbackBuilder::new().build().unwrap();
        let mut out: *mut c_void = std::ptr::null_mut();

        let hr = query_interface_trampoline(
            object.address() as *mut c_void,
            std::ptr::null(),
            &mut out,
        );
        assert_eq!(hr, HResult::INVALID_ARG.code());

        let hr = query_interface_trampoline(
            object.address() as *mut c_void,
            &IID_IUNKNOWN,
            std::ptr::null_mut(),
        );
        assert_eq!(hr, HResult::POINTER.code());
    }

    #[test]
    fn release_to_zero_deregisters_exactly_once() {
        let object = CallbackBuilder::new().build().unwrap();
        let address = object.into_handle().address();

        assert_eq!(add_ref_trampoline(address as *mut c_void), 2);
        assert_eq!(release_trampoline(address as *mut c_void), 1);
        assert_eq!(release_trampoline(address as *mut c_void), 0);
        assert!(!registry::contains(address));

        // Stale address: every trampoline fails closed.
        assert_eq!(add_ref_trampoline(address as *mut c_void), 0);
        assert_eq!(release_trampoline(address as *mut c_void), 0);
        let (hr, _) = qi(address, &IID_IUNKNOWN);
        assert_eq!(hr, HResult::INVALID_ARG.code());
        assert_eq!(
            ref_count_of(ObjectHandle::from_address(address)),
            Err(Error::InvalidHandle { address })
        );
    }

    #[test]
    fn app_slot_dispatches_with_arguments() {
        let object = CallbackBuilder::new()
            .method(|call| {
                assert_eq!(call.args, [7, 11]);
                HResult::OK
            })
            .method(|_| HResult::FALSE)
            .build()
            .unwrap();
        let address = object.address() as *mut c_void;

        assert_eq!(app_trampoline::<0>(address, 7, 11), HResult::OK.code());
        assert_eq!(app_trampoline::<1>(address, 0, 0), HResult::FALSE.code());
    }

    #[test]
    fn app_slot_on_never_registered_address_fails_closed() {
        let bogus = 0x5afe_0000 as *mut c_void;
        assert_eq!(
            app_trampoline::<0>(bogus, 0, 0),
            HResult::INVALID_ARG.code()
        );
    }

    #[test]
    fn handler_panic_is_contained() {
        let object = CallbackBuilder::new()
            .method(|_| panic!("handler bug"))
            .build()
            .unwrap();
        let hr = app_trampoline::<0>(object.address() as *mut c_void, 0, 0);
        assert_eq!(hr, HResult::FAIL.code());
        // The object survives its handler's panic.
        assert_eq!(object.ref_count(), Some(1));
    }

    #[test]
    fn too_many_methods_is_rejected() {
        let mut builder = CallbackBuilder::new();
        for _ in 0..=MAX_APP_SLOTS {
            builder = builder.method(|_| HResult::OK);
        }
        let err = builder.build().unwrap_err();
        assert!(matches!(err, Error::TooManyMethods { .. }));
    }

    #[test]
    fn release_past_zero_stays_at_zero() {
        // A foreign over-release can race the teardown thread: the loser
        // decrements a counter the winner already took to zero. Model the
        // loser's view with a zero-count entry still in the registry.
        let address = 0x0fad_ed00;
        registry::register(
            address,
            Arc::new(CallbackState {
                vtable: Vec::new().into_boxed_slice(),
                ref_count: AtomicU32::new(0),
                interfaces: Vec::new(),
                handlers: Vec::new(),
            }),
        )
        .unwrap();

        assert_eq!(release_address(address), 0);

        registry::deregister(address);
    }

    #[test]
    fn callback_object_is_debug_printable() {
        let object = CallbackBuilder::new().build().unwrap();
        assert!(format!("{object:?}").contains(&object.address().to_string()));
    }

    #[test]
    fn dropping_the_creator_reference_destroys_a_sole_owner() {
        let object = CallbackBuilder::new().build().unwrap();
        let address = object.address();
        drop(object);
        assert!(!registry::contains(address));
    }
}
