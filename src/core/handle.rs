//! Run-time references to foreign objects.
//!
//! An [`ObjectHandle`] is a raw address plus the convention that address
//! offset zero holds a pointer to the object's method table. It is a
//! non-owning view; ownership is tracked separately through the foreign
//! reference count, and [`OwnedHandle`] is the counted-ownership wrapper
//! that guarantees one `Release` on every exit path.
//!
//! Multiple handles may alias the same address under different interface
//! views. Once read, an object's method-table pointer is treated as
//! immutable for the handle's lifetime; foreign objects must not swap
//! method tables after construction.

use std::ffi::c_void;
use std::ops::Deref;

use crate::core::call;
use crate::core::descriptor::{SLOT_ADD_REF, SLOT_QUERY_INTERFACE, SLOT_RELEASE};
use crate::core::error::{Error, Result};
use crate::types::guid::Guid;
use crate::types::hresult::HResult;

/// Non-owning view of a foreign object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ObjectHandle {
    address: usize,
}

impl ObjectHandle {
    /// Wraps a raw foreign object pointer.
    ///
    /// # Safety
    /// `ptr` must point to a live object whose first word is a valid
    /// method-table pointer, and must stay live for as long as the handle
    /// is used to make calls.
    pub unsafe fn from_raw(ptr: *mut c_void) -> Result<Self> {
        if ptr.is_null() {
            return Err(Error::NullPointer);
        }
        Ok(Self {
            address: ptr as usize,
        })
    }

    pub(crate) fn from_address(address: usize) -> Self {
        Self { address }
    }

    pub fn address(&self) -> usize {
        self.address
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.address as *mut c_void
    }

    /// Reads the function pointer stored at `slot` of the object's method
    /// table.
    ///
    /// # Safety
    /// The object must be live and `slot` must be within its real table.
    pub(crate) unsafe fn vtable_entry(&self, slot: usize) -> usize {
        let vtable = unsafe { *(self.address as *const *const usize) };
        unsafe { *vtable.add(slot) }
    }

    /// Negotiates a differently-typed view of the same object.
    ///
    /// Drives slot 0 (QueryInterface). On success the foreign object has
    /// incremented its own reference count and the returned [`OwnedHandle`]
    /// carries that reference. `E_NOINTERFACE` maps to
    /// [`Error::NoSuchInterface`]; any other failure status is propagated
    /// as [`Error::ForeignCallFailed`].
    ///
    /// # Safety
    /// The handle must refer to a live object.
    pub unsafe fn query_interface(&self, iid: &Guid) -> Result<OwnedHandle> {
        let mut out: *mut c_void = std::ptr::null_mut();
        let hr = unsafe {
            call::invoke(
                *self,
                SLOT_QUERY_INTERFACE,
                &[iid as *const Guid as usize, &mut out as *mut _ as usize],
            )?
        };
        if hr == HResult::NO_INTERFACE {
            return Err(Error::NoSuchInterface { iid: *iid });
        }
        hr.ok()?;
        if out.is_null() {
            return Err(Error::NullPointer);
        }
        // The negotiated reference is ours to release.
        Ok(OwnedHandle {
            handle: ObjectHandle {
                address: out as usize,
            },
        })
    }

    /// Drives slot 1 (AddRef). Returns the new foreign count.
    ///
    /// # Safety
    /// The handle must refer to a live object.
    pub unsafe fn add_ref(&self) -> u32 {
        let entry = unsafe { self.vtable_entry(SLOT_ADD_REF) };
        let f: unsafe extern "system" fn(usize) -> u32 = unsafe { std::mem::transmute(entry) };
        unsafe { f(self.address) }
    }

    /// Drives slot 2 (Release). Returns the new foreign count. Must be
    /// called exactly once per owning reference; handles obtained from
    /// non-owning getters must not be released.
    ///
    /// # Safety
    /// The handle must refer to a live object holding a reference the
    /// caller owns.
    pub unsafe fn release(&self) -> u32 {
        let entry = unsafe { self.vtable_entry(SLOT_RELEASE) };
        let f: unsafe extern "system" fn(usize) -> u32 = unsafe { std::mem::transmute(entry) };
        unsafe { f(self.address) }
    }
}

/// Counted-ownership wrapper: holds exactly one foreign reference and
/// releases it when dropped, on every exit path.
#[derive(Debug)]
pub struct OwnedHandle {
    handle: ObjectHandle,
}

impl OwnedHandle {
    /// Takes ownership of a reference the foreign side already counted
    /// for us (factory results, documented owning getters).
    ///
    /// # Safety
    /// `ptr` must carry exactly one reference owned by the caller.
    pub unsafe fn from_raw(ptr: *mut c_void) -> Result<Self> {
        Ok(Self {
            handle: unsafe { ObjectHandle::from_raw(ptr)? },
        })
    }

    /// Wraps a borrowed pointer, taking a fresh reference of our own.
    ///
    /// # Safety
    /// `ptr` must point to a live object.
    pub unsafe fn from_raw_add_ref(ptr: *mut c_void) -> Result<Self> {
        let handle = unsafe { ObjectHandle::from_raw(ptr)? };
        unsafe { handle.add_ref() };
        Ok(Self { handle })
    }

    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    /// Relinquishes ownership without releasing; the caller now owes the
    /// foreign side one `Release`.
    pub fn into_raw(self) -> *mut c_void {
        let ptr = self.handle.as_ptr();
        std::mem::forget(self);
        ptr
    }
}

impl Deref for OwnedHandle {
    type Target = ObjectHandle;

    fn deref(&self) -> &ObjectHandle {
        &self.handle
    }
}

impl Clone for OwnedHandle {
    fn clone(&self) -> Self {
        unsafe { self.handle.add_ref() };
        Self {
            handle: self.handle,
        }
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        unsafe { self.handle.release() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_pointer_is_rejected() {
        let err = unsafe { ObjectHandle::from_raw(std::ptr::null_mut()) }.unwrap_err();
        assert_eq!(err, Error::NullPointer);
    }

    #[test]
    fn owned_handle_is_debug_printable() {
        let owned = unsafe { OwnedHandle::from_raw(0x1000 as *mut c_void) }.unwrap();
        assert!(format!("{owned:?}").contains("4096"));
        // Fake address: relinquish instead of dropping into a Release.
        owned.into_raw();
    }

    #[test]
    fn handles_alias_by_address() {
        let a = ObjectHandle::from_address(0x1000);
        let b = ObjectHandle::from_address(0x1000);
        assert_eq!(a, b);
        assert_eq!(a.address(), 0x1000);
    }
}
