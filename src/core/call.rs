//! Generic foreign call proxy.
//!
//! Every wrapper method in a generated interface catalog reduces to the
//! same operation: put the receiver address in the implicit first slot,
//! spread the remaining machine-word arguments per the platform ABI, and
//! call indirectly through method-table entry N. This module is that one
//! operation.
//!
//! The proxy performs no type checking of arguments against the callee's
//! real signature; correctness depends entirely on the interface
//! descriptor matching the foreign contract. A non-success status is a
//! recoverable condition reported to the caller, never promoted to a
//! fatal error here.

use crate::core::descriptor::InterfaceDescriptor;
use crate::core::error::{Error, Result};
use crate::core::handle::ObjectHandle;
use crate::types::hresult::HResult;

/// Upper bound on explicit machine-word arguments per call.
pub const MAX_CALL_ARGS: usize = 8;

const _: () = assert!(size_of::<unsafe extern "system" fn(usize) -> i32>() == size_of::<usize>());

type F0 = unsafe extern "system" fn(usize) -> i32;
type F1 = unsafe extern "system" fn(usize, usize) -> i32;
type F2 = unsafe extern "system" fn(usize, usize, usize) -> i32;
type F3 = unsafe extern "system" fn(usize, usize, usize, usize) -> i32;
type F4 = unsafe extern "system" fn(usize, usize, usize, usize, usize) -> i32;
type F5 = unsafe extern "system" fn(usize, usize, usize, usize, usize, usize) -> i32;
type F6 = unsafe extern "system" fn(usize, usize, usize, usize, usize, usize, usize) -> i32;
type F7 = unsafe extern "system" fn(usize, usize, usize, usize, usize, usize, usize, usize) -> i32;
type F8 =
    unsafe extern "system" fn(usize, usize, usize, usize, usize, usize, usize, usize, usize) -> i32;

/// Calls method-table slot `slot` on `handle` with `args` as trailing
/// machine words. Returns the raw status verbatim.
///
/// # Safety
/// The object must be live, `slot` must be within its real method table,
/// and `args` must match the callee's actual signature word-for-word.
/// Pointer arguments must stay valid for the duration of the call, which
/// blocks until the foreign side returns.
pub unsafe fn invoke(handle: ObjectHandle, slot: usize, args: &[usize]) -> Result<HResult> {
    let entry = unsafe { handle.vtable_entry(slot) };
    let this = handle.address();
    let a = args;
    let code = unsafe {
        match a.len() {
            0 => std::mem::transmute::<usize, F0>(entry)(this),
            1 => std::mem::transmute::<usize, F1>(entry)(this, a[0]),
            2 => std::mem::transmute::<usize, F2>(entry)(this, a[0], a[1]),
            3 => std::mem::transmute::<usize, F3>(entry)(this, a[0], a[1], a[2]),
            4 => std::mem::transmute::<usize, F4>(entry)(this, a[0], a[1], a[2], a[3]),
            5 => std::mem::transmute::<usize, F5>(entry)(this, a[0], a[1], a[2], a[3], a[4]),
            6 => std::mem::transmute::<usize, F6>(entry)(this, a[0], a[1], a[2], a[3], a[4], a[5]),
            7 => std::mem::transmute::<usize, F7>(entry)(
                this, a[0], a[1], a[2], a[3], a[4], a[5], a[6],
            ),
            8 => std::mem::transmute::<usize, F8>(entry)(
                this, a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7],
            ),
            given => {
                return Err(Error::TooManyArguments {
                    given,
                    max: MAX_CALL_ARGS,
                });
            }
        }
    };
    Ok(HResult(code))
}

/// [`invoke`] with the slot resolved by method name from a descriptor.
///
/// # Safety
/// Same contract as [`invoke`], plus the descriptor must describe the
/// object's real layout.
pub unsafe fn invoke_named(
    handle: ObjectHandle,
    descriptor: &InterfaceDescriptor,
    method: &str,
    args: &[usize],
) -> Result<HResult> {
    let slot = descriptor.slot_of(method)?;
    unsafe { invoke(handle, slot, args) }
}
