//! Event subscription plumbing.
//!
//! Foreign objects expose paired `add_*`/`remove_*` slots: the add slot
//! takes a handler object and writes back an opaque registration token,
//! the remove slot takes that token. The handler is any callback object
//! whose application slot matches the event's delegate shape.

use crate::core::call;
use crate::core::error::Result;
use crate::core::handle::ObjectHandle;

/// Opaque registration token returned by an add slot.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventToken {
    pub value: i64,
}

/// Registers `handler` with the event behind `add_slot` on `source`.
///
/// # Safety
/// `source` must be live and `add_slot` must be an event-add slot taking
/// (handler, out token).
pub unsafe fn subscribe(
    source: ObjectHandle,
    add_slot: usize,
    handler: ObjectHandle,
) -> Result<EventToken> {
    let mut token = EventToken::default();
    let hr = unsafe {
        call::invoke(
            source,
            add_slot,
            &[handler.address(), &mut token as *mut EventToken as usize],
        )?
    };
    hr.ok()?;
    Ok(token)
}

/// Revokes a previous [`subscribe`] registration.
///
/// # Safety
/// `source` must be live and `remove_slot` must be the matching
/// event-remove slot.
pub unsafe fn unsubscribe(source: ObjectHandle, remove_slot: usize, token: EventToken) -> Result<()> {
    let mut token = token;
    let hr = unsafe {
        call::invoke(
            source,
            remove_slot,
            &[&mut token as *mut EventToken as usize],
        )?
    };
    hr.ok()
}
