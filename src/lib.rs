//! Interop bridge for reference-counted, vtable-dispatched foreign object
//! systems (the COM/WinRT calling convention).
//!
//! The crate does two things:
//! - calls into foreign method tables generically ([`core::call`],
//!   [`core::handle`]), and
//! - builds host-side objects foreign code can call back into
//!   ([`core::callback`]): a valid vtable, by-convention slot ordering,
//!   atomic reference counting and QueryInterface negotiation, with the
//!   raw address handed to foreign code for a foreign-controlled lifetime.
//!
//! On top of that sit the async completion bridge ([`core::async_op`])
//! and event token plumbing ([`core::event`]). Per-interface method
//! tables and GUID catalogs are consumed as external input
//! ([`core::descriptor`]), not generated here.

pub mod core;
pub mod types;

pub mod prelude {
    pub use crate::core::async_op::{AsyncCompletion, AsyncStatus, Completion};
    pub use crate::core::call::{MAX_CALL_ARGS, invoke, invoke_named};
    pub use crate::core::callback::{
        CallbackBuilder, CallbackObject, MAX_APP_SLOTS, SlotCall, SlotHandler, ref_count_of,
    };
    pub use crate::core::descriptor::{
        InterfaceDescriptor, SLOT_ADD_REF, SLOT_QUERY_INTERFACE, SLOT_RELEASE,
    };
    pub use crate::core::error::{Error, Result};
    pub use crate::core::event::{EventToken, subscribe, unsubscribe};
    pub use crate::core::handle::{ObjectHandle, OwnedHandle};
    pub use crate::types::guid::{Guid, IID_IAGILEOBJECT, IID_IINSPECTABLE, IID_IUNKNOWN};
    pub use crate::types::hresult::HResult;
}
