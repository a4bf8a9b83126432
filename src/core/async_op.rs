//! Async completion bridge.
//!
//! A foreign asynchronous operation reports completion by invoking a
//! completion-handler object (`Invoke(operation, status)`). This module
//! adapts that pattern into a host-observable result: issue the foreign
//! call, hand it [`AsyncCompletion::handle`], then block or poll on the
//! bridge. The transition Pending -> Completed fires exactly once; a
//! second delivery is a protocol violation by the foreign side and is
//! logged and ignored rather than allowed to corrupt the stored result.
//!
//! The bridge keeps its callback object alive until dropped, so an
//! abandoned operation still presents a valid handler to the foreign
//! runtime when the completion eventually lands.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use num_enum::TryFromPrimitive;
use tracing::warn;

use crate::core::callback::{CallbackBuilder, CallbackObject};
use crate::core::error::{Error, Result};
use crate::core::handle::ObjectHandle;
use crate::types::guid::{Guid, IID_IAGILEOBJECT};
use crate::types::hresult::HResult;

/// Terminal status of a foreign async operation, as delivered to the
/// completion handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(i32)]
pub enum AsyncStatus {
    Started = 0,
    Completed = 1,
    Canceled = 2,
    Error = 3,
}

/// What the completion callback delivered: the operation's address (for a
/// follow-up GetResults-style call) and its terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub operation: ObjectHandle,
    pub status: AsyncStatus,
}

struct CompletionSlot {
    result: Mutex<Option<Completion>>,
    signal: Condvar,
    /// Set when the foreign side delivered a second completion.
    violated: AtomicBool,
}

impl CompletionSlot {
    /// Records the result. Returns false if one was already stored.
    fn complete(&self, completion: Completion) -> bool {
        let Ok(mut slot) = self.result.lock() else {
            return false;
        };
        if slot.is_some() {
            self.violated.store(true, Ordering::Release);
            return false;
        }
        *slot = Some(completion);
        self.signal.notify_all();
        true
    }
}

/// One-shot bridge from a foreign completion callback to the host caller.
pub struct AsyncCompletion {
    slot: Arc<CompletionSlot>,
    handler: CallbackObject,
}

impl AsyncCompletion {
    /// Builds the bridge and its backing callback object.
    ///
    /// `handler_iid` is the delegate interface id the foreign side will
    /// QueryInterface for before invoking (each async operation kind has
    /// its own completion-handler contract). The object also answers for
    /// IAgileObject so completions may arrive on any foreign thread.
    pub fn new(handler_iid: Guid) -> Result<Self> {
        let slot = Arc::new(CompletionSlot {
            result: Mutex::new(None),
            signal: Condvar::new(),
            violated: AtomicBool::new(false),
        });

        let shared = Arc::clone(&slot);
        let handler = CallbackBuilder::new()
            .interface(handler_iid)
            .interface(IID_IAGILEOBJECT)
            .method(move |call| {
                let status = AsyncStatus::try_from(call.args[1] as i32).unwrap_or_else(|_| {
                    warn!(raw = call.args[1] as u64, "unknown async status, treating as Error");
                    AsyncStatus::Error
                });
                let completion = Completion {
                    operation: ObjectHandle::from_address(call.args[0]),
                    status,
                };
                if !shared.complete(completion) {
                    warn!("async completion delivered more than once, ignoring");
                }
                HResult::OK
            })
            .build()?;

        Ok(Self { slot, handler })
    }

    /// The handler object to pass to the foreign `put_Completed`-style
    /// slot. The bridge retains ownership.
    pub fn handle(&self) -> ObjectHandle {
        self.handler.handle()
    }

    /// Non-blocking poll.
    pub fn try_get(&self) -> Option<Completion> {
        self.slot.result.lock().ok().and_then(|slot| *slot)
    }

    /// Non-blocking poll that refuses to paper over foreign misbehavior:
    /// once a second completion has been delivered, answers
    /// [`Error::ProtocolViolation`] instead of the (still intact) first
    /// result.
    pub fn try_get_strict(&self) -> Result<Option<Completion>> {
        if self.slot.violated.load(Ordering::Acquire) {
            return Err(Error::ProtocolViolation {
                message: "completion delivered more than once",
            });
        }
        Ok(self.try_get())
    }

    /// Blocks the calling thread until the completion lands.
    pub fn wait(&self) -> Result<Completion> {
        let slot = self.slot.result.lock()?;
        let slot = self
            .slot
            .signal
            .wait_while(slot, |result| result.is_none())?;
        Ok(slot.expect("wait_while ended with a stored result"))
    }

    /// Blocks with an upper bound; [`Error::Timeout`] if nothing landed.
    pub fn wait_timeout(&self, limit: Duration) -> Result<Completion> {
        let slot = self.slot.result.lock()?;
        let (slot, timeout) = self
            .slot
            .signal
            .wait_timeout_while(slot, limit, |result| result.is_none())?;
        if timeout.timed_out() {
            return Err(Error::Timeout);
        }
        Ok(slot.expect("wait ended with a stored result"))
    }
}
