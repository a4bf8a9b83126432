use std::sync::PoisonError;

use thiserror::Error;

use crate::types::guid::Guid;
use crate::types::hresult::HResult;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the interop bridge.
///
/// Nothing here is fatal: a foreign failure status is reported, never
/// promoted to a panic. Only corrupted process-wide registry state (a
/// duplicate registration under a live address) aborts, and that check
/// lives in the registry itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// QueryInterface found no match for the requested id. Recoverable;
    /// the caller picks a fallback interface or fails its own operation.
    #[error("no such interface: {iid}")]
    NoSuchInterface { iid: Guid },

    /// A trampoline received an address that is not (or no longer) a
    /// registered callback object. The call failed closed.
    #[error("invalid handle: {address:#x} is not a registered callback object")]
    InvalidHandle { address: usize },

    /// The underlying foreign call returned a failure status, propagated
    /// verbatim.
    #[error("foreign call failed: {hr}")]
    ForeignCallFailed { hr: HResult },

    /// The foreign side broke the calling contract (e.g. delivered a
    /// completion twice). Logged and ignored at the boundary; only
    /// surfaced where a host caller explicitly asks.
    #[error("protocol violation: {message}")]
    ProtocolViolation { message: &'static str },

    #[error("null pointer encountered")]
    NullPointer,

    /// A method name was not found in the interface descriptor consulted.
    #[error("interface {interface} has no method named '{method}'")]
    UnknownMethod {
        interface: &'static str,
        method: String,
    },

    /// The proxy only marshals up to a fixed number of machine words.
    #[error("foreign call takes at most {max} arguments, {given} given")]
    TooManyArguments { given: usize, max: usize },

    /// Callback objects expose a bounded number of application slots.
    #[error("callback objects support at most {max} application methods, {given} given")]
    TooManyMethods { given: usize, max: usize },

    #[error("callback registry lock poisoned")]
    RegistryPoisoned,

    #[error("timed out waiting for async completion")]
    Timeout,
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Error::RegistryPoisoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let err = Error::InvalidHandle { address: 0xdead };
        assert!(err.to_string().contains("0xdead"));

        let err = Error::ForeignCallFailed {
            hr: HResult::NO_INTERFACE,
        };
        assert!(err.to_string().contains("0x80004002"));

        let err = Error::NoSuchInterface {
            iid: crate::types::guid::IID_IUNKNOWN,
        };
        assert!(err.to_string().contains("00000000-0000-0000-c000"));
    }
}
