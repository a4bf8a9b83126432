//! Foreign status codes.
//!
//! Every slot call returns a platform status word. The proxy layer hands it
//! back verbatim; interpreting anything beyond success/failure is the
//! per-interface wrapper's business.

use std::fmt;

use crate::core::error::{Error, Result};

/// Raw foreign status code. Non-negative means success.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HResult(pub i32);

impl HResult {
    /// Success.
    pub const OK: HResult = HResult(0);
    /// Success, with a false/empty answer.
    pub const FALSE: HResult = HResult(1);
    /// The requested interface is not supported.
    pub const NO_INTERFACE: HResult = HResult(0x8000_4002_u32 as i32);
    /// Not implemented.
    pub const NOT_IMPL: HResult = HResult(0x8000_4001_u32 as i32);
    /// Invalid pointer argument.
    pub const POINTER: HResult = HResult(0x8000_4003_u32 as i32);
    /// Unspecified failure.
    pub const FAIL: HResult = HResult(0x8000_4005_u32 as i32);
    /// Invalid argument.
    pub const INVALID_ARG: HResult = HResult(0x8007_0057_u32 as i32);

    pub const fn is_ok(self) -> bool {
        self.0 >= 0
    }

    pub const fn is_err(self) -> bool {
        self.0 < 0
    }

    pub const fn code(self) -> i32 {
        self.0
    }

    /// Converts a failure status into [`Error::ForeignCallFailed`].
    pub fn ok(self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(Error::ForeignCallFailed { hr: self })
        }
    }
}

impl From<i32> for HResult {
    fn from(code: i32) -> Self {
        HResult(code)
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0 as u32)
    }
}

impl fmt::Debug for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HResult({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_codes() {
        assert!(HResult::OK.is_ok());
        assert!(HResult::FALSE.is_ok());
        assert!(HResult::OK.ok().is_ok());
    }

    #[test]
    fn failure_codes_map_to_error() {
        assert!(HResult::NO_INTERFACE.is_err());
        let err = HResult::FAIL.ok().unwrap_err();
        assert!(matches!(err, Error::ForeignCallFailed { hr } if hr == HResult::FAIL));
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(HResult::NO_INTERFACE.to_string(), "0x80004002");
        assert_eq!(HResult::OK.to_string(), "0x00000000");
    }
}
