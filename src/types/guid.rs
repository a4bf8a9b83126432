//! 128-bit interface identifiers.
//!
//! Foreign interfaces are named by GUIDs. The layout here matches the wire
//! layout the foreign side expects when a GUID is passed by pointer, so a
//! `&Guid` can be handed straight to a QueryInterface slot.

use std::fmt;

/// 128-bit identifier naming one foreign interface contract.
///
/// Compared by byte equality. Immutable once constructed.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

const _: () = assert!(size_of::<Guid>() == 16);
const _: () = assert!(align_of::<Guid>() == 4);

impl Guid {
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    /// The nil GUID.
    pub const ZERO: Guid = Guid::new(0, 0, 0, [0; 8]);

    /// Parses the canonical `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}` form.
    /// The surrounding braces are optional. Every group must have its
    /// exact length and hold hex digits only; anything else returns `None`
    /// rather than guessing.
    pub fn parse(text: &str) -> Option<Guid> {
        let text = text
            .strip_prefix('{')
            .and_then(|t| t.strip_suffix('}'))
            .unwrap_or(text);

        let mut parts = text.split('-');
        let data1 = hex_group(parts.next()?, 8)? as u32;
        let data2 = hex_group(parts.next()?, 4)? as u16;
        let data3 = hex_group(parts.next()?, 4)? as u16;
        let hi = hex_group(parts.next()?, 4)?;
        let lo = hex_group(parts.next()?, 12)?;
        if parts.next().is_some() {
            return None;
        }

        let data4 = ((hi << 48) | lo).to_be_bytes();
        Some(Guid::new(data1, data2, data3, data4))
    }
}

/// One dash-separated group: exact length, hex digits only. Rejects the
/// signs and whitespace `from_str_radix` would otherwise tolerate.
fn hex_group(part: &str, len: usize) -> Option<u64> {
    if part.len() != len || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(part, 16).ok()
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}}}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7]
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// IUnknown, the universal base contract every object answers for.
pub const IID_IUNKNOWN: Guid = Guid::new(
    0x0000_0000,
    0x0000,
    0x0000,
    [0xc0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

/// IInspectable, the runtime-class base used by WinRT-style objects.
pub const IID_IINSPECTABLE: Guid = Guid::new(
    0xaf86_e2e0,
    0xb12d,
    0x4c6a,
    [0x9c, 0x5a, 0xd7, 0xaa, 0x65, 0x10, 0x1e, 0x90],
);

/// IAgileObject, the marker interface declaring free-threaded access.
/// Callback objects advertise it so the foreign runtime may invoke them
/// from any thread without proxying.
pub const IID_IAGILEOBJECT: Guid = Guid::new(
    0x94ea_2b94,
    0xe9cc,
    0x49e0,
    [0xc0, 0xff, 0xee, 0x64, 0xca, 0x8f, 0x5b, 0x90],
);
