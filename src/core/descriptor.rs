//! Interface descriptors.
//!
//! A descriptor is the static, language-agnostic description of one foreign
//! interface: its identifying GUID plus its ordered method-slot list. Slot
//! ordering is load-bearing: interfaces extend a single base by prepending
//! the base's slots unchanged, and slots 0-2 are always
//! {QueryInterface, AddRef, Release}. There is no runtime check that a
//! descriptor matches the real foreign layout; a mismatch is undefined
//! behavior at call time, which is why descriptors come from a fixed,
//! externally supplied catalog rather than being assembled ad hoc.

use std::sync::LazyLock;

use crate::core::error::{Error, Result};
use crate::types::guid::{Guid, IID_IAGILEOBJECT, IID_IINSPECTABLE, IID_IUNKNOWN};

/// Universal base slots, present on every object.
pub const SLOT_QUERY_INTERFACE: usize = 0;
pub const SLOT_ADD_REF: usize = 1;
pub const SLOT_RELEASE: usize = 2;

/// Static description of one foreign interface: id plus ordered slot list,
/// inherited slots first.
#[derive(Debug, Clone)]
pub struct InterfaceDescriptor {
    name: &'static str,
    iid: Guid,
    slots: Vec<&'static str>,
}

impl InterfaceDescriptor {
    /// Describes an interface deriving directly from the universal base.
    pub fn new(name: &'static str, iid: Guid, methods: &[&'static str]) -> Self {
        let mut slots = vec!["QueryInterface", "AddRef", "Release"];
        slots.extend_from_slice(methods);
        Self { name, iid, slots }
    }

    /// Describes an interface extending `base`: the base's slots are
    /// carried over unchanged, then `methods` follow in order.
    pub fn extends(
        base: &InterfaceDescriptor,
        name: &'static str,
        iid: Guid,
        methods: &[&'static str],
    ) -> Self {
        let mut slots = base.slots.clone();
        slots.extend_from_slice(methods);
        Self { name, iid, slots }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn iid(&self) -> Guid {
        self.iid
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Resolves a method name to its slot index.
    pub fn slot_of(&self, method: &str) -> Result<usize> {
        self.slots
            .iter()
            .position(|s| *s == method)
            .ok_or_else(|| Error::UnknownMethod {
                interface: self.name,
                method: method.to_string(),
            })
    }

    pub fn slot_name(&self, slot: usize) -> Option<&'static str> {
        self.slots.get(slot).copied()
    }
}

/// IUnknown: the three universal slots and nothing else.
pub static IUNKNOWN: LazyLock<InterfaceDescriptor> =
    LazyLock::new(|| InterfaceDescriptor::new("IUnknown", IID_IUNKNOWN, &[]));

/// IInspectable: the WinRT runtime-class base, slots 3-5.
pub static IINSPECTABLE: LazyLock<InterfaceDescriptor> = LazyLock::new(|| {
    InterfaceDescriptor::extends(
        &IUNKNOWN,
        "IInspectable",
        IID_IINSPECTABLE,
        &["GetIids", "GetRuntimeClassName", "GetTrustLevel"],
    )
});

/// IAgileObject: a marker interface, no slots of its own.
pub static IAGILEOBJECT: LazyLock<InterfaceDescriptor> =
    LazyLock::new(|| InterfaceDescriptor::extends(&IUNKNOWN, "IAgileObject", IID_IAGILEOBJECT, &[]));
