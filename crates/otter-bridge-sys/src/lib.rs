//! Raw boundary ABI for the managed template runtime
//!
//! This crate provides the low-level, unsafe-to-misuse vocabulary shared by
//! both sides of the boundary: managed reference ids, the opcode table,
//! positional argument marshaling and the raw callback pointer types.
//! Use the safe wrappers in `otter-bridge-core` for higher-level access.

use std::ffi::c_void;
use std::os::raw::c_uint;

mod method;

pub use method::AccessMethod;

// Opaque managed reference ids. Only the managed side knows what they point to.
pub type ManagedRef = u64;
pub const NULL_REF: ManagedRef = 0;

// Callback info blocks are owned by the managed side during dispatch
pub type FunctionCallbackInfoRef = *const c_void;
pub type PropertyCallbackInfoRef = *const c_void;

// Property attributes
pub type PropertyAttributes = c_uint;
pub const K_PROPERTY_ATTRIBUTE_NONE: PropertyAttributes = 0;
pub const K_PROPERTY_ATTRIBUTE_READ_ONLY: PropertyAttributes = 1 << 0;
pub const K_PROPERTY_ATTRIBUTE_DONT_ENUM: PropertyAttributes = 1 << 1;
pub const K_PROPERTY_ATTRIBUTE_DONT_DELETE: PropertyAttributes = 1 << 2;

/// Template property under which an object template publishes its internal
/// field count. The managed side reads it when instantiating.
pub const INTERNAL_FIELD_COUNT_KEY: &str = "__otter_internal_field_count";

// Callback types
pub type FunctionCallback = Option<unsafe extern "C" fn(info: FunctionCallbackInfoRef)>;

pub type AccessorGetterCallback =
    Option<unsafe extern "C" fn(property: ManagedRef, info: PropertyCallbackInfoRef)>;
pub type AccessorSetterCallback = Option<
    unsafe extern "C" fn(property: ManagedRef, value: ManagedRef, info: PropertyCallbackInfoRef),
>;

pub type NamedPropertyGetterCallback =
    Option<unsafe extern "C" fn(property: ManagedRef, info: PropertyCallbackInfoRef)>;
pub type NamedPropertySetterCallback = Option<
    unsafe extern "C" fn(property: ManagedRef, value: ManagedRef, info: PropertyCallbackInfoRef),
>;
pub type NamedPropertyQueryCallback =
    Option<unsafe extern "C" fn(property: ManagedRef, info: PropertyCallbackInfoRef)>;
pub type NamedPropertyDeleterCallback =
    Option<unsafe extern "C" fn(property: ManagedRef, info: PropertyCallbackInfoRef)>;
pub type NamedPropertyEnumeratorCallback =
    Option<unsafe extern "C" fn(info: PropertyCallbackInfoRef)>;

pub type IndexedPropertyGetterCallback =
    Option<unsafe extern "C" fn(index: u32, info: PropertyCallbackInfoRef)>;
pub type IndexedPropertySetterCallback =
    Option<unsafe extern "C" fn(index: u32, value: ManagedRef, info: PropertyCallbackInfoRef)>;
pub type IndexedPropertyQueryCallback =
    Option<unsafe extern "C" fn(index: u32, info: PropertyCallbackInfoRef)>;
pub type IndexedPropertyDeleterCallback =
    Option<unsafe extern "C" fn(index: u32, info: PropertyCallbackInfoRef)>;
pub type IndexedPropertyEnumeratorCallback =
    Option<unsafe extern "C" fn(info: PropertyCallbackInfoRef)>;

/// Cast an optional raw callback to the integer that crosses the boundary.
///
/// `None` becomes `0`. The managed side never dereferences the value, it only
/// stores it and hands it back verbatim at dispatch time.
#[macro_export]
macro_rules! callback_address {
    ($callback:expr) => {
        match $callback {
            Some(f) => f as usize as u64,
            None => 0u64,
        }
    };
}

/// A positional argument of a boundary call
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryArg<'a> {
    /// Managed reference
    Ref(ManagedRef),
    /// Absent reference (`null` on the managed side)
    Null,
    /// Small integer
    Int(i32),
    /// 64-bit integer, used for raw function pointers
    Long(i64),
    Bool(bool),
    /// UTF-8 payload for string construction
    Utf8(&'a str),
}

impl BoundaryArg<'_> {
    /// Marshal an optional reference, mapping `NULL_REF` to `Null`
    pub fn optional_ref(raw: ManagedRef) -> Self {
        if raw == NULL_REF {
            BoundaryArg::Null
        } else {
            BoundaryArg::Ref(raw)
        }
    }

    /// Marshal a callback address
    pub fn address(address: u64) -> Self {
        BoundaryArg::Long(address as i64)
    }
}

/// The single value a boundary call produces
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryReturn {
    Void,
    Ref(ManagedRef),
    Int(i64),
    Bool(bool),
    Utf8(String),
}

/// Why the managed side refused a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The reference id is unknown or was released
    InvalidReference,
    /// A weak reference whose target has been collected
    DanglingReference,
    /// The reference points at a value of the wrong kind
    WrongKind,
    /// Argument list does not match the opcode's signature
    BadArguments,
    /// The managed side understood the call but rejected it
    Rejected,
}

/// A failed boundary call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{method} failed ({kind:?}): {message}")]
pub struct BoundaryFault {
    pub method: AccessMethod,
    pub kind: FaultKind,
    pub message: String,
}

impl BoundaryFault {
    pub fn new(method: AccessMethod, kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            method,
            kind,
            message: message.into(),
        }
    }
}

/// The synchronous call transport into the managed runtime.
///
/// Every configuration operation issues exactly one call. A call either fully
/// applies or fails; there is no partial application.
pub trait Boundary {
    fn call(
        &mut self,
        method: AccessMethod,
        args: &[BoundaryArg<'_>],
    ) -> Result<BoundaryReturn, BoundaryFault>;
}

impl<B: Boundary + ?Sized> Boundary for Box<B> {
    fn call(
        &mut self,
        method: AccessMethod,
        args: &[BoundaryArg<'_>],
    ) -> Result<BoundaryReturn, BoundaryFault> {
        (**self).call(method, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "C" fn noop(_info: FunctionCallbackInfoRef) {}

    #[test]
    fn test_callback_address() {
        let none: FunctionCallback = None;
        assert_eq!(callback_address!(none), 0);

        let some: FunctionCallback = Some(noop);
        assert_eq!(callback_address!(some), noop as usize as u64);
        assert_ne!(callback_address!(some), 0);
    }

    #[test]
    fn test_optional_ref() {
        assert_eq!(BoundaryArg::optional_ref(NULL_REF), BoundaryArg::Null);
        assert_eq!(BoundaryArg::optional_ref(7), BoundaryArg::Ref(7));
    }

    #[test]
    fn test_fault_display() {
        let fault = BoundaryFault::new(
            AccessMethod::ObjectTemplateNewInstance,
            FaultKind::Rejected,
            "context disposed",
        );
        let text = fault.to_string();
        assert!(text.contains("object_template_new_instance"));
        assert!(text.contains("context disposed"));
    }
}
