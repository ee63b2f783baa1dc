//! Value wrappers
//!
//! The managed runtime owns the actual values; these types only carry a
//! reference and forward the handful of queries the template layer needs.

use std::fmt;
use std::ops::Deref;

use otter_bridge_sys::{AccessMethod, BoundaryArg};

use crate::context::Context;
use crate::error::{BridgeError, BridgeResult};
use crate::handle::{Handle, HandleContent};
use crate::isolate::Isolate;

/// Any managed value
pub struct Value(Handle);

impl HandleContent for Value {
    fn handle(&self) -> &Handle {
        &self.0
    }

    fn copy_impl(handle: Handle) -> Self {
        Self(handle)
    }
}

impl Value {
    /// Check if the value is `undefined`
    pub fn is_undefined(&self) -> BridgeResult<bool> {
        let isolate = self.isolate()?;
        isolate.call_bool(AccessMethod::ValueIsUndefined, &[isolate.marshal(&self.0)?])
    }

    /// Reinterpret as a more specific wrapper without asking the managed side.
    /// A wrong guess surfaces as a `WrongKind` fault on first use.
    pub fn cast<T: HandleContent>(self) -> T {
        T::copy_impl(self.0)
    }

    /// Strict (`===`) comparison on the managed side
    pub fn strict_equals(&self, other: &Value) -> BridgeResult<bool> {
        let isolate = self.isolate()?;
        isolate.call_bool(
            AccessMethod::ValueStrictEquals,
            &[isolate.marshal(&self.0)?, isolate.marshal(&other.0)?],
        )
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({:?})", self.0)
    }
}

/// A managed integer
pub struct Integer(Value);

impl HandleContent for Integer {
    fn handle(&self) -> &Handle {
        self.0.handle()
    }

    fn copy_impl(handle: Handle) -> Self {
        Self(Value(handle))
    }
}

impl Integer {
    pub fn new(isolate: &Isolate, value: i64) -> BridgeResult<Self> {
        isolate
            .call_ref(AccessMethod::IntegerNew, &[BoundaryArg::Long(value)])
            .map(Self::copy_impl)
    }

    pub fn value(&self) -> BridgeResult<i64> {
        let isolate = self.isolate()?;
        isolate.call_int(AccessMethod::IntegerValue, &[isolate.marshal(self.handle())?])
    }
}

impl Deref for Integer {
    type Target = Value;

    fn deref(&self) -> &Value {
        &self.0
    }
}

impl fmt::Debug for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Integer({:?})", self.handle())
    }
}

/// A managed object
pub struct Object(Value);

impl HandleContent for Object {
    fn handle(&self) -> &Handle {
        self.0.handle()
    }

    fn copy_impl(handle: Handle) -> Self {
        Self(Value(handle))
    }
}

impl Object {
    /// Create an empty object in `context`
    pub fn new(context: &Context) -> BridgeResult<Self> {
        let isolate = context.isolate()?;
        isolate
            .call_ref(AccessMethod::ObjectNew, &[isolate.marshal(context.handle())?])
            .map(Self::copy_impl)
    }

    /// Number of internal storage slots reserved for this object
    pub fn internal_field_count(&self) -> BridgeResult<u32> {
        let isolate = self.isolate()?;
        let count = isolate.call_int(
            AccessMethod::ObjectInternalFieldCount,
            &[isolate.marshal(self.handle())?],
        )?;
        u32::try_from(count).map_err(|_| BridgeError::UnexpectedReturn {
            method: AccessMethod::ObjectInternalFieldCount,
            expected: "non-negative count",
        })
    }
}

impl Deref for Object {
    type Target = Value;

    fn deref(&self) -> &Value {
        &self.0
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({:?})", self.handle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otter_bridge_local::LocalRuntime;

    #[test]
    fn test_integer_round_trip() {
        let isolate = Isolate::new(LocalRuntime::new()).unwrap();
        let n = Integer::new(&isolate, -17).unwrap();
        assert_eq!(n.value().unwrap(), -17);
        assert!(!n.is_undefined().unwrap());
    }

    #[test]
    fn test_copy_is_strictly_equal() {
        let isolate = Isolate::new(LocalRuntime::new()).unwrap();
        let context = Context::new(&isolate).unwrap();
        let object = Object::new(&context).unwrap();
        let copy = object.copy().unwrap();

        assert_ne!(copy.raw(), object.raw());
        assert!(copy.strict_equals(&object).unwrap());

        let other = Object::new(&context).unwrap();
        assert!(!other.strict_equals(&object).unwrap());
    }

    #[test]
    fn test_plain_object_has_no_internal_fields() {
        let isolate = Isolate::new(LocalRuntime::new()).unwrap();
        let context = Context::new(&isolate).unwrap();
        let object = Object::new(&context).unwrap();
        assert_eq!(object.internal_field_count().unwrap(), 0);
    }

    #[test]
    fn test_cross_isolate_value_is_rejected() {
        let a = Isolate::new(LocalRuntime::new()).unwrap();
        let b = Isolate::new(LocalRuntime::new()).unwrap();
        let from_a = Integer::new(&a, 1).unwrap();
        let from_b = Integer::new(&b, 1).unwrap();

        let err = from_b.strict_equals(&from_a).unwrap_err();
        assert!(matches!(err, BridgeError::WrongIsolate { .. }));
    }
}
