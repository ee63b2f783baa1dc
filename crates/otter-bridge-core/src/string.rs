//! Managed string wrapper

use std::fmt;
use std::ops::Deref;

use otter_bridge_sys::{AccessMethod, BoundaryArg};

use crate::error::BridgeResult;
use crate::handle::{Handle, HandleContent};
use crate::isolate::Isolate;
use crate::value::Value;

/// A managed string, used for property and class names
pub struct JsString(Value);

impl HandleContent for JsString {
    fn handle(&self) -> &Handle {
        self.0.handle()
    }

    fn copy_impl(handle: Handle) -> Self {
        Self(Value::copy_impl(handle))
    }
}

impl JsString {
    /// Create a new managed string from a Rust string
    pub fn new(isolate: &Isolate, s: &str) -> BridgeResult<Self> {
        isolate
            .call_ref(AccessMethod::StringNew, &[BoundaryArg::Utf8(s)])
            .map(Self::copy_impl)
    }

    /// Convert to Rust String
    pub fn to_rust_string(&self) -> BridgeResult<String> {
        let isolate = self.isolate()?;
        isolate.call_utf8(AccessMethod::StringUtf8, &[isolate.marshal(self.handle())?])
    }
}

impl Deref for JsString {
    type Target = Value;

    fn deref(&self) -> &Value {
        &self.0
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rust_string() {
            Ok(s) => write!(f, "JsString({:?})", s),
            Err(_) => write!(f, "JsString(<opaque>)"),
        }
    }
}
