//! Execution context handle

use std::fmt;

use otter_bridge_sys::AccessMethod;

use crate::error::BridgeResult;
use crate::handle::{Handle, HandleContent};
use crate::isolate::Isolate;

/// A managed execution context. Objects are materialized inside one.
pub struct Context(Handle);

impl HandleContent for Context {
    fn handle(&self) -> &Handle {
        &self.0
    }

    fn copy_impl(handle: Handle) -> Self {
        Self(handle)
    }
}

impl Context {
    pub fn new(isolate: &Isolate) -> BridgeResult<Self> {
        isolate
            .call_ref(AccessMethod::ContextNew, &[])
            .map(Self::copy_impl)
    }

    /// Tear the context down on the managed side. The handle stays valid as a
    /// reference, but instantiating into it fails from now on.
    pub fn dispose(&self) -> BridgeResult<()> {
        let isolate = self.isolate()?;
        isolate.call_void(AccessMethod::ContextDispose, &[isolate.marshal(&self.0)?])
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context({:?})", self.0)
    }
}
