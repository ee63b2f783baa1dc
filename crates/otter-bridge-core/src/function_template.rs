//! Function templates
//!
//! Used by object templates as accessor signatures (receiver checks) and as
//! the blueprint of callable, constructable functions.

use std::fmt;
use std::ops::Deref;

use otter_bridge_sys::{AccessMethod, BoundaryArg, FunctionCallback, callback_address};
use tracing::debug;

use crate::context::Context;
use crate::error::BridgeResult;
use crate::handle::{Handle, HandleContent};
use crate::isolate::Isolate;
use crate::object_template::ObjectTemplate;
use crate::string::JsString;
use crate::template::Template;
use crate::value::{Object, Value};

pub struct FunctionTemplate(Template);

impl HandleContent for FunctionTemplate {
    fn handle(&self) -> &Handle {
        self.0.handle()
    }

    fn copy_impl(handle: Handle) -> Self {
        Self(Template::copy_impl(handle))
    }
}

impl FunctionTemplate {
    /// Create a function template whose functions run `callback`.
    ///
    /// The callback goes through the isolate's registry exactly like a
    /// call-as-function handler: fresh id, data duplicated and made weak (or
    /// the shared `undefined` when absent).
    pub fn new(
        isolate: &Isolate,
        callback: FunctionCallback,
        data: Option<&Value>,
        signature: Option<&FunctionTemplate>,
    ) -> BridgeResult<Self> {
        let signature = isolate.marshal_optional(signature.map(|s| s.handle()))?;
        let (id, data) = isolate.register_function_callback(callback, data)?;

        let result = isolate.marshal(data.handle()).and_then(|data_arg| {
            isolate.call_ref(
                AccessMethod::FunctionTemplateNew,
                &[
                    BoundaryArg::Int(id as i32),
                    BoundaryArg::address(callback_address!(callback)),
                    data_arg,
                    signature,
                ],
            )
        });
        match result {
            Ok(handle) => {
                debug!(isolate = %isolate.id(), id, "Function template created");
                Ok(Self::copy_impl(handle))
            }
            Err(e) => {
                drop(data);
                isolate.unregister_function_callback(id);
                Err(e)
            }
        }
    }

    pub fn set_class_name(&self, name: &JsString) -> BridgeResult<()> {
        let isolate = self.isolate()?;
        isolate.call_void(
            AccessMethod::FunctionTemplateSetClassName,
            &[isolate.marshal(self.handle())?, isolate.marshal(name.handle())?],
        )
    }

    /// The object template instances of this function are created from.
    /// Created on first request; later calls return new handles to the same
    /// template.
    pub fn instance_template(&self) -> BridgeResult<ObjectTemplate> {
        let isolate = self.isolate()?;
        isolate
            .call_ref(
                AccessMethod::FunctionTemplateInstanceTemplate,
                &[isolate.marshal(self.handle())?],
            )
            .map(ObjectTemplate::copy_impl)
    }

    /// Materialize the function in `context`
    pub fn get_function(&self, context: &Context) -> BridgeResult<Object> {
        let isolate = self.isolate()?;
        isolate
            .call_ref(
                AccessMethod::FunctionTemplateGetFunction,
                &[isolate.marshal(context.handle())?, isolate.marshal(self.handle())?],
            )
            .map(Object::copy_impl)
    }

    /// Check if `value` was instantiated from this template's instance
    /// template. This is the check accessor signatures rely on.
    pub fn has_instance(&self, value: &Value) -> BridgeResult<bool> {
        let isolate = self.isolate()?;
        isolate.call_bool(
            AccessMethod::FunctionTemplateHasInstance,
            &[isolate.marshal(self.handle())?, isolate.marshal(value.handle())?],
        )
    }
}

impl Deref for FunctionTemplate {
    type Target = Template;

    fn deref(&self) -> &Template {
        &self.0
    }
}

impl fmt::Debug for FunctionTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionTemplate({:?})", self.handle())
    }
}
