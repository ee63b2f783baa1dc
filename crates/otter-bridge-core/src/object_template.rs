//! Object templates: blueprints the managed runtime instantiates objects from

use std::cell::Cell;
use std::fmt;
use std::ops::Deref;

use otter_bridge_sys::{
    AccessMethod, AccessorGetterCallback, AccessorSetterCallback, BoundaryArg, FunctionCallback,
    NamedPropertyDeleterCallback, NamedPropertyEnumeratorCallback, NamedPropertyGetterCallback,
    NamedPropertyQueryCallback, NamedPropertySetterCallback, callback_address,
};
use tracing::debug;

use crate::context::Context;
use crate::diagnostics::Diagnostic;
use crate::error::BridgeResult;
use crate::function_template::FunctionTemplate;
use crate::handle::{Handle, HandleContent};
use crate::isolate::Isolate;
use crate::property_handler::PropertyHandlerConfiguration;
use crate::string::JsString;
use crate::template::{AccessControl, PropertyAttribute, Template};
use crate::value::{Integer, Object, Value};

/// Blueprint of a managed object.
///
/// Every setter issues exactly one boundary call and replaces whatever the
/// same slot held before. Accessors are the exception only in that they are
/// keyed by name: different names accumulate.
pub struct ObjectTemplate {
    template: Template,
    internal_field_count: Cell<u32>,
}

impl HandleContent for ObjectTemplate {
    fn handle(&self) -> &Handle {
        self.template.handle()
    }

    fn copy_impl(handle: Handle) -> Self {
        Self {
            template: Template::copy_impl(handle),
            internal_field_count: Cell::new(0),
        }
    }

    fn copy(&self) -> BridgeResult<Self> {
        let copy = Self::copy_impl(self.handle().duplicate()?);
        copy.internal_field_count.set(self.internal_field_count.get());
        Ok(copy)
    }
}

impl ObjectTemplate {
    /// Create a new object template.
    ///
    /// Linking a constructor is not supported yet. Passing one is reported as
    /// an unsupported-feature diagnostic and the template is created without
    /// it.
    pub fn new(isolate: &Isolate, constructor: Option<&FunctionTemplate>) -> BridgeResult<Self> {
        if constructor.is_some() {
            isolate.report(Diagnostic::unsupported(
                "ObjectTemplate::new",
                "constructor argument is not supported yet",
            ));
        }
        isolate
            .call_ref(AccessMethod::ObjectTemplateNew, &[])
            .map(Self::copy_impl)
    }

    /// Materialize an object from this template inside `context`
    pub fn new_instance(&self, context: &Context) -> BridgeResult<Object> {
        let isolate = self.isolate()?;
        isolate
            .call_ref(
                AccessMethod::ObjectTemplateNewInstance,
                &[isolate.marshal(context.handle())?, isolate.marshal(self.handle())?],
            )
            .map(Object::copy_impl)
    }

    /// Number of internal fields instances will reserve
    pub fn internal_field_count(&self) -> u32 {
        self.internal_field_count.get()
    }

    /// Record the internal field count and publish it as a non-enumerable
    /// template property under the isolate's reserved key.
    pub fn set_internal_field_count(&self, count: u32) -> BridgeResult<()> {
        let isolate = self.isolate()?;
        let value = Integer::new(&isolate, i64::from(count))?;
        self.template.set(
            isolate.internal_field_count_key(),
            &value,
            PropertyAttribute::DONT_ENUM,
        )?;
        self.internal_field_count.set(count);
        Ok(())
    }

    /// Register an accessor property.
    ///
    /// `data` defaults to `undefined`. `signature` restricts the accessor to
    /// receivers the managed side recognizes as instances of that template.
    #[allow(clippy::too_many_arguments)]
    pub fn set_accessor(
        &self,
        name: &JsString,
        getter: AccessorGetterCallback,
        setter: AccessorSetterCallback,
        data: Option<&Value>,
        _settings: AccessControl,
        attributes: PropertyAttribute,
        signature: Option<&FunctionTemplate>,
    ) -> BridgeResult<()> {
        let isolate = self.isolate()?;
        let undefined = isolate.undefined();
        let data = data.unwrap_or(&undefined);
        isolate.call_void(
            AccessMethod::ObjectTemplateSetAccessor,
            &[
                isolate.marshal(self.handle())?,
                isolate.marshal(name.handle())?,
                BoundaryArg::address(callback_address!(getter)),
                BoundaryArg::address(callback_address!(setter)),
                isolate.marshal(data.handle())?,
                isolate.marshal_optional(signature.map(|s| s.handle()))?,
                BoundaryArg::Int(attributes.bits() as i32),
            ],
        )
    }

    /// Register a named interceptor with the legacy five-callback shape.
    ///
    /// Same effect as [`set_handler`](Self::set_handler) with a named
    /// configuration that intercepts symbols too.
    pub fn set_named_property_handler(
        &self,
        getter: NamedPropertyGetterCallback,
        setter: NamedPropertySetterCallback,
        query: NamedPropertyQueryCallback,
        deleter: NamedPropertyDeleterCallback,
        enumerator: NamedPropertyEnumeratorCallback,
        data: Option<&Value>,
    ) -> BridgeResult<()> {
        let isolate = self.isolate()?;
        isolate.call_void(
            AccessMethod::ObjectTemplateSetNamedPropertyHandler,
            &[
                isolate.marshal(self.handle())?,
                BoundaryArg::address(callback_address!(getter)),
                BoundaryArg::address(callback_address!(setter)),
                BoundaryArg::address(callback_address!(query)),
                BoundaryArg::address(callback_address!(deleter)),
                BoundaryArg::address(callback_address!(enumerator)),
                isolate.marshal_optional(data.map(|d| d.handle()))?,
            ],
        )
    }

    /// Install a named or indexed interceptor, replacing the active one of
    /// the same kind.
    pub fn set_handler<'a>(
        &self,
        configuration: impl Into<PropertyHandlerConfiguration<'a>>,
    ) -> BridgeResult<()> {
        let configuration = configuration.into();
        let erased = configuration.erase();
        let isolate = self.isolate()?;
        let [getter, setter, query, deleter, enumerator] = erased.slots;
        isolate.call_void(
            AccessMethod::ObjectTemplateSetHandler,
            &[
                isolate.marshal(self.handle())?,
                BoundaryArg::address(getter),
                BoundaryArg::address(setter),
                BoundaryArg::address(query),
                BoundaryArg::address(deleter),
                BoundaryArg::address(enumerator),
                isolate.marshal_optional(erased.data.map(|d| d.handle()))?,
                BoundaryArg::Bool(erased.named),
                BoundaryArg::Bool(erased.only_intercept_strings),
            ],
        )
    }

    /// Make instances callable as functions.
    ///
    /// The callback is registered under a fresh id together with its data.
    /// Caller data is duplicated and the duplicate made weak, so the stored
    /// configuration on the managed side is what keeps it alive. Without data
    /// the isolate's shared `undefined` is used as is.
    pub fn set_call_as_function_handler(
        &self,
        callback: FunctionCallback,
        data: Option<&Value>,
    ) -> BridgeResult<()> {
        let isolate = self.isolate()?;
        let this = isolate.marshal(self.handle())?;
        let (id, data) = isolate.register_function_callback(callback, data)?;

        let result = isolate.marshal(data.handle()).and_then(|data_arg| {
            isolate.call_void(
                AccessMethod::ObjectTemplateSetCallAsFunctionHandler,
                &[
                    this,
                    BoundaryArg::Int(id as i32),
                    BoundaryArg::address(callback_address!(callback)),
                    data_arg,
                ],
            )
        });
        if let Err(e) = result {
            drop(data);
            isolate.unregister_function_callback(id);
            return Err(e);
        }
        debug!(isolate = %isolate.id(), id, "Call-as-function handler installed");
        Ok(())
    }
}

impl Deref for ObjectTemplate {
    type Target = Template;

    fn deref(&self) -> &Template {
        &self.template
    }
}

impl fmt::Debug for ObjectTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectTemplate")
            .field("handle", self.handle())
            .field("internal_field_count", &self.internal_field_count.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otter_bridge_local::LocalRuntime;
    use otter_bridge_sys::{AccessMethod, FunctionCallbackInfoRef};

    unsafe extern "C" fn call_me(_info: FunctionCallbackInfoRef) {}

    #[test]
    fn test_one_boundary_call_per_setter() {
        let runtime = LocalRuntime::new();
        let isolate = Isolate::new(runtime.clone()).unwrap();
        let template = ObjectTemplate::new(&isolate, None).unwrap();

        let before = runtime.call_count();
        template.set_call_as_function_handler(Some(call_me), None).unwrap();
        assert_eq!(runtime.call_count(), before + 1);
        assert_eq!(
            runtime.last_call(),
            Some(AccessMethod::ObjectTemplateSetCallAsFunctionHandler)
        );
    }

    #[test]
    fn test_copy_keeps_concrete_type_and_count() {
        let runtime = LocalRuntime::new();
        let isolate = Isolate::new(runtime.clone()).unwrap();
        let template = ObjectTemplate::new(&isolate, None).unwrap();
        template.set_internal_field_count(3).unwrap();

        let copy: ObjectTemplate = template.copy().unwrap();
        assert_ne!(copy.raw(), template.raw());
        assert_eq!(copy.internal_field_count(), 3);
        assert_eq!(runtime.cell_of(copy.raw()), runtime.cell_of(template.raw()));
    }

    #[test]
    fn test_internal_field_count_is_template_property() {
        let isolate = Isolate::new(LocalRuntime::new()).unwrap();
        let template = ObjectTemplate::new(&isolate, None).unwrap();
        assert!(
            template
                .get(isolate.internal_field_count_key())
                .unwrap()
                .is_none()
        );

        template.set_internal_field_count(2).unwrap();
        template.set_internal_field_count(5).unwrap();

        let stored = template
            .get(isolate.internal_field_count_key())
            .unwrap()
            .unwrap();
        assert_eq!(stored.cast::<Integer>().value().unwrap(), 5);
        assert_eq!(template.internal_field_count(), 5);
    }

    #[test]
    fn test_failed_registration_rolls_back() {
        let runtime = LocalRuntime::new();
        let isolate = Isolate::new(runtime.clone()).unwrap();
        let template = ObjectTemplate::new(&isolate, None).unwrap();
        runtime.reject_next_call("managed side is shutting down");

        let err = template
            .set_call_as_function_handler(Some(call_me), None)
            .unwrap_err();
        assert!(err.to_string().contains("shutting down"));
        assert_eq!(isolate.registered_callbacks(), 0);

        // the failed id stays retired
        template.set_call_as_function_handler(Some(call_me), None).unwrap();
        let entry = isolate.callback_entry(2).unwrap().unwrap();
        assert_eq!(entry.id, 2);
        assert!(isolate.callback_entry(1).unwrap().is_none());
    }
}
