//! The isolate: owner of the boundary transport and of all isolate-scoped
//! bridge state (callback registry, diagnostics, shared singletons).

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use otter_bridge_sys::{
    AccessMethod, Boundary, BoundaryArg, BoundaryReturn, FunctionCallback,
    INTERNAL_FIELD_COUNT_KEY, ManagedRef, NULL_REF,
};
use tracing::{debug, trace, warn};

use crate::config::IsolateConfig;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{BridgeError, BridgeResult};
use crate::handle::{Handle, HandleContent};
use crate::registry::{CallbackEntry, CallbackRegistry};
use crate::string::JsString;
use crate::value::Value;

static NEXT_ISOLATE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an isolate. Every handle carries the id of the isolate that
/// created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IsolateId(pub(crate) u64);

impl IsolateId {
    fn next() -> Self {
        Self(NEXT_ISOLATE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for IsolateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) struct IsolateInner {
    id: IsolateId,
    config: IsolateConfig,
    boundary: RefCell<Box<dyn Boundary>>,
    registry: RefCell<CallbackRegistry>,
    diagnostics: Diagnostics,
    undefined: Rc<Value>,
    internal_field_count_key: JsString,
}

/// A bridge isolate.
///
/// Cloning an `Isolate` clones a reference to the same isolate. Handles keep
/// only a weak link back; once the last `Isolate` is dropped every remaining
/// handle fails with [`BridgeError::IsolateDisposed`].
///
/// # Thread Safety
///
/// This type is `!Send` and `!Sync`. The managed runtime serves one thread per
/// isolate and the bridge relies on that instead of locking.
#[derive(Clone)]
pub struct Isolate {
    inner: Rc<IsolateInner>,
}

impl Isolate {
    /// Create an isolate over the given transport with default settings
    pub fn new(boundary: impl Boundary + 'static) -> BridgeResult<Self> {
        Self::with_config(boundary, IsolateConfig::default())
    }

    pub fn with_config(
        mut boundary: impl Boundary + 'static,
        config: IsolateConfig,
    ) -> BridgeResult<Self> {
        config.validate()?;
        let id = IsolateId::next();

        let undefined = expect_ref(
            AccessMethod::IsolateGetUndefined,
            boundary.call(AccessMethod::IsolateGetUndefined, &[])?,
        )?;
        let key = boundary
            .call(
                AccessMethod::StringNew,
                &[BoundaryArg::Utf8(INTERNAL_FIELD_COUNT_KEY)],
            )
            .map_err(BridgeError::from)
            .and_then(|ret| expect_ref(AccessMethod::StringNew, ret));
        let key = match key {
            Ok(key) => key,
            Err(e) => {
                if let Err(fault) =
                    boundary.call(AccessMethod::ValueRelease, &[BoundaryArg::Ref(undefined)])
                {
                    warn!(%fault, "Failed to release undefined after isolate setup error");
                }
                return Err(e);
            }
        };

        let registry = CallbackRegistry::new(config.first_function_template_id);
        let inner = Rc::new_cyclic(|weak: &Weak<IsolateInner>| IsolateInner {
            id,
            undefined: Rc::new(Value::copy_impl(Handle::from_parts(
                weak.clone(),
                id,
                undefined,
            ))),
            internal_field_count_key: JsString::copy_impl(Handle::from_parts(
                weak.clone(),
                id,
                key,
            )),
            boundary: RefCell::new(Box::new(boundary)),
            registry: RefCell::new(registry),
            diagnostics: Diagnostics::default(),
            config,
        });

        debug!(isolate = %id, name = ?inner.config.name, "Isolate created");
        Ok(Self { inner })
    }

    pub fn id(&self) -> IsolateId {
        self.inner.id
    }

    pub fn config(&self) -> &IsolateConfig {
        &self.inner.config
    }

    /// The shared `undefined` singleton. It is never duplicated: everyone who
    /// needs `undefined` shares this wrapper.
    pub fn undefined(&self) -> Rc<Value> {
        Rc::clone(&self.inner.undefined)
    }

    /// Reserved template key carrying the internal field count
    pub fn internal_field_count_key(&self) -> &JsString {
        &self.inner.internal_field_count_key
    }

    // ------------------------------------------------------------------
    // Callback registry
    // ------------------------------------------------------------------

    /// Allocate a fresh registration id
    pub fn next_function_template_id(&self) -> BridgeResult<u32> {
        self.inner.registry.borrow_mut().next_id()
    }

    pub fn set_function_template_data(&self, id: u32, data: Rc<Value>) {
        self.inner.registry.borrow_mut().set_data(id, data);
    }

    pub fn set_function_template_callback(&self, id: u32, callback: FunctionCallback) {
        self.inner.registry.borrow_mut().set_callback(id, callback);
    }

    pub fn function_template_callback(&self, id: u32) -> Option<FunctionCallback> {
        self.inner.registry.borrow().callback(id)
    }

    pub fn function_template_data(&self, id: u32) -> Option<Rc<Value>> {
        self.inner.registry.borrow().data(id)
    }

    /// Resolve both halves of a registration.
    ///
    /// This is what the dispatch path uses when the managed side hands an id
    /// back. An id with only one half stored is an error.
    pub fn callback_entry(&self, id: u32) -> BridgeResult<Option<CallbackEntry>> {
        self.inner.registry.borrow().entry(id)
    }

    /// Number of live registrations
    pub fn registered_callbacks(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    /// Allocate an id and store `callback` with its data.
    ///
    /// Without data the shared undefined singleton is stored. Caller data is
    /// duplicated and the duplicate is made weak: from then on the managed
    /// side's copy of the configuration is the owner of record.
    pub(crate) fn register_function_callback(
        &self,
        callback: FunctionCallback,
        data: Option<&Value>,
    ) -> BridgeResult<(u32, Rc<Value>)> {
        if let Some(value) = data {
            self.marshal(value.handle())?;
        }
        let data = match data {
            Some(value) if !std::ptr::eq(value, &*self.inner.undefined) => {
                let copy = value.copy()?;
                copy.make_weak()?;
                Rc::new(copy)
            }
            _ => self.undefined(),
        };

        let id = self.next_function_template_id()?;
        self.set_function_template_data(id, Rc::clone(&data));
        self.set_function_template_callback(id, callback);
        debug!(isolate = %self.id(), id, data = data.raw(), "Registered function callback");
        Ok((id, data))
    }

    /// Undo a registration whose boundary call failed
    pub(crate) fn unregister_function_callback(&self, id: u32) {
        let data = self.inner.registry.borrow_mut().remove(id);
        debug!(isolate = %self.id(), id, "Rolled back function callback");
        // released outside the registry borrow
        drop(data);
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.inner.diagnostics.snapshot()
    }

    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        self.inner.diagnostics.take()
    }

    pub(crate) fn report(&self, diagnostic: Diagnostic) {
        self.inner
            .diagnostics
            .report(self.inner.config.name.as_deref(), diagnostic);
    }

    // ------------------------------------------------------------------
    // Boundary calls
    // ------------------------------------------------------------------

    /// Marshal a handle as a call argument, rejecting foreign or empty ones
    /// before anything crosses the boundary.
    pub(crate) fn marshal(&self, handle: &Handle) -> BridgeResult<BoundaryArg<'static>> {
        if handle.isolate_id() != self.id() {
            return Err(BridgeError::WrongIsolate {
                expected: self.id(),
                actual: handle.isolate_id(),
            });
        }
        if handle.raw() == NULL_REF {
            return Err(BridgeError::NullHandle {
                operation: "marshal",
            });
        }
        Ok(BoundaryArg::Ref(handle.raw()))
    }

    pub(crate) fn marshal_optional(
        &self,
        handle: Option<&Handle>,
    ) -> BridgeResult<BoundaryArg<'static>> {
        match handle {
            Some(handle) => self.marshal(handle),
            None => Ok(BoundaryArg::Null),
        }
    }

    pub(crate) fn call(
        &self,
        method: AccessMethod,
        args: &[BoundaryArg<'_>],
    ) -> BridgeResult<BoundaryReturn> {
        if self.inner.config.trace_boundary_calls {
            trace!(isolate = %self.id(), %method, argc = args.len(), "Boundary call");
        }
        let mut boundary = self
            .inner
            .boundary
            .try_borrow_mut()
            .map_err(|_| BridgeError::ReentrantCall { method })?;
        Ok(boundary.call(method, args)?)
    }

    pub(crate) fn call_void(
        &self,
        method: AccessMethod,
        args: &[BoundaryArg<'_>],
    ) -> BridgeResult<()> {
        match self.call(method, args)? {
            BoundaryReturn::Void => Ok(()),
            _ => Err(BridgeError::UnexpectedReturn {
                method,
                expected: "nothing",
            }),
        }
    }

    pub(crate) fn call_ref(
        &self,
        method: AccessMethod,
        args: &[BoundaryArg<'_>],
    ) -> BridgeResult<Handle> {
        let raw = expect_ref(method, self.call(method, args)?)?;
        Ok(self.adopt(raw))
    }

    pub(crate) fn call_optional_ref(
        &self,
        method: AccessMethod,
        args: &[BoundaryArg<'_>],
    ) -> BridgeResult<Option<Handle>> {
        match self.call(method, args)? {
            BoundaryReturn::Void => Ok(None),
            BoundaryReturn::Ref(NULL_REF) => Ok(None),
            BoundaryReturn::Ref(raw) => Ok(Some(self.adopt(raw))),
            _ => Err(BridgeError::UnexpectedReturn {
                method,
                expected: "reference or nothing",
            }),
        }
    }

    pub(crate) fn call_bool(
        &self,
        method: AccessMethod,
        args: &[BoundaryArg<'_>],
    ) -> BridgeResult<bool> {
        match self.call(method, args)? {
            BoundaryReturn::Bool(b) => Ok(b),
            _ => Err(BridgeError::UnexpectedReturn {
                method,
                expected: "boolean",
            }),
        }
    }

    pub(crate) fn call_int(
        &self,
        method: AccessMethod,
        args: &[BoundaryArg<'_>],
    ) -> BridgeResult<i64> {
        match self.call(method, args)? {
            BoundaryReturn::Int(n) => Ok(n),
            _ => Err(BridgeError::UnexpectedReturn {
                method,
                expected: "integer",
            }),
        }
    }

    pub(crate) fn call_utf8(
        &self,
        method: AccessMethod,
        args: &[BoundaryArg<'_>],
    ) -> BridgeResult<String> {
        match self.call(method, args)? {
            BoundaryReturn::Utf8(s) => Ok(s),
            _ => Err(BridgeError::UnexpectedReturn {
                method,
                expected: "string",
            }),
        }
    }

    /// Give the native wrapper ownership of a fresh managed reference
    fn adopt(&self, raw: ManagedRef) -> Handle {
        Handle::from_parts(Rc::downgrade(&self.inner), self.id(), raw)
    }

    /// Release a managed reference. Used by `Handle`'s destructor.
    pub(crate) fn release_raw(&self, raw: ManagedRef) -> BridgeResult<()> {
        self.call_void(AccessMethod::ValueRelease, &[BoundaryArg::Ref(raw)])
    }

    pub(crate) fn from_inner(inner: Rc<IsolateInner>) -> Self {
        Self { inner }
    }
}

impl fmt::Debug for Isolate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Isolate")
            .field("id", &self.inner.id)
            .field("name", &self.inner.config.name)
            .finish()
    }
}

fn expect_ref(method: AccessMethod, ret: BoundaryReturn) -> BridgeResult<ManagedRef> {
    match ret {
        BoundaryReturn::Ref(raw) if raw != NULL_REF => Ok(raw),
        _ => Err(BridgeError::UnexpectedReturn {
            method,
            expected: "reference",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otter_bridge_local::LocalRuntime;

    fn isolate() -> Isolate {
        Isolate::new(LocalRuntime::new()).unwrap()
    }

    struct NoStrings(LocalRuntime);

    impl Boundary for NoStrings {
        fn call(
            &mut self,
            method: AccessMethod,
            args: &[BoundaryArg<'_>],
        ) -> Result<BoundaryReturn, otter_bridge_sys::BoundaryFault> {
            if method == AccessMethod::StringNew {
                return Err(otter_bridge_sys::BoundaryFault::new(
                    method,
                    otter_bridge_sys::FaultKind::Rejected,
                    "no strings",
                ));
            }
            self.0.call(method, args)
        }
    }

    #[test]
    fn test_failed_setup_releases_undefined() {
        let runtime = LocalRuntime::new();
        let err = Isolate::new(NoStrings(runtime.clone())).unwrap_err();
        assert!(matches!(err, BridgeError::Boundary { .. }));
        assert_eq!(
            runtime.calls(),
            vec![AccessMethod::IsolateGetUndefined, AccessMethod::ValueRelease]
        );
    }

    #[test]
    fn test_ids_are_distinct_per_isolate() {
        let a = isolate();
        let b = isolate();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn test_next_function_template_id_increases() {
        let isolate = isolate();
        let ids: Vec<u32> = (0..16)
            .map(|_| isolate.next_function_template_id().unwrap())
            .collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(ids[0], 1);
    }

    #[test]
    fn test_registries_are_isolate_scoped() {
        let a = isolate();
        let b = isolate();
        a.next_function_template_id().unwrap();
        a.next_function_template_id().unwrap();
        assert_eq!(b.next_function_template_id().unwrap(), 1);
    }

    #[test]
    fn test_undefined_is_shared() {
        let isolate = isolate();
        let first = isolate.undefined();
        let second = isolate.undefined();
        assert!(Rc::ptr_eq(&first, &second));
        assert!(first.is_undefined().unwrap());
    }

    #[test]
    fn test_config_is_validated() {
        let err = Isolate::with_config(
            LocalRuntime::new(),
            IsolateConfig::new().first_function_template_id(0),
        )
        .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidConfig(_)));
    }

    #[test]
    fn test_handles_outlive_isolate() {
        let isolate = isolate();
        let s = JsString::new(&isolate, "orphan").unwrap();
        drop(isolate);

        assert!(matches!(
            s.to_rust_string(),
            Err(BridgeError::IsolateDisposed)
        ));
    }
}
