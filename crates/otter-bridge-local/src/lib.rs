//! In-process managed runtime for the otter bridge
//!
//! [`LocalRuntime`] implements [`Boundary`] on top of a small traced heap. It
//! stores template configuration the way a real managed side would, enforces
//! the reference table (strong, weak, released), and exposes read-only
//! inspection for tests: call log, reference liveness and template snapshots.
//!
//! Clones share the same heap, so a test can hand one clone to an isolate and
//! keep another for inspection.
//!
//! ```
//! use otter_bridge_local::LocalRuntime;
//! use otter_bridge_sys::{AccessMethod, Boundary, BoundaryArg, BoundaryReturn};
//!
//! let mut runtime = LocalRuntime::new();
//! let ret = runtime
//!     .call(AccessMethod::StringNew, &[BoundaryArg::Utf8("hi")])
//!     .unwrap();
//! let BoundaryReturn::Ref(raw) = ret else { unreachable!() };
//! assert!(runtime.is_alive(raw));
//! assert_eq!(runtime.last_call(), Some(AccessMethod::StringNew));
//! ```

mod args;
mod dispatch;
mod heap;
mod snapshot;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use otter_bridge_sys::{
    AccessMethod, Boundary, BoundaryArg, BoundaryFault, BoundaryReturn, FaultKind, ManagedRef,
};
use tracing::{debug, trace};

use crate::heap::{Heap, Slot};

pub use snapshot::{
    AccessorSnapshot, CallAsFunctionSnapshot, FunctionTemplateSnapshot, InterceptorSnapshot,
    ObjectTemplateSnapshot, PropertySnapshot,
};

#[derive(Debug, Default)]
struct State {
    heap: Heap,
    calls: Vec<AccessMethod>,
    rejection: Option<String>,
}

/// A managed runtime living in the same process
#[derive(Clone, Default)]
pub struct LocalRuntime {
    state: Rc<RefCell<State>>,
}

impl LocalRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Heap
    // ------------------------------------------------------------------

    /// Run a full collection, returning the number of cells freed
    pub fn collect(&self) -> usize {
        self.state.borrow_mut().heap.collect()
    }

    /// Identity of the cell a reference points at, even if it was collected
    pub fn cell_of(&self, raw: ManagedRef) -> Option<u64> {
        self.state.borrow().heap.entry(raw).map(|entry| entry.slot)
    }

    /// Check if the reference exists and its target is still allocated
    pub fn is_alive(&self, raw: ManagedRef) -> bool {
        let state = self.state.borrow();
        state
            .heap
            .entry(raw)
            .is_some_and(|entry| state.heap.is_live(entry.slot))
    }

    pub fn is_cell_live(&self, cell: u64) -> bool {
        self.state.borrow().heap.is_live(cell)
    }

    /// Check if the reference is still in the table (not released)
    pub fn has_reference(&self, raw: ManagedRef) -> bool {
        self.state.borrow().heap.entry(raw).is_some()
    }

    pub fn is_weak(&self, raw: ManagedRef) -> bool {
        self.state
            .borrow()
            .heap
            .entry(raw)
            .is_some_and(|entry| entry.weak)
    }

    pub fn live_cells(&self) -> usize {
        self.state.borrow().heap.live_slots()
    }

    // ------------------------------------------------------------------
    // Call log
    // ------------------------------------------------------------------

    pub fn call_count(&self) -> usize {
        self.state.borrow().calls.len()
    }

    pub fn last_call(&self) -> Option<AccessMethod> {
        self.state.borrow().calls.last().copied()
    }

    pub fn calls(&self) -> Vec<AccessMethod> {
        self.state.borrow().calls.clone()
    }

    /// Make the next call fail with a `Rejected` fault carrying `message`
    pub fn reject_next_call(&self, message: impl Into<String>) {
        self.state.borrow_mut().rejection = Some(message.into());
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Stored configuration of the object template behind `raw`
    pub fn object_template(&self, raw: ManagedRef) -> Option<ObjectTemplateSnapshot> {
        let state = self.state.borrow();
        let entry = state.heap.entry(raw)?;
        match state.heap.slot(entry.slot)? {
            Slot::ObjectTemplate(template) => {
                Some(snapshot::object_template(&state.heap, template))
            }
            _ => None,
        }
    }

    /// Stored configuration of the function template behind `raw`
    pub fn function_template(&self, raw: ManagedRef) -> Option<FunctionTemplateSnapshot> {
        let state = self.state.borrow();
        let entry = state.heap.entry(raw)?;
        match state.heap.slot(entry.slot)? {
            Slot::FunctionTemplate(template) => Some(snapshot::function_template(template)),
            _ => None,
        }
    }

    /// Own property names of the object behind `raw`, in insertion order
    pub fn object_property_names(&self, raw: ManagedRef) -> Option<Vec<String>> {
        let state = self.state.borrow();
        let entry = state.heap.entry(raw)?;
        match state.heap.slot(entry.slot)? {
            Slot::Object(object) => Some(object.properties.keys().cloned().collect()),
            _ => None,
        }
    }
}

impl Boundary for LocalRuntime {
    fn call(
        &mut self,
        method: AccessMethod,
        args: &[BoundaryArg<'_>],
    ) -> Result<BoundaryReturn, BoundaryFault> {
        let mut state = self.state.borrow_mut();
        state.calls.push(method);
        trace!(%method, argc = args.len(), "Local boundary call");

        if let Some(message) = state.rejection.take() {
            debug!(%method, %message, "Rejecting call");
            return Err(BoundaryFault::new(method, FaultKind::Rejected, message));
        }
        state.heap.dispatch(method, args)
    }
}

impl fmt::Debug for LocalRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("LocalRuntime")
            .field("live_cells", &state.heap.live_slots())
            .field("calls", &state.calls.len())
            .finish()
    }
}
