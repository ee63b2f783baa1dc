//! Native wrappers around managed references
//!
//! A [`Handle`] owns exactly one managed reference. It is never cloned:
//! duplication asks the managed side for a fresh reference, so two wrappers
//! never share one reference silently.

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Weak;

use otter_bridge_sys::{AccessMethod, ManagedRef};
use tracing::{debug, warn};

use crate::error::{BridgeError, BridgeResult};
use crate::isolate::{Isolate, IsolateId, IsolateInner};

/// An owned managed reference with isolate affinity
///
/// When dropped, the managed reference is released. A handle that was made
/// weak no longer keeps its target alive; releasing it only drops the
/// observation.
///
/// # Thread Safety
///
/// This type is `!Send` and `!Sync`: references are only meaningful on the
/// thread that owns their isolate.
pub struct Handle {
    raw: ManagedRef,
    isolate: Weak<IsolateInner>,
    isolate_id: IsolateId,
    weak: Cell<bool>,
    /// Marker to make this type !Send + !Sync
    _not_send: PhantomData<*mut ()>,
}

impl Handle {
    pub(crate) fn from_parts(
        isolate: Weak<IsolateInner>,
        isolate_id: IsolateId,
        raw: ManagedRef,
    ) -> Self {
        Self {
            raw,
            isolate,
            isolate_id,
            weak: Cell::new(false),
            _not_send: PhantomData,
        }
    }

    /// Get the raw managed reference
    pub fn raw(&self) -> ManagedRef {
        self.raw
    }

    /// Id of the isolate this handle belongs to
    pub fn isolate_id(&self) -> IsolateId {
        self.isolate_id
    }

    /// Check if the reference was made weak
    pub fn is_weak(&self) -> bool {
        self.weak.get()
    }

    /// Get the owning isolate
    pub fn isolate(&self) -> BridgeResult<Isolate> {
        self.isolate
            .upgrade()
            .map(Isolate::from_inner)
            .ok_or(BridgeError::IsolateDisposed)
    }

    /// Obtain a new, strong managed reference to the same value
    pub fn duplicate(&self) -> BridgeResult<Handle> {
        let isolate = self.isolate()?;
        isolate.call_ref(AccessMethod::ValueCopy, &[isolate.marshal(self)?])
    }

    /// Stop keeping the target alive from the native side.
    ///
    /// Whoever else retains the target (typically a configuration stored by
    /// the managed side) becomes its only owner. If nobody does, the next
    /// access after a collection fails with a dangling-reference fault.
    pub fn make_weak(&self) -> BridgeResult<()> {
        if self.weak.get() {
            return Ok(());
        }
        let isolate = self.isolate()?;
        isolate.call_void(AccessMethod::ValueMakeWeak, &[isolate.marshal(self)?])?;
        self.weak.set(true);
        debug!(isolate = %self.isolate_id, raw = self.raw, "Handle made weak");
        Ok(())
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        let Some(inner) = self.isolate.upgrade() else {
            return;
        };
        if let Err(e) = Isolate::from_inner(inner).release_raw(self.raw) {
            warn!(raw = self.raw, error = %e, "Failed to release managed reference");
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Handle({}@{}{})",
            self.raw,
            self.isolate_id,
            if self.weak.get() { ", weak" } else { "" }
        )
    }
}

/// Common behavior of every typed wrapper around a [`Handle`].
pub trait HandleContent: Sized {
    fn handle(&self) -> &Handle;

    /// Wrap a freshly duplicated handle in the same concrete type.
    ///
    /// Each wrapper implements this itself so that copying an
    /// `ObjectTemplate` yields an `ObjectTemplate`, not a generic value.
    fn copy_impl(handle: Handle) -> Self;

    /// Duplicate the managed reference and wrap it in the same type
    fn copy(&self) -> BridgeResult<Self> {
        self.handle().duplicate().map(Self::copy_impl)
    }

    fn make_weak(&self) -> BridgeResult<()> {
        self.handle().make_weak()
    }

    fn raw(&self) -> ManagedRef {
        self.handle().raw()
    }

    fn isolate(&self) -> BridgeResult<Isolate> {
        self.handle().isolate()
    }
}
