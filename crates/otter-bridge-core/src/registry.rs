//! Isolate-scoped callback registry.
//!
//! Maps registration ids to the native function pointer and the data handle
//! that travel with it. The managed side only ever sees the id and the raw
//! address; it hands the id back at dispatch time.

use std::rc::Rc;

use otter_bridge_sys::FunctionCallback;
use rustc_hash::FxHashMap;

use crate::error::{BridgeError, BridgeResult};
use crate::value::Value;

/// A resolved registration
#[derive(Debug, Clone)]
pub struct CallbackEntry {
    pub id: u32,
    pub callback: FunctionCallback,
    pub data: Rc<Value>,
}

#[derive(Debug)]
pub(crate) struct CallbackRegistry {
    next_id: u32,
    callbacks: FxHashMap<u32, FunctionCallback>,
    data: FxHashMap<u32, Rc<Value>>,
}

impl CallbackRegistry {
    pub(crate) fn new(first_id: u32) -> Self {
        Self {
            next_id: first_id,
            callbacks: FxHashMap::default(),
            data: FxHashMap::default(),
        }
    }

    /// Ids are strictly increasing and never reused, so a stale id can never
    /// resolve to a newer registration. They cross the boundary as `i32`.
    pub(crate) fn next_id(&mut self) -> BridgeResult<u32> {
        let id = self.next_id;
        if id > i32::MAX as u32 {
            return Err(BridgeError::IdSpaceExhausted);
        }
        self.next_id = id + 1;
        Ok(id)
    }

    pub(crate) fn set_data(&mut self, id: u32, data: Rc<Value>) {
        self.data.insert(id, data);
    }

    pub(crate) fn set_callback(&mut self, id: u32, callback: FunctionCallback) {
        self.callbacks.insert(id, callback);
    }

    pub(crate) fn callback(&self, id: u32) -> Option<FunctionCallback> {
        self.callbacks.get(&id).copied()
    }

    pub(crate) fn data(&self, id: u32) -> Option<Rc<Value>> {
        self.data.get(&id).cloned()
    }

    pub(crate) fn entry(&self, id: u32) -> BridgeResult<Option<CallbackEntry>> {
        match (self.callbacks.get(&id), self.data.get(&id)) {
            (Some(callback), Some(data)) => Ok(Some(CallbackEntry {
                id,
                callback: *callback,
                data: Rc::clone(data),
            })),
            (None, None) => Ok(None),
            _ => Err(BridgeError::IncompleteRegistration { id }),
        }
    }

    /// Drop both halves of a registration. Returns the data handle, if any,
    /// so the caller decides when it is released.
    pub(crate) fn remove(&mut self, id: u32) -> Option<Rc<Value>> {
        self.callbacks.remove(&id);
        self.data.remove(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.len()
    }
}
