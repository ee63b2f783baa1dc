//! Managed heap: slots, the reference table and a mark/sweep collector.
//!
//! Native code never sees slot ids. It holds references, which are entries in
//! a separate table pointing at slots. A strong reference roots its slot; a
//! weak one only observes it. Configurations stored on templates hold slots
//! directly and are traced like any other edge.

use indexmap::IndexMap;
use otter_bridge_sys::{AccessMethod, BoundaryFault, FaultKind, ManagedRef};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

pub(crate) type SlotId = u64;

#[derive(Debug, Clone)]
pub(crate) struct AccessorData {
    pub(crate) getter: u64,
    pub(crate) setter: u64,
    pub(crate) data: SlotId,
    pub(crate) signature: Option<SlotId>,
    pub(crate) attributes: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct InterceptorData {
    /// getter, setter, query, deleter, enumerator
    pub(crate) callbacks: [u64; 5],
    pub(crate) data: Option<SlotId>,
    pub(crate) only_intercept_strings: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct CallAsFunctionData {
    pub(crate) id: i32,
    pub(crate) callback: u64,
    pub(crate) data: SlotId,
}

/// Template properties: name -> (value, attributes), in insertion order
pub(crate) type Properties = IndexMap<String, (SlotId, u32)>;

#[derive(Debug, Default)]
pub(crate) struct ObjectTemplateData {
    pub(crate) properties: Properties,
    pub(crate) accessors: IndexMap<String, AccessorData>,
    pub(crate) named_handler: Option<InterceptorData>,
    pub(crate) indexed_handler: Option<InterceptorData>,
    pub(crate) call_as_function: Option<CallAsFunctionData>,
}

#[derive(Debug)]
pub(crate) struct FunctionTemplateData {
    pub(crate) callback_id: i32,
    pub(crate) callback: u64,
    pub(crate) data: SlotId,
    pub(crate) signature: Option<SlotId>,
    pub(crate) class_name: Option<String>,
    pub(crate) instance_template: Option<SlotId>,
    pub(crate) properties: Properties,
}

#[derive(Debug)]
pub(crate) struct ObjectData {
    pub(crate) properties: IndexMap<String, SlotId>,
    pub(crate) internal_fields: u32,
    /// Object template the object was instantiated from
    pub(crate) template: Option<SlotId>,
}

#[derive(Debug)]
pub(crate) enum Slot {
    Undefined,
    Integer(i64),
    String(String),
    Object(ObjectData),
    Context { disposed: bool },
    ObjectTemplate(ObjectTemplateData),
    FunctionTemplate(FunctionTemplateData),
    Function { template: SlotId },
}

impl Slot {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Slot::Undefined => "undefined",
            Slot::Integer(_) => "integer",
            Slot::String(_) => "string",
            Slot::Object(_) => "object",
            Slot::Context { .. } => "context",
            Slot::ObjectTemplate(_) => "object template",
            Slot::FunctionTemplate(_) => "function template",
            Slot::Function { .. } => "function",
        }
    }

    fn trace(&self, out: &mut Vec<SlotId>) {
        fn properties(props: &Properties, out: &mut Vec<SlotId>) {
            out.extend(props.values().map(|(slot, _)| *slot));
        }

        match self {
            Slot::Object(object) => {
                out.extend(object.properties.values().copied());
                out.extend(object.template);
            }
            Slot::ObjectTemplate(template) => {
                properties(&template.properties, out);
                for accessor in template.accessors.values() {
                    out.push(accessor.data);
                    out.extend(accessor.signature);
                }
                for handler in [&template.named_handler, &template.indexed_handler]
                    .into_iter()
                    .flatten()
                {
                    out.extend(handler.data);
                }
                if let Some(call) = &template.call_as_function {
                    out.push(call.data);
                }
            }
            Slot::FunctionTemplate(template) => {
                out.push(template.data);
                out.extend(template.signature);
                out.extend(template.instance_template);
                properties(&template.properties, out);
            }
            Slot::Function { template } => out.push(*template),
            Slot::Undefined | Slot::Integer(_) | Slot::String(_) | Slot::Context { .. } => {}
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RefEntry {
    pub(crate) slot: SlotId,
    pub(crate) weak: bool,
}

#[derive(Debug)]
pub(crate) struct Heap {
    slots: FxHashMap<SlotId, Slot>,
    refs: FxHashMap<ManagedRef, RefEntry>,
    next_slot: SlotId,
    next_ref: ManagedRef,
    undefined: SlotId,
}

impl Default for Heap {
    fn default() -> Self {
        let mut heap = Self {
            slots: FxHashMap::default(),
            refs: FxHashMap::default(),
            next_slot: 1,
            // 0 is the null reference
            next_ref: 1,
            undefined: 0,
        };
        heap.undefined = heap.alloc(Slot::Undefined);
        heap
    }
}

impl Heap {
    pub(crate) fn undefined(&self) -> SlotId {
        self.undefined
    }

    pub(crate) fn alloc(&mut self, slot: Slot) -> SlotId {
        let id = self.next_slot;
        self.next_slot += 1;
        self.slots.insert(id, slot);
        id
    }

    /// Hand out a new strong reference to `slot`
    pub(crate) fn new_ref(&mut self, slot: SlotId) -> ManagedRef {
        let raw = self.next_ref;
        self.next_ref += 1;
        self.refs.insert(raw, RefEntry { slot, weak: false });
        raw
    }

    pub(crate) fn entry(&self, raw: ManagedRef) -> Option<RefEntry> {
        self.refs.get(&raw).copied()
    }

    pub(crate) fn is_live(&self, slot: SlotId) -> bool {
        self.slots.contains_key(&slot)
    }

    pub(crate) fn live_slots(&self) -> usize {
        self.slots.len()
    }

    /// Resolve a reference to its live slot
    pub(crate) fn resolve(
        &self,
        method: AccessMethod,
        raw: ManagedRef,
    ) -> Result<SlotId, BoundaryFault> {
        let Some(entry) = self.refs.get(&raw) else {
            return Err(BoundaryFault::new(
                method,
                FaultKind::InvalidReference,
                format!("unknown reference {}", raw),
            ));
        };
        if !self.slots.contains_key(&entry.slot) {
            return Err(BoundaryFault::new(
                method,
                FaultKind::DanglingReference,
                format!("target of weak reference {} was collected", raw),
            ));
        }
        Ok(entry.slot)
    }

    pub(crate) fn make_weak(&mut self, raw: ManagedRef) {
        if let Some(entry) = self.refs.get_mut(&raw) {
            entry.weak = true;
        }
    }

    pub(crate) fn release(&mut self, raw: ManagedRef) -> Option<RefEntry> {
        self.refs.remove(&raw)
    }

    pub(crate) fn slot(&self, id: SlotId) -> Option<&Slot> {
        self.slots.get(&id)
    }

    pub(crate) fn slot_mut(&mut self, id: SlotId) -> Option<&mut Slot> {
        self.slots.get_mut(&id)
    }

    /// Mark from `undefined` and every strong reference, then sweep.
    ///
    /// Returns the number of slots freed. Weak references to freed slots stay
    /// in the table and fault as dangling on their next use.
    pub(crate) fn collect(&mut self) -> usize {
        let mut marked = FxHashSet::default();
        let mut stack: Vec<SlotId> = self
            .refs
            .values()
            .filter(|entry| !entry.weak)
            .map(|entry| entry.slot)
            .collect();
        stack.push(self.undefined);

        while let Some(id) = stack.pop() {
            if !marked.insert(id) {
                continue;
            }
            if let Some(slot) = self.slots.get(&id) {
                slot.trace(&mut stack);
            }
        }

        let before = self.slots.len();
        self.slots.retain(|id, _| marked.contains(id));
        let freed = before - self.slots.len();
        debug!(freed, live = self.slots.len(), "Collected managed heap");
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_refs_root_slots() {
        let mut heap = Heap::default();
        let s = heap.alloc(Slot::String("kept".into()));
        let raw = heap.new_ref(s);
        let lost = heap.alloc(Slot::Integer(1));

        assert_eq!(heap.collect(), 1);
        assert!(heap.is_live(s));
        assert!(!heap.is_live(lost));
        assert_eq!(heap.resolve(AccessMethod::ValueCopy, raw).unwrap(), s);
    }

    #[test]
    fn test_weak_ref_dangles_after_collect() {
        let mut heap = Heap::default();
        let s = heap.alloc(Slot::String("gone".into()));
        let raw = heap.new_ref(s);
        heap.make_weak(raw);
        heap.collect();

        let fault = heap.resolve(AccessMethod::StringUtf8, raw).unwrap_err();
        assert_eq!(fault.kind, FaultKind::DanglingReference);
    }

    #[test]
    fn test_template_configuration_is_traced() {
        let mut heap = Heap::default();
        let data = heap.alloc(Slot::String("payload".into()));
        let data_ref = heap.new_ref(data);
        heap.make_weak(data_ref);

        let template = heap.alloc(Slot::ObjectTemplate(ObjectTemplateData {
            call_as_function: Some(CallAsFunctionData {
                id: 1,
                callback: 0,
                data,
            }),
            ..Default::default()
        }));
        let _template_ref = heap.new_ref(template);

        heap.collect();
        assert!(heap.is_live(data));
    }

    #[test]
    fn test_unknown_reference() {
        let heap = Heap::default();
        let fault = heap.resolve(AccessMethod::ValueCopy, 42).unwrap_err();
        assert_eq!(fault.kind, FaultKind::InvalidReference);
    }
}
