//! Opcode dispatch
//!
//! Each arm decodes its arguments, validates every reference, and only then
//! mutates the heap. A failing call leaves no trace.

use indexmap::IndexMap;
use otter_bridge_sys::{
    AccessMethod, BoundaryArg, BoundaryFault, BoundaryReturn, FaultKind, INTERNAL_FIELD_COUNT_KEY,
};

use crate::args::Args;
use crate::heap::{
    AccessorData, CallAsFunctionData, FunctionTemplateData, Heap, InterceptorData, ObjectData,
    ObjectTemplateData, Properties, Slot, SlotId,
};

fn wrong_kind(method: AccessMethod, expected: &str, found: Option<&Slot>) -> BoundaryFault {
    BoundaryFault::new(
        method,
        FaultKind::WrongKind,
        format!(
            "expected {}, found {}",
            expected,
            found.map_or("nothing", Slot::kind)
        ),
    )
}

impl Heap {
    pub(crate) fn dispatch(
        &mut self,
        method: AccessMethod,
        raw: &[BoundaryArg<'_>],
    ) -> Result<BoundaryReturn, BoundaryFault> {
        use AccessMethod as M;

        match method {
            M::IsolateGetUndefined => {
                Args::new(method, raw, 0)?;
                let undefined = self.undefined();
                Ok(BoundaryReturn::Ref(self.new_ref(undefined)))
            }

            M::ValueCopy => {
                let args = Args::new(method, raw, 1)?;
                let slot = self.resolve(method, args.reference(0)?)?;
                Ok(BoundaryReturn::Ref(self.new_ref(slot)))
            }
            M::ValueMakeWeak => {
                let args = Args::new(method, raw, 1)?;
                let reference = args.reference(0)?;
                self.resolve(method, reference)?;
                self.make_weak(reference);
                Ok(BoundaryReturn::Void)
            }
            M::ValueRelease => {
                let args = Args::new(method, raw, 1)?;
                let reference = args.reference(0)?;
                // dangling weak references can still be released
                match self.release(reference) {
                    Some(_) => Ok(BoundaryReturn::Void),
                    None => Err(BoundaryFault::new(
                        method,
                        FaultKind::InvalidReference,
                        format!("unknown reference {}", reference),
                    )),
                }
            }
            M::ValueIsUndefined => {
                let args = Args::new(method, raw, 1)?;
                let slot = self.resolve(method, args.reference(0)?)?;
                Ok(BoundaryReturn::Bool(slot == self.undefined()))
            }
            M::ValueStrictEquals => {
                let args = Args::new(method, raw, 2)?;
                let a = self.resolve(method, args.reference(0)?)?;
                let b = self.resolve(method, args.reference(1)?)?;
                let equal = a == b
                    || match (self.slot(a), self.slot(b)) {
                        (Some(Slot::Integer(x)), Some(Slot::Integer(y))) => x == y,
                        (Some(Slot::String(x)), Some(Slot::String(y))) => x == y,
                        _ => false,
                    };
                Ok(BoundaryReturn::Bool(equal))
            }

            M::StringNew => {
                let args = Args::new(method, raw, 1)?;
                let slot = self.alloc(Slot::String(args.utf8(0)?.to_owned()));
                Ok(BoundaryReturn::Ref(self.new_ref(slot)))
            }
            M::StringUtf8 => {
                let args = Args::new(method, raw, 1)?;
                let slot = self.resolve(method, args.reference(0)?)?;
                self.string(method, slot).map(BoundaryReturn::Utf8)
            }
            M::IntegerNew => {
                let args = Args::new(method, raw, 1)?;
                let slot = self.alloc(Slot::Integer(args.long(0)?));
                Ok(BoundaryReturn::Ref(self.new_ref(slot)))
            }
            M::IntegerValue => {
                let args = Args::new(method, raw, 1)?;
                let slot = self.resolve(method, args.reference(0)?)?;
                match self.slot(slot) {
                    Some(Slot::Integer(n)) => Ok(BoundaryReturn::Int(*n)),
                    other => Err(wrong_kind(method, "integer", other)),
                }
            }

            M::ContextNew => {
                Args::new(method, raw, 0)?;
                let slot = self.alloc(Slot::Context { disposed: false });
                Ok(BoundaryReturn::Ref(self.new_ref(slot)))
            }
            M::ContextDispose => {
                let args = Args::new(method, raw, 1)?;
                let slot = self.resolve(method, args.reference(0)?)?;
                match self.slot_mut(slot) {
                    Some(Slot::Context { disposed }) => {
                        *disposed = true;
                        Ok(BoundaryReturn::Void)
                    }
                    other => Err(wrong_kind(method, "context", other.map(|s| &*s))),
                }
            }

            M::ObjectNew => {
                let args = Args::new(method, raw, 1)?;
                let context = self.resolve(method, args.reference(0)?)?;
                self.check_context(method, context)?;
                let slot = self.alloc(Slot::Object(ObjectData {
                    properties: IndexMap::new(),
                    internal_fields: 0,
                    template: None,
                }));
                Ok(BoundaryReturn::Ref(self.new_ref(slot)))
            }
            M::ObjectInternalFieldCount => {
                let args = Args::new(method, raw, 1)?;
                let slot = self.resolve(method, args.reference(0)?)?;
                match self.slot(slot) {
                    Some(Slot::Object(object)) => {
                        Ok(BoundaryReturn::Int(i64::from(object.internal_fields)))
                    }
                    other => Err(wrong_kind(method, "object", other)),
                }
            }

            M::TemplateSet => {
                let args = Args::new(method, raw, 4)?;
                let template = self.resolve(method, args.reference(0)?)?;
                let name = self.resolve(method, args.reference(1)?)?;
                let value = self.resolve(method, args.reference(2)?)?;
                let attributes = args.int(3)? as u32;
                let name = self.string(method, name)?;
                self.properties_mut(method, template)?
                    .insert(name, (value, attributes));
                Ok(BoundaryReturn::Void)
            }
            M::TemplateGet => {
                let args = Args::new(method, raw, 2)?;
                let template = self.resolve(method, args.reference(0)?)?;
                let name = self.resolve(method, args.reference(1)?)?;
                let name = self.string(method, name)?;
                let found = self.properties_mut(method, template)?.get(&name).copied();
                Ok(match found {
                    Some((value, _)) => BoundaryReturn::Ref(self.new_ref(value)),
                    None => BoundaryReturn::Void,
                })
            }

            M::ObjectTemplateNew => {
                Args::new(method, raw, 0)?;
                let slot = self.alloc(Slot::ObjectTemplate(ObjectTemplateData::default()));
                Ok(BoundaryReturn::Ref(self.new_ref(slot)))
            }
            M::ObjectTemplateNewInstance => {
                let args = Args::new(method, raw, 2)?;
                let context = self.resolve(method, args.reference(0)?)?;
                let template = self.resolve(method, args.reference(1)?)?;
                self.check_context(method, context)?;
                let object = self.instantiate(method, template)?;
                let slot = self.alloc(Slot::Object(object));
                Ok(BoundaryReturn::Ref(self.new_ref(slot)))
            }
            M::ObjectTemplateSetAccessor => {
                let args = Args::new(method, raw, 7)?;
                let template = self.resolve(method, args.reference(0)?)?;
                let name = self.resolve(method, args.reference(1)?)?;
                let getter = args.address(2)?;
                let setter = args.address(3)?;
                let data = self.resolve(method, args.reference(4)?)?;
                let signature = match args.optional_reference(5)? {
                    Some(reference) => {
                        let slot = self.resolve(method, reference)?;
                        self.function_template_mut(method, slot)?;
                        Some(slot)
                    }
                    None => None,
                };
                let attributes = args.int(6)? as u32;
                let name = self.string(method, name)?;
                self.object_template_mut(method, template)?.accessors.insert(
                    name,
                    AccessorData {
                        getter,
                        setter,
                        data,
                        signature,
                        attributes,
                    },
                );
                Ok(BoundaryReturn::Void)
            }
            M::ObjectTemplateSetNamedPropertyHandler => {
                let args = Args::new(method, raw, 7)?;
                let template = self.resolve(method, args.reference(0)?)?;
                let handler = self.interceptor(method, &args, false)?;
                self.object_template_mut(method, template)?.named_handler = Some(handler);
                Ok(BoundaryReturn::Void)
            }
            M::ObjectTemplateSetHandler => {
                let args = Args::new(method, raw, 9)?;
                let template = self.resolve(method, args.reference(0)?)?;
                let named = args.boolean(7)?;
                let only_intercept_strings = args.boolean(8)?;
                let handler = self.interceptor(method, &args, named && only_intercept_strings)?;
                let template = self.object_template_mut(method, template)?;
                if named {
                    template.named_handler = Some(handler);
                } else {
                    template.indexed_handler = Some(handler);
                }
                Ok(BoundaryReturn::Void)
            }
            M::ObjectTemplateSetCallAsFunctionHandler => {
                let args = Args::new(method, raw, 4)?;
                let template = self.resolve(method, args.reference(0)?)?;
                let id = args.int(1)?;
                let callback = args.address(2)?;
                let data = self.resolve(method, args.reference(3)?)?;
                self.object_template_mut(method, template)?.call_as_function =
                    Some(CallAsFunctionData { id, callback, data });
                Ok(BoundaryReturn::Void)
            }

            M::FunctionTemplateNew => {
                let args = Args::new(method, raw, 4)?;
                let callback_id = args.int(0)?;
                let callback = args.address(1)?;
                let data = self.resolve(method, args.reference(2)?)?;
                let signature = match args.optional_reference(3)? {
                    Some(reference) => {
                        let slot = self.resolve(method, reference)?;
                        self.function_template_mut(method, slot)?;
                        Some(slot)
                    }
                    None => None,
                };
                let slot = self.alloc(Slot::FunctionTemplate(FunctionTemplateData {
                    callback_id,
                    callback,
                    data,
                    signature,
                    class_name: None,
                    instance_template: None,
                    properties: Properties::new(),
                }));
                Ok(BoundaryReturn::Ref(self.new_ref(slot)))
            }
            M::FunctionTemplateSetClassName => {
                let args = Args::new(method, raw, 2)?;
                let template = self.resolve(method, args.reference(0)?)?;
                let name = self.resolve(method, args.reference(1)?)?;
                let name = self.string(method, name)?;
                self.function_template_mut(method, template)?.class_name = Some(name);
                Ok(BoundaryReturn::Void)
            }
            M::FunctionTemplateInstanceTemplate => {
                let args = Args::new(method, raw, 1)?;
                let template = self.resolve(method, args.reference(0)?)?;
                let existing = self.function_template_mut(method, template)?.instance_template;
                let instance = match existing {
                    Some(slot) => slot,
                    None => {
                        let slot = self.alloc(Slot::ObjectTemplate(ObjectTemplateData::default()));
                        self.function_template_mut(method, template)?.instance_template =
                            Some(slot);
                        slot
                    }
                };
                Ok(BoundaryReturn::Ref(self.new_ref(instance)))
            }
            M::FunctionTemplateGetFunction => {
                let args = Args::new(method, raw, 2)?;
                let context = self.resolve(method, args.reference(0)?)?;
                let template = self.resolve(method, args.reference(1)?)?;
                self.check_context(method, context)?;
                self.function_template_mut(method, template)?;
                let slot = self.alloc(Slot::Function { template });
                Ok(BoundaryReturn::Ref(self.new_ref(slot)))
            }
            M::FunctionTemplateHasInstance => {
                let args = Args::new(method, raw, 2)?;
                let template = self.resolve(method, args.reference(0)?)?;
                let value = self.resolve(method, args.reference(1)?)?;
                let instance_template = self
                    .function_template_mut(method, template)?
                    .instance_template;
                let is_instance = match (instance_template, self.slot(value)) {
                    (Some(expected), Some(Slot::Object(object))) => {
                        object.template == Some(expected)
                    }
                    _ => false,
                };
                Ok(BoundaryReturn::Bool(is_instance))
            }
        }
    }

    fn string(&self, method: AccessMethod, slot: SlotId) -> Result<String, BoundaryFault> {
        match self.slot(slot) {
            Some(Slot::String(s)) => Ok(s.clone()),
            other => Err(wrong_kind(method, "string", other)),
        }
    }

    fn check_context(&self, method: AccessMethod, slot: SlotId) -> Result<(), BoundaryFault> {
        match self.slot(slot) {
            Some(Slot::Context { disposed: false }) => Ok(()),
            Some(Slot::Context { disposed: true }) => Err(BoundaryFault::new(
                method,
                FaultKind::Rejected,
                "context has been disposed",
            )),
            other => Err(wrong_kind(method, "context", other)),
        }
    }

    fn object_template_mut(
        &mut self,
        method: AccessMethod,
        slot: SlotId,
    ) -> Result<&mut ObjectTemplateData, BoundaryFault> {
        match self.slot_mut(slot) {
            Some(Slot::ObjectTemplate(template)) => Ok(template),
            other => Err(wrong_kind(method, "object template", other.map(|s| &*s))),
        }
    }

    fn function_template_mut(
        &mut self,
        method: AccessMethod,
        slot: SlotId,
    ) -> Result<&mut FunctionTemplateData, BoundaryFault> {
        match self.slot_mut(slot) {
            Some(Slot::FunctionTemplate(template)) => Ok(template),
            other => Err(wrong_kind(method, "function template", other.map(|s| &*s))),
        }
    }

    fn properties_mut(
        &mut self,
        method: AccessMethod,
        slot: SlotId,
    ) -> Result<&mut Properties, BoundaryFault> {
        match self.slot_mut(slot) {
            Some(Slot::ObjectTemplate(template)) => Ok(&mut template.properties),
            Some(Slot::FunctionTemplate(template)) => Ok(&mut template.properties),
            other => Err(wrong_kind(method, "template", other.map(|s| &*s))),
        }
    }

    /// Decode the five callback slots and optional data shared by both
    /// interceptor opcodes (arguments 1 through 6).
    fn interceptor(
        &self,
        method: AccessMethod,
        args: &Args<'_, '_>,
        only_intercept_strings: bool,
    ) -> Result<InterceptorData, BoundaryFault> {
        let mut callbacks = [0u64; 5];
        for (i, callback) in callbacks.iter_mut().enumerate() {
            *callback = args.address(i + 1)?;
        }
        let data = match args.optional_reference(6)? {
            Some(reference) => Some(self.resolve(method, reference)?),
            None => None,
        };
        Ok(InterceptorData {
            callbacks,
            data,
            only_intercept_strings,
        })
    }

    /// Build the object an object template describes. Template properties
    /// become own properties; the internal field count key is consumed.
    fn instantiate(
        &self,
        method: AccessMethod,
        template: SlotId,
    ) -> Result<ObjectData, BoundaryFault> {
        let Some(Slot::ObjectTemplate(data)) = self.slot(template) else {
            return Err(wrong_kind(method, "object template", self.slot(template)));
        };

        let mut internal_fields = 0;
        let mut properties = IndexMap::with_capacity(data.properties.len());
        for (name, (value, _)) in &data.properties {
            if name == INTERNAL_FIELD_COUNT_KEY {
                if let Some(Slot::Integer(n)) = self.slot(*value) {
                    internal_fields = u32::try_from((*n).max(0)).unwrap_or(u32::MAX);
                }
                continue;
            }
            properties.insert(name.clone(), *value);
        }

        Ok(ObjectData {
            properties,
            internal_fields,
            template: Some(template),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(ret: BoundaryReturn) -> u64 {
        match ret {
            BoundaryReturn::Ref(raw) => raw,
            other => panic!("expected reference, got {:?}", other),
        }
    }

    #[test]
    fn test_disposed_context_rejects_instantiation() {
        let mut heap = Heap::default();
        let context = reference(heap.dispatch(AccessMethod::ContextNew, &[]).unwrap());
        let template = reference(heap.dispatch(AccessMethod::ObjectTemplateNew, &[]).unwrap());
        heap.dispatch(AccessMethod::ContextDispose, &[BoundaryArg::Ref(context)])
            .unwrap();

        let fault = heap
            .dispatch(
                AccessMethod::ObjectTemplateNewInstance,
                &[BoundaryArg::Ref(context), BoundaryArg::Ref(template)],
            )
            .unwrap_err();
        assert_eq!(fault.kind, FaultKind::Rejected);
    }

    #[test]
    fn test_wrong_kind() {
        let mut heap = Heap::default();
        let s = reference(
            heap.dispatch(AccessMethod::StringNew, &[BoundaryArg::Utf8("x")])
                .unwrap(),
        );
        let fault = heap
            .dispatch(AccessMethod::IntegerValue, &[BoundaryArg::Ref(s)])
            .unwrap_err();
        assert_eq!(fault.kind, FaultKind::WrongKind);
        assert!(fault.message.contains("found string"));
    }

    #[test]
    fn test_failed_call_has_no_effect() {
        let mut heap = Heap::default();
        let template = reference(heap.dispatch(AccessMethod::ObjectTemplateNew, &[]).unwrap());
        let name = reference(
            heap.dispatch(AccessMethod::StringNew, &[BoundaryArg::Utf8("x")])
                .unwrap(),
        );
        let undefined = reference(heap.dispatch(AccessMethod::IsolateGetUndefined, &[]).unwrap());

        // signature must be a function template
        let fault = heap
            .dispatch(
                AccessMethod::ObjectTemplateSetAccessor,
                &[
                    BoundaryArg::Ref(template),
                    BoundaryArg::Ref(name),
                    BoundaryArg::Long(0),
                    BoundaryArg::Long(0),
                    BoundaryArg::Ref(undefined),
                    BoundaryArg::Ref(name),
                    BoundaryArg::Int(0),
                ],
            )
            .unwrap_err();
        assert_eq!(fault.kind, FaultKind::WrongKind);

        let slot = heap.resolve(AccessMethod::ValueCopy, template).unwrap();
        let Some(Slot::ObjectTemplate(data)) = heap.slot(slot) else {
            panic!("not an object template");
        };
        assert!(data.accessors.is_empty());
    }
}
