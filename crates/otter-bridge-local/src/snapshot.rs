//! Read-only views of stored template configuration.
//!
//! Slot ids in snapshots are comparable with
//! [`LocalRuntime::cell_of`](crate::LocalRuntime::cell_of).

use otter_bridge_sys::INTERNAL_FIELD_COUNT_KEY;
use serde::Serialize;

use crate::heap::{
    FunctionTemplateData, Heap, InterceptorData, ObjectTemplateData, Properties, Slot,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertySnapshot {
    pub name: String,
    pub value: u64,
    pub attributes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessorSnapshot {
    pub name: String,
    pub getter: u64,
    pub setter: u64,
    pub data: u64,
    pub signature: Option<u64>,
    pub attributes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterceptorSnapshot {
    pub getter: u64,
    pub setter: u64,
    pub query: u64,
    pub deleter: u64,
    pub enumerator: u64,
    pub data: Option<u64>,
    pub only_intercept_strings: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallAsFunctionSnapshot {
    pub id: i32,
    pub callback: u64,
    pub data: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectTemplateSnapshot {
    /// Value published under the internal field count key, if any
    pub internal_field_count: Option<i64>,
    pub properties: Vec<PropertySnapshot>,
    pub accessors: Vec<AccessorSnapshot>,
    pub named_handler: Option<InterceptorSnapshot>,
    pub indexed_handler: Option<InterceptorSnapshot>,
    pub call_as_function: Option<CallAsFunctionSnapshot>,
}

impl ObjectTemplateSnapshot {
    pub fn accessor(&self, name: &str) -> Option<&AccessorSnapshot> {
        self.accessors.iter().find(|a| a.name == name)
    }

    pub fn property(&self, name: &str) -> Option<&PropertySnapshot> {
        self.properties.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionTemplateSnapshot {
    pub callback_id: i32,
    pub callback: u64,
    pub data: u64,
    pub signature: Option<u64>,
    pub class_name: Option<String>,
    pub instance_template: Option<u64>,
    pub properties: Vec<PropertySnapshot>,
}

fn properties(props: &Properties) -> Vec<PropertySnapshot> {
    props
        .iter()
        .map(|(name, (value, attributes))| PropertySnapshot {
            name: name.clone(),
            value: *value,
            attributes: *attributes,
        })
        .collect()
}

fn interceptor(handler: &InterceptorData) -> InterceptorSnapshot {
    let [getter, setter, query, deleter, enumerator] = handler.callbacks;
    InterceptorSnapshot {
        getter,
        setter,
        query,
        deleter,
        enumerator,
        data: handler.data,
        only_intercept_strings: handler.only_intercept_strings,
    }
}

pub(crate) fn object_template(
    heap: &Heap,
    template: &ObjectTemplateData,
) -> ObjectTemplateSnapshot {
    let internal_field_count = template
        .properties
        .get(INTERNAL_FIELD_COUNT_KEY)
        .and_then(|(slot, _)| match heap.slot(*slot) {
            Some(Slot::Integer(n)) => Some(*n),
            _ => None,
        });

    ObjectTemplateSnapshot {
        internal_field_count,
        properties: properties(&template.properties),
        accessors: template
            .accessors
            .iter()
            .map(|(name, accessor)| AccessorSnapshot {
                name: name.clone(),
                getter: accessor.getter,
                setter: accessor.setter,
                data: accessor.data,
                signature: accessor.signature,
                attributes: accessor.attributes,
            })
            .collect(),
        named_handler: template.named_handler.as_ref().map(interceptor),
        indexed_handler: template.indexed_handler.as_ref().map(interceptor),
        call_as_function: template
            .call_as_function
            .as_ref()
            .map(|call| CallAsFunctionSnapshot {
                id: call.id,
                callback: call.callback,
                data: call.data,
            }),
    }
}

pub(crate) fn function_template(template: &FunctionTemplateData) -> FunctionTemplateSnapshot {
    FunctionTemplateSnapshot {
        callback_id: template.callback_id,
        callback: template.callback,
        data: template.data,
        signature: template.signature,
        class_name: template.class_name.clone(),
        instance_template: template.instance_template,
        properties: properties(&template.properties),
    }
}
