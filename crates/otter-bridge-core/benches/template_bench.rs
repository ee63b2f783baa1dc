//! Benchmarks for template configuration against the local runtime
//!
//! Run with: cargo bench -p otter-bridge-core

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use otter_bridge_core::otter_bridge_sys::{
    FunctionCallbackInfoRef, ManagedRef, PropertyCallbackInfoRef,
};
use otter_bridge_core::{
    AccessControl, Context, Isolate, JsString, NamedPropertyHandlerConfiguration, Object,
    ObjectTemplate, PropertyAttribute,
};
use otter_bridge_local::LocalRuntime;

unsafe extern "C" fn call_handler(_info: FunctionCallbackInfoRef) {}
unsafe extern "C" fn getter(_property: ManagedRef, _info: PropertyCallbackInfoRef) {}

fn template_benchmarks(c: &mut Criterion) {
    let isolate = Isolate::new(LocalRuntime::new()).unwrap();
    let context = Context::new(&isolate).unwrap();

    c.bench_function("object_template_new_instance", |b| {
        let template = ObjectTemplate::new(&isolate, None).unwrap();
        template.set_internal_field_count(2).unwrap();
        b.iter(|| black_box(template.new_instance(&context).unwrap()))
    });

    c.bench_function("set_accessor", |b| {
        let template = ObjectTemplate::new(&isolate, None).unwrap();
        let name = JsString::new(&isolate, "x").unwrap();
        b.iter(|| {
            template
                .set_accessor(
                    &name,
                    Some(getter),
                    None,
                    None,
                    AccessControl::Default,
                    PropertyAttribute::NONE,
                    None,
                )
                .unwrap()
        })
    });

    c.bench_function("set_named_handler", |b| {
        let template = ObjectTemplate::new(&isolate, None).unwrap();
        b.iter(|| {
            template
                .set_handler(NamedPropertyHandlerConfiguration::new().getter(Some(getter)))
                .unwrap()
        })
    });

    c.bench_function("set_call_as_function_handler_with_data", |b| {
        let template = ObjectTemplate::new(&isolate, None).unwrap();
        let data = Object::new(&context).unwrap();
        b.iter(|| {
            template
                .set_call_as_function_handler(Some(call_handler), Some(&*data))
                .unwrap()
        })
    });
}

criterion_group!(benches, template_benchmarks);
criterion_main!(benches);
