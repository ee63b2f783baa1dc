//! Boundary-level tests for the local runtime

use otter_bridge_local::LocalRuntime;
use otter_bridge_sys::{
    AccessMethod, Boundary, BoundaryArg, BoundaryReturn, FaultKind, INTERNAL_FIELD_COUNT_KEY,
    ManagedRef,
};

fn new_ref(
    runtime: &mut LocalRuntime,
    method: AccessMethod,
    args: &[BoundaryArg<'_>],
) -> ManagedRef {
    match runtime.call(method, args).unwrap() {
        BoundaryReturn::Ref(raw) => raw,
        other => panic!("{} returned {:?}", method, other),
    }
}

fn string(runtime: &mut LocalRuntime, s: &str) -> ManagedRef {
    new_ref(runtime, AccessMethod::StringNew, &[BoundaryArg::Utf8(s)])
}

#[test]
fn test_internal_field_count_sizes_instances() {
    let mut runtime = LocalRuntime::new();
    let context = new_ref(&mut runtime, AccessMethod::ContextNew, &[]);
    let template = new_ref(&mut runtime, AccessMethod::ObjectTemplateNew, &[]);
    let key = string(&mut runtime, INTERNAL_FIELD_COUNT_KEY);
    let count = new_ref(&mut runtime, AccessMethod::IntegerNew, &[BoundaryArg::Long(4)]);

    runtime
        .call(
            AccessMethod::TemplateSet,
            &[
                BoundaryArg::Ref(template),
                BoundaryArg::Ref(key),
                BoundaryArg::Ref(count),
                BoundaryArg::Int(2),
            ],
        )
        .unwrap();

    let object = new_ref(
        &mut runtime,
        AccessMethod::ObjectTemplateNewInstance,
        &[BoundaryArg::Ref(context), BoundaryArg::Ref(template)],
    );
    let ret = runtime
        .call(AccessMethod::ObjectInternalFieldCount, &[BoundaryArg::Ref(object)])
        .unwrap();
    assert_eq!(ret, BoundaryReturn::Int(4));

    // bridge metadata does not leak into instances
    assert_eq!(runtime.object_property_names(object), Some(vec![]));
    assert_eq!(
        runtime.object_template(template).unwrap().internal_field_count,
        Some(4)
    );
}

#[test]
fn test_template_properties_become_own_properties() {
    let mut runtime = LocalRuntime::new();
    let context = new_ref(&mut runtime, AccessMethod::ContextNew, &[]);
    let template = new_ref(&mut runtime, AccessMethod::ObjectTemplateNew, &[]);
    for name in ["b", "a"] {
        let key = string(&mut runtime, name);
        let value = new_ref(&mut runtime, AccessMethod::IntegerNew, &[BoundaryArg::Long(1)]);
        runtime
            .call(
                AccessMethod::TemplateSet,
                &[
                    BoundaryArg::Ref(template),
                    BoundaryArg::Ref(key),
                    BoundaryArg::Ref(value),
                    BoundaryArg::Int(0),
                ],
            )
            .unwrap();
    }

    let object = new_ref(
        &mut runtime,
        AccessMethod::ObjectTemplateNewInstance,
        &[BoundaryArg::Ref(context), BoundaryArg::Ref(template)],
    );
    assert_eq!(
        runtime.object_property_names(object),
        Some(vec!["b".to_string(), "a".to_string()])
    );
}

#[test]
fn test_rejection_applies_once() {
    let mut runtime = LocalRuntime::new();
    runtime.reject_next_call("busy");

    let fault = runtime.call(AccessMethod::ContextNew, &[]).unwrap_err();
    assert_eq!(fault.kind, FaultKind::Rejected);
    assert_eq!(fault.message, "busy");
    assert!(runtime.call(AccessMethod::ContextNew, &[]).is_ok());
    assert_eq!(runtime.call_count(), 2);
}

#[test]
fn test_released_reference_is_invalid() {
    let mut runtime = LocalRuntime::new();
    let s = string(&mut runtime, "x");
    runtime
        .call(AccessMethod::ValueRelease, &[BoundaryArg::Ref(s)])
        .unwrap();

    let fault = runtime
        .call(AccessMethod::StringUtf8, &[BoundaryArg::Ref(s)])
        .unwrap_err();
    assert_eq!(fault.kind, FaultKind::InvalidReference);
    assert!(!runtime.has_reference(s));
}

#[test]
fn test_strict_equals_compares_primitives_by_value() {
    let mut runtime = LocalRuntime::new();
    let a = string(&mut runtime, "same");
    let b = string(&mut runtime, "same");
    let c = string(&mut runtime, "other");

    let eq = |runtime: &mut LocalRuntime, x, y| {
        runtime
            .call(
                AccessMethod::ValueStrictEquals,
                &[BoundaryArg::Ref(x), BoundaryArg::Ref(y)],
            )
            .unwrap()
    };
    assert_eq!(eq(&mut runtime, a, b), BoundaryReturn::Bool(true));
    assert_eq!(eq(&mut runtime, a, c), BoundaryReturn::Bool(false));
}

#[test]
fn test_bad_arity() {
    let mut runtime = LocalRuntime::new();
    let fault = runtime
        .call(AccessMethod::ObjectTemplateSetHandler, &[BoundaryArg::Null])
        .unwrap_err();
    assert_eq!(fault.kind, FaultKind::BadArguments);
}

#[test]
fn test_snapshot_serializes() {
    let mut runtime = LocalRuntime::new();
    let template = new_ref(&mut runtime, AccessMethod::ObjectTemplateNew, &[]);
    let undefined = new_ref(&mut runtime, AccessMethod::IsolateGetUndefined, &[]);
    runtime
        .call(
            AccessMethod::ObjectTemplateSetCallAsFunctionHandler,
            &[
                BoundaryArg::Ref(template),
                BoundaryArg::Int(7),
                BoundaryArg::Long(0x1000),
                BoundaryArg::Ref(undefined),
            ],
        )
        .unwrap();

    let snapshot = runtime.object_template(template).unwrap();
    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["call_as_function"]["id"], 7);
    assert_eq!(json["call_as_function"]["callback"], 0x1000);
    assert!(json["named_handler"].is_null());
}
