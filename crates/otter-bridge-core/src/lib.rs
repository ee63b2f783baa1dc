//! Safe object and function templates over an opaque managed runtime.
//!
//! This crate lets native embedder code build and configure templates whose
//! semantics live on the far side of a synchronous call boundary (see
//! `otter-bridge-sys`). It owns the parts that must be right on the native
//! side: handle identity and lifetime, the per-isolate callback registry, and
//! the weak-reference discipline for callback data.
//!
//! # Example
//!
//! ```
//! use otter_bridge_core::{Context, Isolate, ObjectTemplate};
//! use otter_bridge_local::LocalRuntime;
//!
//! let isolate = Isolate::new(LocalRuntime::new()).unwrap();
//! let context = Context::new(&isolate).unwrap();
//!
//! let template = ObjectTemplate::new(&isolate, None).unwrap();
//! template.set_internal_field_count(2).unwrap();
//!
//! let object = template.new_instance(&context).unwrap();
//! assert_eq!(object.internal_field_count().unwrap(), 2);
//! ```
//!
//! # Ownership of callback data
//!
//! Data passed with a function callback is duplicated and the duplicate is
//! made weak before it is registered. From then on the configuration stored
//! on the managed side is the owner of record; the registry only observes.
//!
//! # Thread Safety
//!
//! All types in this crate are `!Send` and `!Sync`. An isolate and everything
//! created from it must stay on one thread.
//!
//! ```compile_fail
//! use otter_bridge_core::Isolate;
//! use otter_bridge_local::LocalRuntime;
//!
//! let isolate = Isolate::new(LocalRuntime::new()).unwrap();
//! std::thread::spawn(move || {
//!     let _ = isolate.id(); // Error: Isolate is !Send
//! });
//! ```

mod config;
mod context;
mod diagnostics;
mod error;
mod function_template;
mod handle;
mod isolate;
mod object_template;
mod property_handler;
mod registry;
mod string;
mod template;
mod value;

pub use config::IsolateConfig;
pub use context::Context;
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::{BridgeError, BridgeResult};
pub use function_template::FunctionTemplate;
pub use handle::{Handle, HandleContent};
pub use isolate::{Isolate, IsolateId};
pub use object_template::ObjectTemplate;
pub use property_handler::{
    IndexedPropertyHandlerConfiguration, NamedPropertyHandlerConfiguration,
    PropertyHandlerConfiguration, PropertyHandlerFlags,
};
pub use registry::CallbackEntry;
pub use string::JsString;
pub use template::{AccessControl, PropertyAttribute, Template};
pub use value::{Integer, Object, Value};

// Re-export the boundary ABI for direct access when needed
pub use otter_bridge_sys;
