//! Behavior shared by object and function templates

use std::fmt;

use bitflags::bitflags;
use otter_bridge_sys::{
    AccessMethod, BoundaryArg, K_PROPERTY_ATTRIBUTE_DONT_DELETE, K_PROPERTY_ATTRIBUTE_DONT_ENUM,
    K_PROPERTY_ATTRIBUTE_READ_ONLY,
};

use crate::error::BridgeResult;
use crate::handle::{Handle, HandleContent};
use crate::string::JsString;
use crate::value::Value;

bitflags! {
    /// Attributes of a template property or accessor
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropertyAttribute: u32 {
        const READ_ONLY = K_PROPERTY_ATTRIBUTE_READ_ONLY;
        const DONT_ENUM = K_PROPERTY_ATTRIBUTE_DONT_ENUM;
        const DONT_DELETE = K_PROPERTY_ATTRIBUTE_DONT_DELETE;
    }
}

impl PropertyAttribute {
    pub const NONE: Self = Self::empty();
}

/// Access check settings for accessors.
///
/// Accepted for call-site compatibility with embedders written against the
/// full template API. The managed side performs no access checks, so the
/// setting does not cross the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessControl {
    #[default]
    Default,
    AllCanRead,
    AllCanWrite,
    ProhibitsOverwriting,
}

/// Base of [`ObjectTemplate`](crate::ObjectTemplate) and
/// [`FunctionTemplate`](crate::FunctionTemplate).
///
/// All template state, including bridge metadata such as the internal field
/// count, lives in ordinary template properties on the managed side.
pub struct Template(Handle);

impl HandleContent for Template {
    fn handle(&self) -> &Handle {
        &self.0
    }

    fn copy_impl(handle: Handle) -> Self {
        Self(handle)
    }
}

impl Template {
    /// Set a template property; instances get it as an own property
    pub fn set<V: HandleContent>(
        &self,
        name: &JsString,
        value: &V,
        attributes: PropertyAttribute,
    ) -> BridgeResult<()> {
        let isolate = self.isolate()?;
        isolate.call_void(
            AccessMethod::TemplateSet,
            &[
                isolate.marshal(&self.0)?,
                isolate.marshal(name.handle())?,
                isolate.marshal(value.handle())?,
                BoundaryArg::Int(attributes.bits() as i32),
            ],
        )
    }

    /// Read a template property back, `None` if it was never set
    pub fn get(&self, name: &JsString) -> BridgeResult<Option<Value>> {
        let isolate = self.isolate()?;
        let handle = isolate.call_optional_ref(
            AccessMethod::TemplateGet,
            &[isolate.marshal(&self.0)?, isolate.marshal(name.handle())?],
        )?;
        Ok(handle.map(Value::copy_impl))
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Template({:?})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_bits_match_abi() {
        assert_eq!(PropertyAttribute::NONE.bits(), 0);
        assert_eq!(PropertyAttribute::READ_ONLY.bits(), 1);
        assert_eq!(PropertyAttribute::DONT_ENUM.bits(), 2);
        assert_eq!(
            (PropertyAttribute::DONT_ENUM | PropertyAttribute::DONT_DELETE).bits(),
            6
        );
    }
}
