//! Named and indexed interceptor configurations
//!
//! An object template holds at most one configuration of each kind. Setting a
//! configuration replaces the previous one of the same kind as a whole; the
//! two kinds never affect each other.

use otter_bridge_sys::{
    IndexedPropertyDeleterCallback, IndexedPropertyEnumeratorCallback,
    IndexedPropertyGetterCallback, IndexedPropertyQueryCallback, IndexedPropertySetterCallback,
    NamedPropertyDeleterCallback, NamedPropertyEnumeratorCallback, NamedPropertyGetterCallback,
    NamedPropertyQueryCallback, NamedPropertySetterCallback, callback_address,
};

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyHandlerFlags {
    #[default]
    None,
    /// Only intercept string keys, let symbols through
    OnlyInterceptStrings,
}

#[derive(Default)]
pub struct NamedPropertyHandlerConfiguration<'a> {
    pub(crate) getter: NamedPropertyGetterCallback,
    pub(crate) setter: NamedPropertySetterCallback,
    pub(crate) query: NamedPropertyQueryCallback,
    pub(crate) deleter: NamedPropertyDeleterCallback,
    pub(crate) enumerator: NamedPropertyEnumeratorCallback,
    pub(crate) data: Option<&'a Value>,
    pub(crate) flags: PropertyHandlerFlags,
}

impl<'a> NamedPropertyHandlerConfiguration<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_some(&self) -> bool {
        self.getter.is_some()
            || self.setter.is_some()
            || self.query.is_some()
            || self.deleter.is_some()
            || self.enumerator.is_some()
    }

    pub fn getter(mut self, getter: NamedPropertyGetterCallback) -> Self {
        self.getter = getter;
        self
    }

    pub fn setter(mut self, setter: NamedPropertySetterCallback) -> Self {
        self.setter = setter;
        self
    }

    pub fn query(mut self, query: NamedPropertyQueryCallback) -> Self {
        self.query = query;
        self
    }

    pub fn deleter(mut self, deleter: NamedPropertyDeleterCallback) -> Self {
        self.deleter = deleter;
        self
    }

    pub fn enumerator(mut self, enumerator: NamedPropertyEnumeratorCallback) -> Self {
        self.enumerator = enumerator;
        self
    }

    /// Set the associated data. The default is no associated data.
    pub fn data(mut self, data: &'a Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn flags(mut self, flags: PropertyHandlerFlags) -> Self {
        self.flags = flags;
        self
    }
}

#[derive(Default)]
pub struct IndexedPropertyHandlerConfiguration<'a> {
    pub(crate) getter: IndexedPropertyGetterCallback,
    pub(crate) setter: IndexedPropertySetterCallback,
    pub(crate) query: IndexedPropertyQueryCallback,
    pub(crate) deleter: IndexedPropertyDeleterCallback,
    pub(crate) enumerator: IndexedPropertyEnumeratorCallback,
    pub(crate) data: Option<&'a Value>,
}

impl<'a> IndexedPropertyHandlerConfiguration<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_some(&self) -> bool {
        self.getter.is_some()
            || self.setter.is_some()
            || self.query.is_some()
            || self.deleter.is_some()
            || self.enumerator.is_some()
    }

    pub fn getter(mut self, getter: IndexedPropertyGetterCallback) -> Self {
        self.getter = getter;
        self
    }

    pub fn setter(mut self, setter: IndexedPropertySetterCallback) -> Self {
        self.setter = setter;
        self
    }

    pub fn query(mut self, query: IndexedPropertyQueryCallback) -> Self {
        self.query = query;
        self
    }

    pub fn deleter(mut self, deleter: IndexedPropertyDeleterCallback) -> Self {
        self.deleter = deleter;
        self
    }

    pub fn enumerator(mut self, enumerator: IndexedPropertyEnumeratorCallback) -> Self {
        self.enumerator = enumerator;
        self
    }

    /// Set the associated data. The default is no associated data.
    pub fn data(mut self, data: &'a Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Either kind of interceptor configuration
pub enum PropertyHandlerConfiguration<'a> {
    Named(NamedPropertyHandlerConfiguration<'a>),
    Indexed(IndexedPropertyHandlerConfiguration<'a>),
}

impl<'a> From<NamedPropertyHandlerConfiguration<'a>> for PropertyHandlerConfiguration<'a> {
    fn from(configuration: NamedPropertyHandlerConfiguration<'a>) -> Self {
        Self::Named(configuration)
    }
}

impl<'a> From<IndexedPropertyHandlerConfiguration<'a>> for PropertyHandlerConfiguration<'a> {
    fn from(configuration: IndexedPropertyHandlerConfiguration<'a>) -> Self {
        Self::Indexed(configuration)
    }
}

/// The shape both kinds share once their pointers are erased for the wire
pub(crate) struct ErasedHandler<'a> {
    pub(crate) slots: [u64; 5],
    pub(crate) data: Option<&'a Value>,
    pub(crate) named: bool,
    pub(crate) only_intercept_strings: bool,
}

impl<'a> PropertyHandlerConfiguration<'a> {
    pub fn is_named(&self) -> bool {
        matches!(self, Self::Named(_))
    }

    pub(crate) fn erase(&self) -> ErasedHandler<'a> {
        match self {
            Self::Named(c) => ErasedHandler {
                slots: [
                    callback_address!(c.getter),
                    callback_address!(c.setter),
                    callback_address!(c.query),
                    callback_address!(c.deleter),
                    callback_address!(c.enumerator),
                ],
                data: c.data,
                named: true,
                only_intercept_strings: c.flags == PropertyHandlerFlags::OnlyInterceptStrings,
            },
            // the string-only filter has no meaning for integer keys
            Self::Indexed(c) => ErasedHandler {
                slots: [
                    callback_address!(c.getter),
                    callback_address!(c.setter),
                    callback_address!(c.query),
                    callback_address!(c.deleter),
                    callback_address!(c.enumerator),
                ],
                data: c.data,
                named: false,
                only_intercept_strings: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otter_bridge_sys::{ManagedRef, PropertyCallbackInfoRef};

    unsafe extern "C" fn named_getter(_property: ManagedRef, _info: PropertyCallbackInfoRef) {}
    unsafe extern "C" fn indexed_getter(_index: u32, _info: PropertyCallbackInfoRef) {}

    #[test]
    fn test_named_erasure() {
        let configuration: PropertyHandlerConfiguration = NamedPropertyHandlerConfiguration::new()
            .getter(Some(named_getter))
            .flags(PropertyHandlerFlags::OnlyInterceptStrings)
            .into();
        assert!(configuration.is_named());

        let erased = configuration.erase();
        assert_ne!(erased.slots[0], 0);
        assert_eq!(&erased.slots[1..], &[0, 0, 0, 0]);
        assert!(erased.named);
        assert!(erased.only_intercept_strings);
        assert!(erased.data.is_none());
    }

    #[test]
    fn test_indexed_never_filters_strings() {
        let configuration: PropertyHandlerConfiguration =
            IndexedPropertyHandlerConfiguration::new()
                .getter(Some(indexed_getter))
                .into();

        let erased = configuration.erase();
        assert!(!erased.named);
        assert!(!erased.only_intercept_strings);
        assert_eq!(erased.slots[0], indexed_getter as usize as u64);
    }

    #[test]
    fn test_is_some() {
        assert!(!NamedPropertyHandlerConfiguration::new().is_some());
        assert!(
            IndexedPropertyHandlerConfiguration::new()
                .getter(Some(indexed_getter))
                .is_some()
        );
    }
}
