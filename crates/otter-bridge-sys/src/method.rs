use std::fmt;

/// Opcode of a boundary call.
///
/// The numeric values are part of the ABI and must stay stable.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMethod {
    IsolateGetUndefined = 1,

    ValueCopy = 10,
    ValueMakeWeak = 11,
    ValueRelease = 12,
    ValueIsUndefined = 13,
    ValueStrictEquals = 14,

    StringNew = 20,
    StringUtf8 = 21,
    IntegerNew = 22,
    IntegerValue = 23,

    ContextNew = 30,
    ContextDispose = 31,

    ObjectNew = 40,
    ObjectInternalFieldCount = 41,

    TemplateSet = 50,
    TemplateGet = 51,

    ObjectTemplateNew = 60,
    ObjectTemplateNewInstance = 61,
    ObjectTemplateSetAccessor = 62,
    ObjectTemplateSetNamedPropertyHandler = 63,
    ObjectTemplateSetHandler = 64,
    ObjectTemplateSetCallAsFunctionHandler = 65,

    FunctionTemplateNew = 70,
    FunctionTemplateSetClassName = 71,
    FunctionTemplateInstanceTemplate = 72,
    FunctionTemplateGetFunction = 73,
    FunctionTemplateHasInstance = 74,
}

impl AccessMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IsolateGetUndefined => "isolate_get_undefined",
            Self::ValueCopy => "value_copy",
            Self::ValueMakeWeak => "value_make_weak",
            Self::ValueRelease => "value_release",
            Self::ValueIsUndefined => "value_is_undefined",
            Self::ValueStrictEquals => "value_strict_equals",
            Self::StringNew => "string_new",
            Self::StringUtf8 => "string_utf8",
            Self::IntegerNew => "integer_new",
            Self::IntegerValue => "integer_value",
            Self::ContextNew => "context_new",
            Self::ContextDispose => "context_dispose",
            Self::ObjectNew => "object_new",
            Self::ObjectInternalFieldCount => "object_internal_field_count",
            Self::TemplateSet => "template_set",
            Self::TemplateGet => "template_get",
            Self::ObjectTemplateNew => "object_template_new",
            Self::ObjectTemplateNewInstance => "object_template_new_instance",
            Self::ObjectTemplateSetAccessor => "object_template_set_accessor",
            Self::ObjectTemplateSetNamedPropertyHandler => {
                "object_template_set_named_property_handler"
            }
            Self::ObjectTemplateSetHandler => "object_template_set_handler",
            Self::ObjectTemplateSetCallAsFunctionHandler => {
                "object_template_set_call_as_function_handler"
            }
            Self::FunctionTemplateNew => "function_template_new",
            Self::FunctionTemplateSetClassName => "function_template_set_class_name",
            Self::FunctionTemplateInstanceTemplate => "function_template_instance_template",
            Self::FunctionTemplateGetFunction => "function_template_get_function",
            Self::FunctionTemplateHasInstance => "function_template_has_instance",
        }
    }

    /// Numeric opcode as sent over the wire
    pub fn opcode(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for AccessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
