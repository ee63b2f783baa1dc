//! Diagnostic events that must not go unnoticed but do not fail the call.

use std::cell::RefCell;

use serde::Serialize;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The caller asked for something this bridge cannot express yet.
    /// The operation went ahead without it.
    UnsupportedFeature,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub operation: &'static str,
    pub message: String,
}

impl Diagnostic {
    pub fn unsupported(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::UnsupportedFeature,
            operation,
            message: message.into(),
        }
    }
}

/// Per-isolate diagnostic sink. Every event is logged at `error` level and
/// kept until taken.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    events: RefCell<Vec<Diagnostic>>,
}

impl Diagnostics {
    pub(crate) fn report(&self, isolate: Option<&str>, diagnostic: Diagnostic) {
        error!(
            target: "otter_bridge",
            isolate = isolate.unwrap_or("<unnamed>"),
            operation = diagnostic.operation,
            kind = ?diagnostic.kind,
            "{}",
            diagnostic.message
        );
        self.events.borrow_mut().push(diagnostic);
    }

    pub(crate) fn snapshot(&self) -> Vec<Diagnostic> {
        self.events.borrow().clone()
    }

    pub(crate) fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_and_take() {
        let sink = Diagnostics::default();
        sink.report(None, Diagnostic::unsupported("ObjectTemplate::new", "nope"));

        assert_eq!(sink.snapshot().len(), 1);
        let taken = sink.take();
        assert_eq!(taken[0].kind, DiagnosticKind::UnsupportedFeature);
        assert_eq!(taken[0].operation, "ObjectTemplate::new");
        assert!(sink.snapshot().is_empty());
    }

    #[test]
    fn test_serialize() {
        let json = serde_json::to_value(Diagnostic::unsupported("op", "msg")).unwrap();
        assert_eq!(json["kind"], "unsupported_feature");
        assert_eq!(json["operation"], "op");
    }
}
