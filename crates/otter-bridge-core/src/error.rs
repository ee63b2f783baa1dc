//! Error types for bridge operations
//!
//! Invalid handles are caught before anything crosses the boundary; failures
//! reported by the managed side are carried through with their fault kind.

use otter_bridge_sys::{AccessMethod, BoundaryFault, FaultKind};
use thiserror::Error;

use crate::isolate::IsolateId;

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised by the template bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A handle created under one isolate was passed to another
    #[error("Handle belongs to isolate {actual}, used with isolate {expected}")]
    WrongIsolate {
        expected: IsolateId,
        actual: IsolateId,
    },

    /// The isolate owning a handle has been dropped
    #[error("Isolate has been disposed")]
    IsolateDisposed,

    /// An empty handle where a live one is required
    #[error("Empty handle passed to {operation}")]
    NullHandle { operation: &'static str },

    /// The managed runtime rejected or could not service a call
    #[error("Boundary call {method} failed ({kind:?}): {message}")]
    Boundary {
        method: AccessMethod,
        kind: FaultKind,
        message: String,
    },

    /// The managed runtime answered with a value of the wrong shape
    #[error("Boundary call {method} returned an unexpected value, expected {expected}")]
    UnexpectedReturn {
        method: AccessMethod,
        expected: &'static str,
    },

    /// A boundary call was issued while another was still in flight
    #[error("Re-entrant boundary call {method}")]
    ReentrantCall { method: AccessMethod },

    /// Only one half of a callback registration is present
    #[error("Callback registration {id} is incomplete")]
    IncompleteRegistration { id: u32 },

    /// Every registration id that fits the wire format has been handed out
    #[error("Function template id space exhausted")]
    IdSpaceExhausted,

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// TOML configuration could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    /// Fault kind of a boundary failure, if this is one
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Self::Boundary { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Check if the handle itself was unusable (wrong isolate, disposed, empty,
    /// or unknown to the managed side)
    pub fn is_invalid_handle(&self) -> bool {
        match self {
            Self::WrongIsolate { .. } | Self::IsolateDisposed | Self::NullHandle { .. } => true,
            Self::Boundary { kind, .. } => matches!(
                kind,
                FaultKind::InvalidReference | FaultKind::DanglingReference
            ),
            _ => false,
        }
    }
}

impl From<BoundaryFault> for BridgeError {
    fn from(fault: BoundaryFault) -> Self {
        Self::Boundary {
            method: fault.method,
            kind: fault.kind,
            message: fault.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_conversion() {
        let fault = BoundaryFault::new(
            AccessMethod::ValueCopy,
            FaultKind::DanglingReference,
            "reference 4 was collected",
        );
        let err = BridgeError::from(fault);

        assert_eq!(err.fault_kind(), Some(FaultKind::DanglingReference));
        assert!(err.is_invalid_handle());
        assert!(err.to_string().contains("value_copy"));
    }

    #[test]
    fn test_rejected_is_not_invalid_handle() {
        let err = BridgeError::from(BoundaryFault::new(
            AccessMethod::ObjectTemplateNewInstance,
            FaultKind::Rejected,
            "context disposed",
        ));
        assert!(!err.is_invalid_handle());
    }

    #[test]
    fn test_wrong_isolate_display() {
        let err = BridgeError::WrongIsolate {
            expected: IsolateId(1),
            actual: IsolateId(2),
        };
        assert_eq!(
            err.to_string(),
            "Handle belongs to isolate #2, used with isolate #1"
        );
        assert!(err.is_invalid_handle());
    }
}
