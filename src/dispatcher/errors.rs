//! Error types for dynamic dispatch.
//!
//! [`DispatchError`] covers every way a dispatch can stop short of a response
//! body. Two of its variants are recoverable: a malformed path and (unless the
//! caller asked for strict resolution) an unknown handler type. Those become
//! [`DispatchOutcome::NotApplicable`](super::DispatchOutcome) so the request
//! pipeline can try its next stage. Everything else is fatal for the request.

use std::any::Any;
use std::time::Duration;

use thiserror::Error;

/// Error raised from inside handler code: a constructor, a synchronous action,
/// or the future returned by an asynchronous action.
pub type ActionError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced while decoding, resolving, activating, invoking or unifying.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request path does not carry a handler/action pair.
    #[error("malformed dispatch path '{path}': {reason}")]
    MalformedPath { path: String, reason: &'static str },

    /// No handler is registered under the qualified name.
    #[error("unknown handler type '{name}'")]
    UnknownHandlerType { name: String },

    /// The handler could not be constructed.
    #[error("failed to activate handler '{handler}': {source}")]
    ActivationFault {
        handler: String,
        #[source]
        source: ActionError,
    },

    /// The handler exists but exposes no action with that name.
    #[error("handler '{handler}' has no action named '{action}'")]
    ActionNotFound { handler: String, action: String },

    /// The action needs more arguments than the request supplied.
    #[error("action '{handler}.{action}' expects {expected} argument(s) but {supplied} supplied")]
    ArityMismatch {
        handler: String,
        action: String,
        expected: usize,
        supplied: usize,
    },

    /// The action produced a value of a different type than the caller expected.
    #[error("action '{handler}.{action}' returned {actual} but {expected} was expected")]
    ResultTypeMismatch {
        handler: String,
        action: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// The action (or the computation it returned) failed.
    #[error("action '{handler}.{action}' failed: {source}")]
    ActionFault {
        handler: String,
        action: String,
        #[source]
        source: ActionError,
    },

    /// The action did not complete within the configured timeout.
    #[error("action '{handler}.{action}' did not complete within {timeout:?}")]
    ActionTimeout {
        handler: String,
        action: String,
        timeout: Duration,
    },
}

impl DispatchError {
    /// Stable identifier used in logs, metrics and JSON error bodies.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedPath { .. } => "MalformedPath",
            Self::UnknownHandlerType { .. } => "UnknownHandlerType",
            Self::ActivationFault { .. } => "ActivationFault",
            Self::ActionNotFound { .. } => "ActionNotFound",
            Self::ArityMismatch { .. } => "ArityMismatch",
            Self::ResultTypeMismatch { .. } => "ResultTypeMismatch",
            Self::ActionFault { .. } => "ActionFault",
            Self::ActionTimeout { .. } => "ActionTimeout",
        }
    }

    /// Whether this error may be turned into a pipeline fallthrough.
    ///
    /// Only [`MalformedPath`](Self::MalformedPath) and
    /// [`UnknownHandlerType`](Self::UnknownHandlerType) qualify; whether the
    /// latter actually falls through depends on the strictness of the caller.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedPath { .. } | Self::UnknownHandlerType { .. }
        )
    }
}

/// A required constructor dependency has no registered service.
#[derive(Debug, Error)]
#[error("required dependency {type_name} is not registered")]
pub struct MissingDependency {
    pub type_name: &'static str,
}

/// Handler code panicked; the panic payload is captured as text.
#[derive(Debug, Error)]
#[error("handler panicked: {message}")]
pub struct HandlerPanicked {
    pub message: String,
}

impl HandlerPanicked {
    /// Extract a readable message from a `catch_unwind` payload.
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}
