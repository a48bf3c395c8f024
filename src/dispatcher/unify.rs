//! Result unification.
//!
//! Callers ask for a `T` and get one back regardless of whether the action
//! computed it immediately or returned a future. Pending computations are
//! awaited, which only suspends the current task.

use std::any::{type_name, Any};
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::debug;

use super::errors::{ActionError, DispatchError, HandlerPanicked};
use super::invoker::{ActionValue, Invocation, InvocationOutcome};
use super::DISPATCH_TARGET;

/// Collapse an [`Invocation`] into a value of type `T`.
///
/// # Errors
///
/// - [`DispatchError::ActionFault`] when the action faulted, or its pending
///   computation failed or panicked. The inner error is carried unchanged as
///   the source.
/// - [`DispatchError::ResultTypeMismatch`] when the realized value is not a
///   `T`.
pub async fn unify<T: Any + Send>(invocation: Invocation) -> Result<T, DispatchError> {
    let Invocation {
        handler,
        action,
        outcome,
    } = invocation;

    let kind = outcome.kind();
    let realized: Result<ActionValue, ActionError> = match outcome {
        InvocationOutcome::Realized(value) => Ok(value),
        InvocationOutcome::Pending(pending) => AssertUnwindSafe(pending)
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(Box::new(HandlerPanicked::from_payload(payload)) as ActionError)),
        InvocationOutcome::Fault(error) => Err(error),
    };

    let value = match realized {
        Ok(value) => value,
        Err(source) => {
            return Err(DispatchError::ActionFault {
                handler,
                action,
                source,
            })
        }
    };

    match value.downcast::<T>() {
        Ok(value) => {
            debug!(
                target: DISPATCH_TARGET,
                handler = %handler,
                action = %action,
                outcome = kind,
                "result unified"
            );
            Ok(value)
        }
        Err(value) => Err(DispatchError::ResultTypeMismatch {
            handler,
            action,
            expected: type_name::<T>(),
            actual: value.type_name(),
        }),
    }
}
