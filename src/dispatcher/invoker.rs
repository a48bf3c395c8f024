//! Member invocation: find the action on a freshly activated handler, check
//! its arity and call it, capturing whatever it returns.
//!
//! Actions return an [`InvocationOutcome`]. The invoker does not look inside
//! it; interpreting the value is the job of [`unify`](super::unify).

use std::any::{type_name, Any};
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;

use futures::future::BoxFuture;
use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, warn};

use super::activator::HandlerInstance;
use super::errors::{ActionError, DispatchError, HandlerPanicked};
use super::DISPATCH_TARGET;

/// Type-erased value produced by an action, remembering its type name so a
/// mismatch can be reported precisely.
pub struct ActionValue {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
}

impl ActionValue {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: type_name::<T>(),
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Take the value out as a `T`, or get `self` back untouched.
    ///
    /// # Errors
    ///
    /// Returns the original value when it is not a `T`.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let type_name = self.type_name;
        match self.value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => Err(Self { value, type_name }),
        }
    }
}

impl fmt::Debug for ActionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionValue")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Computation still in flight when the action returned.
pub type PendingValue = BoxFuture<'static, Result<ActionValue, ActionError>>;

/// Raw result of calling an action.
pub enum InvocationOutcome {
    /// The action computed its value synchronously.
    Realized(ActionValue),
    /// The action handed back a future to be awaited.
    Pending(PendingValue),
    /// The action failed before producing anything.
    Fault(ActionError),
}

impl InvocationOutcome {
    pub fn realized<T: Any + Send>(value: T) -> Self {
        Self::Realized(ActionValue::new(value))
    }

    pub fn pending<T, F>(future: F) -> Self
    where
        T: Any + Send,
        F: Future<Output = Result<T, ActionError>> + Send + 'static,
    {
        Self::Pending(async move { future.await.map(ActionValue::new) }.boxed())
    }

    pub fn fault(error: impl Into<ActionError>) -> Self {
        Self::Fault(error.into())
    }

    /// Realized on `Ok`, fault on `Err`.
    pub fn from_result<T: Any + Send>(result: Result<T, ActionError>) -> Self {
        match result {
            Ok(value) => Self::realized(value),
            Err(error) => Self::Fault(error),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Realized(_) => "realized",
            Self::Pending(_) => "pending",
            Self::Fault(_) => "fault",
        }
    }
}

impl fmt::Debug for InvocationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Realized(value) => f.debug_tuple("Realized").field(value).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
            Self::Fault(error) => f.debug_tuple("Fault").field(error).finish(),
        }
    }
}

/// An outcome tagged with where it came from.
#[derive(Debug)]
pub struct Invocation {
    pub handler: String,
    pub action: String,
    pub outcome: InvocationOutcome,
}

/// Invoke `action_name` on `instance`.
///
/// The instance is consumed: it lives for exactly one call. A panic inside a
/// synchronous action is captured as [`InvocationOutcome::Fault`].
///
/// # Errors
///
/// - [`DispatchError::ActionNotFound`] when no action matches
///   (case-insensitively).
/// - [`DispatchError::ArityMismatch`] when the action needs more arguments
///   than supplied. Surplus arguments are dropped.
pub fn invoke(
    mut instance: HandlerInstance,
    action_name: &str,
    arguments: &[String],
) -> Result<Invocation, DispatchError> {
    let descriptor = instance.descriptor_arc();
    let handler = descriptor.name().to_string();

    let Some(action) = descriptor.find_action(action_name) else {
        return Err(DispatchError::ActionNotFound {
            handler,
            action: action_name.to_string(),
        });
    };

    if action.arity() > arguments.len() {
        return Err(DispatchError::ArityMismatch {
            handler,
            action: action.name().to_string(),
            expected: action.arity(),
            supplied: arguments.len(),
        });
    }
    let passed = &arguments[..action.arity()];

    debug!(
        target: DISPATCH_TARGET,
        handler = %handler,
        action = action.name(),
        supplied = arguments.len(),
        passed = passed.len(),
        "invoking action"
    );

    let outcome = match catch_unwind(AssertUnwindSafe(|| action.call(instance.as_any_mut(), passed))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let panicked = HandlerPanicked::from_payload(payload);
            warn!(
                target: DISPATCH_TARGET,
                handler = %handler,
                action = action.name(),
                message = %panicked.message,
                "action panicked"
            );
            InvocationOutcome::fault(panicked)
        }
    };

    Ok(Invocation {
        handler,
        action: action.name().to_string(),
        outcome,
    })
}

/// Failure to read a positional argument inside an action.
#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("argument {index} is missing")]
    Missing { index: usize },
    #[error("argument {index} ('{value}') is invalid: {source}")]
    Invalid {
        index: usize,
        value: String,
        #[source]
        source: ActionError,
    },
}

/// Parse the argument at `index` into `T`.
///
/// # Errors
///
/// Returns [`ArgumentError`] if the argument is absent or does not parse.
pub fn parse_argument<T>(arguments: &[String], index: usize) -> Result<T, ArgumentError>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = arguments
        .get(index)
        .ok_or(ArgumentError::Missing { index })?;
    value.parse::<T>().map_err(|err| ArgumentError::Invalid {
        index,
        value: value.clone(),
        source: Box::new(err),
    })
}
