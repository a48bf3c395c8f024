//! Dispatcher core: drives one request through
//! decode → resolve → activate → invoke → unify.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, warn, Instrument};

use super::activator::activate;
use super::errors::DispatchError;
use super::invoker::invoke;
use super::path::{DispatchRequest, PathDecoder};
use super::registry::HandlerRegistry;
use super::services::ServiceRegistry;
use super::unify::unify;
use super::DISPATCH_TARGET;
use crate::config::DispatchConfig;
use crate::ids::RequestId;

/// Terminal state of a dispatch that did not fault.
#[derive(Debug)]
pub enum DispatchOutcome<T> {
    /// The action ran and produced a `T`.
    Completed(T),
    /// This dispatcher does not apply to the request; the reason is kept for
    /// logging. The surrounding pipeline should try its next stage.
    NotApplicable(DispatchError),
}

impl<T> DispatchOutcome<T> {
    #[must_use]
    pub fn is_not_applicable(&self) -> bool {
        matches!(self, Self::NotApplicable(_))
    }

    /// The completed value, discarding a fallthrough reason.
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::NotApplicable(_) => None,
        }
    }
}

/// Stateless dispatcher over shared, read-only registries.
///
/// Cloning is cheap; every clone shares the same registries.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    decoder: PathDecoder,
    handlers: Arc<HandlerRegistry>,
    services: Arc<ServiceRegistry>,
    strict_types: bool,
    action_timeout: Option<Duration>,
}

impl Dispatcher {
    /// Dispatcher with the default path grammar, lenient type resolution and
    /// no timeout.
    #[must_use]
    pub fn new(handlers: Arc<HandlerRegistry>, services: Arc<ServiceRegistry>) -> Self {
        Self {
            decoder: PathDecoder::default(),
            handlers,
            services,
            strict_types: false,
            action_timeout: None,
        }
    }

    #[must_use]
    pub fn from_config(
        config: &DispatchConfig,
        handlers: Arc<HandlerRegistry>,
        services: Arc<ServiceRegistry>,
    ) -> Self {
        Self {
            decoder: config.path_decoder(),
            handlers,
            services,
            strict_types: config.strict_types,
            action_timeout: config.action_timeout(),
        }
    }

    #[must_use]
    pub fn with_decoder(mut self, decoder: PathDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Treat unknown handler types as fatal instead of falling through.
    #[must_use]
    pub fn with_strict_types(mut self, strict: bool) -> Self {
        self.strict_types = strict;
        self
    }

    #[must_use]
    pub fn with_action_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.action_timeout = timeout;
        self
    }

    #[must_use]
    pub fn decoder(&self) -> &PathDecoder {
        &self.decoder
    }

    #[must_use]
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    #[must_use]
    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// Decode `path` and dispatch it.
    ///
    /// A path that does not decode is [`DispatchOutcome::NotApplicable`].
    ///
    /// # Errors
    ///
    /// Any fatal [`DispatchError`]; see [`dispatch`](Self::dispatch).
    pub async fn dispatch_path<T: Any + Send>(
        &self,
        path: &str,
    ) -> Result<DispatchOutcome<T>, DispatchError> {
        match self.decoder.decode(path) {
            Ok(request) => self.dispatch(&request).await,
            Err(err) => {
                debug!(target: DISPATCH_TARGET, path, error = %err, "path not dispatchable");
                Ok(DispatchOutcome::NotApplicable(err))
            }
        }
    }

    /// Dispatch an already decoded request using the configured strictness.
    ///
    /// # Errors
    ///
    /// `ActivationFault`, `ActionNotFound`, `ArityMismatch`,
    /// `ResultTypeMismatch`, `ActionFault`, `ActionTimeout`, and
    /// `UnknownHandlerType` when strict type resolution is enabled.
    pub async fn dispatch<T: Any + Send>(
        &self,
        request: &DispatchRequest,
    ) -> Result<DispatchOutcome<T>, DispatchError> {
        self.run(request, self.strict_types).await
    }

    /// Programmatic invocation: resolution is always strict, so an unknown
    /// handler is an error rather than a fallthrough.
    ///
    /// # Errors
    ///
    /// Every [`DispatchError`] except `MalformedPath`.
    pub async fn invoke<T: Any + Send>(&self, request: &DispatchRequest) -> Result<T, DispatchError> {
        match self.run::<T>(request, true).await? {
            DispatchOutcome::Completed(value) => Ok(value),
            DispatchOutcome::NotApplicable(reason) => Err(reason),
        }
    }

    async fn run<T: Any + Send>(
        &self,
        request: &DispatchRequest,
        strict: bool,
    ) -> Result<DispatchOutcome<T>, DispatchError> {
        let request_id = RequestId::new();
        let span = info_span!(
            "dispatch",
            request_id = %request_id,
            handler = %request.handler_name,
            action = %request.action_name
        );
        async move {
            let started = Instant::now();
            let result = self.run_stages::<T>(request, strict).await;
            let elapsed_us = started.elapsed().as_micros() as u64;
            match &result {
                Ok(DispatchOutcome::Completed(_)) => {
                    info!(target: DISPATCH_TARGET, elapsed_us, "dispatch completed");
                }
                Ok(DispatchOutcome::NotApplicable(reason)) => {
                    debug!(target: DISPATCH_TARGET, reason = reason.kind(), "dispatch not applicable");
                }
                Err(err) => {
                    warn!(
                        target: DISPATCH_TARGET,
                        kind = err.kind(),
                        error = %err,
                        elapsed_us,
                        "dispatch faulted"
                    );
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_stages<T: Any + Send>(
        &self,
        request: &DispatchRequest,
        strict: bool,
    ) -> Result<DispatchOutcome<T>, DispatchError> {
        let qualified = self.handlers.qualify(&request.handler_name);
        let Some(descriptor) = self.handlers.resolve_type(&qualified, true) else {
            let err = DispatchError::UnknownHandlerType { name: qualified };
            return if strict {
                Err(err)
            } else {
                Ok(DispatchOutcome::NotApplicable(err))
            };
        };

        let instance = activate(&descriptor, &self.services)?;
        let invocation = invoke(instance, &request.action_name, &request.arguments())?;

        let value = match self.action_timeout {
            None => unify::<T>(invocation).await?,
            Some(timeout) => {
                let handler = invocation.handler.clone();
                let action = invocation.action.clone();
                tokio::time::timeout(timeout, unify::<T>(invocation))
                    .await
                    .map_err(|_| DispatchError::ActionTimeout {
                        handler,
                        action,
                        timeout,
                    })??
            }
        };

        Ok(DispatchOutcome::Completed(value))
    }
}
