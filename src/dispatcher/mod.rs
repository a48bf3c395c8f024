//! # Dispatcher Module
//!
//! Name-based dynamic dispatch. A request path such as
//! `/dynamic/account/photo/1045.jpg` selects a handler (`AccountController`),
//! an action on it (`photo`) and an argument (`1045`). The dispatcher builds a
//! fresh handler instance for the request, calls the action, and hands back
//! its result as a single awaited value whether the action was synchronous or
//! asynchronous.
//!
//! ## Request Flow
//!
//! 1. [`PathDecoder`] splits the path into a [`DispatchRequest`]
//! 2. [`HandlerRegistry::resolve_type`] finds the [`HandlerDescriptor`]
//!    (case-insensitive, namespace-qualified)
//! 3. [`activate`] resolves the constructor's declared dependencies from the
//!    [`ServiceRegistry`] and constructs a [`HandlerInstance`]
//! 4. [`invoke`] locates the action, checks arity, and captures the
//!    [`InvocationOutcome`]
//! 5. [`unify`] awaits pending computations and checks the result type
//!
//! ## Fallthrough
//!
//! A path that does not decode, or that names a handler nobody registered,
//! yields [`DispatchOutcome::NotApplicable`] rather than an error, so the
//! HTTP pipeline can try its next stage. Strict resolution
//! ([`Dispatcher::invoke`], or `strict_types` in config) turns the unknown
//! handler case into [`DispatchError::UnknownHandlerType`].
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use dyndispatch::dispatcher::{
//!     ActionError, Dispatcher, HandlerDescriptor, HandlerRegistry, InvocationOutcome,
//!     ServiceRegistry,
//! };
//!
//! struct Clock;
//!
//! let registry = HandlerRegistry::builder("App.Controllers")
//!     .register(
//!         HandlerDescriptor::builder::<Clock>("ClockController")
//!             .constructor(|_| Ok(Clock))
//!             .action("now", 0, |_, _| {
//!                 InvocationOutcome::pending(async { Ok::<_, ActionError>(b"12:00".to_vec()) })
//!             })
//!             .build(),
//!     )
//!     .unwrap()
//!     .build();
//!
//! let dispatcher = Dispatcher::new(Arc::new(registry), Arc::new(ServiceRegistry::new()));
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let body = runtime
//!     .block_on(dispatcher.dispatch_path::<Vec<u8>>("/dynamic/clock/now"))
//!     .unwrap()
//!     .completed();
//! assert_eq!(body.as_deref(), Some(&b"12:00"[..]));
//! ```

mod activator;
mod core;
mod errors;
mod invoker;
mod path;
mod registry;
mod services;
mod unify;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

pub use activator::{activate, resolve_arguments, ConstructorPlan, HandlerInstance, ResolvedArgs};
pub use core::{DispatchOutcome, Dispatcher};
pub use errors::{ActionError, DispatchError, HandlerPanicked, MissingDependency};
pub use invoker::{
    invoke, parse_argument, ActionValue, ArgumentError, Invocation, InvocationOutcome,
    PendingValue,
};
pub use path::{DispatchRequest, PathDecoder, MIN_SEGMENTS};
pub use registry::{
    ActionDescriptor, HandlerBuilder, HandlerDescriptor, HandlerRegistry, HandlerRegistryBuilder,
    NoConstructor, RegistryError, WithConstructor,
};
pub use services::{Dependency, Service, ServiceRegistry};
pub use unify::unify;
