//! Handler activation: resolve the constructor's dependencies from the
//! [`ServiceRegistry`] and build a fresh instance for one dispatch.

use std::any::{type_name, Any, TypeId};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use super::errors::{ActionError, DispatchError, HandlerPanicked, MissingDependency};
use super::registry::HandlerDescriptor;
use super::services::{Dependency, Service, ServiceRegistry};
use super::DISPATCH_TARGET;

/// Ordered constructor parameters of a handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstructorPlan {
    params: Vec<Dependency>,
}

impl ConstructorPlan {
    #[must_use]
    pub fn params(&self) -> &[Dependency] {
        &self.params
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub(crate) fn push(&mut self, dependency: Dependency) {
        self.params.push(dependency);
    }
}

/// Constructor arguments in declared order. Optional dependencies that were
/// not registered are held as `None`.
pub struct ResolvedArgs {
    slots: Vec<(Dependency, Option<Service>)>,
}

impl ResolvedArgs {
    /// The service of type `T`, if it was declared and resolved.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let wanted = TypeId::of::<T>();
        self.slots
            .iter()
            .find(|(dep, _)| dep.type_id() == wanted)
            .and_then(|(_, service)| service.clone())
            .and_then(|service| service.downcast::<T>().ok())
    }

    /// Like [`get`](Self::get) but treats absence as an error, for use inside
    /// constructors with `?`.
    ///
    /// # Errors
    ///
    /// Returns [`MissingDependency`] when `T` was not resolved.
    pub fn require<T: Any + Send + Sync>(&self) -> Result<Arc<T>, ActionError> {
        self.get::<T>().ok_or_else(|| {
            Box::new(MissingDependency {
                type_name: type_name::<T>(),
            }) as ActionError
        })
    }

    /// Number of parameters that received a service.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.slots.iter().filter(|(_, s)| s.is_some()).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// A constructed handler, owned by exactly one dispatch.
pub struct HandlerInstance {
    descriptor: Arc<HandlerDescriptor>,
    inner: Box<dyn Any + Send>,
}

impl HandlerInstance {
    #[must_use]
    pub fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }

    pub(crate) fn descriptor_arc(&self) -> Arc<HandlerDescriptor> {
        Arc::clone(&self.descriptor)
    }

    pub(crate) fn as_any_mut(&mut self) -> &mut (dyn Any + Send) {
        self.inner.as_mut()
    }
}

impl std::fmt::Debug for HandlerInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerInstance")
            .field("handler", &self.descriptor.name())
            .finish_non_exhaustive()
    }
}

/// Resolve every declared dependency of `descriptor`.
///
/// # Errors
///
/// Returns [`DispatchError::ActivationFault`] wrapping [`MissingDependency`]
/// for the first required dependency that is not registered.
pub fn resolve_arguments(
    descriptor: &HandlerDescriptor,
    services: &ServiceRegistry,
) -> Result<ResolvedArgs, DispatchError> {
    let plan = descriptor.constructor_plan();
    let mut slots = Vec::with_capacity(plan.len());
    for dependency in plan.params() {
        let service = services.resolve(dependency);
        if service.is_none() {
            if dependency.is_required() {
                return Err(DispatchError::ActivationFault {
                    handler: descriptor.name().to_string(),
                    source: Box::new(MissingDependency {
                        type_name: dependency.type_name(),
                    }),
                });
            }
            debug!(
                target: DISPATCH_TARGET,
                handler = descriptor.name(),
                dependency = dependency.type_name(),
                "optional dependency not registered; omitted"
            );
        }
        slots.push((*dependency, service));
    }
    Ok(ResolvedArgs { slots })
}

/// Build a fresh instance of `descriptor`.
///
/// # Errors
///
/// [`DispatchError::ActivationFault`] when a required dependency is missing,
/// or when the constructor returns an error or panics.
pub fn activate(
    descriptor: &Arc<HandlerDescriptor>,
    services: &ServiceRegistry,
) -> Result<HandlerInstance, DispatchError> {
    let args = resolve_arguments(descriptor, services)?;

    let constructed = catch_unwind(AssertUnwindSafe(|| descriptor.construct(&args)))
        .unwrap_or_else(|payload| Err(Box::new(HandlerPanicked::from_payload(payload)) as ActionError));

    match constructed {
        Ok(inner) => {
            debug!(
                target: DISPATCH_TARGET,
                handler = descriptor.name(),
                resolved = args.resolved_count(),
                declared = args.len(),
                "handler activated"
            );
            Ok(HandlerInstance {
                descriptor: Arc::clone(descriptor),
                inner,
            })
        }
        Err(source) => {
            warn!(
                target: DISPATCH_TARGET,
                handler = descriptor.name(),
                error = %source,
                "handler constructor failed"
            );
            Err(DispatchError::ActivationFault {
                handler: descriptor.name().to_string(),
                source,
            })
        }
    }
}
