//! Service registry consulted when activating handlers.
//!
//! Services are keyed by their concrete type. The registry is built once at
//! startup, wrapped in an `Arc`, and only read afterwards.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Type-erased shared service instance.
pub type Service = Arc<dyn Any + Send + Sync>;

/// One constructor parameter: the service type it needs and whether the
/// handler can be built without it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    type_id: TypeId,
    type_name: &'static str,
    required: bool,
}

impl Dependency {
    /// A dependency whose absence fails activation.
    #[must_use]
    pub fn required<T: Any + Send + Sync>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            required: true,
        }
    }

    /// A dependency the constructor receives as `None` when unregistered.
    #[must_use]
    pub fn optional<T: Any + Send + Sync>() -> Self {
        Self {
            required: false,
            ..Self::required::<T>()
        }
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }
}

/// Read-only lookup table from service type to instance.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<TypeId, (&'static str, Service)>,
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.services.values().map(|(name, _)| *name).collect();
        names.sort_unstable();
        f.debug_struct("ServiceRegistry")
            .field("services", &names)
            .finish()
    }
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration.
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, service: T) -> Self {
        self.insert(service);
        self
    }

    /// Register `service`, replacing any previous instance of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, service: T) {
        self.insert_arc(Arc::new(service));
    }

    /// Register an already shared instance.
    pub fn insert_arc<T: Any + Send + Sync>(&mut self, service: Arc<T>) {
        let service: Service = service;
        self.services
            .insert(TypeId::of::<T>(), (type_name::<T>(), service));
    }

    /// Look up the service satisfying `dependency`.
    #[must_use]
    pub fn resolve(&self, dependency: &Dependency) -> Option<Service> {
        self.services
            .get(&dependency.type_id())
            .map(|(_, service)| Arc::clone(service))
    }

    /// Typed lookup.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|(_, service)| Arc::clone(service).downcast::<T>().ok())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
