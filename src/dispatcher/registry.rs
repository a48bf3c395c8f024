//! Handler registry: the explicit, build-time table that replaces runtime
//! type lookup.
//!
//! A [`HandlerDescriptor`] bundles everything the dispatcher needs to know
//! about one handler type: its name, the dependencies its single constructor
//! takes, the constructor itself and its action table. Descriptors are
//! assembled with [`HandlerBuilder`], whose type state makes it impossible to
//! build a descriptor without a constructor or to attach a second one.
//!
//! ```rust
//! use dyndispatch::dispatcher::{HandlerDescriptor, HandlerRegistry, InvocationOutcome};
//!
//! struct Ping;
//!
//! let registry = HandlerRegistry::builder("App.Controllers")
//!     .register(
//!         HandlerDescriptor::builder::<Ping>("PingController")
//!             .constructor(|_| Ok(Ping))
//!             .action("pong", 0, |_, _| InvocationOutcome::realized(b"pong".to_vec()))
//!             .build(),
//!     )
//!     .unwrap()
//!     .build();
//!
//! assert!(registry
//!     .resolve_type("app.controllers.pingcontroller", true)
//!     .is_some());
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use super::activator::{ConstructorPlan, ResolvedArgs};
use super::errors::ActionError;
use super::invoker::InvocationOutcome;
use super::services::Dependency;
use super::DISPATCH_TARGET;

type ConstructFn =
    Arc<dyn Fn(&ResolvedArgs) -> Result<Box<dyn Any + Send>, ActionError> + Send + Sync>;
type ActionFn = Arc<dyn Fn(&mut (dyn Any + Send), &[String]) -> InvocationOutcome + Send + Sync>;

/// Errors raised while assembling the registry at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("handler name must not be empty")]
    EmptyHandlerName,
    #[error("handler '{name}' is already registered")]
    DuplicateHandler { name: String },
    #[error("handler '{handler}' declares action '{action}' more than once")]
    DuplicateAction { handler: String, action: String },
}

/// One named operation exposed by a handler.
#[derive(Clone)]
pub struct ActionDescriptor {
    name: String,
    arity: usize,
    call: ActionFn,
}

impl ActionDescriptor {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of positional arguments the action consumes.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub(crate) fn call(&self, instance: &mut (dyn Any + Send), arguments: &[String]) -> InvocationOutcome {
        (self.call)(instance, arguments)
    }
}

impl fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Everything needed to construct and call one handler type.
pub struct HandlerDescriptor {
    name: String,
    plan: ConstructorPlan,
    construct: ConstructFn,
    actions: Vec<ActionDescriptor>,
}

impl HandlerDescriptor {
    /// Start describing handler type `H` registered under `name`.
    pub fn builder<H: Send + 'static>(name: impl Into<String>) -> HandlerBuilder<H, NoConstructor> {
        HandlerBuilder {
            name: name.into(),
            plan: ConstructorPlan::default(),
            constructor: NoConstructor,
            actions: Vec::new(),
            _handler: PhantomData,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn constructor_plan(&self) -> &ConstructorPlan {
        &self.plan
    }

    #[must_use]
    pub fn actions(&self) -> &[ActionDescriptor] {
        &self.actions
    }

    /// Case-insensitive action lookup.
    #[must_use]
    pub fn find_action(&self, name: &str) -> Option<&ActionDescriptor> {
        self.actions
            .iter()
            .find(|action| fold_case(&action.name) == fold_case(name))
    }

    pub(crate) fn construct(&self, args: &ResolvedArgs) -> Result<Box<dyn Any + Send>, ActionError> {
        (self.construct)(args)
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("plan", &self.plan)
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}

/// Builder state before a constructor is attached.
pub struct NoConstructor;

/// Builder state once the constructor is known.
pub struct WithConstructor(ConstructFn);

/// Type-state builder for [`HandlerDescriptor`].
///
/// Dependencies are declared first, in constructor parameter order, then the
/// constructor, then actions.
pub struct HandlerBuilder<H, C> {
    name: String,
    plan: ConstructorPlan,
    constructor: C,
    actions: Vec<ActionDescriptor>,
    _handler: PhantomData<fn() -> H>,
}

impl<H: Send + 'static> HandlerBuilder<H, NoConstructor> {
    /// Declare a dependency that must be registered for activation to succeed.
    #[must_use]
    pub fn depends_on<T: Any + Send + Sync>(mut self) -> Self {
        self.plan.push(Dependency::required::<T>());
        self
    }

    /// Declare a dependency the constructor can do without.
    #[must_use]
    pub fn optional<T: Any + Send + Sync>(mut self) -> Self {
        self.plan.push(Dependency::optional::<T>());
        self
    }

    /// Attach the handler's one constructor.
    pub fn constructor<F>(self, construct: F) -> HandlerBuilder<H, WithConstructor>
    where
        F: Fn(&ResolvedArgs) -> Result<H, ActionError> + Send + Sync + 'static,
    {
        let construct: ConstructFn = Arc::new(move |args: &ResolvedArgs| {
            construct(args).map(|handler| Box::new(handler) as Box<dyn Any + Send>)
        });
        HandlerBuilder {
            name: self.name,
            plan: self.plan,
            constructor: WithConstructor(construct),
            actions: self.actions,
            _handler: PhantomData,
        }
    }
}

impl<H: Send + 'static, C> HandlerBuilder<H, C> {
    /// Expose `name` as an action taking `arity` positional arguments.
    #[must_use]
    pub fn action<F>(mut self, name: &str, arity: usize, action: F) -> Self
    where
        F: Fn(&mut H, &[String]) -> InvocationOutcome + Send + Sync + 'static,
    {
        let handler_name = self.name.clone();
        let call: ActionFn = Arc::new(move |instance: &mut (dyn Any + Send), args: &[String]| {
            match instance.downcast_mut::<H>() {
                Some(handler) => action(handler, args),
                None => InvocationOutcome::fault(format!(
                    "instance passed to '{handler_name}' is not a {}",
                    std::any::type_name::<H>()
                )),
            }
        });
        self.actions.push(ActionDescriptor {
            name: name.to_string(),
            arity,
            call,
        });
        self
    }
}

impl<H: Send + 'static> HandlerBuilder<H, WithConstructor> {
    #[must_use]
    pub fn build(self) -> HandlerDescriptor {
        HandlerDescriptor {
            name: self.name,
            plan: self.plan,
            construct: self.constructor.0,
            actions: self.actions,
        }
    }
}

/// Immutable lookup table from qualified handler name to descriptor.
///
/// Qualified names are `<namespace>.<handler name>`. Lookups may be exact or
/// case-insensitive.
#[derive(Debug, Clone)]
pub struct HandlerRegistry {
    namespace: String,
    exact: HashMap<String, Arc<HandlerDescriptor>>,
    folded: HashMap<String, Arc<HandlerDescriptor>>,
}

impl HandlerRegistry {
    pub fn builder(namespace: impl Into<String>) -> HandlerRegistryBuilder {
        HandlerRegistryBuilder {
            namespace: namespace.into(),
            exact: HashMap::new(),
            folded: HashMap::new(),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Qualify a bare handler name with this registry's namespace.
    #[must_use]
    pub fn qualify(&self, handler_name: &str) -> String {
        qualify(&self.namespace, handler_name)
    }

    /// Resolve a qualified handler name.
    #[must_use]
    pub fn resolve_type(
        &self,
        qualified_name: &str,
        case_insensitive: bool,
    ) -> Option<Arc<HandlerDescriptor>> {
        let found = if case_insensitive {
            self.folded.get(&fold_case(qualified_name))
        } else {
            self.exact.get(qualified_name)
        };
        found.map(Arc::clone)
    }

    /// Registered descriptors, sorted by qualified name.
    #[must_use]
    pub fn handlers(&self) -> Vec<(&str, &Arc<HandlerDescriptor>)> {
        let mut handlers: Vec<_> = self
            .exact
            .iter()
            .map(|(name, descriptor)| (name.as_str(), descriptor))
            .collect();
        handlers.sort_unstable_by_key(|(name, _)| *name);
        handlers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}

/// Collects descriptors and validates names before freezing the registry.
pub struct HandlerRegistryBuilder {
    namespace: String,
    exact: HashMap<String, Arc<HandlerDescriptor>>,
    folded: HashMap<String, Arc<HandlerDescriptor>>,
}

impl HandlerRegistryBuilder {
    /// Add a descriptor.
    ///
    /// # Errors
    ///
    /// Rejects empty names, handlers whose names collide case-insensitively
    /// with one already registered, and handlers declaring the same action
    /// twice.
    pub fn register(mut self, descriptor: HandlerDescriptor) -> Result<Self, RegistryError> {
        if descriptor.name.is_empty() {
            return Err(RegistryError::EmptyHandlerName);
        }
        for (index, action) in descriptor.actions.iter().enumerate() {
            let duplicate = descriptor.actions[..index]
                .iter()
                .any(|earlier| fold_case(&earlier.name) == fold_case(&action.name));
            if duplicate {
                return Err(RegistryError::DuplicateAction {
                    handler: descriptor.name.clone(),
                    action: action.name.clone(),
                });
            }
        }

        let qualified = qualify(&self.namespace, &descriptor.name);
        let folded = fold_case(&qualified);
        if self.folded.contains_key(&folded) {
            return Err(RegistryError::DuplicateHandler { name: qualified });
        }

        info!(
            target: DISPATCH_TARGET,
            handler = %qualified,
            dependencies = descriptor.plan.len(),
            actions = descriptor.actions.len(),
            "handler registered"
        );

        let descriptor = Arc::new(descriptor);
        self.folded.insert(folded, Arc::clone(&descriptor));
        self.exact.insert(qualified, descriptor);
        Ok(self)
    }

    #[must_use]
    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            namespace: self.namespace,
            exact: self.exact,
            folded: self.folded,
        }
    }
}

/// Unicode lowercase, so names title-cased by the path decoder still match.
fn fold_case(name: &str) -> String {
    name.to_lowercase()
}

fn qualify(namespace: &str, handler_name: &str) -> String {
    if namespace.is_empty() {
        handler_name.to_string()
    } else {
        format!("{namespace}.{handler_name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;

    fn ping(name: &str) -> HandlerDescriptor {
        HandlerDescriptor::builder::<Ping>(name)
            .constructor(|_| Ok(Ping))
            .action("Pong", 0, |_, _| InvocationOutcome::realized(()))
            .build()
    }

    #[test]
    fn resolves_exact_and_case_insensitive() {
        let registry = HandlerRegistry::builder("App.Controllers")
            .register(ping("PingController"))
            .unwrap()
            .build();

        assert!(registry
            .resolve_type("App.Controllers.PingController", false)
            .is_some());
        assert!(registry
            .resolve_type("app.controllers.PINGCONTROLLER", false)
            .is_none());
        assert!(registry
            .resolve_type("app.controllers.PINGCONTROLLER", true)
            .is_some());
        assert!(registry
            .resolve_type("App.Controllers.PongController", true)
            .is_none());
    }

    #[test]
    fn case_folding_covers_non_ascii_names() {
        let registry = HandlerRegistry::builder("App.Controllers")
            .register(ping("élanController"))
            .unwrap()
            .build();
        let descriptor = registry
            .resolve_type("App.Controllers.ÉlanController", true)
            .unwrap();
        assert_eq!(descriptor.name(), "élanController");

        let descriptor = HandlerDescriptor::builder::<Ping>("PingController")
            .constructor(|_| Ok(Ping))
            .action("Öffnen", 0, |_, _| InvocationOutcome::realized(()))
            .build();
        assert!(descriptor.find_action("öffnen").is_some());
    }

    #[test]
    fn qualifies_with_namespace() {
        let registry = HandlerRegistry::builder("App.Controllers").build();
        assert_eq!(registry.qualify("AccountController"), "App.Controllers.AccountController");
        let bare = HandlerRegistry::builder("").build();
        assert_eq!(bare.qualify("AccountController"), "AccountController");
    }

    #[test]
    fn rejects_case_insensitive_duplicates() {
        let err = HandlerRegistry::builder("App")
            .register(ping("PingController"))
            .unwrap()
            .register(ping("pingcontroller"))
            .err()
            .unwrap();
        assert_eq!(
            err,
            RegistryError::DuplicateHandler {
                name: "App.pingcontroller".to_string()
            }
        );
    }

    #[test]
    fn rejects_duplicate_actions() {
        let descriptor = HandlerDescriptor::builder::<Ping>("PingController")
            .constructor(|_| Ok(Ping))
            .action("pong", 0, |_, _| InvocationOutcome::realized(()))
            .action("PONG", 1, |_, _| InvocationOutcome::realized(()))
            .build();
        let err = HandlerRegistry::builder("App")
            .register(descriptor)
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::DuplicateAction { .. }));
    }

    #[test]
    fn rejects_empty_name() {
        let err = HandlerRegistry::builder("App").register(ping("")).err().unwrap();
        assert_eq!(err, RegistryError::EmptyHandlerName);
    }

    #[test]
    fn actions_may_be_declared_before_constructor() {
        let descriptor = HandlerDescriptor::builder::<Ping>("PingController")
            .action("early", 0, |_, _| InvocationOutcome::realized(()))
            .constructor(|_| Ok(Ping))
            .build();
        assert!(descriptor.find_action("EARLY").is_some());
    }

    #[test]
    fn handlers_are_listed_in_name_order() {
        let registry = HandlerRegistry::builder("App")
            .register(ping("ZetaController"))
            .unwrap()
            .register(ping("AlphaController"))
            .unwrap()
            .build();
        let names: Vec<&str> = registry.handlers().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["App.AlphaController", "App.ZetaController"]);
        assert_eq!(registry.len(), 2);
    }
}
