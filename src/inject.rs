use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use tracing::{debug, instrument, trace};

use crate::class::{Catalog, Class};
use crate::provider::Provider;
use crate::resolve::{
    Arguments, ContainerError, ContainerId, ErrorKind, ParamType, Parameter, Result,
};
use crate::service::{Binding, Service, Snapshot};
use crate::value::{Instance, Value};

/// Mutable state of a container.
///
/// Only borrowed for short sections: never while calling into providers, factories or handlers.
#[derive(Default)]
pub(crate) struct Registry {
    services: HashMap<String, Service>,
    providers: Vec<(TypeId, Arc<dyn Provider>)>,
    registered: HashSet<TypeId>,
    booted: HashSet<TypeId>,
    resolving: HashSet<String>,
}

/// Dependency injection container.
///
/// Services are registered under a name with [Container::add] (or supplied lazily by a
/// [Provider]) and resolved with [Container::get]. Classes of the associated [Catalog]
/// are constructed on demand, their parameters being resolved recursively.
///
/// All operations are serialized by a reentrant lock: a resolution runs on a single thread,
/// and factories or providers can call back into the container.
pub struct Container {
    id: ContainerId,
    catalog: Arc<Catalog>,
    registry: ReentrantMutex<RefCell<Registry>>,
}

/// Marks a name as being resolved until dropped
struct InProgress<'a> {
    container: &'a Container,
    name: String,
    service: Option<Service>,
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        if let Some(service) = &self.service {
            service.set_locked(false);
        }
        self.container
            .with_registry(|registry| registry.resolving.remove(&self.name));
    }
}

impl Container {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            id: ContainerId::next(),
            catalog: Arc::new(catalog),
            registry: ReentrantMutex::new(RefCell::new(Registry::default())),
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Hold the container for the current thread
    pub(crate) fn exclusive(&self) -> ReentrantMutexGuard<'_, RefCell<Registry>> {
        self.registry.lock()
    }

    fn with_registry<T>(&self, f: impl FnOnce(&mut Registry) -> T) -> T {
        let guard = self.registry.lock();
        let mut registry = guard.borrow_mut();
        f(&mut registry)
    }

    pub(crate) fn error(&self, kind: ErrorKind) -> ContainerError {
        ContainerError::new(kind).within(self.id)
    }

    /// Register a service.
    ///
    /// If a service is already stored under this name, it is returned unchanged.
    pub fn add(&self, name: impl Into<String>, shared: bool, binding: impl Into<Binding>) -> Service {
        let name = name.into();
        self.with_registry(|registry| {
            registry
                .services
                .entry(name)
                .or_insert_with_key(|name| {
                    debug!(container = %self.id, service = %name, shared, "adding service");
                    Service::new(shared, binding)
                })
                .clone()
        })
    }

    /// Register a non-shared service, like an assignment to the container
    pub fn set(&self, name: impl Into<String>, binding: impl Into<Binding>) -> Service {
        self.add(name, false, binding)
    }

    pub fn remove(&self, name: &str) {
        if self
            .with_registry(|registry| registry.services.remove(name))
            .is_some()
        {
            debug!(container = %self.id, service = name, "removed service");
        }
    }

    /// Check if a service is registered, or can be supplied by a provider
    pub fn has(&self, name: &str) -> bool {
        self.stored(name).is_some() || self.provides(name)
    }

    fn stored(&self, name: &str) -> Option<Service> {
        self.with_registry(|registry| registry.services.get(name).cloned())
    }

    /// Add a service provider.
    ///
    /// The provider is bootstrapped immediately, but only registered when one
    /// of its services is first requested.
    pub fn provider<P: Provider + 'static>(&self, provider: P) -> &Self {
        let _exclusive = self.exclusive();
        provider.bootstrap(self);
        let provider: Arc<dyn Provider> = Arc::new(provider);
        self.with_registry(|registry| registry.providers.push((TypeId::of::<P>(), provider)));
        self
    }

    fn providers(&self) -> Vec<(TypeId, Arc<dyn Provider>)> {
        self.with_registry(|registry| registry.providers.clone())
    }

    fn provides(&self, name: &str) -> bool {
        self.providers()
            .iter()
            .any(|(_, provider)| provider.provides(name))
    }

    /// Let the first matching provider register its services
    fn register(&self, name: &str) {
        for (kind, provider) in self.providers() {
            if self.with_registry(|registry| registry.registered.contains(&kind)) {
                continue;
            }
            if !provider.provides(name) {
                continue;
            }
            if self.with_registry(|registry| registry.booted.insert(kind)) {
                debug!(container = %self.id, service = name, "booting provider");
                provider.boot(self);
            }
            self.with_registry(|registry| registry.registered.insert(kind));
            debug!(container = %self.id, service = name, "registering provider");
            provider.register(self);
            return;
        }
    }

    /// Obtain an instance of a service, or of a class from the catalog.
    ///
    /// Shared services are built once and then cached.
    #[instrument(level = "debug", skip(self), fields(container = %self.id))]
    pub fn get(&self, name: &str) -> Result<Instance> {
        let _exclusive = self.exclusive();

        if !self.has(name) {
            let Some(class) = self.catalog.class(name) else {
                return Err(self.error(ErrorKind::NotFound(name.to_string())));
            };
            let _progress = self.enter(name, None)?;
            return self.make(&class, &Arguments::new());
        }

        let service = match self.stored(name) {
            Some(service) => service,
            None => {
                self.register(name);
                self.stored(name)
                    .ok_or_else(|| self.error(ErrorKind::NotProvided(name.to_string())))?
            }
        };

        let Snapshot {
            binding,
            arguments,
            decorators,
        } = service.snapshot();
        let progress = self.enter(name, Some(&service))?;
        let value = self.build(name, binding, &arguments, &decorators);
        drop(progress);

        let instance = value?
            .into_object()
            .ok_or_else(|| self.error(ErrorKind::NotInstantiable(name.to_string())))?;
        if service.cache(&instance) {
            debug!(container = %self.id, service = name, "cached shared instance");
        }
        Ok(instance)
    }

    /// Obtain a service and downcast it to a concrete type
    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.get(name)?.downcast().ok_or_else(|| {
            self.error(ErrorKind::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
        })
    }

    fn enter(&self, name: &str, service: Option<&Service>) -> Result<InProgress<'_>> {
        if !self.with_registry(|registry| registry.resolving.insert(name.to_string())) {
            return Err(self.error(ErrorKind::CircularReference(name.to_string())));
        }
        if let Some(service) = service {
            service.set_locked(true);
        }
        Ok(InProgress {
            container: self,
            name: name.to_string(),
            service: service.cloned(),
        })
    }

    fn build(
        &self,
        name: &str,
        binding: Binding,
        arguments: &Arguments,
        decorators: &[(String, Arguments)],
    ) -> Result<Value> {
        let binding = match binding {
            Binding::Concrete(instance) => return Ok(instance.into()),
            Binding::Factory(factory) => return factory(self).map_err(|e| e.within(self.id)),
            other => other,
        };

        if let Some(class) = self.catalog.class(name) {
            return self
                .make_decorated(&class, arguments, decorators)
                .map(Value::from);
        }

        match binding {
            Binding::ByName(target) if self.catalog.is_interface(name) => {
                if self.has(&target) {
                    return self.get(&target).map(Value::from);
                }
                match self.catalog.class(&target) {
                    Some(class) => self
                        .make_decorated(&class, arguments, decorators)
                        .map(Value::from),
                    None => Ok(Value::Null),
                }
            }
            _ => Ok(Value::Null),
        }
    }

    fn make(&self, class: &Class, arguments: &Arguments) -> Result<Instance> {
        let resolved = self.resolve(class.params(), arguments)?;
        class.construct(resolved).map_err(|e| e.within(self.id))
    }

    fn make_decorated(
        &self,
        class: &Class,
        arguments: &Arguments,
        decorators: &[(String, Arguments)],
    ) -> Result<Instance> {
        let instance = self.make(class, arguments)?;
        self.decorate(&instance, decorators)?;
        Ok(instance)
    }

    /// Resolve a list of parameters, in declaration order
    pub(crate) fn resolve(
        &self,
        parameters: &[Parameter],
        arguments: &Arguments,
    ) -> Result<Vec<Value>> {
        parameters
            .iter()
            .map(|parameter| self.resolve_parameter(parameter, arguments))
            .collect()
    }

    fn resolve_parameter(&self, parameter: &Parameter, arguments: &Arguments) -> Result<Value> {
        let argument = arguments.get(parameter.name());
        match parameter.kind() {
            ParamType::Class(class) => {
                if let Some(Value::Object(instance)) = argument {
                    if instance.class() == class {
                        trace!(parameter = parameter.name(), "using bound object");
                        return Ok(instance.clone().into());
                    }
                }
                trace!(parameter = parameter.name(), class = %class, "resolving dependency");
                self.get(class).map(Value::from).map_err(|err| {
                    if err.is_circular() {
                        err
                    } else {
                        self.error(ErrorKind::DependencyFailed {
                            parameter: parameter.name().to_string(),
                            source: Box::new(err),
                        })
                    }
                })
            }
            ParamType::Builtin => argument
                .or(parameter.default_value())
                .cloned()
                .ok_or_else(|| {
                    self.error(ErrorKind::UnresolvedParameter(parameter.name().to_string()))
                }),
        }
    }

    /// Apply decorator method calls to a new instance
    fn decorate(&self, instance: &Instance, decorators: &[(String, Arguments)]) -> Result<()> {
        if decorators.is_empty() {
            return Ok(());
        }
        let class = self.catalog.class(instance.class());
        for (name, arguments) in decorators {
            let method = class
                .as_ref()
                .and_then(|class| class.method_named(name))
                .ok_or_else(|| self.error(ErrorKind::MethodNotFound(name.clone())))?;
            let resolved = self.resolve(method.params(), arguments)?;
            trace!(class = instance.class(), method = %name, "decorating");
            method
                .invoke(instance, resolved)
                .map_err(|e| e.within(self.id))?;
        }
        Ok(())
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new(Catalog::default())
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (mut services, providers) = self.with_registry(|registry| {
            (
                registry.services.keys().cloned().collect::<Vec<_>>(),
                registry.providers.len(),
            )
        });
        services.sort();
        f.debug_struct("Container")
            .field("id", &self.id)
            .field("services", &services)
            .field("providers", &providers)
            .finish()
    }
}
