//! Service records stored in the container registry

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::inject::Container;
use crate::resolve::{Arguments, Result};
use crate::value::{Instance, Value};

/// Factory closure, called with the container which resolves the service
pub type Factory = Arc<dyn Fn(&Container) -> Result<Value> + Send + Sync>;

/// How a service obtains its instance
#[derive(Clone, Default)]
pub enum Binding {
    /// Construct the class of the same name
    #[default]
    Empty,
    /// Always use this object
    Concrete(Instance),
    /// Call a factory
    Factory(Factory),
    /// Implementation class (or service) name for an interface
    ByName(String),
}

impl Binding {
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&Container) -> Result<Value> + Send + Sync + 'static,
    {
        Binding::Factory(Arc::new(factory))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Binding::Empty)
    }

    pub fn as_concrete(&self) -> Option<&Instance> {
        match self {
            Binding::Concrete(instance) => Some(instance),
            _ => None,
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Empty => write!(f, "Empty"),
            Binding::Concrete(instance) => f.debug_tuple("Concrete").field(instance).finish(),
            Binding::Factory(_) => write!(f, "Factory(..)"),
            Binding::ByName(name) => f.debug_tuple("ByName").field(name).finish(),
        }
    }
}

impl From<Instance> for Binding {
    fn from(instance: Instance) -> Self {
        Binding::Concrete(instance)
    }
}

impl From<&str> for Binding {
    fn from(name: &str) -> Self {
        Binding::ByName(name.to_string())
    }
}

impl From<String> for Binding {
    fn from(name: String) -> Self {
        Binding::ByName(name)
    }
}

#[derive(Debug, Default)]
struct Record {
    shared: bool,
    locked: bool,
    binding: Binding,
    arguments: Arguments,
    decorators: Vec<(String, Arguments)>,
}

/// Shared handle on a service registration.
///
/// Clones of the handle refer to the same record.
#[derive(Clone, Default)]
pub struct Service(Arc<Mutex<Record>>);

/// Copy of the parts of a record used by a single resolution
pub(crate) struct Snapshot {
    pub binding: Binding,
    pub arguments: Arguments,
    pub decorators: Vec<(String, Arguments)>,
}

impl Service {
    pub fn new(shared: bool, binding: impl Into<Binding>) -> Self {
        Service(Arc::new(Mutex::new(Record {
            shared,
            binding: binding.into(),
            ..Record::default()
        })))
    }

    pub fn set_shared(&self, shared: bool) -> &Self {
        self.0.lock().shared = shared;
        self
    }

    pub fn set_instance(&self, binding: impl Into<Binding>) -> &Self {
        self.0.lock().binding = binding.into();
        self
    }

    /// Bind a named constructor argument
    pub fn with_argument(&self, name: impl Into<String>, value: impl Into<Value>) -> &Self {
        self.0.lock().arguments.insert(name, value);
        self
    }

    /// Bind a method call applied after construction.
    ///
    /// Binding the same method again replaces its arguments but keeps its position.
    pub fn with_decorator(&self, method: impl Into<String>, arguments: Arguments) -> &Self {
        let method = method.into();
        {
            let mut record = self.0.lock();
            match record.decorators.iter_mut().find(|(m, _)| *m == method) {
                Some(slot) => slot.1 = arguments,
                None => record.decorators.push((method, arguments)),
            }
        }
        self
    }

    pub fn is_locked(&self) -> bool {
        self.0.lock().locked
    }

    pub fn is_shared(&self) -> bool {
        self.0.lock().shared
    }

    pub fn instance(&self) -> Binding {
        self.0.lock().binding.clone()
    }

    pub fn argument(&self, name: &str) -> Option<Value> {
        self.0.lock().arguments.get(name).cloned()
    }

    pub fn decorator(&self, method: &str) -> Option<Arguments> {
        self.0
            .lock()
            .decorators
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, a)| a.clone())
    }

    pub fn arguments(&self) -> Arguments {
        self.0.lock().arguments.clone()
    }

    pub fn decorators(&self) -> Vec<(String, Arguments)> {
        self.0.lock().decorators.clone()
    }

    /// Check if both handles refer to the same registration
    pub fn ptr_eq(&self, other: &Service) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn set_locked(&self, locked: bool) {
        self.0.lock().locked = locked;
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        let record = self.0.lock();
        Snapshot {
            binding: record.binding.clone(),
            arguments: record.arguments.clone(),
            decorators: record.decorators.clone(),
        }
    }

    /// Store a resolved instance, unless a concrete object or a name is already bound
    pub(crate) fn cache(&self, instance: &Instance) -> bool {
        let mut record = self.0.lock();
        let cacheable = record.shared
            && matches!(record.binding, Binding::Empty | Binding::Factory(_));
        if cacheable {
            record.binding = Binding::Concrete(instance.clone());
        }
        cacheable
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.0.lock();
        f.debug_struct("Service")
            .field("shared", &record.shared)
            .field("locked", &record.locked)
            .field("binding", &record.binding)
            .field("arguments", &record.arguments)
            .field("decorators", &record.decorators)
            .finish()
    }
}
