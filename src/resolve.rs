//! Parameter descriptors and errors supporting the resolution rules
//!
//! Rust offers no runtime introspection of constructor signatures. Instead, each
//! constructible type describes its parameters with a list of [Parameter]s:
//!
//! * A class-typed parameter names the class or interface it expects. The container
//!   prefers a bound argument of that exact class and otherwise resolves the type by name.
//! * A built-in parameter (scalar, list, or untyped) is taken from the bound arguments,
//!   or from its declared default value.
//!
//! Named arguments are carried in an ordered [Arguments] map.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::value::Value;

/// Identifies the container which raised an error
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContainerId(u64);

impl ContainerId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ContainerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reasons for a failed resolution or call
#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("Service '{0}' not found")]
    NotFound(String),
    #[error("Service '{0}' not provided by any registered provider")]
    NotProvided(String),
    #[error("Circular reference for '{0}' service")]
    CircularReference(String),
    #[error("Can not resolve parameter '{0}'")]
    UnresolvedParameter(String),
    #[error("Can not resolve parameter '{parameter}'")]
    DependencyFailed {
        parameter: String,
        #[source]
        source: Box<ContainerError>,
    },
    #[error("Method '{0}' does not exist")]
    MethodNotFound(String),
    #[error("Service '{0}' can not be instantiated")]
    NotInstantiable(String),
    #[error("The specified value is not a callable")]
    NotCallable,
    #[error("Expected {expected} argument(s), got {found}")]
    Arity { expected: usize, found: usize },
    #[error("Expected a value of type {expected}, got {found}")]
    InvalidArgument {
        expected: &'static str,
        found: &'static str,
    },
    #[error("Service '{name}' is not a {expected}")]
    TypeMismatch { name: String, expected: &'static str },
    #[error("{0}")]
    Custom(String),
}

/// Error raised by the container, or by a handler it invoked.
///
/// Errors raised by the container itself record its [ContainerId].
#[derive(Debug)]
pub struct ContainerError {
    container: Option<ContainerId>,
    kind: ErrorKind,
}

pub type Result<T> = std::result::Result<T, ContainerError>;

impl ContainerError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            container: None,
            kind,
        }
    }

    /// Free-form failure, for use in constructors and factories
    pub fn custom(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Custom(message.into()))
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The container which raised (or relayed) this error
    pub fn container(&self) -> Option<ContainerId> {
        self.container
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound(_))
    }

    pub fn is_circular(&self) -> bool {
        matches!(self.kind, ErrorKind::CircularReference(_))
    }

    /// Attach a container id, unless one is already recorded
    pub(crate) fn within(mut self, container: ContainerId) -> Self {
        self.container.get_or_insert(container);
        self
    }
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

impl std::error::Error for ContainerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.kind)
    }
}

impl From<ErrorKind> for ContainerError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Declared type of a parameter
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamType {
    /// Scalar, list or untyped parameter
    Builtin,
    /// Class or interface name, resolvable through the container
    Class(String),
}

/// Description of a formal parameter
#[derive(Clone, Debug)]
pub struct Parameter {
    name: String,
    kind: ParamType,
    default: Option<Value>,
}

impl Parameter {
    pub fn builtin(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamType::Builtin,
            default: None,
        }
    }

    pub fn class(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamType::Class(class.into()),
            default: None,
        }
    }

    /// Declare a default value, used for built-in parameters without bound argument
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ParamType {
        &self.kind
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// Ordered map of named arguments.
///
/// Inserting an existing name replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arguments(Vec<(String, Value)>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Arguments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut arguments = Arguments::new();
        for (name, value) in iter {
            arguments.insert(name, value);
        }
        arguments
    }
}
