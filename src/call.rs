//! Call arbitrary callables after resolving their parameters
//!
//! The parameters of a [Callable] are resolved exactly like constructor parameters:
//! named arguments first, then the container for class-typed parameters, then declared
//! defaults. The order of the named arguments does not matter.

use tracing::instrument;

use crate::class::Function;
use crate::inject::Container;
use crate::resolve::{Arguments, ErrorKind, Result};
use crate::value::{Instance, Value};

/// Supported shapes of callables
#[derive(Clone, Debug)]
pub enum Callable {
    /// Anonymous function
    Closure(Function),
    /// Method of an object, by name
    Method(Instance, String),
    /// Object whose class is invokable
    Invokable(Instance),
    /// Function of the catalog, by name
    Named(String),
}

impl From<Function> for Callable {
    fn from(function: Function) -> Self {
        Callable::Closure(function)
    }
}

impl From<&str> for Callable {
    fn from(name: &str) -> Self {
        Callable::Named(name.to_string())
    }
}

impl From<String> for Callable {
    fn from(name: String) -> Self {
        Callable::Named(name)
    }
}

impl From<Instance> for Callable {
    fn from(receiver: Instance) -> Self {
        Callable::Invokable(receiver)
    }
}

impl<S: Into<String>> From<(Instance, S)> for Callable {
    fn from((receiver, method): (Instance, S)) -> Self {
        Callable::Method(receiver, method.into())
    }
}

impl Container {
    /// Call a callable, resolving its parameters
    #[instrument(level = "debug", skip_all, fields(container = %self.id()))]
    pub fn call(&self, callable: impl Into<Callable>, arguments: Arguments) -> Result<Value> {
        let _exclusive = self.exclusive();
        match callable.into() {
            Callable::Closure(function) => self.call_function(&function, &arguments),
            Callable::Named(name) => {
                let function = self
                    .catalog()
                    .function(&name)
                    .ok_or_else(|| self.error(ErrorKind::NotCallable))?;
                self.call_function(&function, &arguments)
            }
            Callable::Method(receiver, name) => {
                let method = self
                    .catalog()
                    .class(receiver.class())
                    .and_then(|class| class.method_named(&name).cloned())
                    .ok_or_else(|| self.error(ErrorKind::MethodNotFound(name)))?;
                let resolved = self.resolve(method.params(), &arguments)?;
                method
                    .invoke(&receiver, resolved)
                    .map_err(|e| e.within(self.id()))
            }
            Callable::Invokable(receiver) => {
                let method = self
                    .catalog()
                    .class(receiver.class())
                    .and_then(|class| class.invoke_method().cloned())
                    .ok_or_else(|| self.error(ErrorKind::NotCallable))?;
                let resolved = self.resolve(method.params(), &arguments)?;
                method
                    .invoke(&receiver, resolved)
                    .map_err(|e| e.within(self.id()))
            }
        }
    }

    fn call_function(&self, function: &Function, arguments: &Arguments) -> Result<Value> {
        let resolved = self.resolve(function.params(), arguments)?;
        function.invoke(resolved).map_err(|e| e.within(self.id()))
    }
}
