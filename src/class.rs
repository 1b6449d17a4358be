//! Type metadata standing in for runtime reflection.
//!
//! A [Catalog] lists the classes, interfaces and named functions known to a container.
//! Each [Class] declares the [Parameter]s of its constructor, the constructor itself and
//! the methods which can be used as decorators or callables.
//!
//! Constructors, methods and functions are plain Rust closures. The [Handler] and
//! [MethodHandler] traits adapt them to the dynamic argument lists produced by the
//! container: they are implemented for all closures with up to 10 arguments whose
//! parameter types implement [FromValue].

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::resolve::{ErrorKind, Parameter, Result};
use crate::value::{FromValue, Instance, IntoValue, Value};

/// Invoke a closure with a list of resolved arguments
pub trait Handler<Args, Ret>: Send + Sync + 'static {
    fn call(&self, args: Vec<Value>) -> Result<Ret>;
}

/// Invoke a closure on a receiver with a list of resolved arguments
pub trait MethodHandler<Recv, Args, Ret>: Send + Sync + 'static {
    fn call(&self, receiver: &Recv, args: Vec<Value>) -> Result<Ret>;
}

fn expect_arity(args: Vec<Value>, expected: usize) -> Result<std::vec::IntoIter<Value>> {
    if args.len() != expected {
        return Err(ErrorKind::Arity {
            expected,
            found: args.len(),
        }
        .into());
    }
    Ok(args.into_iter())
}

/*
 * Implement the handler traits for functions with up to 10 parameters
 * inspired by https://nickbryan.co.uk/software/using-a-type-map-for-dependency-injection-in-rust/
 */
macro_rules! callable_tuple ({ $($param:ident)* } => {
    impl<Func, Ret, $($param,)*> Handler<($($param,)*), Ret> for Func
    where
        Func: Fn($($param),*) -> Ret + Send + Sync + 'static,
        $($param: FromValue,)*
    {
        #[inline]
        #[allow(non_snake_case, unused_mut, unused_variables)]
        fn call(&self, args: Vec<Value>) -> Result<Ret> {
            let mut args = expect_arity(args, <[&str]>::len(&[$(stringify!($param)),*]))?;
            $(let $param = <$param as FromValue>::from_value(args.next().unwrap_or_default())?;)*
            Ok((self)($($param,)*))
        }
    }

    impl<Func, Recv, Ret, $($param,)*> MethodHandler<Recv, ($($param,)*), Ret> for Func
    where
        Func: Fn(&Recv, $($param),*) -> Ret + Send + Sync + 'static,
        $($param: FromValue,)*
    {
        #[inline]
        #[allow(non_snake_case, unused_mut, unused_variables)]
        fn call(&self, receiver: &Recv, args: Vec<Value>) -> Result<Ret> {
            let mut args = expect_arity(args, <[&str]>::len(&[$(stringify!($param)),*]))?;
            $(let $param = <$param as FromValue>::from_value(args.next().unwrap_or_default())?;)*
            Ok((self)(receiver, $($param,)*))
        }
    }
});

callable_tuple! {}
callable_tuple! { A }
callable_tuple! { A B }
callable_tuple! { A B C }
callable_tuple! { A B C D }
callable_tuple! { A B C D E }
callable_tuple! { A B C D E F }
callable_tuple! { A B C D E F G }
callable_tuple! { A B C D E F G H }
callable_tuple! { A B C D E F G H I }
callable_tuple! { A B C D E F G H I J }

type ConstructorFn = Arc<dyn Fn(Vec<Value>) -> Result<Instance> + Send + Sync>;
type MethodFn = Arc<dyn Fn(&Instance, Vec<Value>) -> Result<Value> + Send + Sync>;
type FunctionFn = Arc<dyn Fn(Vec<Value>) -> Result<Value> + Send + Sync>;

/// A method callable on instances of a class
#[derive(Clone)]
pub struct Method {
    params: Vec<Parameter>,
    body: MethodFn,
}

impl Method {
    /// Wrap a typed closure taking the receiver as first argument
    pub fn new<T, Args, Ret, F>(params: impl IntoIterator<Item = Parameter>, handler: F) -> Self
    where
        T: Any,
        Ret: IntoValue,
        F: MethodHandler<T, Args, Ret>,
    {
        let body = move |instance: &Instance, args: Vec<Value>| {
            let receiver = instance.downcast_ref::<T>().ok_or_else(|| ErrorKind::TypeMismatch {
                name: instance.class().to_string(),
                expected: std::any::type_name::<T>(),
            })?;
            handler.call(receiver, args)?.into_value()
        };
        Self {
            params: params.into_iter().collect(),
            body: Arc::new(body),
        }
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub(crate) fn invoke(&self, receiver: &Instance, args: Vec<Value>) -> Result<Value> {
        (self.body)(receiver, args)
    }
}

/// A free function or closure which can be called through the container
#[derive(Clone)]
pub struct Function {
    name: String,
    params: Vec<Parameter>,
    body: FunctionFn,
}

impl Function {
    pub fn new<Args, Ret, F>(
        name: impl Into<String>,
        params: impl IntoIterator<Item = Parameter>,
        handler: F,
    ) -> Self
    where
        Ret: IntoValue,
        F: Handler<Args, Ret>,
    {
        Self {
            name: name.into(),
            params: params.into_iter().collect(),
            body: Arc::new(move |args| handler.call(args)?.into_value()),
        }
    }

    /// Anonymous function, for use with [crate::Container::call]
    pub fn closure<Args, Ret, F>(params: impl IntoIterator<Item = Parameter>, handler: F) -> Self
    where
        Ret: IntoValue,
        F: Handler<Args, Ret>,
    {
        Self::new("{closure}", params, handler)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub(crate) fn invoke(&self, args: Vec<Value>) -> Result<Value> {
        (self.body)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// Description of a constructible type
#[derive(Clone)]
pub struct Class {
    name: String,
    params: Vec<Parameter>,
    constructor: ConstructorFn,
    methods: HashMap<String, Method>,
    invoke: Option<Method>,
}

impl Class {
    /// Declare a class with an infallible constructor.
    ///
    /// The constructor parameters are declared separately using [Class::param],
    /// in the same order as the closure arguments.
    pub fn new<T, Args, F>(name: impl Into<String>, constructor: F) -> Self
    where
        T: Any + Send + Sync,
        F: Handler<Args, T>,
    {
        let name: String = name.into();
        let class: Arc<str> = Arc::from(name.as_str());
        Self::with_constructor(
            name,
            Arc::new(move |args: Vec<Value>| -> Result<Instance> {
                Ok(Instance::new(class.clone(), constructor.call(args)?))
            }),
        )
    }

    /// Declare a class whose constructor may fail
    pub fn try_new<T, Args, F>(name: impl Into<String>, constructor: F) -> Self
    where
        T: Any + Send + Sync,
        F: Handler<Args, Result<T>>,
    {
        let name: String = name.into();
        let class: Arc<str> = Arc::from(name.as_str());
        Self::with_constructor(
            name,
            Arc::new(move |args: Vec<Value>| -> Result<Instance> {
                Ok(Instance::new(class.clone(), constructor.call(args)??))
            }),
        )
    }

    fn with_constructor(name: String, constructor: ConstructorFn) -> Self {
        Self {
            name,
            params: Vec::new(),
            constructor,
            methods: HashMap::new(),
            invoke: None,
        }
    }

    /// Append a constructor parameter
    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    /// Declare a method usable as decorator or callable
    pub fn method<T, Args, Ret, F>(
        mut self,
        name: impl Into<String>,
        params: impl IntoIterator<Item = Parameter>,
        handler: F,
    ) -> Self
    where
        T: Any,
        Ret: IntoValue,
        F: MethodHandler<T, Args, Ret>,
    {
        self.methods.insert(name.into(), Method::new(params, handler));
        self
    }

    /// Make instances of this class directly callable
    pub fn invokable<T, Args, Ret, F>(
        mut self,
        params: impl IntoIterator<Item = Parameter>,
        handler: F,
    ) -> Self
    where
        T: Any,
        Ret: IntoValue,
        F: MethodHandler<T, Args, Ret>,
    {
        self.invoke = Some(Method::new(params, handler));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn method_named(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    pub fn invoke_method(&self) -> Option<&Method> {
        self.invoke.as_ref()
    }

    pub(crate) fn construct(&self, args: Vec<Value>) -> Result<Instance> {
        (self.constructor)(args)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&String> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("methods", &methods)
            .field("invokable", &self.invoke.is_some())
            .finish()
    }
}

/// Classes, interfaces and functions known to a container
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    classes: HashMap<String, Arc<Class>>,
    interfaces: HashSet<String>,
    functions: HashMap<String, Arc<Function>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, class: Class) -> Self {
        self.classes.insert(class.name.clone(), Arc::new(class));
        self
    }

    /// Declare an abstract type name, which can only be bound to an implementation
    pub fn with_interface(mut self, name: impl Into<String>) -> Self {
        self.interfaces.insert(name.into());
        self
    }

    pub fn with_function(mut self, function: Function) -> Self {
        self.functions
            .insert(function.name.clone(), Arc::new(function));
        self
    }

    pub fn class(&self, name: &str) -> Option<Arc<Class>> {
        self.classes.get(name).cloned()
    }

    pub fn is_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn is_interface(&self, name: &str) -> bool {
        self.interfaces.contains(name)
    }

    pub fn function(&self, name: &str) -> Option<Arc<Function>> {
        self.functions.get(name).cloned()
    }
}
