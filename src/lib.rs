//! Name-keyed dependency injection container with auto-wiring and lazy service providers.
//!
//! # Simple use case
//!
//! ```
//! # use std::sync::Arc;
//! # use kura::*;
//! // Define regular structs
//! struct Greeter;
//!
//! impl Greeter {
//!     fn greet(&self, name: &str) -> String {
//!         format!("Hello {name}")
//!     }
//! }
//!
//! struct Welcome {
//!     greeter: Arc<Greeter>,
//!     guest: String,
//! }
//!
//! # fn main() -> Result<()> {
//! // Describe how to construct them
//! let catalog = Catalog::new()
//!     .with_class(Class::new("Greeter", || Greeter))
//!     .with_class(
//!         Class::new("Welcome", |greeter: Arc<Greeter>, guest: String| Welcome { greeter, guest })
//!             .param(Parameter::class("greeter", "Greeter"))
//!             .param(Parameter::builtin("guest").with_default("world")),
//!     );
//!
//! // Register services and resolve them
//! let container = Container::new(catalog);
//! container.add("Greeter", true, Binding::Empty);
//! container.add("Welcome", false, Binding::Empty).with_argument("guest", "Ada");
//!
//! let welcome: Arc<Welcome> = container.get_as("Welcome")?;
//! assert_eq!(welcome.greeter.greet(&welcome.guest), "Hello Ada");
//! # Ok(())
//! # }
//! ```
//!
//! # Mechanism
//!
//! Rust has no runtime reflection, so the types which can be constructed by the container
//! are described in a [Catalog]:
//!
//! * A [Class] associates a name with a constructor closure and the [Parameter]s it expects.
//!   Methods can be declared to be applied as decorators after construction, or called
//!   through [Container::call].
//! * Interfaces are plain names, which services bind to an implementation by name.
//! * A [Function] is a callable with declared parameters.
//!
//! The [Container] maps names to [Service] records. Each record holds a [Binding]
//! (nothing, a concrete object, a factory or an implementation name), bound constructor
//! arguments and decorator calls. When a service is requested:
//!
//! * Missing names are looked up in the [Provider]s, which are booted and registered lazily.
//! * Class-typed parameters are resolved recursively through the container ("auto-wiring"),
//!   other parameters come from bound arguments or declared defaults.
//! * Circular references are detected instead of overflowing the stack.
//! * Shared services are built once, then cached.

mod call;
mod class;
mod helpers;
mod inject;
mod provider;
mod resolve;
mod service;
mod value;

pub use call::Callable;
pub use class::{Catalog, Class, Function, Handler, Method, MethodHandler};
pub use helpers::ListProvider;
pub use inject::Container;
pub use provider::Provider;
pub use resolve::{
    Arguments, ContainerError, ContainerId, ErrorKind, ParamType, Parameter, Result,
};
pub use service::{Binding, Factory, Service};
pub use value::{FromValue, Instance, IntoValue, Value};

#[cfg(test)]
mod tests;
