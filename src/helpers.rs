use std::marker::PhantomData;

use crate::inject::Container;
use crate::provider::Provider;

type Hook = Box<dyn Fn(&Container) + Send + Sync>;

/// Generic provider supplying a fixed list of service names.
///
/// The container boots and registers providers at most once per provider type.
/// Use a distinct `Tag` type (see [ListProvider::tagged]) for each list provider
/// which should be registered independently.
pub struct ListProvider<Tag = ()> {
    names: Vec<String>,
    register: Hook,
    boot: Option<Hook>,
    _tag: PhantomData<fn() -> Tag>,
}

impl ListProvider {
    pub fn new<I, S, F>(names: I, register: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Container) + Send + Sync + 'static,
    {
        ListProvider::tagged(names, register)
    }
}

impl<Tag> ListProvider<Tag> {
    pub fn tagged<I, S, F>(names: I, register: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Container) + Send + Sync + 'static,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            register: Box::new(register),
            boot: None,
            _tag: PhantomData,
        }
    }

    /// Run a one-time setup before the first registration
    pub fn on_boot<F>(mut self, boot: F) -> Self
    where
        F: Fn(&Container) + Send + Sync + 'static,
    {
        self.boot = Some(Box::new(boot));
        self
    }
}

impl<Tag> Provider for ListProvider<Tag> {
    fn provides(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    fn register(&self, container: &Container) {
        (self.register)(container)
    }

    fn boot(&self, container: &Container) {
        if let Some(boot) = &self.boot {
            boot(container)
        }
    }
}

/// Build an [Arguments](crate::Arguments) map from `name => value` pairs
#[macro_export]
macro_rules! arguments {
    () => {
        $crate::Arguments::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {
        $crate::Arguments::new()$(.with($name, $value))+
    };
}
