//! Deferred bundles of service registrations
//!
//! A [Provider] is added to a container with [Container::provider], and stays dormant until
//! one of the names it [provides](Provider::provides) is requested. The container then
//! boots it (once per provider type) and asks it to [register](Provider::register) its
//! services, which it does by calling [Container::add].

use crate::inject::Container;

/// Lazily registered group of services
pub trait Provider: Send + Sync {
    /// One-time setup, called when the provider is added to a container
    fn bootstrap(&self, _container: &Container) {}

    /// Check if this provider can supply the given service name
    fn provides(&self, name: &str) -> bool;

    /// Add the provided services to the container
    fn register(&self, container: &Container);

    /// One-time setup, called before the first registration of this provider type
    fn boot(&self, _container: &Container) {}
}
