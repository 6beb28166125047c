//! Build services and their lifecycle.
//!
//! A service is a named object that lives for one build tree. Components
//! talk to services while the entry document renders (registering images,
//! for example), and the service applies the collected side effects once
//! rendering has completed:
//!
//! 1. `before_build` hooks run after strings and entry are loaded;
//! 2. the document renders; components call into services;
//! 3. `after_build` hooks run and finalize what was registered.
//!
//! Hooks of one phase run sequentially in registration order. The first
//! failure aborts the remaining hooks of that phase and is returned tagged
//! with the failing service's name; completed hooks are not rolled back.
//! Per-resource finalize failures are not hook failures: the service logs
//! them, keeps finalizing, and exposes them through
//! [`Service::resource_failures`].
//!
//! # Ownership
//!
//! A [`ServiceSet`] is either [`ServiceSet::Owned`] by the build that
//! created it, or [`ServiceSet::Borrowed`] from an ancestor build. Only an
//! owning build runs the hooks, so a service tree shared by several builds
//! goes through its lifecycle exactly once.

pub mod images;

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::config::BuildConfiguration;
use crate::core::{BuildError, ResourceFailure};

pub use images::{IMAGE_SERVICE, ImageService, ImageServiceFactory};

/// Future returned by service hooks
pub type HookFuture<'a> = BoxFuture<'a, Result<(), BuildError>>;

/// A named participant in the build lifecycle
pub trait Service: Send + Sync + 'static {
    /// Name the service is looked up by
    fn name(&self) -> &str;

    /// Setup before rendering
    fn before_build(&self) -> HookFuture<'_>;

    /// Finalization after rendering
    fn after_build(&self) -> HookFuture<'_>;

    /// Value exposed to templates under `services.<name>`
    fn describe(&self) -> Value {
        Value::Null
    }

    /// Resources the last `after_build` could not finalize
    fn resource_failures(&self) -> Vec<ResourceFailure> {
        Vec::new()
    }

    /// Access to the concrete type, for components that need it
    fn as_any(&self) -> &dyn Any;

    /// An error tagged with this service's name
    fn error(&self, message: String) -> BuildError {
        BuildError::Service {
            service: self.name().to_string(),
            message,
            hint: None,
        }
    }
}

/// Creates one service instance per build
pub trait ServiceFactory: Send + Sync {
    /// Name of the services this factory creates
    fn name(&self) -> &str;

    fn create(&self, config: &BuildConfiguration) -> Result<Arc<dyn Service>, BuildError>;
}

/// Services of one build tree, in registration order
#[derive(Clone, Default)]
pub struct ServiceMap {
    services: Arc<Vec<Arc<dyn Service>>>,
}

impl ServiceMap {
    pub fn new(services: Vec<Arc<dyn Service>>) -> Self {
        Self {
            services: Arc::new(services),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Service>> {
        self.services.iter().find(|service| service.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Service>> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Services of a build together with who owns their lifecycle
#[derive(Clone)]
pub enum ServiceSet {
    /// Created by this build; it runs the hooks
    Owned(ServiceMap),
    /// Supplied by an ancestor build, which runs the hooks
    Borrowed(ServiceMap),
}

impl Default for ServiceSet {
    fn default() -> Self {
        ServiceSet::Owned(ServiceMap::default())
    }
}

impl ServiceSet {
    pub fn map(&self) -> &ServiceMap {
        match self {
            ServiceSet::Owned(map) | ServiceSet::Borrowed(map) => map,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, ServiceSet::Owned(_))
    }

    /// The same services, borrowed
    #[must_use]
    pub fn lend(&self) -> ServiceSet {
        ServiceSet::Borrowed(self.map().clone())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Service>> {
        self.map().get(name)
    }

    /// Service `name`, if it is of type `T`
    pub fn get_as<T: Service>(&self, name: &str) -> Option<&T> {
        self.get(name).and_then(|service| service.as_any().downcast_ref::<T>())
    }

    /// Finalize failures of every service in the set
    pub fn resource_failures(&self) -> Vec<ResourceFailure> {
        self.map().iter().flat_map(|service| service.resource_failures()).collect()
    }

    /// Every service's description, by name
    pub fn describe(&self) -> Value {
        let described: Map<String, Value> = self
            .map()
            .iter()
            .map(|service| (service.name().to_string(), service.describe()))
            .collect();
        Value::Object(described)
    }
}

impl fmt::Debug for ServiceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.map().iter().map(|service| service.name()).collect();
        match self {
            ServiceSet::Owned(_) => f.debug_tuple("Owned").field(&names).finish(),
            ServiceSet::Borrowed(_) => f.debug_tuple("Borrowed").field(&names).finish(),
        }
    }
}

/// Service factories used to equip builds, in registration order
#[derive(Clone)]
pub struct ServiceRegistry {
    factories: Vec<Arc<dyn ServiceFactory>>,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ServiceRegistry {
    /// A registry without factories
    pub fn empty() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// A registry with the built-in `images` service
    pub fn with_defaults() -> Self {
        Self {
            factories: vec![Arc::new(ImageServiceFactory)],
        }
    }

    /// Add a factory; names must be unique
    pub fn register(&mut self, factory: Arc<dyn ServiceFactory>) -> Result<(), BuildError> {
        if self.factories.iter().any(|existing| existing.name() == factory.name()) {
            return Err(BuildError::Service {
                service: factory.name().to_string(),
                message: "a service with this name is already registered".to_string(),
                hint: None,
            });
        }
        self.factories.push(factory);
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.iter().map(|factory| factory.name())
    }

    /// Create a fresh, owned instance of every service
    pub fn create_services(&self, config: &BuildConfiguration) -> Result<ServiceSet, BuildError> {
        let services = self
            .factories
            .iter()
            .map(|factory| factory.create(config))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(count = services.len(), "created build services");
        Ok(ServiceSet::Owned(ServiceMap::new(services)))
    }

    /// Run every `before_build` hook of an owned set
    pub async fn run_before_hooks(&self, services: &ServiceSet) -> Result<(), BuildError> {
        run_hooks(services, Phase::Before).await
    }

    /// Run every `after_build` hook of an owned set
    pub async fn run_after_hooks(&self, services: &ServiceSet) -> Result<(), BuildError> {
        run_hooks(services, Phase::After).await
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Before,
    After,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Before => f.write_str("before_build"),
            Phase::After => f.write_str("after_build"),
        }
    }
}

async fn run_hooks(services: &ServiceSet, phase: Phase) -> Result<(), BuildError> {
    let ServiceSet::Owned(map) = services else {
        tracing::debug!(%phase, "services are borrowed, skipping hooks");
        return Ok(());
    };

    for service in map.iter() {
        tracing::debug!(service = service.name(), %phase, "running service hook");
        let result = match phase {
            Phase::Before => service.before_build().await,
            Phase::After => service.after_build().await,
        };

        if let Err(error) = result {
            tracing::debug!(service = service.name(), %phase, "service hook failed, skipping the rest");
            return Err(match error {
                BuildError::Service {
                    ..
                } => error,
                other => service.error(other.to_string()),
            });
        }
    }
    Ok(())
}
