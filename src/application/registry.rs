//! Named service registration and lookup.
//!
//! Services are registered under a [`ServiceId`] with a factory and an
//! explicit [`ServiceLifetime`]. Singletons are built on first resolution and
//! shared afterwards; transient services are rebuilt on every resolution.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceId(&'static str);

impl ServiceId {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(self) -> &'static str {
        self.0
    }
}

impl Display for ServiceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

pub const DATABASE_SERVICE: ServiceId = ServiceId::new("database");
pub const QUERY_CACHE_SERVICE: ServiceId = ServiceId::new("query_cache");
pub const HEALTHCHECK_SERVICE: ServiceId = ServiceId::new("healthcheck");
pub const USER_SERVICE: ServiceId = ServiceId::new("users");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceLifetime {
    Singleton,
    Transient,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("service `{id}` is not registered")]
    NotRegistered { id: ServiceId },
    #[error("service `{id}` is already registered")]
    AlreadyRegistered { id: ServiceId },
    #[error("service `{id}` was registered as a different type than `{requested}`")]
    TypeMismatch {
        id: ServiceId,
        requested: &'static str,
    },
    #[error("service `{id}` could not be built: {message}")]
    Factory { id: ServiceId, message: String },
}

impl RegistryError {
    pub fn factory(id: ServiceId, err: impl Display) -> Self {
        Self::Factory {
            id,
            message: err.to_string(),
        }
    }
}

type Instance = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&ServiceRegistry) -> Result<Instance, RegistryError> + Send + Sync>;

struct Descriptor {
    type_id: TypeId,
    lifetime: ServiceLifetime,
    factory: Factory,
    instance: Option<Instance>,
}

#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<ServiceId, Descriptor>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `id`. `T` may be a trait object, in which
    /// case callers resolve it with the same `dyn` type.
    pub fn register_service<T, F>(
        &self,
        id: ServiceId,
        factory: F,
        lifetime: ServiceLifetime,
    ) -> Result<(), RegistryError>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceRegistry) -> Result<Arc<T>, RegistryError> + Send + Sync + 'static,
    {
        let mut services = self.services.write().unwrap_or_else(PoisonError::into_inner);
        if services.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered { id });
        }

        let factory: Factory = Arc::new(move |registry: &ServiceRegistry| {
            let service = factory(registry)?;
            Ok(Arc::new(service) as Instance)
        });
        services.insert(
            id,
            Descriptor {
                type_id: TypeId::of::<Arc<T>>(),
                lifetime,
                factory,
                instance: None,
            },
        );

        debug!(
            target = "tenancy::registry",
            service = id.as_str(),
            ty = type_name::<T>(),
            lifetime = ?lifetime,
            "service registered"
        );
        Ok(())
    }

    /// Register an already built singleton.
    pub fn register_instance<T>(&self, id: ServiceId, service: Arc<T>) -> Result<(), RegistryError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register_service(
            id,
            move |_| Ok(Arc::clone(&service)),
            ServiceLifetime::Singleton,
        )
    }

    pub fn resolve<T>(&self, id: ServiceId) -> Result<Arc<T>, RegistryError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let (factory, lifetime) = {
            let services = self.services.read().unwrap_or_else(PoisonError::into_inner);
            let descriptor = services
                .get(&id)
                .ok_or(RegistryError::NotRegistered { id })?;
            if descriptor.type_id != TypeId::of::<Arc<T>>() {
                return Err(RegistryError::TypeMismatch {
                    id,
                    requested: type_name::<T>(),
                });
            }
            if let Some(instance) = &descriptor.instance {
                return downcast::<T>(id, instance);
            }
            (Arc::clone(&descriptor.factory), descriptor.lifetime)
        };

        // The factory may resolve its own dependencies, so no lock is held here.
        let built = factory(self)?;

        if lifetime == ServiceLifetime::Singleton {
            let mut services = self.services.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(descriptor) = services.get_mut(&id) {
                let shared = descriptor.instance.get_or_insert(built);
                return downcast::<T>(id, shared);
            }
        }
        downcast::<T>(id, &built)
    }

    pub fn is_registered(&self, id: ServiceId) -> bool {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }
}

fn downcast<T>(id: ServiceId, instance: &Instance) -> Result<Arc<T>, RegistryError>
where
    T: ?Sized + Send + Sync + 'static,
{
    instance
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or(RegistryError::TypeMismatch {
            id,
            requested: type_name::<T>(),
        })
}
