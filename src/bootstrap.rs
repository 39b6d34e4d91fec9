//! Service wiring shared by the binary and integration tests.

use std::sync::Arc;

use crate::application::auth::JwtAuthenticator;
use crate::application::error::AppError;
use crate::application::healthcheck::{HealthProbe, HealthcheckService};
use crate::application::registry::{
    DATABASE_SERVICE, HEALTHCHECK_SERVICE, QUERY_CACHE_SERVICE, RegistryError, ServiceLifetime,
    ServiceRegistry, USER_SERVICE,
};
use crate::application::users::{UserService, UsersRepo};
use crate::cache::{CacheConfig, QueryCache};
use crate::config::Settings;
use crate::infra::error::InfraError;
use crate::infra::http::HttpState;

/// Register the storage backend and every service built on top of it.
pub fn register_services<R>(
    registry: &ServiceRegistry,
    settings: &Settings,
    store: Arc<R>,
) -> Result<(), RegistryError>
where
    R: UsersRepo + HealthProbe + 'static,
{
    let cache_config = CacheConfig::from(&settings.cache);

    registry.register_instance(DATABASE_SERVICE, store)?;

    let config = cache_config.clone();
    registry.register_service(
        QUERY_CACHE_SERVICE,
        move |_| Ok(Arc::new(QueryCache::new(&config))),
        ServiceLifetime::Singleton,
    )?;

    registry.register_service(
        HEALTHCHECK_SERVICE,
        |registry| {
            let store = registry.resolve::<R>(DATABASE_SERVICE)?;
            let probe: Arc<dyn HealthProbe> = store;
            Ok(Arc::new(HealthcheckService::new(vec![probe])))
        },
        ServiceLifetime::Singleton,
    )?;

    registry.register_service(
        USER_SERVICE,
        move |registry| {
            let store = registry.resolve::<R>(DATABASE_SERVICE)?;
            let cache = registry.resolve::<QueryCache>(QUERY_CACHE_SERVICE)?;
            let repo: Arc<dyn UsersRepo> = store;
            Ok(Arc::new(UserService::new(
                repo,
                Some(cache),
                cache_config.clone(),
            )))
        },
        ServiceLifetime::Singleton,
    )?;

    Ok(())
}

/// Assemble router state from a populated registry.
pub fn http_state(registry: &ServiceRegistry, settings: &Settings) -> Result<HttpState, AppError> {
    let secret = settings
        .auth
        .jwt_secret
        .as_deref()
        .ok_or_else(|| InfraError::configuration("auth.jwt_secret is not configured"))?;

    Ok(HttpState {
        auth: Arc::new(JwtAuthenticator::new(secret)),
        allowed_roles: settings.auth.allowed_health_roles.clone().into(),
        healthcheck: registry.resolve::<HealthcheckService>(HEALTHCHECK_SERVICE)?,
        users: Some(registry.resolve::<UserService>(USER_SERVICE)?),
    })
}
