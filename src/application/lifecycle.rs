//! Service startup helpers.

use std::future::Future;
use std::time::Instant;

use tracing::{error, info};

use super::error::AppError;

/// Await `init`, logging the outcome under `name`. Failures are logged and
/// returned to the caller unchanged.
pub async fn safely_initialize<T, E, F>(name: &'static str, init: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let started = Instant::now();
    match init.await {
        Ok(service) => {
            info!(
                target = "tenancy::lifecycle",
                service = name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "service initialized"
            );
            Ok(service)
        }
        Err(err) => {
            error!(
                target = "tenancy::lifecycle",
                service = name,
                error = %err,
                "service initialization failed"
            );
            Err(err)
        }
    }
}

/// Unwrap a lazily initialized service or report it as unavailable.
pub fn ensure_initialized<T>(service: Option<T>, name: &'static str) -> Result<T, AppError> {
    service.ok_or(AppError::NotInitialized { service: name })
}
