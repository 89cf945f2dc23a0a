//! Process-wide services, installed once at startup.

use std::sync::OnceLock;

use crate::service::Services;

static SERVICES: OnceLock<Services> = OnceLock::new();

/// Errors raised when the process-wide services are misused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// [`install`] was never called.
    #[error("services are not initialised; install them at startup")]
    NotInitialized,
    /// [`install`] was called more than once.
    #[error("services are already initialised")]
    AlreadyInitialized,
}

/// Installs the services for the rest of the process.
///
/// # Errors
///
/// Returns [`RuntimeError::AlreadyInitialized`] if services were installed
/// before; the earlier ones stay in place.
pub fn install(services: Services) -> Result<&'static Services, RuntimeError> {
    let mut fresh = false;
    let installed = SERVICES.get_or_init(|| {
        fresh = true;
        services
    });
    if fresh {
        Ok(installed)
    } else {
        Err(RuntimeError::AlreadyInitialized)
    }
}

/// The installed services.
///
/// # Errors
///
/// Returns [`RuntimeError::NotInitialized`] if [`install`] was never called.
pub fn services() -> Result<&'static Services, RuntimeError> {
    SERVICES.get().ok_or(RuntimeError::NotInitialized)
}
