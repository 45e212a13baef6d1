//! Error types for OS service-registry operations.
//!
//! Registry failures are surfaced verbatim to the administrative caller;
//! nothing here is retried internally.

use std::fmt;

/// Failure of a round-trip to the OS service registry.
#[derive(Debug)]
pub enum RegistryError {
    /// The service registry itself could not be reached.
    Unavailable { reason: String },

    /// The named service is not registered.
    ServiceNotFound { name: String },

    /// Install target is already registered; the existing registration
    /// was left untouched.
    AlreadyRegistered { name: String },

    /// Any other failed registry operation, with the underlying OS error.
    OperationFailed {
        name: String,
        operation: String,
        reason: String,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Unavailable { reason } => {
                write!(f, "cannot connect to the service registry: {}", reason)
            }
            RegistryError::ServiceNotFound { name } => {
                write!(f, "cannot open service {}", name)
            }
            RegistryError::AlreadyRegistered { name } => {
                write!(f, "service {} already exists", name)
            }
            RegistryError::OperationFailed {
                name,
                operation,
                reason,
            } => {
                write!(f, "{} failed for service '{}': {}", operation, name, reason)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
