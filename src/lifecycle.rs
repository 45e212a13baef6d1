//! Administrative service lifecycle operations.
//!
//! Install, remove, start, stop, and status all run synchronously on the
//! calling task as blocking round-trips to the OS service registry.
//! Nothing here retries: a failed registry operation is surfaced verbatim
//! and retrying is the caller's decision.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::constants::lifecycle::STOP_POLL_INTERVAL;
use crate::constants::SERVICE_RUN_ARG;
use crate::errors::RegistryError;
use crate::registry::{RecoveryPlan, ServiceDefinition, ServiceRegistry, ServiceState};

/// Immutable descriptor handed to lifecycle operations.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    pub description: String,
    pub restart_on_failure: bool,
    pub restart_delay_secs: u64,
    pub max_restart_attempts: u32,
}

pub struct ServiceLifecycle<R: ServiceRegistry> {
    registry: R,
}

impl<R: ServiceRegistry> ServiceLifecycle<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Registers the current executable as an auto-started service.
    ///
    /// Fails with `AlreadyRegistered` when the name is taken, leaving the
    /// existing registration untouched. Recovery-plan application is
    /// best-effort; event-source registration is not — on its failure the
    /// half-made registration is rolled back so installation stays
    /// all-or-nothing for the caller.
    pub async fn install(&self, descriptor: &ServiceDescriptor) -> Result<(), RegistryError> {
        if descriptor.name.is_empty() {
            return Err(RegistryError::OperationFailed {
                name: String::new(),
                operation: "install".to_string(),
                reason: "service name is empty".to_string(),
            });
        }

        let exe_path =
            std::env::current_exe().map_err(|e| RegistryError::OperationFailed {
                name: descriptor.name.clone(),
                operation: "install".to_string(),
                reason: format!("cannot resolve executable path: {}", e),
            })?;

        if self.registry.service_exists(&descriptor.name).await? {
            return Err(RegistryError::AlreadyRegistered {
                name: descriptor.name.clone(),
            });
        }

        let definition = ServiceDefinition {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            exe_path,
            launch_args: vec![SERVICE_RUN_ARG.to_string()],
            auto_start: true,
        };
        self.registry.create_service(&definition).await?;

        if descriptor.restart_on_failure {
            let plan = RecoveryPlan::escalating(Duration::from_secs(descriptor.restart_delay_secs));
            // Some OS versions reject recovery actions; not fatal.
            if let Err(e) = self.registry.apply_recovery_plan(&descriptor.name, &plan).await {
                warn!(
                    "restart policy for '{}' could not be applied (ignored): {}",
                    descriptor.name, e
                );
            }
        }

        if let Err(e) = self.registry.register_event_source(&descriptor.name).await {
            if let Err(rollback) = self.registry.delete_service(&descriptor.name).await {
                warn!(
                    "rollback of service '{}' after event-source failure also failed: {}",
                    descriptor.name, rollback
                );
            }
            return Err(e);
        }

        info!("service '{}' installed", descriptor.name);
        Ok(())
    }

    /// Deletes the registration and its event-log source.
    ///
    /// Stopping the live service first is best-effort; deleting the
    /// registration and removing the event source are not.
    pub async fn remove(&self, name: &str) -> Result<(), RegistryError> {
        match self.registry.control_stop(name).await {
            Ok(mut status) => {
                while status.state != ServiceState::Stopped {
                    sleep(STOP_POLL_INTERVAL).await;
                    match self.registry.query_status(name).await {
                        Ok(next) => status = next,
                        Err(e) => {
                            warn!("status query while removing '{}' failed: {}", name, e);
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                warn!("stopping service '{}' before removal failed (ignored): {}", name, e);
            }
        }

        self.registry.delete_service(name).await?;
        self.registry.remove_event_source(name).await?;
        info!("service '{}' removed", name);
        Ok(())
    }

    pub async fn start(&self, name: &str) -> Result<(), RegistryError> {
        self.registry.start_service(name).await?;
        info!("service '{}' started", name);
        Ok(())
    }

    /// Issues the stop control and polls every 500 ms until the OS reports
    /// the stopped state. A failed status query is fatal; there is no
    /// iteration bound.
    pub async fn stop(&self, name: &str) -> Result<(), RegistryError> {
        let mut status = self.registry.control_stop(name).await?;
        while status.state != ServiceState::Stopped {
            sleep(STOP_POLL_INTERVAL).await;
            status = self.registry.query_status(name).await?;
        }
        info!("service '{}' reached the stopped state", name);
        Ok(())
    }

    /// Human-readable rendering of the service's current state.
    pub async fn status(&self, name: &str) -> Result<String, RegistryError> {
        let snapshot = self.registry.query_status(name).await?;
        Ok(snapshot.state.to_string())
    }
}
