//! systemd-backed implementation of the service registry.
//!
//! Registrations are plain unit files under the systemd unit directory;
//! every control and query goes through `systemctl`. The stop control is
//! issued with `--no-block` so that stop-state convergence stays with the
//! lifecycle manager's own polling.

use std::path::PathBuf;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info};

use super::{
    AcceptedControls, RecoveryPlan, ServiceDefinition, ServiceRegistry, ServiceState,
    StatusSnapshot,
};
use crate::errors::RegistryError;

const UNIT_DIR: &str = "/etc/systemd/system";

pub struct SystemdRegistry {
    unit_dir: PathBuf,
}

impl Default for SystemdRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemdRegistry {
    pub fn new() -> Self {
        Self {
            unit_dir: PathBuf::from(UNIT_DIR),
        }
    }

    /// Alternate unit directory, for tests and sandboxed setups.
    pub fn with_unit_dir(unit_dir: PathBuf) -> Self {
        Self { unit_dir }
    }

    fn unit_name(name: &str) -> String {
        format!("{}.service", name)
    }

    fn unit_path(&self, name: &str) -> PathBuf {
        self.unit_dir.join(Self::unit_name(name))
    }

    fn dropin_dir(&self, name: &str) -> PathBuf {
        self.unit_dir.join(format!("{}.service.d", name))
    }

    async fn systemctl(args: &[&str]) -> Result<Output, RegistryError> {
        Command::new("systemctl")
            .args(args)
            .output()
            .await
            .map_err(|e| RegistryError::Unavailable {
                reason: format!("cannot invoke systemctl: {}", e),
            })
    }

    async fn systemctl_ok(
        name: &str,
        operation: &str,
        args: &[&str],
    ) -> Result<(), RegistryError> {
        let output = Self::systemctl(args).await?;
        if !output.status.success() {
            return Err(RegistryError::OperationFailed {
                name: name.to_string(),
                operation: operation.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    async fn ensure_exists(&self, name: &str) -> Result<(), RegistryError> {
        if self.service_exists(name).await? {
            Ok(())
        } else {
            Err(RegistryError::ServiceNotFound {
                name: name.to_string(),
            })
        }
    }
}

fn render_unit(definition: &ServiceDefinition) -> String {
    let mut exec = definition.exe_path.display().to_string();
    for arg in &definition.launch_args {
        exec.push(' ');
        exec.push_str(arg);
    }
    format!(
        "[Unit]\nDescription={}\n\n[Service]\nType=simple\nExecStart={}\n\n[Install]\nWantedBy=multi-user.target\n",
        definition.description, exec
    )
}

// systemd takes a single restart delay; the plan's first step is the
// closest native mapping, with the reset window and step count expressed
// through the unit's start-limit settings.
fn render_recovery_dropin(plan: &RecoveryPlan) -> String {
    let delay_secs = plan.steps.first().map(|s| s.delay.as_secs()).unwrap_or(0);
    format!(
        "[Unit]\nStartLimitIntervalSec={}\nStartLimitBurst={}\n\n[Service]\nRestart=on-failure\nRestartSec={}\n",
        plan.reset_window.as_secs(),
        plan.steps.len(),
        delay_secs
    )
}

fn state_from_active(active: &str) -> ServiceState {
    match active {
        "active" | "reloading" => ServiceState::Running,
        "activating" => ServiceState::StartPending,
        "deactivating" => ServiceState::StopPending,
        "inactive" | "failed" => ServiceState::Stopped,
        _ => ServiceState::Unknown(0),
    }
}

impl ServiceRegistry for SystemdRegistry {
    async fn service_exists(&self, name: &str) -> Result<bool, RegistryError> {
        if tokio::fs::try_exists(self.unit_path(name))
            .await
            .unwrap_or(false)
        {
            return Ok(true);
        }
        // Units registered outside our directory still count.
        let output = Self::systemctl(&["cat", &Self::unit_name(name)]).await?;
        Ok(output.status.success())
    }

    async fn create_service(&self, definition: &ServiceDefinition) -> Result<(), RegistryError> {
        let unit = render_unit(definition);
        tokio::fs::write(self.unit_path(&definition.name), unit)
            .await
            .map_err(|e| RegistryError::OperationFailed {
                name: definition.name.clone(),
                operation: "create".to_string(),
                reason: format!("cannot write unit file: {}", e),
            })?;
        Self::systemctl_ok(&definition.name, "daemon-reload", &["daemon-reload"]).await?;
        if definition.auto_start {
            Self::systemctl_ok(
                &definition.name,
                "enable",
                &["enable", &Self::unit_name(&definition.name)],
            )
            .await?;
        }
        info!("registered service unit for '{}'", definition.name);
        Ok(())
    }

    async fn delete_service(&self, name: &str) -> Result<(), RegistryError> {
        self.ensure_exists(name).await?;
        // Disabling can fail for units that were never enabled.
        let _ = Self::systemctl(&["disable", &Self::unit_name(name)]).await;
        tokio::fs::remove_file(self.unit_path(name))
            .await
            .map_err(|e| RegistryError::OperationFailed {
                name: name.to_string(),
                operation: "delete".to_string(),
                reason: format!("cannot remove unit file: {}", e),
            })?;
        let dropin = self.dropin_dir(name);
        if tokio::fs::try_exists(&dropin).await.unwrap_or(false) {
            let _ = tokio::fs::remove_dir_all(&dropin).await;
        }
        Self::systemctl_ok(name, "daemon-reload", &["daemon-reload"]).await?;
        info!("removed service unit for '{}'", name);
        Ok(())
    }

    async fn start_service(&self, name: &str) -> Result<(), RegistryError> {
        self.ensure_exists(name).await?;
        Self::systemctl_ok(name, "start", &["start", &Self::unit_name(name)]).await
    }

    async fn control_stop(&self, name: &str) -> Result<StatusSnapshot, RegistryError> {
        self.ensure_exists(name).await?;
        Self::systemctl_ok(
            name,
            "stop",
            &["stop", "--no-block", &Self::unit_name(name)],
        )
        .await?;
        self.query_status(name).await
    }

    async fn query_status(&self, name: &str) -> Result<StatusSnapshot, RegistryError> {
        self.ensure_exists(name).await?;
        let output = Self::systemctl(&[
            "show",
            &Self::unit_name(name),
            "--property=ActiveState",
            "--value",
        ])
        .await?;
        if !output.status.success() {
            return Err(RegistryError::OperationFailed {
                name: name.to_string(),
                operation: "query".to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let active = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let state = state_from_active(&active);
        debug!("service '{}' active state: {} -> {}", name, active, state);

        let accepts = if state == ServiceState::Running {
            AcceptedControls::STOP | AcceptedControls::SHUTDOWN
        } else {
            AcceptedControls::NONE
        };
        Ok(StatusSnapshot::accepting(state, accepts))
    }

    async fn apply_recovery_plan(
        &self,
        name: &str,
        plan: &RecoveryPlan,
    ) -> Result<(), RegistryError> {
        let dropin_dir = self.dropin_dir(name);
        tokio::fs::create_dir_all(&dropin_dir)
            .await
            .map_err(|e| RegistryError::OperationFailed {
                name: name.to_string(),
                operation: "recovery".to_string(),
                reason: format!("cannot create drop-in directory: {}", e),
            })?;
        tokio::fs::write(dropin_dir.join("recovery.conf"), render_recovery_dropin(plan))
            .await
            .map_err(|e| RegistryError::OperationFailed {
                name: name.to_string(),
                operation: "recovery".to_string(),
                reason: format!("cannot write recovery drop-in: {}", e),
            })?;
        Self::systemctl_ok(name, "daemon-reload", &["daemon-reload"]).await?;
        info!("applied restart policy for '{}'", name);
        Ok(())
    }

    async fn register_event_source(&self, name: &str) -> Result<(), RegistryError> {
        // journald attributes records by unit; no per-source registration.
        debug!("no event source registration needed for '{}'", name);
        Ok(())
    }

    async fn remove_event_source(&self, name: &str) -> Result<(), RegistryError> {
        debug!("no event source removal needed for '{}'", name);
        Ok(())
    }
}
