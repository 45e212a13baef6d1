//! Interface to the OS service-control facility.
//!
//! The lifecycle manager talks to the registry exclusively through the
//! [`ServiceRegistry`] trait so tests can script the OS side; the
//! production backend lives in [`systemd`].

pub mod systemd;

pub use systemd::SystemdRegistry;

use std::fmt;
use std::ops::BitOr;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::lifecycle::RECOVERY_RESET_WINDOW;
use crate::errors::RegistryError;

/// Runtime state of a registered service as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    StartPending,
    Running,
    StopPending,
    Stopped,
    PausePending,
    Paused,
    ContinuePending,
    /// A state code outside the known enumeration.
    Unknown(u32),
}

impl ServiceState {
    /// Decodes the numeric state code used by the OS status protocol.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => ServiceState::Stopped,
            2 => ServiceState::StartPending,
            3 => ServiceState::StopPending,
            4 => ServiceState::Running,
            5 => ServiceState::ContinuePending,
            6 => ServiceState::PausePending,
            7 => ServiceState::Paused,
            other => ServiceState::Unknown(other),
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::StartPending => write!(f, "start pending"),
            ServiceState::Running => write!(f, "running"),
            ServiceState::StopPending => write!(f, "stop pending"),
            ServiceState::Stopped => write!(f, "stopped"),
            ServiceState::PausePending => write!(f, "pause pending"),
            ServiceState::Paused => write!(f, "paused"),
            ServiceState::ContinuePending => write!(f, "continue pending"),
            ServiceState::Unknown(code) => write!(f, "unknown ({})", code),
        }
    }
}

/// Bitmask of control requests a running service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcceptedControls(u32);

impl AcceptedControls {
    pub const NONE: Self = Self(0);
    pub const STOP: Self = Self(1);
    pub const SHUTDOWN: Self = Self(1 << 2);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for AcceptedControls {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Point-in-time status of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub state: ServiceState,
    pub accepts: AcceptedControls,
}

impl StatusSnapshot {
    pub fn new(state: ServiceState) -> Self {
        Self {
            state,
            accepts: AcceptedControls::NONE,
        }
    }

    pub fn accepting(state: ServiceState, accepts: AcceptedControls) -> Self {
        Self { state, accepts }
    }
}

/// The only automatic recovery action this design installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    Restart,
}

/// One step of a recovery plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryStep {
    pub action: RecoveryAction,
    pub delay: Duration,
}

/// Escalating restart policy applied to a registration at install time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPlan {
    pub steps: Vec<RecoveryStep>,
    /// Window without failures after which the OS resets its counter.
    pub reset_window: Duration,
}

impl RecoveryPlan {
    /// Three restart steps with escalating delays `d, 2d, 3d`.
    pub fn escalating(delay: Duration) -> Self {
        Self {
            steps: (1..=3u32)
                .map(|n| RecoveryStep {
                    action: RecoveryAction::Restart,
                    delay: delay * n,
                })
                .collect(),
            reset_window: RECOVERY_RESET_WINDOW,
        }
    }
}

/// Everything the registry needs to create a service entry.
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    pub name: String,
    pub description: String,
    pub exe_path: PathBuf,
    /// Fixed arguments that signal "running as service" to the entry point.
    pub launch_args: Vec<String>,
    pub auto_start: bool,
}

/// The OS service-control facility as consumed by the lifecycle manager.
#[allow(async_fn_in_trait)]
pub trait ServiceRegistry {
    /// True if a service with this name is already registered.
    async fn service_exists(&self, name: &str) -> Result<bool, RegistryError>;

    async fn create_service(&self, definition: &ServiceDefinition) -> Result<(), RegistryError>;

    async fn delete_service(&self, name: &str) -> Result<(), RegistryError>;

    async fn start_service(&self, name: &str) -> Result<(), RegistryError>;

    /// Issues the stop control; returns the status observed at dispatch.
    async fn control_stop(&self, name: &str) -> Result<StatusSnapshot, RegistryError>;

    async fn query_status(&self, name: &str) -> Result<StatusSnapshot, RegistryError>;

    /// Applies the escalating restart policy to an existing registration.
    async fn apply_recovery_plan(
        &self,
        name: &str,
        plan: &RecoveryPlan,
    ) -> Result<(), RegistryError>;

    async fn register_event_source(&self, name: &str) -> Result<(), RegistryError>;

    async fn remove_event_source(&self, name: &str) -> Result<(), RegistryError>;
}
