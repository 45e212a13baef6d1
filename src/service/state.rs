//! Execution-phase tracking for the service callback.
//!
//! The OS dictates which states and transitions are legal; phases are an
//! explicit enumeration guarded by a transition function, never compared
//! by ad hoc values.

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;

use crate::registry::{AcceptedControls, ServiceState, StatusSnapshot};

/// Control command delivered by the service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Interrogate,
    Stop,
    Shutdown,
    Other(u32),
}

/// A control request plus the status echo an interrogation replies with.
#[derive(Debug, Clone, Copy)]
pub struct ControlRequest {
    pub command: ControlCommand,
    pub current_status: StatusSnapshot,
}

/// Legal phase order of the execution state machine. `Stopped` is
/// terminal; pause and continue are never reachable from here.
fn is_valid_transition(from: ServiceState, to: ServiceState) -> bool {
    matches!(
        (from, to),
        (ServiceState::StartPending, ServiceState::Running)
            | (ServiceState::Running, ServiceState::StopPending)
            | (ServiceState::StopPending, ServiceState::Stopped)
    )
}

/// Tracks the machine's phase and reports every transition to the OS.
pub struct PhaseTracker {
    current: ServiceState,
    status_tx: mpsc::UnboundedSender<StatusSnapshot>,
}

impl PhaseTracker {
    /// Enters at `StartPending` and reports it immediately.
    pub fn start(status_tx: mpsc::UnboundedSender<StatusSnapshot>) -> Self {
        let tracker = Self {
            current: ServiceState::StartPending,
            status_tx,
        };
        tracker.send(StatusSnapshot::new(tracker.current));
        tracker
    }

    pub fn current(&self) -> ServiceState {
        self.current
    }

    /// Moves to `next` and reports it; illegal transitions are errors.
    pub fn advance(&mut self, next: ServiceState, accepts: AcceptedControls) -> Result<()> {
        if !is_valid_transition(self.current, next) {
            return Err(anyhow!(
                "illegal service transition: {} -> {}",
                self.current,
                next
            ));
        }
        self.current = next;
        self.send(StatusSnapshot::accepting(next, accepts));
        Ok(())
    }

    /// Replies to an interrogation without changing phase.
    pub fn echo(&self, snapshot: StatusSnapshot) -> Result<()> {
        self.send_checked(snapshot)
    }

    fn send(&self, snapshot: StatusSnapshot) {
        let _ = self.status_tx.send(snapshot);
    }

    fn send_checked(&self, snapshot: StatusSnapshot) -> Result<()> {
        self.status_tx
            .send(snapshot)
            .map_err(|_| anyhow!("status channel closed"))
    }
}
