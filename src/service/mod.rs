//! Service execution: phase tracking, the control loop, and its host.

pub mod run;
pub mod state;

pub use run::{host_service, run_service, ServiceContext};
pub use state::{ControlCommand, ControlRequest, PhaseTracker};
