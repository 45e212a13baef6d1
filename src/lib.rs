//! iomond — file-activity monitoring agent run as an OS-managed service.
//!
//! One binary covers both surfaces: the administrative commands
//! (install/remove/start/stop/status against the OS service registry)
//! and the service execution path (the control loop the service manager
//! drives once the process is dispatched as a service).

pub mod config;
pub mod constants;
pub mod errors;
pub mod lifecycle;
pub mod logging;
pub mod monitor;
pub mod paths;
pub mod registry;
pub mod service;
