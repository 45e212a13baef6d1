//! Application-wide constants for intervals, file names, and limits.

use std::time::Duration;

/// Name of the JSON descriptor colocated with the executable.
pub const CONFIG_FILE_NAME: &str = "service_config.json";

/// Log file appended under the configured log directory.
pub const LOG_FILE_NAME: &str = "service.log";

/// Fixed launch argument that tells the binary it was dispatched by the
/// service manager rather than invoked administratively.
pub const SERVICE_RUN_ARG: &str = "run-as-service";

/// Control-loop timing.
pub mod control {
    use super::Duration;

    /// Period of the informational heartbeat inside the control loop.
    pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
}

/// Lifecycle-manager timing.
pub mod lifecycle {
    use super::Duration;

    /// Interval between status queries while waiting for a service to stop.
    pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(500);

    /// Window after which the OS resets the service failure counter.
    pub const RECOVERY_RESET_WINDOW: Duration = Duration::from_secs(60);
}

/// Monitor collaborator defaults.
pub mod monitor {
    use super::Duration;

    /// Polling interval handed to the file-system watcher.
    pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

    /// Extensions the watcher reports on.
    pub const FILE_FILTERS: &[&str] = &[".exe", ".dll"];
}
