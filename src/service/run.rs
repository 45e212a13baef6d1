//! The service execution state machine and its process host.
//!
//! `run_service` is the callback the service manager drives: report
//! `StartPending`, perform one-time setup, report `Running`, then
//! multiplex a heartbeat timer, monitor events, and control requests in a
//! single loop until a stop control arrives. Only setup failures are
//! fatal; everything inside the loop is logged and absorbed.

use anyhow::{anyhow, Context, Result};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tracing::{error, info};

use crate::config::ServiceConfig;
use crate::constants::control::HEARTBEAT_INTERVAL;
use crate::constants::monitor::{FILE_FILTERS, POLL_INTERVAL};
use crate::logging::{LogLevel, ServiceLogger};
use crate::monitor::{FileEvent, FileMonitor, FsWatchMonitor};
use crate::paths::ResolvedPaths;
use crate::registry::{AcceptedControls, ServiceState, StatusSnapshot};
use crate::service::state::{ControlCommand, ControlRequest, PhaseTracker};

/// Shared, read-only context built once at startup and passed by
/// reference; there is no ambient global state.
pub struct ServiceContext {
    pub config: ServiceConfig,
    pub paths: ResolvedPaths,
    pub logger: Arc<ServiceLogger>,
}

/// Runs the service callback end to end.
///
/// Returns `Err` only for setup failures; since `Running` is never
/// reported on that path, the service manager sees a failed start and the
/// installed recovery policy, if any, takes over.
pub async fn run_service(
    ctx: Arc<ServiceContext>,
    mut monitor: Box<dyn FileMonitor>,
    mut control_rx: mpsc::Receiver<ControlRequest>,
    status_tx: mpsc::UnboundedSender<StatusSnapshot>,
) -> Result<()> {
    let mut phase = PhaseTracker::start(status_tx);

    let mut events = match setup(&ctx, monitor.as_mut()) {
        Ok(events) => events,
        Err(e) => {
            ctx.logger
                .error(&format!("service setup failed: {:#}", e));
            return Err(e);
        }
    };

    let accepts = AcceptedControls::STOP | AcceptedControls::SHUTDOWN;
    phase.advance(ServiceState::Running, accepts)?;
    ctx.logger
        .info(&format!("service '{}' started", ctx.config.service_name));

    // First heartbeat after one full period, not immediately.
    let mut heartbeat = interval_at(Instant::now() + HEARTBEAT_INTERVAL, HEARTBEAT_INTERVAL);
    let mut events_open = true;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                ctx.logger.info(&format!(
                    "service '{}' is running",
                    ctx.config.service_name
                ));
            }
            event = events.recv(), if events_open => {
                match event {
                    Some(event) => handle_file_event(&ctx, &event),
                    None => {
                        events_open = false;
                        ctx.logger.error("monitor event stream closed");
                    }
                }
            }
            request = control_rx.recv() => {
                match request {
                    Some(request) => match request.command {
                        ControlCommand::Interrogate => {
                            if let Err(e) = phase.echo(request.current_status) {
                                ctx.logger.error(&format!(
                                    "failed to answer interrogation: {}",
                                    e
                                ));
                            }
                        }
                        ControlCommand::Stop | ControlCommand::Shutdown => {
                            ctx.logger.info(&format!(
                                "service '{}' received a stop request",
                                ctx.config.service_name
                            ));
                            break;
                        }
                        ControlCommand::Other(code) => {
                            ctx.logger.error(&format!(
                                "unexpected control request #{}",
                                code
                            ));
                        }
                    },
                    None => {
                        // The control source is gone; nothing else can
                        // ever stop us, so treat it as a stop request.
                        ctx.logger.error("control channel closed; stopping");
                        break;
                    }
                }
            }
        }
    }

    phase.advance(ServiceState::StopPending, AcceptedControls::NONE)?;

    monitor.stop();
    ctx.logger.info("file monitoring stopped");

    phase.advance(ServiceState::Stopped, AcceptedControls::NONE)?;
    ctx.logger
        .info(&format!("service '{}' stopped", ctx.config.service_name));
    Ok(())
}

fn handle_file_event(ctx: &ServiceContext, event: &FileEvent) {
    ctx.logger.log(
        LogLevel::Info,
        &format!("file event: {} - {}", event.file_type, event.path.display()),
    );
}

/// One-time setup: directories, file log destination, monitor
/// configuration and start. Every failure here is fatal to the start.
fn setup(
    ctx: &ServiceContext,
    monitor: &mut dyn FileMonitor,
) -> Result<mpsc::UnboundedReceiver<FileEvent>> {
    ctx.paths
        .materialize()
        .context("directory initialization failed")?;

    ctx.logger
        .init_file(&ctx.paths.log_dir)
        .context("file logger initialization failed")?;

    monitor.set_database_path(&ctx.paths.database_path);
    for root in &ctx.config.monitoring_path {
        monitor.add_device(root);
    }
    monitor.set_file_filters(FILE_FILTERS);

    let events = monitor
        .take_events()
        .ok_or_else(|| anyhow!("monitor event stream already taken"))?;
    monitor.start().context("failed to start file monitoring")?;
    ctx.logger.info("file monitoring started");

    Ok(events)
}

/// Hosts the execution state machine in the current process.
///
/// Stands in for the OS dispatcher: wires termination signals into the
/// stop control, remembers the last reported status so stop requests can
/// carry a faithful echo, and logs every status report.
pub async fn host_service(ctx: Arc<ServiceContext>) -> Result<()> {
    let (control_tx, control_rx) = mpsc::channel(4);
    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<StatusSnapshot>();

    let last_status = Arc::new(Mutex::new(StatusSnapshot::new(ServiceState::StartPending)));

    let status_task = {
        let last_status = Arc::clone(&last_status);
        tokio::spawn(async move {
            while let Some(snapshot) = status_rx.recv().await {
                info!("service status: {}", snapshot.state);
                if let Ok(mut slot) = last_status.lock() {
                    *slot = snapshot;
                }
            }
        })
    };

    let signal_task = {
        let last_status = Arc::clone(&last_status);
        tokio::spawn(async move {
            wait_for_stop_signal().await;
            let current = last_status
                .lock()
                .map(|slot| *slot)
                .unwrap_or_else(|_| StatusSnapshot::new(ServiceState::Running));
            let _ = control_tx
                .send(ControlRequest {
                    command: ControlCommand::Stop,
                    current_status: current,
                })
                .await;
        })
    };

    let monitor: Box<dyn FileMonitor> = Box::new(FsWatchMonitor::new(POLL_INTERVAL));
    let result = run_service(ctx, monitor, control_rx, status_tx).await;

    signal_task.abort();
    let _ = status_task.await;
    result
}

async fn wait_for_stop_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = term.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                error!("cannot listen for SIGTERM ({}); Ctrl-C only", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
