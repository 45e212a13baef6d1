use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use iomond::config::ServiceConfig;
use iomond::constants::{CONFIG_FILE_NAME, SERVICE_RUN_ARG};
use iomond::errors::RegistryError;
use iomond::lifecycle::ServiceLifecycle;
use iomond::logging::ServiceLogger;
use iomond::paths::{self, ResolvedPaths};
use iomond::registry::SystemdRegistry;
use iomond::service::{host_service, ServiceContext};

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::from_default_env()
        .add_directive("iomond=info".parse()?)
        .add_directive("notify=warn".parse()?);
    fmt().with_env_filter(env_filter).init();

    let exe_dir = match paths::exe_dir() {
        Ok(dir) => dir,
        Err(e) => {
            error!("cannot locate executable directory: {:#}", e);
            std::process::exit(1);
        }
    };

    let config_path = exe_dir.join(CONFIG_FILE_NAME);
    let config = match ServiceConfig::load_or_create(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("cannot load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let mut args = std::env::args().skip(1);
    let command = match args.next() {
        Some(command) => command,
        None => usage("no command given"),
    };

    match command.as_str() {
        "debug" => return run_foreground(exe_dir, config, true).await,
        arg if arg == SERVICE_RUN_ARG => return run_foreground(exe_dir, config, false).await,
        _ => {}
    }

    let lifecycle = ServiceLifecycle::new(SystemdRegistry::new());
    let name = config.service_name.clone();

    let outcome: Result<String, RegistryError> = match command.as_str() {
        "install" => lifecycle
            .install(&config.descriptor())
            .await
            .map(|_| format!("service '{}' installed", name)),
        "remove" => lifecycle
            .remove(&name)
            .await
            .map(|_| format!("service '{}' removed", name)),
        "start" => lifecycle
            .start(&name)
            .await
            .map(|_| format!("service '{}' started", name)),
        "stop" => lifecycle
            .stop(&name)
            .await
            .map(|_| format!("service '{}' stopped", name)),
        "status" => lifecycle
            .status(&name)
            .await
            .map(|state| format!("service '{}' state: {}", name, state)),
        other => usage(&format!("unknown command: {}", other)),
    };

    match outcome {
        Ok(message) => {
            println!("{}", message);
            Ok(())
        }
        Err(e) => {
            eprintln!("command failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_foreground(exe_dir: PathBuf, config: ServiceConfig, debug_mode: bool) -> Result<()> {
    let paths = ResolvedPaths::from_config(&exe_dir, &config);
    let logger = if debug_mode {
        ServiceLogger::new().with_console()
    } else {
        ServiceLogger::new()
    };

    info!(
        "running service '{}'{}",
        config.service_name,
        if debug_mode { " in debug mode" } else { "" }
    );

    let ctx = Arc::new(ServiceContext {
        config,
        paths,
        logger: Arc::new(logger),
    });

    if let Err(e) = host_service(ctx).await {
        error!("service run failed: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn usage(errmsg: &str) -> ! {
    let program = std::env::args()
        .next()
        .unwrap_or_else(|| "iomond".to_string());
    eprintln!(
        "{}\n\n\
         Usage:\n  \
         {program} install    - install the service\n  \
         {program} remove     - remove the service\n  \
         {program} start      - start the service\n  \
         {program} stop       - stop the service\n  \
         {program} status     - query the service state\n  \
         {program} debug      - run the service in the foreground",
        errmsg,
        program = program
    );
    std::process::exit(1);
}
