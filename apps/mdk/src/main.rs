//! mdk - module deployment kernel
//!
//! Loads configuration, builds a pipelined deployer and runs the requested
//! command while draining the event channel into tracing.

mod cli;
mod display;
mod error;
mod logging;

use crate::cli::{Cli, Commands};
use crate::display::{CommandResult, DeploymentRow, OutputRenderer};
use crate::error::CliError;
use crate::logging::log_event_with_tracing;
use clap::Parser;
use mdk_config::Config;
use mdk_deployer::{DeployerBuilder, PipelinedApplicationDeployer};
use mdk_events::EventReceiver;
use mdk_types::DeploymentOptions;
use std::process;
use tokio::select;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug);

    if let Err(e) = run(cli).await {
        error!("Application error: {}", e);
        if !json_mode {
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<(), CliError> {
    info!("Starting mdk v{}", env!("CARGO_PKG_VERSION"));

    // File config (or defaults), then environment
    let mut config = Config::load_or_default(cli.global.config.as_deref())
        .await
        .map_err(CliError::Config)?;
    config.merge_env().map_err(CliError::Config)?;

    let (event_sender, event_receiver) = mdk_events::channel();
    let deployer = DeployerBuilder::from_config(&config)
        .await?
        .with_event_sender(event_sender)
        .build();

    let renderer = OutputRenderer::new(cli.global.json);
    let result =
        execute_command_with_events(cli.command, &config, deployer, event_receiver).await?;
    renderer.render_result(&result)?;

    info!("Command completed successfully");
    Ok(())
}

/// Execute command while logging the events it emits
async fn execute_command_with_events(
    command: Commands,
    config: &Config,
    deployer: PipelinedApplicationDeployer,
    mut event_receiver: EventReceiver,
) -> Result<CommandResult, CliError> {
    let mut command_future = Box::pin(execute_command(command, config, deployer));

    loop {
        select! {
            result = &mut command_future => {
                while let Ok(message) = event_receiver.try_recv() {
                    log_event_with_tracing(&message);
                }
                return result;
            }

            message = event_receiver.recv() => {
                if let Some(message) = message {
                    log_event_with_tracing(&message);
                }
            }
        }
    }
}

/// Execute the specified command
async fn execute_command(
    command: Commands,
    config: &Config,
    deployer: PipelinedApplicationDeployer,
) -> Result<CommandResult, CliError> {
    let options = DeploymentOptions::default().with_recoverable(config.deployer.recoverable);

    match command {
        Commands::Deploy {
            descriptors,
            install_only,
        } => {
            let options = DeploymentOptions {
                install_only,
                ..options
            };
            for descriptor in &descriptors {
                deployer
                    .deploy_with_options(&to_uri(descriptor), options)
                    .await?;
            }

            let deployments = deployer
                .deployed()
                .into_iter()
                .map(|(uri, identity)| DeploymentRow {
                    state: deployer.artifact(&uri).map(|root| root.value().state()),
                    uri,
                    identity,
                })
                .collect();
            Ok(CommandResult::Deployed { deployments })
        }

        Commands::Check { descriptor } => {
            let uri = to_uri(&descriptor);
            let identity = deployer
                .deploy_with_options(
                    &uri,
                    DeploymentOptions {
                        install_only: true,
                        ..options
                    },
                )
                .await?;
            let state = deployer.artifact(&uri).map(|root| root.value().state());
            let log = deployer
                .environment()
                .log()
                .drain()
                .iter()
                .map(ToString::to_string)
                .collect();
            deployer.undeploy(&uri).await?;

            Ok(CommandResult::Checked {
                identity,
                state,
                log,
            })
        }
    }
}

/// Accept plain paths as well as `file:` URIs
fn to_uri(descriptor: &str) -> String {
    if descriptor.starts_with("file:") {
        descriptor.to_string()
    } else {
        format!("file:{descriptor}")
    }
}

/// Initialize tracing/logging
fn init_tracing(json_mode: bool, debug_enabled_flag: bool) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;
    let filter = |default: &str| {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default))
    };

    if debug_enabled {
        // Debug mode: structured JSON logs to file
        let log_dir = Config::logs_path();
        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            if !json_mode {
                eprintln!("Warning: Failed to create log directory: {e}");
            }
        }

        let log_file = log_dir.join(format!(
            "mdk-{}.log",
            chrono::Utc::now().format("%Y%m%d-%H%M%S")
        ));
        match std::fs::File::create(&log_file) {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .json()
                    .with_writer(file)
                    .with_env_filter(filter("info,mdk=debug"))
                    .init();
                if !json_mode {
                    eprintln!("Debug logging enabled: {}", log_file.display());
                }
                return;
            }
            Err(e) => {
                if !json_mode {
                    eprintln!("Warning: Failed to create log file: {e}");
                }
            }
        }
    }

    if json_mode {
        // Keep stdout clean for the JSON result
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter("warn,mdk=info"))
            .init();
    }
}
