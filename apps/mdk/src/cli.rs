//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// mdk - module deployment kernel
#[derive(Parser)]
#[command(name = "mdk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Module deployment kernel")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging to the mdk log directory
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Deploy artifact descriptors and start them
    Deploy {
        /// Descriptor files or file: URIs, deployed in order
        #[arg(required = true)]
        descriptors: Vec<String>,

        /// Install and resolve without starting anything
        #[arg(long)]
        install_only: bool,
    },

    /// Install and resolve a descriptor without starting it, then undeploy
    Check {
        /// Descriptor file or file: URI
        descriptor: String,
    },
}
