//! Fixed names used when locating configuration and kernel directories

/// Directory name under the platform config/data directories
pub const APP_DIR: &str = "mdk";

pub const CONFIG_FILE: &str = "config.toml";

pub const STAGING_DIR: &str = "staging";
pub const REPOSITORY_DIR: &str = "repository";
pub const LOGS_DIR: &str = "logs";

/// Deployment timeout used when neither file nor environment set one
pub const DEFAULT_DEPLOYER_TIMEOUT_SECS: u64 = 300;

pub const ENV_DEPLOYER_TIMEOUT: &str = "MDK_DEPLOYER_TIMEOUT";
pub const ENV_STAGING_PATH: &str = "MDK_STAGING_PATH";
pub const ENV_REPOSITORY_PATH: &str = "MDK_REPOSITORY_PATH";
pub const ENV_OUTPUT: &str = "MDK_OUTPUT";
pub const ENV_COLOR: &str = "MDK_COLOR";
