#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the mdk deployment kernel
//!
//! This crate provides the value types shared by every layer: versions and
//! version ranges, artifact identities, lifecycle states and deployment
//! options.

pub mod deployment;
pub mod identity;
pub mod state;
pub mod version;

// Re-export commonly used types
pub use deployment::{DeploymentIdentity, DeploymentOptions};
pub use identity::{ArtifactIdentity, ArtifactType};
pub use state::ArtifactState;
pub use version::{Version, VersionRange};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form string properties attached to artifacts and deployments
pub type Properties = BTreeMap<String, String>;

/// Output format for CLI and event rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Plain,
    Tty,
    Json,
}

impl OutputFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Tty => "tty",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "tty" => Ok(Self::Tty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format '{other}'")),
        }
    }
}

/// Color choice for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    Always,
    #[default]
    Auto,
    Never,
}
