//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use mdk_types::{ArtifactState, DeploymentIdentity};
use serde::Serialize;
use std::io;

/// One deployed artifact tree
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentRow {
    pub uri: String,
    pub identity: DeploymentIdentity,
    pub state: Option<ArtifactState>,
}

/// Result of a CLI command
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandResult {
    Deployed {
        deployments: Vec<DeploymentRow>,
    },
    Checked {
        identity: DeploymentIdentity,
        state: Option<ArtifactState>,
        /// Install log written while the tree was installed and resolved
        log: Vec<String>,
    },
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    json_output: bool,
}

impl OutputRenderer {
    pub fn new(json_output: bool) -> Self {
        Self { json_output }
    }

    /// Render command result
    pub fn render_result(&self, result: &CommandResult) -> io::Result<()> {
        if self.json_output {
            let json = serde_json::to_string_pretty(result).map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }

        match result {
            CommandResult::Deployed { deployments } => Self::render_deployments(deployments),
            CommandResult::Checked {
                identity,
                state,
                log,
            } => Self::render_check(identity, *state, log),
        }
        Ok(())
    }

    fn render_deployments(deployments: &[DeploymentRow]) {
        if deployments.is_empty() {
            println!("Nothing deployed.");
            return;
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Type", "Name", "Version", "State", "URI"]);
        for row in deployments {
            table.add_row(vec![
                row.identity.artifact_type.to_string(),
                row.identity.name.clone(),
                row.identity.version.to_string(),
                state_label(row.state),
                row.uri.clone(),
            ]);
        }
        println!("{table}");
    }

    fn render_check(identity: &DeploymentIdentity, state: Option<ArtifactState>, log: &[String]) {
        println!("[OK] {identity} reached {}", state_label(state));
        for line in log {
            println!("  {line}");
        }
    }
}

fn state_label(state: Option<ArtifactState>) -> String {
    state.map_or_else(|| "unknown".to_string(), |s| s.to_string())
}
