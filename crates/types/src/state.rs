//! Artifact lifecycle state definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an install artifact
///
/// The happy path runs `Installing` through `Uninstalled` in declaration
/// order. `Unresolved` is entered from `Resolved` when a dependency that was
/// satisfied disappears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactState {
    Initial,
    Installing,
    Installed,
    Resolving,
    Resolved,
    Starting,
    Started,
    Stopping,
    Stopped,
    Uninstalling,
    Uninstalled,
    Unresolved,
}

impl ArtifactState {
    /// Position on the happy path, `None` for `Unresolved`
    #[must_use]
    pub fn ordinal(self) -> Option<u8> {
        let ordinal = match self {
            Self::Initial => 0,
            Self::Installing => 1,
            Self::Installed => 2,
            Self::Resolving => 3,
            Self::Resolved => 4,
            Self::Starting => 5,
            Self::Started => 6,
            Self::Stopping => 7,
            Self::Stopped => 8,
            Self::Uninstalling => 9,
            Self::Uninstalled => 10,
            Self::Unresolved => return None,
        };
        Some(ordinal)
    }

    /// Whether a lifecycle operation is in flight
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Installing | Self::Resolving | Self::Starting | Self::Stopping | Self::Uninstalling
        )
    }

    /// Whether the artifact is installed and not yet uninstalled
    #[must_use]
    pub fn is_installed(self) -> bool {
        !matches!(self, Self::Initial | Self::Installing | Self::Uninstalled)
    }

    /// Whether the artifact has been resolved at least once and is not unresolved
    #[must_use]
    pub fn is_resolved(self) -> bool {
        matches!(
            self,
            Self::Resolved | Self::Starting | Self::Started | Self::Stopping | Self::Stopped
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "INITIAL",
            Self::Installing => "INSTALLING",
            Self::Installed => "INSTALLED",
            Self::Resolving => "RESOLVING",
            Self::Resolved => "RESOLVED",
            Self::Starting => "STARTING",
            Self::Started => "STARTED",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::Uninstalling => "UNINSTALLING",
            Self::Uninstalled => "UNINSTALLED",
            Self::Unresolved => "UNRESOLVED",
        }
    }
}

impl Default for ArtifactState {
    fn default() -> Self {
        Self::Initial
    }
}

impl fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_is_ordered() {
        let path = [
            ArtifactState::Installing,
            ArtifactState::Installed,
            ArtifactState::Resolving,
            ArtifactState::Resolved,
            ArtifactState::Starting,
            ArtifactState::Started,
            ArtifactState::Stopping,
            ArtifactState::Stopped,
            ArtifactState::Uninstalling,
            ArtifactState::Uninstalled,
        ];
        assert!(path.windows(2).all(|w| w[0].ordinal() < w[1].ordinal()));
        assert_eq!(ArtifactState::Unresolved.ordinal(), None);
    }

    #[test]
    fn test_state_predicates() {
        assert!(ArtifactState::Starting.is_transient());
        assert!(!ArtifactState::Started.is_transient());
        assert!(ArtifactState::Stopped.is_installed());
        assert!(!ArtifactState::Uninstalled.is_installed());
        assert!(!ArtifactState::Unresolved.is_resolved());
    }
}
