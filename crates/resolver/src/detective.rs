//! Turns resolver errors into operator-facing failure reports

use mdk_errors::{DeploymentError, Error};
use mdk_types::{ArtifactIdentity, ArtifactType};
use std::fmt;

use crate::resolver::ResolverError;
use crate::state::ResolverState;
use crate::uses::{UsesAnalysis, UsesAnalyzer};

/// A resolver error with the uses analysis run for it, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    pub error: ResolverError,
    pub uses: Option<UsesAnalysis>,
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        match &self.uses {
            Some(UsesAnalysis::Conflicts(conflicts)) => {
                for conflict in conflicts {
                    for line in conflict.statement().lines() {
                        write!(f, "\n    {line}")?;
                    }
                }
            }
            Some(UsesAnalysis::Inconclusive) => {
                f.write_str("\n    uses analysis inconclusive: no conflicting exporter identified")?;
            }
            None => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolutionFailureDetective {
    analyzer: UsesAnalyzer,
}

impl ResolutionFailureDetective {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a uses analysis to every uses violation
    #[must_use]
    pub fn diagnose(&self, state: &ResolverState, errors: &[ResolverError]) -> Vec<Diagnosis> {
        errors
            .iter()
            .map(|error| {
                let uses = match error {
                    ResolverError::UsesViolation { module, import, .. } => {
                        Some(self.analyzer.analyze(state, module, import))
                    }
                    _ => None,
                };
                Diagnosis {
                    error: error.clone(),
                    uses,
                }
            })
            .collect()
    }

    /// Build the unsatisfied-dependencies error for `root`
    ///
    /// Plans get `UnableToSatisfyPlanDependencies`, everything else
    /// `UnableToSatisfyBundleDependencies`.
    #[must_use]
    pub fn failure(&self, root: &ArtifactIdentity, diagnoses: &[Diagnosis]) -> Error {
        let failures: Vec<String> = diagnoses.iter().map(ToString::to_string).collect();
        let description = match failures.as_slice() {
            [single] => single.clone(),
            many => format!("{} unsatisfied constraints:\n{}", many.len(), many.join("\n")),
        };
        let name = root.name().to_string();
        let version = root.version().to_string();

        match root.artifact_type() {
            ArtifactType::Plan => DeploymentError::UnableToSatisfyPlanDependencies {
                name,
                version,
                description,
                failures,
            },
            _ => DeploymentError::UnableToSatisfyBundleDependencies {
                name,
                version,
                description,
                failures,
            },
        }
        .into()
    }
}
