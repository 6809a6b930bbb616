use mdk_artifact::{post_order, ArtifactNode};
use mdk_errors::Error;
use mdk_events::{AppEvent, EventEmitter, FailureContext, ResolverEvent};
use mdk_resolver::{
    Diagnosis, ModuleDescription, ResolutionFailureDetective, StateResolver, UsesAnalysis, Wiring,
};
use mdk_types::ArtifactIdentity;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::{InstallEnvironment, PipelineStage};

/// Wires the modules of the tree against everything already resolved
///
/// Unresolved modules of the tree are added to the shared resolver state
/// and resolved together. On success their wirings are recorded; on
/// failure the detective's report becomes the error.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveStage {
    drive_lifecycle: bool,
    resolver: StateResolver,
    detective: ResolutionFailureDetective,
}

impl ResolveStage {
    /// Resolve and move the tree's artifacts to `Resolved`
    #[must_use]
    pub fn new() -> Self {
        Self {
            drive_lifecycle: true,
            ..Self::default()
        }
    }

    /// Resolve without touching lifecycle states
    #[must_use]
    pub fn refreshing() -> Self {
        Self {
            drive_lifecycle: false,
            ..Self::default()
        }
    }

    fn targets(tree: &ArtifactNode, env: &InstallEnvironment) -> Vec<ArtifactIdentity> {
        let mut state = env.resolver_state_mut();
        let mut targets = Vec::new();
        for node in post_order(tree) {
            let artifact = node.value();
            let Some(manifest) = artifact.manifest() else {
                continue;
            };
            let identity = artifact.identity();
            match state.get(&identity) {
                Some(known) if known.resolved => continue,
                Some(_) => {}
                None => state.insert(ModuleDescription::from_manifest(identity.clone(), &manifest)),
            }
            targets.push(identity);
        }
        targets
    }

    fn run(
        &self,
        root: &ArtifactIdentity,
        targets: &[ArtifactIdentity],
        env: &InstallEnvironment,
    ) -> Result<BTreeMap<ArtifactIdentity, Wiring>, Error> {
        let state = env.resolver_state();
        self.resolver.resolve(&state, targets).map_err(|errors| {
            let diagnoses = self.detective.diagnose(&state, &errors);
            let failure = self.detective.failure(root, &diagnoses);
            report(root, &diagnoses, &failure, env);
            failure
        })
    }
}

fn report(root: &ArtifactIdentity, diagnoses: &[Diagnosis], failure: &Error, env: &InstallEnvironment) {
    for diagnosis in diagnoses {
        env.log().warn(diagnosis.error.module(), diagnosis.to_string());
        match &diagnosis.uses {
            Some(UsesAnalysis::Conflicts(conflicts)) => {
                for conflict in conflicts {
                    env.emit(AppEvent::Resolver(ResolverEvent::UsesConflictDetected {
                        package: conflict.package.clone(),
                        first: conflict.candidate.to_string(),
                        second: conflict.visible.to_string(),
                    }));
                }
            }
            Some(UsesAnalysis::Inconclusive) => {
                env.emit(AppEvent::Resolver(ResolverEvent::AnalysisInconclusive {
                    artifact: diagnosis.error.module().to_string(),
                }));
            }
            None => {}
        }
    }
    env.emit(AppEvent::Resolver(ResolverEvent::ResolutionFailed {
        artifact: root.to_string(),
        failures: diagnoses.iter().map(ToString::to_string).collect(),
        failure: FailureContext::from_error(failure),
    }));
}

impl PipelineStage for ResolveStage {
    fn name(&self) -> &str {
        "resolve"
    }

    fn process(&self, tree: &ArtifactNode, env: &InstallEnvironment) -> Result<(), Error> {
        let root = tree.value().identity();
        let targets = Self::targets(tree, env);
        env.emit(AppEvent::Resolver(ResolverEvent::ResolutionStarted {
            modules: targets.iter().map(ToString::to_string).collect(),
        }));
        let started = Instant::now();

        let mut wirings = BTreeMap::new();
        if self.drive_lifecycle {
            env.lifecycle().resolve_with(tree, || {
                wirings = self.run(&root, &targets, env)?;
                Ok(())
            })?;
        } else {
            wirings = self.run(&root, &targets, env)?;
        }

        let resolved = wirings.len();
        let wired: usize = wirings.values().map(BTreeMap::len).sum();
        env.resolver_state_mut().apply(wirings);

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::debug!(root = %root, resolved, wirings = wired, "tree resolved");
        env.emit(AppEvent::Resolver(ResolverEvent::ResolutionCompleted {
            resolved,
            wirings: wired,
            duration_ms,
        }));
        Ok(())
    }
}
