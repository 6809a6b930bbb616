//! Pipeline stages and their composition

use mdk_artifact::ArtifactNode;
use mdk_errors::Error;
use mdk_events::{AppEvent, EventEmitter, FailureContext, PipelineEvent};
use std::time::Instant;

use crate::InstallEnvironment;

/// One step of the install pipeline
///
/// Stages run on the thread driving the deployment and may block.
pub trait PipelineStage: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Returns an error if the tree cannot be processed; the pipeline
    /// aborts.
    fn process(&self, tree: &ArtifactNode, env: &InstallEnvironment) -> Result<(), Error>;
}

/// Ordered stages run one after the other
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn PipelineStage>>,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_stage(mut self, stage: impl PipelineStage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Names of the stages in run order
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl PipelineStage for Pipeline {
    fn name(&self) -> &str {
        "pipeline"
    }

    fn process(&self, tree: &ArtifactNode, env: &InstallEnvironment) -> Result<(), Error> {
        let artifact = tree.value().to_string();
        for stage in &self.stages {
            let stage_name = stage.name().to_string();
            tracing::debug!(stage = %stage_name, artifact = %artifact, "stage started");
            env.emit(AppEvent::Pipeline(PipelineEvent::StageStarted {
                stage: stage_name.clone(),
                artifact: artifact.clone(),
            }));
            let started = Instant::now();

            if let Err(err) = stage.process(tree, env) {
                tracing::debug!(stage = %stage_name, artifact = %artifact, error = %err, "stage failed");
                env.emit(AppEvent::Pipeline(PipelineEvent::StageFailed {
                    stage: stage_name,
                    artifact,
                    failure: FailureContext::from_error(&err),
                }));
                return Err(err);
            }

            let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            tracing::debug!(stage = %stage_name, artifact = %artifact, duration_ms, "stage completed");
            env.emit(AppEvent::Pipeline(PipelineEvent::StageCompleted {
                stage: stage_name,
                artifact: artifact.clone(),
                duration_ms,
            }));
        }
        Ok(())
    }
}

/// Runs a compensation stage when the guarded stage fails
///
/// The original failure is returned whether or not compensation succeeds.
pub struct CompensatingPipeline {
    guarded: Box<dyn PipelineStage>,
    compensation: Box<dyn PipelineStage>,
}

impl CompensatingPipeline {
    pub fn new(
        guarded: impl PipelineStage + 'static,
        compensation: impl PipelineStage + 'static,
    ) -> Self {
        Self {
            guarded: Box::new(guarded),
            compensation: Box::new(compensation),
        }
    }
}

impl std::fmt::Debug for CompensatingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompensatingPipeline")
            .field("guarded", &self.guarded.name())
            .field("compensation", &self.compensation.name())
            .finish()
    }
}

impl PipelineStage for CompensatingPipeline {
    fn name(&self) -> &str {
        self.guarded.name()
    }

    fn process(&self, tree: &ArtifactNode, env: &InstallEnvironment) -> Result<(), Error> {
        let Err(err) = self.guarded.process(tree, env) else {
            return Ok(());
        };

        let artifact = tree.value().to_string();
        tracing::warn!(
            artifact = %artifact,
            compensation = self.compensation.name(),
            error = %err,
            "running compensation"
        );
        if let Err(compensation_err) = self.compensation.process(tree, env) {
            tracing::warn!(artifact = %artifact, error = %compensation_err, "compensation failed");
        }
        env.emit(AppEvent::Pipeline(PipelineEvent::CompensationRan {
            stage: self.compensation.name().to_string(),
            artifact,
        }));
        Err(err)
    }
}
