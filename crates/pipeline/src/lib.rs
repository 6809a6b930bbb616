#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Install pipeline for mdk
//!
//! A deployment's artifact tree passes through an ordered list of
//! [`PipelineStage`]s: manifest normalization, scoping, import expansion,
//! module type detection, install and resolve. The first failing stage
//! aborts the pipeline; [`CompensatingPipeline`] undoes partial work before
//! the failure is returned.

mod env;
mod log;
mod stage;
mod stages;

pub use env::InstallEnvironment;
pub use log::{InstallLog, LogEntry, LogLevel};
pub use stage::{CompensatingPipeline, Pipeline, PipelineStage};
pub use stages::{
    ImportExpansionStage, InstallStage, ManifestUpgrader, ModuleTypeDetector, PlanScoper,
    ResolveStage, UninstallStage, MODULE_TYPE_PROPERTY,
};

/// The standard install pipeline
///
/// Install and resolve run under compensation: when either fails, the
/// tree is uninstalled again and its modules leave the resolver state.
#[must_use]
pub fn install_pipeline() -> Pipeline {
    Pipeline::new()
        .with_stage(ManifestUpgrader)
        .with_stage(PlanScoper)
        .with_stage(ImportExpansionStage)
        .with_stage(ModuleTypeDetector)
        .with_stage(CompensatingPipeline::new(
            Pipeline::new()
                .with_stage(InstallStage)
                .with_stage(ResolveStage::new()),
            UninstallStage,
        ))
}

/// Pipeline re-run against a scope root when one of its modules changed
///
/// Only resolution runs; the caller drives the lifecycle of the refreshed
/// artifact.
#[must_use]
pub fn refresh_pipeline() -> Pipeline {
    Pipeline::new().with_stage(ResolveStage::refreshing())
}
