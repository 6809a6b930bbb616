#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Dependency resolution for mdk
//!
//! This crate expands library imports into package imports, wires module
//! imports to exporters under scope and uses constraints, and explains
//! wirings that fail.

mod detective;
mod expansion;
mod resolver;
mod state;
mod uses;

pub use detective::{Diagnosis, ResolutionFailureDetective};
pub use expansion::{
    expand_manifests, merge_import, ImportExpander, LibraryImportExpander, LibraryProvider,
    ResolvedLibrary,
};
pub use resolver::{ResolverError, StateResolver};
pub use state::{Candidate, ModuleDescription, ResolverState, Wiring};
pub use uses::{PackageSpace, SourcedPackage, UsesAnalysis, UsesAnalyzer, UsesConflict};
