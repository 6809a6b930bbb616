//! Wiring resolver over a [`ResolverState`]

use mdk_manifest::{LibraryImport, PackageImport};
use mdk_types::ArtifactIdentity;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Instant;

use crate::state::{ModuleDescription, ResolverState, Wiring};
use crate::uses::{add_uses_closure, PackageSpace, SourcedPackage};

/// An unsatisfied constraint reported by the resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// No visible exporter matches a mandatory import
    MissingImport {
        module: ArtifactIdentity,
        import: PackageImport,
    },
    /// Exporters exist but each would give the module two exporters of
    /// some package
    UsesViolation {
        module: ArtifactIdentity,
        import: PackageImport,
        candidates: Vec<ArtifactIdentity>,
    },
    /// A mandatory library import was never expanded
    MissingLibrary {
        module: ArtifactIdentity,
        library: LibraryImport,
    },
}

impl ResolverError {
    #[must_use]
    pub fn module(&self) -> &ArtifactIdentity {
        match self {
            Self::MissingImport { module, .. }
            | Self::UsesViolation { module, .. }
            | Self::MissingLibrary { module, .. } => module,
        }
    }

    #[must_use]
    pub fn import(&self) -> Option<&PackageImport> {
        match self {
            Self::MissingImport { import, .. } | Self::UsesViolation { import, .. } => Some(import),
            Self::MissingLibrary { .. } => None,
        }
    }
}

impl fmt::Display for ResolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingImport { module, import } => write!(
                f,
                "missing constraint: import of package {import} by {module} has no visible exporter"
            ),
            Self::UsesViolation {
                module,
                import,
                candidates,
            } => write!(
                f,
                "uses violation: import of package {import} by {module} cannot be wired to any of {} candidate(s) without a conflicting package",
                candidates.len()
            ),
            Self::MissingLibrary { module, library } => {
                write!(f, "missing library: {module} imports {library}")
            }
        }
    }
}

/// Wires the imports of modules to exporters
#[derive(Debug, Clone, Copy, Default)]
pub struct StateResolver;

impl StateResolver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Compute a wiring for every target module
    ///
    /// Exporters must be resolved already or be targets themselves. A target
    /// that fails takes its exports out of the candidate pool, and the pass
    /// is repeated until no further target fails. The state is not
    /// modified; callers record the result with [`ResolverState::apply`].
    ///
    /// # Errors
    ///
    /// Returns every unsatisfied constraint of every failing target.
    pub fn resolve(
        &self,
        state: &ResolverState,
        targets: &[ArtifactIdentity],
    ) -> Result<BTreeMap<ArtifactIdentity, Wiring>, Vec<ResolverError>> {
        let started = Instant::now();
        let targets: BTreeSet<&ArtifactIdentity> = targets.iter().collect();
        let mut failed: BTreeMap<ArtifactIdentity, Vec<ResolverError>> = BTreeMap::new();

        loop {
            let mut wirings = BTreeMap::new();
            let mut new_failures = false;

            for target in &targets {
                if failed.contains_key(*target) {
                    continue;
                }
                let Some(module) = state.get(target) else {
                    tracing::warn!(module = %target, "resolution target is not in the resolver state");
                    continue;
                };

                let eligible = |candidate: &ModuleDescription| {
                    candidate.resolved
                        || (targets.contains(&candidate.identity)
                            && !failed.contains_key(&candidate.identity))
                };

                match Self::wire(state, module, eligible) {
                    Ok(wiring) => {
                        wirings.insert((*target).clone(), wiring);
                    }
                    Err(errors) => {
                        failed.insert((*target).clone(), errors);
                        new_failures = true;
                    }
                }
            }

            if new_failures {
                continue;
            }

            tracing::debug!(
                targets = targets.len(),
                failed = failed.len(),
                elapsed_ms = started.elapsed().as_millis(),
                "resolution pass finished"
            );
            if failed.is_empty() {
                return Ok(wirings);
            }
            return Err(failed.into_values().flatten().collect());
        }
    }

    fn wire(
        state: &ResolverState,
        module: &ModuleDescription,
        eligible: impl Fn(&ModuleDescription) -> bool,
    ) -> Result<Wiring, Vec<ResolverError>> {
        let mut errors: Vec<ResolverError> = module
            .library_imports
            .iter()
            .filter(|l| !l.is_optional())
            .map(|library| ResolverError::MissingLibrary {
                module: module.identity.clone(),
                library: library.clone(),
            })
            .collect();

        let mut space = PackageSpace::new();
        for export in module.exports.iter().filter(|e| module.import(&e.name).is_none()) {
            space.insert(
                export.name.clone(),
                SourcedPackage {
                    package: export.name.clone(),
                    version: export.version.clone(),
                    exporter: module.identity.clone(),
                    provenance: Vec::new(),
                },
            );
        }

        let mut wiring = Wiring::new();
        for import in &module.imports {
            let candidates: Vec<_> = state
                .candidates(&module.identity, import)
                .into_iter()
                .filter(|c| eligible(c.module))
                .collect();

            if candidates.is_empty() {
                if !import.is_optional() {
                    errors.push(ResolverError::MissingImport {
                        module: module.identity.clone(),
                        import: import.clone(),
                    });
                }
                continue;
            }

            let chosen = candidates.iter().find_map(|candidate| {
                let mut closure = PackageSpace::new();
                add_uses_closure(
                    state,
                    candidate.module,
                    candidate.export,
                    vec![format!("import {}", import.name)],
                    &mut closure,
                );
                let consistent = closure.iter().all(|(package, sourced)| {
                    space
                        .get(package)
                        .is_none_or(|existing| existing.exporter == sourced.exporter)
                });
                consistent.then_some((candidate.module, closure))
            });

            match chosen {
                Some((exporter, closure)) => {
                    wiring.insert(import.name.clone(), exporter.identity.clone());
                    for (package, sourced) in closure {
                        space.entry(package).or_insert(sourced);
                    }
                }
                None if import.is_optional() => {
                    tracing::debug!(
                        module = %module.identity,
                        import = %import,
                        "optional import left unwired to avoid a uses conflict"
                    );
                }
                None => errors.push(ResolverError::UsesViolation {
                    module: module.identity.clone(),
                    import: import.clone(),
                    candidates: candidates.iter().map(|c| c.module.identity.clone()).collect(),
                }),
            }
        }

        if errors.is_empty() {
            Ok(wiring)
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdk_manifest::PackageExport;
    use mdk_types::{ArtifactType, Version, VersionRange};

    fn module(name: &str) -> ModuleDescription {
        ModuleDescription {
            identity: ArtifactIdentity::new(ArtifactType::Module, name, Version::new(1, 0, 0)),
            exports: Vec::new(),
            imports: Vec::new(),
            library_imports: Vec::new(),
            resolved: false,
            wiring: Wiring::new(),
        }
    }

    #[test]
    fn test_targets_wire_to_each_other() {
        let mut state = ResolverState::new();
        let mut api = module("api");
        api.exports
            .push(PackageExport::new("net.api", Version::new(1, 0, 0)));
        let mut client = module("client");
        client
            .imports
            .push(PackageImport::new("net.api", VersionRange::unbounded()));
        let targets = vec![api.identity.clone(), client.identity.clone()];
        state.insert(api);
        state.insert(client);

        let wirings = StateResolver::new().resolve(&state, &targets).unwrap();
        assert_eq!(wirings[&targets[1]]["net.api"], targets[0]);
        assert!(wirings[&targets[0]].is_empty());
    }

    #[test]
    fn test_failure_cascades_to_dependents() {
        let mut state = ResolverState::new();
        let mut api = module("api");
        api.exports
            .push(PackageExport::new("net.api", Version::new(1, 0, 0)));
        api.imports
            .push(PackageImport::new("net.missing", VersionRange::unbounded()));
        let mut client = module("client");
        client
            .imports
            .push(PackageImport::new("net.api", VersionRange::unbounded()));
        let targets = vec![api.identity.clone(), client.identity.clone()];
        state.insert(api);
        state.insert(client);

        let errors = StateResolver::new().resolve(&state, &targets).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ResolverError::MissingImport { .. })));
    }

    #[test]
    fn test_optional_import_may_stay_unwired() {
        let mut state = ResolverState::new();
        let mut lonely = module("lonely");
        lonely
            .imports
            .push(PackageImport::new("net.none", VersionRange::unbounded()).optional());
        let target = lonely.identity.clone();
        state.insert(lonely);

        let wirings = StateResolver::new().resolve(&state, &[target.clone()]).unwrap();
        assert!(wirings[&target].is_empty());
    }

    #[test]
    fn test_unexpanded_library_import_is_reported() {
        let mut state = ResolverState::new();
        let mut module = module("m");
        module
            .library_imports
            .push(LibraryImport::new("util", VersionRange::unbounded()));
        let target = module.identity.clone();
        state.insert(module);

        let errors = StateResolver::new().resolve(&state, &[target]).unwrap_err();
        assert!(matches!(errors[0], ResolverError::MissingLibrary { .. }));
    }
}
