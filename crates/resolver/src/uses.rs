//! Uses-constraint closure and conflict analysis
//!
//! A module's class space must contain at most one exporter per package.
//! Wiring an import to an exporter also pulls in every package that export
//! `uses`, transitively; the analysis here finds packages that end up with
//! two different exporters.

use mdk_manifest::{PackageExport, PackageImport};
use mdk_types::{ArtifactIdentity, Version};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::state::{ModuleDescription, ResolverState};

/// A package, the module exporting it and how it became visible
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcedPackage {
    pub package: String,
    pub version: Version,
    pub exporter: ArtifactIdentity,
    /// Steps that made the package visible, outermost first
    pub provenance: Vec<String>,
}

impl fmt::Display for SourcedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "package {} {} exported by {}",
            self.package, self.version, self.exporter
        )?;
        if !self.provenance.is_empty() {
            write!(f, " ({})", self.provenance.join(", "))?;
        }
        Ok(())
    }
}

/// Packages visible to a module, keyed by package name
pub type PackageSpace = BTreeMap<String, SourcedPackage>;

/// Add `export` of `exporter` and its transitive uses to `space`
///
/// Packages already in `space` are left alone, so the first exporter
/// reached for a package wins. Uses are followed through the exporter's own
/// exports, then its wiring, then its best candidate when unwired.
pub(crate) fn add_uses_closure(
    state: &ResolverState,
    exporter: &ModuleDescription,
    export: &PackageExport,
    provenance: Vec<String>,
    space: &mut PackageSpace,
) {
    let mut queue = VecDeque::from([(exporter.identity.clone(), export.clone(), provenance)]);

    while let Some((identity, export, provenance)) = queue.pop_front() {
        if space.contains_key(&export.name) {
            continue;
        }
        let Some(module) = state.get(&identity) else {
            continue;
        };

        for used in &export.uses {
            let step = format!("{} uses {used}", export.name);
            let mut next = provenance.clone();
            next.push(step);
            if let Some((supplier, supplied)) = supplier_of(state, module, used) {
                queue.push_back((supplier.identity.clone(), supplied.clone(), next));
            }
        }

        space.insert(
            export.name.clone(),
            SourcedPackage {
                package: export.name.clone(),
                version: export.version.clone(),
                exporter: identity,
                provenance,
            },
        );
    }
}

/// Module and export that supplies `package` to `module`
fn supplier_of<'a>(
    state: &'a ResolverState,
    module: &'a ModuleDescription,
    package: &str,
) -> Option<(&'a ModuleDescription, &'a PackageExport)> {
    if let Some(export) = module.export(package) {
        if module.import(package).is_none() {
            return Some((module, export));
        }
    }
    if let Some(wired) = module.wiring.get(package) {
        let supplier = state.get(wired)?;
        return supplier.export(package).map(|export| (supplier, export));
    }
    let import = module.import(package)?;
    state
        .candidates(&module.identity, import)
        .first()
        .map(|c| (c.module, c.export))
}

/// Two exporters of one package reachable from one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsesConflict {
    pub package: String,
    /// The package as used transitively by the candidate exporter
    pub candidate: SourcedPackage,
    /// The package as directly visible to the importing module
    pub visible: SourcedPackage,
}

impl UsesConflict {
    /// Two-line human-readable statement of the conflict
    #[must_use]
    pub fn statement(&self) -> String {
        format!("{}\nconflicts with {}", self.candidate, self.visible)
    }
}

impl fmt::Display for UsesConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.statement())
    }
}

/// Outcome of a uses analysis
///
/// The analysis is heuristic: finding nothing does not prove the wiring is
/// free of uses conflicts, so an empty result is reported as inconclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsesAnalysis {
    Conflicts(Vec<UsesConflict>),
    Inconclusive,
}

impl UsesAnalysis {
    #[must_use]
    pub fn is_inconclusive(&self) -> bool {
        matches!(self, Self::Inconclusive)
    }

    #[must_use]
    pub fn conflicts(&self) -> &[UsesConflict] {
        match self {
            Self::Conflicts(conflicts) => conflicts,
            Self::Inconclusive => &[],
        }
    }
}

/// Explains why an import could not be wired without a uses conflict
#[derive(Debug, Clone, Copy, Default)]
pub struct UsesAnalyzer;

impl UsesAnalyzer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Packages directly visible to `module`, ignoring `excluded`
    ///
    /// Covers the module's own exports and, for every other import, the
    /// wired exporter (or best candidate) together with its uses closure.
    #[must_use]
    pub fn visible_packages(
        &self,
        state: &ResolverState,
        module: &ModuleDescription,
        excluded: &str,
    ) -> PackageSpace {
        let mut space = PackageSpace::new();

        for export in &module.exports {
            if module.import(&export.name).is_none() {
                add_uses_closure(
                    state,
                    module,
                    export,
                    vec!["exported by the module itself".to_string()],
                    &mut space,
                );
            }
        }

        for import in module.imports.iter().filter(|i| i.name != excluded) {
            if let Some((supplier, export)) = supplier_of(state, module, &import.name) {
                add_uses_closure(
                    state,
                    supplier,
                    export,
                    vec!["imported directly".to_string()],
                    &mut space,
                );
            }
        }
        space
    }

    /// Analyze the failing import of `module`
    ///
    /// Candidates for the failing import are taken from resolved exporters,
    /// falling back to unresolved ones when no resolved exporter matches.
    /// Never mutates `state`.
    #[must_use]
    pub fn analyze(
        &self,
        state: &ResolverState,
        module: &ArtifactIdentity,
        failing_import: &PackageImport,
    ) -> UsesAnalysis {
        let Some(description) = state.get(module) else {
            return UsesAnalysis::Inconclusive;
        };

        let visible = self.visible_packages(state, description, &failing_import.name);

        let all = state.candidates(module, failing_import);
        let resolved: Vec<_> = all.iter().filter(|c| c.module.resolved).copied().collect();
        let candidates = if resolved.is_empty() { all } else { resolved };

        let mut conflicts: Vec<UsesConflict> = Vec::new();
        for candidate in candidates {
            let mut closure = PackageSpace::new();
            add_uses_closure(
                state,
                candidate.module,
                candidate.export,
                vec![format!("candidate for import {}", failing_import.name)],
                &mut closure,
            );

            for (package, used) in closure {
                let Some(seen) = visible.get(&package) else {
                    continue;
                };
                let duplicate = conflicts.iter().any(|c| {
                    c.package == package
                        && c.candidate.exporter == used.exporter
                        && c.visible.exporter == seen.exporter
                });
                if seen.exporter != used.exporter && !duplicate {
                    conflicts.push(UsesConflict {
                        package,
                        candidate: used,
                        visible: seen.clone(),
                    });
                }
            }
        }

        tracing::debug!(
            module = %module,
            import = %failing_import.name,
            conflicts = conflicts.len(),
            "uses analysis finished"
        );

        if conflicts.is_empty() {
            UsesAnalysis::Inconclusive
        } else {
            UsesAnalysis::Conflicts(conflicts)
        }
    }
}
