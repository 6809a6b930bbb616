//! Resolver view of the modules known to the kernel

use mdk_manifest::{LibraryImport, Manifest, PackageExport, PackageImport};
use mdk_types::ArtifactIdentity;
use std::collections::BTreeMap;

/// Package name to exporting module
pub type Wiring = BTreeMap<String, ArtifactIdentity>;

/// What the resolver knows about one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescription {
    pub identity: ArtifactIdentity,
    pub exports: Vec<PackageExport>,
    pub imports: Vec<PackageImport>,
    /// Library imports not yet expanded into package imports
    pub library_imports: Vec<LibraryImport>,
    pub resolved: bool,
    /// Exporter chosen for each wired import, empty until resolved
    pub wiring: Wiring,
}

impl ModuleDescription {
    /// Describe an unresolved module from its manifest
    #[must_use]
    pub fn from_manifest(identity: ArtifactIdentity, manifest: &Manifest) -> Self {
        Self {
            identity,
            exports: manifest.exports.clone(),
            imports: manifest.imports.clone(),
            library_imports: manifest.library_imports.clone(),
            resolved: false,
            wiring: Wiring::new(),
        }
    }

    #[must_use]
    pub fn export(&self, package: &str) -> Option<&PackageExport> {
        self.exports.iter().find(|e| e.name == package)
    }

    #[must_use]
    pub fn import(&self, package: &str) -> Option<&PackageImport> {
        self.imports.iter().find(|i| i.name == package)
    }
}

/// An exporter able to satisfy an import
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub module: &'a ModuleDescription,
    pub export: &'a PackageExport,
}

/// The set of modules the resolver wires against
#[derive(Debug, Clone, Default)]
pub struct ResolverState {
    modules: BTreeMap<ArtifactIdentity, ModuleDescription>,
}

impl ResolverState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a module
    pub fn insert(&mut self, module: ModuleDescription) {
        self.modules.insert(module.identity.clone(), module);
    }

    pub fn remove(&mut self, identity: &ArtifactIdentity) -> Option<ModuleDescription> {
        self.modules.remove(identity)
    }

    #[must_use]
    pub fn get(&self, identity: &ArtifactIdentity) -> Option<&ModuleDescription> {
        self.modules.get(identity)
    }

    pub fn get_mut(&mut self, identity: &ArtifactIdentity) -> Option<&mut ModuleDescription> {
        self.modules.get_mut(identity)
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleDescription> {
        self.modules.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Record a successful resolution
    pub fn apply(&mut self, wirings: BTreeMap<ArtifactIdentity, Wiring>) {
        for (identity, wiring) in wirings {
            if let Some(module) = self.modules.get_mut(&identity) {
                module.wiring = wiring;
                module.resolved = true;
            }
        }
    }

    /// Mark a module unresolved and drop its wiring
    pub fn unresolve(&mut self, identity: &ArtifactIdentity) {
        if let Some(module) = self.modules.get_mut(identity) {
            module.resolved = false;
            module.wiring.clear();
        }
    }

    /// Resolved modules wired to any of the given exporters
    #[must_use]
    pub fn dependents_of(&self, exporters: &[ArtifactIdentity]) -> Vec<ArtifactIdentity> {
        self.modules
            .values()
            .filter(|m| m.resolved && m.wiring.values().any(|e| exporters.contains(e)))
            .map(|m| m.identity.clone())
            .collect()
    }

    /// Exporters visible to `importer` whose export satisfies `import`
    ///
    /// Ordered by preference: resolved exporters first, then the highest
    /// package version, then identity order for a stable result.
    #[must_use]
    pub fn candidates(
        &self,
        importer: &ArtifactIdentity,
        import: &PackageImport,
    ) -> Vec<Candidate<'_>> {
        let mut candidates: Vec<Candidate<'_>> = self
            .modules
            .values()
            .filter(|m| importer.can_see(&m.identity))
            .filter_map(|m| {
                m.export(&import.name)
                    .filter(|e| import.range.includes(&e.version))
                    .map(|export| Candidate { module: m, export })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.module
                .resolved
                .cmp(&a.module.resolved)
                .then_with(|| b.export.version.cmp(&a.export.version))
                .then_with(|| a.module.identity.cmp(&b.module.identity))
        });
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdk_types::{ArtifactType, Version, VersionRange};

    fn module(name: &str, version: Version, exports: &[(&str, Version)]) -> ModuleDescription {
        ModuleDescription {
            identity: ArtifactIdentity::new(ArtifactType::Module, name, version),
            exports: exports
                .iter()
                .map(|(n, v)| PackageExport::new(*n, v.clone()))
                .collect(),
            imports: Vec::new(),
            library_imports: Vec::new(),
            resolved: false,
            wiring: Wiring::new(),
        }
    }

    #[test]
    fn test_candidate_preference() {
        let mut state = ResolverState::new();
        state.insert(module("a1", Version::new(1, 0, 0), &[("net.a", Version::new(1, 0, 0))]));
        state.insert(module("a2", Version::new(2, 0, 0), &[("net.a", Version::new(2, 0, 0))]));
        let mut old = module("a0", Version::new(0, 9, 0), &[("net.a", Version::new(1, 5, 0))]);
        old.resolved = true;
        state.insert(old);

        let importer = ArtifactIdentity::new(ArtifactType::Module, "x", Version::new(1, 0, 0));
        let import = PackageImport::new("net.a", VersionRange::at_least(Version::new(1, 0, 0)));
        let names: Vec<_> = state
            .candidates(&importer, &import)
            .iter()
            .map(|c| c.module.identity.name().to_string())
            .collect();
        assert_eq!(names, vec!["a0", "a2", "a1"]);
    }

    #[test]
    fn test_scoped_exporters_hidden_from_unscoped_importers() {
        let mut state = ResolverState::new();
        let mut scoped = module("inner", Version::new(1, 0, 0), &[("p", Version::new(1, 0, 0))]);
        scoped.identity = scoped.identity.scoped(Some("app".into()));
        state.insert(scoped);

        let outsider = ArtifactIdentity::new(ArtifactType::Module, "x", Version::new(1, 0, 0));
        let insider = outsider.scoped(Some("app".into()));
        let import = PackageImport::new("p", VersionRange::unbounded());
        assert!(state.candidates(&outsider, &import).is_empty());
        assert_eq!(state.candidates(&insider, &import).len(), 1);
    }
}
