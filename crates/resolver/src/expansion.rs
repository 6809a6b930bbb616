//! Expansion of library imports into package imports

use mdk_errors::{DeploymentError, Error};
use mdk_manifest::{
    LibraryDefinition, LibraryImport, LibraryPackage, Manifest, PackageExport, PackageImport,
    Resolution,
};
use mdk_types::{Version, VersionRange};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Maps package and library imports to a merged list of package imports
pub trait ImportExpander: Send + Sync {
    /// Expand `library_imports` and merge the result with `package_imports`
    ///
    /// # Errors
    ///
    /// Returns `DeploymentError::ImportMergeConflict` when two imports of a
    /// package cannot be merged and
    /// `DeploymentError::UnableToSatisfyLibraryDependencies` when a
    /// mandatory library is unknown.
    fn expand_imports(
        &self,
        package_imports: &[PackageImport],
        library_imports: &[LibraryImport],
    ) -> Result<Vec<PackageImport>, Error>;
}

/// A library together with the packages it offers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLibrary {
    pub name: String,
    pub version: Version,
    pub packages: Vec<LibraryPackage>,
}

impl ResolvedLibrary {
    pub fn new(name: impl Into<String>, version: Version, packages: Vec<LibraryPackage>) -> Self {
        Self {
            name: name.into(),
            version,
            packages,
        }
    }

    /// Combine a definition with the exports of its member modules
    ///
    /// Explicitly listed packages keep their declared range; member exports
    /// not listed are offered at exactly their exported version.
    pub fn from_definition<'a>(
        name: impl Into<String>,
        version: Version,
        definition: &LibraryDefinition,
        member_exports: impl IntoIterator<Item = &'a PackageExport>,
    ) -> Self {
        let mut packages = definition.packages.clone();
        for export in member_exports {
            if !packages.iter().any(|p| p.name == export.name) {
                packages.push(LibraryPackage {
                    name: export.name.clone(),
                    range: VersionRange::exact(export.version.clone()),
                });
            }
        }
        Self::new(name, version, packages)
    }

    /// Source label given to imports derived from this library
    #[must_use]
    pub fn source(&self) -> String {
        format!("library {} {}", self.name, self.version)
    }
}

/// Looks up library definitions by name and version range
pub trait LibraryProvider: Send + Sync {
    /// The highest library named `name` within `range`
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read. An unknown
    /// library is `Ok(None)`.
    fn find_library(
        &self,
        name: &str,
        range: &VersionRange,
    ) -> Result<Option<ResolvedLibrary>, Error>;
}

/// Merge `import` into `imports` by range intersection
///
/// # Errors
///
/// Returns `DeploymentError::ImportMergeConflict` naming the existing source
/// first when the ranges are disjoint.
pub fn merge_import(imports: &mut Vec<PackageImport>, import: PackageImport) -> Result<(), Error> {
    let Some(existing) = imports.iter_mut().find(|i| i.name == import.name) else {
        imports.push(import);
        return Ok(());
    };

    let merged = existing.range.intersect(&import.range);
    if merged.is_empty() {
        return Err(DeploymentError::ImportMergeConflict {
            package: import.name,
            first_source: existing.source.clone(),
            second_source: import.source,
        }
        .into());
    }
    existing.range = merged;
    if !import.is_optional() {
        existing.resolution = Resolution::Mandatory;
    }
    Ok(())
}

/// Expands library imports through a [`LibraryProvider`]
#[derive(Clone)]
pub struct LibraryImportExpander {
    provider: Arc<dyn LibraryProvider>,
}

impl LibraryImportExpander {
    pub fn new(provider: Arc<dyn LibraryProvider>) -> Self {
        Self { provider }
    }
}

impl std::fmt::Debug for LibraryImportExpander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryImportExpander").finish_non_exhaustive()
    }
}

impl ImportExpander for LibraryImportExpander {
    fn expand_imports(
        &self,
        package_imports: &[PackageImport],
        library_imports: &[LibraryImport],
    ) -> Result<Vec<PackageImport>, Error> {
        let mut imports = Vec::with_capacity(package_imports.len());
        for import in package_imports {
            merge_import(&mut imports, import.clone())?;
        }

        for library_import in library_imports {
            let Some(library) = self
                .provider
                .find_library(&library_import.name, &library_import.range)?
            else {
                if library_import.is_optional() {
                    tracing::debug!(library = %library_import, "optional library not found");
                    continue;
                }
                return Err(DeploymentError::UnableToSatisfyLibraryDependencies {
                    name: library_import.name.clone(),
                    range: library_import.range.to_string(),
                    description: format!(
                        "no library named {} in range {} is available",
                        library_import.name, library_import.range
                    ),
                }
                .into());
            };

            let source = library.source();
            tracing::debug!(
                library = %source,
                packages = library.packages.len(),
                "expanding library import"
            );
            for package in &library.packages {
                let mut import = PackageImport::new(package.name.clone(), package.range.clone())
                    .with_source(source.clone());
                if library_import.is_optional() {
                    import = import.optional();
                }
                merge_import(&mut imports, import)?;
            }
        }

        Ok(imports)
    }
}

/// Expand a group of manifests as one logical unit
///
/// All package and library imports of the group are merged together, so
/// imports of different members must agree. Each member then receives its
/// own imports, and those derived from its own libraries, at the ranges of
/// the merged unit. Library imports are cleared afterwards. Returns the
/// number of package imports in the merged unit.
///
/// # Errors
///
/// Propagates the errors of [`ImportExpander::expand_imports`]. Manifests
/// are left untouched on error.
pub fn expand_manifests(
    expander: &dyn ImportExpander,
    manifests: &mut [Manifest],
) -> Result<usize, Error> {
    let package_imports: Vec<PackageImport> = manifests
        .iter()
        .flat_map(|m| m.imports.iter().cloned())
        .collect();
    let library_imports: Vec<LibraryImport> = manifests
        .iter()
        .flat_map(|m| m.library_imports.iter().cloned())
        .collect();

    let merged = expander.expand_imports(&package_imports, &library_imports)?;

    let mut owned: Vec<BTreeSet<String>> = Vec::with_capacity(manifests.len());
    for manifest in manifests.iter() {
        let mut names: BTreeSet<String> = manifest.imports.iter().map(|i| i.name.clone()).collect();
        if !manifest.library_imports.is_empty() {
            names.extend(
                expander
                    .expand_imports(&[], &manifest.library_imports)?
                    .into_iter()
                    .map(|i| i.name),
            );
        }
        owned.push(names);
    }

    for (manifest, names) in manifests.iter_mut().zip(owned) {
        manifest.imports = merged
            .iter()
            .filter(|i| names.contains(&i.name))
            .cloned()
            .collect();
        manifest.library_imports.clear();
    }

    Ok(merged.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Libraries(HashMap<String, ResolvedLibrary>);

    impl LibraryProvider for Libraries {
        fn find_library(
            &self,
            name: &str,
            range: &VersionRange,
        ) -> Result<Option<ResolvedLibrary>, Error> {
            Ok(self
                .0
                .get(name)
                .filter(|l| range.includes(&l.version))
                .cloned())
        }
    }

    fn range(s: &str) -> VersionRange {
        s.parse().unwrap()
    }

    fn expander() -> LibraryImportExpander {
        let util = ResolvedLibrary::new(
            "util",
            Version::new(1, 0, 0),
            vec![LibraryPackage {
                name: "p1".into(),
                range: range("[1.0,2.0)"),
            }],
        );
        LibraryImportExpander::new(Arc::new(Libraries(HashMap::from([(
            "util".to_string(),
            util,
        )]))))
    }

    #[test]
    fn test_optional_library_import_is_skipped_when_missing() {
        let imports = expander()
            .expand_imports(&[], &[LibraryImport::new("absent", range("1.0")).optional()])
            .unwrap();
        assert!(imports.is_empty());
    }

    #[test]
    fn test_missing_library_is_unsatisfied() {
        let err = expander()
            .expand_imports(&[], &[LibraryImport::new("absent", range("1.0"))])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Deployment(DeploymentError::UnableToSatisfyLibraryDependencies { .. })
        ));
    }

    #[test]
    fn test_conflict_names_both_sources() {
        let err = expander()
            .expand_imports(
                &[PackageImport::new("p1", range("[3.0,4.0)"))],
                &[LibraryImport::new("util", range("1.0"))],
            )
            .unwrap_err();
        match err {
            Error::Deployment(DeploymentError::ImportMergeConflict {
                package,
                first_source,
                second_source,
            }) => {
                assert_eq!(package, "p1");
                assert_eq!(first_source, "Import-Package");
                assert_eq!(second_source, "library util 1.0.0");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_optional_library_does_not_weaken_mandatory_import() {
        let imports = expander()
            .expand_imports(
                &[PackageImport::new("p1", range("1.0"))],
                &[LibraryImport::new("util", range("1.0")).optional()],
            )
            .unwrap();
        assert_eq!(imports.len(), 1);
        assert!(!imports[0].is_optional());
        assert_eq!(imports[0].range, range("[1.0,2.0)"));
    }

    #[test]
    fn test_member_exports_offered_at_exact_version() {
        let definition = LibraryDefinition::default();
        let exports = [PackageExport::new("p2", Version::new(1, 0, 0))];
        let library =
            ResolvedLibrary::from_definition("util", Version::new(1, 0, 0), &definition, &exports);
        assert_eq!(library.packages[0].range, range("[1.0,1.0]"));
    }
}
