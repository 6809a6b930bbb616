#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Artifact descriptors and module manifests for mdk
//!
//! An artifact is described by a TOML document. Every descriptor names the
//! artifact type, name and version; the remaining sections depend on the
//! type:
//!
//! ```toml
//! type = "module"
//! name = "shop.web"
//! version = "1.0.0"
//!
//! [manifest.headers]
//! "Web-ContextPath" = "/shop"
//!
//! [[manifest.exports]]
//! name = "shop.api"
//! uses = ["net.a"]
//!
//! [[manifest.imports]]
//! name = "net.a"
//! range = "[1.0,2.0)"
//!
//! [[manifest.library_imports]]
//! name = "util"
//! range = "[1.0,2.0)"
//! ```
//!
//! Plans carry a `[plan]` table with child specifications, configurations a
//! `[properties]` table and libraries a `[library]` table.

mod descriptor;
mod package;

pub use descriptor::{
    ArtifactDescriptor, ArtifactSpecification, LibraryDefinition, LibraryModule, LibraryPackage,
    PlanDescriptor, Provisioning,
};
pub use package::{
    LibraryImport, PackageExport, PackageImport, Resolution, DIRECT_IMPORT_SOURCE,
};

use mdk_errors::{DeploymentError, Error, ManifestError};
use mdk_types::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Header naming the module type explicitly
pub const MODULE_TYPE_HEADER: &str = "Module-Type";

/// Header whose presence marks a web module
pub const WEB_CONTEXT_PATH_HEADER: &str = "Web-ContextPath";

/// Structured module manifest
///
/// Mutated by the install pipeline before resolution and read-only after.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<PackageExport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<PackageImport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub library_imports: Vec<LibraryImport>,
}

impl Manifest {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn export(&self, package: &str) -> Option<&PackageExport> {
        self.exports.iter().find(|e| e.name == package)
    }

    #[must_use]
    pub fn import(&self, package: &str) -> Option<&PackageImport> {
        self.imports.iter().find(|i| i.name == package)
    }

    /// Normalize declarations before expansion and resolution
    ///
    /// Exports without a version take the module version, duplicate exports
    /// are dropped and duplicate imports of one package are merged by range
    /// intersection. Returns a description of every change made.
    ///
    /// # Errors
    ///
    /// Returns `DeploymentError::ImportMergeConflict` when two imports of one
    /// package have disjoint ranges.
    pub fn normalize(&mut self, module_version: &Version) -> Result<Vec<String>, Error> {
        let mut changes = Vec::new();

        for export in &mut self.exports {
            if export.version == Version::empty() && *module_version != Version::empty() {
                export.version = module_version.clone();
                changes.push(format!(
                    "export {} defaulted to version {module_version}",
                    export.name
                ));
            }
        }

        let mut exports: Vec<PackageExport> = Vec::with_capacity(self.exports.len());
        for export in self.exports.drain(..) {
            if exports.contains(&export) {
                changes.push(format!("duplicate export {export} removed"));
            } else {
                exports.push(export);
            }
        }
        self.exports = exports;

        let mut imports: Vec<PackageImport> = Vec::with_capacity(self.imports.len());
        for import in self.imports.drain(..) {
            if let Some(existing) = imports.iter_mut().find(|i| i.name == import.name) {
                let merged = existing.range.intersect(&import.range);
                if merged.is_empty() {
                    return Err(DeploymentError::ImportMergeConflict {
                        package: import.name,
                        first_source: existing.source.clone(),
                        second_source: import.source,
                    }
                    .into());
                }
                changes.push(format!(
                    "duplicate import {} merged to {merged}",
                    import.name
                ));
                existing.range = merged;
                if !import.is_optional() {
                    existing.resolution = Resolution::Mandatory;
                }
            } else {
                imports.push(import);
            }
        }
        self.imports = imports;

        Ok(changes)
    }

    /// Parse a manifest from a TOML string
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::Parse` if the content is not a valid manifest.
    pub fn from_toml(content: &str) -> Result<Self, Error> {
        toml::from_str(content).map_err(|e| {
            ManifestError::Parse {
                path: "<inline>".to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdk_types::VersionRange;

    fn range(s: &str) -> VersionRange {
        s.parse().unwrap()
    }

    #[test]
    fn test_normalize_defaults_and_dedups() {
        let mut manifest = Manifest {
            exports: vec![
                PackageExport::new("p1", Version::empty()),
                PackageExport::new("p1", Version::empty()),
            ],
            imports: vec![
                PackageImport::new("net.a", range("[1.0,3.0)")),
                PackageImport::new("net.a", range("[2.0,4.0)")).optional(),
            ],
            ..Manifest::default()
        };

        let changes = manifest.normalize(&Version::new(1, 2, 0)).unwrap();
        assert_eq!(changes.len(), 4);
        assert_eq!(manifest.exports.len(), 1);
        assert_eq!(manifest.exports[0].version, Version::new(1, 2, 0));
        assert_eq!(manifest.imports.len(), 1);
        assert_eq!(manifest.imports[0].range, range("[2.0,3.0)"));
        assert!(!manifest.imports[0].is_optional());
    }

    #[test]
    fn test_normalize_rejects_disjoint_imports() {
        let mut manifest = Manifest {
            imports: vec![
                PackageImport::new("net.a", range("[1.0,2.0)")),
                PackageImport::new("net.a", range("[2.0,3.0)")),
            ],
            ..Manifest::default()
        };
        let err = manifest.normalize(&Version::new(1, 0, 0)).unwrap_err();
        assert!(matches!(
            err,
            Error::Deployment(DeploymentError::ImportMergeConflict { .. })
        ));
    }

    #[test]
    fn test_manifest_from_toml() {
        let manifest = Manifest::from_toml(
            r#"
[headers]
"Web-ContextPath" = "/shop"

[[exports]]
name = "shop.api"
version = "1.0"
uses = ["net.a"]

[[imports]]
name = "net.a"
range = "[1.0,2.0)"
resolution = "optional"
"#,
        )
        .unwrap();

        assert_eq!(manifest.header(WEB_CONTEXT_PATH_HEADER), Some("/shop"));
        assert_eq!(manifest.export("shop.api").unwrap().uses, vec!["net.a"]);
        let import = manifest.import("net.a").unwrap();
        assert!(import.is_optional());
        assert_eq!(import.source, DIRECT_IMPORT_SOURCE);
    }
}
