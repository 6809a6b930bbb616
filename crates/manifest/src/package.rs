//! Package import and export declarations

use mdk_types::{Version, VersionRange};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source label of imports declared directly in a manifest
pub const DIRECT_IMPORT_SOURCE: &str = "Import-Package";

/// A package made available to other modules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageExport {
    pub name: String,
    /// Defaults to the exporting module's version during normalization
    #[serde(default)]
    pub version: Version,
    /// Packages whose exporter must be shared with any importer of this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uses: Vec<String>,
}

impl PackageExport {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            uses: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_uses<I, S>(mut self, uses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uses = uses.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Display for PackageExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Whether an import must be wired for its module to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    #[default]
    Mandatory,
    Optional,
}

/// A package required from some other module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageImport {
    pub name: String,
    #[serde(default)]
    pub range: VersionRange,
    #[serde(default)]
    pub resolution: Resolution,
    /// Where the import came from, used when reporting merge conflicts
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    DIRECT_IMPORT_SOURCE.to_string()
}

impl PackageImport {
    /// A mandatory import declared directly in a manifest
    pub fn new(name: impl Into<String>, range: VersionRange) -> Self {
        Self {
            name: name.into(),
            range,
            resolution: Resolution::Mandatory,
            source: default_source(),
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.resolution = Resolution::Optional;
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.resolution == Resolution::Optional
    }

    /// Check if an export satisfies this import by name and version
    #[must_use]
    pub fn matches(&self, export: &PackageExport) -> bool {
        self.name == export.name && self.range.includes(&export.version)
    }
}

impl fmt::Display for PackageImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.range)?;
        if self.is_optional() {
            f.write_str(" (optional)")?;
        }
        Ok(())
    }
}

/// An import of every package a library exports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryImport {
    pub name: String,
    #[serde(default)]
    pub range: VersionRange,
    #[serde(default)]
    pub resolution: Resolution,
}

impl LibraryImport {
    pub fn new(name: impl Into<String>, range: VersionRange) -> Self {
        Self {
            name: name.into(),
            range,
            resolution: Resolution::Mandatory,
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.resolution = Resolution::Optional;
        self
    }

    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.resolution == Resolution::Optional
    }
}

impl fmt::Display for LibraryImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "library {} {}", self.name, self.range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_matches_export() {
        let import = PackageImport::new("net.a", "[1.0,2.0)".parse().unwrap());
        assert!(import.matches(&PackageExport::new("net.a", Version::new(1, 4, 0))));
        assert!(!import.matches(&PackageExport::new("net.a", Version::new(2, 0, 0))));
        assert!(!import.matches(&PackageExport::new("net.b", Version::new(1, 0, 0))));
    }

    #[test]
    fn test_import_display() {
        let import = PackageImport::new("net.a", "[1.0,2.0)".parse().unwrap()).optional();
        assert_eq!(import.to_string(), "net.a [1.0.0,2.0.0) (optional)");
    }
}
