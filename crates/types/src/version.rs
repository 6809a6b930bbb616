//! Version and version range parsing
//!
//! Versions have four parts, `major.minor.micro.qualifier`, where missing
//! numeric parts default to zero and the qualifier defaults to empty:
//! - `1` is `1.0.0`
//! - `1.2.3.RELEASE` carries the qualifier `RELEASE`
//!
//! Ranges use interval notation:
//! - `[1.0,2.0)` - at least 1.0.0, below 2.0.0
//! - `[1.5,1.5]` - exactly 1.5.0
//! - `1.0` - at least 1.0.0 with no upper bound
//! - `(1.0,)` - above 1.0.0 with no upper bound

use mdk_errors::VersionError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A totally ordered four part version
///
/// Ordering compares the numeric parts first and then the qualifier as a
/// string, so an empty qualifier sorts before any other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
    pub qualifier: String,
}

impl Version {
    /// Create a version without a qualifier
    #[must_use]
    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    /// Attach a qualifier
    #[must_use]
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = qualifier.into();
        self
    }

    /// The lowest possible version, `0.0.0`
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a version string
    ///
    /// # Errors
    ///
    /// Returns `VersionError::InvalidVersion` if a numeric part is not a
    /// number, if there are too many parts, or if the qualifier contains
    /// characters other than ASCII alphanumerics, `-` and `_`.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let input = s.trim();
        if input.is_empty() {
            return Err(VersionError::InvalidVersion {
                input: s.to_string(),
            });
        }

        let invalid = || VersionError::InvalidVersion {
            input: s.to_string(),
        };

        let mut parts = input.splitn(4, '.');
        let mut numeric = [0u32; 3];
        for (index, slot) in numeric.iter_mut().enumerate() {
            match parts.next() {
                Some(part) => *slot = part.parse().map_err(|_| invalid())?,
                None if index == 0 => return Err(invalid()),
                None => break,
            }
        }

        let qualifier = parts.next().unwrap_or_default();
        if !qualifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(invalid());
        }

        Ok(Self {
            major: numeric[0],
            minor: numeric[1],
            micro: numeric[2],
            qualifier: qualifier.to_string(),
        })
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

/// An interval of versions with an optional upper bound
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRange {
    floor: Version,
    floor_inclusive: bool,
    ceiling: Option<Version>,
    ceiling_inclusive: bool,
}

impl VersionRange {
    /// Create a range from its bounds
    #[must_use]
    pub fn new(
        floor: Version,
        floor_inclusive: bool,
        ceiling: Option<Version>,
        ceiling_inclusive: bool,
    ) -> Self {
        // an open ceiling carries no inclusivity
        let ceiling_inclusive = ceiling.is_some() && ceiling_inclusive;
        Self {
            floor,
            floor_inclusive,
            ceiling,
            ceiling_inclusive,
        }
    }

    /// Range matching every version
    #[must_use]
    pub fn unbounded() -> Self {
        Self::at_least(Version::empty())
    }

    /// Range matching the given version and everything above it
    #[must_use]
    pub fn at_least(floor: Version) -> Self {
        Self::new(floor, true, None, false)
    }

    /// Range matching exactly one version
    #[must_use]
    pub fn exact(version: Version) -> Self {
        Self::new(version.clone(), true, Some(version), true)
    }

    /// Lower bound
    #[must_use]
    pub fn floor(&self) -> &Version {
        &self.floor
    }

    /// Upper bound, `None` when unbounded
    #[must_use]
    pub fn ceiling(&self) -> Option<&Version> {
        self.ceiling.as_ref()
    }

    /// Check if a version lies within the range
    #[must_use]
    pub fn includes(&self, version: &Version) -> bool {
        let above_floor = match version.cmp(&self.floor) {
            Ordering::Greater => true,
            Ordering::Equal => self.floor_inclusive,
            Ordering::Less => false,
        };
        let below_ceiling = match &self.ceiling {
            None => true,
            Some(ceiling) => match version.cmp(ceiling) {
                Ordering::Less => true,
                Ordering::Equal => self.ceiling_inclusive,
                Ordering::Greater => false,
            },
        };
        above_floor && below_ceiling
    }

    /// Check if no version can satisfy the range
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.ceiling {
            None => false,
            Some(ceiling) => match self.floor.cmp(ceiling) {
                Ordering::Greater => true,
                Ordering::Equal => !(self.floor_inclusive && self.ceiling_inclusive),
                Ordering::Less => false,
            },
        }
    }

    /// Check if the range matches every version
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.ceiling.is_none() && self.floor == Version::empty() && self.floor_inclusive
    }

    /// Check if the range matches exactly one version
    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.ceiling.as_ref() == Some(&self.floor) && self.floor_inclusive && self.ceiling_inclusive
    }

    /// Intersect two ranges
    ///
    /// The result may be empty; callers check [`VersionRange::is_empty`].
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        let (floor, floor_inclusive) = match self.floor.cmp(&other.floor) {
            Ordering::Greater => (self.floor.clone(), self.floor_inclusive),
            Ordering::Less => (other.floor.clone(), other.floor_inclusive),
            Ordering::Equal => (
                self.floor.clone(),
                self.floor_inclusive && other.floor_inclusive,
            ),
        };

        let (ceiling, ceiling_inclusive) = match (&self.ceiling, &other.ceiling) {
            (None, None) => (None, false),
            (Some(c), None) => (Some(c.clone()), self.ceiling_inclusive),
            (None, Some(c)) => (Some(c.clone()), other.ceiling_inclusive),
            (Some(a), Some(b)) => match a.cmp(b) {
                Ordering::Less => (Some(a.clone()), self.ceiling_inclusive),
                Ordering::Greater => (Some(b.clone()), other.ceiling_inclusive),
                Ordering::Equal => (
                    Some(a.clone()),
                    self.ceiling_inclusive && other.ceiling_inclusive,
                ),
            },
        };

        Self::new(floor, floor_inclusive, ceiling, ceiling_inclusive)
    }

    /// Parse a range string
    ///
    /// # Errors
    ///
    /// Returns `VersionError::InvalidRange` when the interval brackets or
    /// separator are malformed, or a bound is not a valid version.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let input = s.trim();
        let invalid = || VersionError::InvalidRange {
            input: s.to_string(),
        };

        let Some(first) = input.chars().next() else {
            return Err(invalid());
        };

        if first != '[' && first != '(' {
            let floor = Version::parse(input).map_err(|_| invalid())?;
            return Ok(Self::at_least(floor));
        }

        let last = input.chars().last().ok_or_else(invalid)?;
        if input.len() < 2 || (last != ']' && last != ')') {
            return Err(invalid());
        }

        let body = &input[1..input.len() - 1];
        let (low, high) = body.split_once(',').ok_or_else(invalid)?;
        let floor = Version::parse(low).map_err(|_| invalid())?;
        let ceiling = if high.trim().is_empty() {
            None
        } else {
            Some(Version::parse(high).map_err(|_| invalid())?)
        };

        Ok(Self::new(floor, first == '[', ceiling, last == ']'))
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionRange {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VersionRange> for String {
    fn from(value: VersionRange) -> Self {
        value.to_string()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ceiling {
            None if self.floor_inclusive => write!(f, "{}", self.floor),
            None => write!(f, "({},)", self.floor),
            Some(ceiling) => write!(
                f,
                "{}{},{}{}",
                if self.floor_inclusive { '[' } else { '(' },
                self.floor,
                ceiling,
                if self.ceiling_inclusive { ']' } else { ')' }
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_version_parse_defaults() {
        assert_eq!(v("1"), Version::new(1, 0, 0));
        assert_eq!(v("1.2"), Version::new(1, 2, 0));
        assert_eq!(v("1.2.3.RELEASE").qualifier, "RELEASE");
        assert_eq!(v("1.2.3.RELEASE").to_string(), "1.2.3.RELEASE");
    }

    #[test]
    fn test_version_parse_rejects_garbage() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("a.b").is_err());
        assert!(Version::parse("1.2.3.bad qualifier").is_err());
    }

    #[test]
    fn test_version_ordering() {
        assert!(v("1.0.0") < v("1.0.0.a"));
        assert!(v("1.0.0.a") < v("1.0.0.b"));
        assert!(v("1.9.9") < v("1.10.0"));
        assert!(v("2") > v("1.99.99.zz"));
    }

    #[test]
    fn test_range_parse_and_includes() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        assert!(!range.includes(&v("0.9.9")));
        assert!(range.includes(&v("1.0.0")));
        assert!(range.includes(&v("1.9.9.zzz")));
        assert!(!range.includes(&v("2.0.0")));

        let open = VersionRange::parse("(1.0,2.0]").unwrap();
        assert!(!open.includes(&v("1.0.0")));
        assert!(open.includes(&v("2.0.0")));
    }

    #[test]
    fn test_bare_range_is_minimum() {
        let range = VersionRange::parse("1.5").unwrap();
        assert!(range.includes(&v("1.5.0")));
        assert!(range.includes(&v("99.0.0")));
        assert!(!range.includes(&v("1.4.9")));
        assert_eq!(range.to_string(), "1.5.0");
    }

    #[test]
    fn test_range_intersection() {
        let wide = VersionRange::parse("[1.0,2.0)").unwrap();
        let exact = VersionRange::parse("[1.5,1.5]").unwrap();
        let merged = wide.intersect(&exact);
        assert_eq!(merged, exact);
        assert!(merged.is_exact());

        let disjoint = VersionRange::parse("[2.0,3.0)").unwrap();
        assert!(wide.intersect(&disjoint).is_empty());
    }

    #[test]
    fn test_range_rejects_malformed() {
        assert!(VersionRange::parse("[1.0,2.0").is_err());
        assert!(VersionRange::parse("[1.0;2.0]").is_err());
        assert!(VersionRange::parse("").is_err());
    }

    #[test]
    fn test_unbounded() {
        let range = VersionRange::unbounded();
        assert!(range.is_unbounded());
        assert!(range.includes(&Version::empty()));
        assert_eq!(range.to_string(), "0.0.0");
    }
}
