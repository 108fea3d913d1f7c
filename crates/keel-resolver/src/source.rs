//! The catalog interface the solver pulls package metadata from

use indexmap::IndexMap;
use keel_semver::{Constraint, Version};

/// Error type returned by catalog implementations
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// One published version of a package with its dependency edges.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    pub version: Version,
    /// Required dependencies: package name to constraint
    pub dependencies: IndexMap<String, Constraint>,
    /// Optional dependencies: only constrained when the package is picked
    /// for another reason
    pub optional_dependencies: IndexMap<String, Constraint>,
}

impl PackageVersion {
    pub fn new(version: Version) -> PackageVersion {
        PackageVersion {
            version,
            dependencies: IndexMap::new(),
            optional_dependencies: IndexMap::new(),
        }
    }

    /// Add a required dependency edge
    pub fn with_dependency(mut self, package: impl Into<String>, constraint: Constraint) -> Self {
        self.dependencies.insert(package.into(), constraint);
        self
    }

    /// Add an optional dependency edge
    pub fn with_optional_dependency(
        mut self,
        package: impl Into<String>,
        constraint: Constraint,
    ) -> Self {
        self.optional_dependencies.insert(package.into(), constraint);
        self
    }
}

/// A catalog of package versions.
///
/// The solver treats every call as an atomic synchronous query returning a
/// fresh snapshot; only these calls may block. Implementations must be
/// deterministic for the solver output to be deterministic.
pub trait Source {
    /// All known versions of `package` with their dependencies.
    fn get_package_versions(&self, package: &str) -> Result<Vec<PackageVersion>, SourceError>;

    /// Choose one of `candidates` to try next. The candidates are sorted
    /// ascending and never empty; the returned version must be one of them.
    fn pick_version(&self, package: &str, candidates: &[Version]) -> Version;

    /// Hint that these packages will likely be queried soon. Implementations
    /// may warm caches in the background; the default does nothing, and
    /// correctness never depends on it.
    fn prefetch(&self, packages: &[String]) {
        let _ = packages;
    }
}

/// The newest release if any non-prerelease exists, else the newest
/// prerelease. Returns `None` only for an empty slice; `versions` must be
/// sorted ascending.
pub fn standard_version_priority(versions: &[Version]) -> Option<&Version> {
    versions
        .iter()
        .rev()
        .find(|v| !v.is_prerelease())
        .or_else(|| versions.last())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_priority_prefers_newest_release() {
        let versions = vec![v("1.0.0"), v("1.1.0"), v("2.0.0-rc.1")];
        assert_eq!(standard_version_priority(&versions), Some(&v("1.1.0")));
    }

    #[test]
    fn test_priority_falls_back_to_newest_prerelease() {
        let versions = vec![v("1.0.0-alpha"), v("1.0.0-beta")];
        assert_eq!(
            standard_version_priority(&versions),
            Some(&v("1.0.0-beta"))
        );
    }

    #[test]
    fn test_priority_empty() {
        assert_eq!(standard_version_priority(&[]), None);
    }
}
