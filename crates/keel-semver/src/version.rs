//! Version parsing and comparison

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

/// Error type for version and constraint parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemverError {
    #[error("invalid version string \"{0}\"")]
    InvalidVersion(String),
    #[error("invalid comparator \"{0}\"")]
    InvalidComparator(String),
    #[error("invalid primitive \"{primitive}\" in range \"{range}\"")]
    InvalidPrimitive { range: String, primitive: String },
}

lazy_static! {
    static ref VERSION_RE: Regex = Regex::new(
        r"^v?([0-9]+)(?:\.([0-9]+))?(?:\.([0-9]+))?(?:-([0-9A-Za-z\-]+(?:\.[0-9A-Za-z\-]+)*))?(?:\+([0-9A-Za-z\-]+(?:\.[0-9A-Za-z\-]+)*))?$"
    ).unwrap();
}

/// A parsed semantic version.
///
/// Build metadata is kept for display and `raw_str` but takes no part in
/// ordering or equality. The literal the version was parsed from is
/// preserved verbatim.
#[derive(Debug, Clone)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    pre: Vec<String>,
    build: Vec<String>,

    raw: String,
}

impl Version {
    /// Parse a version of the form `v?MAJOR(.MINOR(.PATCH))?(-PRE)?(+BUILD)?`.
    /// Omitted fields default to 0.
    pub fn parse(v: &str) -> Result<Version, SemverError> {
        let captures = VERSION_RE
            .captures(v)
            .ok_or_else(|| SemverError::InvalidVersion(v.to_string()))?;

        let number = |i: usize| -> Result<u64, SemverError> {
            match captures.get(i) {
                // The regex only lets digits through, but a component can
                // still overflow u64
                Some(m) => m
                    .as_str()
                    .parse()
                    .map_err(|_| SemverError::InvalidVersion(v.to_string())),
                None => Ok(0),
            }
        };
        let identifiers = |i: usize| -> Vec<String> {
            captures
                .get(i)
                .map(|m| m.as_str().split('.').map(str::to_string).collect())
                .unwrap_or_default()
        };

        Ok(Version {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            pre: identifiers(4),
            build: identifiers(5),
            raw: v.to_string(),
        })
    }

    pub(crate) fn new(major: u64, minor: u64, patch: u64) -> Version {
        Version {
            major,
            minor,
            patch,
            pre: Vec::new(),
            build: Vec::new(),
            raw: format!("{}.{}.{}", major, minor, patch),
        }
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// Prerelease identifiers, empty for a release version
    pub fn pre(&self) -> &[String] {
        &self.pre
    }

    /// Build metadata identifiers
    pub fn build(&self) -> &[String] {
        &self.build
    }

    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// The literal this version was parsed from
    pub fn raw_str(&self) -> &str {
        &self.raw
    }

    /// Whether both versions refer to the same `major.minor.patch` release,
    /// regardless of prerelease identifiers
    pub(crate) fn is_same_release(&self, other: &Version) -> bool {
        self.major == other.major && self.minor == other.minor && self.patch == other.patch
    }

    pub(crate) fn bump_major(&self) -> Version {
        Version::new(self.major + 1, 0, 0)
    }

    pub(crate) fn bump_minor(&self) -> Version {
        Version::new(self.major, self.minor + 1, 0)
    }

    pub(crate) fn bump_patch(&self) -> Version {
        Version::new(self.major, self.minor, self.patch + 1)
    }

    /// The earliest release strictly above this version: the release a
    /// prerelease precedes, or the next patch of a release.
    pub(crate) fn next_patch(&self) -> Version {
        if self.is_prerelease() {
            Version::new(self.major, self.minor, self.patch)
        } else {
            self.bump_patch()
        }
    }

    /// The `X.Y.Z-0` version that precedes every prerelease of this release
    pub(crate) fn first_prerelease(&self) -> Version {
        Version {
            major: self.major,
            minor: self.minor,
            patch: self.patch,
            pre: vec!["0".to_string()],
            build: Vec::new(),
            raw: format!("{}.{}.{}-0", self.major, self.minor, self.patch),
        }
    }
}

fn compare_identifiers(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        // numeric identifiers order before alphanumeric ones
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.patch.cmp(&other.patch))
            // a release orders after any prerelease of the same triple
            .then_with(|| other.is_prerelease().cmp(&self.is_prerelease()))
            .then_with(|| {
                for (a, b) in self.pre.iter().zip(other.pre.iter()) {
                    match compare_identifiers(a, b) {
                        Ordering::Equal => continue,
                        ord => return ord,
                    }
                }
                self.pre.len().cmp(&other.pre.len())
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // build metadata is excluded from equality, so it must not be hashed
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.pre.hash(state);
    }
}

impl FromStr for Version {
    type Err = SemverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre.join("."))?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", self.build.join("."))?;
        }
        Ok(())
    }
}
