//! A single continuous version range

use std::fmt;

use super::desugar::desugar_range;
use crate::version::{SemverError, Version};
use crate::Constraint;

/// A continuous range of versions with optional inclusive or exclusive
/// bounds. A missing bound means the range is open towards that side.
///
/// Range literals are lowered through [`desugar_range`] first, so only the
/// primitive comparators are handled here. The individual comparators of a
/// literal are not kept; the range stores the resulting intersection of all
/// of them, plus the original literal.
#[derive(Debug, Clone)]
pub(crate) struct VersionRange {
    pub(crate) lower: Option<Version>,
    pub(crate) upper: Option<Version>,
    pub(crate) lower_inclusive: bool,
    pub(crate) upper_inclusive: bool,

    pub(crate) raw: String,
}

impl VersionRange {
    /// The range containing every version
    pub(crate) fn any() -> VersionRange {
        VersionRange {
            lower: None,
            upper: None,
            lower_inclusive: false,
            upper_inclusive: false,
            raw: "*".to_string(),
        }
    }

    /// Parse one side of a constraint: a space-separated conjunction of
    /// primitives after de-sugaring.
    pub(crate) fn parse(literal: &str) -> Result<VersionRange, SemverError> {
        let desugared = desugar_range(literal)?;

        let mut result = VersionRange {
            raw: literal.to_string(),
            ..VersionRange::any()
        };
        for section in desugared.split(' ') {
            if section.is_empty() {
                continue;
            }
            let primitive_version = |v: &str| {
                Version::parse(v).map_err(|_| SemverError::InvalidPrimitive {
                    range: literal.to_string(),
                    primitive: section.to_string(),
                })
            };
            if let Some(rest) = section.strip_prefix(">=") {
                result = result.with_lower_bound(primitive_version(rest)?, true);
            } else if let Some(rest) = section.strip_prefix('>') {
                result = result.with_lower_bound(primitive_version(rest)?, false);
            } else if let Some(rest) = section.strip_prefix("<=") {
                result = result.with_upper_bound(primitive_version(rest)?, true);
            } else if let Some(rest) = section.strip_prefix('<') {
                result = result.with_upper_bound(primitive_version(rest)?, false);
            } else {
                // exact version, with or without the leading =
                let rest = section.strip_prefix('=').unwrap_or(section);
                let version = primitive_version(rest)?;
                result = result.with_lower_bound(version.clone(), true);
                result = result.with_upper_bound(version, true);
            }
        }
        Ok(result)
    }

    /// Tighten the lower bound: a larger lower bound wins, equal bounds
    /// combine inclusivity with AND.
    pub(crate) fn with_lower_bound(mut self, version: Version, inclusive: bool) -> VersionRange {
        match &self.lower {
            None => {
                self.lower = Some(version);
                self.lower_inclusive = inclusive;
            }
            Some(lower) => {
                if version > *lower {
                    self.lower = Some(version);
                    self.lower_inclusive = inclusive;
                } else if version == *lower {
                    self.lower_inclusive = self.lower_inclusive && inclusive;
                }
            }
        }
        self
    }

    /// Tighten the upper bound: a smaller upper bound wins, equal bounds
    /// combine inclusivity with AND.
    pub(crate) fn with_upper_bound(mut self, version: Version, inclusive: bool) -> VersionRange {
        match &self.upper {
            None => {
                self.upper = Some(version);
                self.upper_inclusive = inclusive;
            }
            Some(upper) => {
                if version < *upper {
                    self.upper = Some(version);
                    self.upper_inclusive = inclusive;
                } else if version == *upper {
                    self.upper_inclusive = self.upper_inclusive && inclusive;
                }
            }
        }
        self
    }

    /// A range is empty when its bounds cross, or meet without being
    /// inclusive on both sides.
    pub(crate) fn is_empty(&self) -> bool {
        if let (Some(lower), Some(upper)) = (&self.lower, &self.upper) {
            if lower > upper {
                return true;
            }
            if lower == upper && (!self.lower_inclusive || !self.upper_inclusive) {
                return true;
            }
        }
        false
    }

    pub(crate) fn intersect(&self, other: &VersionRange) -> VersionRange {
        let (lower, lower_inclusive) = match (&self.lower, &other.lower) {
            (None, _) => (other.lower.clone(), other.lower_inclusive),
            (_, None) => (self.lower.clone(), self.lower_inclusive),
            (Some(a), Some(b)) => {
                if a < b {
                    (other.lower.clone(), other.lower_inclusive)
                } else if a > b {
                    (self.lower.clone(), self.lower_inclusive)
                } else {
                    (self.lower.clone(), self.lower_inclusive && other.lower_inclusive)
                }
            }
        };

        let (upper, upper_inclusive) = match (&self.upper, &other.upper) {
            (None, _) => (other.upper.clone(), other.upper_inclusive),
            (_, None) => (self.upper.clone(), self.upper_inclusive),
            (Some(a), Some(b)) => {
                if a < b {
                    (self.upper.clone(), self.upper_inclusive)
                } else if a > b {
                    (other.upper.clone(), other.upper_inclusive)
                } else {
                    (self.upper.clone(), self.upper_inclusive && other.upper_inclusive)
                }
            }
        };

        VersionRange {
            lower,
            upper,
            lower_inclusive,
            upper_inclusive,
            raw: format!("{} {}", self.raw, other.raw).trim().to_string(),
        }
    }

    /// Whether `version` lies within this range.
    ///
    /// A prerelease version is only contained when one of the endpoints is a
    /// prerelease of the same release, so that `>=1.0.0` does not admit
    /// `2.0.0-alpha`.
    pub(crate) fn contains(&self, version: &Version) -> bool {
        if let Some(lower) = &self.lower {
            if self.lower_inclusive {
                if lower > version {
                    return false;
                }
            } else if lower >= version {
                return false;
            }
        }
        if let Some(upper) = &self.upper {
            if self.upper_inclusive {
                if upper < version {
                    return false;
                }
            } else if upper <= version {
                return false;
            }
        }
        if version.is_prerelease() {
            let matches_endpoint = |bound: &Option<Version>| match bound {
                Some(b) => b.is_prerelease() && b.is_same_release(version),
                None => false,
            };
            if !matches_endpoint(&self.lower) && !matches_endpoint(&self.upper) {
                return false;
            }
        }
        true
    }

    /// The complement of this range over the universe of versions.
    pub(crate) fn inverse(&self) -> Constraint {
        if self.lower.is_none() && self.upper.is_none() {
            return Constraint::empty();
        }
        let mut ranges = Vec::new();
        let mut raw_parts = Vec::new();
        if let Some(lower) = &self.lower {
            ranges.push(VersionRange {
                lower: None,
                upper: Some(lower.clone()),
                lower_inclusive: false,
                upper_inclusive: !self.lower_inclusive,
                raw: String::new(),
            });
            let op = if self.lower_inclusive { "<" } else { "<=" };
            raw_parts.push(format!("{op}{}", lower.raw_str()));
        }
        if let Some(upper) = &self.upper {
            ranges.push(VersionRange {
                lower: Some(upper.clone()),
                upper: None,
                lower_inclusive: !self.upper_inclusive,
                upper_inclusive: false,
                raw: String::new(),
            });
            let op = if self.upper_inclusive { ">" } else { ">=" };
            raw_parts.push(format!("{op}{}", upper.raw_str()));
        }
        Constraint::from_ranges(ranges, raw_parts.join(" || "))
    }
}

/// Structural equality over bounds and inclusivity; the raw literal is
/// cosmetic and ignored.
impl PartialEq for VersionRange {
    fn eq(&self, other: &Self) -> bool {
        self.lower == other.lower
            && self.upper == other.upper
            && (self.lower.is_none() || self.lower_inclusive == other.lower_inclusive)
            && (self.upper.is_none() || self.upper_inclusive == other.upper_inclusive)
    }
}

impl Eq for VersionRange {}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Shorthand for the any range
        let (Some(lower), Some(upper)) = (&self.lower, &self.upper) else {
            let mut parts = Vec::new();
            if let Some(lower) = &self.lower {
                let op = if self.lower_inclusive { ">=" } else { ">" };
                parts.push(format!("{op}{lower}"));
            }
            if let Some(upper) = &self.upper {
                let op = if self.upper_inclusive { "<=" } else { "<" };
                parts.push(format!("{op}{upper}"));
            }
            if parts.is_empty() {
                return write!(f, "*");
            }
            return write!(f, "{}", parts.join(" "));
        };

        if self.lower_inclusive {
            // Shorthand for an exact version
            if lower == upper {
                return write!(f, "{lower}");
            }

            if !self.upper_inclusive {
                // Shorthand for a caret range
                let next_caret = if lower.major() != 0 {
                    lower.bump_major()
                } else if lower.minor() != 0 {
                    lower.bump_minor()
                } else {
                    lower.bump_patch()
                };
                if *upper == next_caret {
                    return write!(f, "^{lower}");
                }

                // Shorthand for a tilde range
                let next_tilde = if lower.minor() != 0 {
                    lower.bump_minor()
                } else {
                    lower.bump_major()
                };
                if *upper == next_tilde {
                    return write!(f, "~{lower}");
                }
            }
        }

        let lower_op = if self.lower_inclusive { ">=" } else { ">" };
        let upper_op = if self.upper_inclusive { "<=" } else { "<" };
        write!(f, "{lower_op}{lower} {upper_op}{upper}")
    }
}
