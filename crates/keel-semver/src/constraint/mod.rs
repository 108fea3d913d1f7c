//! Canonical version constraints
//!
//! A [`Constraint`] is a disjoint union of version ranges, kept canonical:
//! no two ranges overlap or touch, and ranges are sorted ascending by lower
//! bound. Ranges anchored at prerelease versions are split off and tracked
//! separately so that the prerelease containment policy survives merging.

mod desugar;
mod range;

use std::fmt;

use crate::version::{SemverError, Version};
use self::range::VersionRange;

/// A canonical, disjoint union of version ranges.
///
/// The empty constraint matches no version at all; [`Constraint::any`]
/// matches every version. Equality is structural on the canonical form.
#[derive(Debug, Clone)]
pub struct Constraint {
    ranges: Vec<VersionRange>,

    raw: String,
}

impl Constraint {
    /// Parse a constraint: range literals separated by `||`.
    pub fn parse(c: &str) -> Result<Constraint, SemverError> {
        let mut ranges = Vec::new();
        for literal in c.split("||") {
            let literal = literal.trim();
            if literal.is_empty() {
                continue;
            }
            ranges.push(VersionRange::parse(literal)?);
        }
        Ok(Constraint {
            ranges,
            raw: c.to_string(),
        }
        .canonical())
    }

    /// The constraint matching every version
    pub fn any() -> Constraint {
        Constraint {
            ranges: vec![VersionRange::any()],
            raw: "*".to_string(),
        }
    }

    /// The constraint matching no version
    pub fn empty() -> Constraint {
        Constraint {
            ranges: Vec::new(),
            raw: String::new(),
        }
    }

    /// The constraint matching exactly `version`
    pub fn exact(version: &Version) -> Constraint {
        let range = VersionRange {
            lower: Some(version.clone()),
            upper: Some(version.clone()),
            lower_inclusive: true,
            upper_inclusive: true,
            raw: version.raw_str().to_string(),
        };
        Self::from_ranges(vec![range], version.raw_str().to_string())
    }

    /// The minimal constraint that matches exactly `versions` out of
    /// `all_versions`: a left-open head before the first known version, a
    /// half-open interval up to the next known version for each selected
    /// one, and a right-open tail after the last.
    ///
    /// Both slices must be sorted ascending and `versions` must be a subset
    /// of `all_versions`.
    pub fn from_version_subset(versions: &[Version], all_versions: &[Version]) -> Constraint {
        let mut ranges = Vec::new();
        let mut i = 0;
        for version in versions {
            while i < all_versions.len() && all_versions[i] != *version {
                i += 1;
            }
            if i == all_versions.len() {
                panic!("version {version} is not part of the full version list");
            }

            if i == 0 {
                ranges.push(VersionRange {
                    lower: None,
                    upper: Some(all_versions[i].clone()),
                    lower_inclusive: false,
                    upper_inclusive: true,
                    raw: String::new(),
                });
            }
            if i < all_versions.len() - 1 {
                ranges.push(VersionRange {
                    lower: Some(all_versions[i].clone()),
                    upper: Some(all_versions[i + 1].clone()),
                    lower_inclusive: true,
                    upper_inclusive: false,
                    raw: String::new(),
                });
            } else {
                ranges.push(VersionRange {
                    lower: Some(all_versions[i].clone()),
                    upper: None,
                    lower_inclusive: true,
                    upper_inclusive: false,
                    raw: String::new(),
                });
            }
        }

        let mut constraint = Constraint {
            ranges,
            raw: String::new(),
        }
        .canonical();
        constraint.raw = constraint.to_string();
        constraint
    }

    pub(crate) fn from_ranges(ranges: Vec<VersionRange>, raw: String) -> Constraint {
        Constraint { ranges, raw }.canonical()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn is_any(&self) -> bool {
        self.ranges.len() == 1 && self.ranges[0] == VersionRange::any()
    }

    /// Whether `version` is matched, honoring the prerelease policy: a
    /// prerelease is matched only by ranges anchored at a prerelease of the
    /// same release.
    pub fn contains(&self, version: &Version) -> bool {
        self.ranges.iter().any(|r| r.contains(version))
    }

    pub fn intersect(&self, other: &Constraint) -> Constraint {
        if self.is_empty() || other.is_empty() {
            return Constraint::empty();
        }
        let mut ranges = Vec::new();
        for a in &self.ranges {
            for b in &other.ranges {
                let intersection = a.intersect(b);
                if !intersection.is_empty() {
                    ranges.push(intersection);
                }
            }
        }
        let mut constraint = Constraint {
            ranges,
            raw: String::new(),
        }
        .canonical();
        constraint.raw = constraint.to_string();
        constraint
    }

    pub fn union(&self, other: &Constraint) -> Constraint {
        let mut ranges = self.ranges.clone();
        ranges.extend(other.ranges.iter().cloned());
        Self::from_ranges(ranges, format!("{} || {}", self.raw, other.raw))
    }

    pub fn difference(&self, other: &Constraint) -> Constraint {
        self.intersect(&other.inverse())
    }

    /// The canonical complement over the universe of versions. The
    /// complement of `>=1.0.0` is `<1.0.0`, not `<1.0.0-0`.
    pub fn inverse(&self) -> Constraint {
        if self.is_empty() {
            return Constraint::any();
        }
        let mut result = Constraint::any();
        for range in &self.ranges {
            result = result.intersect(&range.inverse());
        }
        result.canonical()
    }

    /// The literal this constraint was parsed from
    pub fn raw_str(&self) -> &str {
        &self.raw
    }

    /// Rebuild the canonical form: split prerelease-anchored ranges, sweep
    /// the bound axis merging overlaps, and sort ascending by lower bound.
    fn canonical(self) -> Constraint {
        let mut ranges: Vec<VersionRange> = Vec::new();
        for r in &self.ranges {
            if r.is_empty() {
                // empty ranges would never match anything
                continue;
            }

            // A range whose endpoints are prereleases of the same release
            // already is a pure prerelease segment
            if let (Some(lower), Some(upper)) = (&r.lower, &r.upper) {
                if lower.is_prerelease()
                    && upper.is_prerelease()
                    && lower.is_same_release(upper)
                {
                    ranges.push(r.clone());
                    continue;
                }
            }

            // Split prerelease endpoints into a range over that release's
            // prerelease segment plus a range over the release portion
            let mut release_range = r.clone();
            if let Some(lower) = &r.lower {
                if lower.is_prerelease() {
                    let release = lower.next_patch();
                    let mut prerelease_range = VersionRange {
                        lower: r.lower.clone(),
                        upper: Some(release.clone()),
                        lower_inclusive: r.lower_inclusive,
                        upper_inclusive: false,
                        raw: String::new(),
                    };
                    if !prerelease_range.is_empty() {
                        prerelease_range.raw = prerelease_range.to_string();
                        ranges.push(prerelease_range);
                    }
                    release_range.lower = Some(release);
                    release_range.lower_inclusive = true;
                }
            }
            if let Some(upper) = &r.upper {
                if upper.is_prerelease() {
                    let prerelease_start = upper.first_prerelease();
                    let mut prerelease_range = VersionRange {
                        lower: Some(prerelease_start.clone()),
                        upper: r.upper.clone(),
                        lower_inclusive: true,
                        upper_inclusive: r.upper_inclusive,
                        raw: String::new(),
                    };
                    if !prerelease_range.is_empty() {
                        prerelease_range.raw = prerelease_range.to_string();
                        ranges.push(prerelease_range);
                    }
                    // <x.y.z-0 is equivalent to <x.y.z, which merges better
                    release_range.upper = Some(prerelease_start.next_patch());
                    release_range.upper_inclusive = false;
                }
            }
            if !release_range.is_empty() {
                ranges.push(release_range);
            }
        }

        struct BoundOnAxis {
            version: Option<Version>,
            inclusive: bool,

            upper: bool,
            from_prerelease: bool,
        }

        let mut bounds = Vec::with_capacity(ranges.len() * 2);
        for r in &ranges {
            let from_prerelease = r.lower.as_ref().is_some_and(Version::is_prerelease)
                || r.upper.as_ref().is_some_and(Version::is_prerelease);
            bounds.push(BoundOnAxis {
                version: r.lower.clone(),
                inclusive: r.lower_inclusive,
                upper: false,
                from_prerelease,
            });
            bounds.push(BoundOnAxis {
                version: r.upper.clone(),
                inclusive: r.upper_inclusive,
                upper: true,
                from_prerelease,
            });
        }

        bounds.sort_by(|a, b| {
            use std::cmp::Ordering;
            match (&a.version, &b.version) {
                (Some(av), Some(bv)) => {
                    let result = av.cmp(bv);
                    if result != Ordering::Equal {
                        return result;
                    }
                    // At an equal version a lower bound goes before an upper
                    // bound so the sweep keeps nesting across touching
                    // ranges, but only if one of the bounds is inclusive;
                    // two exclusive bounds leave a gap at the version, so
                    // there the upper bound closes first
                    if a.upper != b.upper {
                        let lower_first = a.inclusive || b.inclusive;
                        return if a.upper == lower_first {
                            Ordering::Greater
                        } else {
                            Ordering::Less
                        };
                    }
                    // Same version and side: the inclusive bound sits at the
                    // outer point for its side
                    if a.inclusive != b.inclusive {
                        return match (a.upper, a.inclusive) {
                            (true, true) => Ordering::Greater,
                            (true, false) => Ordering::Less,
                            (false, true) => Ordering::Less,
                            (false, false) => Ordering::Greater,
                        };
                    }
                    Ordering::Equal
                }
                (None, None) => {
                    if a.upper == b.upper {
                        Ordering::Equal
                    } else if a.upper {
                        Ordering::Greater
                    } else {
                        Ordering::Less
                    }
                }
                // An open lower bound is -inf, an open upper bound is +inf
                (None, _) => {
                    if a.upper {
                        Ordering::Greater
                    } else {
                        Ordering::Less
                    }
                }
                (_, None) => {
                    if b.upper {
                        Ordering::Less
                    } else {
                        Ordering::Greater
                    }
                }
            }
        });

        // Sweep, tracking release ranges and prerelease segments on
        // separate nesting counters; emit whenever a counter returns to zero
        let mut result = Vec::new();
        let mut nested = 0i32;
        let mut nested_prerelease = 0i32;
        let mut current: Option<VersionRange> = None;
        let mut current_prerelease: Option<VersionRange> = None;
        for bound in bounds {
            let (counter, slot) = if bound.from_prerelease {
                (&mut nested_prerelease, &mut current_prerelease)
            } else {
                (&mut nested, &mut current)
            };

            if bound.upper {
                *counter -= 1;
            } else {
                *counter += 1;
                if *counter == 1 {
                    *slot = Some(VersionRange {
                        lower: bound.version.clone(),
                        upper: None,
                        lower_inclusive: bound.inclusive,
                        upper_inclusive: false,
                        raw: String::new(),
                    });
                }
            }
            if *counter == 0 {
                if let Some(mut range) = slot.take() {
                    range.upper = bound.version;
                    range.upper_inclusive = bound.inclusive;
                    range.raw = range.to_string();
                    result.push(range);
                }
            }
        }

        // No two ranges overlap now, so sorting by lower bound is total;
        // prerelease segments tie-break on the upper bound
        result.sort_by(|a, b| {
            let zero = Version::new(0, 0, 0);
            let lower_a = a.lower.as_ref().unwrap_or(&zero);
            let lower_b = b.lower.as_ref().unwrap_or(&zero);
            lower_a.cmp(lower_b).then_with(|| {
                let infinity = Version::new(u64::MAX, u64::MAX, u64::MAX);
                let upper_a = a.upper.as_ref().unwrap_or(&infinity);
                let upper_b = b.upper.as_ref().unwrap_or(&infinity);
                upper_a.cmp(upper_b)
            })
        });

        Constraint {
            ranges: result,
            raw: self.raw,
        }
    }
}

/// Structural equality on the canonical form
impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        self.ranges == other.ranges
    }
}

impl Eq for Constraint {}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ranges: Vec<String> = self.ranges.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", ranges.join(" || "))
    }
}
