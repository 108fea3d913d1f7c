//! Range-literal sugar
//!
//! Lowers `^`, `~`, hyphen ranges, x-ranges and `*` to space-separated
//! primitive comparators (`>`, `>=`, `<`, `<=`, `=`) before range parsing.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::version::SemverError;

const X_VERSION: &str = r"([0-9]+|x|X|\*)(?:\.([0-9]+|x|X|\*))?(?:\.([0-9]+|x|X|\*))?(?:-([0-9A-Za-z\-]+(?:\.[0-9A-Za-z\-]+)*))?(?:\+([0-9A-Za-z\-]+(?:\.[0-9A-Za-z\-]+)*))?";

const X_VERSION_NO_GROUPS: &str = r"(?:[0-9]+|x|X|\*)(?:\.(?:[0-9]+|x|X|\*))?(?:\.(?:[0-9]+|x|X|\*))?(?:-[0-9A-Za-z\-]+(?:\.[0-9A-Za-z\-]+)*)?(?:\+[0-9A-Za-z\-]+(?:\.[0-9A-Za-z\-]+)*)?";

lazy_static! {
    static ref HYPHEN_RANGE_RE: Regex = Regex::new(&format!(
        "({X_VERSION_NO_GROUPS}) - ({X_VERSION_NO_GROUPS})"
    ))
    .unwrap();
    static ref CARET_RANGE_RE: Regex = Regex::new(&format!(r"^\^{X_VERSION}$")).unwrap();
    static ref TILDE_RANGE_RE: Regex = Regex::new(&format!("^~{X_VERSION}$")).unwrap();
    static ref X_RANGE_RE: Regex = Regex::new(&format!("^([<>]?=?){X_VERSION}$")).unwrap();
}

/// Lower all range sugar in `v` to primitive comparators.
pub(crate) fn desugar_range(v: &str) -> Result<String, SemverError> {
    let v = replace_hyphens(v);
    let v = replace_sections(&v, replace_caret);
    let v = replace_sections(&v, replace_tilde);
    let v = replace_x_ranges(&v)?;
    let v = replace_stars(&v);

    Ok(v.replace("  ", " "))
}

fn replace_hyphens(v: &str) -> String {
    HYPHEN_RANGE_RE.replace_all(v, ">=$1 <=$2").into_owned()
}

fn replace_sections(v: &str, replace: impl Fn(&str) -> String) -> String {
    v.split(' ')
        .filter(|s| !s.is_empty())
        .map(replace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn group<'a>(captures: &'a Captures<'_>, i: usize) -> &'a str {
    captures.get(i).map(|m| m.as_str()).unwrap_or("")
}

fn is_x(v: &str) -> bool {
    v.is_empty() || v == "x" || v == "X" || v == "*"
}

fn replace_caret(v: &str) -> String {
    let Some(captures) = CARET_RANGE_RE.captures(v) else {
        return v.to_string();
    };
    let version_string = &v[1..];
    let major_string = group(&captures, 1);
    let minor_string = group(&captures, 2);
    let patch_string = group(&captures, 3);

    // Missing components count as x; parse failures are caught later
    let major: u64 = major_string.parse().unwrap_or(0);
    let minor: u64 = minor_string.parse().unwrap_or(0);
    let patch: u64 = patch_string.parse().unwrap_or(0);

    if is_x(major_string) {
        return "*".to_string();
    }
    if is_x(minor_string) {
        return format!(">={major}.0.0 <{}.0.0", major + 1);
    }
    if is_x(patch_string) {
        if major == 0 {
            return format!(">={major}.{minor}.0 <{major}.{}.0", minor + 1);
        }
        return format!(">={major}.{minor}.0 <{}.0.0", major + 1);
    }
    if major != 0 {
        return format!(">={version_string} <{}.0.0", major + 1);
    }
    if minor != 0 {
        return format!(">={version_string} <{major}.{}.0", minor + 1);
    }
    format!(">={version_string} <{major}.{minor}.{}", patch + 1)
}

fn replace_tilde(v: &str) -> String {
    let Some(captures) = TILDE_RANGE_RE.captures(v) else {
        return v.to_string();
    };
    let version_string = &v[1..];
    let major_string = group(&captures, 1);
    let minor_string = group(&captures, 2);
    let patch_string = group(&captures, 3);

    let major: u64 = major_string.parse().unwrap_or(0);
    let minor: u64 = minor_string.parse().unwrap_or(0);

    if is_x(major_string) {
        return "*".to_string();
    }
    if is_x(minor_string) {
        return format!(">={major}.0.0 <{}.0.0", major + 1);
    }
    if is_x(patch_string) {
        // ~1.2 == >=1.2.0 <1.3.0
        return format!(">={major}.{minor}.0 <{major}.{}.0", minor + 1);
    }
    format!(">={version_string} <{major}.{}.0", minor + 1)
}

fn replace_x_ranges(v: &str) -> Result<String, SemverError> {
    let sections: Result<Vec<_>, _> = v
        .split(' ')
        .filter(|s| !s.is_empty())
        .map(replace_x_range)
        .collect();
    Ok(sections?.join(" "))
}

fn replace_x_range(v: &str) -> Result<String, SemverError> {
    let Some(captures) = X_RANGE_RE.captures(v) else {
        // At this point all other range sugar should have been replaced
        return Err(SemverError::InvalidComparator(v.to_string()));
    };

    let comparator = group(&captures, 1);
    let major_string = group(&captures, 2);
    let minor_string = group(&captures, 3);
    let patch_string = group(&captures, 4);

    let x_major = is_x(major_string);
    let x_minor = is_x(minor_string);
    let x_patch = is_x(patch_string);

    if !x_major && !x_minor && !x_patch {
        return Ok(v.to_string());
    }

    let comparator = if comparator == "=" { "" } else { comparator };

    if x_major {
        if comparator == ">" || comparator == "<" {
            // Nothing can be allowed
            return Ok("<0.0.0".to_string());
        }
        // Everything is allowed
        return Ok("*".to_string());
    }

    // Must parse because it is not x
    let major: u64 = major_string
        .parse()
        .map_err(|_| SemverError::InvalidComparator(v.to_string()))?;
    // Might not parse because it is x, but then it is overwritten anyway
    let minor: u64 = minor_string.parse().unwrap_or(0);

    Ok(match comparator {
        ">" => {
            // >1 => >=2.0.0, >1.2 => >=1.3.0
            if x_minor {
                format!(">={}.0.0", major + 1)
            } else {
                format!(">={major}.{}.0", minor + 1)
            }
        }
        ">=" => {
            // >=1 => >=1.0.0, >=1.2 => >=1.2.0
            if x_minor {
                format!(">={major}.0.0")
            } else {
                format!(">={major}.{minor}.0")
            }
        }
        "<" => {
            // <1 => <1.0.0, <1.2 => <1.2.0
            if x_minor {
                format!("<{major}.0.0")
            } else {
                format!("<{major}.{minor}.0")
            }
        }
        "<=" => {
            // <=1 => <2.0.0, <=1.2 => <1.3.0
            if x_minor {
                format!("<{}.0.0", major + 1)
            } else {
                format!("<{major}.{}.0", minor + 1)
            }
        }
        _ => {
            // =1 => >=1.0.0 <2.0.0, =1.2 => >=1.2.0 <1.3.0
            if x_minor {
                format!(">={major}.0.0 <{}.0.0", major + 1)
            } else {
                format!(">={major}.{minor}.0 <{major}.{}.0", minor + 1)
            }
        }
    })
}

fn replace_stars(v: &str) -> String {
    v.replace('*', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desugar(v: &str) -> String {
        desugar_range(v).unwrap()
    }

    #[test]
    fn test_caret() {
        assert_eq!(desugar("^1.2.3"), ">=1.2.3 <2.0.0");
        assert_eq!(desugar("^0.2.3"), ">=0.2.3 <0.3.0");
        assert_eq!(desugar("^0.0.3"), ">=0.0.3 <0.0.4");
        assert_eq!(desugar("^1.2"), ">=1.2.0 <2.0.0");
        assert_eq!(desugar("^0.2"), ">=0.2.0 <0.3.0");
        assert_eq!(desugar("^1"), ">=1.0.0 <2.0.0");
        assert_eq!(desugar("^1.2.3-beta.2"), ">=1.2.3-beta.2 <2.0.0");
    }

    #[test]
    fn test_tilde() {
        assert_eq!(desugar("~1.2.3"), ">=1.2.3 <1.3.0");
        assert_eq!(desugar("~1.2"), ">=1.2.0 <1.3.0");
        assert_eq!(desugar("~1"), ">=1.0.0 <2.0.0");
        assert_eq!(desugar("~0.2.3"), ">=0.2.3 <0.3.0");
    }

    #[test]
    fn test_hyphen() {
        assert_eq!(desugar("1.2.3 - 2.3.4"), ">=1.2.3 <=2.3.4");
        // partial right side expands through the x-range rule
        assert_eq!(desugar("1.2.3 - 2.3"), ">=1.2.3 <2.4.0");
        assert_eq!(desugar("1.2 - 2"), ">=1.2.0 <3.0.0");
    }

    #[test]
    fn test_x_ranges() {
        assert_eq!(desugar("1"), ">=1.0.0 <2.0.0");
        assert_eq!(desugar("1.x"), ">=1.0.0 <2.0.0");
        assert_eq!(desugar("1.2.x"), ">=1.2.0 <1.3.0");
        assert_eq!(desugar("1.2.*"), ">=1.2.0 <1.3.0");
        assert_eq!(desugar(">1.x"), ">=2.0.0");
        assert_eq!(desugar(">1.2"), ">=1.3.0");
        assert_eq!(desugar("<1.x"), "<1.0.0");
        assert_eq!(desugar("<=1.x"), "<2.0.0");
        assert_eq!(desugar(">x"), "<0.0.0");
    }

    #[test]
    fn test_star() {
        assert_eq!(desugar("*"), "");
        assert_eq!(desugar("x"), "");
    }

    #[test]
    fn test_primitives_untouched() {
        assert_eq!(desugar(">=1.2.3 <2.0.0"), ">=1.2.3 <2.0.0");
        assert_eq!(desugar("=1.2.3"), "=1.2.3");
        assert_eq!(desugar("1.2.3"), "1.2.3");
    }

    #[test]
    fn test_invalid_comparator() {
        assert!(desugar_range("not-a-range").is_err());
        assert!(desugar_range("^1.2.3 bogus~").is_err());
    }
}
