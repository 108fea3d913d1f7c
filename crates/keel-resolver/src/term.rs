//! Terms: signed version predicates on a single package

use std::fmt;

use keel_semver::Constraint;

/// A statement about one package: a positive term requires the chosen
/// version to lie in the constraint, a negative term requires it not to
/// (or the package to be absent entirely).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    package: String,
    constraint: Constraint,
    positive: bool,
}

/// How a term relates to another term on the same package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermRelation {
    /// Every version allowed by the other term is allowed by this one
    Satisfied,
    /// No version allowed by the other term is allowed by this one
    Contradicted,
    /// Some versions allowed by the other term are allowed, some are not
    Inconclusive,
}

impl Term {
    pub fn new(package: impl Into<String>, constraint: Constraint, positive: bool) -> Term {
        Term {
            package: package.into(),
            constraint,
            positive,
        }
    }

    pub fn positive(package: impl Into<String>, constraint: Constraint) -> Term {
        Term::new(package, constraint, true)
    }

    pub fn negative(package: impl Into<String>, constraint: Constraint) -> Term {
        Term::new(package, constraint, false)
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    pub fn is_positive(&self) -> bool {
        self.positive
    }

    /// Flip the sign, keeping the constraint
    pub fn negate(&self) -> Term {
        Term {
            package: self.package.clone(),
            constraint: self.constraint.clone(),
            positive: !self.positive,
        }
    }

    /// Flip the sign and replace the constraint by its complement.
    ///
    /// The result is satisfied by the same present versions as the original,
    /// but a missing package no longer satisfies it the way it satisfies a
    /// negative term.
    pub fn inverse(&self) -> Term {
        Term {
            package: self.package.clone(),
            constraint: self.constraint.inverse(),
            positive: !self.positive,
        }
    }

    /// Intersect with another term for the same package.
    pub(crate) fn intersect(&self, other: &Term) -> Term {
        debug_assert_eq!(self.package, other.package);

        let (constraint, positive) = match (self.positive, other.positive) {
            (true, true) => (self.constraint.intersect(&other.constraint), true),
            (true, false) => (self.constraint.difference(&other.constraint), true),
            (false, true) => (other.constraint.difference(&self.constraint), true),
            (false, false) => (self.constraint.union(&other.constraint), false),
        };

        Term {
            package: self.package.clone(),
            constraint,
            positive,
        }
    }

    pub(crate) fn difference(&self, other: &Term) -> Term {
        self.intersect(&other.negate())
    }

    /// How this term relates to `other`: satisfied when `other` implies it,
    /// contradicted when they share no versions, inconclusive otherwise.
    pub(crate) fn relation(&self, other: &Term) -> TermRelation {
        let intersection = self.intersect(other);
        if intersection == *other {
            TermRelation::Satisfied
        } else if intersection.constraint.is_empty() {
            TermRelation::Contradicted
        } else {
            TermRelation::Inconclusive
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraint.is_any() {
            write!(f, "every version of {}", self.package)
        } else {
            write!(f, "{} \"{}\"", self.package, self.constraint)
        }
    }
}
