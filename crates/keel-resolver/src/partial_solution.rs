//! The ordered assignment log built during solving

use indexmap::IndexMap;
use keel_semver::{Constraint, Version};

use crate::incompatibility::IncompatibilityId;
use crate::term::Term;

/// One entry of the assignment log: either a chosen version or a term
/// forced by unit propagation, with the decision level it was made at.
#[derive(Debug, Clone)]
pub enum Assignment {
    Decision {
        package: String,
        version: Version,
        decision_level: u32,
    },
    Derivation {
        term: Term,
        cause: IncompatibilityId,
        decision_level: u32,
    },
}

impl Assignment {
    pub fn package(&self) -> &str {
        match self {
            Assignment::Decision { package, .. } => package,
            Assignment::Derivation { term, .. } => term.package(),
        }
    }

    pub fn decision_level(&self) -> u32 {
        match self {
            Assignment::Decision { decision_level, .. }
            | Assignment::Derivation { decision_level, .. } => *decision_level,
        }
    }

    pub fn is_decision(&self) -> bool {
        matches!(self, Assignment::Decision { .. })
    }
}

/// Append-only log of decisions and derivations.
///
/// The log is only ever truncated back to a prefix, which is how backjumps
/// rewind the search.
#[derive(Debug, Clone, Default)]
pub struct PartialSolution {
    assignments: Vec<Assignment>,
}

impl PartialSolution {
    pub fn new() -> PartialSolution {
        PartialSolution::default()
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// The aggregated term for `package`: a decision short-circuits to the
    /// exact single-version positive term, otherwise all derivation terms
    /// are intersected in log order.
    pub fn get(&self, package: &str) -> Option<Term> {
        let mut result: Option<Term> = None;
        for assignment in &self.assignments {
            if assignment.package() != package {
                continue;
            }
            match assignment {
                Assignment::Decision { version, .. } => {
                    return Some(Term::positive(package, Constraint::exact(version)));
                }
                Assignment::Derivation { term, .. } => {
                    result = Some(match result {
                        Some(aggregate) => aggregate.intersect(term),
                        None => term.clone(),
                    });
                }
            }
        }
        result
    }

    /// Number of decisions in the log
    pub fn current_decision_level(&self) -> u32 {
        self.assignments
            .iter()
            .filter(|a| a.is_decision())
            .count() as u32
    }

    pub(crate) fn add_decision(&mut self, package: String, version: Version) {
        let decision_level = self.current_decision_level() + 1;
        self.assignments.push(Assignment::Decision {
            package,
            version,
            decision_level,
        });
    }

    pub(crate) fn add_derivation(&mut self, term: Term, cause: IncompatibilityId) {
        let decision_level = self.current_decision_level();
        self.assignments.push(Assignment::Derivation {
            term,
            cause,
            decision_level,
        });
    }

    /// A copy of the first `size` assignments
    pub fn prefix(&self, size: usize) -> PartialSolution {
        PartialSolution {
            assignments: self.assignments[..size].to_vec(),
        }
    }

    /// A copy of the first `size` assignments plus one extra assignment,
    /// used when locating the previous satisfier.
    pub(crate) fn prefix_with(&self, size: usize, extra: &Assignment) -> PartialSolution {
        let mut result = self.prefix(size);
        result.assignments.push(extra.clone());
        result
    }

    pub(crate) fn truncate(&mut self, size: usize) {
        self.assignments.truncate(size);
    }

    /// Some package that has a positive derivation but no decision yet, in
    /// derivation order.
    pub fn find_positive_undecided(&self) -> Option<&str> {
        self.positive_undecided().next()
    }

    /// All packages with a positive derivation and no decision, in
    /// derivation order; the prefetch set.
    pub fn all_positive_undecided(&self) -> Vec<String> {
        let mut result: Vec<String> = Vec::new();
        for package in self.positive_undecided() {
            if !result.iter().any(|p| p == package) {
                result.push(package.to_string());
            }
        }
        result
    }

    fn positive_undecided(&self) -> impl Iterator<Item = &str> {
        let decided: Vec<&str> = self
            .assignments
            .iter()
            .filter(|a| a.is_decision())
            .map(Assignment::package)
            .collect();
        self.assignments.iter().filter_map(move |assignment| {
            match assignment {
                Assignment::Derivation { term, .. }
                    if term.is_positive() && !decided.contains(&term.package()) =>
                {
                    Some(term.package())
                }
                _ => None,
            }
        })
    }

    /// All decided versions in decision order
    pub fn decisions(&self) -> IndexMap<String, Version> {
        let mut result = IndexMap::new();
        for assignment in &self.assignments {
            if let Assignment::Decision {
                package, version, ..
            } = assignment
            {
                result.insert(package.clone(), version.clone());
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(s: &str) -> Constraint {
        Constraint::parse(s).unwrap()
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_decision_levels() {
        let mut solution = PartialSolution::new();
        solution.add_derivation(Term::positive("root", Constraint::any()), 0);
        assert_eq!(solution.assignments()[0].decision_level(), 0);

        solution.add_decision("root".to_string(), v("1.0.0"));
        assert_eq!(solution.assignments()[1].decision_level(), 1);
        assert_eq!(solution.current_decision_level(), 1);

        solution.add_derivation(Term::positive("foo", c("^1.0.0")), 1);
        assert_eq!(solution.assignments()[2].decision_level(), 1);

        solution.add_decision("foo".to_string(), v("1.2.0"));
        assert_eq!(solution.assignments()[3].decision_level(), 2);
    }

    #[test]
    fn test_get_decision_short_circuits() {
        let mut solution = PartialSolution::new();
        solution.add_derivation(Term::positive("foo", c("^1.0.0")), 0);
        solution.add_decision("foo".to_string(), v("1.2.0"));

        let term = solution.get("foo").unwrap();
        assert!(term.is_positive());
        assert!(term.constraint().contains(&v("1.2.0")));
        assert!(!term.constraint().contains(&v("1.2.1")));
    }

    #[test]
    fn test_get_intersects_derivations() {
        let mut solution = PartialSolution::new();
        solution.add_derivation(Term::positive("foo", c(">=1.0.0")), 0);
        solution.add_derivation(Term::negative("foo", c(">=2.0.0")), 1);

        let term = solution.get("foo").unwrap();
        assert!(term.is_positive());
        assert_eq!(*term.constraint(), c(">=1.0.0 <2.0.0"));

        assert!(solution.get("bar").is_none());
    }

    #[test]
    fn test_find_positive_undecided() {
        let mut solution = PartialSolution::new();
        solution.add_derivation(Term::negative("skipped", Constraint::any()), 0);
        solution.add_derivation(Term::positive("foo", c("^1.0.0")), 1);
        assert_eq!(solution.find_positive_undecided(), Some("foo"));

        solution.add_decision("foo".to_string(), v("1.0.0"));
        assert_eq!(solution.find_positive_undecided(), None);
    }

    #[test]
    fn test_prefix_and_truncate() {
        let mut solution = PartialSolution::new();
        solution.add_derivation(Term::positive("foo", c("^1.0.0")), 0);
        solution.add_decision("foo".to_string(), v("1.0.0"));
        solution.add_derivation(Term::positive("bar", c("^1.0.0")), 1);

        let prefix = solution.prefix(2);
        assert_eq!(prefix.len(), 2);
        assert!(prefix.get("bar").is_none());

        solution.truncate(1);
        assert_eq!(solution.current_decision_level(), 0);
        assert_eq!(solution.find_positive_undecided(), Some("foo"));
    }

    #[test]
    fn test_decisions_in_order() {
        let mut solution = PartialSolution::new();
        solution.add_decision("b".to_string(), v("1.0.0"));
        solution.add_decision("a".to_string(), v("2.0.0"));

        let decisions = solution.decisions();
        let packages: Vec<&String> = decisions.keys().collect();
        assert_eq!(packages, vec!["b", "a"]);
    }
}
