//! Incompatibilities: term sets asserted universally false

use std::collections::BTreeMap;

use crate::partial_solution::PartialSolution;
use crate::term::{Term, TermRelation};

/// Index of an incompatibility in the solver-owned arena.
///
/// Derived incompatibilities reference their two causes by id, which keeps
/// the cause DAG shareable without reference cycles.
pub type IncompatibilityId = usize;

/// A set of terms whose conjunction can never hold.
///
/// External incompatibilities come from the root requirement, dependency
/// edges and unavailable packages; derived ones are produced by conflict
/// resolution and carry the ids of their two causes.
///
/// Terms are keyed by package in a sorted map, so every iteration over them
/// is ascending by package name.
#[derive(Debug, Clone)]
pub struct Incompatibility {
    terms: BTreeMap<String, Term>,
    causes: Option<(IncompatibilityId, IncompatibilityId)>,
    /// The depending package, when this incompatibility expresses a
    /// dependency edge; used to order terms during explanation
    dependant: Option<String>,
}

/// How an incompatibility relates to a partial solution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// Every term is satisfied; the solution violates the incompatibility
    Satisfied,
    /// Some term is contradicted; the incompatibility cannot fire
    Contradicted,
    /// All terms but one are satisfied; carries the unsatisfied term
    AlmostSatisfied(Term),
    Inconclusive,
}

impl Incompatibility {
    /// An external incompatibility over the given terms.
    pub(crate) fn external(terms: impl IntoIterator<Item = Term>) -> Incompatibility {
        let mut result = Incompatibility {
            terms: BTreeMap::new(),
            causes: None,
            dependant: None,
        };
        for term in terms {
            result.add_term(term);
        }
        result
    }

    /// An external incompatibility for a dependency edge of `dependant`.
    pub(crate) fn dependency(
        dependant: &str,
        terms: impl IntoIterator<Item = Term>,
    ) -> Incompatibility {
        let mut result = Incompatibility::external(terms);
        result.dependant = Some(dependant.to_string());
        result
    }

    /// Terms in ascending package order
    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.terms.values()
    }

    pub fn get(&self, package: &str) -> Option<&Term> {
        self.terms.get(package)
    }

    pub(crate) fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn causes(&self) -> Option<(IncompatibilityId, IncompatibilityId)> {
        self.causes
    }

    /// Derived incompatibilities have exactly two causes
    pub fn is_derived(&self) -> bool {
        self.causes.is_some()
    }

    pub fn dependant(&self) -> Option<&str> {
        self.dependant.as_deref()
    }

    /// Structural equality of the term maps, ignoring causes.
    pub(crate) fn same_terms(&self, other: &Incompatibility) -> bool {
        self.terms == other.terms
    }

    /// Test each term against the solution's aggregated term for its
    /// package. A missing aggregate counts as inconclusive.
    pub(crate) fn relation(&self, solution: &PartialSolution) -> Relation {
        let mut result = Relation::Satisfied;
        for term in self.terms.values() {
            if let Some(solution_term) = solution.get(term.package()) {
                match term.relation(&solution_term) {
                    TermRelation::Satisfied => continue,
                    TermRelation::Contradicted => return Relation::Contradicted,
                    TermRelation::Inconclusive => {}
                }
            }

            // This term is inconclusive or has no assignments yet
            result = match result {
                Relation::Satisfied => Relation::AlmostSatisfied(term.clone()),
                _ => Relation::Inconclusive,
            };
        }
        result
    }

    /// Resolve this incompatibility against the cause of its satisfier: the
    /// union of both term sets without the satisfier's package, same-package
    /// terms intersected. The result carries both parents as causes and
    /// inherits the `dependant` marker for explanation ordering.
    pub(crate) fn prior_cause(
        &self,
        self_id: IncompatibilityId,
        cause: &Incompatibility,
        cause_id: IncompatibilityId,
        satisfier_package: &str,
    ) -> Incompatibility {
        let mut result = Incompatibility {
            terms: BTreeMap::new(),
            causes: Some((self_id, cause_id)),
            dependant: self
                .dependant
                .clone()
                .or_else(|| cause.dependant.clone()),
        };
        for term in self.terms.values() {
            if term.package() != satisfier_package {
                result.add_term(term.clone());
            }
        }
        for term in cause.terms.values() {
            if term.package() != satisfier_package {
                result.add_term(term.clone());
            }
        }
        result
    }

    /// Merge one more term in, intersecting with an existing term for the
    /// same package. Only used while an incompatibility is being built;
    /// registered incompatibilities are immutable.
    pub(crate) fn add_term(&mut self, term: Term) {
        match self.terms.remove(term.package()) {
            Some(existing) => {
                self.terms
                    .insert(term.package().to_string(), existing.intersect(&term));
            }
            None => {
                self.terms.insert(term.package().to_string(), term);
            }
        }
    }
}
