//! The PubGrub solving loop: unit propagation, conflict resolution and
//! version decisions

use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;
use keel_semver::{Constraint, Version};
use log::{debug, trace};

use crate::error::{SolveError, SolvingError};
use crate::incompatibility::{Incompatibility, IncompatibilityId, Relation};
use crate::partial_solution::{Assignment, PartialSolution};
use crate::source::Source;
use crate::term::{Term, TermRelation};
use crate::util::lowest_satisfying;

/// Resolve one version per package reachable from `root_package`.
///
/// The returned map excludes the root and preserves decision order. A
/// [`SolveError::Solving`] carries the proof of unsatisfiability; catalog
/// errors abort the solve and are passed through with package context.
pub fn solve<S: Source>(
    source: &S,
    root_package: &str,
) -> Result<IndexMap<String, Version>, SolveError> {
    Solver::new(source, root_package).run()
}

struct Solver<'a, S> {
    source: &'a S,
    root_package: String,
    /// Every incompatibility ever created, including intermediate prior
    /// causes; `causes` ids point in here
    arena: Vec<Incompatibility>,
    /// The incompatibilities unit propagation iterates, oldest first
    active: Vec<IncompatibilityId>,
    partial_solution: PartialSolution,
}

impl<'a, S: Source> Solver<'a, S> {
    fn new(source: &'a S, root_package: &str) -> Solver<'a, S> {
        let mut solver = Solver {
            source,
            root_package: root_package.to_string(),
            arena: Vec::new(),
            active: Vec::new(),
            partial_solution: PartialSolution::new(),
        };

        // The root package must be present
        let seed = Incompatibility::external(vec![Term::negative(
            root_package,
            Constraint::any(),
        )]);
        let id = solver.register(seed);
        solver.add_incompatibility(id);
        solver
    }

    fn run(mut self) -> Result<IndexMap<String, Version>, SolveError> {
        let mut next = self.root_package.clone();
        loop {
            self.unit_propagation(next)?;

            let undecided = self.partial_solution.all_positive_undecided();
            if !undecided.is_empty() {
                self.source.prefetch(&undecided);
            }

            match self.decision()? {
                Some(package) => next = package,
                None => break,
            }
        }

        let mut decisions = self.partial_solution.decisions();
        decisions.shift_remove(&self.root_package);
        Ok(decisions)
    }

    /// Register a new incompatibility node in the arena.
    fn register(&mut self, incompatibility: Incompatibility) -> IncompatibilityId {
        self.arena.push(incompatibility);
        self.arena.len() - 1
    }

    /// Put an arena node on the active list, unless an active
    /// incompatibility with the same terms already exists.
    fn add_incompatibility(&mut self, id: IncompatibilityId) {
        let duplicate = self
            .active
            .iter()
            .any(|&existing| self.arena[existing].same_terms(&self.arena[id]));
        if !duplicate {
            self.active.push(id);
        }
    }

    /// BFS over packages whose aggregated term changed, visiting active
    /// incompatibilities newest to oldest.
    fn unit_propagation(&mut self, package: String) -> Result<(), SolveError> {
        let mut changed = VecDeque::from([package]);
        // Incompatibilities that cannot fire again during this pass
        let mut contradicted: HashSet<IncompatibilityId> = HashSet::new();

        while let Some(package) = changed.pop_front() {
            for position in (0..self.active.len()).rev() {
                let id = self.active[position];
                if contradicted.contains(&id) {
                    continue;
                }
                if self.arena[id].get(&package).is_none() {
                    continue;
                }

                match self.arena[id].relation(&self.partial_solution) {
                    Relation::Satisfied => {
                        let learned = self.conflict_resolution(id)?;
                        // The learned incompatibility is almost satisfied
                        // after backjumping; derive from it and restart the
                        // queue at the affected package
                        match self.arena[learned].relation(&self.partial_solution) {
                            Relation::AlmostSatisfied(term) => {
                                trace!("deriving {} from conflict", term.negate());
                                self.partial_solution.add_derivation(term.negate(), learned);
                                changed.clear();
                                changed.push_back(term.package().to_string());
                            }
                            _ => {
                                return Err(SolveError::Invariant(
                                    "incompatibility is not almost satisfied after conflict resolution",
                                ))
                            }
                        }
                        contradicted.insert(learned);
                        break;
                    }
                    Relation::AlmostSatisfied(term) => {
                        trace!("deriving {}", term.negate());
                        self.partial_solution.add_derivation(term.negate(), id);
                        changed.push_back(term.package().to_string());
                        contradicted.insert(id);
                    }
                    _ => {
                        contradicted.insert(id);
                    }
                }
            }
        }
        Ok(())
    }

    /// Turn a satisfied incompatibility into one that is almost satisfied
    /// by ascending the derivation chain of its satisfiers, then backjump.
    fn conflict_resolution(
        &mut self,
        from: IncompatibilityId,
    ) -> Result<IncompatibilityId, SolveError> {
        let mut current = from;
        let mut changed = false;
        debug!("conflict in {}", self.describe(current));

        loop {
            if self.is_terminal(current) {
                return Err(SolveError::Solving(SolvingError::new(
                    self.arena.clone(),
                    current,
                    self.root_package.clone(),
                )));
            }

            // The earliest prefix of the log that satisfies the
            // incompatibility ends at the satisfier
            let satisfier_index = lowest_satisfying(
                0,
                self.partial_solution.len() as isize,
                |length| {
                    let prefix = self.partial_solution.prefix((length + 1) as usize);
                    self.arena[current].relation(&prefix) == Relation::Satisfied
                },
            ) as usize;
            let satisfier = self.partial_solution.assignments()[satisfier_index].clone();

            // The previous satisfier: the assignment that completes the
            // incompatibility when the satisfier itself is already present
            let previous_index = lowest_satisfying(
                -1,
                satisfier_index as isize + 1,
                |length| {
                    let prefix = self
                        .partial_solution
                        .prefix_with((length + 1) as usize, &satisfier);
                    self.arena[current].relation(&prefix) == Relation::Satisfied
                },
            );
            let previous_satisfier_level = if previous_index >= 0 {
                self.partial_solution.assignments()[previous_index as usize].decision_level()
            } else {
                1
            };

            if satisfier.is_decision()
                || previous_satisfier_level != satisfier.decision_level()
            {
                if changed {
                    self.add_incompatibility(current);
                }

                // Backjump: drop everything past the last decision at the
                // previous satisfier's level
                let mut level = 0;
                for (index, assignment) in
                    self.partial_solution.assignments().iter().enumerate()
                {
                    if assignment.is_decision() {
                        level += 1;
                        if level > previous_satisfier_level {
                            self.partial_solution.truncate(index);
                            break;
                        }
                    }
                }
                debug!(
                    "backjumped to level {}, learned {}",
                    previous_satisfier_level,
                    self.describe(current)
                );

                return Ok(current);
            }

            let Assignment::Derivation {
                term: satisfier_term,
                cause,
                ..
            } = &satisfier
            else {
                return Err(SolveError::Invariant(
                    "satisfier is not a derivation in conflict resolution",
                ));
            };

            let mut prior = self.arena[current].prior_cause(
                current,
                &self.arena[*cause],
                *cause,
                satisfier_term.package(),
            );
            if let Some(incompatibility_term) =
                self.arena[current].get(satisfier_term.package())
            {
                if incompatibility_term.relation(satisfier_term) != TermRelation::Satisfied {
                    prior.add_term(
                        satisfier_term
                            .difference(incompatibility_term)
                            .negate(),
                    );
                }
            }

            current = self.register(prior);
            changed = true;
        }
    }

    /// Pick the next undecided package, query the catalog, record its
    /// dependency incompatibilities and decide a version. Returns the
    /// package to propagate from, or `None` when the solve is complete.
    fn decision(&mut self) -> Result<Option<String>, SolveError> {
        let Some(package) = self
            .partial_solution
            .find_positive_undecided()
            .map(str::to_string)
        else {
            return Ok(None);
        };

        let Some(term) = self.partial_solution.get(&package) else {
            return Err(SolveError::Invariant(
                "positive undecided package has no aggregated term",
            ));
        };

        let versions = self
            .source
            .get_package_versions(&package)
            .map_err(|source| SolveError::Source {
                package: package.clone(),
                source,
            })?;

        let mut available: Vec<Version> =
            versions.iter().map(|entry| entry.version.clone()).collect();
        available.sort();

        let compatible: Vec<Version> = available
            .iter()
            .filter(|version| term.constraint().contains(version))
            .cloned()
            .collect();

        if versions.is_empty() || compatible.is_empty() {
            debug!(
                "no versions of {} satisfy \"{}\"",
                package,
                term.constraint()
            );
            let unavailable = Incompatibility::external(vec![term]);
            let id = self.register(unavailable);
            self.add_incompatibility(id);
            return Ok(Some(package));
        }

        let chosen = self.source.pick_version(&package, &compatible);
        if !compatible.contains(&chosen) {
            return Err(SolveError::Invariant(
                "pick_version returned a version outside the candidates",
            ));
        }

        let Some(chosen_data) = versions.iter().find(|entry| entry.version == chosen) else {
            return Err(SolveError::Invariant(
                "chosen version disappeared from the version list",
            ));
        };
        let chosen_data = chosen_data.clone();

        debug!("selected {} {}", package, chosen);

        // Dependencies in ascending package order; each incompatibility
        // covers the whole subset of versions declaring the same edge
        let mut dependencies: Vec<&String> = chosen_data.dependencies.keys().collect();
        dependencies.sort();
        for dependency in dependencies {
            let constraint = &chosen_data.dependencies[dependency];
            let subset = self.dependency_subset(&versions, &available, dependency, constraint, false);
            let incompatibility = Incompatibility::dependency(
                &package,
                vec![
                    Term::positive(&package, subset),
                    Term::negative(dependency, constraint.clone()),
                ],
            );
            let id = self.register(incompatibility);
            self.add_incompatibility(id);
        }

        let mut optional: Vec<&String> = chosen_data.optional_dependencies.keys().collect();
        optional.sort();
        for dependency in optional {
            let constraint = &chosen_data.optional_dependencies[dependency];
            let subset = self.dependency_subset(&versions, &available, dependency, constraint, true);
            // A negative term would be satisfied by the dependency being
            // absent, silently dropping the edge. A positive term with the
            // inverse constraint is satisfied only when the dependency is
            // present at an incompatible version.
            let incompatibility = Incompatibility::dependency(
                &package,
                vec![
                    Term::positive(&package, subset),
                    Term::positive(dependency, constraint.inverse()),
                ],
            );
            let id = self.register(incompatibility);
            self.add_incompatibility(id);
        }

        self.partial_solution.add_decision(package.clone(), chosen);

        Ok(Some(package))
    }

    /// The constraint covering every version of the depending package that
    /// declares exactly this dependency edge.
    fn dependency_subset(
        &self,
        versions: &[crate::source::PackageVersion],
        available: &[Version],
        dependency: &str,
        constraint: &Constraint,
        optional: bool,
    ) -> Constraint {
        let mut declaring: Vec<Version> = versions
            .iter()
            .filter(|entry| {
                let edges = if optional {
                    &entry.optional_dependencies
                } else {
                    &entry.dependencies
                };
                edges.get(dependency) == Some(constraint)
            })
            .map(|entry| entry.version.clone())
            .collect();
        declaring.sort();
        Constraint::from_version_subset(&declaring, available)
    }

    /// Terminal incompatibilities end conflict resolution: the empty set,
    /// or the lone positive root term.
    fn is_terminal(&self, id: IncompatibilityId) -> bool {
        let incompatibility = &self.arena[id];
        if incompatibility.term_count() == 0 {
            return true;
        }
        if incompatibility.term_count() == 1 {
            return incompatibility
                .terms()
                .next()
                .map(|term| term.is_positive() && term.package() == self.root_package)
                .unwrap_or(false);
        }
        false
    }

    fn describe(&self, id: IncompatibilityId) -> String {
        let terms: Vec<String> = self.arena[id].terms().map(|t| t.to_string()).collect();
        format!("{{{}}}", terms.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{PackageVersion, SourceError};
    use std::collections::HashMap;

    struct MapSource {
        packages: HashMap<String, Vec<PackageVersion>>,
    }

    impl Source for MapSource {
        fn get_package_versions(
            &self,
            package: &str,
        ) -> Result<Vec<PackageVersion>, SourceError> {
            self.packages
                .get(package)
                .cloned()
                .ok_or_else(|| format!("package not found: {package}").into())
        }

        fn pick_version(&self, _package: &str, candidates: &[Version]) -> Version {
            candidates[candidates.len() - 1].clone()
        }
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn c(s: &str) -> Constraint {
        Constraint::parse(s).unwrap()
    }

    #[test]
    fn test_single_dependency_chain() {
        let mut packages = HashMap::new();
        packages.insert(
            "root".to_string(),
            vec![PackageVersion::new(v("1.0.0")).with_dependency("a", c("^1.0.0"))],
        );
        packages.insert(
            "a".to_string(),
            vec![
                PackageVersion::new(v("1.0.0")).with_dependency("b", c("^1.0.0")),
                PackageVersion::new(v("2.0.0")),
            ],
        );
        packages.insert("b".to_string(), vec![PackageVersion::new(v("1.2.0"))]);

        let result = solve(&MapSource { packages }, "root").unwrap();
        assert_eq!(result.get("a"), Some(&v("1.0.0")));
        assert_eq!(result.get("b"), Some(&v("1.2.0")));
        assert!(!result.contains_key("root"));
    }

    #[test]
    fn test_source_error_is_wrapped() {
        let mut packages = HashMap::new();
        packages.insert(
            "root".to_string(),
            vec![PackageVersion::new(v("1.0.0")).with_dependency("missing", c("^1.0.0"))],
        );

        let err = solve(&MapSource { packages }, "root").unwrap_err();
        match err {
            SolveError::Source { package, .. } => assert_eq!(package, "missing"),
            other => panic!("expected a source error, got {other:?}"),
        }
    }

    #[test]
    fn test_unavailable_version_is_a_conflict_not_an_error() {
        let mut packages = HashMap::new();
        packages.insert(
            "root".to_string(),
            vec![PackageVersion::new(v("1.0.0")).with_dependency("a", c("^2.0.0"))],
        );
        packages.insert("a".to_string(), vec![PackageVersion::new(v("1.0.0"))]);

        let err = solve(&MapSource { packages }, "root").unwrap_err();
        assert!(matches!(err, SolveError::Solving(_)));
    }
}
