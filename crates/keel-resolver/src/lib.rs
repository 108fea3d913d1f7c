//! PubGrub dependency resolution
//!
//! Given a root package and a [`Source`] that lists package versions with
//! their dependencies, [`solve`] either returns a coherent assignment of
//! one version per reachable package, or a [`SolvingError`] whose `Display`
//! is a numbered natural-language proof of why no assignment exists.
//!
//! The algorithm is conflict-driven: unit propagation derives forced terms
//! from incompatibilities, conflicts are resolved into learned
//! incompatibilities by walking the derivation chain of their satisfiers,
//! and the solver backjumps instead of backtracking level by level.

mod cache;
mod error;
mod incompatibility;
mod partial_solution;
mod report;
mod solver;
mod source;
mod term;
mod util;

pub use cache::{CachingSource, SharedSourceError};
pub use error::{SolveError, SolvingError};
pub use incompatibility::{Incompatibility, IncompatibilityId, Relation};
pub use partial_solution::{Assignment, PartialSolution};
pub use report::{
    CauseStrings, IncompatibilityStringer, IncompatibilityStrings, SolvingErrorWriter,
    StandardErrorWriter, StandardIncompatibilityStringer, StandardTermStringer, TermStringer,
};
pub use solver::solve;
pub use source::{standard_version_priority, PackageVersion, Source, SourceError};
pub use term::{Term, TermRelation};
