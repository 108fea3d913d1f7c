//! Error types returned by the solver

use std::fmt;

use thiserror::Error;

use crate::incompatibility::{Incompatibility, IncompatibilityId};
use crate::report::{write_error_message, SolvingErrorWriter, StandardErrorWriter};
use crate::source::SourceError;

/// Everything that can go wrong during a solve.
#[derive(Debug, Error)]
pub enum SolveError {
    /// The catalog failed while being queried; the solve is aborted
    #[error("failed to get package versions for {package}")]
    Source {
        package: String,
        #[source]
        source: SourceError,
    },
    /// No coherent assignment exists; the attached proof explains why
    #[error(transparent)]
    Solving(#[from] SolvingError),
    /// A solver invariant was violated, which indicates a bug
    #[error("internal solver error: {0}")]
    Invariant(&'static str),
}

/// Proof that no assignment exists.
///
/// Carries the whole incompatibility arena together with the id of the
/// root-pointing terminal, so the cause DAG can be walked without any
/// solver state. `Display` renders the numbered natural-language proof
/// through the standard writer.
#[derive(Debug, Clone)]
pub struct SolvingError {
    incompatibilities: Vec<Incompatibility>,
    terminal: IncompatibilityId,
    root_package: String,
}

impl SolvingError {
    pub(crate) fn new(
        incompatibilities: Vec<Incompatibility>,
        terminal: IncompatibilityId,
        root_package: String,
    ) -> SolvingError {
        SolvingError {
            incompatibilities,
            terminal,
            root_package,
        }
    }

    /// The terminal incompatibility the solver ended on
    pub fn cause(&self) -> &Incompatibility {
        &self.incompatibilities[self.terminal]
    }

    /// The full derivation arena; `cause` and every incompatibility
    /// reachable through `causes` ids live here
    pub fn incompatibilities(&self) -> &[Incompatibility] {
        &self.incompatibilities
    }

    pub fn root_package(&self) -> &str {
        &self.root_package
    }

    /// Walk the cause DAG into a custom writer.
    pub fn write_to(&self, writer: &mut dyn SolvingErrorWriter) {
        write_error_message(&self.incompatibilities, self.terminal, writer);
    }
}

impl fmt::Display for SolvingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut writer = StandardErrorWriter::new(&self.root_package);
        self.write_to(&mut writer);
        write!(f, "{}", writer.finish())
    }
}

impl std::error::Error for SolvingError {}
