//! Natural-language rendering of solving failures
//!
//! A solving failure carries the derivation DAG of incompatibilities that
//! led to the root-pointing terminal. The writer walks that DAG and emits a
//! numbered proof: lines that later steps refer back to get a line tag, and
//! independent sub-derivations are separated by a blank line.

use std::collections::HashMap;

use crate::incompatibility::{Incompatibility, IncompatibilityId};
use crate::term::Term;

/// Receives the proof lines while the cause DAG is walked.
///
/// The writer decides the final phrasing; the walk only reports the shape of
/// each step (how many causes, which of them already have line tags).
pub trait SolvingErrorWriter {
    /// Tag the most recently written line and remember the tag for this
    /// incompatibility; returns the tag number.
    fn tag_last_line(&mut self, incompatibility: IncompatibilityId) -> usize;
    /// The tag previously given to this incompatibility, if any
    fn tag(&self, incompatibility: IncompatibilityId) -> Option<usize>;

    fn write_two_causes(
        &mut self,
        cause1: &Incompatibility,
        cause2: &Incompatibility,
        incompatibility: &Incompatibility,
    );
    fn write_two_causes_one_tag(
        &mut self,
        cause1: &Incompatibility,
        cause2: &Incompatibility,
        incompatibility: &Incompatibility,
        line2: usize,
    );
    fn write_two_causes_two_tags(
        &mut self,
        cause1: &Incompatibility,
        cause2: &Incompatibility,
        incompatibility: &Incompatibility,
        line1: usize,
        line2: usize,
    );
    fn write_one_cause(&mut self, cause: &Incompatibility, incompatibility: &Incompatibility);
    fn write_one_cause_one_tag(
        &mut self,
        cause: &Incompatibility,
        incompatibility: &Incompatibility,
        line: usize,
    );
    fn write_no_cause(&mut self, incompatibility: &Incompatibility);
    /// A blank line between independent sub-derivations
    fn separate(&mut self);
}

/// Whether an incompatibility is the root-pointing terminal `{root: +Any}`
pub(crate) fn is_root_incompatibility(incompatibility: &Incompatibility, root_package: &str) -> bool {
    let mut terms = incompatibility.terms();
    match (terms.next(), terms.next()) {
        (Some(term), None) => term.is_positive() && term.package() == root_package,
        _ => false,
    }
}

fn both_causes_external(arena: &[Incompatibility], id: IncompatibilityId) -> bool {
    match arena[id].causes() {
        Some((c1, c2)) => !arena[c1].is_derived() && !arena[c2].is_derived(),
        None => false,
    }
}

/// Deterministic order for two untagged derived branches: by the constraint
/// string of their first term.
fn order_branches(
    arena: &[Incompatibility],
    c1: IncompatibilityId,
    c2: IncompatibilityId,
) -> (IncompatibilityId, IncompatibilityId) {
    let key = |id: IncompatibilityId| {
        arena[id]
            .terms()
            .next()
            .map(|t| t.constraint().to_string())
            .unwrap_or_default()
    };
    if key(c1) < key(c2) {
        (c1, c2)
    } else {
        (c2, c1)
    }
}

/// Recursively write the proof for a derived incompatibility.
pub(crate) fn write_error_message(
    arena: &[Incompatibility],
    id: IncompatibilityId,
    writer: &mut dyn SolvingErrorWriter,
) {
    let Some((c1, c2)) = arena[id].causes() else {
        return;
    };
    let incompatibility = &arena[id];

    if arena[c1].is_derived() && arena[c2].is_derived() {
        match (writer.tag(c1), writer.tag(c2)) {
            (Some(l1), Some(l2)) => {
                let (first, first_line, second, second_line) = if l1 < l2 {
                    (c1, l1, c2, l2)
                } else {
                    (c2, l2, c1, l1)
                };
                writer.write_two_causes_two_tags(
                    &arena[first],
                    &arena[second],
                    incompatibility,
                    first_line,
                    second_line,
                );
            }
            (Some(line), None) => {
                write_error_message(arena, c2, writer);
                writer.write_one_cause_one_tag(&arena[c1], incompatibility, line);
            }
            (None, Some(line)) => {
                write_error_message(arena, c1, writer);
                writer.write_one_cause_one_tag(&arena[c2], incompatibility, line);
            }
            (None, None) => {
                // When one branch is explained by a single "Because X and Y"
                // line, no tags are needed: write the other branch, then the
                // simple one, then conclude.
                if both_causes_external(arena, c1) {
                    write_error_message(arena, c2, writer);
                    write_error_message(arena, c1, writer);
                    writer.write_no_cause(incompatibility);
                    return;
                }
                if both_causes_external(arena, c2) {
                    write_error_message(arena, c1, writer);
                    write_error_message(arena, c2, writer);
                    writer.write_no_cause(incompatibility);
                    return;
                }

                let (first, second) = order_branches(arena, c1, c2);
                write_error_message(arena, first, writer);
                let line = writer.tag_last_line(first);
                writer.separate();
                write_error_message(arena, second, writer);
                writer.tag_last_line(second);
                writer.write_one_cause_one_tag(&arena[first], incompatibility, line);
            }
        }
        return;
    }

    if arena[c1].is_derived() != arena[c2].is_derived() {
        let (derived, external) = if arena[c1].is_derived() {
            (c1, c2)
        } else {
            (c2, c1)
        };

        if let Some(line) = writer.tag(derived) {
            writer.write_two_causes_one_tag(
                &arena[external],
                &arena[derived],
                incompatibility,
                line,
            );
            return;
        }

        let Some((dc1, dc2)) = arena[derived].causes() else {
            return;
        };

        // A nested single chain collapses: recurse into the derived
        // grandparent and attach the external parent to this conclusion
        if arena[dc1].is_derived() != arena[dc2].is_derived() {
            let prior_derived = if arena[dc1].is_derived() { dc1 } else { dc2 };
            let prior_external = if arena[dc1].is_derived() { dc2 } else { dc1 };
            write_error_message(arena, prior_derived, writer);
            writer.write_one_cause(&arena[prior_external], incompatibility);
            return;
        }

        write_error_message(arena, derived, writer);
        writer.write_one_cause(&arena[external], incompatibility);
        return;
    }

    // Both causes external: the one whose term for the shared package is
    // negative is the depending side and goes first
    let mut shared_package = None;
    for t1 in arena[c1].terms() {
        if arena[c2].get(t1.package()).is_some() {
            shared_package = Some(t1.package().to_string());
            break;
        }
    }
    let negative_first = shared_package
        .and_then(|shared| arena[c1].get(&shared))
        .map(|term| !term.is_positive())
        .unwrap_or(true);
    let (first, second) = if negative_first { (c1, c2) } else { (c2, c1) };
    writer.write_two_causes(&arena[first], &arena[second], incompatibility);
}

/// Replace successive `{}` placeholders in `template` with `args`.
fn fill(template: &str, args: &[&str]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut parts = template.split("{}");
    if let Some(first) = parts.next() {
        result.push_str(first);
    }
    for part in parts {
        if let Some(arg) = args.next() {
            result.push_str(arg);
        }
        result.push_str(part);
    }
    result
}

/// The connective templates of the standard writer. `{}` placeholders are
/// filled in order with cause strings and line tags.
#[derive(Debug, Clone)]
pub struct CauseStrings {
    pub two_causes: String,
    pub two_causes_final: String,
    pub two_causes_one_tag: String,
    pub two_causes_one_tag_final: String,
    pub two_causes_two_tags: String,
    pub two_causes_two_tags_final: String,
    pub one_cause: String,
    pub one_cause_final: String,
    pub one_cause_one_tag: String,
    pub one_cause_one_tag_final: String,
    pub no_cause: String,
}

impl Default for CauseStrings {
    fn default() -> Self {
        CauseStrings {
            two_causes: "Because {} and {}, {}.".to_string(),
            two_causes_final: "So, because {} and {}, {}.".to_string(),
            two_causes_one_tag: "Because {} and {} ({}), {}.".to_string(),
            two_causes_one_tag_final: "So, because {} and {} ({}), {}.".to_string(),
            two_causes_two_tags: "Because {} ({}) and {} ({}), {}.".to_string(),
            two_causes_two_tags_final: "So, because {} ({}) and {} ({}), {}.".to_string(),
            one_cause: "And because {}, {}.".to_string(),
            one_cause_final: "So, because {}, {}.".to_string(),
            one_cause_one_tag: "And because {} ({}), {}.".to_string(),
            one_cause_one_tag_final: "So, because {} ({}), {}.".to_string(),
            no_cause: "Thus, {}.".to_string(),
        }
    }
}

/// The phrase templates for individual incompatibilities.
#[derive(Debug, Clone)]
pub struct IncompatibilityStrings {
    pub resolving_failed: String,
    pub depends_on: String,
    pub installing: String,
    pub forbids: String,
    pub is_forbidden: String,
}

impl Default for IncompatibilityStrings {
    fn default() -> Self {
        IncompatibilityStrings {
            resolving_failed: "version solving failed".to_string(),
            depends_on: "{} depends on {}".to_string(),
            installing: "installing {}".to_string(),
            forbids: "{} forbids {}".to_string(),
            is_forbidden: "{} is forbidden".to_string(),
        }
    }
}

/// Renders a term, with or without its constraint
pub trait TermStringer {
    fn term(&self, term: &Term, include_version: bool) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct StandardTermStringer;

impl TermStringer for StandardTermStringer {
    fn term(&self, term: &Term, include_version: bool) -> String {
        if include_version {
            term.to_string()
        } else {
            term.package().to_string()
        }
    }
}

/// Renders a whole incompatibility as a cause phrase
pub trait IncompatibilityStringer {
    fn incompatibility_string(&self, incompatibility: &Incompatibility, root_package: &str)
        -> String;
}

pub struct StandardIncompatibilityStringer {
    strings: IncompatibilityStrings,
    term_stringer: Box<dyn TermStringer>,
}

impl Default for StandardIncompatibilityStringer {
    fn default() -> Self {
        StandardIncompatibilityStringer {
            strings: IncompatibilityStrings::default(),
            term_stringer: Box::new(StandardTermStringer),
        }
    }
}

impl StandardIncompatibilityStringer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strings(mut self, strings: IncompatibilityStrings) -> Self {
        self.strings = strings;
        self
    }

    pub fn with_term_stringer(mut self, term_stringer: Box<dyn TermStringer>) -> Self {
        self.term_stringer = term_stringer;
        self
    }
}

impl IncompatibilityStringer for StandardIncompatibilityStringer {
    fn incompatibility_string(
        &self,
        incompatibility: &Incompatibility,
        root_package: &str,
    ) -> String {
        let terms: Vec<&Term> = incompatibility.terms().collect();
        // The empty incompatibility and the root terminal both just mean
        // failure
        if terms.is_empty() || is_root_incompatibility(incompatibility, root_package) {
            return self.strings.resolving_failed.clone();
        }
        if terms.len() == 1 {
            let term = terms[0];
            // Conflict resolution only concludes positive single terms; a
            // negative one is rendered the same way rather than rejected
            let include_version = !term.constraint().is_any();
            return fill(
                &self.strings.is_forbidden,
                &[&self.term_stringer.term(term, include_version)],
            );
        }

        let (mut pkg, mut dep) = if terms[0].is_positive() {
            (terms[0].clone(), terms[1].clone())
        } else {
            (terms[1].clone(), terms[0].clone())
        };
        if dep.is_positive() {
            // Both terms positive: this came from an optional dependency,
            // whose dependency term carries an inverse constraint. Put the
            // depending side first and undo the inversion for phrasing.
            match incompatibility.dependant() {
                Some(dependant) => {
                    if pkg.package() != dependant {
                        std::mem::swap(&mut pkg, &mut dep);
                    }
                }
                None => {
                    // No recorded dependant; order by package name so the
                    // output is at least deterministic
                    if pkg.package() > dep.package() {
                        std::mem::swap(&mut pkg, &mut dep);
                    }
                }
            }
            dep = dep.inverse();
        }

        if pkg.package() == root_package {
            return fill(
                &self.strings.installing,
                &[&self.term_stringer.term(&dep, true)],
            );
        }
        if dep.constraint().is_empty() {
            return fill(
                &self.strings.forbids,
                &[
                    &self.term_stringer.term(&pkg, true),
                    &self.term_stringer.term(&dep, false),
                ],
            );
        }
        let include_dep_version = !dep.constraint().is_any();
        fill(
            &self.strings.depends_on,
            &[
                &self.term_stringer.term(&pkg, true),
                &self.term_stringer.term(&dep, include_dep_version),
            ],
        )
    }
}

/// The default writer: collects lines, assigns tags, and aligns untagged
/// lines with the widest tag label when assembling the final string.
pub struct StandardErrorWriter {
    next_tag: usize,
    lines: Vec<String>,
    line_tags: HashMap<usize, usize>,
    incompatibility_tags: HashMap<IncompatibilityId, usize>,
    root_package: String,
    cause_strings: CauseStrings,
    stringer: Box<dyn IncompatibilityStringer>,
}

impl StandardErrorWriter {
    pub fn new(root_package: &str) -> Self {
        StandardErrorWriter {
            next_tag: 1,
            lines: Vec::new(),
            line_tags: HashMap::new(),
            incompatibility_tags: HashMap::new(),
            root_package: root_package.to_string(),
            cause_strings: CauseStrings::default(),
            stringer: Box::new(StandardIncompatibilityStringer::new()),
        }
    }

    pub fn with_cause_strings(mut self, strings: CauseStrings) -> Self {
        self.cause_strings = strings;
        self
    }

    pub fn with_stringer(mut self, stringer: Box<dyn IncompatibilityStringer>) -> Self {
        self.stringer = stringer;
        self
    }

    fn cause_string(&self, incompatibility: &Incompatibility) -> String {
        self.stringer
            .incompatibility_string(incompatibility, &self.root_package)
    }

    fn is_root(&self, incompatibility: &Incompatibility) -> bool {
        is_root_incompatibility(incompatibility, &self.root_package)
    }

    fn write_line(&mut self, line: String) {
        self.lines.push(line);
    }

    /// Assemble the final message: tagged lines get their `N. ` label and
    /// untagged lines are left-padded to the widest label so they align.
    pub fn finish(&self) -> String {
        let indent = self
            .line_tags
            .values()
            .map(|tag| format!("{tag}. ").len())
            .max()
            .unwrap_or(0);

        let mut result = Vec::with_capacity(self.lines.len());
        for (i, line) in self.lines.iter().enumerate() {
            if line.is_empty() {
                result.push(String::new());
                continue;
            }
            let label = match self.line_tags.get(&i) {
                Some(tag) => format!("{tag}. "),
                None => String::new(),
            };
            result.push(format!(
                "{label}{}{line}",
                " ".repeat(indent - label.len())
            ));
        }
        result.join("\n")
    }
}

impl SolvingErrorWriter for StandardErrorWriter {
    fn tag_last_line(&mut self, incompatibility: IncompatibilityId) -> usize {
        let tag = self.next_tag;
        self.next_tag += 1;
        if !self.lines.is_empty() {
            self.line_tags.insert(self.lines.len() - 1, tag);
        }
        self.incompatibility_tags.insert(incompatibility, tag);
        tag
    }

    fn tag(&self, incompatibility: IncompatibilityId) -> Option<usize> {
        self.incompatibility_tags.get(&incompatibility).copied()
    }

    fn write_two_causes(
        &mut self,
        cause1: &Incompatibility,
        cause2: &Incompatibility,
        incompatibility: &Incompatibility,
    ) {
        let template = if self.is_root(incompatibility) {
            self.cause_strings.two_causes_final.clone()
        } else {
            self.cause_strings.two_causes.clone()
        };
        let line = fill(
            &template,
            &[
                &self.cause_string(cause1),
                &self.cause_string(cause2),
                &self.cause_string(incompatibility),
            ],
        );
        self.write_line(line);
    }

    fn write_two_causes_one_tag(
        &mut self,
        cause1: &Incompatibility,
        cause2: &Incompatibility,
        incompatibility: &Incompatibility,
        line2: usize,
    ) {
        let template = if self.is_root(incompatibility) {
            self.cause_strings.two_causes_one_tag_final.clone()
        } else {
            self.cause_strings.two_causes_one_tag.clone()
        };
        let line = fill(
            &template,
            &[
                &self.cause_string(cause1),
                &self.cause_string(cause2),
                &line2.to_string(),
                &self.cause_string(incompatibility),
            ],
        );
        self.write_line(line);
    }

    fn write_two_causes_two_tags(
        &mut self,
        cause1: &Incompatibility,
        cause2: &Incompatibility,
        incompatibility: &Incompatibility,
        line1: usize,
        line2: usize,
    ) {
        let template = if self.is_root(incompatibility) {
            self.cause_strings.two_causes_two_tags_final.clone()
        } else {
            self.cause_strings.two_causes_two_tags.clone()
        };
        let line = fill(
            &template,
            &[
                &self.cause_string(cause1),
                &line1.to_string(),
                &self.cause_string(cause2),
                &line2.to_string(),
                &self.cause_string(incompatibility),
            ],
        );
        self.write_line(line);
    }

    fn write_one_cause(&mut self, cause: &Incompatibility, incompatibility: &Incompatibility) {
        let template = if self.is_root(incompatibility) {
            self.cause_strings.one_cause_final.clone()
        } else {
            self.cause_strings.one_cause.clone()
        };
        let line = fill(
            &template,
            &[&self.cause_string(cause), &self.cause_string(incompatibility)],
        );
        self.write_line(line);
    }

    fn write_one_cause_one_tag(
        &mut self,
        cause: &Incompatibility,
        incompatibility: &Incompatibility,
        line: usize,
    ) {
        let template = if self.is_root(incompatibility) {
            self.cause_strings.one_cause_one_tag_final.clone()
        } else {
            self.cause_strings.one_cause_one_tag.clone()
        };
        let line = fill(
            &template,
            &[
                &self.cause_string(cause),
                &line.to_string(),
                &self.cause_string(incompatibility),
            ],
        );
        self.write_line(line);
    }

    fn write_no_cause(&mut self, incompatibility: &Incompatibility) {
        let line = fill(
            &self.cause_strings.no_cause.clone(),
            &[&self.cause_string(incompatibility)],
        );
        self.write_line(line);
    }

    fn separate(&mut self) {
        self.write_line(String::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_semver::Constraint;

    fn c(s: &str) -> Constraint {
        Constraint::parse(s).unwrap()
    }

    fn stringer() -> StandardIncompatibilityStringer {
        StandardIncompatibilityStringer::new()
    }

    #[test]
    fn test_fill() {
        assert_eq!(fill("Because {} and {}, {}.", &["a", "b", "c"]), "Because a and b, c.");
        assert_eq!(fill("no placeholders", &[]), "no placeholders");
    }

    #[test]
    fn test_root_incompatibility_string() {
        let terminal =
            Incompatibility::external(vec![Term::positive("$$root$$", Constraint::any())]);
        assert_eq!(
            stringer().incompatibility_string(&terminal, "$$root$$"),
            "version solving failed"
        );
    }

    #[test]
    fn test_forbidden_strings() {
        let any = Incompatibility::external(vec![Term::positive("foo", Constraint::any())]);
        assert_eq!(
            stringer().incompatibility_string(&any, "$$root$$"),
            "foo is forbidden"
        );

        let constrained =
            Incompatibility::external(vec![Term::positive("foo", c("<1.1.0"))]);
        assert_eq!(
            stringer().incompatibility_string(&constrained, "$$root$$"),
            "foo \"<1.1.0\" is forbidden"
        );
    }

    #[test]
    fn test_dependency_strings() {
        let dependency = Incompatibility::dependency(
            "foo",
            vec![
                Term::positive("foo", Constraint::any()),
                Term::negative("bar", c("^2.0.0")),
            ],
        );
        assert_eq!(
            stringer().incompatibility_string(&dependency, "$$root$$"),
            "every version of foo depends on bar \"^2.0.0\""
        );

        let from_root = Incompatibility::dependency(
            "$$root$$",
            vec![
                Term::positive("$$root$$", Constraint::any()),
                Term::negative("bar", c("^1.0.0")),
            ],
        );
        assert_eq!(
            stringer().incompatibility_string(&from_root, "$$root$$"),
            "installing bar \"^1.0.0\""
        );
    }

    #[test]
    fn test_optional_dependency_string_uses_dependant() {
        // Both terms positive: the dependency side carries the inverse
        // constraint, and the dependant marker picks the depending side
        let optional = Incompatibility::dependency(
            "foo",
            vec![
                Term::positive("foo", Constraint::any()),
                Term::positive("baz", c("^1.0.0").inverse()),
            ],
        );
        assert_eq!(
            stringer().incompatibility_string(&optional, "$$root$$"),
            "every version of foo depends on baz \"^1.0.0\""
        );
    }

    #[test]
    fn test_two_positive_terms_forbids() {
        let derived = Incompatibility::dependency(
            "foo",
            vec![
                Term::positive("bar", Constraint::any()),
                Term::positive("foo", Constraint::any()),
            ],
        );
        assert_eq!(
            stringer().incompatibility_string(&derived, "$$root$$"),
            "every version of foo forbids bar"
        );
    }

    #[test]
    fn test_finish_aligns_tagged_lines() {
        let mut writer = StandardErrorWriter::new("$$root$$");
        writer.write_line("first line".to_string());
        writer.tag_last_line(0);
        writer.separate();
        writer.write_line("second line".to_string());

        assert_eq!(writer.finish(), "1. first line\n\n   second line");
    }

    #[test]
    fn test_finish_without_tags_has_no_indent() {
        let mut writer = StandardErrorWriter::new("$$root$$");
        writer.write_line("only line".to_string());
        assert_eq!(writer.finish(), "only line");
    }
}
