//! End-to-end solver scenarios against an in-memory catalog

use std::collections::HashMap;

use keel_resolver::{
    solve, standard_version_priority, PackageVersion, SolveError, Source, SourceError,
};
use keel_semver::{Constraint, Version};

const ROOT: &str = "$$root$$";

struct MockSource {
    packages: HashMap<String, Vec<PackageVersion>>,
}

impl MockSource {
    fn new() -> MockSource {
        MockSource {
            packages: HashMap::new(),
        }
    }

    fn package(mut self, name: &str, versions: Vec<PackageVersion>) -> MockSource {
        self.packages.insert(name.to_string(), versions);
        self
    }
}

impl Source for MockSource {
    fn get_package_versions(&self, package: &str) -> Result<Vec<PackageVersion>, SourceError> {
        self.packages
            .get(package)
            .cloned()
            .ok_or_else(|| format!("package not found: {package}").into())
    }

    fn pick_version(&self, _package: &str, candidates: &[Version]) -> Version {
        standard_version_priority(candidates)
            .expect("candidates are never empty")
            .clone()
    }
}

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

fn c(s: &str) -> Constraint {
    Constraint::parse(s).unwrap()
}

fn pv(version: &str) -> PackageVersion {
    PackageVersion::new(v(version))
}

fn expect_solving_error(result: Result<indexmap::IndexMap<String, Version>, SolveError>) -> String {
    match result {
        Ok(resolved) => panic!("expected an error, but resolved successfully: {resolved:?}"),
        Err(SolveError::Solving(error)) => error.to_string(),
        Err(other) => panic!("expected a solving error, got: {other}"),
    }
}

#[test]
fn conflict_resolution_with_partial_satisfier() {
    let source = MockSource::new()
        .package(
            ROOT,
            vec![pv("1.0.0")
                .with_dependency("foo", c("^1.0.0"))
                .with_dependency("target", c("^2.0.0"))],
        )
        .package(
            "foo",
            vec![
                pv("1.1.0")
                    .with_dependency("left", c("^1.0.0"))
                    .with_dependency("right", c("^1.0.0")),
                pv("1.0.0"),
            ],
        )
        .package(
            "left",
            vec![pv("1.0.0").with_dependency("shared", c(">=1.0.0"))],
        )
        .package(
            "right",
            vec![pv("1.0.0").with_dependency("shared", c("<2.0.0"))],
        )
        .package(
            "shared",
            vec![
                pv("2.0.0"),
                pv("1.0.0").with_dependency("target", c("^1.0.0")),
            ],
        )
        .package("target", vec![pv("2.0.0"), pv("1.0.0")]);

    let result = solve(&source, ROOT).unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result.get("foo"), Some(&v("1.0.0")));
    assert_eq!(result.get("target"), Some(&v("2.0.0")));
}

#[test]
fn linear_error_reporting() {
    let source = MockSource::new()
        .package(
            ROOT,
            vec![pv("1.0.0")
                .with_dependency("foo", c("^1.0.0"))
                .with_dependency("baz", c("^1.0.0"))],
        )
        .package("foo", vec![pv("1.0.0").with_dependency("bar", c("^2.0.0"))])
        .package("bar", vec![pv("2.0.0").with_dependency("baz", c("^3.0.0"))])
        .package("baz", vec![pv("1.0.0"), pv("3.0.0")]);

    let message = expect_solving_error(solve(&source, ROOT));
    assert_eq!(
        message,
        "Because every version of foo depends on bar \"^2.0.0\" and every version of bar depends on baz \"^3.0.0\", every version of foo depends on baz \"^3.0.0\".\n\
         So, because installing baz \"^1.0.0\", version solving failed."
    );
}

#[test]
fn branching_error_reporting() {
    let source = MockSource::new()
        .package(
            ROOT,
            vec![pv("1.0.0").with_dependency("foo", c("^1.0.0"))],
        )
        .package(
            "foo",
            vec![
                pv("1.0.0")
                    .with_dependency("a", c("^1.0.0"))
                    .with_dependency("b", c("^1.0.0")),
                pv("1.1.0")
                    .with_dependency("x", c("^1.0.0"))
                    .with_dependency("y", c("^1.0.0")),
            ],
        )
        .package("a", vec![pv("1.0.0").with_dependency("b", c("^2.0.0"))])
        .package("b", vec![pv("1.0.0"), pv("2.0.0")])
        .package("x", vec![pv("1.0.0").with_dependency("y", c("^2.0.0"))])
        .package("y", vec![pv("1.0.0"), pv("2.0.0")]);

    let message = expect_solving_error(solve(&source, ROOT));
    assert_eq!(
        message,
        "   Because foo \"<1.1.0\" depends on a \"^1.0.0\" and every version of a depends on b \"^2.0.0\", foo \"<1.1.0\" depends on b \"^2.0.0\".\n\
         1. And because foo \"<1.1.0\" depends on b \"^1.0.0\", foo \"<1.1.0\" is forbidden.\n\
         \n\
         \x20  Because foo \">=1.1.0\" depends on x \"^1.0.0\" and every version of x depends on y \"^2.0.0\", foo \">=1.1.0\" depends on y \"^2.0.0\".\n\
         2. And because foo \">=1.1.0\" depends on y \"^1.0.0\", foo \">=1.1.0\" is forbidden.\n\
         \x20  And because foo \"<1.1.0\" is forbidden (1), foo is forbidden.\n\
         \x20  So, because installing foo \"^1.0.0\", version solving failed."
    );
}

#[test]
fn optional_dependency_present_incompatible() {
    let source = MockSource::new()
        .package(
            ROOT,
            vec![pv("1.0.0")
                .with_dependency("foo", c("^1.0.0"))
                .with_dependency("bar", c("^1.0.0"))],
        )
        .package(
            "foo",
            vec![pv("1.0.0").with_optional_dependency("baz", c("^1.0.0"))],
        )
        .package("bar", vec![pv("1.0.0").with_dependency("baz", c("^2.0.0"))])
        .package("baz", vec![pv("1.0.0"), pv("2.0.0")]);

    let message = expect_solving_error(solve(&source, ROOT));
    assert_eq!(
        message,
        "Because every version of bar depends on baz \"^2.0.0\" and every version of foo depends on baz \"^1.0.0\", every version of foo forbids bar.\n\
         So, because installing bar \"^1.0.0\", version solving failed."
    );
}

#[test]
fn optional_dependency_not_chosen() {
    let source = MockSource::new()
        .package(
            ROOT,
            vec![pv("1.0.0").with_dependency("foo", c("^1.0.0"))],
        )
        .package(
            "foo",
            vec![pv("1.0.0").with_optional_dependency("baz", c("^1.0.0"))],
        )
        .package(
            "bar",
            vec![
                pv("1.0.0").with_dependency("baz", c("^1.0.0")),
                pv("1.0.1").with_dependency("baz", c("^2.0.0")),
            ],
        )
        .package("baz", vec![pv("1.0.0"), pv("2.0.0")]);

    let result = solve(&source, ROOT).unwrap();

    // baz is optional and nothing else requires it, so it stays absent
    assert_eq!(result.len(), 1);
    assert_eq!(result.get("foo"), Some(&v("1.0.0")));
}

#[test]
fn optional_dependency_compatible() {
    let source = MockSource::new()
        .package(
            ROOT,
            vec![pv("1.0.0")
                .with_dependency("foo", c("^1.0.0"))
                .with_dependency("bar", c("^1.0.0"))],
        )
        .package(
            "foo",
            vec![pv("1.0.0").with_optional_dependency("baz", c("^1.0.0"))],
        )
        .package("bar", vec![pv("1.0.0").with_dependency("baz", c("^1.0.0"))])
        .package("baz", vec![pv("1.0.0"), pv("2.0.0")]);

    let result = solve(&source, ROOT).unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(result.get("foo"), Some(&v("1.0.0")));
    assert_eq!(result.get("bar"), Some(&v("1.0.0")));
    // the optional constraint holds once baz is pulled in by bar
    assert_eq!(result.get("baz"), Some(&v("1.0.0")));
}

#[test]
fn deterministic_across_runs() {
    let build = || {
        MockSource::new()
            .package(
                ROOT,
                vec![pv("1.0.0")
                    .with_dependency("foo", c("^1.0.0"))
                    .with_dependency("bar", c("*"))],
            )
            .package(
                "foo",
                vec![
                    pv("1.0.0"),
                    pv("1.2.0").with_dependency("bar", c("<2.0.0")),
                    pv("1.5.0").with_dependency("bar", c("<2.0.0")),
                ],
            )
            .package("bar", vec![pv("1.0.0"), pv("1.9.0"), pv("2.1.0")])
    };

    let first = solve(&build(), ROOT).unwrap();
    for _ in 0..5 {
        let again = solve(&build(), ROOT).unwrap();
        assert_eq!(first, again);
    }
}

#[test]
fn resolved_versions_satisfy_all_constraints() {
    let source = MockSource::new()
        .package(
            ROOT,
            vec![pv("1.0.0")
                .with_dependency("a", c("^1.0.0"))
                .with_dependency("b", c("^1.0.0"))],
        )
        .package(
            "a",
            vec![
                pv("1.0.0").with_dependency("shared", c(">=1.0.0 <3.0.0")),
                pv("1.1.0").with_dependency("shared", c(">=2.0.0 <3.0.0")),
            ],
        )
        .package(
            "b",
            vec![pv("1.0.0").with_dependency("shared", c("<2.5.0"))],
        )
        .package("shared", vec![pv("1.0.0"), pv("2.0.0"), pv("2.4.0"), pv("2.9.0")]);

    let result = solve(&source, ROOT).unwrap();

    // every constraint imposed by a resolved package on another holds
    for (package, version) in &result {
        let versions = source.get_package_versions(package).unwrap();
        let data = versions.iter().find(|entry| entry.version == *version).unwrap();
        for (dependency, constraint) in &data.dependencies {
            let resolved = result
                .get(dependency)
                .unwrap_or_else(|| panic!("{dependency} missing from the result"));
            assert!(
                constraint.contains(resolved),
                "{package} {version} requires {dependency} \"{constraint}\", got {resolved}"
            );
        }
    }
}

#[test]
fn prerelease_only_picked_when_allowed() {
    let source = MockSource::new()
        .package(
            ROOT,
            vec![pv("1.0.0").with_dependency("foo", c(">=1.0.0"))],
        )
        .package("foo", vec![pv("1.0.0"), pv("2.0.0-alpha")]);

    let result = solve(&source, ROOT).unwrap();
    // 2.0.0-alpha is not admitted by >=1.0.0
    assert_eq!(result.get("foo"), Some(&v("1.0.0")));
}

#[test]
fn missing_package_surfaces_source_error() {
    let source = MockSource::new().package(
        ROOT,
        vec![pv("1.0.0").with_dependency("ghost", c("^1.0.0"))],
    );

    match solve(&source, ROOT) {
        Err(SolveError::Source { package, .. }) => assert_eq!(package, "ghost"),
        other => panic!("expected a source error, got {other:?}"),
    }
}
