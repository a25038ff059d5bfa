//! Test infrastructure for safety-rule expectation tests.
//!
//! Fixtures state the error findings the checker must report directly in the
//! source, using `//~` comments. Every line must match exactly: each
//! expected error reported, nothing else reported.
//!
//! # Test Organization
//!
//! Each fixture file is a test suite ("describe"), each function is a test
//! case ("it"):
//!
//! ```rust,ignore
//! // File: guards.rs - describes GVL guard exemptions
//! #[nogvl_safe]
//! fn else_branch_is_not_exempt() {
//!     if has_gvl() { unsafe_call(); } else {
//!         unsafe_call(); //~ nogvl-safety
//!     }
//! }
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use nogvl_check::testing::verify_file;
//!
//! let result = verify_file(&path);
//! if !result.passed() {
//!     panic!("{}", result);
//! }
//! ```

pub mod error;
pub mod expectation;

pub use error::{ExpectationFailure, FileTestResult, FnTestResult, MismatchKind, VerificationError};
pub use expectation::{ExpectedSite, Expectation, ExpectationSet};

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use ra_ap_syntax::ast::{self, HasModuleItem, HasName};
use ra_ap_syntax::{AstNode, SourceFile};

use crate::analysis::ViolationKind;
use crate::check::{Checker, UnitReport};
use crate::config::CheckConfig;
use expectation::byte_offset_to_line;

/// Name of the pseudo test case for lines outside any function.
const OUTSIDE_FUNCTIONS: &str = "(outside functions)";

/// A function discovered in a fixture file.
#[derive(Debug)]
pub struct FnTestCase {
    /// Function name (becomes the test name).
    pub name: String,
    /// Line range (start, end) - 0-indexed, inclusive.
    pub line_range: (u32, u32),
}

impl FnTestCase {
    fn contains(&self, line: u32) -> bool {
        line >= self.line_range.0 && line <= self.line_range.1
    }
}

/// Discover the top-level functions in a source file, in order.
pub fn discover_test_functions(source: &str) -> Vec<FnTestCase> {
    let parse = SourceFile::parse(source, ra_ap_syntax::Edition::Edition2021);
    let file = parse.tree();

    file.items()
        .filter_map(|item| match item {
            ast::Item::Fn(func) => Some(func),
            _ => None,
        })
        .filter_map(|func| {
            let name = func.name()?;
            let range = func.syntax().text_range();
            Some(FnTestCase {
                name: name.text().to_string(),
                line_range: (
                    byte_offset_to_line(source, range.start().into()),
                    byte_offset_to_line(source, range.end().into()),
                ),
            })
        })
        .collect()
}

/// Verify expectations in a fixture file with the default configuration.
pub fn verify_file(path: &Path) -> Result<FileTestResult, VerificationError> {
    let checker = Checker::new(&CheckConfig::default())?;
    let unit = checker.check_file(path)?;
    verify_unit(&unit)
}

/// Verify expectations in source code.
pub fn verify_source(path: &Path, source: &str) -> Result<FileTestResult, VerificationError> {
    verify_source_with(path, source, &CheckConfig::default())
}

/// Verify expectations in source code checked with `config`.
pub fn verify_source_with(
    path: &Path,
    source: &str,
    config: &CheckConfig,
) -> Result<FileTestResult, VerificationError> {
    let checker = Checker::new(config)?;
    verify_unit(&checker.check_source(path, source))
}

/// Compare a checked unit's error findings against its `//~` comments.
pub fn verify_unit(unit: &UnitReport) -> Result<FileTestResult, VerificationError> {
    let (expectations, errors) = ExpectationSet::parse(&unit.source);
    if !errors.is_empty() {
        return Err(VerificationError::ParseErrors(errors));
    }

    let mut expected: HashMap<u32, Vec<(ExpectedSite, ViolationKind)>> = HashMap::new();
    for (line, exps) in &expectations.by_line {
        expected
            .entry(*line)
            .or_default()
            .extend(exps.iter().map(|e| (e.site, e.rule)));
    }

    // Declaration findings point back at their call site; call-site errors
    // carry no related locations.
    let mut actual: HashMap<u32, Vec<(ExpectedSite, ViolationKind)>> = HashMap::new();
    for finding in unit.errors() {
        let site = if finding.related.is_empty() {
            ExpectedSite::Call
        } else {
            ExpectedSite::Declaration
        };
        actual
            .entry(finding.location.line)
            .or_default()
            .push((site, finding.rule));
    }

    let test_cases = discover_test_functions(&unit.source);
    let lines: Vec<&str> = unit.source.lines().collect();

    // Owner index → failures; `test_cases.len()` is the outside bucket.
    let mut by_owner: BTreeMap<usize, Vec<ExpectationFailure>> = BTreeMap::new();
    let mut all_lines: Vec<u32> = expected.keys().chain(actual.keys()).copied().collect();
    all_lines.sort_unstable();
    all_lines.dedup();

    for line in all_lines {
        let owner = test_cases
            .iter()
            .position(|case| case.contains(line))
            .unwrap_or(test_cases.len());
        let function = test_cases
            .get(owner)
            .map(|case| case.name.clone())
            .unwrap_or_else(|| OUTSIDE_FUNCTIONS.to_string());
        let source_line = lines.get(line as usize).map(|s| s.to_string()).unwrap_or_default();

        let failures = by_owner.entry(owner).or_default();
        let empty = Vec::new();
        for (kind, site, rule) in compare_line(
            expected.get(&line).unwrap_or(&empty),
            actual.get(&line).unwrap_or(&empty),
        ) {
            failures.push(ExpectationFailure {
                function: function.clone(),
                line: line + 1,
                kind,
                rule,
                site,
                source_line: source_line.clone(),
            });
        }
    }

    let functions = by_owner
        .into_iter()
        .map(|(owner, failures)| FnTestResult {
            name: test_cases
                .get(owner)
                .map(|case| case.name.clone())
                .unwrap_or_else(|| OUTSIDE_FUNCTIONS.to_string()),
            failures,
        })
        .collect();

    let result = FileTestResult {
        path: unit.path.clone(),
        functions,
    };

    if result.passed() {
        Ok(result)
    } else {
        Err(VerificationError::TestFailures(result))
    }
}

/// Multiset difference of one line's expected and actual errors.
fn compare_line(
    expected: &[(ExpectedSite, ViolationKind)],
    actual: &[(ExpectedSite, ViolationKind)],
) -> Vec<(MismatchKind, ExpectedSite, ViolationKind)> {
    let mut unmatched: Vec<_> = actual.to_vec();
    let mut mismatches = Vec::new();

    for item in expected {
        match unmatched.iter().position(|a| a == item) {
            Some(index) => {
                unmatched.remove(index);
            }
            None => mismatches.push((MismatchKind::Missing, item.0, item.1)),
        }
    }
    mismatches.extend(
        unmatched
            .into_iter()
            .map(|(site, rule)| (MismatchKind::Unexpected, site, rule)),
    );
    mismatches
}

/// Format test results for display.
pub fn format_results(result: &FileTestResult) -> String {
    let mut output = String::new();
    output.push_str(&format!("{}\n", result.path.display()));

    for func in &result.functions {
        if func.passed() {
            output.push_str(&format!("  \u{2713} {}\n", func.name));
        } else {
            output.push_str(&format!("  \u{2717} {}\n", func.name));
            for failure in &func.failures {
                output.push_str(&format!("      {}\n", failure));
            }
        }
    }

    output.push_str(&format!(
        "\n{} passed, {} failed\n",
        result.pass_count(),
        result.fail_count()
    ));

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verify(source: &str) -> Result<FileTestResult, VerificationError> {
        verify_source(Path::new("fixture.rs"), source)
    }

    #[test]
    fn test_discover_functions() {
        let source = r#"
fn first() {}

struct NotAFunction;

fn second() {
    first();
}
"#;
        let cases = discover_test_functions(source);
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].name, "first");
        assert_eq!(cases[0].line_range, (1, 1));
        assert_eq!(cases[1].name, "second");
        assert_eq!(cases[1].line_range, (5, 7));
    }

    #[test]
    fn test_matching_expectations_pass() {
        let source = r#"
#[nogvl_safe]
fn f1() {
    f2(); //~ nogvl-safety
}
fn f2() {} //~ decl nogvl-safety
"#;
        let result = verify(source).expect("expectations match");
        assert!(result.passed());
        assert_eq!(result.total(), 2);
    }

    #[test]
    fn test_missing_finding_fails() {
        let source = r#"
fn f1() {
    f2(); //~ gc-safety
}
fn f2() {}
"#;
        match verify(source) {
            Err(VerificationError::TestFailures(result)) => {
                let failure = &result.functions[0].failures[0];
                assert_eq!(failure.function, "f1");
                assert_eq!(failure.line, 3);
                assert_eq!(failure.kind, MismatchKind::Missing);
                assert_eq!(failure.rule, ViolationKind::GcSafety);
            }
            other => panic!("expected test failures, got {:?}", other.map(|r| r.total())),
        }
    }

    #[test]
    fn test_unexpected_finding_fails() {
        let source = r#"
#[gc_safe]
fn f1() {
    f2(); //~ gc-safety
}
fn f2() {}
"#;
        match verify(source) {
            Err(VerificationError::TestFailures(result)) => {
                assert_eq!(result.fail_count(), 1);
                let failure = &result.functions[1].failures[0];
                assert_eq!(failure.function, "f2");
                assert_eq!(failure.kind, MismatchKind::Unexpected);
                assert_eq!(failure.site, ExpectedSite::Declaration);
            }
            other => panic!("expected test failures, got {:?}", other.map(|r| r.total())),
        }
    }

    #[test]
    fn test_unknown_rule_is_a_parse_error() {
        assert!(matches!(
            verify("fn f() {} //~ gvl-safety\n"),
            Err(VerificationError::ParseErrors(_))
        ));
    }

    #[test]
    fn test_findings_outside_functions() {
        let source = r#"
extern "C" {
    fn callback(); //~ decl nogvl-transition
}
fn start() {
    rb_thread_call_without_gvl(callback); //~ nogvl-transition
}
"#;
        let result = verify(source).expect("expectations match");
        let names: Vec<_> = result.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["start", OUTSIDE_FUNCTIONS]);
    }

    #[test]
    fn test_compare_line_is_a_multiset_difference() {
        let gc = (ExpectedSite::Call, ViolationKind::GcSafety);
        let nogvl = (ExpectedSite::Call, ViolationKind::NoGvlSafety);
        assert!(compare_line(&[gc, nogvl], &[nogvl, gc]).is_empty());
        assert_eq!(
            compare_line(&[gc, gc], &[gc]),
            vec![(MismatchKind::Missing, ExpectedSite::Call, ViolationKind::GcSafety)]
        );
    }
}
