//! Error types for expectation verification.

use std::path::PathBuf;

use super::expectation::{ExpectedSite, ParseError};
use crate::analysis::ViolationKind;
use crate::check::CheckError;

/// How a line's findings disagreed with its expectations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchKind {
    /// Expected, but the checker did not report it.
    Missing,
    /// Reported, but not expected.
    Unexpected,
}

/// A single expectation failure.
#[derive(Debug, Clone)]
pub struct ExpectationFailure {
    /// Function name where the failure occurred.
    pub function: String,
    /// Line number (1-indexed).
    pub line: u32,
    pub kind: MismatchKind,
    pub rule: ViolationKind,
    pub site: ExpectedSite,
    /// The source line content.
    pub source_line: String,
}

impl std::fmt::Display for ExpectationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let what = match self.site {
            ExpectedSite::Call => format!("{} error", self.rule),
            ExpectedSite::Declaration => format!("{} declaration error", self.rule),
        };
        match self.kind {
            MismatchKind::Missing => write!(f, "line {}: expected {}, none reported", self.line, what)?,
            MismatchKind::Unexpected => write!(f, "line {}: unexpected {}", self.line, what)?,
        }
        write!(f, "\n          | {}", self.source_line.trim())
    }
}

/// Result of checking a single function's lines.
#[derive(Debug)]
pub struct FnTestResult {
    pub name: String,
    /// List of failures (empty if passed).
    pub failures: Vec<ExpectationFailure>,
}

impl FnTestResult {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of running all tests in a fixture file.
#[derive(Debug)]
pub struct FileTestResult {
    pub path: PathBuf,
    /// Results for each function in the file, plus one for lines outside
    /// any function when something is expected or reported there.
    pub functions: Vec<FnTestResult>,
}

impl FileTestResult {
    /// Returns true if all tests passed.
    pub fn passed(&self) -> bool {
        self.functions.iter().all(|f| f.passed())
    }

    pub fn pass_count(&self) -> usize {
        self.functions.iter().filter(|f| f.passed()).count()
    }

    pub fn fail_count(&self) -> usize {
        self.functions.iter().filter(|f| !f.passed()).count()
    }

    /// Total number of tests.
    pub fn total(&self) -> usize {
        self.functions.len()
    }
}

/// Error during verification.
#[derive(Debug)]
pub enum VerificationError {
    /// Malformed `//~` comments
    ParseErrors(Vec<ParseError>),
    /// The fixture could not be checked
    CheckFailed(CheckError),
    /// Test failures
    TestFailures(FileTestResult),
}

impl std::fmt::Display for VerificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationError::ParseErrors(errors) => {
                writeln!(f, "Parse errors:")?;
                for e in errors {
                    writeln!(f, "  {}", e)?;
                }
                Ok(())
            }
            VerificationError::CheckFailed(e) => write!(f, "Check failed: {}", e),
            VerificationError::TestFailures(result) => {
                writeln!(f, "{}", result.path.display())?;
                for func in &result.functions {
                    if func.passed() {
                        writeln!(f, "  \u{2713} {}", func.name)?;
                    } else {
                        writeln!(f, "  \u{2717} {}", func.name)?;
                        for failure in &func.failures {
                            writeln!(f, "      {}", failure)?;
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for VerificationError {}

impl From<CheckError> for VerificationError {
    fn from(e: CheckError) -> Self {
        VerificationError::CheckFailed(e)
    }
}
