//! Expectation parsing for safety-rule tests.
//!
//! This module provides types and parsing for `//~` comments that state which
//! error findings a fixture line must produce.
//!
//! Uses rust-analyzer's parser to extract comments, so line numbers agree with
//! what the checker sees.
//!
//! # Syntax
//!
//! ```text
//! //~ nogvl-safety                 // call-site error on this line
//! //~ gc-safety, nogvl-safety      // several errors on this line
//! //~ decl nogvl-safety            // declaration-site error on this line
//! //~^ nogvl-transition            // applies to the line above
//! //~^^ decl gc-safety             // two lines above
//! ```
//!
//! # Rules
//!
//! | Name | Violation |
//! |------|-----------|
//! | `gc-safety` | unsafe call in a GC-safe context |
//! | `nogvl-safety` | unsafe call in a NoGVL-safe context |
//! | `nogvl-transition` | NoGVL-unsafe function passed to the transition call |

use ra_ap_syntax::{SourceFile, SyntaxKind, SyntaxToken};
use std::collections::HashMap;

use crate::analysis::ViolationKind;

/// Which half of a violation an expectation is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExpectedSite {
    /// The offending call (or transition argument).
    Call,
    /// The callee's declaration.
    Declaration,
}

/// A single expected error finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub rule: ViolationKind,
    pub site: ExpectedSite,
    /// Line number (0-indexed).
    pub line: u32,
}

impl Expectation {
    /// `decl nogvl-safety` or `nogvl-safety`.
    pub fn describe(&self) -> String {
        match self.site {
            ExpectedSite::Call => self.rule.to_string(),
            ExpectedSite::Declaration => format!("decl {}", self.rule),
        }
    }
}

/// Error during expectation parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Not one of the rule identifiers
    UnknownRule { line: u32, text: String },
    /// `decl` with nothing after it
    MissingRule { line: u32 },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::UnknownRule { line, text } => {
                write!(f, "line {}: unknown rule: '{}'", line + 1, text)
            }
            ParseError::MissingRule { line } => write!(f, "line {}: missing rule after 'decl'", line + 1),
        }
    }
}

impl std::error::Error for ParseError {}

/// All expectations for a source file, grouped by line.
#[derive(Debug, Default)]
pub struct ExpectationSet {
    /// Expectations grouped by line number (0-indexed).
    pub by_line: HashMap<u32, Vec<Expectation>>,
}

impl ExpectationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse all `//~` expectations from source code.
    ///
    /// Returns the expectation set and any parse errors encountered.
    pub fn parse(source: &str) -> (Self, Vec<ParseError>) {
        let mut set = ExpectationSet::new();
        let mut errors = Vec::new();

        let parse = SourceFile::parse(source, ra_ap_syntax::Edition::Edition2021);
        let syntax = parse.syntax_node();

        for token in syntax.descendants_with_tokens().filter_map(|it| it.into_token()) {
            if !is_expectation_comment(&token) {
                continue;
            }

            let line_num = byte_offset_to_line(source, token.text_range().start().into());
            let after_marker = &token.text()[3..];
            let (target_line, expectation_text) = parse_line_offset(after_marker, line_num);

            match parse_expectation_content(expectation_text.trim(), target_line) {
                Ok(expectations) => {
                    if !expectations.is_empty() {
                        set.by_line.entry(target_line).or_default().extend(expectations);
                    }
                }
                Err(e) => errors.push(e),
            }
        }

        (set, errors)
    }

    pub fn get(&self, line: u32) -> Option<&Vec<Expectation>> {
        self.by_line.get(&line)
    }

    pub fn is_empty(&self) -> bool {
        self.by_line.is_empty()
    }

    /// Total number of expectations.
    pub fn len(&self) -> usize {
        self.by_line.values().map(|v| v.len()).sum()
    }
}

fn is_expectation_comment(token: &SyntaxToken) -> bool {
    token.kind() == SyntaxKind::COMMENT && token.text().starts_with("//~")
}

/// Convert byte offset to 0-indexed line number.
pub(crate) fn byte_offset_to_line(source: &str, offset: usize) -> u32 {
    source.as_bytes()[..offset.min(source.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count() as u32
}

/// Parse line offset markers (^) and return (target_line, remaining_text).
fn parse_line_offset(text: &str, current_line: u32) -> (u32, &str) {
    let caret_count = text.chars().take_while(|&c| c == '^').count();
    let target = current_line.saturating_sub(caret_count as u32);
    (target, &text[caret_count..])
}

/// Parse `rule`, `decl rule`, or a comma-separated list of them.
fn parse_expectation_content(text: &str, line: u32) -> Result<Vec<Expectation>, ParseError> {
    text.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_single_expectation(part, line))
        .collect()
}

fn parse_single_expectation(text: &str, line: u32) -> Result<Expectation, ParseError> {
    let (site, rule_text) = match text.strip_prefix("decl") {
        Some(rest) if rest.is_empty() => return Err(ParseError::MissingRule { line }),
        Some(rest) if rest.starts_with(char::is_whitespace) => (ExpectedSite::Declaration, rest.trim()),
        _ => (ExpectedSite::Call, text),
    };

    let rule = ViolationKind::parse(rule_text).ok_or_else(|| ParseError::UnknownRule {
        line,
        text: rule_text.to_string(),
    })?;

    Ok(Expectation {
        rule,
        site,
        line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_expectation() {
        let exp = parse_single_expectation("nogvl-safety", 1).unwrap();
        assert_eq!(exp.rule, ViolationKind::NoGvlSafety);
        assert_eq!(exp.site, ExpectedSite::Call);
        assert_eq!(exp.describe(), "nogvl-safety");
    }

    #[test]
    fn test_parse_declaration_expectation() {
        let exp = parse_single_expectation("decl gc-safety", 1).unwrap();
        assert_eq!(exp.rule, ViolationKind::GcSafety);
        assert_eq!(exp.site, ExpectedSite::Declaration);
        assert_eq!(exp.describe(), "decl gc-safety");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_single_expectation("gc_safety", 4),
            Err(ParseError::UnknownRule { line: 4, .. })
        ));
        assert_eq!(
            parse_single_expectation("decl", 2),
            Err(ParseError::MissingRule { line: 2 })
        );
    }

    #[test]
    fn test_parse_expectation_set() {
        let source = r#"
#[gc_safe] #[nogvl_safe]
fn f() {
    g(); //~ gc-safety, nogvl-safety
}
fn g() {} //~ decl gc-safety, decl nogvl-safety
"#;
        let (set, errors) = ExpectationSet::parse(source);
        assert!(errors.is_empty(), "errors: {:?}", errors);
        assert_eq!(set.len(), 4);

        let call_line = set.get(3).unwrap();
        assert_eq!(call_line.len(), 2);
        assert!(call_line.iter().all(|e| e.site == ExpectedSite::Call));

        let decl_line = set.get(5).unwrap();
        assert!(decl_line.iter().all(|e| e.site == ExpectedSite::Declaration));
    }

    #[test]
    fn test_parse_line_above() {
        let source = r#"
fn test() {
    rb_thread_call_without_gvl(callback);
    //~^ nogvl-transition
    //~^^ nogvl-transition
}
"#;
        let (set, errors) = ExpectationSet::parse(source);
        assert!(errors.is_empty());
        assert_eq!(set.get(2).map(Vec::len), Some(2));
        assert!(set.get(3).is_none());
    }

    #[test]
    fn test_ordinary_comments_are_ignored() {
        let (set, errors) = ExpectationSet::parse("// nogvl-safety\n/* //~ gc-safety */\nfn f() {}\n");
        assert!(errors.is_empty());
        assert!(set.is_empty());
    }
}
