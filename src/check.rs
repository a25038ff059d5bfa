//! Checking translation units - read, parse, analyze, report.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::analysis::SafetyRuleEngine;
use crate::config::{CheckConfig, ConfigError};
use crate::frontend::{AnnotationVocabulary, SyntaxTree};
use crate::output::{findings_for, Finding, Severity};

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The outcome of checking one file.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub path: PathBuf,
    #[serde(skip)]
    pub source: String,
    pub findings: Vec<Finding>,
    /// Number of violations behind the findings.
    #[serde(skip)]
    pub violations: usize,
}

impl UnitReport {
    pub fn is_clean(&self) -> bool {
        self.violations == 0
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|finding| finding.severity == Severity::Error)
    }
}

/// The outcome of a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub files: Vec<UnitReport>,
    pub violations: usize,
}

impl CheckReport {
    pub fn push(&mut self, unit: UnitReport) {
        self.violations += unit.violations;
        self.files.push(unit);
    }

    pub fn is_clean(&self) -> bool {
        self.violations == 0
    }
}

/// Checks files against one configuration.
pub struct Checker {
    engine: SafetyRuleEngine,
    vocabulary: AnnotationVocabulary,
}

impl Checker {
    pub fn new(config: &CheckConfig) -> Result<Self, CheckError> {
        Ok(Self {
            engine: config.engine()?,
            vocabulary: config.annotations.clone(),
        })
    }

    /// Check source text already in memory.
    pub fn check_source(&self, path: &Path, source: &str) -> UnitReport {
        let tree = SyntaxTree::parse_with(source, &self.vocabulary);
        if !tree.parse_errors().is_empty() {
            tracing::warn!(
                "{}: {} parse error(s), checking the recovered tree",
                path.display(),
                tree.parse_errors().len()
            );
        }

        let violations = self.engine.analyze(&tree);
        tracing::debug!("{}: {} violation(s)", path.display(), violations.len());

        UnitReport {
            path: path.to_path_buf(),
            source: source.to_string(),
            findings: findings_for(&violations),
            violations: violations.len(),
        }
    }

    pub fn check_file(&self, path: &Path) -> Result<UnitReport, CheckError> {
        let source = std::fs::read_to_string(path).map_err(|source| CheckError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.check_source(path, &source))
    }

    /// Check every file named by `paths`, expanding directories.
    pub fn check_paths(&self, paths: &[PathBuf]) -> Result<CheckReport, CheckError> {
        let mut report = CheckReport::default();
        for file in collect_sources(paths)? {
            report.push(self.check_file(&file)?);
        }
        Ok(report)
    }
}

/// Expand directories into their `.rs` files, sorted. Files given directly
/// are kept whatever their extension.
pub fn collect_sources(paths: &[PathBuf]) -> Result<Vec<PathBuf>, CheckError> {
    let mut files = Vec::new();

    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(path).follow_links(false) {
            let entry = entry.map_err(|source| CheckError::Walk {
                path: path.clone(),
                source,
            })?;
            if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "rs") {
                found.push(entry.into_path());
            }
        }
        found.sort();
        tracing::debug!("{}: {} source file(s)", path.display(), found.len());
        files.extend(found);
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ViolationKind;
    use std::fs;

    const UNSAFE_CALL: &str = r#"
#[nogvl_safe]
fn f1() { f2(); }
fn f2() {}
"#;

    #[test]
    fn test_check_source_counts_violations() {
        let checker = Checker::new(&CheckConfig::default()).unwrap();
        let unit = checker.check_source(Path::new("a.rs"), UNSAFE_CALL);
        assert_eq!(unit.violations, 1);
        assert_eq!(unit.findings.len(), 3);
        assert_eq!(unit.errors().count(), 2);
        assert!(!unit.is_clean());
    }

    #[test]
    fn test_disabled_rule_is_clean() {
        let config = CheckConfig::new().with_disabled_rule(ViolationKind::NoGvlSafety);
        let checker = Checker::new(&config).unwrap();
        assert!(checker.check_source(Path::new("a.rs"), UNSAFE_CALL).is_clean());
    }

    #[test]
    fn test_custom_vocabulary_reaches_frontend() {
        let config = CheckConfig::new().with_annotations(AnnotationVocabulary {
            nogvl_safe: "datadog_ruby_nogvl_safe".to_string(),
            ..AnnotationVocabulary::default()
        });
        let checker = Checker::new(&config).unwrap();
        // The default spelling is no longer recognized.
        assert!(checker.check_source(Path::new("a.rs"), UNSAFE_CALL).is_clean());

        let source = UNSAFE_CALL.replace("nogvl_safe", "annotate(\"datadog_ruby_nogvl_safe\")");
        assert_eq!(checker.check_source(Path::new("a.rs"), &source).violations, 1);
    }

    #[test]
    fn test_parse_errors_do_not_stop_the_check() {
        let checker = Checker::new(&CheckConfig::default()).unwrap();
        let source = format!("{}\nfn broken( {{", UNSAFE_CALL);
        assert_eq!(checker.check_source(Path::new("a.rs"), &source).violations, 1);
    }

    #[test]
    fn test_collect_sources_walks_directories_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.rs"), "").unwrap();
        fs::write(dir.path().join("a.rs"), "").unwrap();
        fs::write(dir.path().join("nested").join("c.rs"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = collect_sources(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.rs", "b.rs", "nested/c.rs"]);
    }

    #[test]
    fn test_check_paths_aggregates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.rs"), UNSAFE_CALL).unwrap();
        fs::write(dir.path().join("good.rs"), "fn main() {}").unwrap();

        let checker = Checker::new(&CheckConfig::default()).unwrap();
        let report = checker.check_paths(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.violations, 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let checker = Checker::new(&CheckConfig::default()).unwrap();
        let err = checker
            .check_paths(&[PathBuf::from("/nonexistent/file.rs")])
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/file.rs"));
    }
}
