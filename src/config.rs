//! Checker configuration (`nogvl-check.toml`).
//!
//! ```toml
//! transition_function = "rb_thread_call_without_gvl"
//! whitelist = ["^my_safe_.+$"]
//! disabled_rules = ["gc-safety"]
//!
//! [annotations]
//! gc_safe = "gc_safe"
//! nogvl_safe = "nogvl_safe"
//! gvl_guard = "gvl_guard"
//! ```
//!
//! Every key is optional. Extra whitelist patterns are appended to the
//! built-in policy, never replace it.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::analysis::{NameWhitelist, SafetyRuleEngine, ViolationKind, DEFAULT_TRANSITION_FUNCTION};
use crate::frontend::AnnotationVocabulary;

/// File looked up in the working directory when no config is given.
pub const CONFIG_FILE_NAME: &str = "nogvl-check.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid whitelist pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckConfig {
    /// Name of the call that runs its first argument without the GVL.
    pub transition_function: String,
    /// Extra whitelist patterns, matched against whole names.
    pub whitelist: Vec<String>,
    pub disabled_rules: Vec<ViolationKind>,
    pub annotations: AnnotationVocabulary,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            transition_function: DEFAULT_TRANSITION_FUNCTION.to_string(),
            whitelist: Vec::new(),
            disabled_rules: Vec::new(),
            annotations: AnnotationVocabulary::default(),
        }
    }
}

impl CheckConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transition_function(mut self, name: impl Into<String>) -> Self {
        self.transition_function = name.into();
        self
    }

    pub fn with_whitelist_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.whitelist.push(pattern.into());
        self
    }

    pub fn with_disabled_rule(mut self, rule: ViolationKind) -> Self {
        if !self.disabled_rules.contains(&rule) {
            self.disabled_rules.push(rule);
        }
        self
    }

    pub fn with_annotations(mut self, annotations: AnnotationVocabulary) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// `path` if given, else [`CONFIG_FILE_NAME`] in `dir` if it exists,
    /// else the defaults.
    pub fn discover(path: Option<&Path>, dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    pub fn is_rule_enabled(&self, rule: ViolationKind) -> bool {
        !self.disabled_rules.contains(&rule)
    }

    /// The built-in whitelist plus this configuration's patterns.
    pub fn name_whitelist(&self) -> Result<NameWhitelist, ConfigError> {
        // Compile one at a time so the error names the bad pattern.
        for pattern in &self.whitelist {
            NameWhitelist::new([pattern.as_str()]).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
        }
        NameWhitelist::builtin_with(&self.whitelist).map_err(|source| ConfigError::InvalidPattern {
            pattern: self.whitelist.join(", "),
            source,
        })
    }

    /// Build the rule engine this configuration describes.
    pub fn engine(&self) -> Result<SafetyRuleEngine, ConfigError> {
        let engine = ViolationKind::ALL.into_iter().fold(
            SafetyRuleEngine::new(self.name_whitelist()?)
                .with_transition_function(self.transition_function.clone()),
            |engine, rule| engine.with_rule(rule, self.is_rule_enabled(rule)),
        );
        Ok(engine)
    }
}
