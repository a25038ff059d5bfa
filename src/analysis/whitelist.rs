//! Names treated as NoGVL-safe by policy rather than by annotation.
//!
//! [`BUILTIN_WHITELIST`] is the single place that decides which runtime and
//! thread primitives may be called without holding the GVL. Editing it is a
//! policy change: bump [`WHITELIST_VERSION`] and note the reason in the
//! changelog. Projects can extend (never shrink) it through configuration.

use once_cell::sync::Lazy;
use regex::Regex;

/// Version of the built-in policy below.
pub const WHITELIST_VERSION: u32 = 1;

/// Built-in NoGVL-safe name patterns. Each must match the whole name.
pub const BUILTIN_WHITELIST: &[&str] = &[
    // POSIX thread primitives
    r"^pthread_.+$",
    // compiler builtins
    r"^__builtin.+$",
    // re-entering the GVL is the way out of a NoGVL region
    r"^rb_thread_call_with_gvl$",
    r"^ruby_vsnprintf$",
    r"^rb_bug$",
    r"^rb_thread_(current|main)$",
    // profiler native library
    r"^ddog_prof_.+$",
];

static BUILTIN: Lazy<Vec<Regex>> = Lazy::new(|| {
    BUILTIN_WHITELIST
        .iter()
        .map(|pattern| compile(pattern).expect("built-in whitelist pattern must compile"))
        .collect()
});

/// An ordered set of full-name patterns, fixed at construction.
#[derive(Debug, Clone)]
pub struct NameWhitelist {
    patterns: Vec<Regex>,
}

impl NameWhitelist {
    /// The built-in policy.
    pub fn builtin() -> Self {
        Self {
            patterns: BUILTIN.clone(),
        }
    }

    /// A whitelist with only the given patterns.
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| compile(pattern.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// The built-in policy followed by `extra` patterns.
    pub fn builtin_with<I, S>(extra: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut whitelist = Self::builtin();
        whitelist.patterns.extend(Self::new(extra)?.patterns);
        Ok(whitelist)
    }

    /// True iff any pattern matches the full name.
    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(name))
    }

    /// Source text of each pattern, in order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns
            .iter()
            .map(|pattern| strip_anchor_group(pattern.as_str()))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for NameWhitelist {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Compile a pattern so it can only match a whole name.
fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})$", pattern))
}

fn strip_anchor_group(compiled: &str) -> &str {
    compiled
        .strip_prefix("^(?:")
        .and_then(|rest| rest.strip_suffix(")$"))
        .unwrap_or(compiled)
}
