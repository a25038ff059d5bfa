//! nogvl-check: static verifier for GC-safe and NoGVL-safe call contracts
//!
//! Functions in Ruby native extensions may be annotated as safe to run while
//! the garbage collector is active (`gc_safe`) or without holding the global
//! VM lock (`nogvl_safe`). This library checks that annotated functions only
//! call functions with the same safety, that calls under a GVL guard `if` are
//! exempt from the NoGVL rule, and that the callback handed to
//! `rb_thread_call_without_gvl` is itself NoGVL-safe.
//!
//! ```rust,ignore
//! use nogvl_check::{analyze, SyntaxTree};
//!
//! let tree = SyntaxTree::parse(source);
//! for violation in analyze(&tree) {
//!     println!("{}: {}", violation.kind, violation.callee_name);
//! }
//! ```

pub mod analysis;
pub mod check;
pub mod config;
pub mod frontend;
pub mod output;
pub mod testing;
pub mod util;

pub use analysis::{analyze, AnnotationKind, NameWhitelist, SafetyRuleEngine, TreeQuery, Violation, ViolationKind};
pub use check::{CheckError, CheckReport, Checker, UnitReport};
pub use config::{CheckConfig, ConfigError};
pub use frontend::{AnnotationVocabulary, SyntaxTree};
pub use output::{render_report, Finding, OutputFormat, Severity};
