//! Core analysis for GC-safe and NoGVL-safe call contracts.
//!
//! ## Architecture
//!
//! - **Query** (`query.rs`): the [`TreeQuery`] seam a host frontend implements
//! - **Annotations** (`annotations.rs`, `whitelist.rs`): what a declaration
//!   is safe for
//! - **Context / Guard** (`context.rs`, `guard.rs`): where a call sits
//! - **Engine** (`engine.rs`): the per-context and transition rules

mod annotations;
mod context;
mod engine;
mod guard;
mod query;
mod whitelist;

pub use annotations::{AnnotationKind, AnnotationModel, AnnotationSet, SafetyProfile};
pub use context::ContextResolver;
pub use engine::{analyze, SafetyRuleEngine, Violation, ViolationKind, DEFAULT_TRANSITION_FUNCTION};
pub use guard::GuardResolver;
pub use query::{Conditional, DeclKind, Declaration, ExprShape, Location, TreeQuery};
pub use whitelist::{NameWhitelist, BUILTIN_WHITELIST, WHITELIST_VERSION};
