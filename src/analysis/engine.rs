//! The safety rule engine.
//!
//! Two independent rules run over every call in a unit:
//!
//! - **Per-context rule**: inside a function annotated GC-safe and/or
//!   NoGVL-safe, every callee must carry the same safety. NoGVL violations
//!   are waived inside a GVL guard's "then" branch; GC violations never are.
//! - **Transition rule**: the function handed to the transition entry point
//!   (`rb_thread_call_without_gvl` by default) runs without the GVL, so it
//!   must be NoGVL-safe on its own terms, wherever the call appears.
//!
//! Unresolved callees classify as unsafe, so an indirect call inside a safety
//! context is reported rather than skipped.

use serde::{Deserialize, Serialize};

use super::annotations::AnnotationModel;
use super::context::ContextResolver;
use super::guard::GuardResolver;
use super::query::{Declaration, Location, TreeQuery};
use super::whitelist::NameWhitelist;

/// Default name of the call that runs a function without the GVL.
pub const DEFAULT_TRANSITION_FUNCTION: &str = "rb_thread_call_without_gvl";

/// The kind of contract a violation breaks. Doubles as the rule identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ViolationKind {
    #[serde(rename = "gc-safety")]
    GcSafety,
    #[serde(rename = "nogvl-safety")]
    NoGvlSafety,
    #[serde(rename = "nogvl-transition")]
    TransitionSafety,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 3] = [
        ViolationKind::GcSafety,
        ViolationKind::NoGvlSafety,
        ViolationKind::TransitionSafety,
    ];

    /// Stable rule identifier, as used in configuration and output.
    pub fn rule(&self) -> &'static str {
        match self {
            ViolationKind::GcSafety => "gc-safety",
            ViolationKind::NoGvlSafety => "nogvl-safety",
            ViolationKind::TransitionSafety => "nogvl-transition",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.rule() == s.trim())
    }
}

impl std::str::FromStr for ViolationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!("unknown rule '{}'; expected: gc-safety, nogvl-safety, nogvl-transition", s)
        })
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.rule())
    }
}

/// One broken contract at one call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Where the offending call (or transition argument) is.
    pub site: Location,
    /// Name of the function being called unsafely.
    pub callee_name: String,
    /// The callee's declaration, absent for indirect calls.
    pub callee: Option<Declaration>,
    /// The annotated function the call sits in, or the transition function.
    pub context_name: String,
}

/// Per-call decisions, combining annotation model, context, and guards.
#[derive(Debug, Clone)]
pub struct SafetyRuleEngine {
    whitelist: NameWhitelist,
    transition_function: String,
    enabled: [bool; 3],
}

impl Default for SafetyRuleEngine {
    fn default() -> Self {
        Self::new(NameWhitelist::builtin())
    }
}

impl SafetyRuleEngine {
    pub fn new(whitelist: NameWhitelist) -> Self {
        Self {
            whitelist,
            transition_function: DEFAULT_TRANSITION_FUNCTION.to_string(),
            enabled: [true; 3],
        }
    }

    pub fn with_transition_function(mut self, name: impl Into<String>) -> Self {
        self.transition_function = name.into();
        self
    }

    pub fn with_rule(mut self, kind: ViolationKind, enabled: bool) -> Self {
        self.enabled[kind as usize] = enabled;
        self
    }

    pub fn is_enabled(&self, kind: ViolationKind) -> bool {
        self.enabled[kind as usize]
    }

    pub fn whitelist(&self) -> &NameWhitelist {
        &self.whitelist
    }

    pub fn transition_function(&self) -> &str {
        &self.transition_function
    }

    /// Check every call in the tree. The result is ordered by site, then kind.
    pub fn analyze<T: TreeQuery>(&self, tree: &T) -> Vec<Violation> {
        let mut violations = Vec::new();

        for call in tree.all_calls() {
            self.check_call(tree, &call, &mut violations);
            self.check_transition(tree, &call, &mut violations);
        }

        violations.sort_by(|a, b| (a.site, a.kind).cmp(&(b.site, b.kind)));
        tracing::debug!("analysis complete: {} violation(s)", violations.len());
        violations
    }

    /// The per-context rule for one call.
    fn check_call<T: TreeQuery>(&self, tree: &T, call: &T::Node, out: &mut Vec<Violation>) {
        let Some(context) = ContextResolver.find_context(tree, call) else {
            return;
        };

        let model = AnnotationModel::new(&self.whitelist);
        let context_profile = model.classify(Some(&context));
        if !context_profile.gc_safe && !context_profile.nogvl_safe {
            return;
        }

        let callee = tree.direct_callee(call);
        let callee_profile = model.classify(callee.as_ref());
        let site = tree.location(call);

        if self.is_enabled(ViolationKind::GcSafety)
            && context_profile.gc_safe
            && !callee_profile.gc_safe
        {
            out.push(Violation {
                kind: ViolationKind::GcSafety,
                site,
                callee_name: tree.callee_name(call),
                callee: callee.clone(),
                context_name: context.name.clone(),
            });
        }

        if self.is_enabled(ViolationKind::NoGvlSafety)
            && context_profile.nogvl_safe
            && !callee_profile.nogvl_safe
        {
            if GuardResolver.is_guard_exempted(tree, call) {
                tracing::trace!(callee = %tree.callee_name(call), "exempted by GVL guard");
            } else {
                out.push(Violation {
                    kind: ViolationKind::NoGvlSafety,
                    site,
                    callee_name: tree.callee_name(call),
                    callee,
                    context_name: context.name,
                });
            }
        }
    }

    /// The transition rule for one call. Ignores context and guards.
    fn check_transition<T: TreeQuery>(&self, tree: &T, call: &T::Node, out: &mut Vec<Violation>) {
        if !self.is_enabled(ViolationKind::TransitionSafety)
            || tree.callee_name(call) != self.transition_function
        {
            return;
        }

        let Some(argument) = tree.argument(call, 0) else {
            return;
        };
        let Some(function) = tree
            .declaration_of(&argument)
            .filter(Declaration::is_function_like)
        else {
            return;
        };

        let profile = AnnotationModel::new(&self.whitelist).classify(Some(&function));
        if profile.nogvl_safe {
            return;
        }

        out.push(Violation {
            kind: ViolationKind::TransitionSafety,
            site: tree.location(&argument),
            callee_name: function.name.clone(),
            callee: Some(function),
            context_name: self.transition_function.clone(),
        });
    }
}

/// Check a tree with the built-in policy.
pub fn analyze<T: TreeQuery>(tree: &T) -> Vec<Violation> {
    SafetyRuleEngine::default().analyze(tree)
}
