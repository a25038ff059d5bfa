//! Findings - the reported form of a violation.
//!
//! Every violation becomes up to three findings: an error at the call site,
//! a note at the same place with a remediation hint, and an error at the
//! callee's declaration. The last is omitted when the callee has no
//! declaration in the unit: indirect calls, and names the file never declares.

use serde::Serialize;

use crate::analysis::{DeclKind, Location, Violation, ViolationKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Note,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Note => "note",
        }
    }
}

/// One reported diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub rule: ViolationKind,
    pub severity: Severity,
    pub location: Location,
    pub message: String,
    /// Other locations involved (the call site, for a declaration finding).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<Location>,
}

impl Finding {
    fn new(rule: ViolationKind, severity: Severity, location: Location, message: String) -> Self {
        Self {
            rule,
            severity,
            location,
            message,
            related: Vec::new(),
        }
    }

    fn with_related(mut self, location: Location) -> Self {
        self.related.push(location);
        self
    }

    /// Same rule, severity, location and message.
    fn same_report(&self, other: &Finding) -> bool {
        self.rule == other.rule
            && self.severity == other.severity
            && self.location == other.location
            && self.message == other.message
    }
}

/// Receives findings.
pub trait DiagnosticSink {
    fn report(&mut self, finding: Finding);
}

/// Collects findings, dropping repeats of an already reported one.
impl DiagnosticSink for Vec<Finding> {
    fn report(&mut self, finding: Finding) {
        if !self.iter().any(|existing| existing.same_report(&finding)) {
            self.push(finding);
        }
    }
}

/// Display name of the safety a rule is about.
fn safety_name(kind: ViolationKind) -> &'static str {
    match kind {
        ViolationKind::GcSafety => "GC",
        ViolationKind::NoGvlSafety | ViolationKind::TransitionSafety => "NoGVL",
    }
}

/// Report the findings for one violation.
pub fn report_violation(sink: &mut impl DiagnosticSink, violation: &Violation) {
    let kind = violation.kind;
    let safety = safety_name(kind);
    let name = &violation.callee_name;

    let call_message = match kind {
        ViolationKind::TransitionSafety => format!(
            "calling a NoGVL-unsafe function '{}' while transitioning to not holding the GVL",
            name
        ),
        _ => format!(
            "call to {}-unsafe function '{}' in a {}-safe context",
            safety, name, safety
        ),
    };
    sink.report(Finding::new(kind, Severity::Error, violation.site, call_message));

    let mut hint = format!(
        "check if '{}' is {}-safe and annotate it as such or use an alternative",
        name, safety
    );
    if kind == ViolationKind::NoGvlSafety {
        hint.push_str(", or protect the call with a GVL guard 'if'");
    }
    sink.report(Finding::new(kind, Severity::Note, violation.site, hint));

    let declared = violation
        .callee
        .as_ref()
        .filter(|callee| callee.kind != DeclKind::External);
    if let Some(callee) = declared {
        let message = format!(
            "function is called from a {}-safe context in '{}' but not marked as {}-safe",
            safety, violation.context_name, safety
        );
        sink.report(
            Finding::new(kind, Severity::Error, callee.location, message).with_related(violation.site),
        );
    }
}

/// Findings for a whole list of violations, in order.
pub fn findings_for(violations: &[Violation]) -> Vec<Finding> {
    let mut findings = Vec::new();
    for violation in violations {
        report_violation(&mut findings, violation);
    }
    findings
}
