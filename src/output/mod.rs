//! Reporting violations.
//!
//! [`diagnostic`] turns each violation into findings; the renderers turn a
//! finished [`CheckReport`](crate::check::CheckReport) into text.
//!
//! # Available Formats
//!
//! | Format | Description |
//! |--------|-------------|
//! | `human` | Rustc-style with source line and caret underline (default) |
//! | `json` | One document: files, their findings, and the violation count |
//!
//! # Module Structure
//!
//! - `types` - [`OutputFormat`] and [`RenderError`]
//! - `traits` - the [`ReportRenderer`] trait
//! - [`renderers`] - renderer implementations

mod diagnostic;
mod traits;
mod types;

pub mod renderers;

pub use diagnostic::{findings_for, report_violation, DiagnosticSink, Finding, Severity};
pub use renderers::{HumanRenderer, JsonRenderer};
pub use traits::ReportRenderer;
pub use types::{OutputFormat, RenderError};

use crate::check::CheckReport;

/// Render a report in the given format.
pub fn render_report(report: &CheckReport, format: OutputFormat) -> Result<String, RenderError> {
    match format {
        OutputFormat::Human => HumanRenderer.render(report),
        OutputFormat::Json => JsonRenderer.render(report),
    }
}
