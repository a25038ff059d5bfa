//! Renderer trait.

use super::types::RenderError;
use crate::check::CheckReport;

/// Turns a finished run into text for the terminal or another tool.
pub trait ReportRenderer {
    fn render(&self, report: &CheckReport) -> Result<String, RenderError>;
}
