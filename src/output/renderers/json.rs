//! JSON renderer - the whole report as one document, stamped with the
//! built-in whitelist version it was checked against.

use serde::Serialize;

use crate::analysis::WHITELIST_VERSION;
use crate::check::CheckReport;
use crate::output::traits::ReportRenderer;
use crate::output::types::RenderError;

pub struct JsonRenderer;

#[derive(Serialize)]
struct JsonReport<'a> {
    whitelist_version: u32,
    #[serde(flatten)]
    report: &'a CheckReport,
}

impl ReportRenderer for JsonRenderer {
    fn render(&self, report: &CheckReport) -> Result<String, RenderError> {
        let document = JsonReport {
            whitelist_version: WHITELIST_VERSION,
            report,
        };
        let mut output = serde_json::to_string_pretty(&document)?;
        output.push('\n');
        Ok(output)
    }
}
