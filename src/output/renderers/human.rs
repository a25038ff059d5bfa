//! Human renderer - rustc-style blocks with the source line and carets.
//!
//! ```text
//! error[nogvl-safety]: call to NoGVL-unsafe function 'f2' in a NoGVL-safe context
//!   --> src/ext.rs:3:11
//!    |
//!  3 | fn f1() { f2(); }
//!    |           ^^^^
//! ```

use crate::check::{CheckReport, UnitReport};
use crate::output::diagnostic::{Finding, Severity};
use crate::output::traits::ReportRenderer;
use crate::output::types::RenderError;

pub struct HumanRenderer;

impl ReportRenderer for HumanRenderer {
    fn render(&self, report: &CheckReport) -> Result<String, RenderError> {
        let mut output = String::new();

        for unit in &report.files {
            let lines: Vec<&str> = unit.source.lines().collect();
            for finding in &unit.findings {
                render_finding(&mut output, unit, &lines, finding);
            }
        }

        output.push_str(&summary(report));
        Ok(output)
    }
}

fn render_finding(output: &mut String, unit: &UnitReport, lines: &[&str], finding: &Finding) {
    let location = finding.location;
    let display_line = location.line + 1;
    let gutter = display_line.to_string().len();

    let label = finding.severity.label();
    match finding.severity {
        Severity::Error => output.push_str(&format!("{}[{}]: {}\n", label, finding.rule, finding.message)),
        Severity::Note => output.push_str(&format!("{}: {}\n", label, finding.message)),
    }
    output.push_str(&format!(
        "{:>width$}--> {}:{}:{}\n",
        "",
        unit.path.display(),
        display_line,
        location.column + 1,
        width = gutter
    ));

    let Some(line) = lines.get(location.line as usize) else {
        output.push('\n');
        return;
    };

    output.push_str(&format!("{:>width$} |\n", "", width = gutter));
    output.push_str(&format!("{} | {}\n", display_line, line));

    let column = location.column as usize;
    let rest = line.chars().count().saturating_sub(column);
    let span = unit
        .source
        .get(location.offset as usize..(location.offset + location.len) as usize)
        .map(|text| text.chars().take_while(|&c| c != '\n').count())
        .unwrap_or(1);
    let carets = span.min(rest).max(1);

    output.push_str(&format!(
        "{:>width$} | {}{}\n\n",
        "",
        " ".repeat(column),
        "^".repeat(carets),
        width = gutter
    ));
}

fn summary(report: &CheckReport) -> String {
    let files = report.files.len();
    format!(
        "{} violation{} in {} file{}\n",
        report.violations,
        if report.violations == 1 { "" } else { "s" },
        files,
        if files == 1 { "" } else { "s" }
    )
}
