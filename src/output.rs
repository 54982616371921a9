//! Report rendering and export
//!
//! The human format is a small log: a start banner, a verdict line, one line
//! per diagnostic, an end banner. Exported reports contain exactly the text
//! that was rendered, minus terminal colors.

use std::fs;
use std::path::{Path, PathBuf};

use atty;
use serde::Serialize;

use crate::cli::{OutputFormat, VerbosityLevel};
use crate::diagnostics::Severity;
use crate::error::{Result, ValidationError};
use crate::validator::ValidationResult;

const START_BANNER: &str = "--- Validation started ---";
const END_BANNER: &str = "--- Validation finished ---";

/// Everything one rendered report talks about
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Report<'a> {
    pub document: &'a Path,
    pub schemas: &'a [PathBuf],
    #[serde(flatten)]
    pub result: &'a ValidationResult,
}

impl<'a> Report<'a> {
    pub fn new(document: &'a Path, schemas: &'a [PathBuf], result: &'a ValidationResult) -> Self {
        Self {
            document,
            schemas,
            result,
        }
    }
}

/// Output formatter for validation reports
pub struct Output {
    verbosity: VerbosityLevel,
    format: OutputFormat,
    show_colors: bool,
}

impl Output {
    /// Formatter for stdout; colors are used when stdout is a terminal
    pub fn new(verbosity: VerbosityLevel, format: OutputFormat) -> Self {
        Self {
            verbosity,
            format,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    /// Formatter that never emits escape sequences, for exported reports
    pub fn plain(verbosity: VerbosityLevel, format: OutputFormat) -> Self {
        Self {
            verbosity,
            format,
            show_colors: false,
        }
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn render(&self, report: &Report<'_>) -> String {
        match self.format {
            OutputFormat::Human => self.format_human(report),
            OutputFormat::Json => self.format_json(report),
            OutputFormat::Summary => self.format_summary(report),
        }
    }

    fn format_human(&self, report: &Report<'_>) -> String {
        let mut output = String::new();
        let result = report.result;

        if self.verbosity == VerbosityLevel::Quiet {
            for diagnostic in result.diagnostics() {
                output.push_str(&format!("- {}\n", diagnostic));
            }
            return output;
        }

        output.push_str(START_BANNER);
        output.push('\n');

        if self.verbosity >= VerbosityLevel::Verbose {
            output.push_str(&format!("Document: {}\n", report.document.display()));
            output.push_str(&format!("Schemas ({}):\n", report.schemas.len()));
            for (i, schema) in report.schemas.iter().enumerate() {
                output.push_str(&format!("  {}: {}\n", i + 1, schema.display()));
            }
        }

        if result.is_valid() {
            output.push_str(&format!(
                "{} the XML document is valid against the supplied schemas.\n",
                self.colorize("SUCCESS:", "32")
            ));
        } else {
            output.push_str(&format!(
                "{} the XML document contains errors ({}):\n",
                self.colorize("FAILURE:", "31"),
                result.diagnostics().len()
            ));
            for diagnostic in result.diagnostics() {
                let label = match diagnostic.severity {
                    Severity::Warning => self.colorize(diagnostic.severity.label(), "33"),
                    _ => self.colorize(diagnostic.severity.label(), "31"),
                };
                output.push_str(&format!("- {}: {}", label, diagnostic.message));
                if let Some(line) = diagnostic.line {
                    output.push_str(&format!(" (line {})", line));
                }
                output.push('\n');
            }
        }

        output.push_str(END_BANNER);
        output.push('\n');
        output
    }

    fn format_json(&self, report: &Report<'_>) -> String {
        match serde_json::to_string_pretty(report) {
            Ok(json) => format!("{}\n", json),
            Err(e) => format!("{{\"error\": \"{}\"}}\n", e),
        }
    }

    fn format_summary(&self, report: &Report<'_>) -> String {
        let result = report.result;
        if result.is_valid() {
            if self.verbosity == VerbosityLevel::Quiet {
                return String::new();
            }
            return format!(
                "{}: {}\n",
                report.document.display(),
                self.colorize("valid", "32")
            );
        }

        format!(
            "{}: {} ({} warning(s), {} error(s), {} fatal)\n",
            report.document.display(),
            self.colorize("invalid", "31"),
            result.count(Severity::Warning),
            result.count(Severity::Error),
            result.count(Severity::FatalError)
        )
    }
}

/// Write a rendered report to `path`.
///
/// # Errors
///
/// `EmptyReport` if there is nothing to write, `Io` if the file cannot be
/// written.
pub fn export_report(path: &Path, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyReport);
    }
    fs::write(path, text)?;
    Ok(())
}
