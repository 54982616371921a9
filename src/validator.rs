//! Validation Engine
//!
//! Runs one document through one [`CompiledSchema`] and turns whatever libxml2
//! reports into a [`ValidationResult`]. The document is streamed, so a
//! well-formedness error only ends the run at the point where it occurs:
//! everything reported before it stands. Problems with the document itself
//! never escape as errors. A missing or unreadable file, or a parse that had
//! to stop, closes the result with one synthetic diagnostic so every
//! completed run has the same shape.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::compiler::{CompiledSchema, SchemaCompiler};
use crate::diagnostics::{Diagnostic, DiagnosticCollector, Severity};
use crate::error::Result;
use crate::libxml2::{DocumentOutcome, LibXml2Wrapper};

/// Prefix of the synthetic diagnostic recorded when a document cannot be
/// checked at all
pub const CRITICAL_FAILURE_PREFIX: &str = "Critical validation failure";

/// Outcome of checking one document.
///
/// `is_valid()` is true exactly when there are no diagnostics; a warning
/// alone is enough to make a document invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    valid: bool,
    diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    pub(crate) fn from_collector(collector: DiagnosticCollector) -> Self {
        let diagnostics = collector.into_diagnostics();
        Self {
            valid: diagnostics.is_empty(),
            diagnostics,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Diagnostics in the order they were reported
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Number of diagnostics with the given severity
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Checks documents against compiled schemas
pub struct ValidationEngine {
    libxml2: LibXml2Wrapper,
}

impl ValidationEngine {
    pub fn new() -> Self {
        Self {
            libxml2: LibXml2Wrapper::new(),
        }
    }

    /// Check `document` against `schema`, recording every irregularity in
    /// `collector`. Never fails.
    pub fn validate_document(
        &self,
        schema: &CompiledSchema,
        document: &Path,
        collector: &mut DiagnosticCollector,
    ) {
        if let Err(reason) = check_readable(document) {
            critical_failure(collector, &reason, None);
            return;
        }

        let before = collector.len();
        match self
            .libxml2
            .validate_file(schema.schema_ptr(), document, collector)
        {
            Ok(DocumentOutcome::Checked { code: 0 }) => {}
            Ok(DocumentOutcome::Checked { code }) if code > 0 => {
                if collector.len() == before {
                    collector.record(
                        Severity::Error,
                        format!(
                            "document does not conform to the schema ({} problem(s) reported without details)",
                            code
                        ),
                        None,
                    );
                }
            }
            Ok(DocumentOutcome::Checked { code }) => critical_failure(
                collector,
                &format!("internal validator error (code {})", code),
                None,
            ),
            Ok(DocumentOutcome::NotWellFormed { message, line }) => {
                critical_failure(collector, &message, line)
            }
            Err(err) => critical_failure(collector, &err.to_string(), None),
        }
    }

    /// Check `document` against `schema` with a fresh collector.
    pub fn run(&self, schema: &CompiledSchema, document: &Path) -> ValidationResult {
        let mut collector = DiagnosticCollector::new();
        self.validate_document(schema, document, &mut collector);
        ValidationResult::from_collector(collector)
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn check_readable(document: &Path) -> std::result::Result<(), String> {
    let unreadable = |e: std::io::Error| format!("cannot read {}: {}", document.display(), e);
    let metadata = File::open(document)
        .and_then(|file| file.metadata())
        .map_err(unreadable)?;
    if metadata.is_dir() {
        return Err(format!("cannot read {}: is a directory", document.display()));
    }
    Ok(())
}

fn critical_failure(collector: &mut DiagnosticCollector, reason: &str, line: Option<u32>) {
    collector.record(
        Severity::Error,
        format!("{}: {}", CRITICAL_FAILURE_PREFIX, reason),
        line,
    );
}

/// Validate `document` against the ordered schema files `schemas`.
///
/// The directory of the first schema is where relative `import`/`include`
/// locations are looked up first.
///
/// # Errors
///
/// - `NoSchemas` if `schemas` is empty; nothing is read in that case
/// - `SchemaUnreadable` / `SchemaCompilation` if the schemas cannot be compiled
///
/// A missing or malformed document is not an error: it is reported in the
/// returned result.
pub fn validate(document: &Path, schemas: &[PathBuf]) -> Result<ValidationResult> {
    let compiled = SchemaCompiler::new().compile(schemas)?;
    Ok(ValidationEngine::new().run(&compiled, document))
}
