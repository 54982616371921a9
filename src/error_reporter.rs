use crate::cli::VerbosityLevel;
use crate::compiler::CompiledSchema;
use crate::error::{ConfigError, ValidationError};
use std::path::Path;

/// Error reporter with configurable verbosity
pub struct ErrorReporter {
    verbosity: VerbosityLevel,
    show_timestamps: bool,
}

impl ErrorReporter {
    /// Create a new error reporter with specified verbosity
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_timestamps: false,
        }
    }

    /// Create a new error reporter with additional options
    pub fn with_options(verbosity: VerbosityLevel, show_timestamps: bool) -> Self {
        Self {
            verbosity,
            show_timestamps,
        }
    }

    /// Report an error that stopped the run before a result existed
    pub fn report_validation_error(&self, error: &ValidationError) {
        eprintln!("{}", self.format_validation_error(error));
    }

    /// Report a configuration error
    pub fn report_config_error(&self, error: &ConfigError) {
        eprintln!("{}", self.format_config_error(error));
    }

    /// Report compiler warnings and, in debug mode, how references were resolved
    pub fn report_compiled(&self, schema: &CompiledSchema) {
        if let Some(text) = self.format_compiled(schema) {
            eprintln!("{}", text);
        }
    }

    /// Report a successful export
    pub fn report_export(&self, path: &Path) {
        if self.verbosity >= VerbosityLevel::Normal {
            eprintln!(
                "{}Report exported to {}",
                self.timestamp(),
                path.display()
            );
        }
    }

    fn timestamp(&self) -> String {
        if self.show_timestamps {
            format!("[{}] ", chrono::Local::now().format("%H:%M:%S"))
        } else {
            String::new()
        }
    }

    pub fn format_validation_error(&self, error: &ValidationError) -> String {
        match self.verbosity {
            VerbosityLevel::Quiet => self.format_error_brief(error),
            VerbosityLevel::Normal => self.format_error_normal(error),
            VerbosityLevel::Verbose => self.format_error_verbose(error),
            VerbosityLevel::Debug => self.format_error_debug(error),
        }
    }

    pub fn format_config_error(&self, error: &ConfigError) -> String {
        match self.verbosity {
            VerbosityLevel::Quiet => format!("Config error: {}", error),
            VerbosityLevel::Normal | VerbosityLevel::Verbose => {
                format!(
                    "{}Configuration Error: {}\n{}",
                    self.timestamp(),
                    error,
                    self.get_config_help(error)
                )
            }
            VerbosityLevel::Debug => {
                format!(
                    "{}Configuration Error: {}\nDebug: {:?}\n{}",
                    self.timestamp(),
                    error,
                    error,
                    self.get_config_help(error)
                )
            }
        }
    }

    pub fn format_compiled(&self, schema: &CompiledSchema) -> Option<String> {
        if self.verbosity < VerbosityLevel::Verbose {
            return None;
        }

        let mut lines = Vec::new();
        for warning in schema.warnings() {
            lines.push(format!("{}Schema warning: {}", self.timestamp(), warning));
        }
        if self.verbosity == VerbosityLevel::Debug {
            for resolved in schema.resolved_references() {
                lines.push(format!("{}Resolved: {}", self.timestamp(), resolved));
            }
        }

        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }

    /// Format error for brief output (quiet mode)
    fn format_error_brief(&self, error: &ValidationError) -> String {
        match error {
            ValidationError::SchemaCompilation { .. } | ValidationError::SchemaUnreadable { .. } => {
                "Cannot compile schema(s)".to_string()
            }
            _ => format!("ERROR: {}", error),
        }
    }

    /// Format error for normal output
    fn format_error_normal(&self, error: &ValidationError) -> String {
        let timestamp = self.timestamp();

        match error {
            ValidationError::SchemaCompilation { schemas, details } => {
                let mut output = format!("{}Cannot compile schema(s):", timestamp);
                for schema in schemas {
                    output.push_str(&format!("\n  {}", schema.display()));
                }
                for detail in details {
                    output.push_str(&format!("\n- {}", detail));
                }
                output
            }
            ValidationError::SchemaUnreadable { path, reason } => {
                format!(
                    "{}Cannot compile schema(s): {} could not be read: {}",
                    timestamp,
                    path.display(),
                    reason
                )
            }
            _ => format!("{}{}", timestamp, error),
        }
    }

    /// Format error for verbose output
    fn format_error_verbose(&self, error: &ValidationError) -> String {
        let mut output = self.format_error_normal(error);

        match error {
            ValidationError::NoSchemas => {
                output.push_str(
                    "\nSuggestion: pass --schema <XSD>, set XML_VALIDATOR_SCHEMAS, \
                     or list files under [schemas] in a configuration file",
                );
            }
            ValidationError::SchemaCompilation { schemas, .. } => {
                if let Some(base) = schemas.first().and_then(|first| first.parent()) {
                    output.push_str(&format!(
                        "\nSuggestion: relative imports and includes are looked up in {} first",
                        base.display()
                    ));
                }
            }
            ValidationError::EmptyReport => {
                output.push_str("\nSuggestion: run without --quiet to get a report to export");
            }
            _ => {}
        }

        output
    }

    /// Format error for debug output
    fn format_error_debug(&self, error: &ValidationError) -> String {
        let mut output = self.format_error_verbose(error);
        output.push_str(&format!("\nDebug Info: {:?}", error));

        output.push_str("\nError Chain:");
        let mut current_error: &dyn std::error::Error = error;
        let mut level = 0;
        while let Some(source) = current_error.source() {
            output.push_str(&format!("\n  {}: {}", level + 1, source));
            current_error = source;
            level += 1;
        }

        output
    }

    /// Get helpful suggestions for configuration errors
    fn get_config_help(&self, error: &ConfigError) -> String {
        match error {
            ConfigError::FileNotFound { path } => {
                format!("Check that the configuration file exists: {}", path.display())
            }
            ConfigError::TomlParsing(_) | ConfigError::JsonParsing(_) => {
                "Check the configuration file syntax (TOML/JSON format expected)".to_string()
            }
            ConfigError::UnsupportedFormat(_) => {
                "Use a .toml or .json configuration file".to_string()
            }
            ConfigError::Environment(_) => {
                "Fix or unset the XML_VALIDATOR_* environment variable".to_string()
            }
            ConfigError::Validation(_) => {
                "Resolve conflicting values between file, environment, and CLI".to_string()
            }
            ConfigError::Io(_) => "Check file permissions".to_string(),
        }
    }
}
