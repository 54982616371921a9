use std::path::PathBuf;

use thiserror::Error;

/// Main library error type.
///
/// Only caller precondition violations and schema compilation failures stop a
/// run before a `ValidationResult` exists. Everything that goes wrong with the
/// document itself is folded into the result's diagnostics instead.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No schema files selected: at least one XSD is required")]
    NoSchemas,

    #[error("Cannot compile schema(s) {}: {}", display_paths(.schemas), .details.join("; "))]
    SchemaCompilation {
        schemas: Vec<PathBuf>,
        details: Vec<String>,
    },

    #[error("Cannot read schema file: {path} - {reason}")]
    SchemaUnreadable { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LibXML2 internal error: {details}")]
    LibXml2Internal { details: String },

    #[error("Nothing to export: the report is empty")]
    EmptyReport,
}

impl ValidationError {
    /// Whether this error means the schemas could not be compiled at all.
    pub fn is_compilation_failure(&self) -> bool {
        matches!(
            self,
            ValidationError::SchemaCompilation { .. } | ValidationError::SchemaUnreadable { .. }
        )
    }

    /// Whether the caller broke a precondition of `validate`.
    pub fn is_precondition(&self) -> bool {
        matches!(self, ValidationError::NoSchemas)
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Configuration-specific error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

/// LibXML2-specific error types
#[derive(Error, Debug)]
pub enum LibXml2Error {
    #[error("Schema parser context creation failed for {path}")]
    ParserContextCreationFailed { path: PathBuf },

    #[error("Schema parsing failed: null pointer returned")]
    SchemaParseFailed { messages: Vec<String> },

    #[error("Validation context creation failed")]
    ValidationContextCreationFailed,

    #[error("Path cannot be passed to libxml2: {path}")]
    InvalidPath { path: PathBuf },
}

impl From<ConfigError> for ValidationError {
    fn from(err: ConfigError) -> Self {
        ValidationError::Config(err.to_string())
    }
}

impl From<LibXml2Error> for ValidationError {
    fn from(err: LibXml2Error) -> Self {
        ValidationError::LibXml2Internal {
            details: err.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// LibXML2 result type alias
pub type LibXml2Result<T> = std::result::Result<T, LibXml2Error>;
