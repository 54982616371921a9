//! # xml-validator Library
//!
//! Validates one XML document against an ordered set of independently
//! selected XSD files. The files are compiled into a single schema graph,
//! cross-file `import`/`include` references are resolved from the local
//! filesystem, and every problem libxml2 reports is returned as an ordered,
//! line-numbered diagnostic.
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//!
//! let result = xml_validator::validate(
//!     Path::new("order.xml"),
//!     &[PathBuf::from("schemas/order.xsd")],
//! )?;
//! for diagnostic in result.diagnostics() {
//!     println!("{}", diagnostic);
//! }
//! # Ok::<(), xml_validator::ValidationError>(())
//! ```

pub mod cli;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod error_reporter;
pub mod libxml2;
pub mod output;
pub mod resolver;
pub mod schema_loader;
pub mod validator;

pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use compiler::{CompiledSchema, SchemaCompiler};
pub use config::{Config, ConfigManager};
pub use diagnostics::{Diagnostic, DiagnosticCollector, Severity};
pub use error::{ConfigError, ValidationError};
pub use libxml2::LibXml2Wrapper;
pub use output::{Output, Report};
pub use resolver::{ResolvedInclude, ResourceResolver, SchemaReference};
pub use schema_loader::{SchemaDocument, SchemaExtractor, SchemaGraph};
pub use validator::{CRITICAL_FAILURE_PREFIX, ValidationEngine, ValidationResult, validate};
