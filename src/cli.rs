use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show critical errors
    Quiet,
    /// Show standard information
    #[default]
    Normal,
    /// Show detailed information
    Verbose,
    /// Show all available debugging information
    Debug,
}

/// Report formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Banner-framed log with one line per diagnostic
    #[default]
    Human,
    /// Machine-readable result
    Json,
    /// A single line per document
    Summary,
}

/// Validate an XML document against independently selected XSD files
#[derive(Parser, Debug, Clone)]
#[command(name = "xml-validator")]
#[command(about = "Validate an XML document against one or more independently selected XSD files")]
#[command(version)]
pub struct Cli {
    /// XML document to validate
    #[arg(help = "XML document to validate")]
    pub document: PathBuf,

    /// Schema files, in order; relative imports are looked up next to the first
    #[arg(
        short = 's',
        long = "schema",
        value_name = "XSD",
        action = clap::ArgAction::Append,
        help = "Schema file (repeatable, order preserved)"
    )]
    pub schemas: Vec<PathBuf>,

    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(short = 'f', long = "format", value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Export the rendered report to a text file
    #[arg(short = 'o', long = "report", value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", help = "Enable verbose output")]
    pub verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Quiet mode",
        conflicts_with_all = ["verbose", "debug"]
    )]
    pub quiet: bool,

    /// Print debugging detail, including resolved schema references
    #[arg(long = "debug", hide = true)]
    pub debug: bool,

    /// Prefix messages on stderr with a timestamp
    #[arg(long = "timestamps")]
    pub timestamps: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(report) = &self.report
            && report.is_dir()
        {
            return Err(format!("Report path is a directory: {}", report.display()));
        }
        if let Some(empty) = self.schemas.iter().position(|s| s.as_os_str().is_empty()) {
            return Err(format!("Schema #{} is an empty path", empty + 1));
        }
        Ok(())
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.debug {
            VerbosityLevel::Debug
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}
