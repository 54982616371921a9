use crate::cli::{Cli, OutputFormat, VerbosityLevel};
use crate::error::{ConfigError, ConfigResult as Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub schemas: SchemaConfig,
    pub output: OutputConfig,
}

/// Schemas used when the command line names none
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SchemaConfig {
    /// Ordered schema files; the first one anchors relative imports
    pub files: Vec<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format
    pub format: OutputFormatConfig,
    /// Verbose output
    pub verbose: bool,
    /// Quiet mode (errors only)
    pub quiet: bool,
    /// Debug output
    pub debug: bool,
    /// Timestamp messages on stderr
    pub timestamps: bool,
    /// Export the rendered report to this file
    pub report: Option<PathBuf>,
}

impl OutputConfig {
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

/// Output format configuration (serializable version of CLI OutputFormat)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatConfig {
    Human,
    Json,
    Summary,
}

impl From<OutputFormat> for OutputFormatConfig {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputFormatConfig::Human,
            OutputFormat::Json => OutputFormatConfig::Json,
            OutputFormat::Summary => OutputFormatConfig::Summary,
        }
    }
}

impl From<OutputFormatConfig> for OutputFormat {
    fn from(format: OutputFormatConfig) -> Self {
        match format {
            OutputFormatConfig::Human => OutputFormat::Human,
            OutputFormatConfig::Json => OutputFormat::Json,
            OutputFormatConfig::Summary => OutputFormat::Summary,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormatConfig::Human,
            verbose: false,
            quiet: false,
            debug: false,
            timestamps: false,
            report: None,
        }
    }
}

const CONFIG_NAMES: [&str; 4] = [
    "xml-validator.toml",
    "xml-validator.json",
    ".xml-validator.toml",
    ".xml-validator.json",
];

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment -> CLI
    pub fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(cli, &SystemEnvProvider)
    }

    /// Same as [`ConfigManager::load_config`] with a custom environment provider
    pub fn load_config_with(cli: &Cli, env: &impl EnvProvider) -> Result<Config> {
        let mut config = Config::default();

        if let Some(config_path) = &cli.config {
            if !config_path.is_file() {
                return Err(ConfigError::FileNotFound {
                    path: config_path.clone(),
                });
            }
            let file_config = Self::load_from_file(config_path)?;
            config = Self::merge_configs(config, file_config);
        } else if let Some(found_config) = Self::find_config_file()? {
            config = Self::merge_configs(config, found_config);
        }

        config = Self::apply_environment_overrides_with(env, config)?;

        // CLI has the last word
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON).
    ///
    /// Relative schema paths are resolved against the file's directory.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)?;

        let mut config: Config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            Some(ext) => return Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => match toml::from_str::<Config>(&content) {
                Ok(config) => config,
                Err(_) => serde_json::from_str(&content)?,
            },
        };

        if let Some(base) = path.parent() {
            for schema in &mut config.schemas.files {
                if schema.is_relative() && !schema.as_os_str().is_empty() {
                    *schema = base.join(&*schema);
                }
            }
        }

        Ok(config)
    }

    /// Find configuration file in the current directory, then the user config directory
    pub fn find_config_file() -> Result<Option<Config>> {
        if let Some(config) = Self::find_config_file_in(Path::new("."))? {
            return Ok(Some(config));
        }

        if let Some(config_dir) = dirs::config_dir() {
            return Self::find_config_file_in(&config_dir.join("xml-validator"));
        }

        Ok(None)
    }

    /// Load the first well-known configuration file present in `dir`
    pub fn find_config_file_in(dir: &Path) -> Result<Option<Config>> {
        for name in &CONFIG_NAMES {
            let path = dir.join(name);
            if path.is_file() {
                return Ok(Some(Self::load_from_file(&path)?));
            }
        }
        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(schemas) = env.get("XML_VALIDATOR_SCHEMAS") {
            config.schemas.files = schemas
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
        }

        if let Some(verbose) = env.get("XML_VALIDATOR_VERBOSE") {
            config.output.verbose = parse_bool("XML_VALIDATOR_VERBOSE", &verbose)?;
        }

        if let Some(quiet) = env.get("XML_VALIDATOR_QUIET") {
            config.output.quiet = parse_bool("XML_VALIDATOR_QUIET", &quiet)?;
        }

        if let Some(timestamps) = env.get("XML_VALIDATOR_TIMESTAMPS") {
            config.output.timestamps = parse_bool("XML_VALIDATOR_TIMESTAMPS", &timestamps)?;
        }

        if let Some(format) = env.get("XML_VALIDATOR_FORMAT") {
            config.output.format = match format.to_lowercase().as_str() {
                "human" => OutputFormatConfig::Human,
                "json" => OutputFormatConfig::Json,
                "summary" => OutputFormatConfig::Summary,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid XML_VALIDATOR_FORMAT value: {}",
                        format
                    )));
                }
            };
        }

        if let Some(report) = env.get("XML_VALIDATOR_REPORT")
            && !report.trim().is_empty()
        {
            config.output.report = Some(PathBuf::from(report.trim()));
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if !cli.schemas.is_empty() {
            config.schemas.files = cli.schemas.clone();
        }

        if let Some(format) = cli.output_format {
            config.output.format = format.into();
        }
        if cli.verbose || cli.debug {
            config.output.verbose = cli.verbose;
            config.output.debug = cli.debug;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
            config.output.debug = false;
        }
        if cli.timestamps {
            config.output.timestamps = true;
        }
        if let Some(report) = &cli.report {
            config.output.report = Some(report.clone());
        }

        config
    }

    /// Merge two configurations (second takes precedence)
    pub fn merge_configs(mut base: Config, override_config: Config) -> Config {
        if !override_config.schemas.files.is_empty() {
            base.schemas.files = override_config.schemas.files;
        }

        base.output.format = override_config.output.format;
        base.output.verbose = override_config.output.verbose;
        base.output.quiet = override_config.output.quiet;
        base.output.debug = override_config.output.debug;
        base.output.timestamps = override_config.output.timestamps;
        if override_config.output.report.is_some() {
            base.output.report = override_config.output.report;
        }

        base
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        if config
            .schemas
            .files
            .iter()
            .any(|schema| schema.as_os_str().is_empty())
        {
            return Err(ConfigError::Validation(
                "Schema file entries must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Environment(format!(
            "Invalid {} value: {}",
            key, value
        ))),
    }
}
