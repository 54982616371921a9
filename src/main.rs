use std::process::ExitCode;

use anyhow::Context;

use xml_validator::cli::Cli;
use xml_validator::config::ConfigManager;
use xml_validator::error_reporter::ErrorReporter;
use xml_validator::output::{Output, Report, export_report};
use xml_validator::{SchemaCompiler, ValidationEngine};

/// Document checked and valid
const EXIT_VALID: u8 = 0;
/// Document checked and invalid
const EXIT_INVALID: u8 = 1;
/// Nothing was checked: bad arguments, configuration or schemas
const EXIT_BLOCKED: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(EXIT_BLOCKED)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<u8> {
    cli.validate().map_err(anyhow::Error::msg)?;

    let config = match ConfigManager::load_config(cli) {
        Ok(config) => config,
        Err(err) => {
            ErrorReporter::new(cli.verbosity()).report_config_error(&err);
            return Ok(EXIT_BLOCKED);
        }
    };

    let verbosity = config.output.verbosity();
    let format = config.output.format.into();
    let reporter = ErrorReporter::with_options(verbosity, config.output.timestamps);

    let compiled = match SchemaCompiler::new().compile(&config.schemas.files) {
        Ok(compiled) => compiled,
        Err(err) => {
            reporter.report_validation_error(&err);
            return Ok(EXIT_BLOCKED);
        }
    };
    reporter.report_compiled(&compiled);

    let result = ValidationEngine::new().run(&compiled, &cli.document);
    let report = Report::new(&cli.document, compiled.sources(), &result);

    print!("{}", Output::new(verbosity, format).render(&report));

    if let Some(path) = &config.output.report {
        let text = Output::plain(verbosity, format).render(&report);
        match export_report(path, &text)
            .with_context(|| format!("cannot export report to {}", path.display()))
        {
            Ok(()) => reporter.report_export(path),
            Err(err) => eprintln!("Export failed: {:#}", err),
        }
    }

    Ok(if result.is_valid() {
        EXIT_VALID
    } else {
        EXIT_INVALID
    })
}
