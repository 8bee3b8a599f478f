//! Application definition maintenance tool.
//!
//! Loads XML application definitions, runs the validation visitor over
//! them, re-emits them as XML or JSON, and diffs two revisions into the
//! action batch the persistence layer would consume.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};

use cmstore_core::component::{ActionType, action_set_elements, diff};
use cmstore_core::components::Attribute;
use cmstore_core::{
    ApplicationDef, DbComponent, FromXml, ToXml, XmlElement, init_logging, parse_str,
    write_document,
};

/// Command-line interface for the definition tool
#[derive(Parser)]
#[command(name = "cmstore")]
#[command(about = "Application definition validator and differ")]
#[command(version)]
#[command(long_about = "
cmstore - application definition maintenance

Works on the XML application definitions the object store serves:
- validate: parse a definition and run the full validation pass
- dump:     re-emit a definition as normalized XML or JSON
- diff:     compute the insert/update/delete action batch separating
            two revisions of a definition

Secrets embedded in definitions never appear in logs or JSON output.
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, help = "Suppress all output except errors")]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Validate an application definition
    Validate {
        /// Definition XML file
        file: PathBuf,
    },
    /// Re-emit a definition as normalized XML or JSON
    Dump {
        /// Definition XML file
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Output file path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Diff two definition revisions into an action batch
    Diff {
        /// Baseline definition XML file
        base: PathBuf,

        /// Edited definition XML file
        edited: PathBuf,

        /// Output file path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Available output formats for `dump`
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum OutputFormat {
    /// Normalized XML document
    Xml,
    /// JSON structured output (secrets omitted)
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.global.verbose, cli.global.quiet) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let result = match &cli.command {
        Command::Validate { file } => validate(file),
        Command::Dump {
            file,
            format,
            output,
        } => dump(file, *format, output.as_deref()),
        Command::Diff {
            base,
            edited,
            output,
        } => run_diff(base, edited, output.as_deref()),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Loads and parses an application definition from disk.
fn load_definition(path: &Path) -> Result<ApplicationDef> {
    let xml = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let element = parse_str(&xml)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    let definition = ApplicationDef::from_xml(&element)
        .with_context(|| format!("failed to load definition from {}", path.display()))?;

    info!(
        name = definition.name(),
        objects = definition.object_count(),
        "loaded definition"
    );
    Ok(definition)
}

/// Writes output to a file or stdout.
fn emit(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("output written to {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

/// Runs the validation visitor and reports issues.
fn validate(file: &Path) -> Result<ExitCode> {
    let definition = load_definition(file)?;

    match definition.validate_definition() {
        Ok(issues) => {
            for issue in &issues {
                warn!("{}", issue);
            }
            println!(
                "{}: valid ({} components, {} warnings)",
                definition.name(),
                definition.object_count(),
                issues.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e);
            println!("{}: INVALID", definition.name());
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Re-emits a definition in the requested format.
fn dump(file: &Path, format: OutputFormat, output: Option<&Path>) -> Result<ExitCode> {
    let definition = load_definition(file)?;

    let content = match format {
        OutputFormat::Xml => write_document(&definition.to_xml())?,
        OutputFormat::Json => serde_json::to_string_pretty(&definition)
            .context("JSON serialization failed")?,
    };

    emit(&content, output)?;
    Ok(ExitCode::SUCCESS)
}

/// Appends one component family's diff to the combined batch.
fn collect_actions<T: DbComponent>(
    combined: &mut Vec<(ActionType, XmlElement)>,
    actions: Vec<(ActionType, T)>,
) {
    combined.extend(actions.into_iter().map(|(action, component)| {
        info!(
            component = T::component_type(),
            key = component.key(),
            action = %action,
            "definition change"
        );
        (action, component.to_xml())
    }));
}

/// Diffs two definition revisions into one action batch.
fn run_diff(base: &Path, edited: &Path, output: Option<&Path>) -> Result<ExitCode> {
    let base_def = load_definition(base)?;
    let edited_def = load_definition(edited)?;

    let base_attributes: Vec<Attribute> = base_def.attributes().iter().cloned().collect();
    let edited_attributes: Vec<Attribute> = edited_def.attributes().iter().cloned().collect();

    let mut actions = Vec::new();
    collect_actions(&mut actions, diff(&base_attributes, &edited_attributes));
    collect_actions(
        &mut actions,
        diff(base_def.credentials(), edited_def.credentials()),
    );
    collect_actions(
        &mut actions,
        diff(base_def.security_providers(), edited_def.security_providers()),
    );
    collect_actions(
        &mut actions,
        diff(base_def.relationships(), edited_def.relationships()),
    );
    collect_actions(&mut actions, diff(base_def.pipes(), edited_def.pipes()));

    let count = actions.len();
    match action_set_elements(actions) {
        None => {
            println!("definitions are identical");
            Ok(ExitCode::SUCCESS)
        }
        Some(batch) => {
            let xml = write_document(&batch)?;
            emit(&xml, output)?;
            println!("{} actions in batch", count);
            Ok(ExitCode::SUCCESS)
        }
    }
}
