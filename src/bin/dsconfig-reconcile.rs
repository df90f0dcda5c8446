//! dsconfig-reconcile CLI
//!
//! Command-line interface for validating, diffing and normalizing
//! configuration records.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dsconfig_reconcile::{
    build_operations, load_document, load_table, normalize_with, replacement, validate,
    CollapsePolicy, ConfigRecord, NormalizeOptions, RecordError, SubtypeSchema, ValidateError,
    VariantResponse,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `DSCONFIG_RECONCILE_LOG=debug`.
const LOG_ENV: &str = "DSCONFIG_RECONCILE_LOG";

#[derive(Parser)]
#[command(name = "dsconfig-reconcile")]
#[command(about = "Validate, diff and normalize directory-server configuration records")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that every populated field is legal for the record's type
    Validate {
        /// Record document to validate
        record: PathBuf,

        /// Schema table: file path or URL (built-in virtual attribute table if omitted)
        #[arg(long)]
        table: Option<String>,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Print the patch operations that turn the state into the plan
    Diff {
        /// Desired record document
        plan: PathBuf,

        /// Last-known live record document
        state: PathBuf,

        /// Schema table: file path or URL (built-in virtual attribute table if omitted)
        #[arg(long)]
        table: Option<String>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Read a variant response back into a record document
    Normalize {
        /// Variant response document
        response: PathBuf,

        /// Record the response is expected to reflect
        #[arg(long)]
        expected: PathBuf,

        /// Schema table: file path or URL (built-in virtual attribute table if omitted)
        #[arg(long)]
        table: Option<String>,

        /// Keep empty values returned by the server instead of collapsing them
        #[arg(long)]
        no_collapse: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the built-in schema table
    Table {
        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env(LOG_ENV))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate {
            record,
            table,
            json,
        } => run_validate(&record, table.as_deref(), json),

        Commands::Diff {
            plan,
            state,
            table,
            output,
            pretty,
        } => run_diff(&plan, &state, table.as_deref(), output, pretty),

        Commands::Normalize {
            response,
            expected,
            table,
            no_collapse,
            pretty,
        } => run_normalize(&response, &expected, table.as_deref(), no_collapse, pretty),

        Commands::Table { pretty } => {
            print_json(&SubtypeSchema::virtual_attribute(), pretty, None)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run_validate(record_path: &Path, table: Option<&str>, json_output: bool) -> Result<(), u8> {
    let schema = load_schema(table, json_output)?;
    let record = load_record(record_path, &schema, json_output)?;

    match validate(&record, &schema) {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(ValidateError::Invalid { errors }) => {
            if json_output {
                let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
                let output = serde_json::json!({
                    "valid": false,
                    "errors": errors,
                    "messages": messages
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(ValidateError::Record(e)) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

fn run_diff(
    plan_path: &Path,
    state_path: &Path,
    table: Option<&str>,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let schema = load_schema(table, false)?;
    let plan = load_record(plan_path, &schema, false)?;
    let state = load_record(state_path, &schema, false)?;

    if let Some(change) = replacement(&plan, &state) {
        eprintln!(
            "Error: {} changes from '{}' to '{}'; the object must be replaced",
            change.field, change.from, change.to
        );
        return Err(2);
    }

    if let Err(e) = validate(&plan, &schema) {
        report_validate_error(&e);
        return Err(e.exit_code() as u8);
    }

    let operations = build_operations(&plan, &state, &schema);
    print_json(&operations, pretty, output)
}

fn run_normalize(
    response_path: &Path,
    expected_path: &Path,
    table: Option<&str>,
    no_collapse: bool,
    pretty: bool,
) -> Result<(), u8> {
    let schema = load_schema(table, false)?;
    let expected = load_record(expected_path, &schema, false)?;

    let doc = load_document(response_path).map_err(|e| {
        eprintln!("Error: loading response: {}", e);
        e.exit_code() as u8
    })?;
    let response: VariantResponse = serde_json::from_value(doc).map_err(|e| {
        eprintln!("Error: response must be a JSON object of payload members: {}", e);
        2u8
    })?;

    let collapse = if no_collapse {
        CollapsePolicy::Never
    } else {
        CollapsePolicy::ExpectedHint
    };
    let options = NormalizeOptions::new().collapse(collapse);

    let record = normalize_with(&response, &expected, &schema, &options).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    print_json(&record.to_document(), pretty, None)
}

fn load_schema(table: Option<&str>, json_output: bool) -> Result<SubtypeSchema, u8> {
    match table {
        Some(source) => load_table(source).map_err(|e| {
            report_error(json_output, &format!("loading table: {}", e));
            e.exit_code() as u8
        }),
        None => Ok(SubtypeSchema::virtual_attribute()),
    }
}

fn load_record(path: &Path, schema: &SubtypeSchema, json_output: bool) -> Result<ConfigRecord, u8> {
    let doc = load_document(path).map_err(|e| {
        report_error(json_output, &format!("loading {}: {}", path.display(), e));
        e.exit_code() as u8
    })?;

    ConfigRecord::from_document(&doc, schema).map_err(|e| {
        match &e {
            RecordError::InvalidDocument { errors } if !json_output => {
                eprintln!("Error: {}: {}", path.display(), e);
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            RecordError::InvalidDocument { errors } => {
                let output = serde_json::json!({ "valid": false, "errors": errors });
                println!("{}", output);
            }
            _ => report_error(json_output, &format!("{}: {}", path.display(), e)),
        }
        e.exit_code() as u8
    })
}

fn report_validate_error(error: &ValidateError) {
    match error {
        ValidateError::Invalid { errors } => {
            eprintln!("Validation failed:");
            for error in errors {
                eprintln!("  {}", error);
            }
        }
        ValidateError::Record(e) => eprintln!("Error: {}", e),
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool, output: Option<PathBuf>) -> Result<(), u8> {
    let json_output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}
