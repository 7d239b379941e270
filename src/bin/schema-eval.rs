//! Schema Eval CLI
//!
//! Command-line interface for evaluating JSON values against JSON Schemas.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use schema_eval::{
    is_url, load_schema, load_schema_auto, root_cause_errors, CancellationToken, Draft,
    EvaluationOptions, OutputFormat, SchemaBaseConfig, SchemaFetcher, Validator, ValidatorBuilder,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "schema-eval")]
#[command(about = "Evaluate JSON values against JSON Schemas")]
#[command(version)]
struct Cli {
    /// Log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an instance against a schema
    Validate {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Instance file to evaluate
        instance: PathBuf,

        /// Additional schema documents that references may point into
        #[arg(long = "resource", value_name = "FILE")]
        resources: Vec<PathBuf>,

        /// Evaluate under this draft instead of each schema's $schema
        #[arg(long)]
        draft: Option<Draft>,

        /// Output format: flag, basic or hierarchical
        #[arg(long, default_value = "basic")]
        output: OutputFormat,

        /// List passing units too in basic output
        #[arg(long)]
        include_valid: bool,

        /// Print only the root causes of a failure
        #[arg(long)]
        root_cause: bool,

        /// Treat format as an assertion
        #[arg(long)]
        require_format: bool,

        /// Stop evaluating a subschema at its first failure
        #[arg(long)]
        short_circuit: bool,

        /// Local directory containing schema files
        #[arg(long)]
        schema_local_base: Option<PathBuf>,

        /// URL prefix to strip when mapping to local (e.g., https://example.com/schemas)
        #[arg(long, requires = "schema_local_base")]
        schema_remote_base: Option<String>,

        /// Fetch referenced documents over HTTP
        #[arg(long)]
        fetch: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Resolve a reference against a schema and print the target
    Resolve {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Reference to resolve, relative to the schema (e.g., #/$defs/item)
        reference: String,

        /// Additional schema documents that the reference may point into
        #[arg(long = "resource", value_name = "FILE")]
        resources: Vec<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Validate {
            schema,
            instance,
            resources,
            draft,
            output,
            include_valid,
            root_cause,
            require_format,
            short_circuit,
            schema_local_base,
            schema_remote_base,
            fetch,
            pretty,
        } => run_validate(ValidateArgs {
            schema,
            instance,
            resources,
            draft,
            output,
            include_valid,
            root_cause,
            require_format,
            short_circuit,
            schema_local_base,
            schema_remote_base,
            fetch,
            pretty,
        }),

        Commands::Resolve {
            schema,
            reference,
            resources,
            pretty,
        } => run_resolve(&schema, &reference, &resources, pretty),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

struct ValidateArgs {
    schema: String,
    instance: PathBuf,
    resources: Vec<PathBuf>,
    draft: Option<Draft>,
    output: OutputFormat,
    include_valid: bool,
    root_cause: bool,
    require_format: bool,
    short_circuit: bool,
    schema_local_base: Option<PathBuf>,
    schema_remote_base: Option<String>,
    fetch: bool,
    pretty: bool,
}

fn run_validate(args: ValidateArgs) -> Result<(), u8> {
    let ValidateArgs {
        schema: schema_source,
        instance: instance_path,
        resources,
        draft,
        output,
        include_valid,
        root_cause,
        require_format,
        short_circuit,
        schema_local_base,
        schema_remote_base,
        fetch,
        pretty,
    } = args;

    let instance = load_schema(&instance_path).map_err(|e| {
        report_error(&format!("loading instance: {}", e));
        e.exit_code() as u8
    })?;

    let mut options = EvaluationOptions::new()
        .output_format(output)
        .include_valid_units(include_valid)
        .require_format_validation(require_format)
        .short_circuit(short_circuit);
    if let Some(draft) = draft {
        options = options.draft(draft);
    }

    let (builder, schema) = prepare(&schema_source, &resources)?;
    let builder = builder.options(options);

    // A local mirror is consulted even without --fetch; HTTP only with it.
    let built = if fetch || schema_local_base.is_some() {
        let fetcher = SchemaFetcher::new()
            .with_base(SchemaBaseConfig {
                local_base: schema_local_base,
                remote_base: schema_remote_base,
            })
            .http(fetch);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                report_error(&format!("starting async runtime: {}", e));
                3u8
            })?;
        runtime.block_on(builder.build_with_fetcher(schema, &fetcher, &CancellationToken::new()))
    } else {
        builder.build(schema)
    };
    let validator = built.map_err(|e| {
        report_error(&e.to_string());
        e.exit_code() as u8
    })?;

    let results = validator.evaluate(&instance);
    let valid = results.valid;
    tracing::info!(valid, instance = %instance_path.display(), "evaluation finished");

    let rendered = if root_cause {
        render(
            &json!({
                "valid": valid,
                "errors": root_cause_errors(&results)
            }),
            pretty,
        )?
    } else {
        render(&results.project(output, include_valid), pretty)?
    };
    println!("{}", rendered);

    if valid {
        Ok(())
    } else {
        Err(1)
    }
}

fn run_resolve(
    schema_source: &str,
    reference: &str,
    resources: &[PathBuf],
    pretty: bool,
) -> Result<(), u8> {
    let (builder, schema) = prepare(schema_source, resources)?;
    let validator = builder.build(schema).map_err(|e| {
        report_error(&e.to_string());
        e.exit_code() as u8
    })?;

    let target = validator
        .registry()
        .resolve_ref(validator.root_uri(), reference)
        .map_err(|e| {
            report_error(&e.to_string());
            e.exit_code() as u8
        })?;

    let output = json!({
        "location": format!("{}#{}", target.base, target.pointer),
        "schema": target.value
    });
    println!("{}", render(&output, pretty)?);
    Ok(())
}

/// Load the root schema and every extra resource into a builder.
///
/// Documents are registered under their own location (a `file://` URI for
/// local files), so relative references between sibling files resolve.
fn prepare(schema_source: &str, resources: &[PathBuf]) -> Result<(ValidatorBuilder, Value), u8> {
    let schema = load_schema_auto(schema_source).map_err(|e| {
        report_error(&format!("loading schema: {}", e));
        e.exit_code() as u8
    })?;
    let base = if is_url(schema_source) {
        schema_source.to_string()
    } else {
        file_uri(Path::new(schema_source))?
    };

    let mut builder = Validator::builder().base_uri(base);
    for path in resources {
        let document = load_schema(path).map_err(|e| {
            report_error(&format!("loading resource: {}", e));
            e.exit_code() as u8
        })?;
        builder = builder.resource(file_uri(path)?, document);
    }
    Ok((builder, schema))
}

fn file_uri(path: &Path) -> Result<String, u8> {
    let absolute = std::fs::canonicalize(path).map_err(|e| {
        report_error(&format!("cannot read {}: {}", path.display(), e));
        3u8
    })?;
    Url::from_file_path(&absolute).map(String::from).map_err(|()| {
        report_error(&format!("cannot express {} as a file URI", absolute.display()));
        2u8
    })
}

fn render(value: &impl Serialize, pretty: bool) -> Result<String, u8> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        report_error(&format!("serializing output: {}", e));
        2u8
    })
}

fn report_error(msg: &str) {
    eprintln!("Error: {}", msg);
}
