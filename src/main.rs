//! taskline CLI - manage connections and run one-shot LLM tasks

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use taskline::config::{mask_api_key, ConnectionStore, DEFAULT_CONNECTION};
use taskline::error::{FixSuggestion, TasklineError};
use taskline::facade::ProviderFacade;
use taskline::invocation::LlmStep;
use taskline::meta::{InvocationSpecMeta, TaskMeta};
use taskline::output_spec::OutputSpec;
use taskline::task::TaskSpec;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[derive(Parser)]
#[command(name = "taskline")]
#[command(about = "taskline - sequential LLM task pipelines")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a connection file (if missing) and print its path
    Config {
        /// Connection name
        #[arg(short, long, default_value = DEFAULT_CONNECTION)]
        connection: String,
    },

    /// Validate a connection file
    Check {
        /// Connection name
        #[arg(short, long, default_value = DEFAULT_CONNECTION)]
        connection: String,
    },

    /// Send stdin through a one-step LLM task
    Run {
        /// Connection name
        #[arg(short, long, default_value = DEFAULT_CONNECTION)]
        connection: String,

        /// JSON Schema file; output is parsed and validated as JSON
        #[arg(long)]
        schema: Option<PathBuf>,

        /// System prompt
        #[arg(long, default_value = DEFAULT_SYSTEM_PROMPT)]
        system: String,

        /// Print the full task record instead of the output
        #[arg(long)]
        record: bool,
    },
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let store = ConnectionStore::from_env();

    let result = match cli.command {
        Commands::Config { connection } => init_connection(&store, &connection),
        Commands::Check { connection } => check_connection(&store, &connection),
        Commands::Run {
            connection,
            schema,
            system,
            record,
        } => run_task(store, &connection, schema, system, record).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn init_connection(store: &ConnectionStore, name: &str) -> Result<(), TasklineError> {
    let existed = store.exists(name)?;
    let path = store.initialize(name)?;

    if existed {
        println!("{} Connection '{}' already exists", "→".cyan(), name.cyan().bold());
    } else {
        println!("{} Created connection '{}'", "✓".green(), name.cyan().bold());
        println!("  Fill in provider, model, base_url and api_key, then run `taskline check`");
    }
    println!("{}", path.display());
    Ok(())
}

fn check_connection(store: &ConnectionStore, name: &str) -> Result<(), TasklineError> {
    let connection = store.get(name)?;

    println!("{} Connection '{}' is valid", "✓".green(), name);
    println!("  Provider: {}", connection.provider);
    println!("  Model: {}", connection.model);
    if !connection.is_mock() {
        println!("  Base URL: {}", connection.base_url);
        println!("  API key: {}", mask_api_key(&connection.api_key, 6));
    }
    Ok(())
}

async fn run_task(
    store: ConnectionStore,
    connection: &str,
    schema: Option<PathBuf>,
    system: String,
    print_record: bool,
) -> Result<(), TasklineError> {
    let output_spec = match schema {
        Some(path) => {
            let content = tokio::fs::read_to_string(&path).await?;
            let schema: Value = serde_json::from_str(&content)?;
            OutputSpec::json_schema("Output", schema)
        }
        None => OutputSpec::Text,
    };

    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;

    let step = LlmStep::prompted(
        InvocationSpecMeta::new("prompt", "answer the input")?,
        output_spec,
        system,
    );
    let task = TaskSpec::from_single_step(TaskMeta::new("cli")?, step);
    let facade = ProviderFacade::new(store).with_default_connection(connection);

    let record = task
        .run_with(Arc::new(facade), Value::String(input.trim_end().to_string()), None)
        .await?;

    if print_record {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    match record.output {
        Some(Value::String(text)) => println!("{}", text),
        Some(other) => println!("{}", serde_json::to_string_pretty(&other)?),
        None => {}
    }
    Ok(())
}
