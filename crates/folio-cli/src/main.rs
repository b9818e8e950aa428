//! Folio CLI - document sessions over stdio

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use folio_core::api;
use folio_core::config::Config;
use folio_core::dispatch::{Dispatcher, TransientCall};
use folio_core::document::{DocumentKind, JsonDocumentLibrary};
use folio_core::operations::{Access, OperationDescriptor};
use folio_core::session::SessionStore;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "folio")]
#[command(author, version, about = "Session-based document operation server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve JSON requests, one per line, on stdin/stdout
    Serve,

    /// Run one operation against a file without opening a session
    Exec {
        /// Document path
        path: PathBuf,
        /// Operation name
        operation: String,
        /// Parameters as a JSON object
        #[arg(short, long)]
        params: Option<String>,
        /// Document type (inferred from the extension by default)
        #[arg(short = 't', long = "type")]
        document_type: Option<String>,
        /// Write a modified document here instead of back to PATH
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the operations available for a document type
    Operations {
        /// Document type (word, excel, powerpoint, pdf, email)
        #[arg(short = 't', long = "type")]
        document_type: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries protocol output, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("folio=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => cmd_serve(cli.quiet).await,

        Commands::Exec {
            path,
            operation,
            params,
            document_type,
            output,
        } => {
            cmd_exec(
                path,
                operation,
                params.as_deref(),
                document_type.as_deref(),
                output,
                cli.format,
            )
            .await
        }

        Commands::Operations { document_type } => cmd_operations(&document_type, cli.format),

        Commands::Config { action } => cmd_config(action, cli.quiet),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn build_dispatcher(config: &Config) -> anyhow::Result<Dispatcher> {
    let store = Arc::new(SessionStore::new(
        config.to_store_config(),
        Arc::new(JsonDocumentLibrary),
        Arc::new(config.temp_manager()),
    ));
    Dispatcher::with_builtin_handlers(store).context("Failed to build operation registries")
}

/// Responses waiting for the stdout writer
const RESPONSE_BUFFER: usize = 64;

async fn cmd_serve(quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let dispatcher = Arc::new(build_dispatcher(&config)?);
    let store = Arc::clone(dispatcher.store());

    if !store.start_reaper() {
        info!("Session expiry disabled; sessions stay open until closed");
    }
    if !quiet {
        info!(temp_dir = %store.temp().root().display(), "Serving requests on stdin");
    }

    // Single writer so concurrent responses never interleave
    let (responses, mut outbox) = mpsc::channel::<String>(RESPONSE_BUFFER);
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(encoded) = outbox.recv().await {
            stdout.write_all(encoded.as_bytes()).await?;
            stdout.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight = JoinSet::new();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read request")?,
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                log_request_task(joined);
                continue;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                None
            }
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let dispatcher = Arc::clone(&dispatcher);
        let responses = responses.clone();
        in_flight.spawn(async move {
            let response = api::handle_line(&dispatcher, &line).await;
            match serde_json::to_string(&response) {
                Ok(mut encoded) => {
                    encoded.push('\n');
                    if responses.send(encoded).await.is_err() {
                        warn!("Response writer closed; dropping response");
                    }
                }
                Err(e) => warn!(error = %e, "Failed to encode response"),
            }
        });
    }

    while let Some(joined) = in_flight.join_next().await {
        log_request_task(joined);
    }
    drop(responses);
    writer
        .await
        .context("Response writer task failed")?
        .context("Failed to write response")?;

    let report = store.shutdown().await;
    if !report.unsaved_sessions.is_empty() {
        warn!(
            sessions = ?report.unsaved_sessions,
            "Discarded sessions with unsaved changes"
        );
    }
    info!("{}", report.summary());
    Ok(())
}

fn log_request_task(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Request task ended abnormally");
    }
}

async fn cmd_exec(
    path: PathBuf,
    operation: String,
    params: Option<&str>,
    document_type: Option<&str>,
    output: Option<PathBuf>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let params: Value = match params {
        Some(raw) => serde_json::from_str(raw)
            .with_context(|| format!("Invalid --params JSON: {}", raw))?,
        None => Value::Null,
    };
    let kind = document_type
        .map(str::parse::<DocumentKind>)
        .transpose()?;

    let config = Config::load()?;
    let dispatcher = build_dispatcher(&config)?;
    let result = dispatcher
        .execute_transient(TransientCall {
            kind,
            path,
            operation,
            params,
            output_path: output,
        })
        .await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            println!("{}", render_value(&result.value)?);
            if let Some(saved_to) = &result.saved_to {
                eprintln!("Saved {}", saved_to.display());
            }
        }
    }
    Ok(())
}

fn cmd_operations(document_type: &str, format: OutputFormat) -> anyhow::Result<()> {
    let kind: DocumentKind = document_type.parse()?;
    let dispatcher = build_dispatcher(&Config::default())?;
    let operations = dispatcher.registries().operations(kind);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&operations)?),
        OutputFormat::Text => {
            println!("{} operations:", kind);
            for descriptor in &operations {
                println!("{}", describe_operation(descriptor));
            }
        }
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            // Environment overrides are not persisted
            let mut config = Config::load_from(&Config::config_path()?)?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

// ============================================================================
// Rendering
// ============================================================================

/// Strings print raw; everything else as pretty JSON
fn render_value(value: &Value) -> anyhow::Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Ok(serde_json::to_string_pretty(other)?),
    }
}

fn describe_operation(descriptor: &OperationDescriptor) -> String {
    let access = match descriptor.access {
        Access::Read => "read",
        Access::Write => "write",
    };
    let params = descriptor
        .parameters
        .iter()
        .map(|p| {
            if p.required {
                format!("{}:{}", p.name, p.kind.as_str())
            } else {
                format!("[{}:{}]", p.name, p.kind.as_str())
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    if params.is_empty() {
        format!("  {:<20} {:<6} {}", descriptor.operation, access, descriptor.description)
    } else {
        format!(
            "  {:<20} {:<6} {} ({})",
            descriptor.operation, access, descriptor.description, params
        )
    }
}
