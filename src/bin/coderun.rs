//! coderun CLI
//!
//! Serve the execution API, run a single file through the sandbox, or
//! inspect the effective configuration.

use clap::{Parser, Subcommand};
use coderun::config::{config_path, read_config_snapshot, validate_config, Config};
use coderun::server::{build_router, ExecuteResponse};
use coderun::{ExecutionService, VERSION};
use console::style;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "coderun",
    version = VERSION,
    about = "coderun - Sandboxed code execution service",
    long_about = None
)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        bind: Option<String>,

        /// Port (overrides config)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Execute a source file in the sandbox and print the result
    Run {
        /// Programming language
        #[arg(long, short, default_value = "javascript")]
        language: String,

        /// File whose contents are fed to the program's stdin (Java only)
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,

        /// Source file
        file: PathBuf,
    },

    /// Show the effective configuration
    Config {
        /// Exit with an error if validation fails
        #[arg(long)]
        validate: bool,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "coderun=info,tower_http=info".into());

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Serve { bind, port } => serve(bind, port).await,
        Commands::Run {
            language,
            input,
            json,
            file,
        } => run_file(&language, input, json, file).await,
        Commands::Config { validate } => show_config(validate),
    }
}

async fn serve(bind: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let validation = validate_config(&config);
    for warning in &validation.warnings {
        tracing::warn!("{}", warning);
    }
    if !validation.valid {
        for issue in &validation.errors {
            tracing::error!("{}", issue);
        }
        anyhow::bail!("Invalid configuration");
    }

    let service = ExecutionService::new(config.sandbox.clone()).await?;
    info!(
        "Sandbox backend: {}, scratch area: {}",
        service.backend_name(),
        config.sandbox.scratch_dir.display()
    );

    let app = build_router(service, &config.server);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    info!("coderun listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn run_file(
    language: &str,
    input: Option<PathBuf>,
    json: bool,
    file: PathBuf,
) -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let code = tokio::fs::read_to_string(&file).await?;
    let input = match input {
        Some(path) => Some(tokio::fs::read_to_string(path).await?),
        None => None,
    };

    let service = ExecutionService::new(config.sandbox).await?;

    if !json {
        println!("Executing {} ...\n", style(file.display()).bold());
    }

    let result = service.submit(Some(code), Some(language), input).await?;
    let success = result.success;

    if json {
        let response = ExecuteResponse::from(result);
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        if !result.stdout.is_empty() {
            println!("{}", result.stdout);
        }
        if result.success {
            if !result.stderr.is_empty() {
                eprintln!("{}", style(&result.stderr).yellow());
            }
        } else if let Some(error) = &result.error {
            eprintln!("{} {}", style("Execution failed:").red().bold(), error);
        }
        println!(
            "\n{}",
            style(format!("Time: {}ms", result.execution_time_ms())).dim()
        );
    }

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

fn show_config(validate: bool) -> anyhow::Result<()> {
    let path = config_path();
    let snapshot = read_config_snapshot(&path);
    println!(
        "{} {} ({})",
        style("Config file:").bold(),
        path.display(),
        if snapshot.exists { "found" } else { "not found" }
    );
    for issue in &snapshot.issues {
        println!("  {}", style(issue).yellow());
    }

    let config = Config::from_env()?;
    println!("{}", serde_json::to_string_pretty(&config)?);

    let validation = validate_config(&config);
    for warning in &validation.warnings {
        println!("{} {}", style("warning:").yellow(), warning);
    }
    for error in &validation.errors {
        println!("{} {}", style("error:").red(), error);
    }

    if validate && !validation.valid {
        anyhow::bail!("Configuration has {} error(s)", validation.errors.len());
    }
    Ok(())
}
