use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mcp_supplyflow::{
    config::{Config, LogFormat},
    pipeline::{Orchestrator, RunPipelineParams},
    server::{AppState, McpServer},
    state::WorkflowState,
    storage::{SqliteStorage, Storage, TraceEntry},
};

#[derive(Parser)]
#[command(
    name = "mcp-supplyflow",
    version,
    about = "Supply chain decision pipeline exposed as an MCP server"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the canned monsoon cyclone scenario and print the report
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    match cli.command {
        Some(Command::Demo) => run_demo(&config).await,
        None => serve(config).await,
    }
}

/// Run the MCP server over stdio.
async fn serve(config: Config) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Supply chain MCP server starting..."
    );

    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    let state = Arc::new(AppState::new(config, storage));
    let server = McpServer::new(state);

    info!("Server ready, waiting for requests on stdin...");

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Execute the monsoon cyclone scenario end to end against an in-memory
/// database and print the stakeholder report plus the execution trace.
async fn run_demo(config: &Config) -> anyhow::Result<()> {
    let storage = SqliteStorage::new_in_memory().await?;
    let orchestrator = Orchestrator::new(
        Arc::new(mcp_supplyflow::catalog::Catalog::builtin()),
        storage.clone(),
        config,
    );

    let mut run = storage.get_or_create_run(&None).await?;
    let mut state = WorkflowState::new();

    let report = orchestrator
        .run_pipeline(
            &mut run,
            &mut state,
            &RunPipelineParams {
                product_sku: "RC-FULL-NVY-M".to_string(),
                region: "Mumbai".to_string(),
                event_type: Some("cyclone".to_string()),
                event_description: Some("Cyclone Nisarga Approaching Mumbai".to_string()),
                urgency: None,
                budget_limit: None,
                disruption_region: Some("Mumbai".to_string()),
                run_id: None,
            },
        )
        .await?;

    if let Some(alert) = &report.state.alert {
        println!("{}", alert.summary);
    }

    println!();
    println!("Run {} finished with severity {}", report.run_id, report.severity);
    println!();
    println!("Execution trace:");
    for entry in storage.get_run_trace(&report.run_id).await? {
        println!("{}", trace_line(&entry));
    }

    Ok(())
}

/// One printed line per trace entry. Pending entries have no latency yet
/// and print as 0 ms.
fn trace_line(entry: &TraceEntry) -> String {
    format!(
        "  [{}] {} {} ({} ms)",
        entry.stage,
        entry.tool_name,
        if entry.success { "ok" } else { "failed" },
        entry.latency_ms.unwrap_or(0)
    )
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
