//! Inventory Agent
//!
//! Collects host telemetry and reports it to the inventory server.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use inventory_server::agent::{
    self, auth::RetryPolicy, config::AgentLoggingSettings, AgentConfig, Collector,
    ReqwestTransport, SysinfoPlatform, TokenSession,
};

#[derive(Parser, Debug)]
#[command(name = "inventory-agent", version, about = "IT inventory telemetry agent")]
struct Cli {
    /// Configuration file (defaults to config/agent.toml when present)
    #[arg(short, long, env = "INVENTORY_AGENT_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report periodically until interrupted
    Run,
    /// Collect and report once
    Once,
    /// Collect and print the report without sending it
    Print,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AgentConfig::load(cli.config.as_deref()).context("Failed to load agent configuration")?;
    let _guard = init_tracing(&config.logging)?;

    tracing::info!("Starting Inventory Agent v{}", env!("CARGO_PKG_VERSION"));

    let collector = Collector::new(Arc::new(SysinfoPlatform::new()), config.collection.clone());

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Print => {
            let report = collector.collect().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Once => {
            let mut session = session(&config)?;
            let result = agent::run_once(&collector, &mut session).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Run => {
            let mut session = session(&config)?;
            agent::run(&collector, &mut session, config.collection.interval(), async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for shutdown signal: {}", e);
                    std::future::pending::<()>().await;
                }
            })
            .await;
        }
    }

    Ok(())
}

fn session(config: &AgentConfig) -> anyhow::Result<TokenSession<ReqwestTransport>> {
    let transport = ReqwestTransport::new(&config.api.base_url, config.api.timeout())?;
    Ok(TokenSession::new(
        transport,
        &config.api.username,
        &config.api.password,
        RetryPolicy::from(&config.api),
    ))
}

/// Log to stdout, or to `logging.file` through a non-blocking writer
fn init_tracing(logging: &AgentLoggingSettings) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("inventory_server={0},inventory_agent={0}", logging.level).into()
    });

    match &logging.file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .context("logging.file must name a file")?;
            std::fs::create_dir_all(directory)
                .with_context(|| format!("Cannot create log directory {}", directory.display()))?;

            let appender = tracing_appender::rolling::daily(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            Ok(None)
        }
    }
}
