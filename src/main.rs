mod config;
mod error;
mod indicator;
mod model;
mod parsing;
mod provider;
mod repl;
mod server;
mod ticker;
mod tools;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use provider::MarketData;
use provider::yahoo::YahooFinance;
use repl::Repl;
use server::Server;
use server::catalog::ToolCatalog;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("market data provider error")]
    Provider,
    #[display("server error")]
    Server,
}

#[derive(Parser)]
#[command(
    name = "technical-analysis",
    about = "Technical analysis tool server for stocks, indices and crypto"
)]
struct Cli {
    /// Path to a TOML configuration file; built-in defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Mode>,
}

#[derive(Subcommand, Default)]
enum Mode {
    /// Speak JSON-RPC on stdin/stdout (default)
    #[default]
    Serve,
    /// Interactive shell for trying the tools by hand
    Repl,
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => config::load(path).change_context(AppError::Config)?,
        None => AppConfig::default(),
    };

    init_tracing(&config);

    let provider: Arc<dyn MarketData> =
        Arc::new(YahooFinance::new(&config.provider).change_context(AppError::Provider)?);
    let server = Server::new(config.server.name.clone(), ToolCatalog::new(provider));

    match cli.command.unwrap_or_default() {
        Mode::Serve => server.serve_stdio().await.change_context(AppError::Server)?,
        Mode::Repl => Repl::new(&server)
            .run()
            .await
            .change_context(AppError::Server)?,
    }

    info!("shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
