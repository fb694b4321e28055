//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ltsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(long, global = true, help = "Log filter directives, defaults to RUST_LOG")]
    pub log: Option<String>,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub log_json: bool,

    #[arg(long, global = true, help = "Enable OpenTelemetry tracing under this service name")]
    pub otel_service: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(name = "sync", about = "Run one full resync pass per configured scope")]
    Sync(SyncArgs),

    #[command(name = "plan", about = "Compute the new version a mutation request would create")]
    Plan(PlanArgs),

    #[command(name = "key", about = "Parse or build cache keys")]
    Key(KeyArgs),
}

mod key;
mod plan;
mod sync;

pub use key::{KeyArgs, KeySubcommand};
pub use plan::PlanArgs;
pub use sync::SyncArgs;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    match &cli.otel_service {
        Some(service) => {
            crate::telemetry::init_tracing(service, cli.log.as_deref());
        }
        None => crate::telemetry::init_logging(cli.log.as_deref(), cli.log_json),
    }

    let result = match &cli.command {
        Commands::Sync(args) => sync::execute(args).await,
        Commands::Plan(args) => plan::execute(args).await,
        Commands::Key(args) => key::execute(args),
    };

    if cli.otel_service.is_some() {
        crate::telemetry::shutdown_tracing();
    }
    result
}
