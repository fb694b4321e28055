use crate::config::Config;
use crate::metrics::SyncMetrics;
use crate::progress::TaskContext;
use crate::provider::SnapshotProvider;
use crate::store::MemoryCacheStore;
use crate::sync::CachingScheduler;
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
pub struct SyncArgs {
    #[arg(short, long, help = "Path to the TOML configuration")]
    pub config: PathBuf,

    #[arg(short, long, help = "Path to the provider snapshot JSON")]
    pub snapshot: PathBuf,

    #[arg(long, help = "Override the per-pass concurrency limit")]
    pub concurrency: Option<usize>,
}

pub async fn execute(args: &SyncArgs) -> Result<()> {
    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    if let Some(limit) = args.concurrency {
        config.global.concurrency_limit = limit;
    }
    config.validate()?;

    let raw = std::fs::read_to_string(&args.snapshot)
        .with_context(|| format!("Failed to read snapshot {}", args.snapshot.display()))?;
    let provider = Arc::new(
        SnapshotProvider::from_json(&raw)
            .context("Invalid snapshot")?
            .with_name(&config.global.provider),
    );
    let store = Arc::new(MemoryCacheStore::for_provider(&config.global.provider));
    let metrics = SyncMetrics::new();

    let scheduler = CachingScheduler::from_config(&config, provider, store.clone(), metrics);
    let results = scheduler.run_once(&TaskContext::new()).await;

    let mut failed = 0usize;
    for (agent_type, result) in &results {
        match result {
            Ok(report) => eprintln!(
                "{}: {} entries ({} with images) in {:?}",
                agent_type, report.entries, report.related, report.duration
            ),
            Err(e) => {
                failed += 1;
                eprintln!("{}: FAILED {}", agent_type, e);
            }
        }
    }

    let mut published = Vec::new();
    for agent in scheduler.agents() {
        published.extend(store.entries(crate::keys::Namespace::LaunchTemplates, agent.scope()));
    }
    println!("{}", serde_json::to_string_pretty(&published)?);

    if failed > 0 {
        bail!("{} of {} scopes failed to sync", failed, results.len());
    }
    Ok(())
}
