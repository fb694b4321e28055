use crate::model::{RawTemplateVersion, VersionedResource};
use crate::mutation::{plan_mutation, MutationRequest};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
pub struct PlanArgs {
    #[arg(short, long, help = "Path to the current version JSON, as listed by the provider")]
    pub current: PathBuf,

    #[arg(short, long, help = "Path to the mutation request JSON")]
    pub request: PathBuf,
}

pub async fn execute(args: &PlanArgs) -> Result<()> {
    let current: RawTemplateVersion = read_json(&args.current)?;
    let request: MutationRequest = read_json(&args.request)?;

    let plan = plan_mutation(&VersionedResource::from_version(&current), &request)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}
