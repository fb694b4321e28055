use crate::keys::{Namespace, ResourceKey, AWS_PROVIDER};
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
pub struct KeyArgs {
    #[command(subcommand)]
    pub command: KeySubcommand,
}

#[derive(Subcommand, Debug)]
pub enum KeySubcommand {
    #[command(name = "parse", about = "Parse a serialized key into its fields")]
    Parse {
        key: String,
    },

    #[command(name = "build", about = "Build a serialized key from its fields")]
    Build {
        #[arg(long, default_value = AWS_PROVIDER)]
        provider: String,
        #[arg(long, help = "launchTemplates, launchTemplateVersions or images")]
        namespace: Namespace,
        #[arg(long)]
        account: String,
        #[arg(long)]
        region: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        version: Option<u64>,
    },
}

pub fn execute(args: &KeyArgs) -> Result<()> {
    match &args.command {
        KeySubcommand::Parse { key } => {
            let key = ResourceKey::parse(key)?;
            println!("provider:    {}", key.provider());
            println!("namespace:   {}", key.namespace());
            println!("account:     {}", key.account());
            println!("region:      {}", key.region());
            println!("name:        {}", key.name());
            if let Some(version) = key.version() {
                println!("version:     {}", version);
            }
            if let Some(application) = key.application() {
                println!("application: {}", application);
            }
        }
        KeySubcommand::Build {
            provider,
            namespace,
            account,
            region,
            name,
            version,
        } => {
            let key = ResourceKey::build(provider, *namespace, name, account, region, *version)?;
            println!("{}", key);
        }
    }
    Ok(())
}
