use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use graphsub::events::RawMutationRecord;
use graphsub::replay::{replay, ReplaySubscription};
use graphsub::{EngineConfig, SchemaMetadata, TypeRegistry};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate schema metadata and print a summary
    CheckSchema {
        #[clap(short, long)]
        schema: PathBuf,
    },
    /// Replay recorded mutation records against subscription documents and
    /// print every delivered payload as a JSON line
    Replay {
        #[clap(short, long)]
        schema: PathBuf,
        /// YAML or JSON list of `{ document, variables, operationName }`
        #[clap(long)]
        subscriptions: PathBuf,
        /// One raw mutation record per line
        #[clap(short, long)]
        events: PathBuf,
        /// Overrides GRAPHSUB_QUEUE_CAPACITY
        #[clap(long)]
        queue_capacity: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    match args.command {
        Commands::CheckSchema { schema } => {
            info!("Checking schema: {}", schema.display());
            let registry = load_schema(&schema)?;
            for concrete in registry.concrete_types() {
                println!(
                    "{} ({} fields, {} relationships)",
                    concrete.name,
                    concrete.fields.len(),
                    concrete.relationships.len()
                );
            }
        }
        Commands::Replay {
            schema,
            subscriptions,
            events,
            queue_capacity,
        } => {
            info!("Replaying {} against {}", events.display(), schema.display());
            let registry = load_schema(&schema)?;
            let subscriptions = load_subscriptions(&subscriptions)?;
            let records = load_events(&events)?;

            let mut config = EngineConfig::from_env();
            if let Some(capacity) = queue_capacity {
                config = config.with_queue_capacity(capacity);
            }

            let report = replay(registry, config, &subscriptions, records).await?;
            for payload in &report.payloads {
                println!("{}", serde_json::to_string(payload)?);
            }
            info!(
                "Delivered {} payloads, {} records rejected, stats: {}",
                report.payloads.len(),
                report.rejected,
                serde_json::to_string(&report.stats)?
            );
        }
    }

    Ok(())
}

fn load_schema(path: &Path) -> Result<TypeRegistry> {
    let metadata = SchemaMetadata::from_path(path)
        .with_context(|| format!("failed to load schema {}", path.display()))?;
    Ok(TypeRegistry::from_metadata(metadata)?)
}

fn load_subscriptions(path: &Path) -> Result<Vec<ReplaySubscription>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    // YAML is a superset of JSON
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse subscriptions in {}", path.display()))
}

fn load_events(path: &Path) -> Result<Vec<RawMutationRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid mutation record", path.display(), index + 1))
        })
        .collect()
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level.to_string()))
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
