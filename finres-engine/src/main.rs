//! finres-engine - Financial Figure Resolution
//!
//! Reads a document's fragments (JSON), resolves every target metric and
//! prints a status report listing each metric/period as resolved or
//! unresolved.

use anyhow::{Context, Result};
use clap::Parser;
use finres_common::config::ConfigPathResolver;
use finres_engine::adjudication::{HttpReasoningClient, ReasoningService};
use finres_engine::types::{Fragment, MetricId, ResolutionRequest};
use finres_engine::workflow::render_report;
use finres_engine::{EngineConfig, ResolutionContext, ResolutionOrchestrator};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "finres-engine",
    version,
    about = "Resolve financial figures from document fragments"
)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, env = "FINRES_CONFIG")]
    config: Option<PathBuf>,

    /// Fragments file: a JSON array of fragments or a full resolution request
    #[arg(long)]
    fragments: PathBuf,

    /// Comma-separated target metrics (e.g. REVENUE,NET_DEBT)
    #[arg(long, value_delimiter = ',')]
    targets: Vec<MetricId>,

    /// Document identifier used in logs and the report
    #[arg(long)]
    document_id: Option<String>,
}

/// Accepted shapes of the fragments file
#[derive(Deserialize)]
#[serde(untagged)]
enum FragmentsFile {
    Request(ResolutionRequest),
    Fragments(Vec<Fragment>),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = ConfigPathResolver::new().resolve(args.config.as_deref());
    let config =
        EngineConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    finres_common::logging::init(&config.logging).context("Failed to initialize logging")?;
    info!("Starting finres-engine {}", env!("CARGO_PKG_VERSION"));

    let content = std::fs::read_to_string(&args.fragments)
        .with_context(|| format!("Failed to read {}", args.fragments.display()))?;
    let parsed: FragmentsFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", args.fragments.display()))?;

    let default_id = args
        .fragments
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let mut request = match parsed {
        FragmentsFile::Request(request) => request,
        FragmentsFile::Fragments(fragments) => ResolutionRequest::new(default_id, fragments),
    };
    if let Some(id) = args.document_id {
        request.document_id = id;
    }
    if !args.targets.is_empty() {
        request = request.with_targets(args.targets);
    }

    let ctx = Arc::new(ResolutionContext::from_config(&config).context("Invalid configuration")?);

    let service: Option<Arc<dyn ReasoningService>> =
        match HttpReasoningClient::from_config(&config.adjudication)
            .context("Failed to build reasoning client")?
        {
            Some(client) => {
                info!("Reasoning service: {}", client.endpoint());
                let client: Arc<dyn ReasoningService> = Arc::new(client);
                Some(client)
            }
            None => {
                info!("No reasoning endpoint configured; tied groups use the fallback");
                None
            }
        };

    let orchestrator = ResolutionOrchestrator::new(ctx, service);
    let document = orchestrator
        .resolve(request)
        .await
        .context("Resolution failed")?;

    print!("{}", render_report(&document));
    Ok(())
}
