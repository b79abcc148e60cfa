//! Wiring shared by both binaries: logging, HTTP transport, gateways and
//! the user-facing progress lines.

use bioactivity_common::SandboxClient;
use bioactivity_ingestion::sources::chembl::ChemblClient;
use bioactivity_ingestion::sources::pubchem::PubChemClient;
use bioactivity_ingestion::{BioactivityPipeline, Progress};
use bioactivity_report::Presenter;
use tracing::{debug, info};

use crate::config::Config;

/// Structured logs go to stderr so the table on stdout stays clean.
/// `RUST_LOG` overrides the default `warn` level.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Reads `.env` (if any) and then the TOML configuration.
pub fn load_config() -> anyhow::Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        debug!(path = %path.display(), "Loaded .env");
    }
    let config = Config::load()?;
    info!(
        chembl = %config.chembl.base_url,
        organism = %config.chembl.organism,
        "Configuration loaded"
    );
    Ok(config)
}

pub fn http_client(config: &Config) -> anyhow::Result<SandboxClient> {
    Ok(SandboxClient::with_settings(&config.http_settings())?)
}

pub fn chembl_gateway(config: &Config, client: SandboxClient) -> ChemblClient {
    ChemblClient::with_client(client, &config.chembl.base_url, config.chembl.page_size)
}

/// `None` when PubChem is switched off in the configuration.
pub fn pubchem_client(config: &Config, client: SandboxClient) -> Option<PubChemClient> {
    config
        .pubchem
        .enabled
        .then(|| PubChemClient::with_client(client, &config.pubchem.base_url))
}

/// Pipeline over the live ChEMBL service, restricted to the configured organism.
pub fn live_pipeline(config: &Config, client: SandboxClient) -> BioactivityPipeline<ChemblClient> {
    BioactivityPipeline::new(chembl_gateway(config, client)).with_organism(config.chembl.organism.clone())
}

pub fn presenter(config: &Config) -> anyhow::Result<Presenter> {
    Ok(Presenter::from_preference(config.render_preference()?))
}

pub fn progress_line(progress: Progress<'_>) -> String {
    match progress {
        Progress::LookingUp { query } => format!("🔎 Looking up ChEMBL ID for '{}'...", query),
        Progress::Found { id } => format!("✅ Found ChEMBL ID: {}", id),
        Progress::Fetching { id, organism } => {
            format!("📥 Fetching {} bioactivities for {}...", organism, id)
        }
        Progress::Retrieved { count } => format!("📊 Retrieved {} activity records", count),
    }
}

pub fn print_progress(progress: Progress<'_>) {
    println!("{}", progress_line(progress));
}
