//! bioactivity: ChEMBL bioactivity report for one compound.
//!
//!   bioactivity [COMPOUND]
//!
//! Without a compound the configured default (scopolamine) is used.

use std::process::ExitCode;

use bioactivity_cli::app;
use clap::Parser;
use tracing::error;

#[derive(Debug, Parser)]
#[command(name = "bioactivity", version, about = "Human ChEMBL bioactivities for a compound")]
struct Cli {
    /// Compound name, matched exactly and case-insensitively against ChEMBL preferred names
    compound: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    app::init_tracing();
    let cli = Cli::parse();

    let config = app::load_config()?;
    let compound = cli
        .compound
        .unwrap_or_else(|| config.report.default_compound.clone());

    let client = app::http_client(&config)?;
    let pipeline = app::live_pipeline(&config, client);
    let presenter = app::presenter(&config)?;

    let report = match pipeline.run(&compound, app::print_progress).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Report failed");
            eprintln!("❌ {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    if report.table.is_empty() {
        println!("No {} bioactivity rows returned by ChEMBL.", pipeline.organism());
    }
    presenter.present(&report.table)?;

    Ok(ExitCode::SUCCESS)
}
