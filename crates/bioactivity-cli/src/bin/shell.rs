//! bioactivity-shell: interactive compound lookups.
//!
//! Lines are handled one at a time; the next prompt appears only after the
//! previous lookup has finished.

use std::io::Write;

use bioactivity_cli::interactive::{HELP, PROMPT};
use bioactivity_cli::{app, Outcome, Session};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    app::init_tracing();

    let config = app::load_config()?;
    let client = app::http_client(&config)?;
    let pipeline = app::live_pipeline(&config, client.clone());

    let mut session = Session::new(pipeline, app::presenter(&config)?)
        .with_pubchem(app::pubchem_client(&config, client))
        .with_filter(config.report.activity_filter.clone())
        .with_sort(config.sort_order()?)
        .with_separator(config.csv_separator()?);

    println!("🧪 ChEMBL bioactivity shell (default compound: {})", config.report.default_compound);
    print!("{}", HELP);

    let mut editor = DefaultEditor::new()?;
    let _ = editor.add_history_entry(config.report.default_compound.as_str());

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        if !line.trim().is_empty() {
            let _ = editor.add_history_entry(line.as_str());
        }

        let mut stdout = std::io::stdout().lock();
        let outcome = session.handle(&line, &mut stdout).await?;
        stdout.flush()?;
        if outcome == Outcome::Quit {
            break;
        }
    }

    info!("Shell closed");
    Ok(())
}
