//! Interactive bioactivity session.
//!
//! Each input line is one event. `Session::handle` runs it to completion
//! before the caller reads the next line, so events never overlap.
//!
//! A search prints the ChEMBL table (after the activity filter and the
//! current sort, Target ascending unless changed), CSV and XLSX download
//! links, then the PubChem sections.
//! Filter, sort and separator changes re-render the last report without
//! fetching again.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, bail};
use bioactivity_common::ReportError;
use bioactivity_ingestion::normalise::normalise_query;
use bioactivity_ingestion::sources::pubchem::PubChemClient;
use bioactivity_ingestion::{BioactivityGateway, BioactivityPipeline, Column, DisplayTable, Report};
use bioactivity_report::export::{self, ExportFormat};
use bioactivity_report::shaping::{filter_activities, sort_table, FILTERABLE_ACTIVITIES};
use bioactivity_report::{CsvSeparator, Presenter, TextTable};
use tracing::{debug, instrument, warn};

use crate::app::progress_line;

pub const PROMPT: &str = "bioactivity> ";

pub const HELP: &str = "\
Commands:
  <name> | search <name>        look up a compound
  :filter IC50,Ki | :filter all  activity types to show
  :sort <column> [asc|desc]      sort by Target, Activity, Value, Units or Kd
  :sort off                      keep ChEMBL order
  :sep comma|semicolon|tab       CSV separator for downloads and exports
  :export csv|xlsx [dir]         save the current table
  :help                          this text
  :quit                          leave
";

const REPORT_STEM: &str = "bioactivity";
const PUBCHEM_STEM: &str = "pubchem_basic";
const EXPERIMENTAL_STEM: &str = "pubchem_properties";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Search(String),
    /// Empty means every activity type.
    Filter(Vec<String>),
    Sort(Option<(Column, bool)>),
    Separator(CsvSeparator),
    Export { format: ExportFormat, dir: PathBuf },
    Help,
    Quit,
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> anyhow::Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let Some(rest) = line.strip_prefix(':') else {
        let query = match line.split_once(char::is_whitespace) {
            Some((word, name)) if word.eq_ignore_ascii_case("search") => name.trim(),
            _ if line.eq_ignore_ascii_case("search") => "",
            _ => line,
        };
        return Ok(Some(Command::Search(query.to_string())));
    };

    let (word, args) = match rest.split_once(char::is_whitespace) {
        Some((w, a)) => (w, a.trim()),
        None => (rest, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "q" | "quit" | "exit" => Command::Quit,
        "h" | "help" => Command::Help,
        "filter" => Command::Filter(parse_filter(args)?),
        "sort" => Command::Sort(parse_sort(args)?),
        "sep" => Command::Separator(args.parse()?),
        "export" => {
            let mut parts = args.split_whitespace();
            let format: ExportFormat = parts
                .next()
                .ok_or_else(|| anyhow!("Usage: :export csv|xlsx [dir]"))?
                .parse()?;
            let dir = parts.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
            Command::Export { format, dir }
        }
        other => bail!("Unknown command ':{}' (try :help)", other),
    };
    Ok(Some(command))
}

fn parse_filter(args: &str) -> anyhow::Result<Vec<String>> {
    if args.is_empty() || args.eq_ignore_ascii_case("all") {
        return Ok(Vec::new());
    }
    args.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            FILTERABLE_ACTIVITIES
                .iter()
                .find(|a| a.eq_ignore_ascii_case(s))
                .map(|a| a.to_string())
                .ok_or_else(|| {
                    anyhow!(
                        "Unknown activity type '{}' (choose from {})",
                        s,
                        FILTERABLE_ACTIVITIES.join(", ")
                    )
                })
        })
        .collect()
}

/// Parses `<column> [asc|desc]`, or `off`/`none` for ChEMBL order.
pub fn parse_sort(args: &str) -> anyhow::Result<Option<(Column, bool)>> {
    let args = args.trim();
    if args.eq_ignore_ascii_case("off") || args.eq_ignore_ascii_case("none") {
        return Ok(None);
    }

    let mut words: Vec<&str> = args.split_whitespace().collect();
    let ascending = match words.last().map(|w| w.to_lowercase()) {
        Some(w) if w == "asc" => {
            words.pop();
            true
        }
        Some(w) if w == "desc" => {
            words.pop();
            false
        }
        _ => true,
    };

    let name = words.join(" ");
    if name.is_empty() {
        bail!("Usage: :sort <column> [asc|desc]");
    }
    let column = Column::from_name(&name).ok_or_else(|| anyhow!("Unknown column '{}'", name))?;
    Ok(Some((column, ascending)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Quit,
}

pub struct Session<G> {
    pipeline: BioactivityPipeline<G>,
    pubchem: Option<PubChemClient>,
    presenter: Presenter,
    filter: Vec<String>,
    sort: Option<(Column, bool)>,
    separator: CsvSeparator,
    last: Option<Report>,
}

impl<G: BioactivityGateway> Session<G> {
    pub fn new(pipeline: BioactivityPipeline<G>, presenter: Presenter) -> Self {
        Self {
            pipeline,
            pubchem: None,
            presenter,
            filter: Vec::new(),
            sort: Some((Column::Target, true)),
            separator: CsvSeparator::default(),
            last: None,
        }
    }

    pub fn with_pubchem(mut self, pubchem: Option<PubChemClient>) -> Self {
        self.pubchem = pubchem;
        self
    }

    pub fn with_filter(mut self, filter: Vec<String>) -> Self {
        self.filter = filter;
        self
    }

    /// Sort applied to every search; `None` keeps ChEMBL order.
    pub fn with_sort(mut self, sort: Option<(Column, bool)>) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_separator(mut self, separator: CsvSeparator) -> Self {
        self.separator = separator;
        self
    }

    pub fn pipeline(&self) -> &BioactivityPipeline<G> {
        &self.pipeline
    }

    pub fn last_report(&self) -> Option<&Report> {
        self.last.as_ref()
    }

    /// Last report with the current filter and sort applied.
    pub fn current_table(&self) -> Option<DisplayTable> {
        let report = self.last.as_ref()?;
        let filtered = filter_activities(&report.table, &self.filter);
        Some(match self.sort {
            Some((column, ascending)) => sort_table(&filtered, column, ascending),
            None => filtered,
        })
    }

    /// Handles one input line. Command mistakes are reported to `out` and the
    /// session carries on; only write failures are returned as errors.
    pub async fn handle(&mut self, line: &str, out: &mut dyn Write) -> anyhow::Result<Outcome> {
        let command = match parse_command(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(Outcome::Continue),
            Err(e) => {
                writeln!(out, "❌ {}", e)?;
                return Ok(Outcome::Continue);
            }
        };
        debug!(?command, "Handling command");

        match command {
            Command::Quit => return Ok(Outcome::Quit),
            Command::Help => write!(out, "{}", HELP)?,
            Command::Search(query) => self.search(&query, out).await?,
            Command::Filter(filter) => {
                self.filter = filter;
                let shown = if self.filter.is_empty() {
                    "all".to_string()
                } else {
                    self.filter.join(", ")
                };
                writeln!(out, "Activity filter: {}", shown)?;
                self.rerender(out)?;
            }
            Command::Sort(sort) => {
                self.sort = sort;
                match sort {
                    Some((column, ascending)) => writeln!(
                        out,
                        "Sorting by {} ({})",
                        column.header(),
                        if ascending { "asc" } else { "desc" }
                    )?,
                    None => writeln!(out, "Sorting off, ChEMBL order")?,
                }
                self.rerender(out)?;
            }
            Command::Separator(separator) => {
                self.separator = separator;
                writeln!(out, "CSV separator: {}", separator.label())?;
                self.rerender(out)?;
            }
            Command::Export { format, dir } => self.export(format, dir, out)?,
        }
        Ok(Outcome::Continue)
    }

    #[instrument(skip(self, out))]
    async fn search(&mut self, raw: &str, out: &mut dyn Write) -> anyhow::Result<()> {
        let query = match normalise_query(raw) {
            Ok(q) => q,
            Err(e) => {
                writeln!(out, "❌ {}", e)?;
                return Ok(());
            }
        };

        writeln!(out, "## Results for **{}**", query)?;
        writeln!(out, "Data sources: **ChEMBL** (bioactivity), **PubChem** (properties).")?;

        let mut progress_failed = None;
        let result = self
            .pipeline
            .run(&query, |p| {
                if let Err(e) = writeln!(out, "{}", progress_line(p)) {
                    progress_failed.get_or_insert(e);
                }
            })
            .await;
        if let Some(e) = progress_failed {
            return Err(e.into());
        }

        match result {
            Ok(report) => {
                self.last = Some(report);
                self.render_report(out)?;
            }
            Err(e) => {
                self.last = None;
                writeln!(out, "**ChEMBL error:** {}", e)?;
            }
        }

        self.pubchem_section(&query, out).await
    }

    fn rerender(&self, out: &mut dyn Write) -> anyhow::Result<()> {
        if self.last.is_some() {
            self.render_report(out)?;
        }
        Ok(())
    }

    fn render_report(&self, out: &mut dyn Write) -> anyhow::Result<()> {
        let Some(table) = self.current_table() else {
            return Ok(());
        };
        let organism = self.pipeline.organism();

        if table.is_empty() {
            writeln!(out, "> No {} bioactivity rows returned by ChEMBL.", organism)?;
            return Ok(());
        }

        writeln!(out, "### Pharmacodynamic Bioactivities ({})", organism)?;
        let text = TextTable::from(&table);
        self.presenter.present_to(&text, out)?;
        for format in [ExportFormat::Csv, ExportFormat::Xlsx] {
            writeln!(out, "{}", export::download_link(&text, format, self.separator, REPORT_STEM)?)?;
        }
        Ok(())
    }

    /// PubChem failures never touch the ChEMBL report above.
    async fn pubchem_section(&self, query: &str, out: &mut dyn Write) -> anyhow::Result<()> {
        let Some(pubchem) = &self.pubchem else {
            return Ok(());
        };

        let cid = match pubchem.cid_for_name(query).await {
            Ok(cid) => cid,
            Err(e) => {
                warn!(error = %e, "PubChem CID lookup failed");
                None
            }
        };
        let Some(cid) = cid else {
            writeln!(out, "> PubChem lookup failed; properties unavailable.")?;
            return Ok(());
        };

        writeln!(out, "### PubChem")?;
        writeln!(out, "CID: **{}**", cid)?;

        let properties = pubchem.basic_properties(cid).await.unwrap_or_else(|e| {
            warn!(cid, error = %e, "PubChem property lookup failed");
            Vec::new()
        });
        if properties.is_empty() {
            writeln!(out, "> No computed properties found.")?;
        } else {
            let text = TextTable::from_pairs("Property", "Value", &properties);
            self.presenter.present_to(&text, out)?;
            writeln!(
                out,
                "{}",
                export::download_link(&text, ExportFormat::Csv, self.separator, PUBCHEM_STEM)?
            )?;
        }

        let experimental = pubchem.experimental_properties(cid).await.unwrap_or_else(|e| {
            warn!(cid, error = %e, "PubChem view lookup failed");
            Vec::new()
        });
        writeln!(out, "#### Experimental / Computed Properties (PubChem)")?;
        if experimental.is_empty() {
            writeln!(out, "> No experimental/computed properties found.")?;
            return Ok(());
        }

        let text = TextTable::new(
            vec!["Property".to_string(), "Value".to_string(), "Source".to_string()],
            experimental
                .into_iter()
                .map(|p| vec![p.property, p.value, p.source])
                .collect(),
        );
        self.presenter.present_to(&text, out)?;
        for format in [ExportFormat::Csv, ExportFormat::Xlsx] {
            writeln!(
                out,
                "{}",
                export::download_link(&text, format, self.separator, EXPERIMENTAL_STEM)?
            )?;
        }
        Ok(())
    }

    fn export(&self, format: ExportFormat, dir: PathBuf, out: &mut dyn Write) -> anyhow::Result<()> {
        let Some(table) = self.current_table() else {
            writeln!(out, "Nothing to export yet, search for a compound first.")?;
            return Ok(());
        };

        let saved = export::export_table(&TextTable::from(&table), format, self.separator, REPORT_STEM)
            .and_then(|artifact| artifact.save(&dir));
        match saved {
            Ok(path) => writeln!(out, "💾 Saved {} rows to {}", table.len(), path.display())?,
            Err(e @ ReportError::Io(_)) | Err(e @ ReportError::Export(_)) => {
                writeln!(out, "❌ {}", e)?
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}
