//! Table rendering.
//!
//! Two renderers share one markdown source:
//!   - rich: the markdown table laid out by `termimad` with box-drawing borders,
//!     used when stdout is an interactive terminal
//!   - plain: the GitHub-flavoured markdown text itself, used everywhere else
//!     (pipes, files, CI logs, dumb terminals)
//!
//! The mode is picked once when the [`Presenter`] is built. A missing terminal
//! is not an error, it simply selects the plain renderer.

use std::io::{self, Write};
use std::str::FromStr;

use bioactivity_common::ReportError;
use bioactivity_ingestion::DisplayTable;
use crossterm::tty::IsTty;
use termimad::MadSkin;
use tracing::debug;

use crate::text_table::TextTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Rich,
    Plain,
}

/// Configured preference; `Auto` defers to capability detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderPreference {
    #[default]
    Auto,
    Rich,
    Plain,
}

impl FromStr for RenderPreference {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(RenderPreference::Auto),
            "rich" => Ok(RenderPreference::Rich),
            "plain" => Ok(RenderPreference::Plain),
            other => Err(ReportError::Config(format!(
                "Unknown render mode '{}' (expected auto, rich or plain)",
                other
            ))),
        }
    }
}

impl RenderPreference {
    pub fn resolve(self) -> RenderMode {
        match self {
            RenderPreference::Auto => detect_render_mode(),
            RenderPreference::Rich => RenderMode::Rich,
            RenderPreference::Plain => RenderMode::Plain,
        }
    }
}

/// Rich display needs stdout attached to a terminal that is not `TERM=dumb`.
pub fn detect_render_mode() -> RenderMode {
    let term = std::env::var("TERM").ok();
    let mode = select_mode(io::stdout().is_tty(), term.as_deref());
    debug!(?mode, "Render mode detected");
    mode
}

fn select_mode(stdout_is_tty: bool, term: Option<&str>) -> RenderMode {
    match (stdout_is_tty, term) {
        (false, _) => RenderMode::Plain,
        (true, Some("dumb")) => RenderMode::Plain,
        (true, _) => RenderMode::Rich,
    }
}

/// Renders a header row plus body rows, without a row-index column.
pub trait TableRenderer {
    fn render(&self, table: &TextTable, out: &mut dyn Write) -> io::Result<()>;
}

/// GitHub-flavoured markdown text table.
pub struct MarkdownRenderer;

impl TableRenderer for MarkdownRenderer {
    fn render(&self, table: &TextTable, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(to_markdown(table).as_bytes())
    }
}

/// Markdown laid out for the terminal by termimad.
pub struct TerminalRenderer {
    skin: MadSkin,
    width: Option<usize>,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        let width = crossterm::terminal::size().ok().map(|(w, _)| w as usize);
        Self {
            skin: MadSkin::default(),
            width,
        }
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self { Self::new() }
}

impl TableRenderer for TerminalRenderer {
    fn render(&self, table: &TextTable, out: &mut dyn Write) -> io::Result<()> {
        let markdown = to_markdown(table);
        let text = self.skin.text(&markdown, self.width);
        write!(out, "{}", text)
    }
}

pub struct Presenter {
    mode: RenderMode,
    renderer: Box<dyn TableRenderer>,
}

impl Presenter {
    pub fn new(mode: RenderMode) -> Self {
        let renderer: Box<dyn TableRenderer> = match mode {
            RenderMode::Rich => Box::new(TerminalRenderer::new()),
            RenderMode::Plain => Box::new(MarkdownRenderer),
        };
        Self { mode, renderer }
    }

    pub fn from_preference(preference: RenderPreference) -> Self {
        Self::new(preference.resolve())
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Renders the report table to stdout.
    pub fn present(&self, table: &DisplayTable) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.present_to(&TextTable::from(table), &mut out)?;
        out.flush()
    }

    pub fn present_to(&self, table: &TextTable, out: &mut dyn Write) -> io::Result<()> {
        self.renderer.render(table, out)
    }
}

/// Markdown source shared by both renderers.
pub fn to_markdown(table: &TextTable) -> String {
    let widths = table.column_widths();
    let mut md = String::new();

    push_row(&mut md, &table.headers, &widths);

    md.push('|');
    for w in &widths {
        md.push(':');
        md.push_str(&"-".repeat((*w).max(1) + 1));
        md.push('|');
    }
    md.push('\n');

    for row in &table.rows {
        push_row(&mut md, row, &widths);
    }
    md
}

fn push_row(md: &mut String, cells: &[String], widths: &[usize]) {
    md.push('|');
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).map(|c| escape_cell(c)).unwrap_or_default();
        let pad = w.saturating_sub(cell.chars().count());
        md.push(' ');
        md.push_str(&cell);
        md.push_str(&" ".repeat(pad));
        md.push_str(" |");
    }
    md.push('\n');
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace('\n', " ")
}
