//! bioactivity-report: Everything that happens after the table is built:
//! rendering to the terminal, interactive filtering/sorting, and export.

pub mod export;
pub mod presenter;
pub mod shaping;
pub mod text_table;

pub use export::{CsvSeparator, ExportArtifact, ExportFormat};
pub use presenter::{Presenter, RenderMode, RenderPreference};
pub use text_table::TextTable;
