//! A string grid with headers, the common input of every renderer and exporter.

use bioactivity_ingestion::{Column, DisplayTable};

#[derive(Debug, Clone, PartialEq)]
pub struct TextTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Columns written as numbers in spreadsheet exports.
    pub numeric: Vec<bool>,
}

impl TextTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let numeric = vec![false; headers.len()];
        Self { headers, rows, numeric }
    }

    /// Two-column `(Property, Value)` table.
    pub fn from_pairs(key_header: &str, value_header: &str, pairs: &[(String, String)]) -> Self {
        Self::new(
            vec![key_header.to_string(), value_header.to_string()],
            pairs.iter().map(|(k, v)| vec![k.clone(), v.clone()]).collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Display width of each column: the widest of header and cells.
    pub fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }
        widths
    }
}

impl From<&DisplayTable> for TextTable {
    fn from(table: &DisplayTable) -> Self {
        Self {
            headers: DisplayTable::headers().iter().map(|h| h.to_string()).collect(),
            rows: table.rows().iter().map(|r| r.cells().to_vec()).collect(),
            numeric: Column::ALL.iter().map(|c| *c == Column::KdNm).collect(),
        }
    }
}
