//! Activity filtering and column sorting for the interactive shell.
//!
//! The report itself is never re-ordered; these helpers build new tables on
//! explicit request.

use std::cmp::Ordering;

use bioactivity_ingestion::units::parse_numeric;
use bioactivity_ingestion::{Column, DisplayTable};

/// Activity types offered by the shell's filter.
pub const FILTERABLE_ACTIVITIES: [&str; 4] = ["IC50", "Ki", "KA", "Kd"];

/// Keeps rows whose activity type is one of `selected`. An empty selection keeps everything.
pub fn filter_activities(table: &DisplayTable, selected: &[String]) -> DisplayTable {
    if selected.is_empty() {
        return table.clone();
    }
    DisplayTable::new(
        table
            .rows()
            .iter()
            .filter(|row| selected.iter().any(|s| *s == row.activity))
            .cloned()
            .collect(),
    )
}

/// Sorts by one column.
///
/// When at least half the cells (and at least one) parse as numbers the
/// column is ordered numerically, with non-numeric cells last in either
/// direction. Otherwise cells are compared case-insensitively as text.
/// Ties keep their current relative order.
pub fn sort_table(table: &DisplayTable, column: Column, ascending: bool) -> DisplayTable {
    let mut keyed: Vec<(String, Option<f64>, usize)> = table
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let cell = row.cell(column);
            let number = parse_numeric(&cell);
            (cell, number, i)
        })
        .collect();

    let numeric_cells = keyed.iter().filter(|(_, n, _)| n.is_some()).count();
    let threshold = (keyed.len() / 2).max(1);

    if numeric_cells >= threshold {
        keyed.sort_by(|(_, a, _), (_, b, _)| compare_numeric(*a, *b, ascending));
    } else {
        keyed.sort_by(|(a, _, _), (b, _, _)| {
            let ord = a.to_lowercase().cmp(&b.to_lowercase());
            if ascending { ord } else { ord.reverse() }
        });
    }

    let rows = table.rows();
    DisplayTable::new(keyed.into_iter().map(|(_, _, i)| rows[i].clone()).collect())
}

fn compare_numeric(a: Option<f64>, b: Option<f64>, ascending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            if ascending { ord } else { ord.reverse() }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
