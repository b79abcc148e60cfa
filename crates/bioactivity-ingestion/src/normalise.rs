//! Compound query clean-up.

use bioactivity_common::{ReportError, Result};
use unicode_normalization::UnicodeNormalization;

/// NFKC-normalises a compound name, trims it and collapses internal
/// whitespace runs, including no-break spaces pasted from web pages, to
/// single ASCII spaces.
///
/// An empty result is rejected before any remote call is made.
pub fn normalise_query(raw: &str) -> Result<String> {
    let folded: String = raw.nfkc().collect();
    let cleaned = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return Err(ReportError::EmptyQuery);
    }
    Ok(cleaned)
}
