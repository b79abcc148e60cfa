//! Data models for the bioactivity report.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Sentinel used when an activity carries no target identifier.
pub const UNKNOWN_TARGET: &str = "Unknown";

/// Opaque ChEMBL identifier of a compound, e.g. `CHEMBL25`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompoundIdentifier(String);

impl CompoundIdentifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompoundIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One molecule returned by a preferred-name search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoleculeHit {
    pub molecule_chembl_id: String,
    #[serde(default)]
    pub pref_name: Option<String>,
}

/// One reported bioactivity measurement, restricted to the four projected fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    #[serde(rename = "target_chembl_id", default)]
    pub target_id: Option<String>,
    #[serde(rename = "standard_type", default)]
    pub activity_type: Option<String>,
    /// Kept as text so the source formatting survives ("12.5", "2000000.0").
    #[serde(rename = "standard_value", default, deserialize_with = "de_opt_text")]
    pub value: Option<String>,
    #[serde(rename = "standard_units", default)]
    pub unit: Option<String>,
}

impl ActivityRecord {
    pub fn new(target_id: &str, activity_type: &str, value: &str, unit: &str) -> Self {
        fn opt(s: &str) -> Option<String> {
            (!s.is_empty()).then(|| s.to_string())
        }
        Self {
            target_id: opt(target_id),
            activity_type: opt(activity_type),
            value: opt(value),
            unit: opt(unit),
        }
    }

    /// Target identifier, or [`UNKNOWN_TARGET`] when absent or blank.
    pub fn target_or_unknown(&self) -> &str {
        non_empty(&self.target_id).unwrap_or(UNKNOWN_TARGET)
    }

    pub fn activity_type_or_empty(&self) -> &str {
        non_empty(&self.activity_type).unwrap_or("")
    }

    pub fn value_or_empty(&self) -> &str {
        non_empty(&self.value).unwrap_or("")
    }

    pub fn unit_or_empty(&self) -> &str {
        non_empty(&self.unit).unwrap_or("")
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// ChEMBL serialises `standard_value` as a string, but older dumps and mirrors
/// hand back bare numbers. Accept both and keep the text.
fn de_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Columns of the report, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Target,
    Activity,
    Value,
    Units,
    KdNm,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Target,
        Column::Activity,
        Column::Value,
        Column::Units,
        Column::KdNm,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            Column::Target   => "Target",
            Column::Activity => "Activity",
            Column::Value    => "Value",
            Column::Units    => "Units",
            Column::KdNm     => "Kd (nM) (from KA)",
        }
    }

    /// Case-insensitive lookup by header or short alias (`kd`).
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_lowercase();
        if wanted == "kd" || wanted == "kd (nm)" {
            return Some(Column::KdNm);
        }
        Column::ALL
            .into_iter()
            .find(|c| c.header().to_lowercase() == wanted)
    }
}

/// One row of the final report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRow {
    pub target: String,
    pub activity: String,
    pub value: String,
    pub units: String,
    pub kd_nm: Option<f64>,
}

impl DerivedRow {
    /// Text of a single cell; an absent Kd renders as an empty string.
    pub fn cell(&self, column: Column) -> String {
        match column {
            Column::Target   => self.target.clone(),
            Column::Activity => self.activity.clone(),
            Column::Value    => self.value.clone(),
            Column::Units    => self.units.clone(),
            Column::KdNm     => format_kd(self.kd_nm),
        }
    }

    pub fn cells(&self) -> [String; 5] {
        Column::ALL.map(|c| self.cell(c))
    }
}

/// Formats a derived Kd the way a dataframe prints a float: `500.0`, `0.33`.
pub fn format_kd(kd_nm: Option<f64>) -> String {
    match kd_nm {
        Some(v) if v.fract() == 0.0 && v.abs() < 1e16 => format!("{:.1}", v),
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

/// Ordered, contiguously indexed rows with the fixed five-column schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayTable {
    rows: Vec<DerivedRow>,
}

impl DisplayTable {
    pub fn new(rows: Vec<DerivedRow>) -> Self {
        Self { rows }
    }

    pub fn headers() -> [&'static str; 5] {
        Column::ALL.map(|c| c.header())
    }

    pub fn rows(&self) -> &[DerivedRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<DerivedRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DerivedRow> {
        self.rows.get(index)
    }
}
