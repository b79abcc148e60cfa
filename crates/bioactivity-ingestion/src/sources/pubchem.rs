//! PubChem PUG REST / PUG View client.
//!
//! Used by the interactive shell to show a compact identifier/descriptor
//! table and a table of experimental properties next to the ChEMBL report.
//! Nothing here can fail a report: callers treat every error as
//! "PubChem unavailable".
//!
//! Endpoints:
//!   - https://pubchem.ncbi.nlm.nih.gov/rest/pug       computed properties, CIDs
//!   - https://pubchem.ncbi.nlm.nih.gov/rest/pug_view  annotated record (sections tree)

use std::collections::HashSet;
use std::sync::LazyLock;

use bioactivity_common::sandbox::SandboxClient as Client;
use bioactivity_common::{ReportError, Result};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

pub const PUBCHEM_API_URL: &str = "https://pubchem.ncbi.nlm.nih.gov/rest/pug";

/// Computed properties shown in the basic table, in display order.
pub const BASIC_PROPERTIES: [&str; 13] = [
    "IUPACName",
    "MolecularFormula",
    "MolecularWeight",
    "CanonicalSMILES",
    "IsomericSMILES",
    "InChIKey",
    "XLogP",
    "ExactMass",
    "TPSA",
    "HBondDonorCount",
    "HBondAcceptorCount",
    "RotatableBondCount",
    "FormalCharge",
];

#[derive(Debug, Deserialize)]
struct CidResponse {
    #[serde(rename = "IdentifierList")]
    identifier_list: Option<IdentifierList>,
}

#[derive(Debug, Deserialize)]
struct IdentifierList {
    #[serde(rename = "CID", default)]
    cid: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct PropertyResponse {
    #[serde(rename = "PropertyTable")]
    property_table: PropertyTable,
}

#[derive(Debug, Deserialize)]
struct PropertyTable {
    #[serde(rename = "Properties", default)]
    properties: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// Properties kept for the experimental table, matched on name or section path.
static EXPERIMENTAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bmelting point\b|\bboiling point\b|\bsolubilit(?:y|ies)\b|\bpK(?:a|A)\b|\bpH\b|\blog\s*P\b|\bX?logP.*|\bdensity\b|\bvapou?r pressure\b|\bflash point\b|\bappearance\b|\bcolor/?form\b",
    )
    .expect("experimental property pattern is valid")
});

/// Section paths used when no heading matches [`EXPERIMENTAL_RE`].
static FALLBACK_SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bdescriptor\b|\bphysical\b|\bchemical\b|\bpartition\b|\bacid dissociation\b")
        .expect("fallback section pattern is valid")
});

/// One annotated value from a PUG View record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewProperty {
    pub property: String,
    pub value: String,
    /// Section headings leading to the value, joined with ` > `.
    pub source: String,
}

pub struct PubChemClient {
    client: Client,
    base_url: String,
    view_url: String,
}

impl PubChemClient {
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(Client::new()?, PUBCHEM_API_URL))
    }

    /// `base_url` points at PUG REST (`.../rest/pug`); PUG View lives next
    /// to it at `.../rest/pug_view`.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            client,
            view_url: format!("{}_view", base_url),
            base_url,
        }
    }

    /// Builds `{base}/seg/seg/...`, percent-encoding each segment.
    fn url(&self, segments: &[&str]) -> Result<String> {
        join_segments(&self.base_url, segments)
    }

    /// First PubChem CID for a compound name, trying JSON then the TXT listing.
    #[instrument(skip(self))]
    pub async fn cid_for_name(&self, name: &str) -> Result<Option<u64>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let json_url = self.url(&["compound", "name", name, "cids", "JSON"])?;
        match self.client.get_json::<CidResponse>(&json_url, &[]).await {
            Ok(Some(resp)) => {
                if let Some(cid) = resp.identifier_list.and_then(|l| l.cid.into_iter().next()) {
                    return Ok(Some(cid));
                }
            }
            Ok(None) => return Ok(None),
            Err(e) => debug!(error = %e, "PubChem JSON CID lookup failed, trying TXT"),
        }

        let txt_url = self.url(&["compound", "name", name, "cids", "TXT"])?;
        let body = self.client.get_text(&txt_url, &[]).await?;
        Ok(body.as_deref().and_then(first_integer))
    }

    /// Basic computed properties as `(Property, Value)` pairs.
    #[instrument(skip(self))]
    pub async fn basic_properties(&self, cid: u64) -> Result<Vec<(String, String)>> {
        let cid_text = cid.to_string();
        let props = BASIC_PROPERTIES.join(",");
        let url = self.url(&["compound", "cid", &cid_text, "property", &props, "JSON"])?;

        let resp: Option<PropertyResponse> = self.client.get_json(&url, &[]).await?;
        let Some(record) = resp.and_then(|r| r.property_table.properties.into_iter().next()) else {
            return Ok(Vec::new());
        };

        Ok(property_rows(&record))
    }

    /// Every annotated value of the compound's PUG View record, in record
    /// order, duplicates removed.
    #[instrument(skip(self))]
    pub async fn all_properties(&self, cid: u64) -> Result<Vec<ViewProperty>> {
        let cid_text = cid.to_string();
        let url = join_segments(&self.view_url, &["data", "compound", &cid_text, "JSON"])?;

        let record: Option<Value> = self.client.get_json(&url, &[]).await?;
        let properties = record.map(|r| view_properties(&r)).unwrap_or_default();
        debug!(count = properties.len(), "Collected PUG View properties");
        Ok(properties)
    }

    /// Experimental and physico-chemical properties (melting point,
    /// solubility, pKa, logP, ...). Falls back to descriptor sections, then
    /// to the whole record, when nothing matches.
    pub async fn experimental_properties(&self, cid: u64) -> Result<Vec<ViewProperty>> {
        Ok(select_experimental(self.all_properties(cid).await?))
    }
}

fn join_segments(base: &str, segments: &[&str]) -> Result<String> {
    let mut url = Url::parse(base)
        .map_err(|e| ReportError::Config(format!("Invalid PubChem base URL {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| ReportError::Config(format!("PubChem base URL cannot take a path: {}", base)))?
        .extend(segments);
    Ok(url.to_string())
}

/// Walks `Record.Section` depth-first.
pub fn view_properties(record: &Value) -> Vec<ViewProperty> {
    let mut out = Vec::new();
    if let Some(sections) = record.pointer("/Record/Section").and_then(Value::as_array) {
        walk_sections(sections, &[], &mut out);
    }

    let mut seen = HashSet::new();
    out.retain(|p| seen.insert(p.clone()));
    out
}

fn walk_sections<'a>(sections: &'a [Value], path: &[&'a str], out: &mut Vec<ViewProperty>) {
    for section in sections {
        let heading = str_field(section, "TOCHeading")
            .or_else(|| str_field(section, "Name"))
            .unwrap_or("");
        let mut here = path.to_vec();
        if !heading.is_empty() {
            here.push(heading);
        }
        let source = here.join(" > ");

        for info in section.get("Information").and_then(Value::as_array).into_iter().flatten() {
            let name = str_field(info, "Name")
                .or(Some(heading).filter(|h| !h.is_empty()))
                .unwrap_or("Property");
            if let Some(value) = information_value(info) {
                out.push(ViewProperty {
                    property: name.trim().to_string(),
                    value: value.trim().to_string(),
                    source: source.clone(),
                });
            }
        }

        if let Some(table) = section.get("Table").filter(|t| t.is_object()) {
            let text = flatten_table(table);
            if !text.is_empty() {
                let title = str_field(table, "Title")
                    .or(Some(heading).filter(|h| !h.is_empty()))
                    .unwrap_or("Table");
                out.push(ViewProperty {
                    property: title.trim().to_string(),
                    value: text.trim().to_string(),
                    source: source.clone(),
                });
            }
        }

        if let Some(children) = section.get("Section").and_then(Value::as_array) {
            walk_sections(children, &here, out);
        }
    }
}

/// Non-empty string field.
fn str_field<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn information_value(info: &Value) -> Option<String> {
    if let Some(value) = info.get("Value").filter(|v| v.as_object().is_some_and(|o| !o.is_empty())) {
        if ["StringWithMarkup", "String", "List"].iter().any(|k| value.get(*k).is_some()) {
            let text = flatten_markup(value);
            if !text.is_empty() {
                return Some(text);
            }
        }
        if let Some(number) = value.get("Number").filter(|n| !n.is_null()) {
            let unit = str_field(value, "Unit").or_else(|| str_field(value, "Units")).unwrap_or("");
            let text = format!("{} {}", number_text(number), unit);
            return Some(text.trim().to_string()).filter(|t| !t.is_empty());
        }
    }
    info.get("Table")
        .filter(|t| t.is_object())
        .map(flatten_table)
        .filter(|t| !t.is_empty())
}

/// `[1.2, 3]` → `1.2, 3`; scalars as written.
fn number_text(number: &Value) -> String {
    match number {
        Value::Array(items) => items.iter().map(number_text).collect::<Vec<_>>().join(", "),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Concatenates the text of `String` / `StringWithMarkup` / `List` nodes.
fn flatten_markup(node: &Value) -> String {
    let mut parts: Vec<String> = Vec::new();
    match node {
        Value::Object(obj) => {
            if let Some(s) = obj.get("String") {
                parts.push(scalar_text(s));
            }
            for key in ["StringWithMarkup", "List"] {
                if let Some(items) = obj.get(key).and_then(Value::as_array) {
                    parts.extend(items.iter().map(flatten_markup));
                }
            }
        }
        Value::Array(items) => parts.extend(items.iter().map(flatten_markup)),
        Value::Null => {}
        other => parts.push(scalar_text(other)),
    }
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `Title: h1: v1 | h2: v2; ...`, headers only when they line up with the cells.
fn flatten_table(table: &Value) -> String {
    let headers: Vec<&str> = table
        .get("Columns")
        .and_then(Value::as_array)
        .map(|cols| {
            cols.iter()
                .map(|c| c.get("Name").and_then(Value::as_str).unwrap_or("").trim())
                .collect()
        })
        .unwrap_or_default();

    let rows: Vec<String> = table
        .get("Row")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|row| {
            let cells: Vec<String> = row
                .get("Cell")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .map(flatten_markup)
                .collect();
            let text = if !headers.is_empty() && headers.len() == cells.len() {
                headers
                    .iter()
                    .zip(&cells)
                    .map(|(h, v)| format!("{}: {}", h, v))
                    .collect::<Vec<_>>()
                    .join(" | ")
            } else {
                cells.join(" | ")
            };
            text.trim().to_string()
        })
        .filter(|r| !r.is_empty())
        .collect();

    let title = str_field(table, "Title").unwrap_or("");
    let body = rows.join("; ");
    match (title.is_empty(), body.is_empty()) {
        (false, false) => format!("{}: {}", title, body).trim().to_string(),
        (_, false) => body,
        _ => title.to_string(),
    }
}

/// Priority subset of `all`; see [`PubChemClient::experimental_properties`].
pub fn select_experimental(all: Vec<ViewProperty>) -> Vec<ViewProperty> {
    let hits: Vec<ViewProperty> = all
        .iter()
        .filter(|p| EXPERIMENTAL_RE.is_match(&p.property) || EXPERIMENTAL_RE.is_match(&p.source))
        .cloned()
        .collect();
    if !hits.is_empty() {
        return hits;
    }

    let fallback: Vec<ViewProperty> = all
        .iter()
        .filter(|p| FALLBACK_SECTION_RE.is_match(&p.source))
        .cloned()
        .collect();
    if fallback.is_empty() { all } else { fallback }
}

/// Newer PubChem releases renamed the SMILES columns.
fn property_alias(name: &str) -> Option<&'static str> {
    match name {
        "CanonicalSMILES" => Some("ConnectivitySMILES"),
        "IsomericSMILES" => Some("SMILES"),
        _ => None,
    }
}

fn property_rows(record: &serde_json::Map<String, serde_json::Value>) -> Vec<(String, String)> {
    BASIC_PROPERTIES
        .iter()
        .filter_map(|name| {
            let value = record
                .get(*name)
                .or_else(|| property_alias(name).and_then(|alias| record.get(alias)))?;
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => return None,
                other => other.to_string(),
            };
            Some((name.to_string(), text))
        })
        .collect()
}

fn first_integer(body: &str) -> Option<u64> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .find_map(|line| {
            let digits: String = line
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().ok()
        })
}
