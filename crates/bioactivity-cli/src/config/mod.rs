//! Configuration loading for the bioactivity report.
//! Reads bioactivity.toml from the current directory or the path in BIOACTIVITY_CONFIG.
//! Every field has a default, so running without a config file is normal.

use bioactivity_common::HttpSettings;
use bioactivity_ingestion::pipeline::DEFAULT_ORGANISM;
use bioactivity_ingestion::Column;
use bioactivity_ingestion::sources::chembl::{CHEMBL_API_URL, DEFAULT_PAGE_SIZE};
use bioactivity_ingestion::sources::pubchem::PUBCHEM_API_URL;
use bioactivity_report::{CsvSeparator, RenderPreference};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::interactive::parse_sort;

pub const CONFIG_ENV: &str = "BIOACTIVITY_CONFIG";
pub const CONFIG_FILE: &str = "bioactivity.toml";

/// Upper bound for `http.max_retries`.
pub const MAX_RETRIES: u32 = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chembl: ChemblConfig,
    #[serde(default)]
    pub pubchem: PubChemConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChemblConfig {
    #[serde(default = "default_chembl_url")]
    pub base_url: String,
    #[serde(default = "default_organism")]
    pub organism: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_chembl_url() -> String { CHEMBL_API_URL.to_string() }
fn default_organism()   -> String { DEFAULT_ORGANISM.to_string() }
fn default_page_size()  -> usize  { DEFAULT_PAGE_SIZE }

impl Default for ChemblConfig {
    fn default() -> Self {
        Self {
            base_url: default_chembl_url(),
            organism: default_organism(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubChemConfig {
    #[serde(default = "default_pubchem_url")]
    pub base_url: String,
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

fn default_pubchem_url() -> String { PUBCHEM_API_URL.to_string() }
fn bool_true()           -> bool   { true }

impl Default for PubChemConfig {
    fn default() -> Self {
        Self {
            base_url: default_pubchem_url(),
            enabled: bool_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff")]
    pub backoff_base: f64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub extra_allowed_hosts: Vec<String>,
}

fn default_timeout()    -> u64    { 30 }
fn default_retries()    -> u32    { 3 }
fn default_backoff()    -> f64    { 1.6 }
fn default_user_agent() -> String { format!("bioactivity-report/{}", env!("CARGO_PKG_VERSION")) }

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            backoff_base: default_backoff(),
            user_agent: default_user_agent(),
            extra_allowed_hosts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_compound")]
    pub default_compound: String,
    #[serde(default = "default_separator")]
    pub csv_separator: String,
    #[serde(default = "default_activity_filter")]
    pub activity_filter: Vec<String>,
    #[serde(default = "default_render")]
    pub render: String,
    /// Shell sort order, `<column> [asc|desc]` or `off`.
    #[serde(default = "default_sort")]
    pub sort: String,
}

fn default_compound()  -> String { "scopolamine".to_string() }
fn default_separator() -> String { ",".to_string() }
fn default_render()    -> String { "auto".to_string() }
fn default_sort()      -> String { "Target asc".to_string() }

fn default_activity_filter() -> Vec<String> {
    vec!["IC50".to_string(), "Ki".to_string()]
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            default_compound: default_compound(),
            csv_separator: default_separator(),
            activity_filter: default_activity_filter(),
            render: default_render(),
            sort: default_sort(),
        }
    }
}


impl Config {
    /// Load configuration from bioactivity.toml.
    /// Checks BIOACTIVITY_CONFIG first, then the current directory; falls back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let explicit = std::env::var(CONFIG_ENV).ok();
        let path = explicit.clone().unwrap_or_else(|| CONFIG_FILE.to_string());

        if !Path::new(&path).exists() {
            if explicit.is_some() {
                anyhow::bail!("Config file not found: {} (set by {})", path, CONFIG_ENV);
            }
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would only fail later, mid-report.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chembl.organism.trim().is_empty() {
            anyhow::bail!("chembl.organism must not be empty");
        }
        if self.report.default_compound.trim().is_empty() {
            anyhow::bail!("report.default_compound must not be empty");
        }
        if !self.http.backoff_base.is_finite() || self.http.backoff_base < 1.0 {
            anyhow::bail!("http.backoff_base must be a finite number of at least 1.0");
        }
        if self.http.max_retries > MAX_RETRIES {
            anyhow::bail!("http.max_retries must be at most {}", MAX_RETRIES);
        }
        self.render_preference()?;
        self.csv_separator()?;
        self.sort_order()?;
        Ok(())
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout_secs: self.http.timeout_secs,
            max_retries: self.http.max_retries,
            backoff_base: self.http.backoff_base,
            user_agent: self.http.user_agent.clone(),
            extra_allowed_hosts: self.http.extra_allowed_hosts.clone(),
        }
    }

    pub fn render_preference(&self) -> anyhow::Result<RenderPreference> {
        Ok(self.report.render.parse()?)
    }

    pub fn csv_separator(&self) -> anyhow::Result<CsvSeparator> {
        Ok(self.report.csv_separator.parse()?)
    }

    /// `None` keeps ChEMBL order.
    pub fn sort_order(&self) -> anyhow::Result<Option<(Column, bool)>> {
        parse_sort(&self.report.sort)
    }
}
