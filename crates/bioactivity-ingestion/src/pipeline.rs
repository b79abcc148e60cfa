//! Bioactivity report pipeline.
//!
//! Stages run strictly one after another, each awaiting its remote calls
//! before the next stage starts:
//!
//! 1. Resolve the compound name to a ChEMBL ID (one call)
//! 2. Fetch the compound's human activities (one call, plus paging)
//! 3. Resolve target names (one call per distinct target)
//! 4. Assemble the display table and derive Kd from KA

use std::collections::{BTreeMap, BTreeSet};

use bioactivity_common::{ReportError, Result};
use tracing::{debug, info, instrument, warn};

use crate::models::{ActivityRecord, CompoundIdentifier, DerivedRow, DisplayTable};
use crate::normalise::normalise_query;
use crate::sources::BioactivityGateway;
use crate::units::derive_kd_nm;

/// Organism the activity fetch is restricted to.
pub const DEFAULT_ORGANISM: &str = "Homo sapiens";

/// Stage notifications, used by front ends to print progress lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress<'a> {
    LookingUp { query: &'a str },
    Found { id: &'a CompoundIdentifier },
    Fetching { id: &'a CompoundIdentifier, organism: &'a str },
    Retrieved { count: usize },
}

/// Output of a full run.
#[derive(Debug, Clone)]
pub struct Report {
    pub query: String,
    pub compound: CompoundIdentifier,
    /// Activity records returned by the gateway, before empty values are dropped.
    pub record_count: usize,
    pub table: DisplayTable,
}

pub struct BioactivityPipeline<G> {
    gateway: G,
    organism: String,
}

impl<G: BioactivityGateway> BioactivityPipeline<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            organism: DEFAULT_ORGANISM.to_string(),
        }
    }

    pub fn with_organism(mut self, organism: impl Into<String>) -> Self {
        self.organism = organism.into();
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn organism(&self) -> &str {
        &self.organism
    }

    /// Maps a compound name to its ChEMBL ID. The gateway's first hit wins.
    #[instrument(skip(self))]
    pub async fn resolve_identifier(&self, name: &str) -> Result<CompoundIdentifier> {
        let hits = self.gateway.find_molecules(name).await?;
        if hits.len() > 1 {
            debug!(count = hits.len(), "Several molecules share this name, taking the first");
        }
        hits.into_iter()
            .next()
            .map(|hit| CompoundIdentifier::new(hit.molecule_chembl_id))
            .ok_or_else(|| ReportError::CompoundNotFound(name.to_string()))
    }

    /// All activities for the compound against targets of the configured organism.
    #[instrument(skip(self, id), fields(id = %id))]
    pub async fn fetch_activities(&self, id: &CompoundIdentifier) -> Result<Vec<ActivityRecord>> {
        let records = self.gateway.fetch_activities(id, &self.organism).await?;
        debug!(count = records.len(), "Fetched activities");
        Ok(records)
    }

    /// One lookup per identifier in `ids`. Misses and lookup failures fall back
    /// to the identifier itself, so every input id is present in the result.
    #[instrument(skip(self, ids), fields(distinct = ids.len()))]
    pub async fn resolve_target_names(&self, ids: &BTreeSet<String>) -> BTreeMap<String, String> {
        let mut names = BTreeMap::new();
        for id in ids {
            let name = match self.gateway.fetch_target_name(id).await {
                Ok(Some(name)) => name,
                Ok(None) => {
                    debug!(target = %id, "No target record, keeping identifier");
                    id.clone()
                }
                Err(e) => {
                    warn!(target = %id, error = %e, "Target lookup failed, keeping identifier");
                    id.clone()
                }
            };
            names.insert(id.clone(), name);
        }
        names
    }

    /// Assembles the report table. Row order follows `records`; rows with an
    /// empty value are dropped.
    pub async fn build_table(&self, records: &[ActivityRecord]) -> DisplayTable {
        if records.is_empty() {
            return DisplayTable::default();
        }

        let mut rows: Vec<DerivedRow> = records.iter().map(derive_row).collect();

        let distinct: BTreeSet<String> = rows.iter().map(|r| r.target.clone()).collect();
        let names = self.resolve_target_names(&distinct).await;
        for row in &mut rows {
            if let Some(name) = names.get(&row.target) {
                row.target = name.clone();
            }
        }

        rows.retain(|r| !r.value.is_empty());
        DisplayTable::new(rows)
    }

    /// Runs every stage for one compound name.
    ///
    /// The query is normalised first (see [`normalise_query`]); the
    /// normalised form is what gets looked up, reported in [`Report::query`]
    /// and carried by `CompoundNotFound`.
    pub async fn run<F>(&self, query: &str, mut progress: F) -> Result<Report>
    where
        F: FnMut(Progress<'_>),
    {
        let query = normalise_query(query)?;

        progress(Progress::LookingUp { query: &query });
        let compound = self.resolve_identifier(&query).await?;
        progress(Progress::Found { id: &compound });

        progress(Progress::Fetching { id: &compound, organism: &self.organism });
        let records = self.fetch_activities(&compound).await?;
        progress(Progress::Retrieved { count: records.len() });

        let table = self.build_table(&records).await;
        info!(compound = %compound, records = records.len(), rows = table.len(), "Report built");

        Ok(Report {
            query,
            compound,
            record_count: records.len(),
            table,
        })
    }
}

/// Row for one record, still keyed by target identifier.
fn derive_row(record: &ActivityRecord) -> DerivedRow {
    let activity = record.activity_type_or_empty();
    let value = record.value_or_empty();
    let units = record.unit_or_empty();
    DerivedRow {
        target: record.target_or_unknown().to_string(),
        activity: activity.to_string(),
        value: value.to_string(),
        units: units.to_string(),
        kd_nm: derive_kd_nm(activity, value, units),
    }
}
