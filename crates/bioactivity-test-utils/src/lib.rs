//! Shared testing utilities: an in-memory bioactivity gateway that records
//! every call it receives, record fixtures, and a loopback HTTP server for
//! exercising the real clients.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use bioactivity_common::{ReportError, Result};
use bioactivity_ingestion::{ActivityRecord, BioactivityGateway, CompoundIdentifier, MoleculeHit};

pub mod fixture_server;

pub use fixture_server::{query_params, FixtureRoutes, FixtureServer};

/// Shorthand for an activity record; empty strings become absent fields.
pub fn record(target: &str, activity_type: &str, value: &str, unit: &str) -> ActivityRecord {
    ActivityRecord::new(target, activity_type, value, unit)
}

#[derive(Debug, Clone)]
struct FakeActivity {
    molecule_id: String,
    organism: String,
    record: ActivityRecord,
}

/// Every call the gateway has served, in order.
#[derive(Debug, Default, Clone)]
pub struct CallLog {
    pub molecule_searches: Vec<String>,
    pub activity_fetches: Vec<(String, String)>,
    pub target_lookups: Vec<String>,
}

/// In-memory stand-in for the ChEMBL gateway.
///
/// Name matching is case-insensitive and exact, organism matching is
/// case-insensitive, mirroring the `__iexact` filters of the real service.
#[derive(Debug, Default)]
pub struct FakeGateway {
    molecules: Vec<(String, String)>,
    activities: Vec<FakeActivity>,
    targets: HashMap<String, String>,
    failing_targets: HashSet<String>,
    calls: Mutex<CallLog>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_molecule(mut self, pref_name: &str, chembl_id: &str) -> Self {
        self.molecules.push((pref_name.to_string(), chembl_id.to_string()));
        self
    }

    pub fn with_activity(mut self, molecule_id: &str, organism: &str, record: ActivityRecord) -> Self {
        self.activities.push(FakeActivity {
            molecule_id: molecule_id.to_string(),
            organism: organism.to_string(),
            record,
        });
        self
    }

    /// Adds several human activities for one molecule.
    pub fn with_human_activities(mut self, molecule_id: &str, records: Vec<ActivityRecord>) -> Self {
        for r in records {
            self = self.with_activity(molecule_id, "Homo sapiens", r);
        }
        self
    }

    pub fn with_target(mut self, target_id: &str, pref_name: &str) -> Self {
        self.targets.insert(target_id.to_string(), pref_name.to_string());
        self
    }

    /// Target lookups for this id fail with a gateway error.
    pub fn with_failing_target(mut self, target_id: &str) -> Self {
        self.failing_targets.insert(target_id.to_string());
        self
    }

    pub fn calls(&self) -> CallLog {
        self.calls.lock().unwrap().clone()
    }

    pub fn target_lookup_count(&self) -> usize {
        self.calls.lock().unwrap().target_lookups.len()
    }
}

#[async_trait]
impl BioactivityGateway for FakeGateway {
    async fn find_molecules(&self, pref_name: &str) -> Result<Vec<MoleculeHit>> {
        self.calls.lock().unwrap().molecule_searches.push(pref_name.to_string());
        Ok(self
            .molecules
            .iter()
            .filter(|(name, _)| name.to_lowercase() == pref_name.to_lowercase())
            .map(|(name, id)| MoleculeHit {
                molecule_chembl_id: id.clone(),
                pref_name: Some(name.to_uppercase()),
            })
            .collect())
    }

    async fn fetch_activities(
        &self,
        molecule: &CompoundIdentifier,
        organism: &str,
    ) -> Result<Vec<ActivityRecord>> {
        self.calls
            .lock()
            .unwrap()
            .activity_fetches
            .push((molecule.to_string(), organism.to_string()));
        Ok(self
            .activities
            .iter()
            .filter(|a| a.molecule_id == molecule.as_str())
            .filter(|a| a.organism.to_lowercase() == organism.to_lowercase())
            .map(|a| a.record.clone())
            .collect())
    }

    async fn fetch_target_name(&self, target_id: &str) -> Result<Option<String>> {
        self.calls.lock().unwrap().target_lookups.push(target_id.to_string());
        if self.failing_targets.contains(target_id) {
            return Err(ReportError::Gateway(format!("HTTP 500 for target {}", target_id)));
        }
        Ok(self.targets.get(target_id).cloned())
    }
}

/// Gateway with aspirin wired up across two targets, one unnamed target,
/// a KA measurement and a mouse record that must never show up.
pub fn aspirin_gateway() -> FakeGateway {
    FakeGateway::new()
        .with_molecule("ASPIRIN", "CHEMBL25")
        .with_target("CHEMBL221", "Cyclooxygenase-1")
        .with_target("CHEMBL230", "Cyclooxygenase-2")
        .with_human_activities(
            "CHEMBL25",
            vec![
                record("CHEMBL221", "IC50", "1670", "nM"),
                record("CHEMBL230", "IC50", "", "nM"),
                record("CHEMBL230", "KA", "2000000", "M^-1"),
                record("CHEMBL9999", "Ki", "35", "nM"),
                record("CHEMBL221", "Inhibition", "48.5", "%"),
            ],
        )
        .with_activity("CHEMBL25", "Mus musculus", record("CHEMBL3371", "IC50", "900", "nM"))
}
