//! ChEMBL API client.
//!
//! ChEMBL is a database of bioactive molecules with drug-like properties.
//! The report uses three of its resources:
//!   - `molecule`: preferred-name search → ChEMBL compound ID
//!   - `activity`: bioactivities for a compound, filtered by target organism
//!   - `target`: preferred name of a target
//!
//! API docs: https://chembl.gitbook.io/chembl-interface-documentation/web-resources/chembl-api
//! Endpoint: https://www.ebi.ac.uk/chembl/api/data
//!
//! List endpoints are paged; `page_meta.next` holds a server-relative path to
//! the following page, or null on the last one.

use async_trait::async_trait;
use bioactivity_common::sandbox::SandboxClient as Client;
use bioactivity_common::{ReportError, Result};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{BioactivityGateway, ACTIVITY_FIELDS};
use crate::models::{ActivityRecord, CompoundIdentifier, MoleculeHit};

pub const CHEMBL_API_URL: &str = "https://www.ebi.ac.uk/chembl/api/data";

/// Page size for activity requests; ChEMBL caps `limit` at 1000.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

const MOLECULE_SEARCH_LIMIT: &str = "20";

#[derive(Debug, Deserialize)]
struct PageMeta {
    next: Option<String>,
    total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct MoleculePage {
    #[serde(default)]
    molecules: Vec<MoleculeHit>,
}

#[derive(Debug, Deserialize)]
struct ActivityPage {
    #[serde(default)]
    activities: Vec<ActivityRecord>,
    page_meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
struct TargetPage {
    #[serde(default)]
    targets: Vec<TargetHit>,
}

#[derive(Debug, Deserialize)]
struct TargetHit {
    pref_name: Option<String>,
}

/// ChEMBL client for compound, activity and target data.
pub struct ChemblClient {
    client: Client,
    base_url: String,
    page_size: usize,
}

impl ChemblClient {
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(Client::new()?, CHEMBL_API_URL, DEFAULT_PAGE_SIZE))
    }

    /// Client against a specific deployment (mirror, local fixture server).
    pub fn with_client(client: Client, base_url: &str, page_size: usize) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_size: page_size.clamp(1, DEFAULT_PAGE_SIZE),
        }
    }

    fn endpoint(&self, resource: &str) -> String {
        format!("{}/{}.json", self.base_url, resource)
    }

    /// Turns `page_meta.next` into an absolute URL on the same host.
    fn next_page_url(&self, next: &str) -> Result<String> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| ReportError::Config(format!("Invalid ChEMBL base URL {}: {}", self.base_url, e)))?;
        let joined = base
            .join(next)
            .map_err(|e| ReportError::Gateway(format!("Invalid next page link {}: {}", next, e)))?;
        Ok(joined.to_string())
    }
}

#[async_trait]
impl BioactivityGateway for ChemblClient {
    #[instrument(skip(self))]
    async fn find_molecules(&self, pref_name: &str) -> Result<Vec<MoleculeHit>> {
        let url = self.endpoint("molecule");

        debug!(pref_name = pref_name, "Searching ChEMBL molecules");

        let params = [
            ("pref_name__iexact", pref_name),
            ("only", "molecule_chembl_id,pref_name"),
            ("limit", MOLECULE_SEARCH_LIMIT),
        ];
        let page: Option<MoleculePage> = self.client.get_json(&url, &params).await?;

        Ok(page.map(|p| p.molecules).unwrap_or_default())
    }

    #[instrument(skip(self, molecule), fields(molecule = %molecule))]
    async fn fetch_activities(
        &self,
        molecule: &CompoundIdentifier,
        organism: &str,
    ) -> Result<Vec<ActivityRecord>> {
        let only = ACTIVITY_FIELDS.join(",");
        let limit = self.page_size.to_string();
        let first_params = [
            ("molecule_chembl_id", molecule.as_str()),
            ("target_organism__iexact", organism),
            ("only", only.as_str()),
            ("limit", limit.as_str()),
        ];

        let mut activities = Vec::new();
        let mut url = self.endpoint("activity");
        let mut params: &[(&str, &str)] = &first_params;
        let mut page_no = 0usize;

        loop {
            page_no += 1;
            let page: Option<ActivityPage> = self.client.get_json(&url, params).await?;
            let Some(page) = page else { break };

            let received = page.activities.len();
            activities.extend(page.activities);

            let meta = page.page_meta;
            debug!(
                page = page_no,
                received,
                total = meta.as_ref().and_then(|m| m.total_count),
                "Fetched ChEMBL activity page"
            );

            match meta.and_then(|m| m.next) {
                Some(next) if received > 0 => {
                    url = self.next_page_url(&next)?;
                    // The next link already carries every filter and the offset.
                    params = &[];
                }
                _ => break,
            }
        }

        Ok(activities)
    }

    #[instrument(skip(self))]
    async fn fetch_target_name(&self, target_id: &str) -> Result<Option<String>> {
        let url = self.endpoint("target");

        debug!(target = target_id, "Fetching ChEMBL target name");

        let params = [
            ("target_chembl_id", target_id),
            ("only", "pref_name"),
            ("limit", "1"),
        ];
        let page: Option<TargetPage> = self.client.get_json(&url, &params).await?;

        Ok(page
            .and_then(|p| p.targets.into_iter().next())
            .and_then(|t| t.pref_name)
            .filter(|name| !name.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ChemblClient {
        ChemblClient::new().unwrap()
    }

    #[test]
    fn test_endpoint_urls() {
        let c = client();
        assert_eq!(c.endpoint("activity"), "https://www.ebi.ac.uk/chembl/api/data/activity.json");

        let mirror = ChemblClient::with_client(Client::new().unwrap(), "http://localhost:8000/data/", 50);
        assert_eq!(mirror.endpoint("target"), "http://localhost:8000/data/target.json");
        assert_eq!(mirror.page_size, 50);
    }

    #[test]
    fn test_page_size_is_clamped() {
        let c = ChemblClient::with_client(Client::new().unwrap(), CHEMBL_API_URL, 5000);
        assert_eq!(c.page_size, DEFAULT_PAGE_SIZE);
        let c = ChemblClient::with_client(Client::new().unwrap(), CHEMBL_API_URL, 0);
        assert_eq!(c.page_size, 1);
    }

    #[test]
    fn test_next_page_url_is_resolved_against_host() {
        let c = client();
        let next = "/chembl/api/data/activity.json?limit=1000&molecule_chembl_id=CHEMBL25&offset=1000";
        assert_eq!(
            c.next_page_url(next).unwrap(),
            "https://www.ebi.ac.uk/chembl/api/data/activity.json?limit=1000&molecule_chembl_id=CHEMBL25&offset=1000"
        );
    }

    #[test]
    fn test_activity_page_parsing() {
        let json = r#"{
            "activities": [
                {"target_chembl_id": "CHEMBL204", "standard_type": "IC50",
                 "standard_value": "12.5", "standard_units": "nM"},
                {"target_chembl_id": "CHEMBL204", "standard_type": "KA",
                 "standard_value": "2000000.0", "standard_units": "M-1"}
            ],
            "page_meta": {"limit": 2, "next": "/chembl/api/data/activity.json?offset=2",
                          "offset": 0, "previous": null, "total_count": 3}
        }"#;
        let page: ActivityPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.activities.len(), 2);
        assert_eq!(page.activities[1].value_or_empty(), "2000000.0");
        let meta = page.page_meta.unwrap();
        assert_eq!(meta.total_count, Some(3));
        assert!(meta.next.is_some());
    }

    #[test]
    fn test_molecule_and_target_page_parsing() {
        let molecules: MoleculePage = serde_json::from_str(
            r#"{"molecules": [{"molecule_chembl_id": "CHEMBL25", "pref_name": "ASPIRIN"}],
                "page_meta": {"next": null, "total_count": 1}}"#,
        )
        .unwrap();
        assert_eq!(molecules.molecules[0].molecule_chembl_id, "CHEMBL25");

        let targets: TargetPage = serde_json::from_str(r#"{"targets": [{"pref_name": null}]}"#).unwrap();
        assert!(targets.targets[0].pref_name.is_none());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_aspirin_lookup() {
        let c = client();
        let hits = c.find_molecules("aspirin").await.unwrap();
        assert_eq!(hits.first().map(|h| h.molecule_chembl_id.as_str()), Some("CHEMBL25"));
    }
}
