//! Remote bioactivity sources.

pub mod chembl;
pub mod pubchem;

use async_trait::async_trait;
use bioactivity_common::Result;

use crate::models::{ActivityRecord, CompoundIdentifier, MoleculeHit};

/// Fields requested from the activity endpoint; nothing else is fetched.
pub const ACTIVITY_FIELDS: [&str; 4] = [
    "target_chembl_id",
    "standard_type",
    "standard_value",
    "standard_units",
];

/// The three queries the report needs from a bioactivity database.
///
/// Implementations are injected into the pipeline so tests can swap in an
/// in-memory double; nothing in the crate holds a process-wide client.
#[async_trait]
pub trait BioactivityGateway: Send + Sync {
    /// Molecules whose preferred name equals `pref_name`, ignoring case.
    /// Results come back in the gateway's own order.
    async fn find_molecules(&self, pref_name: &str) -> Result<Vec<MoleculeHit>>;

    /// Every activity for `molecule` whose target organism equals `organism`,
    /// ignoring case. Paging, if any, must be drained before returning.
    async fn fetch_activities(
        &self,
        molecule: &CompoundIdentifier,
        organism: &str,
    ) -> Result<Vec<ActivityRecord>>;

    /// Preferred name of the target with exactly this identifier, if any.
    async fn fetch_target_name(&self, target_id: &str) -> Result<Option<String>>;
}
