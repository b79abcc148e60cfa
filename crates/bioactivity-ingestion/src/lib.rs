//! bioactivity-ingestion: Retrieval side of the bioactivity report.
//! - Remote gateway interface and its ChEMBL / PubChem HTTP clients
//! - Compound identifier resolution
//! - Human bioactivity fetch
//! - Target name resolution (one lookup per distinct target)
//! - Kd derivation from KA and table assembly

pub mod models;
pub mod normalise;
pub mod pipeline;
pub mod sources;
pub mod units;

pub use models::{ActivityRecord, Column, CompoundIdentifier, DerivedRow, DisplayTable, MoleculeHit};
pub use pipeline::{BioactivityPipeline, Progress, Report};
pub use sources::BioactivityGateway;
