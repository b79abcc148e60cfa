//! bioactivity-common: Shared errors and the allow-listed HTTP client used by every crate.

pub mod error;
pub mod sandbox;

pub use error::{ReportError, Result};
pub use sandbox::{HttpSettings, SandboxClient};
