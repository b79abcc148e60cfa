//! Front ends for the bioactivity report: configuration, the one-shot
//! `bioactivity` binary and the `bioactivity-shell` session.

pub mod app;
pub mod config;
pub mod interactive;

pub use config::Config;
pub use interactive::{Outcome, Session};
