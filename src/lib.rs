pub mod admin;
pub mod cli;
pub mod error;
pub mod event;
pub mod git;
pub mod github_provider;
pub mod identity;
pub mod lease;
pub mod provider;
pub mod query;
pub mod saga;
pub mod service;
pub mod telemetry;

pub use error::MirrorError;
pub use service::{CreateMirrorOutcome, MirrorService};
