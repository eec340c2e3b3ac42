//! Error types for mirror operations.

use std::time::Duration;

use thiserror::Error;

use crate::event::SagaStep;

/// Errors that can occur while creating, listing or administering mirrors.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Repository already exists: {owner}/{name}")]
    AlreadyExists { owner: String, name: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("GitHub API error: {}", describe_api_error(.0))]
    UpstreamApi(#[from] octocrab::Error),

    #[error("git {command} failed: {stderr}")]
    VersionControl { command: String, stderr: String },

    #[error("git {command} timed out after {after:?}")]
    Timeout { command: String, after: Duration },

    #[error("Step `{step}` failed: {source}")]
    Step {
        step: SagaStep,
        #[source]
        source: Box<MirrorError>,
    },

    #[error("Compensation failed after `{original}`: {}", .failures.join("; "))]
    Compensation {
        original: Box<MirrorError>,
        failures: Vec<String>,
    },

    #[error("Unknown organization identifier: {0}")]
    UnknownOrganization(String),

    #[error("Identity provider error: {context}: {}", describe_api_error(.source))]
    Identity {
        context: String,
        #[source]
        source: octocrab::Error,
    },

    #[error("Invalid app private key: {0}")]
    AppKey(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error during {operation}: {source}")]
    Internal {
        operation: &'static str,
        #[source]
        source: Box<MirrorError>,
    },
}

impl MirrorError {
    /// Wraps an error into the generic internal-error condition.
    pub fn internal(operation: &'static str, source: MirrorError) -> Self {
        MirrorError::Internal {
            operation,
            source: Box::new(source),
        }
    }

    /// Attaches the saga step an error occurred in.
    pub fn at(self, step: SagaStep) -> Self {
        MirrorError::Step {
            step,
            source: Box::new(self),
        }
    }

    /// Check if the error is a 404 from the remote API.
    pub fn is_not_found(&self) -> bool {
        match self {
            MirrorError::NotFound(_) => true,
            MirrorError::UpstreamApi(e) | MirrorError::Identity { source: e, .. } => {
                is_not_found_error(e)
            }
            MirrorError::Step { source, .. } | MirrorError::Internal { source, .. } => {
                source.is_not_found()
            }
            _ => false,
        }
    }

    /// Check if the error is (or wraps) an `AlreadyExists` condition.
    pub fn is_already_exists(&self) -> bool {
        match self {
            MirrorError::AlreadyExists { .. } => true,
            MirrorError::Step { source, .. } => source.is_already_exists(),
            _ => false,
        }
    }

    /// Returns the innermost error, skipping step and internal wrappers.
    pub fn root(&self) -> &MirrorError {
        match self {
            MirrorError::Step { source, .. } | MirrorError::Internal { source, .. } => {
                source.root()
            }
            other => other,
        }
    }
}

/// Renders the API's own message and status for GitHub errors; octocrab's
/// `Display` only names the variant.
fn describe_api_error(e: &octocrab::Error) -> String {
    match e {
        octocrab::Error::GitHub { source, .. } => {
            format!("{} ({})", source.message, source.status_code)
        }
        other => other.to_string(),
    }
}

/// Check if an octocrab error carries a 404 status.
pub fn is_not_found_error(e: &octocrab::Error) -> bool {
    match e {
        octocrab::Error::GitHub { source, .. } => source.status_code.as_u16() == 404,
        _ => false,
    }
}
