//! Error types shared by the genre pipeline.
//!
//! The pipeline distinguishes four families of failures:
//!
//! - [`PipelineError::Validation`] - bad or missing input, surfaced immediately
//! - [`PipelineError::Auth`] - the session cannot produce a usable access token
//!   ([`PipelineError::BulkAborted`] when it stopped a bulk run midway)
//! - [`PipelineError::Upstream`] - the Spotify API rejected a request or sent
//!   something unreadable
//! - [`PipelineError::RateLimited`] / [`PipelineError::Network`] - transient
//!   failures that survived every retry of the request executor
//!
//! Only transport failures are retried by the executor. Everything else is
//! handed straight back to the calling component.

use thiserror::Error;

use crate::types::BulkCreationReport;

/// Failures of the session token collaborator.
///
/// An `AuthError` is never retried. The caller is expected to send the user
/// back through the login flow.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no session token found, log in first")]
    MissingToken,

    #[error("access token expired and no refresh token is available")]
    MissingRefreshToken,

    #[error("failed to refresh access token: {0}")]
    RefreshFailed(String),

    #[error("access token was rejected by Spotify (status {0})")]
    Unauthorized(u16),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Bulk creation stopped on an auth failure. `partial` holds every genre
    /// handled before the stop, the failing one included.
    #[error("{source}")]
    BulkAborted {
        source: AuthError,
        partial: Box<BulkCreationReport>,
    },

    #[error("{message}")]
    Upstream { status: Option<u16>, message: String },

    #[error("Spotify kept answering with status {status} after {attempts} attempts")]
    RateLimited { status: u16, attempts: u32 },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        PipelineError::Validation(message.into())
    }

    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        PipelineError::Upstream {
            status,
            message: message.into(),
        }
    }

    /// True for failures that require the user to authenticate again.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            PipelineError::Auth(_) | PipelineError::BulkAborted { .. }
        )
    }

    /// Results gathered before a bulk run was aborted.
    pub fn partial_report(&self) -> Option<&BulkCreationReport> {
        match self {
            PipelineError::BulkAborted { partial, .. } => Some(partial.as_ref()),
            _ => None,
        }
    }

    /// HTTP status attached to the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            PipelineError::Upstream { status, .. } => *status,
            PipelineError::RateLimited { status, .. } => Some(*status),
            PipelineError::Auth(AuthError::Unauthorized(status))
            | PipelineError::BulkAborted {
                source: AuthError::Unauthorized(status),
                ..
            } => Some(*status),
            PipelineError::Network(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Store(err.to_string())
    }
}
