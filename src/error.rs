//! Error types for identity resolution.
//!
//! Errors are classified by who can act on them:
//! - InvalidRequest: the caller sent an unusable request; surfaced as a client error
//! - Consistency: stored state violates a cluster invariant; surfaced as a server
//!   error and logged for operator investigation
//! - Db: the storage layer failed; surfaced as a server error, never retried here

use thiserror::Error;

use crate::db::DbError;

/// Errors produced by the cluster resolver and response builder.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("At least one of email or phoneNumber must be provided")]
    InvalidRequest,

    #[error("Cluster consistency violation: {0}")]
    Consistency(String),

    #[error("Storage error: {0}")]
    Db(#[from] DbError),
}

impl IdentityError {
    /// Returns true if the caller, not the service, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, IdentityError::InvalidRequest)
    }
}
