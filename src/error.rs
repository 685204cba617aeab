//! Error taxonomy for the provisioning workflow.
//!
//! Every component returns a typed error instead of exiting; `main` is the
//! only place an error becomes a process exit code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad or missing CLI arguments.
    #[error("{0}")]
    Usage(String),

    /// Invalid cluster name or missing required event fields.
    #[error("{0}")]
    Validation(String),

    /// Create-on-existing or delete-on-missing cluster.
    #[error("{0}")]
    Conflict(String),

    /// Credential, bucket, or workspace bootstrap failure.
    #[error("failed to {activity}: {cause:#}")]
    Dependency {
        activity: String,
        cause: anyhow::Error,
    },

    /// The provisioning backend itself failed or returned non-zero.
    #[error("{0}")]
    Backend(String),
}

impl Error {
    pub fn dependency(activity: impl Into<String>, cause: anyhow::Error) -> Self {
        Error::Dependency {
            activity: activity.into(),
            cause,
        }
    }

    /// Exit code for the process once this error reaches `main`.
    ///
    /// Usage mistakes exit 0 by CLI convention; everything else is a real
    /// failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Usage(_) => 0,
            Error::Validation(_) | Error::Conflict(_) => 1,
            Error::Dependency { .. } | Error::Backend(_) => 1,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
