//! Failure taxonomy shared by every bootstrap step.

use std::time::Duration;

use thiserror::Error;

pub type Result<T, E = BootstrapError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot reach database engine at {address}: {message}")]
    Connection { address: String, message: String },

    #[error("authentication failed for '{user}': {message}")]
    Authentication { user: String, message: String },

    #[error("'{user}' is not authorized: {message}")]
    Unauthorized { user: String, message: String },

    #[error("principal '{name}' already exists in '{database}'")]
    PrincipalExists { name: String, database: String },

    #[error("collection '{name}' already exists in '{database}'")]
    CollectionExists { name: String, database: String },

    #[error(
        "database command failed{}: {message}",
        .code.map(|c| format!(" (code {c})")).unwrap_or_default()
    )]
    Database { code: Option<i32>, message: String },

    #[error("verification failed: {}", .0.join("; "))]
    Verification(Vec<String>),

    #[error("bootstrap did not finish within {0:?}")]
    Timeout(Duration),
}

impl BootstrapError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a database error without a server code
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            code: None,
            message: message.into(),
        }
    }

    /// Process exit code for this failure. Zero is reserved for success.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Connection { .. } => 3,
            Self::Authentication { .. } | Self::Unauthorized { .. } => 4,
            Self::PrincipalExists { .. } => 5,
            Self::CollectionExists { .. } => 6,
            Self::Database { .. } => 7,
            Self::Verification(_) => 8,
            Self::Timeout(_) => 9,
        }
    }
}
