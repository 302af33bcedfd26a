//! Classification of driver failures into the bootstrap error taxonomy.

use mongodb::error::{Error, ErrorKind};

use flashscore_kernel::error::BootstrapError;
use flashscore_kernel::model::{CollectionSpec, Principal};

pub(crate) const UNAUTHORIZED: i32 = 13;
pub(crate) const AUTHENTICATION_FAILED: i32 = 18;
pub(crate) const NAMESPACE_EXISTS: i32 = 48;
pub(crate) const USER_ALREADY_EXISTS: i32 = 51003;

/// Connection details attached to classified errors.
#[derive(Debug, Clone)]
pub(crate) struct ErrorScope {
    pub address: String,
    pub user: Option<String>,
}

impl ErrorScope {
    fn user(&self) -> String {
        self.user.clone().unwrap_or_else(|| "<unauthenticated>".to_string())
    }

    pub fn classify(&self, err: Error) -> BootstrapError {
        match err.kind.as_ref() {
            ErrorKind::Authentication { message, .. } => BootstrapError::Authentication {
                user: self.user(),
                message: message.clone(),
            },
            ErrorKind::Command(command) => self.classify_command(command.code, &command.message),
            ErrorKind::ServerSelection { message, .. } | ErrorKind::DnsResolve { message, .. } => {
                BootstrapError::Connection {
                    address: self.address.clone(),
                    message: message.clone(),
                }
            }
            ErrorKind::Io(io) => BootstrapError::Connection {
                address: self.address.clone(),
                message: io.to_string(),
            },
            ErrorKind::InvalidArgument { message, .. } => BootstrapError::Config(message.clone()),
            _ => BootstrapError::database(err.to_string()),
        }
    }

    /// Classify a failed `createUser`; the "user exists" code becomes `PrincipalExists`.
    pub fn classify_create_user(&self, err: Error, principal: &Principal) -> BootstrapError {
        match command_code(&err) {
            Some(USER_ALREADY_EXISTS) => BootstrapError::PrincipalExists {
                name: principal.name.clone(),
                database: principal.database.clone(),
            },
            _ => self.classify(err),
        }
    }

    /// Classify a failed `create` command; `NamespaceExists` becomes `CollectionExists`.
    pub fn classify_create_collection(
        &self,
        err: Error,
        collection: &CollectionSpec,
    ) -> BootstrapError {
        match command_code(&err) {
            Some(NAMESPACE_EXISTS) => BootstrapError::CollectionExists {
                name: collection.name.clone(),
                database: collection.database.clone(),
            },
            _ => self.classify(err),
        }
    }

    /// Map a server command failure by its error code.
    pub fn classify_command(&self, code: i32, message: &str) -> BootstrapError {
        match code {
            AUTHENTICATION_FAILED => BootstrapError::Authentication {
                user: self.user(),
                message: message.to_string(),
            },
            UNAUTHORIZED => BootstrapError::Unauthorized {
                user: self.user(),
                message: message.to_string(),
            },
            _ => BootstrapError::Database {
                code: Some(code),
                message: message.to_string(),
            },
        }
    }
}

/// Server error code carried by a command failure.
pub(crate) fn command_code(err: &Error) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Command(command) => Some(command.code),
        _ => None,
    }
}
