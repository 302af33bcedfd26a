use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};

/// Credential material that never shows up in logs or rendered settings.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw value. Only the driver should need this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A named role granted on one database.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: String,
    pub db: String,
}

impl RoleGrant {
    pub fn new(role: impl Into<String>, db: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            db: db.into(),
        }
    }
}

impl fmt::Display for RoleGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.role, self.db)
    }
}

/// Administrative identity held by the database engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    /// Database the principal is defined in (its authentication source).
    pub database: String,
    pub roles: BTreeSet<RoleGrant>,
}

impl Principal {
    /// Build a principal whose roles are all scoped to `database`.
    pub fn new<I, R>(name: impl Into<String>, database: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: AsRef<str>,
    {
        let database = database.into();
        let roles = roles
            .into_iter()
            .map(|role| RoleGrant::new(role.as_ref(), database.as_str()))
            .collect();

        Self {
            name: name.into(),
            database,
            roles,
        }
    }

    /// Rescope every grant to `db`, keeping the role names.
    pub fn with_roles_on(mut self, db: &str) -> Self {
        self.roles = self
            .roles
            .into_iter()
            .map(|grant| RoleGrant::new(grant.role, db))
            .collect();
        self
    }

    /// Compare this principal's grants against the `expected` grants.
    pub fn role_drift(&self, expected: &Principal) -> RoleDrift {
        RoleDrift {
            missing: expected.roles.difference(&self.roles).cloned().collect(),
            unexpected: self.roles.difference(&expected.roles).cloned().collect(),
        }
    }
}

/// Difference between the grants a principal holds and the grants it should hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleDrift {
    pub missing: Vec<RoleGrant>,
    pub unexpected: Vec<RoleGrant>,
}

impl RoleDrift {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

impl fmt::Display for RoleDrift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |grants: &[RoleGrant]| {
            grants
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(
            f,
            "missing [{}], unexpected [{}]",
            join(&self.missing),
            join(&self.unexpected)
        )
    }
}

/// User the engine reports as authenticated on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user: String,
    pub db: String,
}

/// Username, password and the database that holds the user.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Secret,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub database: String,
    pub name: String,
}

/// Where and how to reach the database engine.
#[derive(Debug, Clone)]
pub struct ConnectionTarget {
    /// Full connection string; when set it takes precedence over host and port.
    pub uri: Option<Secret>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub app_name: Option<String>,
    pub connect_timeout: Duration,
    pub server_selection_timeout: Duration,
    pub direct_connection: bool,
}

impl ConnectionTarget {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
