use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::error::BootstrapError;
use crate::model::{CollectionSpec, ConnectionTarget, Credentials, Principal, Secret};

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "FLASHSCORE_ENV";
const CONFIG_DIR_ENV: &str = "FLASHSCORE_CONFIG_DIR";
const ENV_PREFIX: &str = "FLASHSCORE";

/// Variables used by the original deployment scripts, applied last.
const LEGACY_OVERRIDES: &[(&str, &str)] = &[
    ("MONGO_URI", "database.uri"),
    ("MONGO_DATABASE", "database.name"),
    ("MONGO_USERNAME", "admin.username"),
    ("MONGO_PASSWORD", "admin.password"),
];

pub const DEFAULT_ADMIN_PASSWORD: &str = "root";

pub const DEFAULT_ROLES: &[&str] = &[
    "readAnyDatabase",
    "dbAdminAnyDatabase",
    "userAdminAnyDatabase",
];

/// Deployment environment the bootstrap is running against.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Where to look for configuration. Unset fields fall back to the process environment.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_dir: Option<PathBuf>,
    pub environment: Option<String>,
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub admin: AdminSettings,
    #[serde(default)]
    pub setup: SetupSettings,
    #[serde(default)]
    pub collection: CollectionSettings,
    #[serde(default)]
    pub bootstrap: BootstrapSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration from the process environment and `./config`.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(&LoadOptions::default())
    }

    /// Load configuration by layering `.env`, base file, environment overlay and variables.
    pub fn load_with(options: &LoadOptions) -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = options
            .environment
            .clone()
            .or_else(|| std::env::var(ENV_VAR_NAME).ok())
            .unwrap_or_else(|| DEFAULT_ENV.to_string());
        let environment: Environment = environment.parse()?;

        let config_dir = match &options.config_dir {
            Some(dir) => dir.clone(),
            None => match std::env::var(CONFIG_DIR_ENV) {
                Ok(dir) => PathBuf::from(dir),
                // Default to the `config` directory next to the working directory.
                Err(_) => std::env::current_dir()
                    .context("unable to resolve current directory")?
                    .join("config"),
            },
        };

        let mut settings = Self::from_dir(&config_dir, environment)?;
        settings.environment = environment;
        Ok(settings)
    }

    fn from_dir(config_dir: &Path, environment: Environment) -> anyhow::Result<Self> {
        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment.as_str()));

        let mut builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("admin.roles"),
            );

        for (variable, key) in LEGACY_OVERRIDES {
            let value = std::env::var(variable).ok().filter(|v| !v.is_empty());
            builder = builder
                .set_override_option(*key, value)
                .with_context(|| format!("failed to apply {variable}"))?;
        }

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        cfg.try_deserialize()
            .with_context(|| "failed to deserialize configuration")
    }

    /// Reject settings the bootstrap cannot act on, reporting every problem at once.
    pub fn validate(&self) -> Result<(), BootstrapError> {
        let mut problems = Vec::new();

        if let Some(uri) = &self.database.uri {
            let uri = uri.expose();
            if !(uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://")) {
                problems.push(
                    "database.uri must start with mongodb:// or mongodb+srv://".to_string(),
                );
            }
        }
        if self.database.host.trim().is_empty() {
            problems.push("database.host must not be empty".to_string());
        }
        if self.database.port == 0 {
            problems.push("database.port must be between 1 and 65535".to_string());
        }
        if let Err(problem) = check_database_name("database.name", &self.database.name) {
            problems.push(problem);
        }
        if self.admin.username.trim().is_empty() {
            problems.push("admin.username must not be empty".to_string());
        }
        if self.admin.password.is_empty() {
            problems.push("admin.password must not be empty".to_string());
        }
        if self.admin.roles.is_empty() {
            problems.push("admin.roles must name at least one role".to_string());
        }
        if self.admin.roles.iter().any(|role| role.trim().is_empty()) {
            problems.push("admin.roles must not contain empty role names".to_string());
        }
        if let Some(roles_db) = &self.admin.roles_db {
            if let Err(problem) = check_database_name("admin.roles_db", roles_db) {
                problems.push(problem);
            }
        }
        if let Err(problem) = check_collection_name(&self.collection.name) {
            problems.push(problem);
        }
        if self.setup.username.is_some() != self.setup.password.is_some() {
            problems.push("setup.username and setup.password must be set together".to_string());
        }
        if self.bootstrap.timeout_ms == 0 {
            problems.push("bootstrap.timeout_ms must be greater than zero".to_string());
        }
        if self.environment == Environment::Production
            && self.admin.password.expose() == DEFAULT_ADMIN_PASSWORD
        {
            problems.push(
                "admin.password is the built-in default; supply a real credential in production"
                    .to_string(),
            );
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(BootstrapError::Config(problems.join("; ")))
        }
    }

    pub fn target(&self) -> ConnectionTarget {
        ConnectionTarget {
            uri: self.database.uri.clone(),
            host: self.database.host.clone(),
            port: self.database.port,
            database: self.database.name.clone(),
            app_name: Some(self.database.app_name.clone()).filter(|name| !name.is_empty()),
            connect_timeout: Duration::from_millis(self.database.connect_timeout_ms),
            server_selection_timeout: Duration::from_millis(
                self.database.server_selection_timeout_ms,
            ),
            direct_connection: self.database.direct_connection,
        }
    }

    /// The principal as it must exist once bootstrap completes.
    ///
    /// Roles are granted on `admin.roles_db`, falling back to the target database.
    pub fn principal(&self) -> Principal {
        let principal = Principal::new(
            self.admin.username.clone(),
            self.database.name.clone(),
            &self.admin.roles,
        );
        match &self.admin.roles_db {
            Some(db) => principal.with_roles_on(db),
            None => principal,
        }
    }

    /// Credentials of the administrative principal, sourced from the target database.
    pub fn admin_credentials(&self) -> Credentials {
        Credentials {
            username: self.admin.username.clone(),
            password: self.admin.password.clone(),
            source: self.database.name.clone(),
        }
    }

    /// Credentials for the connection that creates the principal, if any are configured.
    pub fn setup_credentials(&self) -> Option<Credentials> {
        match (&self.setup.username, &self.setup.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
                source: self.setup.auth_source.clone(),
            }),
            _ => None,
        }
    }

    pub fn collection_spec(&self) -> CollectionSpec {
        CollectionSpec {
            database: self.database.name.clone(),
            name: self.collection.name.clone(),
        }
    }
}

fn check_database_name(field: &str, name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| matches!(c, '/' | '\\' | '.' | ' ' | '"' | '$' | '\0'))
    {
        return Err(format!(
            "{} '{}' contains forbidden character {:?}",
            field, name, bad
        ));
    }
    Ok(())
}

fn check_collection_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("collection.name must not be empty".to_string());
    }
    if name.contains('$') || name.contains('\0') {
        return Err(format!(
            "collection.name '{}' must not contain '$' or NUL",
            name.replace('\0', "\\0")
        ));
    }
    if name.starts_with("system.") {
        return Err(format!(
            "collection.name '{}' uses the reserved 'system.' prefix",
            name
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseSettings {
    /// Connection string; overrides host, port and direct_connection when set.
    #[serde(default)]
    pub uri: Option<Secret>,
    #[serde(default = "DatabaseSettings::default_host")]
    pub host: String,
    #[serde(default = "DatabaseSettings::default_port")]
    pub port: u16,
    #[serde(default = "DatabaseSettings::default_name")]
    pub name: String,
    #[serde(default = "DatabaseSettings::default_app_name")]
    pub app_name: String,
    #[serde(default = "DatabaseSettings::default_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "DatabaseSettings::default_timeout_ms")]
    pub server_selection_timeout_ms: u64,
    #[serde(default = "DatabaseSettings::default_direct_connection")]
    pub direct_connection: bool,
}

impl DatabaseSettings {
    fn default_host() -> String {
        "localhost".to_string()
    }

    fn default_port() -> u16 {
        27017
    }

    fn default_name() -> String {
        "flashscore".to_string()
    }

    fn default_app_name() -> String {
        "flashscore-init".to_string()
    }

    fn default_timeout_ms() -> u64 {
        5000
    }

    fn default_direct_connection() -> bool {
        true
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            uri: None,
            host: Self::default_host(),
            port: Self::default_port(),
            name: Self::default_name(),
            app_name: Self::default_app_name(),
            connect_timeout_ms: Self::default_timeout_ms(),
            server_selection_timeout_ms: Self::default_timeout_ms(),
            direct_connection: Self::default_direct_connection(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminSettings {
    #[serde(default = "AdminSettings::default_username")]
    pub username: String,
    #[serde(default = "AdminSettings::default_password")]
    pub password: Secret,
    #[serde(default = "AdminSettings::default_roles")]
    pub roles: Vec<String>,
    /// Database the roles are granted on. Defaults to `database.name`.
    #[serde(default)]
    pub roles_db: Option<String>,
}

impl AdminSettings {
    fn default_username() -> String {
        "root".to_string()
    }

    fn default_password() -> Secret {
        Secret::new(DEFAULT_ADMIN_PASSWORD)
    }

    fn default_roles() -> Vec<String> {
        DEFAULT_ROLES.iter().map(|role| role.to_string()).collect()
    }
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            username: Self::default_username(),
            password: Self::default_password(),
            roles: Self::default_roles(),
            roles_db: None,
        }
    }
}

/// Identity used to create the principal. Without one the engine's localhost
/// exception must allow the first user to be created.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SetupSettings {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<Secret>,
    #[serde(default = "SetupSettings::default_auth_source")]
    pub auth_source: String,
}

impl SetupSettings {
    fn default_auth_source() -> String {
        "admin".to_string()
    }
}

impl Default for SetupSettings {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            auth_source: Self::default_auth_source(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectionSettings {
    #[serde(default = "CollectionSettings::default_name")]
    pub name: String,
}

impl CollectionSettings {
    fn default_name() -> String {
        "apikey".to_string()
    }
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
        }
    }
}

/// What to do when the principal or collection is already present.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OnExisting {
    /// Check first and leave existing entities untouched.
    #[default]
    Skip,
    /// Create unconditionally and surface the engine's "already exists" error.
    Fail,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BootstrapSettings {
    #[serde(default)]
    pub on_existing: OnExisting,
    #[serde(default = "BootstrapSettings::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl BootstrapSettings {
    fn default_timeout_ms() -> u64 {
        30_000
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            on_existing: OnExisting::default(),
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "TelemetrySettings::default_log_level")]
    pub log_level: String,
}

impl TelemetrySettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_level: Self::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
