//! MongoDB client factory and admin commands for the bootstrap steps.

mod commands;
mod error;
mod session;

use async_trait::async_trait;
use mongodb::options::{ClientOptions, Credential, ServerAddress};
use mongodb::Client;

use flashscore_kernel::engine::{AdminSession, Connector};
use flashscore_kernel::error::{BootstrapError, Result};
use flashscore_kernel::model::{ConnectionTarget, Credentials};

pub use session::MongoSession;

use error::ErrorScope;

/// Opens [`MongoSession`]s with the official MongoDB driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoConnector;

#[async_trait]
impl Connector for MongoConnector {
    async fn connect(
        &self,
        target: &ConnectionTarget,
        credentials: Option<&Credentials>,
    ) -> Result<Box<dyn AdminSession>> {
        let options = client_options(target, credentials).await?;
        let address = options
            .hosts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let client = Client::with_options(options).map_err(|err| BootstrapError::Connection {
            address: address.clone(),
            message: err.to_string(),
        })?;

        tracing::info!(
            target: "flashscore-db",
            address = %address,
            database = %target.database,
            user = credentials.map(|c| c.username.as_str()).unwrap_or("<none>"),
            "mongodb client created"
        );

        let scope = ErrorScope {
            address,
            user: credentials.map(|c| c.username.clone()),
        };
        Ok(Box::new(MongoSession::new(
            client,
            target.database.clone(),
            scope,
        )))
    }
}

/// Driver options for `target`, authenticated with `credentials` when given.
///
/// A connection string on the target supplies the hosts and its own options.
/// Credentials embedded in it are always replaced by `credentials`.
pub async fn client_options(
    target: &ConnectionTarget,
    credentials: Option<&Credentials>,
) -> Result<ClientOptions> {
    let mut options = match &target.uri {
        Some(uri) => ClientOptions::parse(normalize_uri(uri.expose()))
            .await
            .map_err(|err| BootstrapError::config(format!("invalid database.uri: {err}")))?,
        None => {
            let address = ServerAddress::parse(target.address()).map_err(|err| {
                BootstrapError::config(format!("invalid database address: {err}"))
            })?;
            let mut options = ClientOptions::default();
            options.hosts = vec![address];
            options.direct_connection = Some(target.direct_connection);
            options
        }
    };

    options.app_name = options.app_name.or_else(|| target.app_name.clone());
    options.connect_timeout = options.connect_timeout.or(Some(target.connect_timeout));
    options.server_selection_timeout = options
        .server_selection_timeout
        .or(Some(target.server_selection_timeout));
    options.credential = credentials.map(|credentials| {
        Credential::builder()
            .username(credentials.username.clone())
            .password(credentials.password.expose().to_string())
            .source(credentials.source.clone())
            .build()
    });

    Ok(options)
}

/// Translate the Go driver's `connect=direct` into `directConnection=true`.
fn normalize_uri(uri: &str) -> String {
    uri.replace("connect=direct", "directConnection=true")
}
