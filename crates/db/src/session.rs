use async_trait::async_trait;
use mongodb::bson::Document;
use mongodb::Client;

use flashscore_kernel::engine::AdminSession;
use flashscore_kernel::error::Result;
use flashscore_kernel::model::{AuthenticatedUser, CollectionSpec, Principal, Secret};

use crate::commands;
use crate::error::ErrorScope;

/// One MongoDB client bound to the target database.
pub struct MongoSession {
    client: Client,
    database: String,
    scope: ErrorScope,
}

impl MongoSession {
    pub(crate) fn new(client: Client, database: String, scope: ErrorScope) -> Self {
        Self {
            client,
            database,
            scope,
        }
    }

    async fn run(&self, database: &str, command: Document) -> Result<Document> {
        self.client
            .database(database)
            .run_command(command)
            .await
            .map_err(|err| self.scope.classify(err))
    }
}

#[async_trait]
impl AdminSession for MongoSession {
    async fn ping(&self) -> Result<()> {
        self.run(&self.database, commands::ping()).await?;
        Ok(())
    }

    async fn authenticated_users(&self) -> Result<Vec<AuthenticatedUser>> {
        let reply = self.run(&self.database, commands::connection_status()).await?;
        commands::parse_connection_status(&reply)
    }

    async fn find_principal(&self, database: &str, name: &str) -> Result<Option<Principal>> {
        let reply = self.run(database, commands::users_info(database, name)).await?;
        commands::parse_users_info(&reply, database, name)
    }

    async fn create_principal(&self, principal: &Principal, password: &Secret) -> Result<()> {
        self.client
            .database(&principal.database)
            .run_command(commands::create_user(principal, password))
            .await
            .map(|_| ())
            .map_err(|err| self.scope.classify_create_user(err, principal))
    }

    async fn collection_names(&self, database: &str) -> Result<Vec<String>> {
        self.client
            .database(database)
            .list_collection_names()
            .await
            .map_err(|err| self.scope.classify(err))
    }

    async fn create_collection(&self, collection: &CollectionSpec) -> Result<()> {
        self.client
            .database(&collection.database)
            .create_collection(&collection.name)
            .await
            .map_err(|err| self.scope.classify_create_collection(err, collection))
    }
}
