use async_trait::async_trait;

use crate::error::Result;
use crate::model::{
    AuthenticatedUser, CollectionSpec, ConnectionTarget, Credentials, Principal, Secret,
};

/// Opens sessions against a database engine.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a session against `target`, authenticating with `credentials` when given.
    ///
    /// Engines may defer the network handshake until the first command, so a
    /// successful return does not prove the engine is reachable.
    async fn connect(
        &self,
        target: &ConnectionTarget,
        credentials: Option<&Credentials>,
    ) -> Result<Box<dyn AdminSession>>;
}

/// Administrative commands the bootstrap issues over one connection.
#[async_trait]
pub trait AdminSession: Send + Sync {
    /// Round-trip a no-op command to the target database.
    async fn ping(&self) -> Result<()>;

    /// Users the engine considers authenticated on this connection.
    async fn authenticated_users(&self) -> Result<Vec<AuthenticatedUser>>;

    /// Look up a principal defined in `database`.
    ///
    /// A connection that may not list users fails with `Unauthorized`; `Ok(None)`
    /// always means the principal is absent.
    async fn find_principal(&self, database: &str, name: &str) -> Result<Option<Principal>>;

    /// Create `principal`. Fails with `PrincipalExists` when it is already defined.
    async fn create_principal(&self, principal: &Principal, password: &Secret) -> Result<()>;

    async fn collection_names(&self, database: &str) -> Result<Vec<String>>;

    /// Create an empty collection. Fails with `CollectionExists` when it is already present.
    async fn create_collection(&self, collection: &CollectionSpec) -> Result<()>;
}
