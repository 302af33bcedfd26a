//! In-memory database engine for exercising the bootstrap steps.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flashscore_kernel::error::Result;
use flashscore_kernel::model::{
    AuthenticatedUser, CollectionSpec, ConnectionTarget, Credentials, Principal, Secret,
};
use flashscore_kernel::settings::Settings;
use flashscore_kernel::{AdminSession, BootstrapError, Connector};

#[derive(Default)]
pub struct EngineState {
    /// Keyed by (database, name).
    pub principals: BTreeMap<(String, String), (Principal, String)>,
    pub collections: BTreeSet<(String, String)>,
    pub unreachable: bool,
    /// Lookups report nothing, as if another process created the entity just after.
    pub hide_from_lookup: bool,
    /// Every command stalls for this long before answering.
    pub stall: Option<Duration>,
    /// Access control is on: unauthenticated connections may only ping, and may
    /// create a user only while none exists (the localhost exception).
    pub auth_required: bool,
    pub connections: Vec<Option<String>>,
}

#[derive(Clone, Default)]
pub struct MemoryEngine {
    state: Arc<Mutex<EngineState>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(&self, f: impl FnOnce(&mut EngineState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn seed_principal(&self, principal: Principal, password: &str) {
        self.with_state(|state| {
            state.principals.insert(
                (principal.database.clone(), principal.name.clone()),
                (principal, password.to_string()),
            );
        });
    }

    pub fn seed_collection(&self, database: &str, name: &str) {
        self.with_state(|state| {
            state
                .collections
                .insert((database.to_string(), name.to_string()));
        });
    }

    pub fn principals(&self) -> Vec<Principal> {
        let state = self.state.lock().unwrap();
        state.principals.values().map(|(p, _)| p.clone()).collect()
    }

    pub fn collections_in(&self, database: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .collections
            .iter()
            .filter(|(db, _)| db == database)
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn connections(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().connections.clone()
    }
}

#[async_trait]
impl Connector for MemoryEngine {
    async fn connect(
        &self,
        target: &ConnectionTarget,
        credentials: Option<&Credentials>,
    ) -> Result<Box<dyn AdminSession>> {
        self.with_state(|state| {
            state
                .connections
                .push(credentials.map(|c| c.username.clone()))
        });
        Ok(Box::new(MemorySession {
            state: Arc::clone(&self.state),
            address: target.address(),
            credentials: credentials.cloned(),
        }))
    }
}

struct MemorySession {
    state: Arc<Mutex<EngineState>>,
    address: String,
    credentials: Option<Credentials>,
}

impl MemorySession {
    /// Simulate the handshake every command goes through.
    async fn handshake(&self) -> Result<()> {
        let stall = self.state.lock().unwrap().stall;
        if let Some(stall) = stall {
            tokio::time::sleep(stall).await;
        }

        let state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(BootstrapError::Connection {
                address: self.address.clone(),
                message: "connection refused".to_string(),
            });
        }
        if let Some(credentials) = &self.credentials {
            let key = (credentials.source.clone(), credentials.username.clone());
            match state.principals.get(&key) {
                Some((_, password)) if password == credentials.password.expose() => {}
                _ => {
                    return Err(BootstrapError::Authentication {
                        user: credentials.username.clone(),
                        message: "Authentication failed.".to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Refuse `command` when access control forbids it on this connection.
    fn authorize(&self, command: &str) -> Result<()> {
        let state = self.state.lock().unwrap();
        if !state.auth_required || self.credentials.is_some() {
            return Ok(());
        }
        if command == "createUser" && state.principals.is_empty() {
            return Ok(());
        }
        Err(BootstrapError::Unauthorized {
            user: "<unauthenticated>".to_string(),
            message: format!("command {command} requires authentication"),
        })
    }
}

#[async_trait]
impl AdminSession for MemorySession {
    async fn ping(&self) -> Result<()> {
        self.handshake().await
    }

    async fn authenticated_users(&self) -> Result<Vec<AuthenticatedUser>> {
        self.handshake().await?;
        Ok(self
            .credentials
            .iter()
            .map(|c| AuthenticatedUser {
                user: c.username.clone(),
                db: c.source.clone(),
            })
            .collect())
    }

    async fn find_principal(&self, database: &str, name: &str) -> Result<Option<Principal>> {
        self.handshake().await?;
        self.authorize("usersInfo")?;
        let state = self.state.lock().unwrap();
        if state.hide_from_lookup {
            return Ok(None);
        }
        Ok(state
            .principals
            .get(&(database.to_string(), name.to_string()))
            .map(|(principal, _)| principal.clone()))
    }

    async fn create_principal(&self, principal: &Principal, password: &Secret) -> Result<()> {
        self.handshake().await?;
        self.authorize("createUser")?;
        let mut state = self.state.lock().unwrap();
        let key = (principal.database.clone(), principal.name.clone());
        if state.principals.contains_key(&key) {
            return Err(BootstrapError::PrincipalExists {
                name: principal.name.clone(),
                database: principal.database.clone(),
            });
        }
        state
            .principals
            .insert(key, (principal.clone(), password.expose().to_string()));
        Ok(())
    }

    async fn collection_names(&self, database: &str) -> Result<Vec<String>> {
        self.handshake().await?;
        self.authorize("listCollections")?;
        let state = self.state.lock().unwrap();
        if state.hide_from_lookup {
            return Ok(Vec::new());
        }
        Ok(state
            .collections
            .iter()
            .filter(|(db, _)| db == database)
            .map(|(_, name)| name.clone())
            .collect())
    }

    async fn create_collection(&self, collection: &CollectionSpec) -> Result<()> {
        self.handshake().await?;
        self.authorize("create")?;
        let mut state = self.state.lock().unwrap();
        let key = (collection.database.clone(), collection.name.clone());
        if !state.collections.insert(key) {
            return Err(BootstrapError::CollectionExists {
                name: collection.name.clone(),
                database: collection.database.clone(),
            });
        }
        Ok(())
    }
}

pub fn settings() -> Settings {
    Settings::default()
}

/// An engine with access control enabled and no users yet.
pub fn secured_engine() -> MemoryEngine {
    let engine = MemoryEngine::new();
    engine.with_state(|state| state.auth_required = true);
    engine
}
