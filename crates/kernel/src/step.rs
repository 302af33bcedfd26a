use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::engine::{AdminSession, Connector};
use crate::error::{BootstrapError, Result};
use crate::settings::Settings;

/// State threaded through the steps of one bootstrap run
pub struct StepCtx<'a> {
    pub settings: &'a Settings,
    pub connector: &'a dyn Connector,
    setup: Option<Box<dyn AdminSession>>,
    session: Option<Box<dyn AdminSession>>,
    authenticated_as: Option<String>,
}

impl<'a> StepCtx<'a> {
    pub fn new(settings: &'a Settings, connector: &'a dyn Connector) -> Self {
        Self {
            settings,
            connector,
            setup: None,
            session: None,
            authenticated_as: None,
        }
    }

    /// Session used to create the principal, opened on first use.
    pub async fn setup_session(&mut self) -> Result<&dyn AdminSession> {
        if self.setup.is_none() {
            let credentials = self.settings.setup_credentials();
            let session = self
                .connector
                .connect(&self.settings.target(), credentials.as_ref())
                .await?;
            self.setup = Some(session);
        }

        self.setup
            .as_deref()
            .ok_or_else(|| BootstrapError::database("setup session unavailable"))
    }

    /// Replace the target session with an unauthenticated one.
    pub fn attach_session(&mut self, session: Box<dyn AdminSession>) {
        self.session = Some(session);
        self.authenticated_as = None;
    }

    /// Replace the target session with one authenticated as `user`.
    pub fn attach_authenticated(
        &mut self,
        session: Box<dyn AdminSession>,
        user: impl Into<String>,
    ) {
        self.session = Some(session);
        self.authenticated_as = Some(user.into());
    }

    /// The authenticated target session. Errors if no step has authenticated yet.
    pub fn authenticated_session(&self) -> Result<&dyn AdminSession> {
        match (&self.session, &self.authenticated_as) {
            (Some(session), Some(_)) => Ok(&**session),
            _ => Err(BootstrapError::Authentication {
                user: self.settings.admin.username.clone(),
                message: "no authenticated session is open".to_string(),
            }),
        }
    }
}

/// Result of a single step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "lowercase")]
pub enum StepOutcome {
    /// The step changed engine state.
    Applied,
    /// The entity already existed and was left untouched.
    Skipped(String),
    /// The step checked a condition without changing anything.
    Verified,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Applied => f.write_str("applied"),
            StepOutcome::Skipped(reason) => write!(f, "skipped ({reason})"),
            StepOutcome::Verified => f.write_str("verified"),
        }
    }
}

/// One unit of the bootstrap sequence
#[async_trait]
pub trait Step: Send + Sync {
    /// Unique name for this step
    fn name(&self) -> &'static str;

    /// Execute the step. The first error aborts the plan.
    async fn run(&self, ctx: &mut StepCtx<'_>) -> Result<StepOutcome>;
}
