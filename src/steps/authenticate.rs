use async_trait::async_trait;
use flashscore_kernel::{error::Result, BootstrapError, Step, StepCtx, StepOutcome};

/// Authenticates against the target database with the principal's credentials.
pub struct Authenticate;

impl Authenticate {
    pub const NAME: &'static str = "authenticate";
}

#[async_trait]
impl Step for Authenticate {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, ctx: &mut StepCtx<'_>) -> Result<StepOutcome> {
        let target = ctx.settings.target();
        let credentials = ctx.settings.admin_credentials();

        let session = ctx.connector.connect(&target, Some(&credentials)).await?;
        let users = session.authenticated_users().await?;
        if !users
            .iter()
            .any(|u| u.user == credentials.username && u.db == credentials.source)
        {
            return Err(BootstrapError::Authentication {
                user: credentials.username,
                message: format!(
                    "engine does not report the user as authenticated on '{}'",
                    credentials.source
                ),
            });
        }

        tracing::info!(
            user = %credentials.username,
            database = %credentials.source,
            "authenticated"
        );
        ctx.attach_authenticated(session, credentials.username);
        Ok(StepOutcome::Verified)
    }
}
