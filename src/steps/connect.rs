use async_trait::async_trait;
use flashscore_kernel::{error::Result, Step, StepCtx, StepOutcome};

/// Opens a connection to the target database and checks the engine answers.
pub struct Connect;

impl Connect {
    pub const NAME: &'static str = "connect";
}

#[async_trait]
impl Step for Connect {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, ctx: &mut StepCtx<'_>) -> Result<StepOutcome> {
        let target = ctx.settings.target();
        let session = ctx.connector.connect(&target, None).await?;
        session.ping().await?;

        tracing::info!(
            address = %target.address(),
            database = %target.database,
            "database engine reachable"
        );
        ctx.attach_session(session);
        Ok(StepOutcome::Verified)
    }
}
