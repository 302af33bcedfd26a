use async_trait::async_trait;
use flashscore_kernel::settings::OnExisting;
use flashscore_kernel::{error::Result, BootstrapError, Step, StepCtx, StepOutcome};

/// Creates the empty collection over the authenticated session.
pub struct EnsureCollection;

impl EnsureCollection {
    pub const NAME: &'static str = "ensure-collection";
}

#[async_trait]
impl Step for EnsureCollection {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, ctx: &mut StepCtx<'_>) -> Result<StepOutcome> {
        let collection = ctx.settings.collection_spec();
        let policy = ctx.settings.bootstrap.on_existing;
        let session = ctx.authenticated_session()?;

        if policy == OnExisting::Skip {
            let names = session.collection_names(&collection.database).await?;
            if names.iter().any(|name| *name == collection.name) {
                tracing::info!(
                    collection = %collection.name,
                    database = %collection.database,
                    "collection already exists, skipping creation"
                );
                return Ok(StepOutcome::Skipped(format!(
                    "collection '{}' already exists",
                    collection.name
                )));
            }
        }

        match session.create_collection(&collection).await {
            Ok(()) => {
                tracing::info!(
                    collection = %collection.name,
                    database = %collection.database,
                    "collection created"
                );
                Ok(StepOutcome::Applied)
            }
            Err(BootstrapError::CollectionExists { name, .. }) if policy == OnExisting::Skip => {
                tracing::info!(collection = %name, "collection appeared during creation, skipping");
                Ok(StepOutcome::Skipped(format!(
                    "collection '{name}' already exists"
                )))
            }
            Err(err) => Err(err),
        }
    }
}
