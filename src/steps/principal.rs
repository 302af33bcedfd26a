use async_trait::async_trait;
use flashscore_kernel::model::Principal;
use flashscore_kernel::settings::{OnExisting, Settings, DEFAULT_ADMIN_PASSWORD};
use flashscore_kernel::{error::Result, BootstrapError, Connector, Step, StepCtx, StepOutcome};

/// Creates the administrative principal with its database-scoped roles.
pub struct EnsurePrincipal;

impl EnsurePrincipal {
    pub const NAME: &'static str = "ensure-principal";
}

#[async_trait]
impl Step for EnsurePrincipal {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, ctx: &mut StepCtx<'_>) -> Result<StepOutcome> {
        let settings = ctx.settings;
        let connector = ctx.connector;
        let expected = settings.principal();
        let password = &settings.admin.password;
        let session = ctx.setup_session().await?;

        if settings.bootstrap.on_existing == OnExisting::Skip {
            let existing = match session
                .find_principal(&expected.database, &expected.name)
                .await
            {
                Ok(existing) => existing,
                Err(BootstrapError::Unauthorized { user, .. }) => {
                    tracing::debug!(
                        setup_user = %user,
                        "setup connection may not list users; looking up as the principal"
                    );
                    lookup_as_principal(settings, connector, &expected).await?
                }
                Err(err) => return Err(err),
            };

            if let Some(existing) = existing {
                let drift = existing.role_drift(&expected);
                if !drift.is_empty() {
                    tracing::warn!(
                        principal = %expected.name,
                        database = %expected.database,
                        %drift,
                        "existing principal lacks the configured roles; leaving it unchanged"
                    );
                }
                tracing::info!(
                    principal = %expected.name,
                    database = %expected.database,
                    "principal already exists, skipping creation"
                );
                return Ok(StepOutcome::Skipped(format!(
                    "principal '{}' already exists",
                    expected.name
                )));
            }
        }

        match session.create_principal(&expected, password).await {
            Ok(()) => {}
            // Lost a race against a concurrent bootstrap.
            Err(BootstrapError::PrincipalExists { name, .. })
                if settings.bootstrap.on_existing == OnExisting::Skip =>
            {
                tracing::info!(principal = %name, "principal appeared during creation, skipping");
                return Ok(StepOutcome::Skipped(format!(
                    "principal '{name}' already exists"
                )));
            }
            Err(err) => return Err(err),
        }

        let roles: Vec<String> = expected.roles.iter().map(ToString::to_string).collect();
        tracing::info!(
            principal = %expected.name,
            database = %expected.database,
            roles = ?roles,
            "principal created"
        );
        if password.expose() == DEFAULT_ADMIN_PASSWORD {
            tracing::warn!(
                principal = %expected.name,
                "principal was created with the built-in default password"
            );
        }

        Ok(StepOutcome::Applied)
    }
}

/// Look the principal up over its own credentials. Users may always read their
/// own definition, so this works once the localhost exception has closed.
async fn lookup_as_principal(
    settings: &Settings,
    connector: &dyn Connector,
    expected: &Principal,
) -> Result<Option<Principal>> {
    let credentials = settings.admin_credentials();
    let session = connector
        .connect(&settings.target(), Some(&credentials))
        .await?;

    match session
        .find_principal(&expected.database, &expected.name)
        .await
    {
        Ok(found) => Ok(found),
        // A principal that cannot log in yet still has to be created.
        Err(BootstrapError::Authentication { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}
