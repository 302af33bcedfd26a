use flashscore_kernel::error::Result;
use flashscore_kernel::settings::Settings;
use flashscore_kernel::{BootstrapError, BootstrapReport, Connector, StepCtx};

use crate::steps::default_plan;

/// Run the full bootstrap sequence against the engine behind `connector`.
///
/// Settings are validated first; the whole sequence shares one deadline of
/// `bootstrap.timeout_ms`.
pub async fn bootstrap(settings: &Settings, connector: &dyn Connector) -> Result<BootstrapReport> {
    settings.validate()?;

    let timeout = settings.bootstrap.timeout();
    tracing::info!(
        env = settings.environment.as_str(),
        address = %settings.target().address(),
        database = %settings.database.name,
        collection = %settings.collection.name,
        on_existing = ?settings.bootstrap.on_existing,
        "bootstrap starting"
    );

    let plan = default_plan();
    let mut ctx = StepCtx::new(settings, connector);
    let report = tokio::time::timeout(timeout, plan.run(&mut ctx))
        .await
        .map_err(|_| BootstrapError::Timeout(timeout))??;

    tracing::info!(noop = report.is_noop(), "bootstrap complete");
    Ok(report)
}
