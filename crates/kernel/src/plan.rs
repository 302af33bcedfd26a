use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::step::{Step, StepCtx, StepOutcome};

/// Ordered list of steps executed front to back
pub struct BootstrapPlan {
    steps: Vec<Arc<dyn Step>>,
}

impl BootstrapPlan {
    /// Create an empty plan
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a step; steps run in registration order
    pub fn register(&mut self, step: Arc<dyn Step>) {
        self.steps.push(step);
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Run every step in order, stopping at the first failure.
    ///
    /// Nothing applied by earlier steps is undone when a later step fails.
    pub async fn run(&self, ctx: &mut StepCtx<'_>) -> Result<BootstrapReport> {
        tracing::info!("running bootstrap steps in order: {:?}", self.step_names());

        let mut report = BootstrapReport::default();
        for step in &self.steps {
            tracing::info!(step = step.name(), "running bootstrap step");

            let outcome = match step.run(ctx).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(step = step.name(), error = %err, "bootstrap step failed");
                    return Err(err);
                }
            };

            tracing::info!(step = step.name(), %outcome, "bootstrap step finished");
            report.record(step.name(), outcome);
        }

        Ok(report)
    }
}

impl Default for BootstrapPlan {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: &'static str,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// What each step of a completed run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub steps: Vec<StepRecord>,
}

impl BootstrapReport {
    pub fn record(&mut self, step: &'static str, outcome: StepOutcome) {
        self.steps.push(StepRecord { step, outcome });
    }

    pub fn outcome(&self, step: &str) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|record| record.step == step)
            .map(|record| &record.outcome)
    }

    /// True when the run left engine state unchanged.
    pub fn is_noop(&self) -> bool {
        self.steps
            .iter()
            .all(|record| record.outcome != StepOutcome::Applied)
    }
}

impl fmt::Display for BootstrapReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.steps {
            writeln!(f, "{:<20} {}", record.step, record.outcome)?;
        }
        Ok(())
    }
}
