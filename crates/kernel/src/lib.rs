pub mod engine;
pub mod error;
pub mod model;
pub mod plan;
pub mod settings;
pub mod step;

pub use engine::{AdminSession, Connector};
pub use error::BootstrapError;
pub use plan::{BootstrapPlan, BootstrapReport};
pub use step::{Step, StepCtx, StepOutcome};
