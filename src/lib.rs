//! Bootstrap for the flashscore MongoDB deployment.
//!
//! Ensures the administrative principal and the configured collection exist,
//! then exits. The engine is reached through [`flashscore_kernel::Connector`].

mod bootstrap;
pub mod steps;
pub mod verify;

pub use bootstrap::bootstrap;
pub use steps::default_plan;
pub use verify::{verify, VerifyReport};
