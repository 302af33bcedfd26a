pub mod authenticate;
pub mod collection;
pub mod connect;
pub mod principal;

use std::sync::Arc;

use flashscore_kernel::BootstrapPlan;

pub use authenticate::Authenticate;
pub use collection::EnsureCollection;
pub use connect::Connect;
pub use principal::EnsurePrincipal;

/// The bootstrap sequence: principal, connection, authentication, collection.
pub fn default_plan() -> BootstrapPlan {
    let mut plan = BootstrapPlan::new();
    plan.register(Arc::new(EnsurePrincipal));
    plan.register(Arc::new(Connect));
    plan.register(Arc::new(Authenticate));
    plan.register(Arc::new(EnsureCollection));
    plan
}
