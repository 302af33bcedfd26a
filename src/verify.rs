//! Read-only check that a bootstrapped deployment still satisfies its invariants.

use std::fmt;

use serde::Serialize;

use flashscore_kernel::error::Result;
use flashscore_kernel::settings::Settings;
use flashscore_kernel::{BootstrapError, Connector};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub checks: Vec<Check>,
}

impl VerifyReport {
    fn push(&mut self, name: &'static str, passed: bool, detail: impl Into<String>) {
        self.checks.push(Check {
            name,
            passed,
            detail: detail.into(),
        });
    }

    pub fn passed(&self) -> bool {
        self.checks.iter().all(|check| check.passed)
    }

    pub fn failures(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|check| !check.passed)
            .map(|check| format!("{}: {}", check.name, check.detail))
            .collect()
    }

    /// Turn failed checks into a `Verification` error.
    pub fn into_result(self) -> Result<Self> {
        if self.passed() {
            Ok(self)
        } else {
            Err(BootstrapError::Verification(self.failures()))
        }
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for check in &self.checks {
            let status = if check.passed { "ok" } else { "FAILED" };
            writeln!(f, "{:<12} {:<7} {}", check.name, status, check.detail)?;
        }
        Ok(())
    }
}

/// Authenticate as the principal and inspect what the engine holds.
///
/// Connection and authentication failures are returned as errors; a reachable
/// engine that violates an invariant produces a report with failed checks.
/// The checks share the `bootstrap.timeout_ms` deadline.
pub async fn verify(settings: &Settings, connector: &dyn Connector) -> Result<VerifyReport> {
    let timeout = settings.bootstrap.timeout();
    tokio::time::timeout(timeout, run_checks(settings, connector))
        .await
        .map_err(|_| BootstrapError::Timeout(timeout))?
}

async fn run_checks(settings: &Settings, connector: &dyn Connector) -> Result<VerifyReport> {
    let target = settings.target();
    let credentials = settings.admin_credentials();
    let expected = settings.principal();
    let collection = settings.collection_spec();
    let mut report = VerifyReport::default();

    let session = connector.connect(&target, Some(&credentials)).await?;
    let users = session.authenticated_users().await?;
    let authenticated = users
        .iter()
        .any(|u| u.user == credentials.username && u.db == credentials.source);
    report.push(
        "auth",
        authenticated,
        format!("{}@{}", credentials.username, credentials.source),
    );

    match session
        .find_principal(&expected.database, &expected.name)
        .await?
    {
        Some(principal) => {
            let drift = principal.role_drift(&expected);
            if drift.is_empty() {
                report.push(
                    "principal",
                    true,
                    format!("'{}' holds {} role(s)", principal.name, principal.roles.len()),
                );
            } else {
                report.push(
                    "principal",
                    false,
                    format!("'{}' role drift: {drift}", principal.name),
                );
            }
        }
        None => report.push(
            "principal",
            false,
            format!("'{}' not found in '{}'", expected.name, expected.database),
        ),
    }

    let names = session.collection_names(&collection.database).await?;
    let present = names.iter().filter(|name| **name == collection.name).count() == 1;
    report.push(
        "collection",
        present,
        if present {
            format!("'{}' present in '{}'", collection.name, collection.database)
        } else {
            format!("'{}' missing from '{}'", collection.name, collection.database)
        },
    );

    tracing::info!(passed = report.passed(), "verification finished");
    Ok(report)
}
