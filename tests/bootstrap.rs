mod support;

use std::time::Duration;

use flashscore_init::steps::{Authenticate, Connect, EnsureCollection, EnsurePrincipal};
use flashscore_init::{bootstrap, default_plan};
use flashscore_kernel::model::{Principal, RoleGrant, Secret};
use flashscore_kernel::settings::OnExisting;
use flashscore_kernel::{AdminSession, BootstrapError, Connector, StepOutcome};

use support::{secured_engine, settings, MemoryEngine};

fn required_roles() -> Vec<RoleGrant> {
    ["dbAdminAnyDatabase", "readAnyDatabase", "userAdminAnyDatabase"]
        .into_iter()
        .map(|role| RoleGrant::new(role, "flashscore"))
        .collect()
}

#[test]
fn plan_runs_the_four_steps_in_order() {
    assert_eq!(
        default_plan().step_names(),
        vec![
            EnsurePrincipal::NAME,
            Connect::NAME,
            Authenticate::NAME,
            EnsureCollection::NAME
        ]
    );
}

#[tokio::test]
async fn fresh_instance_gets_one_principal_with_exactly_the_required_roles() {
    let engine = MemoryEngine::new();
    let report = bootstrap(&settings(), &engine).await.unwrap();

    assert_eq!(report.outcome(EnsurePrincipal::NAME), Some(&StepOutcome::Applied));
    let principals = engine.principals();
    assert_eq!(principals.len(), 1);
    assert_eq!(principals[0].name, "root");
    assert_eq!(principals[0].database, "flashscore");
    assert_eq!(
        principals[0].roles.iter().cloned().collect::<Vec<_>>(),
        required_roles()
    );
}

#[tokio::test]
async fn fresh_instance_gets_exactly_one_apikey_collection() {
    let engine = MemoryEngine::new();
    let report = bootstrap(&settings(), &engine).await.unwrap();

    assert_eq!(report.outcome(EnsureCollection::NAME), Some(&StepOutcome::Applied));
    assert_eq!(engine.collections_in("flashscore"), vec!["apikey".to_string()]);
}

#[tokio::test]
async fn steps_use_setup_then_anonymous_then_admin_connections() {
    let engine = MemoryEngine::new();
    bootstrap(&settings(), &engine).await.unwrap();

    assert_eq!(
        engine.connections(),
        vec![None, None, Some("root".to_string())]
    );
}

#[tokio::test]
async fn setup_credentials_are_used_to_create_the_principal() {
    let engine = MemoryEngine::new();
    engine.seed_principal(Principal::new("bootstrap", "admin", ["root"]), "init-pass");

    let mut settings = settings();
    settings.setup.username = Some("bootstrap".to_string());
    settings.setup.password = Some(Secret::new("init-pass"));
    bootstrap(&settings, &engine).await.unwrap();

    assert_eq!(engine.connections()[0].as_deref(), Some("bootstrap"));
    assert_eq!(engine.principals().len(), 2);
}

#[tokio::test]
async fn rerun_with_skip_policy_is_a_noop() {
    let engine = MemoryEngine::new();
    bootstrap(&settings(), &engine).await.unwrap();

    let report = bootstrap(&settings(), &engine).await.unwrap();
    assert!(report.is_noop());
    assert!(matches!(
        report.outcome(EnsurePrincipal::NAME),
        Some(StepOutcome::Skipped(_))
    ));
    assert!(matches!(
        report.outcome(EnsureCollection::NAME),
        Some(StepOutcome::Skipped(_))
    ));
    assert_eq!(engine.principals().len(), 1);
    assert_eq!(engine.collections_in("flashscore").len(), 1);
}

#[tokio::test]
async fn rerun_with_fail_policy_raises_principal_exists() {
    let engine = MemoryEngine::new();
    bootstrap(&settings(), &engine).await.unwrap();

    let mut settings = settings();
    settings.bootstrap.on_existing = OnExisting::Fail;
    let err = bootstrap(&settings, &engine).await.unwrap_err();

    assert!(matches!(err, BootstrapError::PrincipalExists { .. }));
    assert_eq!(err.exit_code(), 5);
}

#[tokio::test]
async fn fail_policy_raises_collection_exists_and_keeps_the_principal() {
    let engine = MemoryEngine::new();
    engine.seed_collection("flashscore", "apikey");

    let mut settings = settings();
    settings.bootstrap.on_existing = OnExisting::Fail;
    let err = bootstrap(&settings, &engine).await.unwrap_err();

    assert!(matches!(err, BootstrapError::CollectionExists { .. }));
    assert_eq!(err.exit_code(), 6);
    // No rollback: the principal created before the failure stays.
    assert_eq!(engine.principals().len(), 1);
}

#[tokio::test]
async fn concurrent_creation_is_treated_as_skipped() {
    let engine = MemoryEngine::new();
    bootstrap(&settings(), &engine).await.unwrap();
    engine.with_state(|state| state.hide_from_lookup = true);

    let report = bootstrap(&settings(), &engine).await.unwrap();
    assert!(report.is_noop());
}

#[tokio::test]
async fn wrong_password_for_existing_principal_fails_authentication() {
    let engine = MemoryEngine::new();
    engine.seed_principal(
        Principal::new("root", "flashscore", ["readAnyDatabase"]),
        "something-else",
    );

    let err = bootstrap(&settings(), &engine).await.unwrap_err();
    assert!(matches!(err, BootstrapError::Authentication { .. }));
    assert_eq!(err.exit_code(), 4);
    assert!(engine.collections_in("flashscore").is_empty());
}

#[tokio::test]
async fn created_credentials_authenticate_and_wrong_ones_do_not() {
    let engine = MemoryEngine::new();
    let settings = settings();
    bootstrap(&settings, &engine).await.unwrap();

    let good = engine
        .connect(&settings.target(), Some(&settings.admin_credentials()))
        .await
        .unwrap();
    let users = good.authenticated_users().await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].user, "root");
    assert_eq!(users[0].db, "flashscore");

    let mut wrong = settings.admin_credentials();
    wrong.password = Secret::new("not-root");
    let bad = engine.connect(&settings.target(), Some(&wrong)).await.unwrap();
    assert!(matches!(
        bad.authenticated_users().await,
        Err(BootstrapError::Authentication { .. })
    ));
}

#[tokio::test]
async fn unreachable_engine_is_a_connection_error() {
    let engine = MemoryEngine::new();
    engine.with_state(|state| state.unreachable = true);

    let err = bootstrap(&settings(), &engine).await.unwrap_err();
    assert!(matches!(err, BootstrapError::Connection { .. }));
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn invalid_settings_never_touch_the_engine() {
    let engine = MemoryEngine::new();
    let mut settings = settings();
    settings.collection.name = "system.apikey".to_string();

    let err = bootstrap(&settings, &engine).await.unwrap_err();
    assert!(matches!(err, BootstrapError::Config(_)));
    assert!(engine.connections().is_empty());
}

#[tokio::test]
async fn stalled_engine_hits_the_overall_timeout() {
    let engine = MemoryEngine::new();
    engine.with_state(|state| state.stall = Some(Duration::from_secs(30)));

    let mut settings = settings();
    settings.bootstrap.timeout_ms = 50;
    let err = bootstrap(&settings, &engine).await.unwrap_err();

    assert!(matches!(err, BootstrapError::Timeout(_)));
    assert_eq!(err.exit_code(), 9);
}

#[tokio::test]
async fn custom_target_names_flow_through_every_step() {
    let engine = MemoryEngine::new();
    let mut settings = settings();
    settings.database.name = "scores".to_string();
    settings.collection.name = "keys".to_string();
    settings.admin.username = "ops".to_string();
    settings.admin.roles = vec!["readWrite".to_string()];

    bootstrap(&settings, &engine).await.unwrap();

    let principals = engine.principals();
    assert_eq!(principals[0].name, "ops");
    assert_eq!(
        principals[0].roles.iter().cloned().collect::<Vec<_>>(),
        vec![RoleGrant::new("readWrite", "scores")]
    );
    assert_eq!(engine.collections_in("scores"), vec!["keys".to_string()]);
}

#[tokio::test]
async fn secured_engine_is_bootstrapped_through_the_localhost_exception() {
    let engine = secured_engine();
    let report = bootstrap(&settings(), &engine).await.unwrap();

    assert_eq!(report.outcome(EnsurePrincipal::NAME), Some(&StepOutcome::Applied));
    assert_eq!(report.outcome(EnsureCollection::NAME), Some(&StepOutcome::Applied));
    assert_eq!(engine.principals().len(), 1);
    assert_eq!(engine.collections_in("flashscore"), vec!["apikey".to_string()]);
}

#[tokio::test]
async fn rerun_on_secured_engine_is_a_noop() {
    let engine = secured_engine();
    bootstrap(&settings(), &engine).await.unwrap();

    let before = engine.connections().len();
    let report = bootstrap(&settings(), &engine).await.unwrap();
    assert!(report.is_noop(), "{report}");
    assert_eq!(engine.principals().len(), 1);
    assert_eq!(engine.collections_in("flashscore").len(), 1);

    // Setup, lookup as the principal, anonymous ping, authenticated session.
    assert_eq!(
        engine.connections()[before..].to_vec(),
        vec![None, Some("root".to_string()), None, Some("root".to_string())]
    );
}

#[tokio::test]
async fn secured_engine_with_foreign_password_is_refused_explicitly() {
    let engine = secured_engine();
    engine.seed_principal(settings().principal(), "rotated");

    let err = bootstrap(&settings(), &engine).await.unwrap_err();
    assert!(matches!(err, BootstrapError::Unauthorized { .. }), "{err:?}");
    assert_eq!(err.exit_code(), 4);
    assert_eq!(engine.principals().len(), 1);
}
