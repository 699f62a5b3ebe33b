//! Integration tests for the reconciliation run.
//!
//! The vault and identity directories are in-memory doubles so every
//! commit and every diagnostic can be inspected.

use vaultsync::errors::{Result, VaultSyncError};
use vaultsync::policy::{PrincipalPolicy, PrincipalType, VaultRecord};
use vaultsync::sync::{
    reconcile, Diagnostic, DiagnosticLog, Identity, SafetyLimits, StaticIdentityDirectory,
    VaultDirectory,
};

/// Records every commit; optionally fails commits for one vault.
#[derive(Default)]
struct RecordingVaults {
    commits: Vec<(String, Vec<PrincipalPolicy>)>,
    fail_on: Option<String>,
}

impl VaultDirectory for RecordingVaults {
    fn fetch(&self, _sub: &str, _rg: &str, vault_name: &str) -> Result<VaultRecord> {
        Err(VaultSyncError::VaultNotFound(vault_name.to_string()))
    }

    fn commit(
        &mut self,
        _resource_group: &str,
        vault_name: &str,
        policies: &[PrincipalPolicy],
        _tenant_id: &str,
    ) -> Result<()> {
        if self.fail_on.as_deref() == Some(vault_name) {
            return Err(VaultSyncError::Directory("request throttled".into()));
        }
        self.commits
            .push((vault_name.to_string(), policies.to_vec()));
        Ok(())
    }
}

fn identities() -> StaticIdentityDirectory {
    let user = |id: &str, name: &str, alias: &str| Identity {
        object_id: id.into(),
        display_name: name.into(),
        alias: Some(alias.into()),
        application_id: None,
    };
    StaticIdentityDirectory {
        users: vec![
            user("u-ada", "Ada Lovelace", "ada@contoso.com"),
            user("u-grace", "Grace Hopper", "grace@contoso.com"),
            user("u-linus", "Linus Torvalds", "linus@contoso.com"),
        ],
        groups: vec![],
        applications: vec![Identity {
            object_id: "a-billing".into(),
            display_name: "Billing Service".into(),
            alias: None,
            application_id: Some("app-123".into()),
        }],
        service_principals: vec![],
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn user(name: &str, alias: &str, keys: &[&str]) -> PrincipalPolicy {
    let mut p = PrincipalPolicy::new(PrincipalType::User, name, alias);
    p.key_permissions = strings(keys);
    p
}

fn ada(keys: &[&str]) -> PrincipalPolicy {
    user("Ada Lovelace", "ada@contoso.com", keys)
}

fn grace(keys: &[&str]) -> PrincipalPolicy {
    user("Grace Hopper", "grace@contoso.com", keys)
}

fn linus(keys: &[&str]) -> PrincipalPolicy {
    user("Linus Torvalds", "linus@contoso.com", keys)
}

fn vault(name: &str, policies: Vec<PrincipalPolicy>) -> VaultRecord {
    VaultRecord {
        vault_name: name.into(),
        resource_group: "rg-secrets".into(),
        subscription_id: "sub-1".into(),
        location: "westeurope".into(),
        tenant_id: "tenant-1".into(),
        policies,
    }
}

fn run(
    desired: &[VaultRecord],
    retrieved: &[VaultRecord],
    vaults: &mut RecordingVaults,
    limits: SafetyLimits,
) -> (Result<vaultsync::policy::ChangeReport>, DiagnosticLog) {
    let mut log = DiagnosticLog::new();
    let result = reconcile(desired, retrieved, vaults, &identities(), limits, &mut log);
    (result, log)
}

const NINE_KEY_PERMISSIONS: &[&str] = &[
    "get", "list", "update", "create", "import", "delete", "recover", "backup", "restore",
];

// ---------------------------------------------------------------------------
// Change counting and the dropped-permission report
// ---------------------------------------------------------------------------

#[test]
fn shrinking_one_policy_reports_dropped_permissions() {
    let retrieved = vec![vault(
        "kv-app",
        vec![ada(NINE_KEY_PERMISSIONS), grace(&["get"])],
    )];
    let desired = vec![vault("kv-app", vec![ada(&["get"]), grace(&["get"])])];

    let mut vaults = RecordingVaults::default();
    let (result, log) = run(&desired, &retrieved, &mut vaults, SafetyLimits::new(5, 2));
    let report = result.unwrap();

    assert_eq!(report.change_count, 1);
    assert_eq!(report.dropped_policies.len(), 1);
    let dropped = &report.dropped_policies[0];
    assert_eq!(dropped.vault_name, "kv-app");
    assert_eq!(dropped.policies.len(), 1);
    assert_eq!(dropped.policies[0].alias, "ada@contoso.com");
    assert_eq!(
        dropped.policies[0].key_permissions,
        strings(&["list", "update", "create", "import", "delete", "recover", "backup", "restore"])
    );
    assert_eq!(report.dropped_permission_count(), 8);

    assert!(log.is_empty());
    assert_eq!(vaults.commits.len(), 1);
    let (name, committed) = &vaults.commits[0];
    assert_eq!(name, "kv-app");
    assert!(committed.iter().all(|p| p.object_id.is_some()));
}

#[test]
fn identical_state_changes_nothing() {
    let state = vec![vault("kv-app", vec![ada(&["get", "list"]), grace(&["get"])])];

    let mut vaults = RecordingVaults::default();
    let (result, log) = run(&state, &state, &mut vaults, SafetyLimits::new(5, 2));
    let report = result.unwrap();

    assert_eq!(report.change_count, 0);
    assert!(report.dropped_policies.is_empty());
    assert!(vaults.commits.is_empty());
    assert!(log.is_empty());
}

#[test]
fn shorthand_equal_to_retrieved_list_is_not_a_change() {
    let retrieved = vec![vault("kv-app", vec![ada(&["get", "list"]), grace(&["get"])])];
    let desired = vec![vault("kv-app", vec![ada(&["read"]), grace(&["get"])])];

    let mut vaults = RecordingVaults::default();
    let (result, _) = run(&desired, &retrieved, &mut vaults, SafetyLimits::new(5, 2));

    assert_eq!(result.unwrap().change_count, 0);
    assert!(vaults.commits.is_empty());
}

#[test]
fn policy_with_two_field_changes_counts_once_and_budget_aborts() {
    let retrieved = vec![
        vault(
            "kv-one",
            vec![ada(&["get"]), grace(&["get"]), linus(&["get"])],
        ),
        vault("kv-two", vec![ada(&["get"]), grace(&["get"])]),
        vault("kv-three", vec![ada(&["get"]), grace(&["get"])]),
    ];

    let mut ada_two_fields = ada(&["get", "list"]);
    ada_two_fields.secret_permissions = strings(&["get"]);
    let desired = vec![
        // Two changes on one policy plus two single changes.
        vault(
            "kv-one",
            vec![ada_two_fields, grace(&["list"]), linus(&["list"])],
        ),
        vault("kv-two", vec![ada(&["list"]), grace(&["list"])]),
        vault("kv-three", vec![ada(&["list"]), grace(&["get"])]),
    ];

    let mut vaults = RecordingVaults::default();
    let (result, log) = run(&desired, &retrieved, &mut vaults, SafetyLimits::new(5, 2));

    match result {
        Err(VaultSyncError::BudgetExceeded { changes, max }) => {
            assert_eq!(changes, 6);
            assert_eq!(max, 5);
        }
        other => panic!("expected BudgetExceeded, got {other:?}"),
    }
    assert!(vaults.commits.is_empty(), "nothing may be committed");
    assert!(log.is_empty());
}

#[test]
fn budget_boundary_is_inclusive() {
    let retrieved = vec![vault("kv-app", vec![ada(&["get"]), grace(&["get"])])];
    let desired = vec![vault("kv-app", vec![ada(&["list"]), grace(&["list"])])];

    let mut vaults = RecordingVaults::default();
    let (result, _) = run(&desired, &retrieved, &mut vaults, SafetyLimits::new(2, 2));

    assert_eq!(result.unwrap().change_count, 2);
    assert_eq!(vaults.commits.len(), 1);
}

// ---------------------------------------------------------------------------
// Fatal validation errors
// ---------------------------------------------------------------------------

#[test]
fn resource_group_drift_names_vault_and_field() {
    let retrieved = vec![vault("kv-app", vec![ada(&["get"]), grace(&["get"])])];
    let mut moved = retrieved[0].clone();
    moved.resource_group = "rg-elsewhere".into();

    let mut vaults = RecordingVaults::default();
    let (result, _) = run(&[moved], &retrieved, &mut vaults, SafetyLimits::new(5, 2));

    match result {
        Err(VaultSyncError::IdentityDrift { vault, field, .. }) => {
            assert_eq!(vault, "kv-app");
            assert_eq!(field, "resourceGroup");
        }
        other => panic!("expected IdentityDrift, got {other:?}"),
    }
    assert!(vaults.commits.is_empty());
}

#[test]
fn removed_vault_is_fatal() {
    let retrieved = vec![
        vault("kv-app", vec![ada(&["get"])]),
        vault("kv-old", vec![ada(&["get"])]),
    ];
    let desired = vec![retrieved[0].clone()];

    let mut vaults = RecordingVaults::default();
    let (result, _) = run(&desired, &retrieved, &mut vaults, SafetyLimits::new(5, 2));

    assert!(matches!(result, Err(VaultSyncError::VaultRemoved { vault }) if vault == "kv-old"));
}

#[test]
fn added_vault_is_fatal() {
    let retrieved = vec![vault("kv-app", vec![ada(&["get"])])];
    let mut desired = retrieved.clone();
    desired.push(vault("kv-new", vec![ada(&["get"])]));

    let mut vaults = RecordingVaults::default();
    let (result, _) = run(&desired, &retrieved, &mut vaults, SafetyLimits::new(5, 2));

    assert!(matches!(result, Err(VaultSyncError::VaultAdded { vault }) if vault == "kv-new"));
}

#[test]
fn duplicate_alias_is_rejected_even_with_different_permissions() {
    let retrieved = vec![vault("kv-app", vec![ada(&["get"]), grace(&["get"])])];
    let mut second_ada = PrincipalPolicy::new(PrincipalType::User, "Ada L.", "ADA@contoso.com");
    second_ada.secret_permissions = strings(&["get"]);
    let desired = vec![vault(
        "kv-app",
        vec![ada(&["get"]), grace(&["get"]), second_ada],
    )];

    let mut vaults = RecordingVaults::default();
    let (result, _) = run(&desired, &retrieved, &mut vaults, SafetyLimits::new(5, 2));

    assert!(matches!(result, Err(VaultSyncError::DuplicatePolicy { .. })));
    assert!(vaults.commits.is_empty());
}

#[test]
fn grammar_error_aborts_before_any_commit() {
    let retrieved = vec![
        vault("kv-a", vec![ada(&["get"]), grace(&["get"])]),
        vault("kv-b", vec![ada(&["get"]), grace(&["get"])]),
    ];
    let desired = vec![
        vault("kv-a", vec![ada(&["list"]), grace(&["get"])]),
        vault("kv-b", vec![ada(&["all", "get"]), grace(&["get"])]),
    ];

    let mut vaults = RecordingVaults::default();
    let (result, _) = run(&desired, &retrieved, &mut vaults, SafetyLimits::new(5, 2));

    match result {
        Err(VaultSyncError::Grammar { vault, principal, .. }) => {
            assert_eq!(vault, "kv-b");
            assert_eq!(principal, "ada@contoso.com");
        }
        other => panic!("expected Grammar, got {other:?}"),
    }
    assert!(vaults.commits.is_empty());
}

// ---------------------------------------------------------------------------
// Non-fatal diagnostics
// ---------------------------------------------------------------------------

#[test]
fn user_without_alias_is_skipped_and_siblings_still_commit() {
    let retrieved = vec![vault("kv-app", vec![ada(&["get"]), grace(&["get"])])];
    let desired = vec![vault(
        "kv-app",
        vec![
            ada(&["get"]),
            grace(&["get"]),
            user("Linus Torvalds", "  ", &["all"]),
        ],
    )];

    let mut vaults = RecordingVaults::default();
    let (result, log) = run(&desired, &retrieved, &mut vaults, SafetyLimits::new(5, 2));

    assert_eq!(result.unwrap().change_count, 1);
    assert_eq!(log.diagnostics().len(), 1);
    match &log.diagnostics()[0] {
        Diagnostic::IdentityResolution {
            vault,
            principal,
            reason,
        } => {
            assert_eq!(vault, "kv-app");
            assert_eq!(principal, "Linus Torvalds");
            assert!(reason.contains("alias is required"));
        }
        other => panic!("expected IdentityResolution, got {other:?}"),
    }

    assert_eq!(vaults.commits.len(), 1);
    let committed: Vec<&str> = vaults.commits[0]
        .1
        .iter()
        .map(|p| p.alias.as_str())
        .collect();
    assert_eq!(committed, ["ada@contoso.com", "grace@contoso.com"]);
}

#[test]
fn vault_with_one_user_is_skipped_and_run_succeeds() {
    let retrieved = vec![
        vault("kv-lonely", vec![ada(&["get"])]),
        vault("kv-team", vec![ada(&["get"]), grace(&["get"])]),
    ];
    let desired = vec![
        vault("kv-lonely", vec![ada(&["list"])]),
        vault("kv-team", vec![ada(&["list"]), grace(&["get"])]),
    ];

    let mut vaults = RecordingVaults::default();
    let (result, log) = run(&desired, &retrieved, &mut vaults, SafetyLimits::new(5, 2));

    assert_eq!(result.unwrap().change_count, 2);
    assert_eq!(
        log.diagnostics(),
        &[Diagnostic::InsufficientUsers {
            vault: "kv-lonely".into(),
            users: 1,
            required: 2,
        }]
    );
    assert_eq!(log.committed(), ["kv-team".to_string()]);
    assert_eq!(vaults.commits.len(), 1);
    assert_eq!(vaults.commits[0].0, "kv-team");
}

#[test]
fn unresolved_user_can_push_vault_below_minimum() {
    let retrieved = vec![vault("kv-app", vec![ada(&["get"]), grace(&["get"])])];
    let desired = vec![vault(
        "kv-app",
        vec![
            ada(&["list"]),
            user("Nobody", "nobody@contoso.com", &["get"]),
        ],
    )];

    let mut vaults = RecordingVaults::default();
    let (result, log) = run(&desired, &retrieved, &mut vaults, SafetyLimits::new(5, 2));

    assert!(result.is_ok());
    let kinds: Vec<&str> = log.diagnostics().iter().map(Diagnostic::kind).collect();
    assert_eq!(kinds, ["unresolved", "skip"]);
    assert!(vaults.commits.is_empty());
}

#[test]
fn unresolved_group_keeps_its_existing_access() {
    let mut ops = PrincipalPolicy::new(PrincipalType::Group, "Platform Ops", "ops");
    ops.key_permissions = strings(&["get", "list"]);
    let mut stored_ops = ops.clone();
    stored_ops.object_id = Some("g-ops".into());

    let retrieved = vec![vault(
        "kv-app",
        vec![ada(&["get"]), grace(&["get"]), stored_ops],
    )];
    let desired = vec![vault("kv-app", vec![ada(&["list"]), grace(&["get"]), ops])];

    let mut vaults = RecordingVaults::default();
    let (result, log) = run(&desired, &retrieved, &mut vaults, SafetyLimits::new(5, 2));

    let report = result.unwrap();
    assert_eq!(report.change_count, 1);
    assert_eq!(report.dropped_permission_count(), 1);

    let kinds: Vec<&str> = log.diagnostics().iter().map(Diagnostic::kind).collect();
    assert_eq!(kinds, ["unresolved"]);

    assert_eq!(vaults.commits.len(), 1);
    let committed = &vaults.commits[0].1;
    let aliases: Vec<&str> = committed.iter().map(|p| p.alias.as_str()).collect();
    assert_eq!(aliases, ["ada@contoso.com", "grace@contoso.com", "ops"]);
    let group = &committed[2];
    assert_eq!(group.object_id.as_deref(), Some("g-ops"));
    assert_eq!(group.key_permissions, strings(&["get", "list"]));
}

#[test]
fn unresolved_user_keeps_retrieved_grants_instead_of_update() {
    let mut nobody = user("Nobody", "nobody@contoso.com", &["get"]);
    nobody.object_id = Some("u-gone".into());
    let retrieved = vec![vault(
        "kv-app",
        vec![ada(&["get"]), grace(&["get"]), nobody],
    )];
    let desired = vec![vault(
        "kv-app",
        vec![
            ada(&["get"]),
            grace(&["get"]),
            user("Nobody", "nobody@contoso.com", &["all"]),
        ],
    )];

    let mut vaults = RecordingVaults::default();
    let (result, log) = run(&desired, &retrieved, &mut vaults, SafetyLimits::new(5, 2));

    assert_eq!(result.unwrap().change_count, 1);
    assert_eq!(log.diagnostics().len(), 1);

    let committed = &vaults.commits[0].1;
    assert_eq!(committed.len(), 3);
    assert_eq!(committed[2].key_permissions, strings(&["get"]));
    assert_eq!(committed[2].object_id.as_deref(), Some("u-gone"));
}

#[test]
fn failed_commit_does_not_stop_other_vaults() {
    let retrieved = vec![
        vault("kv-a", vec![ada(&["get"]), grace(&["get"])]),
        vault("kv-b", vec![ada(&["get"]), grace(&["get"])]),
    ];
    let desired = vec![
        vault("kv-a", vec![ada(&["list"]), grace(&["get"])]),
        vault("kv-b", vec![ada(&["list"]), grace(&["get"])]),
    ];

    let mut vaults = RecordingVaults {
        fail_on: Some("kv-a".into()),
        ..RecordingVaults::default()
    };
    let (result, log) = run(&desired, &retrieved, &mut vaults, SafetyLimits::new(5, 2));

    assert_eq!(result.unwrap().change_count, 2);
    assert_eq!(log.commit_failures(), 1);
    assert_eq!(log.diagnostics()[0].vault(), "kv-a");
    assert_eq!(log.committed(), ["kv-b".to_string()]);
}
