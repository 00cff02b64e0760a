mod common;

use charter::audit::AuditType;
use charter::governor::{Disposition, GovernOptions, InitOptions, Template};
use charter::ledger::VersionLedger;
use charter::models::{IssueCategory, Severity, ValidationResult};
use charter::safety::{sanitize_log, validate_path, ExecOptions, SecureExecutor, REDACTION_MARKER};
use charter::schema::SchemaStore;
use charter::sync::{Resolution, SyncOptions};
use charter::validator::ValidateOptions;
use charter::AppError;
use common::Project;
use pretty_assertions::assert_eq;
use tokio_test::assert_ok;

// =============================================================================
// VALIDATION
// =============================================================================

#[tokio::test]
async fn test_empty_project_scores_zero() {
    let project = Project::empty();
    let engine = project.engine();

    let result = engine
        .validator
        .validate(project.path(), &ValidateOptions::default())
        .await
        .unwrap();

    assert_eq!(result.score, 0.0);
    assert_eq!(result.grade, "F");
    let missing: Vec<&str> = result
        .issues
        .iter()
        .filter(|i| i.category == IssueCategory::MissingFile && i.severity == Severity::Critical)
        .filter_map(|i| i.file.as_deref())
        .collect();
    assert_eq!(missing, vec!["README.md", "CHANGELOG.md", "PROTOCOL.md"]);
}

#[tokio::test]
async fn test_complete_project_reaches_top_grade() {
    let project = Project::complete();
    let engine = project.engine();

    let result = engine
        .validator
        .validate(project.path(), &ValidateOptions::default())
        .await
        .unwrap();

    assert!(result.score >= 90.0, "score {} issues {:?}", result.score, result.issues);
    assert_eq!(result.grade, "A");
    assert_eq!(result.critical_count(), 0);
    assert!(result.passes(engine.settings.validation.pass_threshold));
}

#[tokio::test]
async fn test_validate_is_idempotent() {
    let project = Project::with_protocol_version("1.0.0");
    project.write("package.json", "{\"version\": \"2.0.0\"}\n");
    let engine = project.engine();

    let first = engine
        .validator
        .validate(project.path(), &ValidateOptions::default())
        .await
        .unwrap();
    let second = engine
        .validator
        .validate(project.path(), &ValidateOptions::default())
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(project.read("package.json"), "{\"version\": \"2.0.0\"}\n");
}

#[tokio::test]
async fn test_fix_appends_missing_required_section() {
    let project = Project::complete();
    project.write("README.md", &common::README.replace("## Usage", "## Running"));
    let engine = project.engine();

    let before = engine
        .validator
        .validate(project.path(), &ValidateOptions::default())
        .await
        .unwrap();
    assert!(before
        .issues
        .iter()
        .any(|i| i.category == IssueCategory::MissingSection && i.auto_fixable));

    let options = ValidateOptions {
        fix: true,
        ..Default::default()
    };
    let after = engine.validator.validate(project.path(), &options).await.unwrap();
    assert_eq!(after.fixed, 1);
    assert!(!after.issues.iter().any(|i| i.category == IssueCategory::MissingSection));
    assert!(project.read("README.md").contains("## Usage"));
    assert!(after.score > before.score);
}

#[tokio::test]
async fn test_report_file_matches_result() {
    let project = Project::complete();
    let engine = project.engine();
    let report = project.path().join("out/report.json");

    let options = ValidateOptions {
        report: Some(report.clone()),
        ..Default::default()
    };
    let result = engine.validator.validate(project.path(), &options).await.unwrap();

    let written: ValidationResult = serde_json::from_str(&std::fs::read_to_string(report).unwrap()).unwrap();
    assert_eq!(written, result);
}

#[tokio::test]
async fn test_missing_project_is_a_setup_error() {
    let project = Project::empty();
    let missing = project.path().join("does-not-exist");
    let engine = project.engine();

    let err = engine
        .validator
        .validate(&missing, &ValidateOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ProjectNotFound(_)));
    assert_eq!(err.exit_code(), 2);
}

// =============================================================================
// SYNCHRONIZATION
// =============================================================================

async fn drifted_project() -> (Project, charter::Engine) {
    let project = Project::with_protocol_version("1.2.0");
    project.write("package.json", "{\n  \"name\": \"demo\",\n  \"version\": \"1.3.0\"\n}\n");
    let engine = project.engine();
    engine.ledger.update_version("protocol", "1.2.0", None).await.unwrap();
    (project, engine)
}

#[tokio::test]
async fn test_sync_without_force_reports_one_conflict() {
    let (project, engine) = drifted_project().await;
    let before = project.read("package.json");

    let result = engine
        .synchronizer
        .sync(project.path(), &SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(result.updated, 0);
    assert_eq!(result.skipped, 1);
    assert_eq!(result.conflicts.len(), 1);
    let conflict = &result.conflicts[0];
    assert_eq!(conflict.file, "package.json");
    assert_eq!(conflict.current, "1.3.0");
    assert_eq!(conflict.target, "1.2.0");
    assert_eq!(conflict.line, Some(3));
    assert_eq!(conflict.resolution, None);
    assert_eq!(result.unresolved(), 1);
    assert_eq!(project.read("package.json"), before);
}

#[tokio::test]
async fn test_forced_preview_writes_nothing() {
    let (project, engine) = drifted_project().await;
    let before = project.read("package.json");

    let options = SyncOptions {
        force: true,
        ..Default::default()
    };
    let result = engine.synchronizer.preview(project.path(), &options).await.unwrap();

    assert!(result.dry_run);
    assert_eq!(result.updated, 0);
    assert_eq!(result.conflicts[0].resolution, Some(Resolution::Update));
    assert_eq!(result.unresolved(), 0);
    assert_eq!(project.read("package.json"), before);
}

#[tokio::test]
async fn test_forced_sync_converges() {
    let (project, engine) = drifted_project().await;
    let options = SyncOptions {
        force: true,
        ..Default::default()
    };

    let first = engine.synchronizer.sync(project.path(), &options).await.unwrap();
    assert_eq!(first.updated, 1);
    assert!(project.read("package.json").contains("\"version\": \"1.2.0\""));
    assert!(project.read("package.json").contains("\"name\": \"demo\""));

    let second = engine.synchronizer.sync(project.path(), &options).await.unwrap();
    assert_eq!(second.updated, 0);
    assert_eq!(second.skipped, 2);
    assert!(second.conflicts.is_empty());
}

#[tokio::test]
async fn test_malformed_token_needs_manual_resolution() {
    let project = Project::complete();
    project.write("package.json", "{\"version\": \"1.0\"}");
    let engine = project.engine();

    let options = SyncOptions {
        force: true,
        ..Default::default()
    };
    let result = engine.synchronizer.sync(project.path(), &options).await.unwrap();
    assert_eq!(result.updated, 0);
    assert_eq!(result.conflicts[0].resolution, Some(Resolution::Manual));
    assert_eq!(project.read("package.json"), "{\"version\": \"1.0\"}");
}

// =============================================================================
// SAFETY
// =============================================================================

#[tokio::test]
async fn test_shell_injection_rejected_before_spawn() {
    let project = Project::empty();
    let executor = SecureExecutor::git_only();

    let err = executor
        .exec("git", &["status; rm -rf /"], ExecOptions::in_dir(project.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ProcessRejected(_)));
    assert_eq!(err.exit_code(), 3);

    let err = executor
        .exec("rm", &["-rf", "/"], ExecOptions::in_dir(project.path()))
        .await
        .unwrap_err();
    assert!(err.is_security());
}

#[test]
fn test_path_containment() {
    let project = Project::empty();
    assert!(validate_path("../../etc/passwd", project.path()).is_err());

    let resolved = assert_ok!(validate_path("sub/file.txt", project.path()));
    assert!(resolved.is_absolute());
    assert!(resolved.starts_with(project.path()));
}

#[test]
fn test_log_redaction() {
    let out = sanitize_log("password=supersecret123");
    assert!(!out.contains("supersecret123"));
    assert!(out.contains(REDACTION_MARKER));
}

// =============================================================================
// STORES
// =============================================================================

#[tokio::test]
async fn test_schema_round_trip() {
    let project = Project::empty();
    let path = project.path().join("schema.json");
    let builtin = SchemaStore::builtin().unwrap();

    assert_ok!(SchemaStore::new(&path).save(&builtin).await);
    let loaded = SchemaStore::new(&path).load().await.unwrap();
    assert_eq!(*loaded, builtin);
}

#[tokio::test]
async fn test_invalid_schema_is_rejected_on_save() {
    let project = Project::empty();
    let path = project.path().join("schema.json");
    let mut schema = SchemaStore::builtin().unwrap();
    schema.scoring_categories.insert("quality".to_string(), 50);

    let err = SchemaStore::new(&path).save(&schema).await.unwrap_err();
    assert!(matches!(err, AppError::SchemaInvalid(_)));
    assert!(!path.exists());
}

#[tokio::test]
async fn test_ledger_bump_persists() {
    let project = Project::empty();
    let path = project.path().join("versions.json");
    let ledger = VersionLedger::with_builtin_fallback(&path);

    let entry = ledger.update_version("protocol", "1.1.0", None).await.unwrap();
    assert_eq!(entry.previous.as_deref(), Some("1.0.0"));

    let reloaded = VersionLedger::new(&path);
    assert_eq!(reloaded.get_version("protocol").await.unwrap().as_deref(), Some("1.1.0"));
    assert!(matches!(
        reloaded.update_version("protocol", "1.1", None).await.unwrap_err(),
        AppError::VersionFormat(_)
    ));
}

// =============================================================================
// GOVERNANCE
// =============================================================================

fn drifted_complete_project() -> Project {
    let project = Project::complete();
    project.write("package.json", "{\"version\": \"1.3.0\"}\n");
    project
}

#[tokio::test]
async fn test_high_drift_blocks_only_in_strict_mode() {
    let project = drifted_complete_project();
    let engine = project.engine();

    let lenient = engine
        .governor
        .check_compliance(project.path(), &GovernOptions::default())
        .await
        .unwrap();
    assert!(lenient.compliant);

    let strict = GovernOptions {
        strict: true,
        ..Default::default()
    };
    let report = engine.governor.check_compliance(project.path(), &strict).await.unwrap();
    assert!(!report.compliant);
}

#[tokio::test]
async fn test_missing_policy_section_blocks_without_strict() {
    let project = Project::complete();
    project.write("PROTOCOL.md", &common::protocol("1.0.0").replace("## Rollback", "## Recovery"));
    let engine = project.engine();

    let report = engine
        .governor
        .check_compliance(project.path(), &GovernOptions::default())
        .await
        .unwrap();
    assert!(!report.compliant);
    let blocking: Vec<_> = report.violations.iter().filter(|v| v.blocking).collect();
    assert_eq!(blocking.len(), 1);
    assert_eq!(blocking[0].issue.category, IssueCategory::MissingSection);
    assert_eq!(blocking[0].issue.severity, Severity::Critical);
}

#[tokio::test]
async fn test_emergency_bypass_with_approval() {
    let project = drifted_complete_project();
    let engine = project.engine();

    let options = GovernOptions {
        strict: true,
        approvals: vec!["incident-commander".to_string()],
        ..Default::default()
    };
    let report = engine.governor.check_compliance(project.path(), &options).await.unwrap();

    assert!(report.compliant);
    let bypassed: Vec<_> = report
        .violations
        .iter()
        .filter(|v| v.disposition == Disposition::Bypassed)
        .collect();
    assert_eq!(bypassed.len(), 1);
    assert_eq!(bypassed[0].issue.severity, Severity::Info);
    assert_eq!(bypassed[0].original_severity, Some(Severity::High));
}

#[tokio::test]
async fn test_auto_fix_then_compliant() {
    let project = Project::empty();
    let engine = project.engine();

    let options = GovernOptions {
        auto_fix: true,
        ..Default::default()
    };
    let report = engine.governor.check_compliance(project.path(), &options).await.unwrap();
    assert!(report.fixed >= 3);
    assert!(report.compliant);
    assert!(project.exists("README.md"));
    assert!(project.read("PROTOCOL.md").contains("Version: 1.0.0"));
}

#[tokio::test]
async fn test_standard_init_uses_local_schema() {
    let project = Project::empty();
    let report = project
        .engine()
        .governor
        .init(
            project.path(),
            &InitOptions {
                template: Template::Standard,
                force: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(report.created.len(), 5);
    assert!(project.exists(".charter/schema.json"));

    // fresh engine reads the scaffolded files instead of the built-ins
    let status = project.engine().governor.get_status(project.path()).await.unwrap();
    assert_eq!(status.schema_name, "operating-protocol");
    assert_eq!(status.protocol_version.as_deref(), Some("1.0.0"));
    assert_eq!(status.pending_sync, 0);
}

#[tokio::test]
async fn test_security_audit_never_leaks_secrets() {
    let project = Project::complete();
    project.write(".env", "DB_PASSWORD=hunter2hunter2\n");
    let engine = project.engine();

    let result = engine
        .governor
        .audit(project.path(), AuditType::Security)
        .await
        .unwrap();
    let exposure = result
        .categories
        .iter()
        .find(|c| c.name == "secret_exposure")
        .unwrap();
    assert!(exposure.score < 100.0);

    let persisted = project.read(".charter/audit.json");
    assert!(!persisted.contains("hunter2hunter2"));

    let status = engine.governor.get_status(project.path()).await.unwrap();
    assert_eq!(status.last_audit.map(|a| a.id), Some(result.id));
}
