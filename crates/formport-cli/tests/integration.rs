#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn formport(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("formport").unwrap();
    cmd.current_dir(dir.path()).env("FORMPORT_ROOT", dir.path());
    cmd
}

fn write(dir: &TempDir, rel: &str, content: &str) {
    let path = dir.path().join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn read(dir: &TempDir, rel: &str) -> String {
    std::fs::read_to_string(dir.path().join(rel)).unwrap()
}

fn manifest_json(dir: &TempDir) -> serde_json::Value {
    serde_json::from_str(&read(dir, "output/Vendor/conversion-status.json")).unwrap()
}

fn step<'a>(manifest: &'a serde_json::Value, name: &str) -> &'a serde_json::Value {
    manifest["steps"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["step"] == name)
        .unwrap()
}

/// Lines in calls.txt, one per backend invocation the stub script served.
fn backend_calls(dir: &TempDir) -> usize {
    match std::fs::read_to_string(dir.path().join("calls.txt")) {
        Ok(s) => s.lines().count(),
        Err(_) => 0,
    }
}

const FORM_CODE_VB: &str = r#"Public Class frmVendor
    Private Sub btnSave_Click(sender As Object, e As EventArgs) Handles btnSave.Click
        SaveVendor(txtName.Text)
    End Sub
End Class
"#;

const FORM_DESIGNER_VB: &str = r#"Partial Class frmVendor
    Inherits System.Windows.Forms.Form

    Private Sub InitializeComponent()
        Me.txtName = New System.Windows.Forms.TextBox()
        Me.btnSave = New System.Windows.Forms.Button()
    End Sub
End Class
"#;

const CONFIG_JSON: &str = r#"{
  "backend": {
    "type": "command",
    "argv": ["sh", "backend.sh"],
    "timeout_seconds": 60
  }
}
"#;

/// Offline stand-in for the generation backend. Answers per step via
/// FORMPORT_STEP, counts invocations in calls.txt, and fails analyze_data
/// while break.marker exists so retry paths can be driven.
const BACKEND_SCRIPT: &str = r#"#!/bin/sh
cat > /dev/null
echo x >> calls.txt
if [ "$FORMPORT_STEP" = "analyze_data" ] && [ -f break.marker ]; then
  echo "transient backend outage" >&2
  exit 1
fi
case "$FORMPORT_STEP" in
  analyze_form)
    printf '%s\n' '{"schema_version":1,"form_name":"frmVendor","entity":"Vendor"}'
    ;;
  analyze_data)
    printf '%s\n' '{"schema_version":1,"entity":"Vendor","tables":["Vendors"]}'
    ;;
  generate_model)
    printf '%s\n' 'namespace Legacy.Shared.Models;' '' 'public class Vendor' '{' '    public int Id { get; set; }' '    public string Name { get; set; }' '}'
    ;;
  generate_controller)
    printf '%s\n' 'namespace Legacy.Api.Controllers;' '' 'public class VendorController' '{' '    public string Index() { return "vendors"; }' '}'
    ;;
  generate_views)
    printf '%s\n' '<h1>Vendor</h1>'
    ;;
  write_summary)
    printf '%s\n' '# Vendor conversion'
    ;;
  *)
    echo "unknown step: $FORMPORT_STEP" >&2
    exit 1
    ;;
esac
"#;

fn scaffold_project(dir: &TempDir) {
    formport(dir).arg("init").assert().success();
    write(dir, "formport.json", CONFIG_JSON);
    write(dir, "backend.sh", BACKEND_SCRIPT);
    write(dir, "legacy/frmVendor.vb", FORM_CODE_VB);
    write(dir, "legacy/frmVendor.Designer.vb", FORM_DESIGNER_VB);
}

fn convert_vendor(dir: &TempDir) {
    formport(dir)
        .args(["run", "--entity", "Vendor"])
        .assert()
        .success();
}

// ---------------------------------------------------------------------------
// formport init
// ---------------------------------------------------------------------------

#[test]
fn init_scaffolds_config_and_directories() {
    let dir = TempDir::new().unwrap();
    formport(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created: formport.json"));

    assert!(dir.path().join("formport.json").is_file());
    assert!(dir.path().join("legacy").is_dir());
    assert!(dir.path().join("output").is_dir());
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    formport(&dir).arg("init").assert().success();
    formport(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:  formport.json"));
}

#[test]
fn init_honours_custom_roots_in_an_existing_config() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "formport.json",
        r#"{"source_root": "vb6", "output_root": "converted"}"#,
    );
    formport(&dir).arg("init").assert().success();

    assert!(dir.path().join("vb6").is_dir());
    assert!(dir.path().join("converted").is_dir());
}

// ---------------------------------------------------------------------------
// formport steps
// ---------------------------------------------------------------------------

#[test]
fn steps_lists_the_pipeline_in_order() {
    let dir = TempDir::new().unwrap();
    formport(&dir)
        .arg("steps")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze_form"))
        .stdout(predicate::str::contains("generate_controller"))
        .stdout(predicate::str::contains("generated/Models/{entity}.cs"));
}

#[test]
fn steps_json_is_a_six_row_array() {
    let dir = TempDir::new().unwrap();
    let output = formport(&dir).args(["steps", "--json"]).assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let rows: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0]["step"], "analyze_form");
    assert_eq!(rows[5]["step"], "write_summary");
}

// ---------------------------------------------------------------------------
// formport run
// ---------------------------------------------------------------------------

#[test]
fn full_run_produces_every_artifact() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);

    formport(&dir)
        .args(["run", "--entity", "Vendor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("6 attempted, 6 succeeded"))
        .stdout(predicate::str::contains("Conversion complete."));

    assert_eq!(backend_calls(&dir), 6);
    for artifact in [
        "output/Vendor/analysis/form-analysis.json",
        "output/Vendor/analysis/data-access.json",
        "output/Vendor/generated/Models/Vendor.cs",
        "output/Vendor/generated/Controllers/VendorController.cs",
        "output/Vendor/generated/Views/Vendor/Index.cshtml",
        "output/Vendor/generated/CONVERSION.md",
    ] {
        assert!(dir.path().join(artifact).is_file(), "missing {artifact}");
    }

    let manifest = manifest_json(&dir);
    assert_eq!(manifest["run_state"], "completed");
    assert_eq!(manifest["form_name"], "frmVendor");
}

#[test]
fn resume_after_success_calls_no_backend() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);
    convert_vendor(&dir);
    std::fs::remove_file(dir.path().join("calls.txt")).unwrap();

    formport(&dir)
        .args(["run", "--entity", "Vendor", "--resume"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 attempted"));

    assert_eq!(backend_calls(&dir), 0);
}

#[test]
fn skipped_steps_are_recorded_and_dependents_fail() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);

    formport(&dir)
        .args([
            "run",
            "--entity",
            "Vendor",
            "--skip-steps",
            "analyze_data,generate_views",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("(skipped)"))
        .stderr(predicate::str::contains("step(s) failed"));

    // Only the two steps with intact inputs reached the backend
    assert_eq!(backend_calls(&dir), 2);

    let manifest = manifest_json(&dir);
    assert_eq!(manifest["run_state"], "completed_with_failures");
    assert_eq!(step(&manifest, "analyze_form")["state"], "succeeded");
    assert_eq!(step(&manifest, "analyze_data")["state"], "succeeded");
    assert_eq!(step(&manifest, "analyze_data")["skipped"], true);
    assert_eq!(step(&manifest, "generate_model")["state"], "succeeded");
    assert_eq!(step(&manifest, "generate_controller")["state"], "failed");
    assert_eq!(
        step(&manifest, "generate_controller")["error_kind"],
        "missing_dependency"
    );
    assert_eq!(step(&manifest, "generate_views")["skipped"], true);
    assert_eq!(step(&manifest, "write_summary")["state"], "failed");
}

#[test]
fn rerun_failed_retries_only_what_failed() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);
    write(&dir, "break.marker", "");

    formport(&dir)
        .args(["run", "--entity", "Vendor"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("step(s) failed"));

    let manifest = manifest_json(&dir);
    assert_eq!(
        step(&manifest, "analyze_data")["error_kind"],
        "backend_failure"
    );
    assert_eq!(
        step(&manifest, "generate_controller")["error_kind"],
        "missing_dependency"
    );

    // Fix the backend and retry failures only: analyze_data,
    // generate_controller and write_summary, nothing else
    std::fs::remove_file(dir.path().join("break.marker")).unwrap();
    std::fs::remove_file(dir.path().join("calls.txt")).unwrap();

    formport(&dir)
        .args(["run", "--entity", "Vendor", "--rerun-failed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 attempted, 3 succeeded"));

    assert_eq!(backend_calls(&dir), 3);
    assert_eq!(manifest_json(&dir)["run_state"], "completed");
}

#[test]
fn dry_run_plans_without_touching_anything() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);

    formport(&dir)
        .args(["run", "--entity", "Vendor", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Plan for 'Vendor'"))
        .stdout(predicate::str::contains("analyze_form"));

    assert_eq!(backend_calls(&dir), 0);
    assert!(!dir.path().join("output/Vendor").exists());
}

#[test]
fn form_name_flag_resolves_the_entity() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);

    formport(&dir)
        .args(["run", "--form-name", "frmVendor"])
        .assert()
        .success();

    let manifest = manifest_json(&dir);
    assert_eq!(manifest["entity"], "Vendor");
    assert_eq!(manifest["form_name"], "frmVendor");
}

#[test]
fn run_without_legacy_sources_fails_without_backend_calls() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);

    formport(&dir)
        .args(["run", "--entity", "Ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("step(s) failed"));

    assert_eq!(backend_calls(&dir), 0);
}

#[test]
fn run_rejects_an_invalid_entity_name() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);

    formport(&dir)
        .args(["run", "--entity", "Bad Name"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid entity name"));
}

#[test]
fn resume_and_rerun_failed_are_mutually_exclusive() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);

    formport(&dir)
        .args(["run", "--entity", "Vendor", "--resume", "--rerun-failed"])
        .assert()
        .code(2);
}

#[test]
fn run_without_an_entity_fails_when_not_interactive() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);

    formport(&dir)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no entity given"));
}

#[test]
fn trailing_arguments_warn_but_do_not_block() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);

    formport(&dir)
        .args(["run", "--entity", "Vendor", "--dry-run", "leftover"])
        .assert()
        .success()
        .stderr(predicate::str::contains("ignoring unrecognised arguments"));
}

#[test]
fn config_flag_swaps_the_output_root() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);
    write(
        &dir,
        "alt.json",
        r#"{
  "output_root": "converted",
  "backend": {"type": "command", "argv": ["sh", "backend.sh"], "timeout_seconds": 60}
}"#,
    );

    formport(&dir)
        .args(["run", "--entity", "Vendor", "--config", "alt.json"])
        .assert()
        .success();

    assert!(dir
        .path()
        .join("converted/Vendor/conversion-status.json")
        .is_file());
    assert!(!dir.path().join("output/Vendor").exists());
}

#[test]
fn missing_explicit_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);

    formport(&dir)
        .args(["run", "--entity", "Vendor", "--config", "nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

// ---------------------------------------------------------------------------
// formport status
// ---------------------------------------------------------------------------

#[test]
fn status_before_any_run_reports_nothing() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);

    formport(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No conversions yet"));

    formport(&dir)
        .args(["status", "--entity", "Vendor"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no conversion state for 'Vendor'"));
}

#[test]
fn status_summarises_conversions_after_a_run() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);
    convert_vendor(&dir);

    formport(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Vendor"))
        .stdout(predicate::str::contains("completed"))
        .stdout(predicate::str::contains("6/6"));

    formport(&dir)
        .args(["status", "--entity", "Vendor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Run state: completed"))
        .stdout(predicate::str::contains("write_summary"));
}

#[test]
fn status_json_is_the_manifest() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);
    convert_vendor(&dir);

    let output = formport(&dir)
        .args(["status", "--entity", "Vendor", "--json"])
        .assert()
        .success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let manifest: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(manifest["entity"], "Vendor");
    assert_eq!(manifest["run_state"], "completed");
    assert_eq!(manifest["steps"].as_array().unwrap().len(), 6);
}

#[test]
fn status_survives_a_corrupt_manifest() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);
    convert_vendor(&dir);
    write(&dir, "output/Broken/conversion-status.json", "not json");

    formport(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Vendor"))
        .stderr(predicate::str::contains("skipping unreadable"));
}

// ---------------------------------------------------------------------------
// formport deploy
// ---------------------------------------------------------------------------

#[test]
fn deploy_places_generated_files_in_their_projects() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);
    convert_vendor(&dir);

    formport(&dir)
        .args(["deploy", "--entity", "Vendor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 copied"))
        .stdout(predicate::str::contains("1 unmapped"));

    assert!(dir.path().join("shared/Models/Vendor.cs").is_file());
    assert!(dir
        .path()
        .join("api/Controllers/VendorController.cs")
        .is_file());
    assert!(dir.path().join("ui/Views/Vendor/Index.cshtml").is_file());
}

#[test]
fn deploy_dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);
    convert_vendor(&dir);

    formport(&dir)
        .args(["deploy", "--entity", "Vendor", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("would copy"))
        .stdout(predicate::str::contains("(dry run)"));

    assert!(!dir.path().join("shared").exists());
}

#[test]
fn deploy_never_overwrites_existing_targets() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);
    convert_vendor(&dir);
    write(&dir, "shared/Models/Vendor.cs", "// locally maintained\n");

    formport(&dir)
        .args(["deploy", "--entity", "Vendor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("exists"));

    assert_eq!(read(&dir, "shared/Models/Vendor.cs"), "// locally maintained\n");
}

#[test]
fn deploy_before_a_run_is_an_error() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);

    formport(&dir)
        .args(["deploy", "--entity", "Vendor"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("run the pipeline first"));
}

// ---------------------------------------------------------------------------
// formport merge
// ---------------------------------------------------------------------------

const REGENERATED_WITH_PHONE: &str = r#"namespace Legacy.Shared.Models;

public class Vendor
{
    public int Id { get; set; }
    public string Name { get; set; }
    public string Phone { get; set; }
}
"#;

const DEPLOYED_WITH_NOTES: &str = r#"namespace Legacy.Shared.Models;

public class Vendor
{
    public int Id { get; set; }
    public string Name { get; set; }
    public string Notes { get; set; }
}
"#;

const REGENERATED_WITH_CHANGED_NAME: &str = r#"namespace Legacy.Shared.Models;

public class Vendor
{
    public int Id { get; set; }
    public string Name { get; set; } = string.Empty;
}
"#;

#[test]
fn merge_auto_adds_new_members_and_keeps_local_edits() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);
    convert_vendor(&dir);
    formport(&dir)
        .args(["deploy", "--entity", "Vendor"])
        .assert()
        .success();

    // The target grew a hand-written member; the next generation pass
    // produced a new one of its own
    write(&dir, "shared/Models/Vendor.cs", DEPLOYED_WITH_NOTES);
    write(
        &dir,
        "output/Vendor/generated/Models/Vendor.cs",
        REGENERATED_WITH_PHONE,
    );

    formport(&dir)
        .args([
            "merge",
            "--entity",
            "Vendor",
            "--mode",
            "auto",
            "--conflict-strategy",
            "keep-existing",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("merged (1 added, 0 replaced, 0 usings)"))
        .stdout(predicate::str::contains("identical"));

    let merged = read(&dir, "shared/Models/Vendor.cs");
    assert!(merged.contains("Phone"), "new member missing:\n{merged}");
    assert!(merged.contains("Notes"), "local member lost:\n{merged}");

    let backup = read(&dir, "shared/Models/Vendor.cs.backup");
    assert_eq!(backup, DEPLOYED_WITH_NOTES);
}

#[test]
fn merge_auto_use_generated_replaces_changed_members() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);
    convert_vendor(&dir);
    formport(&dir)
        .args(["deploy", "--entity", "Vendor"])
        .assert()
        .success();
    write(
        &dir,
        "output/Vendor/generated/Models/Vendor.cs",
        REGENERATED_WITH_CHANGED_NAME,
    );

    formport(&dir)
        .args([
            "merge",
            "--entity",
            "Vendor",
            "--mode",
            "auto",
            "--conflict-strategy",
            "use-generated",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("merged (0 added, 1 replaced, 0 usings)"));

    assert!(read(&dir, "shared/Models/Vendor.cs").contains("string.Empty"));
}

#[test]
fn merge_auto_keep_existing_declines_changed_members() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);
    convert_vendor(&dir);
    formport(&dir)
        .args(["deploy", "--entity", "Vendor"])
        .assert()
        .success();
    let deployed = read(&dir, "shared/Models/Vendor.cs");
    write(
        &dir,
        "output/Vendor/generated/Models/Vendor.cs",
        REGENERATED_WITH_CHANGED_NAME,
    );

    formport(&dir)
        .args([
            "merge",
            "--entity",
            "Vendor",
            "--mode",
            "auto",
            "--conflict-strategy",
            "keep-existing",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("kept existing"));

    assert_eq!(read(&dir, "shared/Models/Vendor.cs"), deployed);
    assert!(!dir.path().join("shared/Models/Vendor.cs.backup").exists());
}

#[test]
fn merge_dry_run_only_reports() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);
    convert_vendor(&dir);
    formport(&dir)
        .args(["deploy", "--entity", "Vendor"])
        .assert()
        .success();
    write(
        &dir,
        "output/Vendor/generated/Models/Vendor.cs",
        REGENERATED_WITH_PHONE,
    );

    formport(&dir)
        .args(["merge", "--entity", "Vendor", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("would merge (1 added, 0 replaced, 0 usings)"));

    assert!(!read(&dir, "shared/Models/Vendor.cs").contains("Phone"));
    assert!(!dir.path().join("shared/Models/Vendor.cs.backup").exists());
}

#[test]
fn merge_before_a_run_is_an_error() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);

    formport(&dir)
        .args([
            "merge",
            "--entity",
            "Vendor",
            "--mode",
            "auto",
            "--conflict-strategy",
            "keep-existing",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("run the pipeline first"));
}

#[test]
fn merge_rejects_auto_mode_with_prompt_strategy() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);
    convert_vendor(&dir);

    formport(&dir)
        .args(["merge", "--entity", "Vendor", "--mode", "auto"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn merge_rejects_an_unknown_mode() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);

    formport(&dir)
        .args(["merge", "--entity", "Vendor", "--mode", "zen"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid mode 'zen'"));
}

// ---------------------------------------------------------------------------
// formport rollback
// ---------------------------------------------------------------------------

#[test]
fn rollback_restores_the_premerge_bytes() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);
    convert_vendor(&dir);
    formport(&dir)
        .args(["deploy", "--entity", "Vendor"])
        .assert()
        .success();
    write(&dir, "shared/Models/Vendor.cs", DEPLOYED_WITH_NOTES);
    write(
        &dir,
        "output/Vendor/generated/Models/Vendor.cs",
        REGENERATED_WITH_PHONE,
    );
    formport(&dir)
        .args([
            "merge",
            "--entity",
            "Vendor",
            "--mode",
            "auto",
            "--conflict-strategy",
            "keep-existing",
        ])
        .assert()
        .success();

    formport(&dir)
        .args(["rollback", "--entity", "Vendor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("restored: shared/Models/Vendor.cs"));

    assert_eq!(read(&dir, "shared/Models/Vendor.cs"), DEPLOYED_WITH_NOTES);
    assert!(!dir.path().join("shared/Models/Vendor.cs.backup").exists());
}

#[test]
fn rollback_dry_run_leaves_the_merge_in_place() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);
    convert_vendor(&dir);
    formport(&dir)
        .args(["deploy", "--entity", "Vendor"])
        .assert()
        .success();
    write(
        &dir,
        "output/Vendor/generated/Models/Vendor.cs",
        REGENERATED_WITH_PHONE,
    );
    formport(&dir)
        .args([
            "merge",
            "--entity",
            "Vendor",
            "--mode",
            "auto",
            "--conflict-strategy",
            "keep-existing",
        ])
        .assert()
        .success();

    formport(&dir)
        .args(["rollback", "--entity", "Vendor", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("would restore"));

    assert!(read(&dir, "shared/Models/Vendor.cs").contains("Phone"));
    assert!(dir.path().join("shared/Models/Vendor.cs.backup").is_file());
}

#[test]
fn rollback_without_backups_says_so() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);

    formport(&dir)
        .args(["rollback", "--entity", "Vendor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No backups found for 'Vendor'"));
}

// ---------------------------------------------------------------------------
// Root detection
// ---------------------------------------------------------------------------

#[test]
fn root_is_detected_from_a_subdirectory() {
    let dir = TempDir::new().unwrap();
    scaffold_project(&dir);

    let mut cmd = Command::cargo_bin("formport").unwrap();
    cmd.current_dir(dir.path().join("legacy"))
        .env_remove("FORMPORT_ROOT");
    cmd.arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No conversions yet"));
}
