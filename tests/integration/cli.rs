use assert_cmd::Command;
use predicates::prelude::*;

use crate::common::{TestProject, run_wdbuild, site_config, write_site};

#[tokio::test]
async fn test_build_writes_document() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, "{{ greeting }}, {{ config.pageName }}!", "").await.unwrap();

    let output = run_wdbuild(project.path(), &["build"]).unwrap();
    output.assert_success().assert_stderr_contains("page.ftml");

    assert_eq!(project.read_file("dist/page.ftml").await.unwrap(), "Hello, my-page!");
}

#[tokio::test]
async fn test_build_stdout_with_overrides() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, "{{ config.pageName }} {{ edition }}", "").await.unwrap();

    let mut cmd = Command::cargo_bin("wdbuild").unwrap();
    cmd.current_dir(project.path())
        .env("NO_COLOR", "1")
        .args(["build", "--stdout", "--set", "pageName=Start", "--set", "data.edition=7"])
        .assert()
        .success()
        .stdout("Start 7");

    assert!(!project.path().join("dist").exists());
}

#[tokio::test]
async fn test_build_failure_exits_with_one() {
    let project = TestProject::new().await.unwrap();
    project.write_file("wdbuild.toml", "entry = \"page.ftml\"\n").await.unwrap();

    let mut cmd = Command::cargo_bin("wdbuild").unwrap();
    cmd.current_dir(project.path())
        .env("NO_COLOR", "1")
        .arg("build")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration is invalid"))
        .stderr(predicate::str::contains("locale"));
}

#[tokio::test]
async fn test_malformed_override_is_rejected() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, "x", "").await.unwrap();

    let output = run_wdbuild(project.path(), &["build", "--set", "locale"]).unwrap();
    assert!(!output.success);
    output.assert_stderr_contains("KEY=VALUE");
}

#[tokio::test]
async fn test_validate_reports_valid_config() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, "x", "").await.unwrap();

    let output = run_wdbuild(project.path(), &["validate"]).unwrap();
    output.assert_success().assert_stdout_contains("✓ Valid");
}

#[tokio::test]
async fn test_validate_json_lists_violations() {
    let project = TestProject::new().await.unwrap();
    project
        .write_file("site.toml", &site_config("").replace("locale = \"en\"\n", "").replace("\"image\"", "\"imagee\""))
        .await
        .unwrap();

    let output = run_wdbuild(project.path(), &["validate", "site.toml", "--format", "json"]).unwrap();
    assert_eq!(output.code, Some(1));

    let results: serde_json::Value = serde_json::from_str(&output.stdout).unwrap();
    assert_eq!(results["valid"], false);
    assert_eq!(results["errors"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_validate_strict_fails_on_missing_content() {
    let project = TestProject::new().await.unwrap();
    project.write_file("wdbuild.toml", &site_config("")).await.unwrap();

    run_wdbuild(project.path(), &["validate"]).unwrap().assert_success().assert_stdout_contains("Warning");

    let strict = run_wdbuild(project.path(), &["validate", "--strict"]).unwrap();
    assert!(!strict.success);
}
