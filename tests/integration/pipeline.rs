use serde_json::json;
use wdbuild::build::{BuildOrchestrator, BuildRequest};
use wdbuild::core::{BuildError, ErrorKind, FileOperation};

use crate::common::{TestProject, write_site};

async fn build_text(project: &TestProject) -> Result<String, BuildError> {
    let orchestrator = BuildOrchestrator::new();
    let config = orchestrator.load(&project.config_path()).await?;
    orchestrator.try_build(BuildRequest::new(config)).await.map(|output| output.text)
}

/// The documented example renders and lands in the output directory
#[tokio::test]
async fn test_end_to_end_build_writes_document() {
    let project = TestProject::new().await.unwrap();
    project.write_minimal_config().await.unwrap();
    project.write_file("src/page.ftml", "{{ greeting }}, {{ config.pageName }}!").await.unwrap();
    project.write_file("src/partials/.keep", "").await.unwrap();
    project.write_file("strings/en.json", r#"{"greeting": "Hello"}"#).await.unwrap();

    let orchestrator = BuildOrchestrator::new();
    let config = orchestrator.load(&project.config_path()).await.unwrap();
    let path = orchestrator.build_and_write(BuildRequest::new(config)).await.unwrap();

    assert_eq!(path, project.path().join("dist/page.ftml"));
    assert_eq!(project.read_file("dist/page.ftml").await.unwrap(), "Hello, Home!");
}

#[tokio::test]
async fn test_strings_are_available_nested_and_spread() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, "{{ strings.greeting }}/{{ greeting }}", "").await.unwrap();
    project.write_file("strings/en.json", r#"{"greeting": "Hi"}"#).await.unwrap();

    assert_eq!(build_text(&project).await.unwrap(), "Hi/Hi");
}

#[tokio::test]
async fn test_locale_override_selects_strings_file() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, "{{ greeting }}", "").await.unwrap();
    project.write_file("strings/de.json", r#"{"greeting": "Hallo"}"#).await.unwrap();

    let orchestrator = BuildOrchestrator::new();
    let config = orchestrator.load(&project.config_path()).await.unwrap();
    let request = BuildRequest::new(config).with_overrides(json!({ "locale": "de" }));

    assert_eq!(orchestrator.build(request).await.as_deref(), Some("Hallo"));
}

#[tokio::test]
async fn test_data_is_spread_into_the_context() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, "{{ edition }}:{{ config.data.edition }}", "\n[data]\nedition = 3\n").await.unwrap();

    assert_eq!(build_text(&project).await.unwrap(), "3:3");
}

/// Sibling partials each see their own file, and the entry sees itself again afterwards
#[tokio::test]
async fn test_current_file_follows_includes() {
    let project = TestProject::new().await.unwrap();
    write_site(
        &project,
        r#"{% include "a" %}|{% include "b" %}|{{ here(relative=true) }}"#,
        "",
    )
    .await
    .unwrap();
    project.write_file("src/partials/a.ftml", "{{ here(relative=true) }}").await.unwrap();
    project.write_file("src/partials/b.ftml", "{{ here(relative=true) }}").await.unwrap();

    assert_eq!(
        build_text(&project).await.unwrap(),
        "src/partials/a.ftml|src/partials/b.ftml|src/page.ftml"
    );
}

#[tokio::test]
async fn test_entry_imports_macros_from_partials() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, r#"{% import "macros" as m %}{{ m::greet(name=config.pageName) }}"#, "")
        .await
        .unwrap();
    project
        .write_file("src/partials/macros.ftml", "{% macro greet(name) %}Hi {{ name }}{% endmacro greet %}")
        .await
        .unwrap();

    assert_eq!(build_text(&project).await.unwrap(), "Hi my-page");
}

#[tokio::test]
async fn test_missing_entry_is_content_load_error() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, "unused", "").await.unwrap();
    tokio::fs::remove_file(project.path().join("src/page.ftml")).await.unwrap();

    match build_text(&project).await.unwrap_err() {
        BuildError::ContentLoad(file_error) => {
            assert_eq!(file_error.operation, FileOperation::OpenFile);
            assert_eq!(file_error.file_path, project.path().join("src/page.ftml"));
        }
        other => panic!("expected content load error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_strings_file_is_parse_error() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, "{{ greeting }}", "").await.unwrap();
    project.write_file("strings/en.json", "[1, 2]").await.unwrap();

    match build_text(&project).await.unwrap_err() {
        BuildError::ContentLoad(file_error) => assert_eq!(file_error.operation, FileOperation::Parse),
        other => panic!("expected content load error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bad_component_call_is_component_error() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, "{{ img(source=\"logo.png\") }}", "").await.unwrap();

    let error = build_text(&project).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Component);
    assert!(error.to_string().contains("img"));
}

#[tokio::test]
async fn test_template_syntax_error_is_render_error() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, "fine\n{{ broken", "").await.unwrap();

    let error = build_text(&project).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Render);
    assert!(error.to_string().contains("page.ftml"));
}

#[tokio::test]
async fn test_interpolated_output_dir() {
    let project = TestProject::new().await.unwrap();
    project
        .write_file(
            "wdbuild.toml",
            &crate::common::site_config("\n[data]\nedition = 2\n").replace("dir = \"dist\"", "dir = \"dist/{{ edition }}\""),
        )
        .await
        .unwrap();
    project.write_file("src/page.ftml", "v{{ edition }}").await.unwrap();
    project.write_file("src/partials/.keep", "").await.unwrap();
    project.write_file("strings/en.json", "{}").await.unwrap();

    let orchestrator = BuildOrchestrator::new();
    let config = orchestrator.load(&project.config_path()).await.unwrap();
    let output = orchestrator.try_build_and_write(BuildRequest::new(config)).await.unwrap();

    assert_eq!(output.output_path, project.path().join("dist/2/page.ftml"));
    assert_eq!(project.read_file("dist/2/page.ftml").await.unwrap(), "v2");
}
