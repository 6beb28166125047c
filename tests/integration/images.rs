use wdbuild::build::{BuildOrchestrator, BuildOutput, BuildRequest};
use wdbuild::core::BuildError;

use crate::common::{PNG_BYTES, TestProject, site_config, write_bytes, write_site};

const BASE_URL: &str = "http://my-wiki.wikidot.com/local--files/my-page/";

async fn build(project: &TestProject) -> Result<BuildOutput, BuildError> {
    let orchestrator = BuildOrchestrator::new();
    let config = orchestrator.load(&project.config_path()).await?;
    orchestrator.try_build(BuildRequest::new(config)).await
}

async fn dist_entries(project: &TestProject) -> Vec<String> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(project.path().join("dist")).await.unwrap();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        names.push(entry.file_name().to_string_lossy().to_string());
    }
    names.sort();
    names
}

#[tokio::test]
async fn test_same_image_registered_twice_is_copied_once() {
    let project = TestProject::new().await.unwrap();
    write_site(
        &project,
        r#"{{ img(src="images/logo.png") }}|{{ img(src="./images/../images/logo.png") }}"#,
        "",
    )
    .await
    .unwrap();
    write_bytes(&project, "src/images/logo.png", PNG_BYTES).await.unwrap();

    let output = build(&project).await.unwrap();

    let expected = format!("{BASE_URL}logo.png");
    assert_eq!(output.text, format!("{expected}|{expected}"));
    assert_eq!(dist_entries(&project).await, vec!["logo.png"]);
}

#[tokio::test]
async fn test_same_file_name_gets_suffix() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, r#"{{ img(src="a/logo.png") }} {{ img(src="b/logo.png") }}"#, "").await.unwrap();
    write_bytes(&project, "src/a/logo.png", PNG_BYTES).await.unwrap();
    write_bytes(&project, "src/b/logo.png", b"second").await.unwrap();

    let output = build(&project).await.unwrap();

    assert_eq!(output.text, format!("{BASE_URL}logo.png {BASE_URL}logo_1.png"));
    assert_eq!(dist_entries(&project).await, vec!["logo.png", "logo_1.png"]);
    let renamed = tokio::fs::read(project.path().join("dist/logo_1.png")).await.unwrap();
    assert_eq!(renamed, b"second");
}

/// Paths in a partial resolve against the partial's directory
#[tokio::test]
async fn test_partial_images_resolve_against_partial_dir() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, r#"{% include "figure" %}"#, "").await.unwrap();
    project.write_file("src/partials/figure.ftml", r#"{{ img(src="../images/chart.png") }}"#).await.unwrap();
    write_bytes(&project, "src/images/chart.png", PNG_BYTES).await.unwrap();

    let output = build(&project).await.unwrap();

    assert_eq!(output.text, format!("{BASE_URL}chart.png"));
    assert!(project.path().join("dist/chart.png").exists());
}

#[tokio::test]
async fn test_failed_copy_does_not_stop_the_others() {
    let project = TestProject::new().await.unwrap();
    write_site(
        &project,
        r#"{{ img(src="one.png") }} {{ img(src="missing.png") }} {{ img(src="three.png") }}"#,
        "",
    )
    .await
    .unwrap();
    write_bytes(&project, "src/one.png", PNG_BYTES).await.unwrap();
    write_bytes(&project, "src/three.png", PNG_BYTES).await.unwrap();

    let orchestrator = BuildOrchestrator::new();
    let config = orchestrator.load(&project.config_path()).await.unwrap();
    let output = orchestrator.try_build_and_write(BuildRequest::new(config)).await.unwrap();

    assert_eq!(
        project.read_file("dist/page.ftml").await.unwrap(),
        format!("{BASE_URL}one.png {BASE_URL}missing.png {BASE_URL}three.png")
    );
    assert_eq!(output.resource_failures.len(), 1);
    assert_eq!(output.resource_failures[0].service, "images");
    assert!(output.resource_failures[0].input.ends_with("missing.png"));
    assert_eq!(output.resource_failures[0].output, project.path().join("dist/missing.png"));
    assert_eq!(dist_entries(&project).await, vec!["one.png", "page.ftml", "three.png"]);
}

#[tokio::test]
async fn test_images_need_wiki_settings() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, r#"{{ img(src="logo.png") }}"#, "").await.unwrap();
    project
        .write_file("wdbuild.toml", &site_config("").replace("wikiName = \"my-wiki\"\n", ""))
        .await
        .unwrap();
    write_bytes(&project, "src/logo.png", PNG_BYTES).await.unwrap();

    match build(&project).await.unwrap_err() {
        BuildError::Service {
            service,
            hint,
            ..
        } => {
            assert_eq!(service, "images");
            assert!(hint.is_some());
        }
        other => panic!("expected service error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_image_service_is_described_to_templates() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, "{{ services.images.baseUrl }}", "").await.unwrap();

    let output = build(&project).await.unwrap();
    assert_eq!(output.text, BASE_URL);
}
