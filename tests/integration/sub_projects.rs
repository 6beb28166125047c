use wdbuild::build::{BuildOrchestrator, BuildRequest};
use wdbuild::core::ErrorKind;

use crate::common::{TestProject, site_config, write_site};

async fn write_sub_site(project: &TestProject, dir: &str, page: &str, extra: &str) {
    project.write_file(format!("{dir}/wdbuild.toml"), &site_config(extra)).await.unwrap();
    project.write_file(format!("{dir}/src/page.ftml"), page).await.unwrap();
    project.write_file(format!("{dir}/src/partials/.keep"), "").await.unwrap();
    project.write_file(format!("{dir}/strings/en.json"), "{}").await.unwrap();
}

#[tokio::test]
async fn test_sub_project_data_is_exposed_under_its_key() {
    let project = TestProject::new().await.unwrap();
    write_site(
        &project,
        "{{ appendix.title }} / {{ glossary.terms | length }}",
        "\n[subProjects]\nappendix = \"appendix/wdbuild.toml\"\nglossary = \"glossary/wdbuild.toml\"\n",
    )
    .await
    .unwrap();
    write_sub_site(&project, "appendix", "A", "\n[data]\ntitle = \"Appendix\"\n").await;
    write_sub_site(&project, "glossary", "G", "\n[data]\nterms = [\"a\", \"b\", \"c\"]\n").await;

    let orchestrator = BuildOrchestrator::new();
    let config = orchestrator.load(&project.config_path()).await.unwrap();
    let output = orchestrator.try_build(BuildRequest::new(config)).await.unwrap();

    assert_eq!(output.text, "Appendix / 3");
    assert_eq!(output.sub_projects["appendix"].text, "A");
    assert_eq!(output.sub_projects["glossary"].text, "G");
}

/// Only direct sub-projects reach the parent's context
#[tokio::test]
async fn test_nested_sub_project_data_stays_with_its_parent() {
    let project = TestProject::new().await.unwrap();
    write_site(
        &project,
        "{{ middle.depth }}:{% if inner is defined %}leaked{% else %}hidden{% endif %}",
        "\n[subProjects]\nmiddle = \"middle/wdbuild.toml\"\n",
    )
    .await
    .unwrap();
    write_sub_site(
        &project,
        "middle",
        "{{ inner.depth }}",
        "\n[subProjects]\ninner = \"../inner/wdbuild.toml\"\n\n[data]\ndepth = 1\n",
    )
    .await;
    write_sub_site(&project, "inner", "leaf", "\n[data]\ndepth = 2\n").await;

    let orchestrator = BuildOrchestrator::new();
    let config = orchestrator.load(&project.config_path()).await.unwrap();
    let output = orchestrator.try_build(BuildRequest::new(config)).await.unwrap();

    assert_eq!(output.text, "1:hidden");
    assert_eq!(output.sub_projects["middle"].text, "2");
    assert_eq!(output.documents().len(), 3);
}

#[tokio::test]
async fn test_sub_project_documents_are_written() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, "root", "\n[subProjects]\nappendix = \"appendix/wdbuild.toml\"\n").await.unwrap();
    write_sub_site(&project, "appendix", "appendix body", "").await;

    let orchestrator = BuildOrchestrator::new();
    let config = orchestrator.load(&project.config_path()).await.unwrap();
    orchestrator.try_build_and_write(BuildRequest::new(config)).await.unwrap();

    assert_eq!(project.read_file("dist/page.ftml").await.unwrap(), "root");
    assert_eq!(project.read_file("appendix/dist/page.ftml").await.unwrap(), "appendix body");
}

#[tokio::test]
async fn test_sub_project_failure_names_the_sub_project() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, "root", "\n[subProjects]\nappendix = \"appendix/wdbuild.toml\"\n").await.unwrap();
    write_sub_site(&project, "appendix", "unused", "").await;
    tokio::fs::remove_file(project.path().join("appendix/strings/en.json")).await.unwrap();

    let orchestrator = BuildOrchestrator::new();
    let config = orchestrator.load(&project.config_path()).await.unwrap();
    let error = orchestrator.try_build(BuildRequest::new(config)).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::SubProject);
    assert_eq!(error.root().kind(), ErrorKind::ContentLoad);
    let chain: Vec<_> = error.sub_project_chain().into_iter().map(|(key, _)| key).collect();
    assert_eq!(chain, vec!["appendix"]);
    assert!(!project.path().join("dist").exists());
}

/// Data of the build itself wins over sub-project data under the same key
#[tokio::test]
async fn test_config_data_overrides_sub_project_data() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, "{{ x }}", "\n[subProjects]\nx = \"sub/wdbuild.toml\"\n\n[data]\nx = 2\n")
        .await
        .unwrap();
    write_sub_site(&project, "sub", "sub", "\n[data]\nx = 1\n").await;

    let orchestrator = BuildOrchestrator::new();
    let config = orchestrator.load(&project.config_path()).await.unwrap();
    let output = orchestrator.try_build(BuildRequest::new(config)).await.unwrap();

    assert_eq!(output.text, "2");
    assert_eq!(output.sub_projects["x"].data["x"], 1);
}
