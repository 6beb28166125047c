use futures::FutureExt;
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use wdbuild::build::{BuildOrchestrator, BuildRequest, SubProjectServices};
use wdbuild::config::BuildConfiguration;
use wdbuild::core::BuildError;
use wdbuild::services::{HookFuture, Service, ServiceFactory, ServiceRegistry};

use crate::common::{TestProject, write_site};

#[derive(Default)]
struct HookCounts {
    created: AtomicUsize,
    before: AtomicUsize,
    after: AtomicUsize,
}

impl HookCounts {
    fn snapshot(&self) -> (usize, usize, usize) {
        (
            self.created.load(Ordering::SeqCst),
            self.before.load(Ordering::SeqCst),
            self.after.load(Ordering::SeqCst),
        )
    }
}

struct CountingService {
    counts: Arc<HookCounts>,
}

impl Service for CountingService {
    fn name(&self) -> &str {
        "counter"
    }

    fn before_build(&self) -> HookFuture<'_> {
        async move {
            self.counts.before.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        .boxed()
    }

    fn after_build(&self) -> HookFuture<'_> {
        async move {
            self.counts.after.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        .boxed()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct CountingFactory {
    counts: Arc<HookCounts>,
}

impl ServiceFactory for CountingFactory {
    fn name(&self) -> &str {
        "counter"
    }

    fn create(&self, _config: &BuildConfiguration) -> Result<Arc<dyn Service>, BuildError> {
        self.counts.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(CountingService {
            counts: Arc::clone(&self.counts),
        }))
    }
}

fn counting_registry(counts: &Arc<HookCounts>) -> ServiceRegistry {
    let mut registry = ServiceRegistry::with_defaults();
    registry
        .register(Arc::new(CountingFactory {
            counts: Arc::clone(counts),
        }))
        .unwrap();
    registry
}

async fn site_with_sub_project(project: &TestProject) {
    write_site(project, "{{ appendix.edition }}", "\n[subProjects]\nappendix = \"appendix/wdbuild.toml\"\n")
        .await
        .unwrap();
    project
        .write_file("appendix/wdbuild.toml", &crate::common::site_config("\n[data]\nedition = 4\n"))
        .await
        .unwrap();
    project.write_file("appendix/src/page.ftml", "appendix").await.unwrap();
    project.write_file("appendix/src/partials/.keep", "").await.unwrap();
    project.write_file("appendix/strings/en.json", "{}").await.unwrap();
}

#[tokio::test]
async fn test_fresh_services_run_hooks_once() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, "{{ greeting }}", "").await.unwrap();
    let counts = Arc::new(HookCounts::default());
    let orchestrator = BuildOrchestrator::new().with_services(counting_registry(&counts));

    let config = orchestrator.load(&project.config_path()).await.unwrap();
    orchestrator.try_build(BuildRequest::new(config)).await.unwrap();

    assert_eq!(counts.snapshot(), (1, 1, 1));
}

/// A failed image copy leaves later services' finalization untouched
#[tokio::test]
async fn test_failed_image_copy_still_runs_later_after_hooks() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, r#"{{ img(src="missing.png") }}"#, "").await.unwrap();
    let counts = Arc::new(HookCounts::default());
    let orchestrator = BuildOrchestrator::new().with_services(counting_registry(&counts));

    let config = orchestrator.load(&project.config_path()).await.unwrap();
    let output = orchestrator.try_build(BuildRequest::new(config)).await.unwrap();

    assert_eq!(counts.snapshot(), (1, 1, 1));
    assert_eq!(output.resource_failures.len(), 1);
    assert!(output.text.ends_with("missing.png"));
}

/// Services handed in by the caller are used as they are
#[tokio::test]
async fn test_existing_services_get_no_hook_calls() {
    let project = TestProject::new().await.unwrap();
    write_site(&project, "{{ greeting }}", "").await.unwrap();
    let counts = Arc::new(HookCounts::default());
    let registry = counting_registry(&counts);
    let orchestrator = BuildOrchestrator::new().with_services(registry.clone());

    let config = orchestrator.load(&project.config_path()).await.unwrap();
    let existing = registry.create_services(&config).unwrap();
    registry.run_before_hooks(&existing).await.unwrap();
    let before = counts.snapshot();

    let output = orchestrator
        .try_build(BuildRequest::new(config).with_existing_services(existing.clone()))
        .await
        .unwrap();

    assert_eq!(output.text, "Hello");
    assert_eq!(counts.snapshot(), before);
    assert!(existing.is_owned());
}

#[tokio::test]
async fn test_independent_sub_projects_own_their_services() {
    let project = TestProject::new().await.unwrap();
    site_with_sub_project(&project).await;
    let counts = Arc::new(HookCounts::default());
    let orchestrator = BuildOrchestrator::new().with_services(counting_registry(&counts));

    let config = orchestrator.load(&project.config_path()).await.unwrap();
    let output = orchestrator.try_build(BuildRequest::new(config)).await.unwrap();

    assert_eq!(output.text, "4");
    assert_eq!(counts.snapshot(), (2, 2, 2));
}

#[tokio::test]
async fn test_shared_services_run_hooks_once_for_the_tree() {
    let project = TestProject::new().await.unwrap();
    site_with_sub_project(&project).await;
    let counts = Arc::new(HookCounts::default());
    let orchestrator = BuildOrchestrator::new()
        .with_services(counting_registry(&counts))
        .with_sub_project_services(SubProjectServices::Shared);

    let config = orchestrator.load(&project.config_path()).await.unwrap();
    let output = orchestrator.try_build(BuildRequest::new(config)).await.unwrap();

    assert_eq!(output.text, "4");
    assert_eq!(counts.snapshot(), (1, 1, 1));
}

/// Shared image services put sub-project images next to the root document
#[tokio::test]
async fn test_shared_images_land_in_root_output() {
    let project = TestProject::new().await.unwrap();
    site_with_sub_project(&project).await;
    project.write_file("appendix/src/page.ftml", r#"{{ img(src="fig.png") }}"#).await.unwrap();
    crate::common::write_bytes(&project, "appendix/src/fig.png", crate::common::PNG_BYTES)
        .await
        .unwrap();

    let orchestrator = BuildOrchestrator::new().with_sub_project_services(SubProjectServices::Shared);
    let config = orchestrator.load(&project.config_path()).await.unwrap();
    orchestrator.try_build(BuildRequest::new(config)).await.unwrap();

    assert!(project.path().join("dist/fig.png").exists());
    assert!(!project.path().join("appendix/dist/fig.png").exists());
}
