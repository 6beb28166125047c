//! Build orchestration.
//!
//! [`BuildOrchestrator`] turns a loaded [`BuildConfiguration`] into a
//! rendered document. The steps of one build always run in this order:
//!
//! 1. deep-merge the request's overrides onto the configuration;
//! 2. validate the merged configuration;
//! 3. create a fresh renderer and register components and partials;
//! 4. build every sub-project, sequentially in key order, and collect its data;
//! 5. load the localized strings;
//! 6. load the entry document;
//! 7. obtain services, reusing services supplied by the request;
//! 8. run `before_build` hooks of freshly created services;
//! 9. render, waiting for every component call to finish;
//! 10. run `after_build` hooks of freshly created services;
//! 11. return the rendered text.
//!
//! A resource a service fails to finalize at step 10 does not fail the
//! build; it is logged by the service and listed in
//! [`BuildOutput::resource_failures`].
//!
//! Sub-projects are complete builds of their own. Only their `data` reaches
//! the parent's render context, under the sub-project's key. By default each
//! sub-project creates and finalizes its own services; with
//! [`SubProjectServices::Shared`] the parent creates its services before
//! step 4 and lends them to the whole tree, finalizing once at step 10.
//!
//! # Examples
//!
//! ```rust,no_run
//! use wdbuild::build::{BuildOrchestrator, BuildRequest};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), wdbuild::core::BuildError> {
//! let orchestrator = BuildOrchestrator::new();
//! let config = orchestrator.load(Path::new("wdbuild.toml")).await?;
//! let output = orchestrator.try_build_and_write(BuildRequest::new(config)).await?;
//! println!("wrote {}", output.output_path.display());
//! # Ok(())
//! # }
//! ```

pub mod context;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{BuildConfiguration, ConfigLoader};
use crate::content::ContentRegistry;
use crate::core::{BuildError, ResourceFailure, report};
use crate::output::OutputWriter;
use crate::services::{ServiceRegistry, ServiceSet};
use crate::templating::component::ComponentCatalog;
use crate::templating::renderer::{RenderState, TemplateRenderer};

pub use context::{ContextLayer, RenderContext};

/// How sub-project builds obtain their services
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubProjectServices {
    /// Every sub-project creates and finalizes its own services
    #[default]
    Independent,
    /// Sub-projects borrow the services of the root build
    Shared,
}

/// One build to perform
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Configuration to build
    pub config: BuildConfiguration,
    /// Values deep-merged onto the configuration; `null` for none
    pub overrides: Value,
    /// Services owned by a caller; when set, no services are created and no hooks run
    pub existing_services: Option<ServiceSet>,
}

impl BuildRequest {
    pub fn new(config: BuildConfiguration) -> Self {
        Self {
            config,
            overrides: Value::Null,
            existing_services: None,
        }
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: Value) -> Self {
        self.overrides = overrides;
        self
    }

    #[must_use]
    pub fn with_existing_services(mut self, services: ServiceSet) -> Self {
        self.existing_services = Some(services);
        self
    }
}

/// Result of a build
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Rendered document
    pub text: String,
    /// The build's `data`, as exposed to a parent build
    pub data: Value,
    /// Where the document belongs
    pub output_path: PathBuf,
    /// Configuration the document was rendered with, overrides applied
    pub config: Arc<BuildConfiguration>,
    /// Outputs of the sub-project builds, by key
    pub sub_projects: BTreeMap<String, BuildOutput>,
    /// Resources this build's own services could not finalize
    pub resource_failures: Vec<ResourceFailure>,
}

impl BuildOutput {
    /// This output and every nested sub-project output, sub-projects first
    pub fn documents(&self) -> Vec<&BuildOutput> {
        let mut documents = Vec::new();
        for sub in self.sub_projects.values() {
            documents.extend(sub.documents());
        }
        documents.push(self);
        documents
    }
}

/// Runs builds
#[derive(Clone)]
pub struct BuildOrchestrator {
    catalog: Arc<ComponentCatalog>,
    services: ServiceRegistry,
    sub_project_services: SubProjectServices,
}

impl Default for BuildOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildOrchestrator {
    /// Orchestrator with the built-in components and services
    pub fn new() -> Self {
        Self {
            catalog: Arc::new(ComponentCatalog::with_builtins()),
            services: ServiceRegistry::with_defaults(),
            sub_project_services: SubProjectServices::Independent,
        }
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: ComponentCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    #[must_use]
    pub fn with_services(mut self, services: ServiceRegistry) -> Self {
        self.services = services;
        self
    }

    #[must_use]
    pub fn with_sub_project_services(mut self, mode: SubProjectServices) -> Self {
        self.sub_project_services = mode;
        self
    }

    pub fn catalog(&self) -> &ComponentCatalog {
        &self.catalog
    }

    /// Load a configuration using this orchestrator's component catalog
    pub async fn load(&self, source: &Path) -> Result<BuildConfiguration, BuildError> {
        ConfigLoader::new(&self.catalog).load(source).await
    }

    /// Build and return the rendered text; failures are reported, not returned
    pub async fn build(&self, request: BuildRequest) -> Option<String> {
        match self.try_build(request).await {
            Ok(output) => Some(output.text),
            Err(error) => {
                report(&error);
                None
            }
        }
    }

    /// Build, propagating failures
    pub async fn try_build(&self, request: BuildRequest) -> Result<BuildOutput, BuildError> {
        self.build_tree(request).await
    }

    /// Build and write every document; failures are reported, not returned
    pub async fn build_and_write(&self, request: BuildRequest) -> Option<PathBuf> {
        match self.try_build_and_write(request).await {
            Ok(output) => Some(output.output_path),
            Err(error) => {
                report(&error);
                None
            }
        }
    }

    /// Build and write the document and every sub-project document
    pub async fn try_build_and_write(&self, request: BuildRequest) -> Result<BuildOutput, BuildError> {
        let output = self.try_build(request).await?;
        for document in output.documents() {
            OutputWriter::write(&document.config, &document.text).await?;
        }
        Ok(output)
    }

    fn build_tree(&self, request: BuildRequest) -> BoxFuture<'_, Result<BuildOutput, BuildError>> {
        async move {
            let BuildRequest {
                config,
                overrides,
                existing_services,
            } = request;
            tracing::debug!(config = %config.source_path().display(), "starting build");

            let config = Arc::new(config.with_overrides(&overrides, &self.catalog)?);

            let partials = ContentRegistry::load_partials(&config).await?;
            let mut renderer = TemplateRenderer::new()?;
            renderer.register_components(config.components());
            renderer.register_partials(&partials)?;

            let shared = self.sub_project_services == SubProjectServices::Shared;
            let hoisted = if shared && existing_services.is_none() && !config.sub_projects().is_empty() {
                let created = self.services.create_services(&config)?;
                self.services.run_before_hooks(&created).await?;
                Some(created)
            } else {
                None
            };

            let lent = if shared {
                existing_services.as_ref().or(hoisted.as_ref()).map(ServiceSet::lend)
            } else {
                None
            };
            let mut sub_outputs = BTreeMap::new();
            for sub in config.sub_projects() {
                tracing::debug!(key = %sub.key, path = %sub.source.display(), "building sub-project");
                let mut request = BuildRequest::new(sub.config.clone());
                request.existing_services = lent.clone();
                let output = self.build_tree(request).await.map_err(|e| BuildError::SubProject {
                    key: sub.key.clone(),
                    path: sub.source.clone(),
                    source: Box::new(e),
                })?;
                sub_outputs.insert(sub.key.clone(), output);
            }

            let strings = Arc::new(ContentRegistry::load_strings(&config).await?);
            let entry = ContentRegistry::load_entry(&config).await?;

            let services = match (existing_services, hoisted) {
                (Some(existing), _) => existing.lend(),
                (None, Some(hoisted)) => hoisted,
                (None, None) => {
                    let created = self.services.create_services(&config)?;
                    self.services.run_before_hooks(&created).await?;
                    created
                }
            };

            let context = RenderContext::new()
                .with_sub_projects(sub_outputs.iter().map(|(key, output)| (key.clone(), output.data.clone())))
                .with_config(config.to_value()?, config.data())
                .with_strings(&strings)
                .with_services(&services)
                .compose();

            let state = RenderState {
                config: Arc::clone(&config),
                strings,
                services: services.clone(),
            };
            let text = renderer.render(&entry, &context, state).await?;

            self.services.run_after_hooks(&services).await?;
            let resource_failures = if services.is_owned() {
                services.resource_failures()
            } else {
                Vec::new()
            };

            tracing::debug!(config = %config.source_path().display(), bytes = text.len(), "build finished");
            Ok(BuildOutput {
                text,
                data: config.data().clone(),
                output_path: config.output_file(),
                config,
                sub_projects: sub_outputs,
                resource_failures,
            })
        }
        .boxed()
    }
}
