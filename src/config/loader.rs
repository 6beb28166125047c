//! Loading build configurations from disk.
//!
//! Loading a configuration is a fixed sequence:
//!
//! 1. resolve the config path to an absolute path;
//! 2. read and decode it (TOML, or JSON for `.json` files);
//! 3. validate its shape, collecting every violation;
//! 4. expand `~`/`$VAR` in paths and interpolate the output templates once;
//! 5. resolve component ids against the catalog;
//! 6. load each sub-project recursively, rejecting circular references.

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::{
    BuildConfiguration, ConfigValidator, PathInterpolator, RawConfig, SubProject, resolve_components,
};
use crate::core::{BuildError, Violation};
use crate::templating::component::ComponentCatalog;

/// Loads [`BuildConfiguration`]s, resolving components against a catalog
pub struct ConfigLoader<'a> {
    catalog: &'a ComponentCatalog,
}

impl<'a> ConfigLoader<'a> {
    pub fn new(catalog: &'a ComponentCatalog) -> Self {
        Self {
            catalog,
        }
    }

    /// Load the configuration file at `source` and its sub-projects
    pub async fn load(&self, source: &Path) -> Result<BuildConfiguration, BuildError> {
        let source = absolute(source)?;
        self.load_chain(source, Vec::new()).await
    }

    /// Build a configuration from an already decoded value.
    ///
    /// `source` is the path the value is attributed to; relative paths in
    /// the value resolve against its parent directory.
    pub async fn load_value(&self, value: Value, source: &Path) -> Result<BuildConfiguration, BuildError> {
        let source = absolute(source)?;
        self.from_value(value, source, Vec::new()).await
    }

    fn load_chain(
        &self,
        source: PathBuf,
        chain: Vec<PathBuf>,
    ) -> BoxFuture<'_, Result<BuildConfiguration, BuildError>> {
        async move {
            let identity = tokio::fs::canonicalize(&source).await.unwrap_or_else(|_| source.clone());
            if chain.contains(&identity) {
                let cycle = chain
                    .iter()
                    .chain(std::iter::once(&identity))
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(BuildError::ConfigLoad {
                    path: source,
                    reason: format!("circular sub-project reference: {cycle}"),
                });
            }

            tracing::debug!(path = %source.display(), "loading build configuration");
            let value = read_config_value(&source).await?;

            let mut chain = chain;
            chain.push(identity);
            self.from_value(value, source, chain).await
        }
        .boxed()
    }

    async fn from_value(
        &self,
        value: Value,
        source: PathBuf,
        chain: Vec<PathBuf>,
    ) -> Result<BuildConfiguration, BuildError> {
        ConfigValidator::new(self.catalog).validate(&value)?;

        let mut raw: RawConfig = serde_json::from_value(value).map_err(|e| BuildError::ConfigLoad {
            path: source.clone(),
            reason: e.to_string(),
        })?;
        let base_dir = source.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut violations = Vec::new();
        resolve_paths(&mut raw, &mut violations);
        if !violations.is_empty() {
            return Err(BuildError::Validation {
                violations,
            });
        }
        raw.output.dir = base_dir.join(&raw.output.dir);

        let components = resolve_components(&raw.components, self.catalog, None)?;

        let mut sub_projects = Vec::with_capacity(raw.sub_projects.len());
        for (key, path) in &raw.sub_projects {
            let sub_source = base_dir.join(path);
            tracing::debug!(key = %key, path = %sub_source.display(), "loading sub-project");
            let config = self.load_chain(sub_source.clone(), chain.clone()).await.map_err(|e| {
                BuildError::SubProject {
                    key: key.clone(),
                    path: sub_source.clone(),
                    source: Box::new(e),
                }
            })?;
            sub_projects.push(SubProject {
                key: key.clone(),
                source: sub_source,
                config,
            });
        }

        Ok(BuildConfiguration::from_parts(source, raw, components, sub_projects))
    }
}

fn absolute(source: &Path) -> Result<PathBuf, BuildError> {
    std::path::absolute(source).map_err(|e| BuildError::ConfigLoad {
        path: source.to_path_buf(),
        reason: format!("cannot resolve path: {e}"),
    })
}

async fn read_config_value(source: &Path) -> Result<Value, BuildError> {
    let content = tokio::fs::read_to_string(source).await.map_err(|e| BuildError::ConfigLoad {
        path: source.to_path_buf(),
        reason: format!("cannot read file: {e}"),
    })?;

    let is_json = source.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        serde_json::from_str::<Value>(&content).map_err(|e| e.to_string())
    } else {
        toml::from_str::<Value>(&content).map_err(|e| e.to_string())
    };

    parsed.map_err(|reason| BuildError::ConfigLoad {
        path: source.to_path_buf(),
        reason,
    })
}

/// Expand shell references in every path and interpolate the output templates
fn resolve_paths(raw: &mut RawConfig, violations: &mut Vec<Violation>) {
    raw.entry = expand(&raw.entry, "entry", violations);
    raw.partials_dir = expand(&raw.partials_dir, "partialsDir", violations);
    raw.strings_dir = expand(&raw.strings_dir, "stringsDir", violations);

    for (key, path) in raw.sub_projects.iter_mut() {
        *path = expand(path, &format!("subProjects.{key}"), violations);
    }

    let dir_template = raw.output.dir.to_string_lossy().into_owned();
    match PathInterpolator::interpolate(&dir_template, &raw.data) {
        Ok(dir) => raw.output.dir = PathBuf::from(expand(&dir, "output.dir", violations)),
        Err(e) => violations.push(Violation::new("output.dir", format!("cannot interpolate: {e}"))),
    }

    match PathInterpolator::interpolate(&raw.output.filename, &raw.data) {
        Ok(filename) if filename.trim().is_empty() => {
            violations.push(Violation::new("output.filename", "interpolates to an empty file name"));
        }
        Ok(filename) if filename.contains(['/', '\\']) => violations.push(Violation::new(
            "output.filename",
            format!("'{filename}' must be a file name, not a path; put directories in output.dir"),
        )),
        Ok(filename) => raw.output.filename = filename,
        Err(e) => violations.push(Violation::new("output.filename", format!("cannot interpolate: {e}"))),
    }
}

fn expand(path: &str, field: &str, violations: &mut Vec<Violation>) -> String {
    match shellexpand::full(path) {
        Ok(expanded) => expanded.into_owned(),
        Err(e) => {
            violations.push(Violation::new(field, format!("cannot expand '{path}': {e}")));
            path.to_string()
        }
    }
}
