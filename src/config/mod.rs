//! Build configuration for wdbuild
//!
//! A build is described by one configuration file (`wdbuild.toml`, or a
//! `.json` file with the same keys). The file names the entry document, the
//! partials and strings directories, the output location, the components
//! templates may call, optional sub-projects and free-form `data`.
//!
//! # Modules
//!
//! - `loader` - reading, decoding and resolving configuration files
//! - `validation` - shape checks that report every violation at once
//! - `interpolate` - one-shot rendering of `output.dir`/`output.filename`
//!
//! # File Format
//!
//! ```toml
//! entry = "src/page.ftml"
//! partialsDir = "src/partials"
//! stringsDir = "strings"
//! locale = "en"
//! wikiName = "my-wiki"
//! pageName = "my-page"
//!
//! [output]
//! dir = "dist/{{ edition }}"
//! filename = "{{ slug }}.ftml"
//!
//! [components]
//! img = "image"
//!
//! [subProjects]
//! appendix = "../appendix/wdbuild.toml"
//!
//! [data]
//! edition = "2"
//! slug = "main"
//! ```
//!
//! # Path Resolution
//!
//! Every relative path in the file resolves against the directory containing
//! the file, never against the working directory of the process. `~` and
//! `$VAR` references are expanded while loading.
//!
//! # Immutability
//!
//! A loaded [`BuildConfiguration`] is never mutated. Build-time overrides go
//! through [`BuildConfiguration::with_overrides`], which returns a new value.

pub mod interpolate;
pub mod loader;
pub mod validation;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::{BuildError, Violation};
use crate::templating::component::{ComponentCatalog, ComponentEntry, ComponentMap};
use crate::templating::deep_merge_json;

pub use interpolate::PathInterpolator;
pub use loader::ConfigLoader;
pub use validation::ConfigValidator;

/// Default configuration file name looked up by the CLI
pub const DEFAULT_CONFIG_FILE: &str = "wdbuild.toml";

/// Output location of a build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory the document and finalized resources are written to
    pub dir: PathBuf,
    /// File name of the generated document
    pub filename: String,
}

/// The configuration file as decoded, in its camelCase wire form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConfig {
    /// Entry document path
    pub entry: String,
    /// Directory whose files become includable partials
    pub partials_dir: String,
    /// Directory holding `<locale>.json` string tables
    pub strings_dir: String,
    /// Locale selecting the string table
    pub locale: String,
    /// Wiki the page is published to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiki_name: Option<String>,
    /// Page the document is published as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_name: Option<String>,
    /// Output location
    pub output: OutputConfig,
    /// Template name to component id
    pub components: BTreeMap<String, String>,
    /// Sub-project key to config path
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sub_projects: BTreeMap<String, String>,
    /// Free-form values exposed to templates
    #[serde(default = "empty_table")]
    pub data: Value,
}

fn empty_table() -> Value {
    Value::Object(Map::new())
}

/// A loaded sub-project
#[derive(Clone)]
pub struct SubProject {
    /// Key under which the sub-project's data is exposed
    pub key: String,
    /// Absolute path of the sub-project's config file
    pub source: PathBuf,
    /// The sub-project's own configuration
    pub config: BuildConfiguration,
}

/// A validated, fully resolved build configuration
#[derive(Clone)]
pub struct BuildConfiguration {
    source: PathBuf,
    base_dir: PathBuf,
    raw: RawConfig,
    components: ComponentMap,
    sub_projects: Vec<SubProject>,
}

impl BuildConfiguration {
    pub(crate) fn from_parts(
        source: PathBuf,
        raw: RawConfig,
        components: ComponentMap,
        sub_projects: Vec<SubProject>,
    ) -> Self {
        let base_dir = source.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            source,
            base_dir,
            raw,
            components,
            sub_projects,
        }
    }

    /// Absolute path of the file this configuration was loaded from
    pub fn source_path(&self) -> &Path {
        &self.source
    }

    /// Directory relative paths resolve against
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve a config-relative path
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.base_dir.join(path)
    }

    /// The decoded configuration
    pub fn raw(&self) -> &RawConfig {
        &self.raw
    }

    /// Absolute path of the entry document
    pub fn entry_path(&self) -> PathBuf {
        self.resolve(&self.raw.entry)
    }

    /// Absolute path of the partials directory
    pub fn partials_dir(&self) -> PathBuf {
        self.resolve(&self.raw.partials_dir)
    }

    /// Absolute path of the strings directory
    pub fn strings_dir(&self) -> PathBuf {
        self.resolve(&self.raw.strings_dir)
    }

    pub fn locale(&self) -> &str {
        &self.raw.locale
    }

    pub fn wiki_name(&self) -> Option<&str> {
        self.raw.wiki_name.as_deref()
    }

    pub fn page_name(&self) -> Option<&str> {
        self.raw.page_name.as_deref()
    }

    /// Absolute output directory
    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.raw.output.dir)
    }

    /// Absolute path of the generated document
    pub fn output_file(&self) -> PathBuf {
        self.output_dir().join(&self.raw.output.filename)
    }

    /// Free-form `data` value
    pub fn data(&self) -> &Value {
        &self.raw.data
    }

    /// Components available to templates, by template name
    pub fn components(&self) -> &ComponentMap {
        &self.components
    }

    /// Loaded sub-projects, in key order
    pub fn sub_projects(&self) -> &[SubProject] {
        &self.sub_projects
    }

    /// Attach a component under `name`, replacing any existing one
    #[must_use]
    pub fn with_component(mut self, name: impl Into<String>, entry: ComponentEntry) -> Self {
        let name = name.into();
        self.raw.components.insert(name.clone(), entry.id().to_string());
        self.components.insert(name, entry);
        self
    }

    /// The configuration as a JSON object in its file form.
    ///
    /// This is the view exposed to templates under `config` and the base
    /// that build-time overrides are merged onto.
    pub fn to_value(&self) -> Result<Value, BuildError> {
        serde_json::to_value(&self.raw).map_err(|e| BuildError::ConfigLoad {
            path: self.source.clone(),
            reason: format!("configuration cannot be represented as JSON: {e}"),
        })
    }

    /// Deep-merge `overrides` onto this configuration and validate the result.
    ///
    /// Output paths in the overrides are taken literally; they are not
    /// interpolated again. Sub-projects cannot be overridden.
    pub fn with_overrides(
        &self,
        overrides: &Value,
        catalog: &ComponentCatalog,
    ) -> Result<Self, BuildError> {
        let current = self.to_value()?;
        let merged = if overrides.is_null() {
            current.clone()
        } else {
            deep_merge_json(current.clone(), overrides)
        };

        let mut violations = ConfigValidator::new(catalog)
            .with_attached(&self.components)
            .collect(&merged);
        if merged.get("subProjects") != current.get("subProjects") {
            violations.push(Violation::new("subProjects", "sub-projects cannot be overridden"));
        }
        if !violations.is_empty() {
            return Err(BuildError::Validation {
                violations,
            });
        }

        let raw: RawConfig = serde_json::from_value(merged).map_err(|e| BuildError::ConfigLoad {
            path: self.source.clone(),
            reason: format!("overrides produced an unreadable configuration: {e}"),
        })?;
        let components = resolve_components(&raw.components, catalog, Some(&self.components))?;

        Ok(Self {
            source: self.source.clone(),
            base_dir: self.base_dir.clone(),
            raw,
            components,
            sub_projects: self.sub_projects.clone(),
        })
    }
}

impl fmt::Debug for BuildConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildConfiguration")
            .field("source", &self.source)
            .field("raw", &self.raw)
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field(
                "sub_projects",
                &self.sub_projects.iter().map(|s| s.key.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl fmt::Debug for SubProject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubProject")
            .field("key", &self.key)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Turn `name -> id` pairs into component entries.
///
/// An already attached entry with the same id is kept as is, so components
/// attached by library callers survive overrides.
pub(crate) fn resolve_components(
    ids: &BTreeMap<String, String>,
    catalog: &ComponentCatalog,
    attached: Option<&ComponentMap>,
) -> Result<ComponentMap, BuildError> {
    let mut components = ComponentMap::new();
    let mut violations = Vec::new();

    for (name, id) in ids {
        if let Some(entry) = attached.and_then(|map| map.get(name)).filter(|e| e.id() == id) {
            components.insert(name.clone(), entry.clone());
            continue;
        }
        match catalog.entry(id) {
            Some(entry) => {
                components.insert(name.clone(), entry);
            }
            None => violations.push(Violation::for_component(
                name.as_str(),
                format!("components.{name}"),
                format!("unknown component '{id}'"),
            )),
        }
    }

    if violations.is_empty() {
        Ok(components)
    } else {
        Err(BuildError::Validation {
            violations,
        })
    }
}
