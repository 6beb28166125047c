//! Components: named capabilities templates can call.
//!
//! A component is an object implementing [`Component`]. It declares the
//! parameters it accepts through a [`ComponentSignature`], which is checked
//! once when the component is registered in a [`ComponentCatalog`], and
//! exposes a single async [`Component::invoke`] contract.
//!
//! Each component configured for a build is registered on the template
//! engine under its template name in two forms:
//!
//! ```text
//! {{ img(src="logo.png") }}                          function form
//! {% filter note(title="Heads up") %}body{% endfilter %}   block form
//! ```
//!
//! In block form the rendered body is passed to the component as
//! [`ComponentContext::children`].
//!
//! # Built-in components
//!
//! | id             | parameters           | result                                  |
//! |----------------|----------------------|-----------------------------------------|
//! | `image`        | `src`                | reference URL of the registered image   |
//! | `current_file` | `relative` (bool)    | path of the file currently evaluated    |

use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::BuildConfiguration;
use crate::content::LocalizedStrings;
use crate::core::{BuildError, Violation};
use crate::services::ServiceSet;
use crate::services::images::ImageComponent;

/// Future returned by [`Component::invoke`]
pub type ComponentFuture<'a> = BoxFuture<'a, Result<String, BuildError>>;

/// A capability callable from templates
pub trait Component: Send + Sync {
    /// Parameters the component accepts
    fn signature(&self) -> ComponentSignature;

    /// Produce the text the call renders to
    fn invoke<'a>(&'a self, call: ComponentCall<'a>) -> ComponentFuture<'a>;
}

/// Declared parameters of a component
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentSignature {
    required: Vec<String>,
    optional: Vec<String>,
    accepts_children: bool,
}

impl ComponentSignature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter every call must pass
    #[must_use]
    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.required.push(name.into());
        self
    }

    /// Declare a parameter calls may pass
    #[must_use]
    pub fn optional(mut self, name: impl Into<String>) -> Self {
        self.optional.push(name.into());
        self
    }

    /// Allow the block form
    #[must_use]
    pub fn with_children(mut self) -> Self {
        self.accepts_children = true;
        self
    }

    pub fn accepts_children(&self) -> bool {
        self.accepts_children
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.required.iter().chain(&self.optional).map(String::as_str)
    }

    /// Problems with the declaration itself
    pub fn violations(&self, id: &str) -> Vec<Violation> {
        let mut violations = Vec::new();
        let mut seen = Vec::new();
        for name in self.names() {
            let field = format!("{id}.{name}");
            if !is_identifier(name) {
                violations.push(Violation::for_component(
                    id,
                    field.as_str(),
                    "parameter name must be an identifier",
                ));
            }
            if seen.contains(&name) {
                violations.push(Violation::for_component(id, field, "parameter is declared twice"));
            }
            seen.push(name);
        }
        violations
    }

    /// Check the arguments of one call against the declaration
    pub fn check_call(&self, params: &Map<String, Value>, has_children: bool) -> Result<(), String> {
        let missing: Vec<_> = self.required.iter().filter(|name| !params.contains_key(*name)).collect();
        if !missing.is_empty() {
            let names = missing.iter().map(|n| format!("`{n}`")).collect::<Vec<_>>().join(", ");
            return Err(format!("missing required parameter(s) {names}"));
        }

        if let Some(unknown) = params.keys().find(|key| !self.names().any(|name| name == key.as_str())) {
            return Err(format!("unknown parameter `{unknown}`"));
        }

        if has_children && !self.accepts_children {
            return Err("does not accept a block body".to_string());
        }
        Ok(())
    }
}

/// Render-time information available to a component
#[derive(Clone)]
pub struct ComponentContext {
    /// Absolute path of the file whose evaluation made the call
    pub current_file_path: Option<PathBuf>,
    /// Configuration of the build being rendered
    pub config: Arc<BuildConfiguration>,
    /// Localized strings of the build
    pub strings: Arc<LocalizedStrings>,
    /// Services of the build
    pub services: ServiceSet,
    /// Rendered block body, when called in block form
    pub children: Option<String>,
}

impl ComponentContext {
    pub fn has_children(&self) -> bool {
        self.children.is_some()
    }

    pub fn children(&self) -> Option<&str> {
        self.children.as_deref()
    }

    /// Directory relative references in the current file resolve against
    pub fn current_dir(&self) -> PathBuf {
        self.current_file_path
            .as_deref()
            .and_then(|path| path.parent())
            .map_or_else(|| self.config.base_dir().to_path_buf(), |dir| dir.to_path_buf())
    }
}

/// One invocation of a component
pub struct ComponentCall<'a> {
    /// Template name the component was called by
    pub name: &'a str,
    /// Named arguments
    pub params: &'a Map<String, Value>,
    pub context: &'a ComponentContext,
}

impl<'a> ComponentCall<'a> {
    pub fn param(&self, key: &str) -> Option<&'a Value> {
        self.params.get(key)
    }

    /// A required string argument
    pub fn str_param(&self, key: &str) -> Result<&'a str, BuildError> {
        match self.params.get(key) {
            Some(Value::String(value)) => Ok(value),
            Some(_) => Err(self.error(format!("parameter `{key}` must be a string"))),
            None => Err(self.error(format!("parameter `{key}` is required"))),
        }
    }

    /// An error tagged with this component's name
    pub fn error(&self, message: impl Into<String>) -> BuildError {
        BuildError::Component {
            component: self.name.to_string(),
            message: message.into(),
        }
    }
}

/// A component together with the catalog id it was configured by
#[derive(Clone)]
pub struct ComponentEntry {
    id: String,
    component: Arc<dyn Component>,
}

impl ComponentEntry {
    pub fn new(id: impl Into<String>, component: Arc<dyn Component>) -> Self {
        Self {
            id: id.into(),
            component,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn component(&self) -> &Arc<dyn Component> {
        &self.component
    }
}

impl fmt::Debug for ComponentEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentEntry").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Components of one configuration, by template name
pub type ComponentMap = BTreeMap<String, ComponentEntry>;

/// Components available to configuration files, by id
#[derive(Clone, Default)]
pub struct ComponentCatalog {
    components: BTreeMap<String, Arc<dyn Component>>,
}

impl ComponentCatalog {
    /// An empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding the built-in components
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.components.insert("image".to_string(), Arc::new(ImageComponent));
        catalog.components.insert("current_file".to_string(), Arc::new(CurrentFileComponent));
        catalog
    }

    /// Register a component under `id`, validating its signature
    pub fn register(&mut self, id: impl Into<String>, component: Arc<dyn Component>) -> Result<(), BuildError> {
        let id = id.into();
        let mut violations = Vec::new();
        if !is_identifier(&id) {
            violations.push(Violation::for_component(id.as_str(), "id", "component id must be an identifier"));
        }
        if self.components.contains_key(&id) {
            violations.push(Violation::for_component(id.as_str(), "id", "a component with this id is already registered"));
        }
        violations.extend(component.signature().violations(&id));

        if !violations.is_empty() {
            return Err(BuildError::Validation {
                violations,
            });
        }
        tracing::debug!(id = %id, "registered component");
        self.components.insert(id, component);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.components.contains_key(id)
    }

    pub fn entry(&self, id: &str) -> Option<ComponentEntry> {
        self.components.get(id).map(|component| ComponentEntry::new(id, Arc::clone(component)))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    /// Closest registered id to a misspelled one
    pub fn suggest(&self, id: &str) -> Option<&str> {
        let threshold = (id.chars().count() / 3).max(2);
        self.ids()
            .map(|candidate| (strsim::levenshtein(id, candidate), candidate))
            .filter(|(distance, _)| *distance <= threshold)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, candidate)| candidate)
    }
}

/// Whether `name` can be used as a template identifier
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Built-in `current_file` component
pub struct CurrentFileComponent;

impl Component for CurrentFileComponent {
    fn signature(&self) -> ComponentSignature {
        ComponentSignature::new().optional("relative")
    }

    fn invoke<'a>(&'a self, call: ComponentCall<'a>) -> ComponentFuture<'a> {
        async move {
            let path = call
                .context
                .current_file_path
                .clone()
                .ok_or_else(|| call.error("no file is being evaluated"))?;

            let relative = call.param("relative").and_then(Value::as_bool).unwrap_or(false);
            let shown = match path.strip_prefix(call.context.config.base_dir()) {
                Ok(stripped) if relative => stripped.to_path_buf(),
                _ => path,
            };
            Ok(shown.display().to_string())
        }
        .boxed()
    }
}
