//! Composition of the render context.
//!
//! The context a document renders against is assembled from four layers,
//! lowest precedence first:
//!
//! | layer         | contributes                                            |
//! |---------------|--------------------------------------------------------|
//! | `SubProjects` | `<key>: <sub-project data>` per sub-project            |
//! | `Config`      | top-level `data` keys, plus `config` (whole config)    |
//! | `Strings`     | top-level string keys, plus `strings` (whole table)    |
//! | `Services`    | `services` (each service's description)                |
//!
//! Keys of a later layer replace keys of an earlier one. Merging is shallow:
//! a replaced key takes the later value as a whole.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::content::LocalizedStrings;
use crate::services::ServiceSet;

/// Layers of the render context, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ContextLayer {
    SubProjects,
    Config,
    Strings,
    Services,
}

/// The layered render context of one render call
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    layers: BTreeMap<ContextLayer, Map<String, Value>>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose each sub-project's data under its key
    #[must_use]
    pub fn with_sub_projects(mut self, data: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.layers.insert(ContextLayer::SubProjects, data.into_iter().collect());
        self
    }

    /// Spread `data` into the root and expose the configuration view as `config`
    #[must_use]
    pub fn with_config(mut self, view: Value, data: &Value) -> Self {
        let mut layer = data.as_object().cloned().unwrap_or_default();
        layer.insert("config".to_string(), view);
        self.layers.insert(ContextLayer::Config, layer);
        self
    }

    /// Spread the string table into the root and expose it as `strings`
    #[must_use]
    pub fn with_strings(mut self, strings: &LocalizedStrings) -> Self {
        let mut layer = strings.table().clone();
        layer.insert("strings".to_string(), strings.to_value());
        self.layers.insert(ContextLayer::Strings, layer);
        self
    }

    /// Expose service descriptions as `services`
    #[must_use]
    pub fn with_services(mut self, services: &ServiceSet) -> Self {
        let layer = Map::from_iter([("services".to_string(), services.describe())]);
        self.layers.insert(ContextLayer::Services, layer);
        self
    }

    pub fn layer(&self, layer: ContextLayer) -> Option<&Map<String, Value>> {
        self.layers.get(&layer)
    }

    /// The merged context object
    pub fn compose(&self) -> Value {
        let mut merged = Map::new();
        for (layer, values) in &self.layers {
            for (key, value) in values {
                if merged.insert(key.clone(), value.clone()).is_some() {
                    tracing::trace!(key = %key, ?layer, "context key replaced by a later layer");
                }
            }
        }
        Value::Object(merged)
    }
}
