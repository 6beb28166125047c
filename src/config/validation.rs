//! Shape validation for build configurations.
//!
//! Validation runs over the decoded JSON form of a configuration, before it
//! is turned into a [`super::BuildConfiguration`], and again after build-time
//! overrides are merged. It never stops at the first problem: every rule is
//! checked and all violations are returned together so the operator can fix
//! them in one pass.
//!
//! # Rules
//!
//! - `entry`, `partialsDir`, `stringsDir`, `locale` are required non-empty strings
//! - `wikiName`, `pageName` are optional strings
//! - `output` is a required table with required strings `dir` and `filename`
//! - `components` is a required table mapping template names to component ids;
//!   names must be identifiers and must not shadow the file-scope helper
//! - `subProjects` is an optional table of config paths whose keys must not
//!   shadow `config`, `strings` or `services`
//! - `data` may hold any value

use serde_json::{Map, Value};

use crate::core::{BuildError, Violation};
use crate::templating::component::{ComponentCatalog, ComponentMap, is_identifier};
use crate::templating::frames::FILE_SCOPE_HELPER;
use crate::templating::utils::type_name;

/// Required string fields
const REQUIRED_STRINGS: &[&str] = &["entry", "partialsDir", "stringsDir", "locale"];

/// Optional string fields
const OPTIONAL_STRINGS: &[&str] = &["wikiName", "pageName"];

/// Every key the file format knows about
const KNOWN_KEYS: &[&str] = &[
    "entry",
    "partialsDir",
    "stringsDir",
    "locale",
    "wikiName",
    "pageName",
    "output",
    "components",
    "subProjects",
    "data",
];

/// Root keys of the render context that sub-projects may not shadow
pub const RESERVED_CONTEXT_KEYS: &[&str] = &["config", "strings", "services"];

/// Validates the decoded form of a configuration
pub struct ConfigValidator<'a> {
    catalog: &'a ComponentCatalog,
    attached: Option<&'a ComponentMap>,
}

impl<'a> ConfigValidator<'a> {
    /// Validator resolving component ids against `catalog`
    pub fn new(catalog: &'a ComponentCatalog) -> Self {
        Self {
            catalog,
            attached: None,
        }
    }

    /// Also accept component ids of components already attached to a configuration
    #[must_use]
    pub fn with_attached(mut self, attached: &'a ComponentMap) -> Self {
        self.attached = Some(attached);
        self
    }

    /// Validate `value`, failing with every violation found
    pub fn validate(&self, value: &Value) -> Result<(), BuildError> {
        let violations = self.collect(value);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(BuildError::Validation {
                violations,
            })
        }
    }

    /// Collect every violation in `value`
    pub fn collect(&self, value: &Value) -> Vec<Violation> {
        let Some(root) = value.as_object() else {
            return vec![Violation::new(
                "<root>",
                format!("expected a table, found {}", type_name(value)),
            )];
        };

        let mut violations = Vec::new();

        for field in REQUIRED_STRINGS {
            check_string(root.get(*field), field, true, &mut violations);
        }
        for field in OPTIONAL_STRINGS {
            check_string(root.get(*field), field, false, &mut violations);
        }

        match root.get("output") {
            None => violations.push(Violation::missing("output")),
            Some(Value::Object(output)) => {
                check_string(output.get("dir"), "output.dir", true, &mut violations);
                check_string(output.get("filename"), "output.filename", true, &mut violations);
            }
            Some(other) => violations.push(Violation::new(
                "output",
                format!("expected a table, found {}", type_name(other)),
            )),
        }

        match root.get("components") {
            None => violations.push(Violation::missing("components")),
            Some(Value::Object(components)) => {
                for (name, id) in components {
                    self.check_component(name, id, &mut violations);
                }
            }
            Some(other) => violations.push(Violation::new(
                "components",
                format!("expected a table, found {}", type_name(other)),
            )),
        }

        match root.get("subProjects") {
            None => {}
            Some(Value::Object(sub_projects)) => {
                check_sub_projects(sub_projects, &mut violations);
            }
            Some(other) => violations.push(Violation::new(
                "subProjects",
                format!("expected a table, found {}", type_name(other)),
            )),
        }

        for key in root.keys().filter(|key| !KNOWN_KEYS.contains(&key.as_str())) {
            tracing::warn!(key = %key, "ignoring unknown configuration key");
        }

        violations
    }

    fn check_component(&self, name: &str, id: &Value, violations: &mut Vec<Violation>) {
        let field = format!("components.{name}");

        if name == FILE_SCOPE_HELPER {
            violations.push(Violation::for_component(
                name,
                field.as_str(),
                "name is reserved for the built-in file-scope helper",
            ));
        } else if !is_identifier(name) {
            violations.push(Violation::for_component(
                name,
                field.as_str(),
                "name must be a template identifier (letters, digits and '_', not starting with a digit)",
            ));
        }

        let Some(id) = id.as_str() else {
            violations.push(Violation::for_component(
                name,
                field,
                format!("expected a component id string, found {}", type_name(id)),
            ));
            return;
        };

        let attached = self
            .attached
            .and_then(|map| map.get(name))
            .is_some_and(|entry| entry.id() == id);
        if attached || self.catalog.contains(id) {
            return;
        }

        let message = match self.catalog.suggest(id) {
            Some(candidate) => format!("unknown component '{id}', did you mean '{candidate}'?"),
            None => format!(
                "unknown component '{id}' (available: {})",
                self.catalog.ids().collect::<Vec<_>>().join(", ")
            ),
        };
        violations.push(Violation::for_component(name, field, message));
    }
}

fn check_string(value: Option<&Value>, field: &str, required: bool, violations: &mut Vec<Violation>) {
    match value {
        None if required => violations.push(Violation::missing(field)),
        None => {}
        Some(Value::String(s)) if required && s.trim().is_empty() => {
            violations.push(Violation::new(field, "must not be empty"));
        }
        Some(Value::String(_)) => {}
        Some(other) => violations.push(Violation::new(
            field,
            format!("expected a string, found {}", type_name(other)),
        )),
    }
}

fn check_sub_projects(sub_projects: &Map<String, Value>, violations: &mut Vec<Violation>) {
    for (key, path) in sub_projects {
        let field = format!("subProjects.{key}");
        check_string(Some(path), &field, true, violations);

        if RESERVED_CONTEXT_KEYS.contains(&key.as_str()) {
            violations.push(Violation::new(
                field,
                format!("'{key}' is reserved in the render context"),
            ));
        }
    }
}
