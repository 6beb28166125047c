//! One-shot interpolation of output path templates.
//!
//! `output.dir` and `output.filename` may reference top-level `data` keys
//! (`dist/{{ edition }}`). They are rendered exactly once, while the
//! configuration is loaded, with a throwaway Tera instance that knows no
//! components, partials or strings.

use serde_json::Value;
use tera::{Context, Tera};

use crate::core::BuildError;
use crate::templating::renderer::format_tera_error;

/// Renders path templates against configuration data
pub struct PathInterpolator;

impl PathInterpolator {
    /// Whether `template` contains template syntax at all
    pub fn is_template(template: &str) -> bool {
        template.contains("{{") || template.contains("{%") || template.contains("{#")
    }

    /// Render `template` with the top-level keys of `data` as variables.
    ///
    /// Strings without template syntax are returned unchanged. A non-object
    /// `data` value provides no variables.
    pub fn interpolate(template: &str, data: &Value) -> Result<String, BuildError> {
        if !Self::is_template(template) {
            return Ok(template.to_string());
        }

        let context = match data {
            Value::Object(_) => Context::from_value(data.clone()),
            _ => Ok(Context::new()),
        }
        .map_err(|e| BuildError::Render {
            template: template.to_string(),
            message: format_tera_error(&e),
            line: None,
        })?;

        Tera::one_off(template, &context, false).map_err(|e| BuildError::Render {
            template: template.to_string(),
            message: format_tera_error(&e),
            line: None,
        })
    }
}
