//! Tera-backed rendering of one build.
//!
//! A [`TemplateRenderer`] is created fresh for every build and consumed by
//! [`TemplateRenderer::render`]; nothing registered on it leaks into another
//! build. It owns a render session shared by:
//!
//! - the file-scope helper, which maintains the session's [`FrameStack`];
//! - one adapter per configured component, registered both as a Tera
//!   function and as a Tera filter (block form).
//!
//! Tera is synchronous while components are async. Rendering therefore runs
//! on a blocking worker, and adapters drive component futures to completion
//! on the runtime handle captured when the renderer was created. The build
//! awaits the worker, so it does not continue until every component call of
//! the render has finished.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tera::Tera;
use tokio::runtime::Handle;

use super::component::{ComponentCall, ComponentContext, ComponentEntry, ComponentMap, ComponentSignature};
use super::frames::{FILE_SCOPE_HELPER, FileScopeHelper, FrameStack};
use crate::config::BuildConfiguration;
use crate::content::{LocalizedStrings, TaggedContent};
use crate::core::BuildError;
use crate::services::ServiceSet;

/// Internal name the entry document is registered under
const ENTRY_TEMPLATE: &str = "__entry";

/// What components see of the build being rendered
#[derive(Clone)]
pub struct RenderState {
    pub config: Arc<BuildConfiguration>,
    pub strings: Arc<LocalizedStrings>,
    pub services: ServiceSet,
}

struct RenderSession {
    frames: Arc<FrameStack>,
    state: OnceLock<RenderState>,
    failure: Mutex<Option<BuildError>>,
    handle: Handle,
}

impl RenderSession {
    /// Keep the first component failure; later ones are consequences of it
    fn record_failure(&self, error: BuildError) {
        let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if failure.is_none() {
            *failure = Some(error);
        }
    }

    fn take_failure(&self) -> Option<BuildError> {
        self.failure.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Renders one build's entry document with its partials and components
pub struct TemplateRenderer {
    tera: Tera,
    session: Arc<RenderSession>,
}

impl TemplateRenderer {
    /// A fresh renderer with only the file-scope helper registered.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new() -> Result<Self, BuildError> {
        let handle = Handle::try_current()
            .map_err(|e| BuildError::runtime("create renderer", format!("no async runtime available: {e}")))?;

        let frames = Arc::new(FrameStack::new());
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.register_function(FILE_SCOPE_HELPER, FileScopeHelper::new(Arc::clone(&frames)));

        Ok(Self {
            tera,
            session: Arc::new(RenderSession {
                frames,
                state: OnceLock::new(),
                failure: Mutex::new(None),
                handle,
            }),
        })
    }

    /// Frame stack of this render
    pub fn frames(&self) -> &FrameStack {
        &self.session.frames
    }

    /// Register every component under its template name, as function and filter
    pub fn register_components(&mut self, components: &ComponentMap) {
        for (name, entry) in components {
            let adapter = ComponentAdapter {
                name: Arc::from(name.as_str()),
                signature: Arc::new(entry.component().signature()),
                entry: entry.clone(),
                session: Arc::clone(&self.session),
            };
            self.tera.register_function(name, adapter.clone());
            self.tera.register_filter(name, adapter);
            tracing::debug!(name = %name, id = entry.id(), "registered component");
        }
    }

    /// Register partials, each wrapped in its own file frame
    pub fn register_partials(&mut self, partials: &BTreeMap<String, TaggedContent>) -> Result<(), BuildError> {
        let templates: Vec<(String, String)> = partials
            .iter()
            .map(|(name, content)| (name.clone(), content.wrap(&self.session.frames)))
            .collect();

        self.tera.add_raw_templates(templates).map_err(|e| BuildError::Render {
            template: "partials".to_string(),
            message: format_tera_error(&e),
            line: extract_line(&e),
        })
    }

    /// Render `entry` against `context`, which must be a JSON object.
    ///
    /// The first component failure of the render is returned as is; other
    /// engine failures become [`BuildError::Render`].
    pub async fn render(
        mut self,
        entry: &TaggedContent,
        context: &Value,
        state: RenderState,
    ) -> Result<String, BuildError> {
        let entry_name = entry.source_path().display().to_string();
        let render_error = |e: &tera::Error| BuildError::Render {
            template: entry_name.clone(),
            message: format_tera_error(e).replace(&format!("'{ENTRY_TEMPLATE}'"), &format!("'{entry_name}'")),
            line: extract_line(e),
        };

        let wrapped = entry.wrap(&self.session.frames);
        self.tera.add_raw_template(ENTRY_TEMPLATE, &wrapped).map_err(|e| render_error(&e))?;

        let tera_context = tera::Context::from_value(context.clone()).map_err(|e| render_error(&e))?;
        if self.session.state.set(state).is_err() {
            return Err(BuildError::runtime("render", "renderer was already used"));
        }

        let tera = self.tera;
        let rendered = tokio::task::spawn_blocking(move || tera.render(ENTRY_TEMPLATE, &tera_context))
            .await
            .map_err(|e| BuildError::runtime("render", format!("render worker failed: {e}")))?;

        match rendered {
            Ok(text) => {
                let depth = self.session.frames.depth();
                if depth != 0 {
                    return Err(BuildError::runtime(
                        "render",
                        format!("{depth} file frame(s) still open after rendering"),
                    ));
                }
                Ok(text)
            }
            Err(e) => Err(self.session.take_failure().unwrap_or_else(|| render_error(&e))),
        }
    }
}

/// Exposes a component to Tera
#[derive(Clone)]
struct ComponentAdapter {
    name: Arc<str>,
    signature: Arc<ComponentSignature>,
    entry: ComponentEntry,
    session: Arc<RenderSession>,
}

impl ComponentAdapter {
    fn call_component(&self, args: &HashMap<String, Value>, children: Option<String>) -> tera::Result<Value> {
        let params: Map<String, Value> = args.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        match self.run(&params, children) {
            Ok(text) => Ok(Value::String(text)),
            Err(error) => {
                let message = error.to_string();
                self.session.record_failure(error);
                Err(tera::Error::msg(message))
            }
        }
    }

    fn run(&self, params: &Map<String, Value>, children: Option<String>) -> Result<String, BuildError> {
        let name: &str = &self.name;
        self.signature.check_call(params, children.is_some()).map_err(|message| BuildError::Component {
            component: name.to_string(),
            message,
        })?;

        let state = self
            .session
            .state
            .get()
            .ok_or_else(|| BuildError::runtime("render", format!("component '{name}' called outside of a render")))?;

        let context = ComponentContext {
            current_file_path: self.session.frames.current(),
            config: Arc::clone(&state.config),
            strings: Arc::clone(&state.strings),
            services: state.services.clone(),
            children,
        };
        let call = ComponentCall {
            name,
            params,
            context: &context,
        };

        self.session
            .handle
            .block_on(self.entry.component().invoke(call))
            .map_err(|error| match error {
                BuildError::Component {
                    ..
                }
                | BuildError::Service {
                    ..
                } => error,
                other => BuildError::Component {
                    component: name.to_string(),
                    message: other.to_string(),
                },
            })
    }
}

impl tera::Function for ComponentAdapter {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        self.call_component(args, None)
    }

    fn is_safe(&self) -> bool {
        true
    }
}

impl tera::Filter for ComponentAdapter {
    fn filter(&self, value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let children = match value {
            Value::String(body) => body.clone(),
            other => other.to_string(),
        };
        self.call_component(args, Some(children))
    }

    fn is_safe(&self) -> bool {
        true
    }
}

/// Extract a line number from a Tera error.
///
/// Tera includes line:column information in parse error messages, e.g.
/// "1:7" or "864:1".
fn extract_line(error: &tera::Error) -> Option<usize> {
    let error_msg = format!("{error:?}");
    let re = Regex::new(r"(\d+):(\d+)").ok()?;
    re.captures(&error_msg)
        .and_then(|caps| caps.get(1))
        .and_then(|line| line.as_str().parse::<usize>().ok())
}

/// Format a Tera error, walking its source chain and dropping internal
/// template names and the file-scope helper.
pub fn format_tera_error(error: &tera::Error) -> String {
    use std::error::Error;

    let mut all_messages = vec![error.to_string()];
    let mut current_error: Option<&dyn Error> = error.source();
    while let Some(err) = current_error {
        all_messages.push(err.to_string());
        current_error = err.source();
    }

    let messages: Vec<String> = all_messages
        .into_iter()
        .map(|msg| {
            msg.replace("while rendering '__tera_one_off'", "")
                .replace("Failed to render '__tera_one_off'", "Template rendering failed")
                .replace("Failed to parse '__tera_one_off'", "Template syntax error")
                .replace("'__tera_one_off'", "template")
                .trim()
                .to_string()
        })
        .filter(|cleaned| {
            !cleaned.is_empty()
                && cleaned != "Template rendering failed"
                && cleaned != "Template syntax error"
                && !cleaned.contains(FILE_SCOPE_HELPER)
        })
        .collect();

    if messages.is_empty() {
        "Template syntax error (see details above)".to_string()
    } else {
        messages.join("\n  -> ")
    }
}
