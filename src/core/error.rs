//! Error handling for wdbuild
//!
//! The error system is built around two types:
//! - [`BuildError`] - one tagged enum for every failure a build can produce,
//!   with a [`BuildError::kind`] discriminant so the reporting boundary can
//!   match exhaustively instead of probing error types.
//! - [`ErrorContext`] - a user-facing rendering of an error with optional
//!   details and a suggestion, printed with terminal colors.
//!
//! Library entry points return `Result<_, BuildError>`. The CLI and the
//! error-swallowing [`crate::build::BuildOrchestrator::build`] wrapper hand
//! failures to [`report`], which groups validation violations by the
//! component they came from.
//!
//! # Examples
//!
//! ```rust,no_run
//! use wdbuild::core::{BuildError, ErrorKind, Violation};
//!
//! let error = BuildError::Validation {
//!     violations: vec![
//!         Violation::missing("entry"),
//!         Violation::for_component("img", "components.img", "unknown component 'imag'"),
//!     ],
//! };
//! assert_eq!(error.kind(), ErrorKind::Validation);
//! wdbuild::core::report(&error);
//! ```

use colored::Colorize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use super::file_error::FileOperationError;

/// Discriminant of [`BuildError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A config source could not be read or decoded
    ConfigLoad,
    /// A config did not match the required shape
    Validation,
    /// A sub-project failed to load or build
    SubProject,
    /// A content filesystem step failed
    ContentLoad,
    /// Persisting the generated document failed
    Output,
    /// A service hook or operation failed
    Service,
    /// A user component failed during rendering
    Component,
    /// The template engine rejected or failed to render a template
    Render,
    /// A pipeline step failed for a reason outside the categories above
    Runtime,
}

/// A single shape violation found while validating a configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Component the violation originates from, if any
    pub component: Option<String>,
    /// Dotted path of the offending field
    pub field: String,
    /// What is wrong with it
    pub message: String,
}

impl Violation {
    /// A violation that belongs to the configuration itself
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: None,
            field: field.into(),
            message: message.into(),
        }
    }

    /// A required field that is absent
    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, "required field is missing")
    }

    /// A violation tagged with the component it comes from
    pub fn for_component(
        component: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            component: Some(component.into()),
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`: {}", self.field, self.message)
    }
}

/// A resource whose finalize copy failed; the build still succeeds
#[derive(Debug, Clone)]
pub struct ResourceFailure {
    /// Service that registered the resource
    pub service: String,
    /// Registered input path
    pub input: PathBuf,
    /// Destination path
    pub output: PathBuf,
    /// Why the copy failed
    pub reason: String,
}

/// The error type for every build operation
#[derive(Error, Debug)]
pub enum BuildError {
    /// The config source could not be resolved, read or decoded
    #[error("Failed to load configuration '{}': {reason}", path.display())]
    ConfigLoad {
        /// Config source that failed
        path: PathBuf,
        /// Why it failed
        reason: String,
    },

    /// The configuration does not have the required shape
    #[error("Configuration is invalid ({} problem(s))", violations.len())]
    Validation {
        /// Every violation found, in discovery order
        violations: Vec<Violation>,
    },

    /// A sub-project failed; the failing config path is kept for diagnosis
    #[error("Sub-project '{key}' ({}) failed: {source}", path.display())]
    SubProject {
        /// Key of the sub-project in the parent's `subProjects`
        key: String,
        /// Config path of the sub-project
        path: PathBuf,
        /// The underlying failure
        #[source]
        source: Box<BuildError>,
    },

    /// A filesystem step while loading content failed
    #[error(transparent)]
    ContentLoad(FileOperationError),

    /// A filesystem step while writing the output failed
    #[error("Failed to write output: {0}")]
    Output(#[source] FileOperationError),

    /// A named service failed
    #[error("Service '{service}' failed: {message}")]
    Service {
        /// Name of the failing service
        service: String,
        /// What went wrong
        message: String,
        /// Remediation hint for the operator
        hint: Option<String>,
    },

    /// A component raised during rendering
    #[error("Component '{component}' failed: {message}")]
    Component {
        /// Name the component is registered under
        component: String,
        /// What went wrong
        message: String,
    },

    /// The template engine failed
    #[error("Failed to render '{template}': {message}")]
    Render {
        /// Template being rendered
        template: String,
        /// Cleaned-up engine message
        message: String,
        /// Line of the failure, when the engine reported one
        line: Option<usize>,
    },

    /// A pipeline step failed
    #[error("Build step '{step}' failed: {message}")]
    Runtime {
        /// The step that failed
        step: String,
        /// What went wrong
        message: String,
    },
}

impl BuildError {
    /// Discriminant of this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            BuildError::ConfigLoad {
                ..
            } => ErrorKind::ConfigLoad,
            BuildError::Validation {
                ..
            } => ErrorKind::Validation,
            BuildError::SubProject {
                ..
            } => ErrorKind::SubProject,
            BuildError::ContentLoad(_) => ErrorKind::ContentLoad,
            BuildError::Output(_) => ErrorKind::Output,
            BuildError::Service {
                ..
            } => ErrorKind::Service,
            BuildError::Component {
                ..
            } => ErrorKind::Component,
            BuildError::Render {
                ..
            } => ErrorKind::Render,
            BuildError::Runtime {
                ..
            } => ErrorKind::Runtime,
        }
    }

    /// Shorthand for a [`BuildError::Runtime`]
    pub fn runtime(step: impl Into<String>, message: impl Into<String>) -> Self {
        BuildError::Runtime {
            step: step.into(),
            message: message.into(),
        }
    }

    /// The innermost error, looking through sub-project wrappers
    #[must_use]
    pub fn root(&self) -> &BuildError {
        match self {
            BuildError::SubProject {
                source,
                ..
            } => source.root(),
            other => other,
        }
    }

    /// Chain of sub-project keys leading to the root error, outermost first
    #[must_use]
    pub fn sub_project_chain(&self) -> Vec<(&str, &PathBuf)> {
        let mut chain = Vec::new();
        let mut current = self;
        while let BuildError::SubProject {
            key,
            path,
            source,
        } = current
        {
            chain.push((key.as_str(), path));
            current = source;
        }
        chain
    }
}

/// User-facing rendering of a [`BuildError`]
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Headline message
    pub message: String,
    /// Optional additional details about the error
    pub details: Option<String>,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
}

impl ErrorContext {
    /// Create a context with only a headline
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
            suggestion: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print to stderr with colors: error in red, details in yellow, suggestion in green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Group violations by originating component; configuration-level violations
/// are keyed by `None` and sort first
#[must_use]
pub fn group_violations(violations: &[Violation]) -> BTreeMap<Option<&str>, Vec<&Violation>> {
    let mut grouped: BTreeMap<Option<&str>, Vec<&Violation>> = BTreeMap::new();
    for violation in violations {
        grouped.entry(violation.component.as_deref()).or_default().push(violation);
    }
    grouped
}

fn format_violations(violations: &[Violation]) -> String {
    let mut msg = String::new();
    for (component, entries) in group_violations(violations) {
        match component {
            Some(name) => msg.push_str(&format!("\n  component '{name}':")),
            None => msg.push_str("\n  build configuration:"),
        }
        for violation in entries {
            msg.push_str(&format!("\n    - {violation}"));
        }
    }
    msg
}

/// Map a [`BuildError`] to a user-facing [`ErrorContext`]
#[must_use]
pub fn user_friendly_error(error: &BuildError) -> ErrorContext {
    let chain = error.sub_project_chain();
    let root = error.root();

    let mut context = match root {
        BuildError::ConfigLoad {
            path,
            reason,
        } => ErrorContext::new(root.to_string())
            .with_details(reason.clone())
            .with_suggestion(format!(
                "Check that '{}' exists and is valid TOML (or JSON for .json files)",
                path.display()
            )),

        BuildError::Validation {
            violations,
        } => ErrorContext::new(root.to_string())
            .with_details(format_violations(violations))
            .with_suggestion("Fix every listed field; all problems are reported at once"),

        BuildError::ContentLoad(file_error) => {
            ErrorContext::new(format!("Failed to load content: {}", file_error.operation))
                .with_details(file_error.user_message())
                .with_suggestion(
                    "Check entry, partialsDir and stringsDir; they resolve relative to the config file",
                )
        }

        BuildError::Output(file_error) => ErrorContext::new(root.to_string())
            .with_details(file_error.user_message())
            .with_suggestion("Check that the output directory is writable"),

        BuildError::Service {
            hint,
            ..
        } => {
            let context = ErrorContext::new(root.to_string());
            match hint {
                Some(hint) => context.with_suggestion(hint.clone()),
                None => context,
            }
        }

        BuildError::Component {
            component,
            ..
        } => ErrorContext::new(root.to_string()).with_suggestion(format!(
            "Check the arguments passed to '{component}' in the template"
        )),

        BuildError::Render {
            line,
            ..
        } => {
            let context = ErrorContext::new(root.to_string()).with_suggestion(
                "Check template syntax: variables use {{ var }}, control flow uses {% %}, \
                 partials are included with {% include \"name\" %}",
            );
            match line {
                Some(line) => context.with_details(format!("Line: {line}")),
                None => context,
            }
        }

        BuildError::Runtime {
            ..
        } => ErrorContext::new(root.to_string()),

        BuildError::SubProject {
            ..
        } => ErrorContext::new(root.to_string()),
    };

    if !chain.is_empty() {
        let path = chain
            .iter()
            .map(|(key, path)| format!("{key} ({})", path.display()))
            .collect::<Vec<_>>()
            .join(" -> ");
        context.message = format!("{} [in sub-project {path}]", context.message);
    }

    context
}

/// Print a [`BuildError`] for the operator
pub fn report(error: &BuildError) {
    tracing::debug!(kind = ?error.kind(), "reporting build error");
    user_friendly_error(error).display();
}
