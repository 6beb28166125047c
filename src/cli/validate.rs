//! The `validate` command.
//!
//! Loads a configuration the same way `build` does, including every
//! sub-project, and reports problems without rendering anything.
//!
//! # Examples
//!
//! ```bash
//! wdbuild validate
//! wdbuild validate site/wdbuild.toml --format json
//! wdbuild validate --strict
//! ```
//!
//! # Output Formats
//!
//! ```text
//! ✓ Valid wdbuild.toml
//! ⚠ Warning: partials directory does not exist: /site/src/partials
//! ```
//!
//! ```json
//! {
//!   "valid": true,
//!   "config_valid": true,
//!   "sub_projects": ["appendix"],
//!   "components": ["img"],
//!   "errors": [],
//!   "warnings": []
//! }
//! ```

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};

use super::Reported;
use crate::build::BuildOrchestrator;
use crate::config::{BuildConfiguration, DEFAULT_CONFIG_FILE};
use crate::core::{BuildError, user_friendly_error};

/// Output format for validation results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct ValidateCommand {
    /// Configuration file
    #[arg(default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Treat warnings as errors
    #[arg(long)]
    strict: bool,
}

/// Outcome of validating one configuration tree
#[derive(Debug, Default, serde::Serialize)]
pub struct ValidationResults {
    /// No errors (and no warnings in strict mode)
    pub valid: bool,
    /// The configuration and every sub-project loaded
    pub config_valid: bool,
    /// Keys of the direct sub-projects
    pub sub_projects: Vec<String>,
    /// Names of the configured components
    pub components: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidateCommand {
    pub async fn execute(self) -> Result<()> {
        let orchestrator = BuildOrchestrator::new();
        let results = match orchestrator.load(&self.config).await {
            Ok(config) => validate_loaded(&config, self.strict).await,
            Err(error) => failed(&error),
        };

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
            OutputFormat::Text => print_text(&self.config, &results),
        }

        if results.valid { Ok(()) } else { Err(Reported.into()) }
    }
}

/// Check the paths a build of `config` will read
pub async fn validate_loaded(config: &BuildConfiguration, strict: bool) -> ValidationResults {
    let mut results = ValidationResults {
        config_valid: true,
        sub_projects: config.sub_projects().iter().map(|sub| sub.key.clone()).collect(),
        components: config.components().keys().cloned().collect(),
        ..Default::default()
    };

    let mut pending = vec![config];
    while let Some(current) = pending.pop() {
        if !is_file(&current.entry_path()).await {
            results.warnings.push(format!("entry document does not exist: {}", current.entry_path().display()));
        }
        if !is_dir(&current.partials_dir()).await {
            results
                .warnings
                .push(format!("partials directory does not exist: {}", current.partials_dir().display()));
        }
        let strings = current.strings_dir().join(format!("{}.json", current.locale()));
        if !is_file(&strings).await {
            results.warnings.push(format!("strings file does not exist: {}", strings.display()));
        }
        pending.extend(current.sub_projects().iter().map(|sub| &sub.config));
    }

    results.valid = !(strict && !results.warnings.is_empty());
    results
}

fn failed(error: &BuildError) -> ValidationResults {
    let errors = match error.root() {
        BuildError::Validation {
            violations,
        } => violations.iter().map(ToString::to_string).collect(),
        _ => vec![user_friendly_error(error).to_string()],
    };
    ValidationResults {
        errors,
        ..Default::default()
    }
}

fn print_text(path: &Path, results: &ValidationResults) {
    if results.config_valid {
        println!("{} {}", "✓ Valid".green(), path.display());
    } else {
        println!("{} {}", "✗ Invalid".red(), path.display());
    }
    for error in &results.errors {
        println!("  {} {error}", "✗".red());
    }
    for warning in &results.warnings {
        println!("{} {warning}", "⚠ Warning:".yellow());
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|meta| meta.is_file())
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|meta| meta.is_dir())
}
