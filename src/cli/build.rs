//! The `build` command.

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::build::{BuildOrchestrator, BuildRequest, SubProjectServices};
use crate::config::DEFAULT_CONFIG_FILE;
use crate::templating::utils::insert_dotted;

/// Render a configuration and write its documents.
///
/// # Examples
///
/// ```bash
/// wdbuild build
/// wdbuild build site/wdbuild.toml --set locale=de --set data.edition=3
/// wdbuild build --stdout > page.ftml
/// ```
#[derive(Args)]
pub struct BuildCommand {
    /// Configuration file
    #[arg(default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override a configuration value (`KEY=VALUE`, dotted keys allowed)
    ///
    /// VALUE is parsed as JSON when possible and taken as a string otherwise.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Print the rendered document instead of writing files
    #[arg(long)]
    stdout: bool,

    /// Let sub-projects share the root build's services
    #[arg(long)]
    shared_services: bool,
}

impl BuildCommand {
    pub async fn execute(self) -> Result<()> {
        let overrides = parse_overrides(&self.overrides)?;
        let mode = if self.shared_services {
            SubProjectServices::Shared
        } else {
            SubProjectServices::Independent
        };
        let orchestrator = BuildOrchestrator::new().with_sub_project_services(mode);

        let config = orchestrator.load(&self.config).await?;
        let request = BuildRequest::new(config).with_overrides(overrides);

        if self.stdout {
            let output = orchestrator.try_build(request).await?;
            print!("{}", output.text);
            return Ok(());
        }

        let output = orchestrator.try_build_and_write(request).await?;
        for document in output.documents() {
            eprintln!("{} {}", "✓ wrote".green(), document.output_path.display());
        }
        Ok(())
    }
}

/// Collect `KEY=VALUE` pairs into one override object
pub(crate) fn parse_overrides(pairs: &[String]) -> Result<Value> {
    if pairs.is_empty() {
        return Ok(Value::Null);
    }

    let mut overrides = Map::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .with_context(|| format!("invalid override '{pair}', expected KEY=VALUE"))?;
        let key = key.trim();
        if key.is_empty() || key.split('.').any(str::is_empty) {
            bail!("invalid override key '{key}'");
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        insert_dotted(&mut overrides, key, value);
    }
    Ok(Value::Object(overrides))
}
