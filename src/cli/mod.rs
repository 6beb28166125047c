//! Command-line interface for wdbuild.
//!
//! ```text
//! wdbuild build [CONFIG] [--set KEY=VALUE]... [--stdout] [--shared-services]
//! wdbuild validate [CONFIG] [--format text|json] [--strict]
//! ```
//!
//! `CONFIG` defaults to `wdbuild.toml` in the current directory. Global
//! `--verbose` and `--quiet` flags select the log level; `RUST_LOG` takes
//! precedence over both.

mod build;
pub mod validate;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

pub use build::BuildCommand;
pub use validate::{OutputFormat, ValidateCommand};

/// Marker for failures already reported to the user
#[derive(Debug, thiserror::Error)]
#[error("build failed")]
pub struct Reported;

#[derive(Parser)]
#[command(
    name = "wdbuild",
    about = "Build wiki pages from templates, partials and localized strings",
    version,
    long_about = "wdbuild renders a templated entry document with its partials, localized strings, \
                  components and sub-projects into one page, and copies the images the page uses."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a configuration and write its documents
    Build(BuildCommand),

    /// Load and validate a configuration without rendering
    Validate(ValidateCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        init_logging(self.log_level());

        match self.command {
            Commands::Build(cmd) => cmd.execute().await,
            Commands::Validate(cmd) => cmd.execute().await,
        }
    }

    /// Log level selected by the global flags
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }
}

/// Install the stderr log subscriber; `RUST_LOG` overrides `level`
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("wdbuild={level}")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
