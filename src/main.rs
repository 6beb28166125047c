//! wdbuild CLI entry point
//!
//! Parses arguments, runs the command and turns failures into a non-zero
//! exit code:
//! - `build` - render a configuration and write its documents
//! - `validate` - load and check a configuration without rendering

use anyhow::Result;
use clap::Parser;
use wdbuild::cli::{self, Reported};
use wdbuild::core::{BuildError, ErrorContext, report};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            if let Some(error) = e.downcast_ref::<BuildError>() {
                report(error);
            } else if e.downcast_ref::<Reported>().is_none() {
                ErrorContext::new(format!("{e:#}")).display();
            }
            std::process::exit(1);
        }
    }
}
