//! Common test utilities for wdbuild integration tests
//!
//! Builds small sites on disk and runs the `wdbuild` binary against them.

// Not every helper is used by every test module
#![allow(dead_code)]

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

pub use wdbuild::test_utils::TestProject;

/// A 1x1 PNG, enough for copy tests
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
];

/// Configuration of a site with the `img` component and the given extra TOML
pub fn site_config(extra: &str) -> String {
    format!(
        r#"entry = "src/page.ftml"
partialsDir = "src/partials"
stringsDir = "strings"
locale = "en"
wikiName = "my-wiki"
pageName = "my-page"

[output]
dir = "dist"
filename = "page.ftml"

[components]
img = "image"
here = "current_file"
{extra}"#
    )
}

/// Lay out a site: configuration, entry, an empty partials directory and English strings
pub async fn write_site(project: &TestProject, page: &str, extra_config: &str) -> Result<()> {
    project.write_file("wdbuild.toml", &site_config(extra_config)).await?;
    project.write_file("src/page.ftml", page).await?;
    project.write_file("src/partials/.keep", "").await?;
    project.write_file("strings/en.json", r#"{"greeting": "Hello"}"#).await?;
    Ok(())
}

/// Write a binary file, creating parent directories
pub async fn write_bytes(project: &TestProject, relative: &str, bytes: &[u8]) -> Result<()> {
    let path = project.path().join(relative);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, bytes).await.with_context(|| format!("writing {}", path.display()))
}

/// Output of one binary run
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Assert the command succeeded
    pub fn assert_success(&self) -> &Self {
        assert!(self.success, "Command failed with code {:?}\nStderr: {}", self.code, self.stderr);
        self
    }

    /// Assert stdout contains the given text
    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Expected stdout to contain '{}'\nActual stdout: {}",
            text,
            self.stdout
        );
        self
    }

    /// Assert stderr contains the given text
    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Expected stderr to contain '{}'\nActual stderr: {}",
            text,
            self.stderr
        );
        self
    }
}

/// Run the `wdbuild` binary in `dir`
pub fn run_wdbuild(dir: &Path, args: &[&str]) -> Result<CommandOutput> {
    let output = Command::new(env!("CARGO_BIN_EXE_wdbuild"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .context("Failed to run wdbuild")?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        success: output.status.success(),
        code: output.status.code(),
    })
}
