//! Test utilities for wdbuild
//!
//! Helpers for tests that need a project on disk: a temporary directory,
//! a minimal build configuration and a way to lay out content files.
//!
//! # Example
//!
//! ```rust,no_run
//! use wdbuild::test_utils::TestProject;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let project = TestProject::new().await?;
//! project.write_minimal_config().await?;
//! project.write_file("src/page.ftml", "Hello").await?;
//! assert!(project.config_path().exists());
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::DEFAULT_CONFIG_FILE;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Respects `RUST_LOG` when `level` is `None`; without either, logging
/// stays off.
///
/// ```bash
/// RUST_LOG=wdbuild=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

/// Minimal valid configuration written by [`TestProject::write_minimal_config`]
pub const MINIMAL_CONFIG: &str = r#"entry = "src/page.ftml"
partialsDir = "src/partials"
stringsDir = "strings"
locale = "en"
wikiName = "my-wiki"
pageName = "Home"

[output]
dir = "dist"
filename = "page.ftml"

[components]
"#;

/// A project directory that is removed when dropped
pub struct TestProject {
    temp_dir: TempDir,
}

impl TestProject {
    pub async fn new() -> Result<Self> {
        init_test_logging(None);
        let temp_dir = TempDir::new().context("creating temporary project directory")?;
        Ok(Self {
            temp_dir,
        })
    }

    /// Project root
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of the root configuration file
    pub fn config_path(&self) -> PathBuf {
        self.path().join(DEFAULT_CONFIG_FILE)
    }

    /// Write `content` to `relative`, creating parent directories
    pub async fn write_file(&self, relative: impl AsRef<Path>, content: &str) -> Result<PathBuf> {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(&path, content).await.with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    pub async fn read_file(&self, relative: impl AsRef<Path>) -> Result<String> {
        let path = self.path().join(relative);
        tokio::fs::read_to_string(&path).await.with_context(|| format!("reading {}", path.display()))
    }

    /// Write [`MINIMAL_CONFIG`] as the root configuration
    pub async fn write_minimal_config(&self) -> Result<PathBuf> {
        self.write_file(DEFAULT_CONFIG_FILE, MINIMAL_CONFIG).await
    }

    /// Write a minimal configuration at `relative` with the given sub-projects
    pub async fn write_sub_project_config(&self, relative: &str, sub_projects: &[(&str, &str)]) -> Result<PathBuf> {
        let mut content = MINIMAL_CONFIG.to_string();
        content.push_str("\n[subProjects]\n");
        for (key, path) in sub_projects {
            content.push_str(&format!("{key} = \"{path}\"\n"));
        }
        self.write_file(relative, &content).await
    }
}
