//! Persisting generated documents.
//!
//! The document of a build is written to `<output.dir>/<output.filename>`.
//! The directory is created recursively when missing and an existing file
//! is overwritten. Creating the directory, creating the file, writing and
//! closing (flush and sync) fail separately, each as
//! [`BuildError::Output`] naming the path and the step.

use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::config::BuildConfiguration;
use crate::core::{BuildError, FileOperation, FileResultExt};

const CALLER: &str = "output writer";

/// Writes generated documents
pub struct OutputWriter;

impl OutputWriter {
    /// Create the output directory of `config` if needed; idempotent
    pub async fn ensure_output_dir(config: &BuildConfiguration) -> Result<PathBuf, BuildError> {
        let dir = config.output_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_file_context(FileOperation::CreateDir, &dir, "creating output directory", CALLER)
            .map_err(BuildError::Output)?;
        Ok(dir)
    }

    /// Write `text` as the document of `config` and return its path
    pub async fn write(config: &BuildConfiguration, text: &str) -> Result<PathBuf, BuildError> {
        Self::ensure_output_dir(config).await?;
        let path = config.output_file();
        let purpose = "writing generated document";

        let mut file = tokio::fs::File::create(&path)
            .await
            .with_file_context(FileOperation::CreateFile, &path, purpose, CALLER)
            .map_err(BuildError::Output)?;

        file.write_all(text.as_bytes())
            .await
            .with_file_context(FileOperation::Write, &path, purpose, CALLER)
            .map_err(BuildError::Output)?;

        file.flush()
            .await
            .with_file_context(FileOperation::Close, &path, purpose, CALLER)
            .map_err(BuildError::Output)?;
        file.sync_all()
            .await
            .with_file_context(FileOperation::Close, &path, purpose, CALLER)
            .map_err(BuildError::Output)?;

        tracing::info!(path = %path.display(), bytes = text.len(), "wrote document");
        Ok(path)
    }
}
