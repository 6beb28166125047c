//! Structured file system error handling for builds
//!
//! Every filesystem step the pipeline performs (listing partials, opening and
//! reading content, creating the output file, copying images) captures its
//! context at the operation site, so a failure names the exact path, the
//! step that was attempted and who attempted it.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Filesystem steps that can fail independently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    /// Opening a directory for listing
    OpenDir,
    /// Reading the next entry of an opened directory
    ReadDirEntry,
    /// Opening a file for reading
    OpenFile,
    /// Reading the contents of an opened file
    Read,
    /// Turning a relative path into an absolute one
    Resolve,
    /// Decoding file contents (JSON, TOML)
    Parse,
    /// Creating a directory (recursively)
    CreateDir,
    /// Creating or truncating a file for writing
    CreateFile,
    /// Writing to an opened file
    Write,
    /// Flushing and closing a written file
    Close,
    /// Copying a file to its destination
    Copy,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FileOperation::OpenDir => "opening directory",
            FileOperation::ReadDirEntry => "reading directory entry",
            FileOperation::OpenFile => "opening file",
            FileOperation::Read => "reading file",
            FileOperation::Resolve => "resolving path",
            FileOperation::Parse => "parsing file",
            FileOperation::CreateDir => "creating directory",
            FileOperation::CreateFile => "creating file",
            FileOperation::Write => "writing file",
            FileOperation::Close => "closing file",
            FileOperation::Copy => "copying file",
        };
        f.write_str(name)
    }
}

/// Detailed file operation context for better error messages
#[derive(Debug, Clone)]
pub struct FileOperationContext {
    /// The step being performed
    pub operation: FileOperation,
    /// The path being accessed
    pub file_path: PathBuf,
    /// Why the path is being accessed
    pub purpose: String,
    /// The pipeline part that initiated the operation
    pub caller: String,
    /// Related paths (destination of a copy, config directory, ...)
    pub related_paths: Vec<PathBuf>,
}

impl FileOperationContext {
    /// Create a new file operation context
    pub fn new(
        operation: FileOperation,
        file_path: impl Into<PathBuf>,
        purpose: impl Into<String>,
        caller: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            file_path: file_path.into(),
            purpose: purpose.into(),
            caller: caller.into(),
            related_paths: Vec::new(),
        }
    }

    /// Add a related path for context
    pub fn with_related_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.related_paths.push(path.into());
        self
    }
}

/// A failed filesystem step with full context
#[derive(Error, Debug)]
#[error("{operation} '{}' failed ({caller}: {purpose}): {source}", file_path.display())]
pub struct FileOperationError {
    /// The step that failed
    pub operation: FileOperation,
    /// The path that was being accessed
    pub file_path: PathBuf,
    /// Why the path was being accessed
    pub purpose: String,
    /// What initiated the operation
    pub caller: String,
    /// The underlying IO error
    #[source]
    pub source: std::io::Error,
    /// Related paths for additional context
    pub related_paths: Vec<PathBuf>,
}

impl FileOperationError {
    /// Create a new file operation error from context and IO error
    pub fn new(context: FileOperationContext, source: std::io::Error) -> Self {
        Self {
            operation: context.operation,
            file_path: context.file_path,
            purpose: context.purpose,
            caller: context.caller,
            source,
            related_paths: context.related_paths,
        }
    }

    /// Wrap a decoding failure (which is not an IO error) as a `Parse` step failure
    pub fn parse(
        file_path: impl Into<PathBuf>,
        purpose: impl Into<String>,
        caller: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        let context = FileOperationContext::new(FileOperation::Parse, file_path, purpose, caller);
        Self::new(
            context,
            std::io::Error::new(std::io::ErrorKind::InvalidData, reason.to_string()),
        )
    }

    /// Get a user-friendly error message with context
    pub fn user_message(&self) -> String {
        let mut message = format!(
            "Failed {} '{}' for {} ({})",
            self.operation,
            self.file_path.display(),
            self.purpose,
            self.caller
        );

        match self.source.kind() {
            std::io::ErrorKind::NotFound => {
                message.push_str("\n\nThe path does not exist.");
                if matches!(self.operation, FileOperation::OpenDir) {
                    message.push_str("\nCheck the directory setting in the build configuration.");
                }
            }
            std::io::ErrorKind::PermissionDenied => {
                message.push_str(&format!(
                    "\n\nPermission denied. Check permissions for: {}",
                    self.file_path.display()
                ));
            }
            std::io::ErrorKind::InvalidData => {
                message.push_str(&format!("\n\nThe file contains invalid data: {}", self.source));
            }
            _ => {
                message.push_str(&format!("\n\nError details: {}", self.source));
            }
        }

        if !self.related_paths.is_empty() {
            message.push_str("\n\nRelated paths:");
            for path in &self.related_paths {
                message.push_str(&format!("\n  - {}", path.display()));
            }
        }

        message
    }
}

/// Extension trait for Result types to add file operation context
pub trait FileResultExt<T> {
    /// Add file operation context to a Result
    fn with_file_context(
        self,
        operation: FileOperation,
        file_path: impl Into<PathBuf>,
        purpose: impl Into<String>,
        caller: impl Into<String>,
    ) -> Result<T, FileOperationError>;
}

impl<T> FileResultExt<T> for Result<T, std::io::Error> {
    fn with_file_context(
        self,
        operation: FileOperation,
        file_path: impl Into<PathBuf>,
        purpose: impl Into<String>,
        caller: impl Into<String>,
    ) -> Result<T, FileOperationError> {
        self.map_err(|io_error| {
            let context = FileOperationContext::new(operation, file_path, purpose, caller);
            FileOperationError::new(context, io_error)
        })
    }
}

/// Resolve `path` to an absolute path without touching the filesystem
pub fn absolute_path(path: &Path, purpose: &str, caller: &str) -> Result<PathBuf, FileOperationError> {
    std::path::absolute(path).with_file_context(FileOperation::Resolve, path, purpose, caller)
}
