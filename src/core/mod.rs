//! Core types shared by every part of the build pipeline
//!
//! - [`error`] - the [`BuildError`] taxonomy and user-facing reporting
//! - [`file_error`] - structured filesystem failures naming path and step

pub mod error;
pub mod file_error;

pub use error::{
    BuildError, ErrorContext, ErrorKind, ResourceFailure, Violation, group_violations, report,
    user_friendly_error,
};
pub use file_error::{FileOperation, FileOperationContext, FileOperationError, FileResultExt};
