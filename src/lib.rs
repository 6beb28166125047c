//! wdbuild - a multi-file document build pipeline for wiki pages
//!
//! A build starts from a configuration file (`wdbuild.toml`) and renders one
//! entry document against a layered context of configuration data,
//! localized strings, service descriptions and the data of nested
//! sub-projects. Documents may include partials by name and call
//! components; components talk to build services, which finalize their
//! side effects (copying images, for example) after rendering.
//!
//! # Modules
//!
//! - [`build`] - build orchestration and render context composition
//! - [`cli`] - the `wdbuild` command line
//! - [`config`] - loading, validating and overriding build configurations
//! - [`content`] - entry document, partials and localized strings
//! - [`core`] - error taxonomy and user-facing reporting
//! - [`output`] - writing generated documents
//! - [`services`] - the service lifecycle and the built-in image service
//! - [`templating`] - the Tera renderer, file frames and components
//!
//! # Configuration
//!
//! ```toml
//! entry = "src/page.ftml"
//! partialsDir = "src/partials"
//! stringsDir = "strings"
//! locale = "en"
//! wikiName = "my-wiki"
//! pageName = "my-page"
//!
//! [output]
//! dir = "dist/{{ edition }}"
//! filename = "page.ftml"
//!
//! [components]
//! img = "image"
//!
//! [subProjects]
//! appendix = "appendix/wdbuild.toml"
//!
//! [data]
//! edition = 2
//! ```
//!
//! # Library use
//!
//! ```rust,no_run
//! use wdbuild::build::{BuildOrchestrator, BuildRequest};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), wdbuild::core::BuildError> {
//! let orchestrator = BuildOrchestrator::new();
//! let config = orchestrator.load(Path::new("wdbuild.toml")).await?;
//! if let Some(text) = orchestrator.build(BuildRequest::new(config)).await {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod build;
pub mod cli;
pub mod config;
pub mod content;
pub mod core;
pub mod output;
pub mod services;
pub mod templating;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
