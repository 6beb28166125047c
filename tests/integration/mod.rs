//! Integration test suite for wdbuild
//!
//! End-to-end tests that lay out sites in temporary directories and build
//! them through the library API or the `wdbuild` binary.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **cli**: the `build` and `validate` commands
//! - **config_loading**: loading, validation and interpolation on disk
//! - **images**: image registration, renaming and finalization
//! - **pipeline**: end-to-end builds, strings, partials and components
//! - **services**: service ownership and hook invocation
//! - **sub_projects**: nested builds and their data

#[path = "../common/mod.rs"]
mod common;

mod cli;
mod images;
mod pipeline;
mod services;
mod sub_projects;
