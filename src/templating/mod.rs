//! Template rendering for wdbuild builds.
//!
//! Templates use Tera syntax. A build renders one entry document; files in
//! the partials directory can be included by file stem
//! (`{% include "header" %}`), and configured components are callable both
//! as functions and as filter blocks.
//!
//! # Modules
//!
//! - [`component`] - the component contract, catalog and built-ins
//! - [`frames`] - per-render tracking of the file being evaluated
//! - [`renderer`] - the Tera instance of one build
//! - [`utils`] - JSON helpers shared with configuration handling
//!
//! # Example template
//!
//! ```text
//! {% include "header" %}
//! {{ greeting }}, {{ config.pageName }}!
//!
//! [[image {{ img(src="images/logo.png") }}]]
//!
//! Appendix edition: {{ appendix.edition }}
//! ```

pub mod component;
pub mod frames;
pub mod renderer;
pub mod utils;

pub use component::{
    Component, ComponentCall, ComponentCatalog, ComponentContext, ComponentEntry, ComponentFuture,
    ComponentMap, ComponentSignature,
};
pub use frames::{FILE_SCOPE_HELPER, FrameStack};
pub use renderer::{RenderState, TemplateRenderer};
pub use utils::deep_merge_json;
