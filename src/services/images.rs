//! The `images` service and the built-in `image` component.
//!
//! Templates reference local image files; the service gives each one a
//! unique output file name and a wiki reference URL while the document
//! renders, then copies every registered file into the output directory
//! once rendering has completed.
//!
//! ```text
//! [[image {{ img(src="images/logo.png") }}]]
//! ```
//!
//! renders as
//!
//! ```text
//! [[image http://my-wiki.wikidot.com/local--files/my-page/logo.png]]
//! ```
//!
//! # Lifecycle
//!
//! `Empty -> Accumulating -> Finalizing -> Done`. Registering the same input
//! twice returns the reference assigned the first time. Two different
//! inputs with the same file name get `logo.png` and `logo_1.png`.
//! Registration is refused once finalization has started.

use futures::future::FutureExt;
use serde_json::{Value, json};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::path::{Component as PathComponent, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{HookFuture, Service, ServiceFactory};
use crate::config::BuildConfiguration;
use crate::core::{BuildError, FileOperation, FileOperationContext, FileOperationError, ResourceFailure};
use crate::templating::component::{Component, ComponentCall, ComponentFuture, ComponentSignature};

/// Name of the image service
pub const IMAGE_SERVICE: &str = "images";

/// Lifecycle phase of an [`ImageService`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePhase {
    Empty,
    Accumulating,
    Finalizing,
    Done,
}

/// An image registered during rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredImage {
    /// Normalized absolute source path; the registration key
    pub input: PathBuf,
    /// Destination inside the output directory
    pub output: PathBuf,
}

#[derive(Debug)]
struct ImageRegistry {
    phase: ImagePhase,
    by_input: HashMap<PathBuf, String>,
    claimed: HashSet<String>,
    images: Vec<RegisteredImage>,
    failures: Vec<ResourceFailure>,
}

impl ImageRegistry {
    fn new() -> Self {
        Self {
            phase: ImagePhase::Empty,
            by_input: HashMap::new(),
            claimed: HashSet::new(),
            images: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// The file's own name, or `<stem>_N<.ext>` with the first free N
    fn claim_name(&mut self, file_name: &str) -> String {
        if self.claimed.insert(file_name.to_string()) {
            return file_name.to_string();
        }

        let path = Path::new(file_name);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(file_name);
        let extension = path.extension().and_then(|e| e.to_str());

        let mut n = 1usize;
        loop {
            let candidate = match extension {
                Some(ext) => format!("{stem}_{n}.{ext}"),
                None => format!("{stem}_{n}"),
            };
            if self.claimed.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Collects images during rendering and copies them afterwards
pub struct ImageService {
    output_dir: PathBuf,
    wiki_name: Option<String>,
    page_name: Option<String>,
    registry: Mutex<ImageRegistry>,
}

impl ImageService {
    pub fn new(output_dir: impl Into<PathBuf>, wiki_name: Option<String>, page_name: Option<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            wiki_name,
            page_name,
            registry: Mutex::new(ImageRegistry::new()),
        }
    }

    /// Service for `config`'s output directory and wiki page
    pub fn from_config(config: &BuildConfiguration) -> Self {
        Self::new(
            config.output_dir(),
            config.wiki_name().map(str::to_string),
            config.page_name().map(str::to_string),
        )
    }

    fn lock(&self) -> MutexGuard<'_, ImageRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> ImagePhase {
        self.lock().phase
    }

    /// Registered images, in registration order
    pub fn registered(&self) -> Vec<RegisteredImage> {
        self.lock().images.clone()
    }

    /// Reference URL of an output file
    pub fn reference(&self, file_name: &str) -> Result<String, BuildError> {
        let (Some(wiki), Some(page)) = (self.wiki_name.as_deref(), self.page_name.as_deref()) else {
            return Err(BuildError::Service {
                service: IMAGE_SERVICE.to_string(),
                message: "image references need both wikiName and pageName".to_string(),
                hint: Some("Set wikiName and pageName in the build configuration".to_string()),
            });
        };
        Ok(format!("http://{wiki}.wikidot.com/local--files/{page}/{file_name}"))
    }

    /// Register `input` and return its reference URL
    pub fn register(&self, input: &Path) -> Result<String, BuildError> {
        let input = normalize(input);
        let mut registry = self.lock();

        if matches!(registry.phase, ImagePhase::Finalizing | ImagePhase::Done) {
            return Err(self.error(format!(
                "cannot register '{}' after images were finalized",
                input.display()
            )));
        }

        if let Some(name) = registry.by_input.get(&input) {
            return self.reference(name);
        }

        let file_name = input
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| self.error(format!("'{}' has no usable file name", input.display())))?;

        // wiki settings are checked before a name is claimed
        self.reference(file_name)?;
        let name = registry.claim_name(file_name);
        let reference = self.reference(&name)?;

        if name != file_name {
            tracing::info!(
                input = %input.display(),
                output = %name,
                "image file name already used in this build, renamed"
            );
        }

        registry.by_input.insert(input.clone(), name.clone());
        registry.images.push(RegisteredImage {
            input,
            output: self.output_dir.join(&name),
        });
        registry.phase = ImagePhase::Accumulating;
        Ok(reference)
    }

    /// Copies that failed during the last finalization
    pub fn failures(&self) -> Vec<ResourceFailure> {
        self.lock().failures.clone()
    }

    /// Copy every registered image. A failed copy is logged once and
    /// recorded; it does not stop the remaining copies or the build.
    async fn finalize(&self) -> Result<(), BuildError> {
        let images = {
            let mut registry = self.lock();
            registry.phase = ImagePhase::Finalizing;
            registry.failures.clear();
            registry.images.clone()
        };

        if !images.is_empty() {
            if let Err(e) = tokio::fs::create_dir_all(&self.output_dir).await {
                tracing::warn!(
                    service = IMAGE_SERVICE,
                    dir = %self.output_dir.display(),
                    error = %e,
                    "cannot create output directory for images"
                );
            }
        }

        let mut failures = Vec::new();
        for image in &images {
            match tokio::fs::copy(&image.input, &image.output).await {
                Ok(_) => tracing::debug!(
                    input = %image.input.display(),
                    output = %image.output.display(),
                    "copied image"
                ),
                Err(e) => {
                    let context =
                        FileOperationContext::new(FileOperation::Copy, &image.input, "finalizing image", IMAGE_SERVICE)
                            .with_related_path(&image.output);
                    let file_error = FileOperationError::new(context, e);
                    tracing::error!(
                        service = IMAGE_SERVICE,
                        input = %image.input.display(),
                        output = %image.output.display(),
                        error = %file_error.source,
                        "failed to copy image"
                    );
                    failures.push(ResourceFailure {
                        service: IMAGE_SERVICE.to_string(),
                        input: image.input.clone(),
                        output: image.output.clone(),
                        reason: file_error.user_message(),
                    });
                }
            }
        }

        let mut registry = self.lock();
        registry.phase = ImagePhase::Done;
        registry.failures = failures;
        Ok(())
    }
}

impl Service for ImageService {
    fn name(&self) -> &str {
        IMAGE_SERVICE
    }

    fn before_build(&self) -> HookFuture<'_> {
        async move {
            *self.lock() = ImageRegistry::new();
            Ok(())
        }
        .boxed()
    }

    fn after_build(&self) -> HookFuture<'_> {
        self.finalize().boxed()
    }

    fn resource_failures(&self) -> Vec<ResourceFailure> {
        self.failures()
    }

    fn describe(&self) -> Value {
        let base_url = self.reference("").ok();
        json!({
            "outputDir": self.output_dir.display().to_string(),
            "baseUrl": base_url,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Creates an [`ImageService`] per build
pub struct ImageServiceFactory;

impl ServiceFactory for ImageServiceFactory {
    fn name(&self) -> &str {
        IMAGE_SERVICE
    }

    fn create(&self, config: &BuildConfiguration) -> Result<Arc<dyn Service>, BuildError> {
        Ok(Arc::new(ImageService::from_config(config)))
    }
}

/// Built-in `image` component
///
/// Resolves `src` against the directory of the file that calls it and
/// renders the reference URL of the registered image.
pub struct ImageComponent;

impl Component for ImageComponent {
    fn signature(&self) -> ComponentSignature {
        ComponentSignature::new().required("src")
    }

    fn invoke<'a>(&'a self, call: ComponentCall<'a>) -> ComponentFuture<'a> {
        async move {
            let src = call.str_param("src")?;
            let service = call
                .context
                .services
                .get_as::<ImageService>(IMAGE_SERVICE)
                .ok_or_else(|| call.error("the images service is not available in this build"))?;

            service.register(&call.context.current_dir().join(src))
        }
        .boxed()
    }
}

/// Lexically remove `.` and `..` so equivalent spellings share one key
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            PathComponent::CurDir => {}
            PathComponent::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}
