//! Content loading: entry document, partials and localized strings.
//!
//! Every piece of template text is loaded as [`TaggedContent`], which keeps
//! the absolute path of the file it came from. Before the text is handed to
//! the template engine it is wrapped so that evaluating it pushes that path
//! onto the render's frame stack; components read the top of the stack to
//! learn which file they were called from.
//!
//! Each filesystem step is a separate failure point (opening the partials
//! directory, reading one of its entries, opening a file, reading it,
//! resolving a path, decoding strings) and is reported once, with the path
//! and the step, as [`BuildError::ContentLoad`]. Nothing is retried.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

use crate::config::BuildConfiguration;
use crate::core::file_error::absolute_path;
use crate::core::{BuildError, FileOperation, FileOperationError, FileResultExt};
use crate::templating::frames::{FILE_SCOPE_HELPER, FrameStack};

const CALLER: &str = "content registry";

/// Template text tagged with the absolute path it was loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedContent {
    source_path: PathBuf,
    body: String,
}

impl TaggedContent {
    pub fn new(source_path: impl Into<PathBuf>, body: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            body: body.into(),
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Template text that enters this content's file frame, evaluates the
    /// body and leaves the frame again.
    ///
    /// Leading `{% import %}` and `{% extends %}` tags (and comments between
    /// them) stay in front of the frame marker, since the engine only
    /// accepts them at the very start of a template. The blocks of a
    /// template that extends another render outside its own frame.
    pub fn wrap(&self, frames: &FrameStack) -> String {
        let id = frames.register_file(self.source_path.clone());
        let (header, body) = self.body.split_at(header_len(&self.body));
        format!(
            "{header}{{{{ {FILE_SCOPE_HELPER}(enter={id}) }}}}{body}{{{{ {FILE_SCOPE_HELPER}(exit={id}) }}}}"
        )
    }
}

/// Length of the leading run of `import`/`extends` tags and comments
fn header_len(text: &str) -> usize {
    let mut end = 0;
    loop {
        let rest = &text[end..];
        let tag = rest.trim_start();
        let skipped = rest.len() - tag.len();

        let closed = if let Some(comment) = tag.strip_prefix("{#") {
            comment.find("#}").map(|close| 2 + close + 2)
        } else if let Some(inner) = tag.strip_prefix("{%") {
            let keyword = inner.trim_start_matches('-').trim_start();
            let is_header = ["import", "extends"].iter().any(|word| {
                keyword
                    .strip_prefix(word)
                    .is_some_and(|after| after.starts_with(char::is_whitespace))
            });
            if is_header {
                inner.find("%}").map(|close| 2 + close + 2)
            } else {
                None
            }
        } else {
            None
        };

        match closed {
            Some(len) => end += skipped + len,
            None => return end,
        }
    }
}

/// String table of one locale
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalizedStrings {
    source_path: PathBuf,
    table: Map<String, Value>,
}

impl LocalizedStrings {
    pub fn new(source_path: impl Into<PathBuf>, table: Map<String, Value>) -> Self {
        Self {
            source_path: source_path.into(),
            table,
        }
    }

    /// File the table was read from
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.table.get(key)
    }

    /// Top-level entries
    pub fn table(&self) -> &Map<String, Value> {
        &self.table
    }

    /// The whole table as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(self.table.clone())
    }
}

/// Loads the content a build renders
pub struct ContentRegistry;

impl ContentRegistry {
    /// Load the entry document
    pub async fn load_entry(config: &BuildConfiguration) -> Result<TaggedContent, BuildError> {
        let path = absolute_path(&config.entry_path(), "loading entry document", CALLER)
            .map_err(BuildError::ContentLoad)?;
        let body = read_text(&path, "loading entry document").await?;
        Ok(TaggedContent::new(path, body))
    }

    /// Load every regular file directly inside the partials directory, keyed
    /// by file stem.
    ///
    /// Hidden files are skipped. When two files share a stem the first in
    /// path order wins.
    pub async fn load_partials(
        config: &BuildConfiguration,
    ) -> Result<BTreeMap<String, TaggedContent>, BuildError> {
        let purpose = "listing partials";
        let dir = absolute_path(&config.partials_dir(), purpose, CALLER).map_err(BuildError::ContentLoad)?;

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_file_context(FileOperation::OpenDir, &dir, purpose, CALLER)
            .map_err(BuildError::ContentLoad)?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_file_context(FileOperation::ReadDirEntry, &dir, purpose, CALLER)
            .map_err(BuildError::ContentLoad)?
        {
            let path = entry.path();
            let metadata = tokio::fs::metadata(&path)
                .await
                .with_file_context(FileOperation::ReadDirEntry, &path, purpose, CALLER)
                .map_err(BuildError::ContentLoad)?;
            if metadata.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let mut partials = BTreeMap::new();
        for path in files {
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                tracing::warn!(path = %path.display(), "skipping partial with a non UTF-8 name");
                continue;
            };
            if name.is_empty() || name.starts_with('.') {
                tracing::debug!(path = %path.display(), "skipping hidden file in partials directory");
                continue;
            }
            if partials.contains_key(name) {
                tracing::warn!(
                    name,
                    path = %path.display(),
                    "partial name already taken by another file, skipping"
                );
                continue;
            }

            let body = read_text(&path, "loading partial").await?;
            tracing::debug!(name, path = %path.display(), "loaded partial");
            partials.insert(name.to_string(), TaggedContent::new(path, body));
        }

        Ok(partials)
    }

    /// Load `<stringsDir>/<locale>.json`, relative to the config file
    pub async fn load_strings(config: &BuildConfiguration) -> Result<LocalizedStrings, BuildError> {
        let purpose = "loading localized strings";
        let path = absolute_path(
            &config.strings_dir().join(format!("{}.json", config.locale())),
            purpose,
            CALLER,
        )
        .map_err(BuildError::ContentLoad)?;

        let text = read_text(&path, purpose).await?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| BuildError::ContentLoad(FileOperationError::parse(&path, purpose, CALLER, e)))?;

        match value {
            Value::Object(table) => Ok(LocalizedStrings::new(path, table)),
            other => Err(BuildError::ContentLoad(FileOperationError::parse(
                &path,
                purpose,
                CALLER,
                format!("expected a JSON object, found {}", crate::templating::utils::type_name(&other)),
            ))),
        }
    }
}

/// Open and read a UTF-8 file, failing at the step that went wrong
async fn read_text(path: &Path, purpose: &str) -> Result<String, BuildError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_file_context(FileOperation::OpenFile, path, purpose, CALLER)
        .map_err(BuildError::ContentLoad)?;

    let mut text = String::new();
    file.read_to_string(&mut text)
        .await
        .with_file_context(FileOperation::Read, path, purpose, CALLER)
        .map_err(BuildError::ContentLoad)?;
    Ok(text)
}
