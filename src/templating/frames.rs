//! Per-render file frames.
//!
//! Tera does not tell functions which template they are called from, so
//! every piece of content is wrapped in two calls to the reserved
//! [`FILE_SCOPE_HELPER`] function: one entering the content's frame before
//! its body and one leaving it afterwards. Frames refer to files by an id
//! handed out by [`FrameStack::register_file`] when the content is wrapped.
//!
//! A [`FrameStack`] belongs to exactly one render. It is shared between the
//! file-scope helper and the component adapters of that render and is
//! dropped with it; there is no process-wide state.

use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Name of the built-in file-scope helper; not available to components
pub const FILE_SCOPE_HELPER: &str = "__file_scope";

#[derive(Debug, Default)]
struct FrameState {
    files: Vec<PathBuf>,
    frames: Vec<usize>,
}

/// Stack of files currently being evaluated, innermost last
#[derive(Debug, Default)]
pub struct FrameStack {
    state: Mutex<FrameState>,
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FrameState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a file and return the id its frame markers use
    pub fn register_file(&self, path: PathBuf) -> usize {
        let mut state = self.lock();
        state.files.push(path);
        state.files.len() - 1
    }

    /// Path registered under `id`
    pub fn file(&self, id: usize) -> Option<PathBuf> {
        self.lock().files.get(id).cloned()
    }

    /// Push the frame of file `id`
    pub fn enter(&self, id: usize) -> Result<(), String> {
        let mut state = self.lock();
        if id >= state.files.len() {
            return Err(format!("unknown file frame {id}"));
        }
        state.frames.push(id);
        Ok(())
    }

    /// Pop the frame of file `id`, which must be the innermost one
    pub fn exit(&self, id: usize) -> Result<(), String> {
        let mut state = self.lock();
        match state.frames.last() {
            Some(&top) if top == id => {
                state.frames.pop();
                Ok(())
            }
            Some(&top) => Err(format!("file frame {id} left while frame {top} is innermost")),
            None => Err(format!("file frame {id} left but no frame is active")),
        }
    }

    /// Absolute path of the file currently being evaluated
    pub fn current(&self) -> Option<PathBuf> {
        let state = self.lock();
        state.frames.last().and_then(|&id| state.files.get(id).cloned())
    }

    /// Number of active frames
    pub fn depth(&self) -> usize {
        self.lock().frames.len()
    }
}

/// The reserved Tera function driving a [`FrameStack`].
///
/// Called as `__file_scope(enter=ID)` or `__file_scope(exit=ID)`; renders nothing.
pub struct FileScopeHelper {
    frames: Arc<FrameStack>,
}

impl FileScopeHelper {
    pub fn new(frames: Arc<FrameStack>) -> Self {
        Self {
            frames,
        }
    }
}

impl tera::Function for FileScopeHelper {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let id = |key: &str| args.get(key).and_then(Value::as_u64).and_then(|n| usize::try_from(n).ok());

        match (id("enter"), id("exit")) {
            (Some(id), None) => self.frames.enter(id),
            (None, Some(id)) => self.frames.exit(id),
            _ => Err(format!("{FILE_SCOPE_HELPER} expects exactly one of `enter` or `exit`")),
        }
        .map_err(tera::Error::msg)?;

        Ok(Value::String(String::new()))
    }

    fn is_safe(&self) -> bool {
        true
    }
}
