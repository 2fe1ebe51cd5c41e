//! TemporarySpace: scoped temporary directories keyed by a tag tuple,
//! rooted at `target/protobuf-maven-plugin/<execution-id>/...`.
//!
//! Directories are created on first request and memoized for the lifetime
//! of the `TemporarySpace`, so two collaborators asking for the same tag
//! tuple within one generation run always get the same directory back.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{IoResultExt, Result};

#[derive(Debug)]
pub struct TemporarySpace {
    root: PathBuf,
    scoped: Mutex<HashMap<Vec<String>, PathBuf>>,
}

impl TemporarySpace {
    /// `base_dir` is typically the host build's `target`/`build` directory;
    /// `execution_id` distinguishes concurrent or repeated invocations
    /// (e.g. "main-generate" vs "test-generate") sharing the same base.
    pub fn new(base_dir: impl AsRef<Path>, execution_id: impl AsRef<str>) -> Result<Self> {
        let root =
            base_dir.as_ref().join("target").join("protobuf-maven-plugin").join(execution_id.as_ref());
        std::fs::create_dir_all(&root).path_ctx(&root)?;
        Ok(Self { root, scoped: Mutex::new(HashMap::new()) })
    }

    /// Returns the directory for `tags`, creating it (and any parents) if
    /// this is the first request for this exact tuple.
    pub fn scoped_dir(&self, tags: &[&str]) -> Result<PathBuf> {
        let key: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        let mut cache = self.scoped.lock().expect("temp space lock poisoned");
        if let Some(existing) = cache.get(&key) {
            return Ok(existing.clone());
        }
        let mut dir = self.root.clone();
        for tag in tags {
            dir.push(tag);
        }
        std::fs::create_dir_all(&dir).path_ctx(&dir)?;
        cache.insert(key, dir.clone());
        Ok(dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
