//! IncrementalCache: a content-digest cache deciding the minimal set of
//! sources `protoc` needs to recompile.
//!
//! On-disk format is a single JSON file,
//! `<tempSpace>/incremental-cache.json`, holding two path→digest maps plus
//! a schema `version`. A dependency-root change forces a full rebuild,
//! since `protoc` may reinterpret any source against new imports.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::digest::content_digest;
use crate::error::{Error, IoResultExt, Result};
use crate::project_input::ProjectInputListing;

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    sources: BTreeMap<String, String>,
    dependencies: BTreeMap<String, String>,
}

/// The files `protoc` must actually be invoked on this run.
#[derive(Debug, Clone, Default)]
pub struct FilesToCompile {
    pub sources: Vec<PathBuf>,
    pub descriptors: Vec<PathBuf>,
}

impl FilesToCompile {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.descriptors.is_empty()
    }
}

/// Holds the previously-persisted digest maps plus, after
/// [`IncrementalCache::determine_sources_to_compile`] runs, the freshly
/// computed maps awaiting a confirmed `protoc` run.
pub struct IncrementalCache {
    path: PathBuf,
    on_disk: CacheFile,
    pending: Option<CacheFile>,
}

impl IncrementalCache {
    /// Loads `<temp_space_root>/incremental-cache.json`, tolerating a
    /// missing or schema-mismatched file by starting from empty maps (not
    /// an incremental-cache-format-version validation failure — silently
    /// falling back, since a wrong schema version is equivalent to "never
    /// built before").
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let on_disk = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<CacheFile>(&text) {
                Ok(cache) if cache.version == SCHEMA_VERSION => cache,
                _ => CacheFile::default(),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CacheFile::default(),
            Err(e) => return Err(Error::io(&path, e)),
        };
        Ok(Self { path, on_disk, pending: None })
    }

    /// Computes the minimal recompile set for `listing`. Disabled entirely
    /// (returns every compilable file) when `force_full` is set — used when
    /// descriptor-set generation is requested, or the caller has disabled
    /// incremental mode outright.
    pub fn determine_sources_to_compile(
        &mut self,
        listing: &ProjectInputListing,
        force_full: bool,
    ) -> Result<FilesToCompile> {
        let mut new_sources = BTreeMap::new();
        for path in listing.compilable_proto_sources.iter().chain(&listing.dependency_proto_sources) {
            new_sources.insert(path_key(path), digest_of(path)?);
        }
        let mut new_dependencies = BTreeMap::new();
        for path in listing.compilable_descriptor_files.iter().chain(&listing.dependency_descriptor_files) {
            new_dependencies.insert(path_key(path), digest_of(path)?);
        }

        let dependency_changed = force_full
            || listing.dependency_proto_sources.iter().any(|p| self.digest_changed(&new_sources, p))
            || listing.dependency_descriptor_files.iter().any(|p| self.digest_changed(&new_dependencies, p));

        let result = if dependency_changed {
            FilesToCompile {
                sources: listing.compilable_proto_sources.clone(),
                descriptors: listing.compilable_descriptor_files.clone(),
            }
        } else {
            FilesToCompile {
                sources: listing
                    .compilable_proto_sources
                    .iter()
                    .filter(|p| self.digest_changed(&new_sources, p))
                    .cloned()
                    .collect(),
                descriptors: listing
                    .compilable_descriptor_files
                    .iter()
                    .filter(|p| self.digest_changed(&new_dependencies, p))
                    .cloned()
                    .collect(),
            }
        };

        self.pending = Some(CacheFile { version: SCHEMA_VERSION, sources: new_sources, dependencies: new_dependencies });
        Ok(result)
    }

    fn digest_changed(&self, new_map: &BTreeMap<String, String>, path: &Path) -> bool {
        let key = path_key(path);
        match new_map.get(&key) {
            Some(new_digest) => self.on_disk.sources.get(&key).or_else(|| self.on_disk.dependencies.get(&key))
                != Some(new_digest),
            None => true,
        }
    }

    /// Atomically replaces the on-disk cache file with the pending maps
    /// computed by the last [`Self::determine_sources_to_compile`] call.
    /// Must only be called after a successful `protoc` run.
    pub fn update_incremental_cache(&mut self) -> Result<()> {
        let Some(pending) = self.pending.take() else { return Ok(()) };
        let body = serde_json::to_vec_pretty(&pending)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &body).path_ctx(&tmp_path)?;
        std::fs::rename(&tmp_path, &self.path).path_ctx(&self.path)?;
        self.on_disk = pending;
        Ok(())
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn digest_of(path: &Path) -> Result<String> {
    content_digest(path).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing_with(sources: &[&Path]) -> ProjectInputListing {
        ProjectInputListing { compilable_proto_sources: sources.iter().map(|p| p.to_path_buf()).collect(), ..Default::default() }
    }

    #[test]
    fn first_run_compiles_everything() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.proto");
        std::fs::write(&a, b"one").unwrap();
        let cache_path = dir.path().join("incremental-cache.json");
        let mut cache = IncrementalCache::load(&cache_path).unwrap();

        let result = cache.determine_sources_to_compile(&listing_with(&[&a]), false).unwrap();
        assert_eq!(result.sources, vec![a]);
    }

    #[test]
    fn unchanged_source_is_skipped_on_second_run() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.proto");
        std::fs::write(&a, b"one").unwrap();
        let cache_path = dir.path().join("incremental-cache.json");

        let mut cache = IncrementalCache::load(&cache_path).unwrap();
        cache.determine_sources_to_compile(&listing_with(&[&a]), false).unwrap();
        cache.update_incremental_cache().unwrap();

        let mut cache2 = IncrementalCache::load(&cache_path).unwrap();
        let result = cache2.determine_sources_to_compile(&listing_with(&[&a]), false).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn dependency_change_forces_full_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.proto");
        let dep = dir.path().join("dep.proto");
        std::fs::write(&a, b"one").unwrap();
        std::fs::write(&dep, b"dep-v1").unwrap();
        let cache_path = dir.path().join("incremental-cache.json");

        let mut cache = IncrementalCache::load(&cache_path).unwrap();
        let mut listing = listing_with(&[&a]);
        listing.dependency_proto_sources.push(dep.clone());
        cache.determine_sources_to_compile(&listing, false).unwrap();
        cache.update_incremental_cache().unwrap();

        std::fs::write(&dep, b"dep-v2-changed").unwrap();
        let mut cache2 = IncrementalCache::load(&cache_path).unwrap();
        let result = cache2.determine_sources_to_compile(&listing, false).unwrap();
        assert_eq!(result.sources, vec![a], "a must be recompiled even though its own digest is unchanged");
    }

    #[test]
    fn force_full_ignores_prior_digests() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.proto");
        std::fs::write(&a, b"one").unwrap();
        let cache_path = dir.path().join("incremental-cache.json");

        let mut cache = IncrementalCache::load(&cache_path).unwrap();
        cache.determine_sources_to_compile(&listing_with(&[&a]), false).unwrap();
        cache.update_incremental_cache().unwrap();

        let mut cache2 = IncrementalCache::load(&cache_path).unwrap();
        let result = cache2.determine_sources_to_compile(&listing_with(&[&a]), true).unwrap();
        assert_eq!(result.sources, vec![a]);
    }

    #[test]
    fn cache_file_round_trips_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.proto");
        std::fs::write(&a, b"one").unwrap();
        let cache_path = dir.path().join("incremental-cache.json");

        let mut cache = IncrementalCache::load(&cache_path).unwrap();
        cache.determine_sources_to_compile(&listing_with(&[&a]), false).unwrap();
        cache.update_incremental_cache().unwrap();

        assert!(cache_path.exists());
        assert!(!cache_path.with_extension("json.tmp").exists());
        let persisted: CacheFile = serde_json::from_str(&std::fs::read_to_string(&cache_path).unwrap()).unwrap();
        assert_eq!(persisted.version, SCHEMA_VERSION);
        assert_eq!(persisted.sources.len(), 1);
    }
}
