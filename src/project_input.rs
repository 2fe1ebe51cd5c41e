//! ProjectInputResolver: discovers `.proto` sources and descriptor files
//! across local source/import/descriptor roots and their resolved
//! dependency artifacts, producing a [`ProjectInputListing`].

use std::path::{Path, PathBuf};

use glob::Pattern;
use path_slash::PathExt as _;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::artifact::repository::ArtifactRepositoryAdapter;
use crate::artifact::{ArtifactKey, Dependency, DepthOverride, Scope};
use crate::digest::sha1_hex;
use crate::error::{Error, IoResultExt, Result};
use crate::fsutils::{has_extension, ZipOverlay};
use crate::host::HostSystem;
use crate::tempspace::TemporarySpace;

/// One of the request's six root lists: source directories/dependencies,
/// import paths/dependencies, descriptor paths/dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootRole {
    Compilable,
    Dependency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Proto,
    Descriptor,
}

fn classify(path: &Path) -> Option<FileKind> {
    if has_extension(path, ".proto") {
        Some(FileKind::Proto)
    } else if has_extension(path, ".protobin") || has_extension(path, ".desc") {
        Some(FileKind::Descriptor)
    } else {
        None
    }
}

/// Optional glob include/exclude filters, applied per source root relative
/// to that root's base directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobFilters {
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

impl GlobFilters {
    fn accepts(&self, relative: &str) -> bool {
        let included = self.includes.is_empty()
            || self.includes.iter().any(|p| Pattern::new(p).map(|pat| pat.matches(relative)).unwrap_or(false));
        let excluded =
            self.excludes.iter().any(|p| Pattern::new(p).map(|pat| pat.matches(relative)).unwrap_or(false));
        included && !excluded
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProjectInputRequest {
    pub source_directories: Vec<PathBuf>,
    pub source_dependencies: Vec<ArtifactKey>,
    pub import_paths: Vec<PathBuf>,
    pub import_dependencies: Vec<ArtifactKey>,
    pub descriptor_paths: Vec<PathBuf>,
    pub descriptor_dependencies: Vec<ArtifactKey>,
    pub filters: GlobFilters,
    /// Scopes the request's own dependency roots are resolved under
    /// (§3 `dependencyScopes[]`); each listed artifact is treated as a
    /// `compile`-scope root whose own transitive dependencies are pruned
    /// to this set (e.g. `test` is only pulled in once `with_test_scope`
    /// is set on the request).
    pub dependency_scopes: Vec<Scope>,
    pub fail_on_invalid_dependencies: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectInputListing {
    pub compilable_proto_sources: Vec<PathBuf>,
    pub dependency_proto_sources: Vec<PathBuf>,
    pub compilable_descriptor_files: Vec<PathBuf>,
    pub dependency_descriptor_files: Vec<PathBuf>,
}

/// Resolves every root in `request` into a [`ProjectInputListing`].
///
/// Local directories and (once extracted) dependency archives are walked in
/// parallel across a bounded worker pool sized by [`HostSystem::worker_pool_size`].
#[instrument(level = "debug", skip(request, adapter, temp_space, host))]
pub fn resolve_project_inputs(
    request: &ProjectInputRequest,
    adapter: &ArtifactRepositoryAdapter<'_>,
    temp_space: &TemporarySpace,
    host: &HostSystem,
) -> Result<ProjectInputListing> {
    let mut roots: Vec<(PathBuf, RootRole)> = Vec::new();
    for dir in &request.source_directories {
        roots.push((dir.clone(), RootRole::Compilable));
    }
    for dir in &request.import_paths {
        roots.push((dir.clone(), RootRole::Dependency));
    }
    for dir in &request.descriptor_paths {
        roots.push((dir.clone(), RootRole::Dependency));
    }

    for artifact in &request.source_dependencies {
        for path in materialize_dependency(artifact, adapter, temp_space, &request.dependency_scopes, request.fail_on_invalid_dependencies)? {
            roots.push((path, RootRole::Compilable));
        }
    }
    for artifact in &request.import_dependencies {
        for path in materialize_dependency(artifact, adapter, temp_space, &request.dependency_scopes, request.fail_on_invalid_dependencies)? {
            roots.push((path, RootRole::Dependency));
        }
    }
    for artifact in &request.descriptor_dependencies {
        for path in materialize_dependency(artifact, adapter, temp_space, &request.dependency_scopes, request.fail_on_invalid_dependencies)? {
            roots.push((path, RootRole::Dependency));
        }
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(host.worker_pool_size())
        .build()
        .map_err(|e| Error::invalid(format!("failed to build worker pool: {e}")))?;

    let walked: Vec<Result<(RootRole, Vec<PathBuf>, Vec<PathBuf>)>> = pool.install(|| {
        roots
            .par_iter()
            .map(|(root, role)| {
                let (protos, descriptors) = walk_root(root, &request.filters)?;
                Ok((*role, protos, descriptors))
            })
            .collect()
    });

    let mut listing = ProjectInputListing::default();
    for entry in walked {
        let (role, protos, descriptors) = entry?;
        match role {
            RootRole::Compilable => {
                listing.compilable_proto_sources.extend(protos);
                listing.compilable_descriptor_files.extend(descriptors);
            }
            RootRole::Dependency => {
                listing.dependency_proto_sources.extend(protos);
                listing.dependency_descriptor_files.extend(descriptors);
            }
        }
    }
    Ok(listing)
}

/// Resolves `artifact` as a `compile`-scope dependency root, transitively,
/// pruning children to `scopes` the same way the rest of the resolution
/// pipeline does (§4.3) — so a root listed in `source_dependencies` et al.
/// only pulls in e.g. `test`-scope transitives once the request's own
/// `dependency_scopes` includes `test`. Returns one walkable root per
/// resolved artifact.
fn materialize_dependency(
    artifact: &ArtifactKey,
    adapter: &ArtifactRepositoryAdapter<'_>,
    temp_space: &TemporarySpace,
    scopes: &[Scope],
    fail_on_invalid_dependencies: bool,
) -> Result<Vec<PathBuf>> {
    let root = Dependency::new(artifact.clone(), Scope::Compile);
    let resolved = adapter.resolve_dependencies(
        &[root],
        DepthOverride::Transitive,
        scopes,
        false,
        &[],
        fail_on_invalid_dependencies,
    )?;
    resolved.iter().map(|path| materialize_path(path, temp_space)).collect()
}

/// Resolves a materialized artifact path to a walkable root. A plain
/// directory is used as-is; a ZIP/JAR is lazily extracted under
/// `<tempSpace>/deps/<sha1(path)>/`, reusing a prior extraction if the
/// archive's content digest is unchanged.
fn materialize_path(resolved: &Path, temp_space: &TemporarySpace) -> Result<PathBuf> {
    if resolved.is_dir() {
        return Ok(resolved.to_path_buf());
    }

    let dest = temp_space.scoped_dir(&["deps", &sha1_hex(&resolved.to_string_lossy())])?;
    let digest = crate::digest::content_digest(resolved).map_err(|e| Error::io(resolved, e))?;
    let marker = dest.join(".digest");
    let up_to_date = std::fs::read_to_string(&marker).map(|d| d == digest).unwrap_or(false);
    if !up_to_date {
        debug!(path = %resolved.display(), dest = %dest.display(), "extracting dependency archive");
        let mut overlay = ZipOverlay::open(resolved)?;
        overlay.extract_all(&dest)?;
        std::fs::write(&marker, &digest).path_ctx(&marker)?;
    }
    Ok(dest)
}

fn walk_root(root: &Path, filters: &GlobFilters) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut protos = Vec::new();
    let mut descriptors = Vec::new();

    if !root.exists() {
        return Ok((protos, descriptors));
    }

    for entry in walkdir::WalkDir::new(root).into_iter() {
        let entry = entry.map_err(|e| {
            Error::io(e.path().unwrap_or(root).to_path_buf(), std::io::Error::new(std::io::ErrorKind::Other, e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(kind) = classify(entry.path()) else { continue };

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path()).to_slash_lossy();
        if !filters.accepts(&relative) {
            continue;
        }

        match kind {
            FileKind::Proto => protos.push(entry.path().to_path_buf()),
            FileKind::Descriptor => descriptors.push(entry.path().to_path_buf()),
        }
    }

    protos.sort();
    descriptors.sort();
    Ok((protos, descriptors))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension_case_insensitively() {
        assert_eq!(classify(Path::new("a/B.PROTO")), Some(FileKind::Proto));
        assert_eq!(classify(Path::new("a/b.desc")), Some(FileKind::Descriptor));
        assert_eq!(classify(Path::new("a/b.protobin")), Some(FileKind::Descriptor));
        assert_eq!(classify(Path::new("a/b.pb")), None);
        assert_eq!(classify(Path::new("a/b.txt")), None);
    }

    #[test]
    fn walk_root_finds_sources_and_descriptors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.proto"), b"syntax = \"proto3\";").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/b.proto"), b"syntax = \"proto3\";").unwrap();
        std::fs::write(dir.path().join("c.desc"), b"\x00").unwrap();
        std::fs::write(dir.path().join("readme.md"), b"ignored").unwrap();

        let (protos, descriptors) = walk_root(dir.path(), &GlobFilters::default()).unwrap();
        assert_eq!(protos.len(), 2);
        assert_eq!(descriptors.len(), 1);
    }

    #[test]
    fn hidden_files_and_dot_directories_are_not_excluded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".hidden")).unwrap();
        std::fs::write(dir.path().join(".hidden/a.proto"), b"syntax = \"proto3\";").unwrap();

        let (protos, _) = walk_root(dir.path(), &GlobFilters::default()).unwrap();
        assert_eq!(protos.len(), 1);
    }

    #[test]
    fn glob_include_and_exclude_filters_apply() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("keep")).unwrap();
        std::fs::create_dir(dir.path().join("skip")).unwrap();
        std::fs::write(dir.path().join("keep/a.proto"), b"x").unwrap();
        std::fs::write(dir.path().join("skip/b.proto"), b"x").unwrap();

        let filters = GlobFilters { includes: vec!["keep/**".into()], excludes: vec![] };
        let (protos, _) = walk_root(dir.path(), &filters).unwrap();
        assert_eq!(protos.len(), 1);
        assert!(protos[0].ends_with("keep/a.proto"));
    }

    #[test]
    fn missing_root_yields_empty_listing_not_an_error() {
        let (protos, descriptors) = walk_root(Path::new("/does/not/exist"), &GlobFilters::default()).unwrap();
        assert!(protos.is_empty() && descriptors.is_empty());
    }
}
