//! FileUtils: path normalisation, executable-bit toggling, ZIP-as-filesystem
//! access, and tree operations that the rest of the crate builds on.

use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, IoResultExt, Result};

/// Normalises `path`: makes it absolute against the current working
/// directory if relative, then lexically collapses `.`/`..` components
/// without touching the filesystem (so it works for paths that don't exist
/// yet, e.g. an output directory about to be created).
pub fn normalize(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_err(|e| Error::io(".", e))?.join(path)
    };
    Ok(clean(&absolute))
}

/// Lexically resolves `.` and `..` components. `..` at the root is kept
/// (mirrors `Path` semantics rather than erroring).
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Prefers [`dunce::canonicalize`] (strips Windows `\\?\` UNC prefixes) for
/// paths that do exist; falls back to lexical [`normalize`] otherwise, since
/// callers (e.g. an output directory about to be created) may pass
/// not-yet-existing paths.
pub fn canonicalize(path: &Path) -> Result<PathBuf> {
    match dunce::canonicalize(path) {
        Ok(p) => Ok(p),
        Err(_) => normalize(path),
    }
}

/// File stem (name without its final extension), as a lossily-decoded
/// string.
pub fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

/// Lowercased file extension including the leading dot (e.g. `".proto"`),
/// or `None` if the path has no extension.
pub fn file_extension_lower(path: &Path) -> Option<String> {
    path.extension().map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
}

/// `true` if `path`'s extension matches `ext` (a dotted, lowercase suffix
/// such as `.proto`), case-insensitively.
pub fn has_extension(path: &Path, ext: &str) -> bool {
    file_extension_lower(path).as_deref() == Some(ext)
}

/// Recursively removes a directory tree without following symlinks:
/// symlinked entries are unlinked themselves, never traversed into.
pub fn remove_dir_all_no_follow(root: &Path) -> Result<()> {
    if !root.exists() {
        return Ok(());
    }
    let meta = fs::symlink_metadata(root).path_ctx(root)?;
    if meta.file_type().is_symlink() || meta.is_file() {
        return fs::remove_file(root).path_ctx(root);
    }

    for entry in fs::read_dir(root).path_ctx(root)? {
        let entry = entry.path_ctx(root)?;
        let path = entry.path();
        let file_type = entry.file_type().path_ctx(&path)?;
        if file_type.is_symlink() {
            if path.is_dir() {
                // A symlink to a directory: remove the link, do not descend.
                fs::remove_dir(&path)
                    .or_else(|_| fs::remove_file(&path))
                    .path_ctx(&path)?;
            } else {
                fs::remove_file(&path).path_ctx(&path)?;
            }
        } else if file_type.is_dir() {
            remove_dir_all_no_follow(&path)?;
        } else {
            fs::remove_file(&path).path_ctx(&path)?;
        }
    }
    fs::remove_dir(root).path_ctx(root)
}

/// Best-effort `chmod +x`. A no-op that never fails on platforms without
/// POSIX permission bits (Windows).
pub fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path).path_ctx(path)?.permissions();
        let mode = perms.mode() | 0o111;
        perms.set_mode(mode);
        fs::set_permissions(path, perms).path_ctx(path)?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Copies a directory tree from `src` to `dst`, creating `dst` if needed.
/// Used to rebase trees between file systems, including materialising a
/// [`ZipOverlay`]'s contents onto disk.
pub fn rebase_tree(src: &Path, dst: &Path) -> Result<()> {
    let mut options = fs_extra::dir::CopyOptions::new();
    options.copy_inside = true;
    options.content_only = true;
    fs::create_dir_all(dst).path_ctx(dst)?;
    fs_extra::dir::copy(src, dst, &options)
        .map_err(|e| Error::invalid(format!("failed to rebase {} -> {}: {e}", src.display(), dst.display())))?;
    Ok(())
}

/// A ZIP archive opened as a read-only overlay file system: lists entries
/// and extracts individual files or the whole tree on demand.
pub struct ZipOverlay {
    archive: zip::ZipArchive<File>,
}

impl ZipOverlay {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).path_ctx(path)?;
        let archive = zip::ZipArchive::new(file)?;
        Ok(Self { archive })
    }

    /// Entry names normalised by stripping a leading `./`, matching the
    /// archive-decorator convention used by the URI pipeline.
    pub fn entry_names(&self) -> Vec<String> {
        (0..self.archive.len())
            .filter_map(|i| self.archive.name_for_index(i))
            .map(normalize_entry_name)
            .collect()
    }

    /// Reads one entry's full contents into memory.
    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let idx = self.find_index(name)?;
        let mut file = self.archive.by_index(idx)?;
        let mut buf = Vec::with_capacity(file.size() as usize);
        std::io::Read::read_to_end(&mut file, &mut buf).path_ctx(Path::new(name))?;
        Ok(buf)
    }

    /// Extracts every entry under `dest`, preserving relative paths.
    pub fn extract_all(&mut self, dest: &Path) -> Result<()> {
        for i in 0..self.archive.len() {
            let mut entry = self.archive.by_index(i)?;
            let name = normalize_entry_name(entry.name());
            let out_path = dest.join(&name);
            if entry.is_dir() {
                fs::create_dir_all(&out_path).path_ctx(&out_path)?;
                continue;
            }
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).path_ctx(parent)?;
            }
            let mut out = File::create(&out_path).path_ctx(&out_path)?;
            std::io::copy(&mut entry, &mut out).path_ctx(&out_path)?;
        }
        Ok(())
    }

    fn find_index(&self, name: &str) -> Result<usize> {
        let wanted = normalize_entry_name(name);
        (0..self.archive.len())
            .find(|&i| self.archive.name_for_index(i).map(normalize_entry_name).as_deref() == Some(&wanted))
            .ok_or_else(|| Error::not_found(format!("archive entry {name}")))
    }
}

/// Strips a leading `./`, matching the URI pipeline's archive entry naming
/// convention (§4.5: "Archive entry names are normalised by stripping a
/// leading `./`. Matching is exact after normalisation.").
pub fn normalize_entry_name(name: &str) -> String {
    name.strip_prefix("./").unwrap_or(name).to_string()
}
