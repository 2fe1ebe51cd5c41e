//! SystemPathBinaryResolver: locates a named binary on `HostSystem.systemPath`
//! without shelling out to a `which`-style helper, since the exact matching
//! rules differ by platform (§4.12).

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::host::{HostSystem, OsFamily};

/// Finds `name` on the host's search path.
///
/// - POSIX: the first PATH directory containing a file whose exact name
///   equals `name` and whose executable bit is set.
/// - Windows: the first PATH directory containing a file (case-insensitive)
///   whose stem equals `name` and whose extension is in `pathExtensions`.
///
/// Directories that can't be read (access denied, removed mid-walk) are
/// skipped silently; the walk is always non-recursive.
pub fn find_on_path(host: &HostSystem, name: &str) -> Result<PathBuf> {
    for dir in &host.system_path {
        let Ok(entries) = std::fs::read_dir(dir) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if host.os_family == OsFamily::Windows {
                if matches_windows(&path, name, &host.path_extensions) {
                    return Ok(path);
                }
            } else if matches_posix(&path, name) {
                return Ok(path);
            }
        }
    }
    Err(Error::not_found(format!("{name} on PATH")))
}

fn matches_posix(path: &std::path::Path, name: &str) -> bool {
    if path.file_name().and_then(|n| n.to_str()) != Some(name) {
        return false;
    }
    is_executable(path)
}

fn matches_windows(path: &std::path::Path, name: &str, extensions: &[String]) -> bool {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { return false };
    if !stem.eq_ignore_ascii_case(name) {
        return false;
    }
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else { return false };
    let dotted = format!(".{}", ext.to_ascii_uppercase());
    extensions.iter().any(|e| e.eq_ignore_ascii_case(&dotted))
}

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).map(|m| m.permissions().mode() & 0o111 != 0).unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &std::path::Path) -> bool {
    true
}
