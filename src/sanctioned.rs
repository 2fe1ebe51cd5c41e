//! SanctionedExecutableTransformer: optionally relocates every executable
//! an invocation references under one governed directory before `protoc`
//! is actually run.

use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::error::{Error, IoResultExt, Result};
use crate::fsutils::make_executable;
use crate::invocation::{ProtocInvocation, ProtocTarget};

/// Copies `protoc` and every plugin executable referenced by `invocation`
/// into `<sanctioned_path>/<group_id>/<artifact_id>/`, returning a new
/// invocation pointing at the relocated copies. The originals are left
/// untouched.
#[instrument(level = "debug", skip(invocation))]
pub fn relocate(invocation: &ProtocInvocation, sanctioned_path: &Path, group_id: &str, artifact_id: &str) -> Result<ProtocInvocation> {
    let dest_dir = sanctioned_path.join(group_id).join(artifact_id);
    std::fs::create_dir_all(&dest_dir).path_ctx(&dest_dir)?;

    let mut relocated = invocation.clone();
    relocated.protoc_path = copy_executable(&invocation.protoc_path, &dest_dir, "protoc")?;
    relocated.sanctioned_executable_path = Some(sanctioned_path.to_path_buf());

    let mut plugin_index = 0usize;
    for target in &mut relocated.targets {
        if let ProtocTarget::Plugin { plugin, .. } = target {
            let prefix = format!("plugin-{plugin_index}");
            plugin.path = copy_executable(&plugin.path, &dest_dir, &prefix)?;
            plugin_index += 1;
        }
    }
    Ok(relocated)
}

fn copy_executable(source: &Path, dest_dir: &Path, prefix: &str) -> Result<PathBuf> {
    let orig_name = source.file_name().ok_or_else(|| Error::invalid(format!("{} has no file name", source.display())))?;
    let dest = dest_dir.join(format!("{prefix}-{}", orig_name.to_string_lossy()));
    std::fs::copy(source, &dest).path_ctx(&dest)?;
    make_executable(&dest)?;
    Ok(dest)
}
