//! PluginResolver: resolves the four plugin flavours into a single uniform
//! [`ResolvedPlugin`].
//!
//! Dynamic dispatch over plugin flavours is replaced with a tagged
//! [`PluginRequest`] enum and an explicit `match` in [`resolve_plugin`],
//! rather than a trait object per flavour — the same shape used by the
//! grounding codebase's `MultiCompiler*` family for its own compiler
//! flavours.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::argfile::ArgumentFileBuilder;
use crate::artifact::repository::ArtifactRepositoryAdapter;
use crate::artifact::{ArtifactKey, Dependency, DepthOverride, Scope};
use crate::digest::sha1_hex;
use crate::error::{Error, Result};
use crate::fsutils::{make_executable, ZipOverlay};
use crate::host::{HostSystem, OsFamily};
use crate::platform::classifier_for;
use crate::system_path;
use crate::tempspace::TemporarySpace;
use crate::uri::fetch::UriResourceFetcher;

/// A uniformly-shaped resolved plugin executable: `id` forms the
/// `--protoc-gen-<id>` flag name, `path` is the executable, `options` is
/// forwarded verbatim via `--<id>_opt`.
#[derive(Debug, Clone)]
pub struct ResolvedPlugin {
    pub id: String,
    pub path: PathBuf,
    pub options: Option<String>,
}

/// Tagged variant over the four plugin flavours the design calls out:
/// `BinaryRepo`, `JvmRepo`, `BinaryPath`, `BinaryUrl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PluginRequest {
    BinaryRepo { artifact: ArtifactKey, options: Option<String>, optional: bool, skip: bool },
    JvmRepo {
        artifact: ArtifactKey,
        options: Option<String>,
        main_class: Option<String>,
        jvm_args: Vec<String>,
        jvm_config_args: Vec<String>,
        optional: bool,
        skip: bool,
    },
    BinaryPath { name: String, options: Option<String>, optional: bool, skip: bool },
    BinaryUrl { uri: String, options: Option<String>, optional: bool, skip: bool },
}

impl PluginRequest {
    fn skip(&self) -> bool {
        match self {
            Self::BinaryRepo { skip, .. }
            | Self::JvmRepo { skip, .. }
            | Self::BinaryPath { skip, .. }
            | Self::BinaryUrl { skip, .. } => *skip,
        }
    }

    fn optional(&self) -> bool {
        match self {
            Self::BinaryRepo { optional, .. }
            | Self::JvmRepo { optional, .. }
            | Self::BinaryPath { optional, .. }
            | Self::BinaryUrl { optional, .. } => *optional,
        }
    }

    fn options(&self) -> Option<String> {
        match self {
            Self::BinaryRepo { options, .. }
            | Self::JvmRepo { options, .. }
            | Self::BinaryPath { options, .. }
            | Self::BinaryUrl { options, .. } => options.clone(),
        }
    }

    fn label(&self) -> String {
        match self {
            Self::BinaryRepo { artifact, .. } => artifact.to_string(),
            Self::JvmRepo { artifact, .. } => artifact.to_string(),
            Self::BinaryPath { name, .. } => name.clone(),
            Self::BinaryUrl { uri, .. } => uri.clone(),
        }
    }
}

pub struct PluginResolveContext<'a> {
    pub adapter: ArtifactRepositoryAdapter<'a>,
    pub host: &'a HostSystem,
    pub temp_space: &'a TemporarySpace,
    pub offline: bool,
}

/// A plugin request paired with the output directory it writes to and the
/// target ordering key it contributes — the two properties of
/// `ProtocTarget::Plugin` that live outside [`ResolvedPlugin`] itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSpec {
    pub request: PluginRequest,
    pub output_path: PathBuf,
    pub order: i32,
}

/// Resolves one [`PluginRequest`] into a [`ResolvedPlugin`].
///
/// `skip=true` always short-circuits to `Ok(None)`. Otherwise: an
/// `optional` plugin that fails to resolve is recovered to `Ok(None)` with
/// an info-level log; a non-optional unresolved plugin propagates the
/// error.
pub fn resolve_plugin(request: &PluginRequest, ctx: &PluginResolveContext<'_>) -> Result<Option<ResolvedPlugin>> {
    if request.skip() {
        info!(plugin = %request.label(), "plugin skipped");
        return Ok(None);
    }

    let outcome = match request {
        PluginRequest::BinaryRepo { artifact, .. } => resolve_binary_repo(artifact, ctx),
        PluginRequest::JvmRepo { artifact, main_class, jvm_args, jvm_config_args, .. } => {
            resolve_jvm_repo(artifact, main_class.as_deref(), jvm_args, jvm_config_args, ctx)
        }
        PluginRequest::BinaryPath { name, .. } => resolve_binary_path(name, ctx),
        PluginRequest::BinaryUrl { uri, .. } => resolve_binary_url(uri, ctx),
    };

    match outcome {
        Ok(path) => {
            let id = sha1_hex(&path.to_string_lossy());
            Ok(Some(ResolvedPlugin { id, path, options: request.options() }))
        }
        Err(e) if request.optional() => {
            info!(plugin = %request.label(), error = %e, "optional plugin not resolved, skipping");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn resolve_binary_repo(artifact: &ArtifactKey, ctx: &PluginResolveContext<'_>) -> Result<PathBuf> {
    let mut artifact = artifact.clone();
    if artifact.classifier.is_none() {
        artifact.classifier = Some(classifier_for(ctx.host.os_family, &ctx.host.cpu_arch)?.to_string());
    }
    if artifact.r#type.is_none() {
        artifact.r#type = Some("exe".to_string());
    }
    ctx.adapter.resolve_executable(&artifact, ctx.temp_space)
}

fn resolve_binary_path(name: &str, ctx: &PluginResolveContext<'_>) -> Result<PathBuf> {
    system_path::find_on_path(ctx.host, name)
}

fn resolve_binary_url(uri: &str, ctx: &PluginResolveContext<'_>) -> Result<PathBuf> {
    let fetcher = UriResourceFetcher::new(ctx.temp_space, ctx.offline);
    fetcher.fetch(uri, "bin", true)?.ok_or_else(|| Error::not_found(uri.to_string()))
}

fn resolve_jvm_repo(
    artifact: &ArtifactKey,
    main_class: Option<&str>,
    jvm_args: &[String],
    jvm_config_args: &[String],
    ctx: &PluginResolveContext<'_>,
) -> Result<PathBuf> {
    let mut with_scope = Dependency::new(artifact.clone(), Scope::Compile);
    with_scope.depth = Some(DepthOverride::Transitive);
    let classpath_entries = ctx.adapter.resolve_dependencies(
        &[with_scope],
        DepthOverride::Transitive,
        &[Scope::Compile],
        false,
        &[],
        true,
    )?;
    let jar_path = classpath_entries
        .first()
        .cloned()
        .ok_or_else(|| Error::invalid(format!("{artifact} resolved to no classpath entries")))?;

    let main_class = match main_class {
        Some(m) => m.to_string(),
        None => read_jar_main_class(&jar_path)?,
    };

    let sep = if ctx.host.os_family == OsFamily::Windows { ';' } else { ':' };
    let classpath =
        classpath_entries.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>().join(&sep.to_string());

    let mut builder = ArgumentFileBuilder::new();
    builder.extend(jvm_args.iter().cloned());
    builder.push("-classpath").push(classpath);
    builder.extend(jvm_config_args.iter().cloned());
    builder.push(main_class);

    let dir = ctx.temp_space.scoped_dir(&["plugins", "jvm", &sha1_hex(&artifact.coordinate_string())])?;
    let argfile = dir.join("jvm.args");
    builder.write_java_argfile(&argfile)?;

    let wrapper_path = if ctx.host.os_family == OsFamily::Windows {
        write_windows_wrapper(&dir, &argfile)?
    } else {
        write_posix_wrapper(&dir, &argfile)?
    };
    make_executable(&wrapper_path)?;
    Ok(wrapper_path)
}

fn write_posix_wrapper(dir: &Path, argfile: &Path) -> Result<PathBuf> {
    let path = dir.join("plugin.sh");
    let script = format!("#!/bin/sh\nexec java \"@{}\" \"$@\"\n", argfile.display());
    std::fs::write(&path, script).map_err(|e| Error::io(&path, e))?;
    Ok(path)
}

fn write_windows_wrapper(dir: &Path, argfile: &Path) -> Result<PathBuf> {
    let path = dir.join("plugin.bat");
    let script = format!("@echo off\r\njava \"@{}\" %*\r\n", argfile.display());
    std::fs::write(&path, script).map_err(|e| Error::io(&path, e))?;
    Ok(path)
}

/// Reads the `Main-Class` attribute out of a JAR's `META-INF/MANIFEST.MF`,
/// handling the manifest format's 72-byte line-continuation convention
/// (a following line starting with a single space extends the previous
/// value).
fn read_jar_main_class(jar_path: &Path) -> Result<String> {
    let mut overlay = ZipOverlay::open(jar_path)?;
    let bytes = overlay.read_entry("META-INF/MANIFEST.MF")?;
    let text = String::from_utf8_lossy(&bytes);

    let mut logical_lines: Vec<String> = Vec::new();
    for raw_line in text.lines() {
        if let Some(rest) = raw_line.strip_prefix(' ') {
            if let Some(last) = logical_lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        logical_lines.push(raw_line.to_string());
    }

    logical_lines
        .iter()
        .find_map(|line| line.strip_prefix("Main-Class:").map(|v| v.trim().to_string()))
        .ok_or_else(|| Error::invalid(format!("{} has no Main-Class manifest attribute", jar_path.display())))
}
