//! ProtocResolver: acquires the `protoc` binary from any of its four
//! accepted locator forms, and exposes a best-effort version probe.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{info, instrument};

use crate::artifact::repository::ArtifactRepositoryAdapter;
use crate::artifact::ArtifactKey;
use crate::error::{Error, Result};
use crate::fsutils::{canonicalize, make_executable};
use crate::host::HostSystem;
use crate::platform::classifier_for;
use crate::system_path;
use crate::tempspace::TemporarySpace;
use crate::uri::fetch::UriResourceFetcher;

/// The four forms a `protoc` locator can take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocLocator {
    Version(String),
    SystemPath,
    Uri(String),
    LocalFile(PathBuf),
}

impl ProtocLocator {
    /// Classifies a raw locator string. `"latest"` is rejected up front
    /// since historical `protoc` releases are not linearly ordered (§7).
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.eq_ignore_ascii_case("latest") {
            return Err(Error::invalid("protoc version \"latest\" is not supported"));
        }
        if raw == "PATH" {
            return Ok(Self::SystemPath);
        }
        if looks_like_uri(raw) {
            return Ok(Self::Uri(raw.to_string()));
        }
        if semver::Version::parse(raw).is_ok() {
            return Ok(Self::Version(raw.to_string()));
        }
        Ok(Self::LocalFile(PathBuf::from(raw)))
    }
}

fn looks_like_uri(raw: &str) -> bool {
    raw.contains("://") || raw.starts_with("file:")
}

/// Resolves a `protoc` locator to an executable path on disk.
#[instrument(level = "debug", skip(adapter, host, temp_space))]
pub fn resolve_protoc(
    locator: &ProtocLocator,
    adapter: &ArtifactRepositoryAdapter<'_>,
    host: &HostSystem,
    temp_space: &TemporarySpace,
    offline: bool,
) -> Result<PathBuf> {
    let path = match locator {
        ProtocLocator::Version(version) => {
            let classifier = classifier_for(host.os_family, &host.cpu_arch)?;
            let artifact = ArtifactKey::new("com.google.protobuf", "protoc")
                .with_version(version.clone())
                .with_classifier(classifier)
                .with_type("exe");
            adapter.resolve_executable(&artifact, temp_space)?
        }
        ProtocLocator::SystemPath => system_path::find_on_path(host, "protoc")?,
        ProtocLocator::Uri(uri) => {
            let fetcher = UriResourceFetcher::new(temp_space, offline);
            fetcher.fetch(uri, "exe", true)?.ok_or_else(|| Error::not_found(uri.clone()))?
        }
        ProtocLocator::LocalFile(path) => {
            let resolved = canonicalize(path)?;
            if !resolved.is_file() {
                return Err(Error::not_found(resolved.display().to_string()));
            }
            make_executable(&resolved)?;
            resolved
        }
    };
    info!(path = %path.display(), "resolved protoc binary");
    Ok(path)
}

/// Runs `<protoc> --version` and parses the `libprotoc X.Y.Z` line.
/// Diagnostic only; never gates resolution behaviour.
pub fn probe_version(protoc_path: &Path) -> Result<semver::Version> {
    let output = Command::new(protoc_path)
        .arg("--version")
        .output()
        .map_err(|e| Error::subprocess(format!("failed to run {}: {e}", protoc_path.display())))?;
    let text = String::from_utf8_lossy(&output.stdout);
    let version_str = text
        .split_whitespace()
        .last()
        .ok_or_else(|| Error::invalid(format!("unexpected `protoc --version` output: {text}")))?;
    semver::Version::parse(version_str)
        .map_err(|e| Error::invalid(format!("could not parse protoc version {version_str}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_is_rejected() {
        assert!(ProtocLocator::parse("latest").is_err());
        assert!(ProtocLocator::parse("LATEST").is_err());
    }

    #[test]
    fn literal_path_keyword_is_system_path() {
        assert_eq!(ProtocLocator::parse("PATH").unwrap(), ProtocLocator::SystemPath);
    }

    #[test]
    fn semver_like_string_is_version() {
        assert_eq!(ProtocLocator::parse("3.25.0").unwrap(), ProtocLocator::Version("3.25.0".into()));
    }

    #[test]
    fn uri_like_string_is_uri() {
        assert_eq!(
            ProtocLocator::parse("https://example.com/protoc").unwrap(),
            ProtocLocator::Uri("https://example.com/protoc".into())
        );
    }

    #[test]
    fn anything_else_is_a_local_file() {
        assert_eq!(
            ProtocLocator::parse("/usr/local/bin/protoc").unwrap(),
            ProtocLocator::LocalFile(PathBuf::from("/usr/local/bin/protoc"))
        );
    }
}
