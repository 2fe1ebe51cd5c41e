//! CLI front-end: reads a JSON [`protoc_forge::GenerationRequest`], runs the
//! orchestrator, and maps the result to the external exit-code contract.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use protoc_forge::artifact::repository::ArtifactRepository;
use protoc_forge::artifact::{ArtifactKey, Dependency, ManagedDependency};
use protoc_forge::error::Error;
use protoc_forge::orchestrator::{BuildOrchestrator, NoopRegistrars};
use protoc_forge::{GenerationOutcome, GenerationRequest, GenerationResult, Result};

#[derive(Parser, Debug)]
#[command(name = "protoc-forge", about = "Drives protoc from a declarative generation request")]
struct Cli {
    /// Path to a JSON-encoded GenerationRequest. Reads stdin if omitted.
    request_file: Option<PathBuf>,

    /// Maven-layout local repository root used to materialise artifacts
    /// (`<root>/<groupId path>/<artifactId>/<version>/<artifactId>-<version>[-<classifier>].<type>`).
    #[arg(long, default_value = "~/.m2/repository")]
    repository_root: PathBuf,

    /// Directory used for scoped temporary files (defaults to `.`).
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    #[arg(long, default_value = "protoc-forge")]
    execution_id: String,
}

/// A local-filesystem artifact repository laid out like a Maven local
/// repository. Real POM-graph walking is out of scope here (the artifact
/// repository client is an opaque external collaborator); this resolves
/// exactly the artifact it's asked for and reports no transitive
/// dependencies of its own.
struct LocalMavenRepository {
    root: PathBuf,
}

impl ArtifactRepository for LocalMavenRepository {
    fn resolve_artifact(&self, key: &ArtifactKey) -> Result<PathBuf> {
        let version = key.version.as_deref().ok_or_else(|| Error::invalid(format!("{key} has no version")))?;
        let group_path = key.group_id.replace('.', "/");
        let ty = key.r#type.as_deref().unwrap_or("jar");
        let file_name = match &key.classifier {
            Some(classifier) => format!("{}-{version}-{classifier}.{ty}", key.artifact_id),
            None => format!("{}-{version}.{ty}", key.artifact_id),
        };
        let path = self.root.join(group_path).join(&key.artifact_id).join(version).join(file_name);
        if !path.is_file() {
            return Err(Error::not_found(path.display().to_string()));
        }
        Ok(path)
    }

    fn direct_dependencies(&self, _key: &ArtifactKey) -> Result<Vec<Dependency>> {
        Ok(Vec::new())
    }

    fn dependency_management(&self) -> Vec<ManagedDependency> {
        Vec::new()
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            tracing::error!(error = %e, "generation failed");
            ExitCode::from(exit_code_for_error(&e))
        }
    }
}

fn run(cli: &Cli) -> Result<i32> {
    let text = match &cli.request_file {
        Some(path) => std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?,
        None => std::io::read_to_string(std::io::stdin()).map_err(|e| Error::io("<stdin>", e))?,
    };
    let request: GenerationRequest = serde_json::from_str(&text)?;

    let repo = LocalMavenRepository { root: expand_tilde(&cli.repository_root) };
    let orchestrator = BuildOrchestrator::new(&repo, &cli.base_dir, &cli.execution_id)?;
    let result = orchestrator.generate(&request, &NoopRegistrars, &NoopRegistrars)?;
    tracing::info!(result = ?result, "generation finished");
    Ok(result.exit_code())
}

/// §6's exit codes 4/5 cover errors that never become a `GenerationResult`:
/// resolution failures and generic I/O failures.
fn exit_code_for_error(error: &Error) -> u8 {
    match error {
        Error::Resolution(_) | Error::HttpStatus(_) | Error::NotFound(_) | Error::OfflineRefused(_) => 4,
        _ => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilde_expansion_uses_home_env() {
        std::env::set_var("HOME", "/home/example");
        assert_eq!(expand_tilde(Path::new("~/.m2/repository")), PathBuf::from("/home/example/.m2/repository"));
        assert_eq!(expand_tilde(Path::new("/absolute/path")), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn exit_code_mapping_matches_external_interface() {
        assert_eq!(exit_code_for_error(&Error::not_found("x")), 4);
        assert_eq!(exit_code_for_error(&Error::invalid("x")), 5);
        assert_eq!(exit_code_for_error(&Error::subprocess("x")), 5);
    }

    #[test]
    fn generation_result_exit_codes_are_unaffected_by_error_mapping() {
        assert_eq!(GenerationResult::new(GenerationOutcome::ProtocSucceeded).exit_code(), 0);
    }
}
