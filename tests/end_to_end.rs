//! End-to-end coverage of the full `BuildOrchestrator::generate()` pipeline
//! plus the composite URI fetch path, exercised the way a caller of this
//! crate actually would rather than unit-testing individual components.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use protoc_forge::artifact::repository::ArtifactRepository;
use protoc_forge::artifact::{ArtifactKey, Dependency, ManagedDependency};
use protoc_forge::orchestrator::{BuildOrchestrator, NoopRegistrars};
use protoc_forge::request::{FailurePolicies, GenerationOutcome, GenerationRequest};
use protoc_forge::{Error, Result};

struct EmptyRepository;
impl ArtifactRepository for EmptyRepository {
    fn resolve_artifact(&self, key: &ArtifactKey) -> Result<PathBuf> {
        Err(Error::not_found(key.to_string()))
    }
    fn direct_dependencies(&self, _key: &ArtifactKey) -> Result<Vec<Dependency>> {
        Ok(Vec::new())
    }
    fn dependency_management(&self) -> Vec<ManagedDependency> {
        Vec::new()
    }
}

#[cfg(unix)]
fn write_fake_protoc(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("protoc");
    // Mimics just enough of protoc to drive the pipeline: every --X_out=DIR
    // argument in the argfile gets a marker file written under DIR.
    let script = r#"#!/bin/sh
set -e
argfile="${1#@}"
while IFS= read -r line; do
  case "$line" in
    --*_out=*)
      outdir="${line#*=}"
      outdir="${outdir#lite:}"
      mkdir -p "$outdir"
      touch "$outdir/generated.marker"
      ;;
  esac
done < "$argfile"
exit 0
"#;
    std::fs::write(&path, script).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

#[test]
fn missing_sources_short_circuits_before_resolving_protoc() {
    let repo = EmptyRepository;
    let base = tempfile::tempdir().unwrap();
    let orchestrator = BuildOrchestrator::new(&repo, base.path(), "test-exec").unwrap();

    // An unparseable locator would fail at step 2; an empty request never
    // gets that far, proving the short-circuit happens at step 1.
    let request = GenerationRequest::builder("latest", base.path().join("out")).build();
    let result = orchestrator.generate(&request, &NoopRegistrars, &NoopRegistrars).unwrap();
    assert_eq!(result.outcome, GenerationOutcome::NoSources);

    let mut policies = FailurePolicies::default();
    policies.fail_on_missing_sources = false;
    let lenient = GenerationRequest::builder("latest", base.path().join("out")).failure_policies(policies).build();
    let result = orchestrator.generate(&lenient, &NoopRegistrars, &NoopRegistrars).unwrap();
    assert_eq!(result.outcome, GenerationOutcome::NothingToDo);
}

#[cfg(unix)]
#[test]
fn incremental_pipeline_recompiles_only_on_change() {
    let fake_bin_dir = tempfile::tempdir().unwrap();
    write_fake_protoc(fake_bin_dir.path());

    let original_path = std::env::var("PATH").unwrap_or_default();
    std::env::set_var("PATH", format!("{}:{}", fake_bin_dir.path().display(), original_path));

    let base = tempfile::tempdir().unwrap();
    let src_dir = base.path().join("src");
    let dep_dir = base.path().join("deps");
    std::fs::create_dir_all(&src_dir).unwrap();
    std::fs::create_dir_all(&dep_dir).unwrap();
    std::fs::write(src_dir.join("a.proto"), b"syntax = \"proto3\";\nmessage A {}\n").unwrap();
    std::fs::write(dep_dir.join("common.proto"), b"syntax = \"proto3\";\nmessage Common {}\n").unwrap();

    let out_dir = base.path().join("out");
    let repo = EmptyRepository;
    let orchestrator = BuildOrchestrator::new(&repo, base.path(), "incremental-exec").unwrap();

    let request = GenerationRequest::builder("PATH", out_dir.clone())
        .source_directories(vec![src_dir.clone()])
        .import_paths(vec![dep_dir.clone()])
        .enabled_languages(vec!["python"])
        .build();

    let first = orchestrator.generate(&request, &NoopRegistrars, &NoopRegistrars).unwrap();
    assert_eq!(first.outcome, GenerationOutcome::ProtocSucceeded);
    assert!(first.report.is_some());
    assert!(out_dir.join("generated.marker").is_file());

    std::fs::remove_file(out_dir.join("generated.marker")).unwrap();
    let second = orchestrator.generate(&request, &NoopRegistrars, &NoopRegistrars).unwrap();
    assert_eq!(second.outcome, GenerationOutcome::NothingToDo, "unchanged inputs must not re-invoke protoc");
    assert!(!out_dir.join("generated.marker").is_file());

    std::fs::write(dep_dir.join("common.proto"), b"syntax = \"proto3\";\nmessage Common { string x = 1; }\n").unwrap();
    let third = orchestrator.generate(&request, &NoopRegistrars, &NoopRegistrars).unwrap();
    assert_eq!(third.outcome, GenerationOutcome::ProtocSucceeded, "a changed dependency must force a full rebuild");
    assert!(out_dir.join("generated.marker").is_file());

    std::env::set_var("PATH", original_path);
}

#[cfg(unix)]
#[test]
fn plan_reports_the_invocation_without_running_protoc() {
    let fake_bin_dir = tempfile::tempdir().unwrap();
    write_fake_protoc(fake_bin_dir.path());

    let original_path = std::env::var("PATH").unwrap_or_default();
    std::env::set_var("PATH", format!("{}:{}", fake_bin_dir.path().display(), original_path));

    let base = tempfile::tempdir().unwrap();
    let src_dir = base.path().join("src");
    std::fs::create_dir_all(&src_dir).unwrap();
    std::fs::write(src_dir.join("a.proto"), b"syntax = \"proto3\";\nmessage A {}\n").unwrap();

    let out_dir = base.path().join("out");
    let repo = EmptyRepository;
    let orchestrator = BuildOrchestrator::new(&repo, base.path(), "plan-exec").unwrap();

    let request = GenerationRequest::builder("PATH", out_dir.clone())
        .source_directories(vec![src_dir.clone()])
        .enabled_languages(vec!["python"])
        .build();

    let invocation = orchestrator.plan(&request).unwrap();
    assert!(invocation.source_paths.iter().any(|p| p.ends_with("a.proto")));
    assert!(!out_dir.join("generated.marker").is_file(), "plan() must not invoke protoc");

    std::env::set_var("PATH", original_path);
}

#[test]
fn nested_uri_fetch_decompresses_gzip_over_http() {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(b"syntax = \"proto3\";\nmessage Remote {}\n").unwrap();
    let gz_bytes = encoder.finish().unwrap();

    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr();
    let served = gz_bytes.clone();
    let handle = std::thread::spawn(move || {
        if let Ok(request) = server.recv() {
            let response = tiny_http::Response::from_data(served);
            let _ = request.respond(response);
        }
    });

    let base = tempfile::tempdir().unwrap();
    let space = protoc_forge::tempspace::TemporarySpace::new(base.path(), "fetch-exec").unwrap();
    let fetcher = protoc_forge::uri::fetch::UriResourceFetcher::new(&space, false);

    let uri = format!("gz:http://{addr}/remote.proto.gz");
    let path = fetcher.fetch(&uri, "proto", false).unwrap().expect("resource must resolve");
    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents, "syntax = \"proto3\";\nmessage Remote {}\n");

    handle.join().unwrap();
}
