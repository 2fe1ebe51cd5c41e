//! BuildOrchestrator: sequences every other component into one
//! `generate()` call.

use std::path::Path;

use tracing::{error, info, instrument, warn};

use crate::artifact::repository::{ArtifactRepository, ArtifactRepositoryAdapter};
use crate::error::Result;
use crate::executor;
use crate::host::HostSystem;
use crate::incremental::IncrementalCache;
use crate::invocation::{create_output_directory, ProtocInvocation, ProtocInvocationBuilder, ProtocTarget};
use crate::plugin_resolver::{self, PluginResolveContext, ResolvedPlugin};
use crate::project_input::{self, ProjectInputRequest};
use crate::protoc_resolver::{self, ProtocLocator};
use crate::request::{GenerationOutcome, GenerationRequest, GenerationResult, ProtocInvocationReport};
use crate::sanctioned;
use crate::tempspace::TemporarySpace;

/// Receives the compilation source root before compiling, so that an
/// incremental no-op run still exposes previously-generated sources to
/// downstream tooling (§4.1 step 8). An opaque collaborator of the
/// surrounding build tool.
pub trait SourceRootRegistrar {
    fn register_source_root(&self, path: &Path);
}

/// Receives the descriptor-set output file, if any, after a successful run.
pub trait OutputAttachmentRegistrar {
    fn register_attachment(&self, path: &Path, attachment_type: Option<&str>, classifier: Option<&str>);
}

/// A registrar pair that does nothing; useful for callers that don't need
/// source-root/attachment wiring (tests, dry runs).
pub struct NoopRegistrars;
impl SourceRootRegistrar for NoopRegistrars {
    fn register_source_root(&self, _path: &Path) {}
}
impl OutputAttachmentRegistrar for NoopRegistrars {
    fn register_attachment(&self, _path: &Path, _attachment_type: Option<&str>, _classifier: Option<&str>) {}
}

pub struct BuildOrchestrator<'a> {
    repo: &'a dyn ArtifactRepository,
    host: HostSystem,
    temp_space: TemporarySpace,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(repo: &'a dyn ArtifactRepository, base_dir: impl AsRef<Path>, execution_id: impl AsRef<str>) -> Result<Self> {
        let host = HostSystem::detect().map_err(|e| crate::error::Error::io(".", e))?;
        let temp_space = TemporarySpace::new(base_dir, execution_id)?;
        Ok(Self { repo, host, temp_space })
    }

    fn adapter(&self) -> ArtifactRepositoryAdapter<'a> {
        ArtifactRepositoryAdapter::new(self.repo)
    }

    /// Runs the full 12-step generation sequence from end to end.
    #[instrument(level = "info", skip(self, request, source_registrar, attachment_registrar))]
    pub fn generate(
        &self,
        request: &GenerationRequest,
        source_registrar: &dyn SourceRootRegistrar,
        attachment_registrar: &dyn OutputAttachmentRegistrar,
    ) -> Result<GenerationResult> {
        let prepared = self.prepare(request, Some(source_registrar))?;
        let Prepared::Ready(built) = prepared else {
            let Prepared::ShortCircuit(result) = prepared else { unreachable!() };
            return Ok(result);
        };
        let BuiltInvocation { invocation, mut cache } = built;

        // Step 11: run protoc.
        let report = executor::execute(&invocation)?;
        let invocation_report = ProtocInvocationReport {
            duration_millis: report.duration.as_millis() as u64,
            argument_file_path: invocation.argument_file_path.clone(),
            stdout_line_count: report.stdout_line_count,
            stderr_line_count: report.stderr_line_count,
        };
        if !report.succeeded {
            error!(exit_code = ?report.exit_code, "protoc exited non-zero");
            return Ok(GenerationResult::with_report(GenerationOutcome::ProtocFailed, invocation_report));
        }

        // Step 12: persist the cache and register the descriptor attachment.
        cache.update_incremental_cache()?;
        if let Some(output_file) = &request.descriptor_output.output_file {
            if request.descriptor_output.attached {
                attachment_registrar.register_attachment(
                    output_file,
                    request.descriptor_output.attachment_type.as_deref(),
                    request.descriptor_output.attachment_classifier.as_deref(),
                );
            }
        }
        if request.embed_sources_in_class_outputs {
            warn!("embed_sources_in_class_outputs requested but no class-output tree is known to this core; skipping");
        }

        Ok(GenerationResult::with_report(GenerationOutcome::ProtocSucceeded, invocation_report))
    }

    /// Dry-run: runs every step of [`Self::generate`] up to and including
    /// assembling the `protoc` invocation, but never spawns the subprocess
    /// and never persists the incremental cache or notifies registrars.
    /// Returns the invocation that `generate()` would have executed.
    #[instrument(level = "info", skip(self, request))]
    pub fn plan(&self, request: &GenerationRequest) -> Result<ProtocInvocation> {
        match self.prepare(request, None)? {
            Prepared::Ready(built) => Ok(built.invocation),
            Prepared::ShortCircuit(result) => Err(crate::error::Error::invalid(format!(
                "nothing to plan: generation would short-circuit with {:?}",
                result.outcome
            ))),
        }
    }

    /// Steps 1–10 of the generation sequence, shared between `generate()`
    /// and `plan()`. `source_registrar` is `None` for a dry run, skipping
    /// step 8's registration entirely.
    fn prepare(
        &self,
        request: &GenerationRequest,
        source_registrar: Option<&dyn SourceRootRegistrar>,
    ) -> Result<Prepared> {
        // Step 1: short-circuit entirely empty requests before resolving anything.
        if request.source_directories.is_empty()
            && request.source_dependencies.is_empty()
            && request.source_descriptor_paths.is_empty()
            && request.source_descriptor_dependencies.is_empty()
        {
            return Ok(Prepared::ShortCircuit(GenerationResult::new(self.missing_sources_outcome(request))));
        }

        // Step 2: resolve protoc. Fatal on failure.
        let locator = ProtocLocator::parse(&request.protoc_locator)?;
        let adapter = self.adapter();
        let protoc_path =
            protoc_resolver::resolve_protoc(&locator, &adapter, &self.host, &self.temp_space, request.offline)?;

        // Step 3: resolve plugins. Optional failures already recover to None inside resolve_plugin.
        let ctx = PluginResolveContext {
            adapter: self.adapter(),
            host: &self.host,
            temp_space: &self.temp_space,
            offline: request.offline,
        };
        let mut resolved_plugins: Vec<(ResolvedPlugin, &crate::plugin_resolver::PluginSpec)> = Vec::new();
        for spec in &request.plugins {
            if let Some(plugin) = plugin_resolver::resolve_plugin(&spec.request, &ctx)? {
                resolved_plugins.push((plugin, spec));
            }
        }

        // Step 4: resolve project inputs.
        let input_request = ProjectInputRequest {
            source_directories: request.source_directories.clone(),
            source_dependencies: request.source_dependencies.clone(),
            import_paths: request.import_paths.clone(),
            import_dependencies: request.import_dependencies.clone(),
            descriptor_paths: request.source_descriptor_paths.clone(),
            descriptor_dependencies: request.source_descriptor_dependencies.clone(),
            filters: request.input_filters.clone(),
            dependency_scopes: request.dependency_scopes.clone(),
            fail_on_invalid_dependencies: request.failure_policies.fail_on_invalid_dependencies,
        };
        let listing = project_input::resolve_project_inputs(&input_request, &adapter, &self.temp_space, &self.host)?;

        // Step 5: no compilable inputs at all.
        if listing.compilable_proto_sources.is_empty() && listing.compilable_descriptor_files.is_empty() {
            return Ok(Prepared::ShortCircuit(GenerationResult::new(self.missing_sources_outcome(request))));
        }

        // Step 6: no targets configured at all.
        let has_descriptor_target = request.descriptor_output.output_file.is_some();
        if request.enabled_languages.is_empty() && resolved_plugins.is_empty() && !has_descriptor_target {
            let outcome = if request.failure_policies.fail_on_missing_targets {
                GenerationOutcome::NoTargets
            } else {
                GenerationOutcome::NothingToDo
            };
            return Ok(Prepared::ShortCircuit(GenerationResult::new(outcome)));
        }

        // Step 7: create the output directory, rejecting a `.jar` extension.
        create_output_directory(&request.output_directory)?;

        // Step 8: register the compilation source root up front, unless the
        // request opts out or this is a dry run.
        if let Some(registrar) = source_registrar {
            if request.register_as_compilation_root {
                registrar.register_source_root(&request.output_directory);
            }
        }

        // Step 9: compute the minimal recompile set.
        let incremental_path = self.temp_space.root().join("incremental-cache.json");
        let mut cache = IncrementalCache::load(&incremental_path)?;
        let force_full = !request.incremental_compilation_enabled || has_descriptor_target;
        let files_to_compile = cache.determine_sources_to_compile(&listing, force_full)?;
        if files_to_compile.is_empty() {
            cache.update_incremental_cache()?;
            info!("no changed inputs, nothing to compile");
            return Ok(Prepared::ShortCircuit(GenerationResult::new(GenerationOutcome::NothingToDo)));
        }

        // Step 10: assemble the invocation.
        let mut builder = ProtocInvocationBuilder::new(protoc_path)
            .fatal_warnings(request.fatal_warnings)
            .source_paths(files_to_compile.sources.clone())
            .import_paths(request.import_paths.iter().cloned().chain(listing.dependency_proto_sources.iter().cloned().filter_map(|p| p.parent().map(Path::to_path_buf))))
            .input_descriptor_files(files_to_compile.descriptors.clone());

        for (order, language) in request.enabled_languages.iter().enumerate() {
            builder = builder.target(ProtocTarget::Language {
                language: language.clone(),
                output_path: request.output_directory.clone(),
                lite: request.lite_enabled,
                order: order as i32,
            });
        }
        for (plugin, spec) in &resolved_plugins {
            builder = builder.target(ProtocTarget::Plugin {
                plugin: plugin.clone(),
                output_path: spec.output_path.clone(),
                order: spec.order,
            });
        }
        if let Some(output_file) = &request.descriptor_output.output_file {
            builder = builder.target(ProtocTarget::DescriptorSet {
                output_file: output_file.clone(),
                include_imports: request.descriptor_output.include_imports,
                include_source_info: request.descriptor_output.include_source_info,
                retain_options: request.descriptor_output.retain_options,
                order: 0,
            });
        }

        let mut invocation = builder.build(&self.temp_space)?;

        // Step 10 (continued): optional sanctioned relocation.
        if let Some(sanctioned_path) = &request.sanctioned_executable_path {
            invocation = sanctioned::relocate(
                &invocation,
                sanctioned_path,
                &request.sanctioned_group_id,
                &request.sanctioned_artifact_id,
            )?;
        }

        Ok(Prepared::Ready(BuiltInvocation { invocation, cache }))
    }

    fn missing_sources_outcome(&self, request: &GenerationRequest) -> GenerationOutcome {
        if request.failure_policies.fail_on_missing_sources {
            GenerationOutcome::NoSources
        } else {
            GenerationOutcome::NothingToDo
        }
    }
}

/// The result of [`BuildOrchestrator::prepare`]: either an assembled
/// invocation ready to execute, or a final result reached via short-circuit.
enum Prepared {
    Ready(BuiltInvocation),
    ShortCircuit(GenerationResult),
}

struct BuiltInvocation {
    invocation: ProtocInvocation,
    cache: IncrementalCache,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactKey, Dependency, ManagedDependency};
    use crate::request::GenerationRequest;
    use std::path::PathBuf;

    struct EmptyRepository;
    impl ArtifactRepository for EmptyRepository {
        fn resolve_artifact(&self, key: &ArtifactKey) -> Result<PathBuf> {
            Err(crate::error::Error::not_found(key.to_string()))
        }
        fn direct_dependencies(&self, _key: &ArtifactKey) -> Result<Vec<Dependency>> {
            Ok(Vec::new())
        }
        fn dependency_management(&self) -> Vec<ManagedDependency> {
            Vec::new()
        }
    }

    #[test]
    fn missing_sources_with_fail_policy_returns_no_sources() {
        let repo = EmptyRepository;
        let base = tempfile::tempdir().unwrap();
        let orchestrator = BuildOrchestrator::new(&repo, base.path(), "test-exec").unwrap();

        let request = GenerationRequest::builder("PATH", base.path().join("out")).build();
        // An empty request never needs protoc resolution at all, so
        // generate()/plan() both take the missing-sources short-circuit
        // without touching the (here nonexistent) `PATH` protoc.
        let result = orchestrator.generate(&request, &NoopRegistrars, &NoopRegistrars).unwrap();
        assert_eq!(result.outcome, GenerationOutcome::NoSources);
        assert_eq!(orchestrator.missing_sources_outcome(&request), GenerationOutcome::NoSources);
    }

    #[test]
    fn missing_sources_without_fail_policy_returns_nothing_to_do() {
        let repo = EmptyRepository;
        let base = tempfile::tempdir().unwrap();
        let orchestrator = BuildOrchestrator::new(&repo, base.path(), "test-exec").unwrap();

        let mut policies = crate::request::FailurePolicies::default();
        policies.fail_on_missing_sources = false;
        let request = GenerationRequest::builder("PATH", base.path().join("out")).failure_policies(policies).build();
        let result = orchestrator.generate(&request, &NoopRegistrars, &NoopRegistrars).unwrap();
        assert_eq!(result.outcome, GenerationOutcome::NothingToDo);
        assert_eq!(orchestrator.missing_sources_outcome(&request), GenerationOutcome::NothingToDo);
    }

    #[test]
    fn plan_on_missing_sources_is_an_error() {
        let repo = EmptyRepository;
        let base = tempfile::tempdir().unwrap();
        let orchestrator = BuildOrchestrator::new(&repo, base.path(), "test-exec").unwrap();

        let request = GenerationRequest::builder("PATH", base.path().join("out")).build();
        assert!(orchestrator.plan(&request).is_err());
    }
}
