//! The orchestrator's external data surface: [`GenerationRequest`] in,
//! [`GenerationResult`] out.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactKey, Scope};
use crate::plugin_resolver::PluginSpec;
use crate::project_input::GlobFilters;

/// What to do when an expectation isn't met. Each field on
/// [`GenerationRequest`] that ends in `fail_on_*` gates one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailurePolicies {
    pub fail_on_missing_sources: bool,
    pub fail_on_missing_targets: bool,
    pub fail_on_invalid_dependencies: bool,
}

impl Default for FailurePolicies {
    fn default() -> Self {
        Self { fail_on_missing_sources: true, fail_on_missing_targets: true, fail_on_invalid_dependencies: true }
    }
}

/// Descriptor-set output settings, grouped since they're either all present
/// or all absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescriptorOutputSettings {
    pub output_file: Option<PathBuf>,
    pub include_imports: bool,
    pub include_source_info: bool,
    pub retain_options: bool,
    pub attached: bool,
    pub attachment_type: Option<String>,
    pub attachment_classifier: Option<String>,
}

/// The full generation request consumed by [`crate::orchestrator::BuildOrchestrator::generate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub protoc_locator: String,
    pub enabled_languages: Vec<String>,
    pub lite_enabled: bool,

    pub source_directories: Vec<PathBuf>,
    pub source_dependencies: Vec<ArtifactKey>,
    pub import_paths: Vec<PathBuf>,
    pub import_dependencies: Vec<ArtifactKey>,
    pub source_descriptor_paths: Vec<PathBuf>,
    pub source_descriptor_dependencies: Vec<ArtifactKey>,
    pub input_filters: GlobFilters,

    pub plugins: Vec<PluginSpec>,

    pub descriptor_output: DescriptorOutputSettings,

    pub incremental_compilation_enabled: bool,
    pub fatal_warnings: bool,
    pub dependency_scopes: Vec<Scope>,

    pub output_directory: PathBuf,
    pub failure_policies: FailurePolicies,

    pub register_as_compilation_root: bool,
    pub embed_sources_in_class_outputs: bool,

    pub sanctioned_executable_path: Option<PathBuf>,
    pub sanctioned_group_id: String,
    pub sanctioned_artifact_id: String,

    pub offline: bool,
}

impl GenerationRequest {
    /// Builds a request for a typical main-generation run: scopes default
    /// to `{compile, provided, system}`; pass `with_test_scope(true)` for
    /// test generation, which adds `test`.
    pub fn builder(protoc_locator: impl Into<String>, output_directory: impl Into<PathBuf>) -> GenerationRequestBuilder {
        GenerationRequestBuilder::new(protoc_locator.into(), output_directory.into())
    }
}

pub struct GenerationRequestBuilder {
    inner: GenerationRequest,
}

impl GenerationRequestBuilder {
    fn new(protoc_locator: String, output_directory: PathBuf) -> Self {
        Self {
            inner: GenerationRequest {
                protoc_locator,
                enabled_languages: Vec::new(),
                lite_enabled: false,
                source_directories: Vec::new(),
                source_dependencies: Vec::new(),
                import_paths: Vec::new(),
                import_dependencies: Vec::new(),
                source_descriptor_paths: Vec::new(),
                source_descriptor_dependencies: Vec::new(),
                input_filters: GlobFilters::default(),
                plugins: Vec::new(),
                descriptor_output: DescriptorOutputSettings::default(),
                incremental_compilation_enabled: true,
                fatal_warnings: false,
                dependency_scopes: vec![Scope::Compile, Scope::Provided, Scope::System],
                output_directory,
                failure_policies: FailurePolicies::default(),
                register_as_compilation_root: true,
                embed_sources_in_class_outputs: false,
                sanctioned_executable_path: None,
                sanctioned_group_id: String::new(),
                sanctioned_artifact_id: String::new(),
                offline: false,
            },
        }
    }

    pub fn enabled_languages(mut self, languages: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.inner.enabled_languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn lite_enabled(mut self, value: bool) -> Self {
        self.inner.lite_enabled = value;
        self
    }

    pub fn source_directories(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.inner.source_directories = dirs.into_iter().collect();
        self
    }

    pub fn import_paths(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.inner.import_paths = dirs.into_iter().collect();
        self
    }

    pub fn plugins(mut self, plugins: impl IntoIterator<Item = PluginSpec>) -> Self {
        self.inner.plugins = plugins.into_iter().collect();
        self
    }

    pub fn with_test_scope(mut self, value: bool) -> Self {
        if value && !self.inner.dependency_scopes.contains(&Scope::Test) {
            self.inner.dependency_scopes.push(Scope::Test);
        }
        self
    }

    pub fn fatal_warnings(mut self, value: bool) -> Self {
        self.inner.fatal_warnings = value;
        self
    }

    pub fn incremental_compilation_enabled(mut self, value: bool) -> Self {
        self.inner.incremental_compilation_enabled = value;
        self
    }

    pub fn descriptor_output(mut self, settings: DescriptorOutputSettings) -> Self {
        self.inner.descriptor_output = settings;
        self
    }

    pub fn failure_policies(mut self, policies: FailurePolicies) -> Self {
        self.inner.failure_policies = policies;
        self
    }

    pub fn sanctioned_executable_path(mut self, path: PathBuf, group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        self.inner.sanctioned_executable_path = Some(path);
        self.inner.sanctioned_group_id = group_id.into();
        self.inner.sanctioned_artifact_id = artifact_id.into();
        self
    }

    pub fn offline(mut self, value: bool) -> Self {
        self.inner.offline = value;
        self
    }

    pub fn build(self) -> GenerationRequest {
        self.inner
    }
}

/// Which of the five control-flow outcomes a `generate()` call landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationOutcome {
    ProtocSucceeded,
    ProtocFailed,
    NothingToDo,
    NoSources,
    NoTargets,
}

impl GenerationOutcome {
    /// The CLI front-end's exit code mapping (§6). Resolution and I/O
    /// failures never produce a `GenerationResult` at all — they propagate
    /// as `Err` and are mapped separately by the CLI.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::ProtocSucceeded | Self::NothingToDo => 0,
            Self::ProtocFailed => 1,
            Self::NoSources => 2,
            Self::NoTargets => 3,
        }
    }
}

/// Diagnostics about the one `protoc` subprocess invocation a generation run
/// actually made, present on [`GenerationResult`] whenever `protoc` was
/// spawned (i.e. outcome is `ProtocSucceeded` or `ProtocFailed`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocInvocationReport {
    pub duration_millis: u64,
    pub argument_file_path: PathBuf,
    pub stdout_line_count: usize,
    pub stderr_line_count: usize,
}

/// The outcome of one `generate()` call, plus invocation diagnostics when
/// `protoc` was actually run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub outcome: GenerationOutcome,
    pub report: Option<ProtocInvocationReport>,
}

impl GenerationResult {
    pub(crate) fn new(outcome: GenerationOutcome) -> Self {
        Self { outcome, report: None }
    }

    pub(crate) fn with_report(outcome: GenerationOutcome, report: ProtocInvocationReport) -> Self {
        Self { outcome, report: Some(report) }
    }

    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }
}
