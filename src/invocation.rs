//! ProtocInvocationBuilder: assembles a single `protoc` invocation (targets,
//! import paths, source paths, argument file) from resolved inputs.
//!
//! [`ProtocTarget`] is a tagged variant rather than a trait object, per the
//! same dispatch style used for [`crate::plugin_resolver::PluginRequest`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::argfile::ArgumentFileBuilder;
use crate::error::{Error, Result};
use crate::plugin_resolver::ResolvedPlugin;
use crate::tempspace::TemporarySpace;

/// One generator `protoc` must run: a built-in language, a plugin, or
/// descriptor-set output.
#[derive(Debug, Clone)]
pub enum ProtocTarget {
    Language { language: String, output_path: PathBuf, lite: bool, order: i32 },
    Plugin { plugin: ResolvedPlugin, output_path: PathBuf, order: i32 },
    DescriptorSet {
        output_file: PathBuf,
        include_imports: bool,
        include_source_info: bool,
        retain_options: bool,
        order: i32,
    },
}

impl ProtocTarget {
    fn order(&self) -> i32 {
        match self {
            Self::Language { order, .. } | Self::Plugin { order, .. } | Self::DescriptorSet { order, .. } => *order,
        }
    }

    fn sort_key_string(&self) -> String {
        match self {
            Self::Language { language, output_path, lite, .. } => {
                format!("language:{language}:{}:{lite}", output_path.display())
            }
            Self::Plugin { plugin, output_path, .. } => format!("plugin:{}:{}", plugin.id, output_path.display()),
            Self::DescriptorSet { output_file, .. } => format!("descriptor_set:{}", output_file.display()),
        }
    }
}

/// Total order over targets: primarily `order` (default 0), secondarily
/// their string form, matching §3's stability requirement for argument-file
/// generation.
fn sort_targets(targets: &mut [ProtocTarget]) {
    targets.sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.sort_key_string().cmp(&b.sort_key_string())));
}

/// The fully assembled invocation the executor runs.
#[derive(Debug, Clone)]
pub struct ProtocInvocation {
    pub protoc_path: PathBuf,
    pub fatal_warnings: bool,
    pub arguments: Vec<String>,
    pub environment: HashMap<String, String>,
    pub import_paths: Vec<PathBuf>,
    pub input_descriptor_files: Vec<PathBuf>,
    pub descriptor_source_files: Vec<PathBuf>,
    pub source_paths: Vec<PathBuf>,
    pub targets: Vec<ProtocTarget>,
    pub sanctioned_executable_path: Option<PathBuf>,
    pub argument_file_path: PathBuf,
}

/// Builds a [`ProtocInvocation`] and writes its argument file.
pub struct ProtocInvocationBuilder {
    protoc_path: PathBuf,
    fatal_warnings: bool,
    targets: Vec<ProtocTarget>,
    source_paths: Vec<PathBuf>,
    import_paths: Vec<PathBuf>,
    input_descriptor_files: Vec<PathBuf>,
    descriptor_source_files: Vec<PathBuf>,
    environment: HashMap<String, String>,
}

impl ProtocInvocationBuilder {
    pub fn new(protoc_path: PathBuf) -> Self {
        Self {
            protoc_path,
            fatal_warnings: false,
            targets: Vec::new(),
            source_paths: Vec::new(),
            import_paths: Vec::new(),
            input_descriptor_files: Vec::new(),
            descriptor_source_files: Vec::new(),
            environment: HashMap::new(),
        }
    }

    pub fn fatal_warnings(mut self, value: bool) -> Self {
        self.fatal_warnings = value;
        self
    }

    pub fn target(mut self, target: ProtocTarget) -> Self {
        self.targets.push(target);
        self
    }

    pub fn source_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.source_paths.extend(paths);
        self
    }

    pub fn import_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.import_paths.extend(paths);
        self
    }

    pub fn input_descriptor_files(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.input_descriptor_files.extend(paths);
        self
    }

    pub fn descriptor_source_files(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.descriptor_source_files.extend(paths);
        self
    }

    pub fn environment(mut self, env: HashMap<String, String>) -> Self {
        self.environment = env;
        self
    }

    /// Assembles the invocation and writes its argument file to
    /// `<tempSpace>/protoc/args.txt`.
    ///
    /// When both `inputDescriptorFiles` and `sourcePaths` are non-empty,
    /// `protoc`'s own handling of that combination is undocumented; this is
    /// surfaced as an explicit warning rather than silently picking one.
    pub fn build(mut self, temp_space: &TemporarySpace) -> Result<ProtocInvocation> {
        if !self.input_descriptor_files.is_empty() && !self.source_paths.is_empty() {
            tracing::warn!(
                "both input descriptor files and source paths are set; protoc's behaviour for this \
                 combination is undocumented upstream"
            );
        }

        sort_targets(&mut self.targets);

        let mut builder = ArgumentFileBuilder::new();
        if self.fatal_warnings {
            builder.push("--fatal_warnings");
        }
        for target in &self.targets {
            push_target_tokens(&mut builder, target)?;
        }
        for source in &self.source_paths {
            builder.push(source.to_string_lossy().into_owned());
        }
        for import in &self.import_paths {
            builder.push(format!("--proto_path={}", import.display()));
        }

        let dir = temp_space.scoped_dir(&["protoc"])?;
        let argument_file_path = dir.join("args.txt");
        builder.write_protoc_argfile(&argument_file_path)?;

        Ok(ProtocInvocation {
            protoc_path: self.protoc_path,
            fatal_warnings: self.fatal_warnings,
            arguments: builder.tokens().to_vec(),
            environment: self.environment,
            import_paths: self.import_paths,
            input_descriptor_files: self.input_descriptor_files,
            descriptor_source_files: self.descriptor_source_files,
            source_paths: self.source_paths,
            targets: self.targets,
            sanctioned_executable_path: None,
            argument_file_path,
        })
    }
}

fn push_target_tokens(builder: &mut ArgumentFileBuilder, target: &ProtocTarget) -> Result<()> {
    match target {
        ProtocTarget::Language { language, output_path, lite, .. } => {
            let spec = if *lite {
                format!("lite:{}", output_path.display())
            } else {
                output_path.display().to_string()
            };
            builder.push(format!("--{language}_out={spec}"));
        }
        ProtocTarget::Plugin { plugin, output_path, .. } => {
            builder.push(format!("--plugin=protoc-gen-{}={}", plugin.id, plugin.path.display()));
            builder.push(format!("--{}_out={}", plugin.id, output_path.display()));
            if let Some(options) = &plugin.options {
                builder.push(format!("--{}_opt={options}", plugin.id));
            }
        }
        ProtocTarget::DescriptorSet { output_file, include_imports, include_source_info, retain_options, .. } => {
            builder.push(format!("--descriptor_set_out={}", output_file.display()));
            if *include_imports {
                builder.push("--include_imports");
            }
            if *include_source_info {
                builder.push("--include_source_info");
            }
            if *retain_options {
                builder.push("--retain_options");
            }
        }
    }
    Ok(())
}

/// Rejects an output directory whose final extension is `.jar`
/// (case-insensitive): `protoc` would otherwise emit a JAR with a manifest,
/// breaking downstream compilation.
pub fn create_output_directory(path: &Path) -> Result<()> {
    if path.extension().map(|e| e.eq_ignore_ascii_case("jar")).unwrap_or(false) {
        return Err(Error::invalid(format!("output directory {} must not have a .jar extension", path.display())));
    }
    std::fs::create_dir_all(path).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn language_target(lang: &str, order: i32) -> ProtocTarget {
        ProtocTarget::Language { language: lang.to_string(), output_path: PathBuf::from("out"), lite: false, order }
    }

    #[test]
    fn targets_sort_by_order_then_string_form() {
        let mut targets = vec![language_target("python", 0), language_target("java", 0), language_target("cpp", -1)];
        sort_targets(&mut targets);
        let names: Vec<&str> = targets
            .iter()
            .map(|t| match t {
                ProtocTarget::Language { language, .. } => language.as_str(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(names, vec!["cpp", "java", "python"]);
    }

    #[test]
    fn output_directory_with_jar_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(create_output_directory(&dir.path().join("out.jar")).is_err());
        assert!(create_output_directory(&dir.path().join("out.JAR")).is_err());
    }

    #[test]
    fn output_directory_without_jar_extension_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("generated");
        create_output_directory(&out).unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn build_writes_argument_file_in_spec_order() {
        let base = tempfile::tempdir().unwrap();
        let space = TemporarySpace::new(base.path(), "exec").unwrap();

        let invocation = ProtocInvocationBuilder::new(PathBuf::from("/usr/bin/protoc"))
            .fatal_warnings(true)
            .target(language_target("java", 0))
            .source_paths(vec![PathBuf::from("src/a.proto")])
            .import_paths(vec![PathBuf::from("/deps/include")])
            .build(&space)
            .unwrap();

        let contents = std::fs::read_to_string(&invocation.argument_file_path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "--fatal_warnings");
        assert_eq!(lines[1], "--java_out=out");
        assert_eq!(lines[2], "src/a.proto");
        assert_eq!(lines[3], "--proto_path=/deps/include");
    }

    #[test]
    fn lite_mode_prefixes_output_path() {
        let base = tempfile::tempdir().unwrap();
        let space = TemporarySpace::new(base.path(), "exec").unwrap();
        let target = ProtocTarget::Language {
            language: "java".into(),
            output_path: PathBuf::from("out"),
            lite: true,
            order: 0,
        };
        let invocation =
            ProtocInvocationBuilder::new(PathBuf::from("/usr/bin/protoc")).target(target).build(&space).unwrap();
        assert!(invocation.arguments.contains(&"--java_out=lite:out".to_string()));
    }
}
