//! HostSystem: OS family, CPU architecture, executable search path, and the
//! set of extensions that count as "executable" on the current platform.

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

/// Coarse OS family classification. `Other` covers BSDs and anything else
/// `std::env::consts::OS` reports that we don't special-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Linux,
    Macos,
    Windows,
    Other,
}

impl OsFamily {
    pub fn detect() -> Self {
        match env::consts::OS {
            "linux" => Self::Linux,
            "macos" => Self::Macos,
            "windows" => Self::Windows,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Linux => "linux",
            Self::Macos => "macos",
            Self::Windows => "windows",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// A snapshot of the properties of the machine we're running on.
///
/// Constructed once per [`crate::orchestrator::BuildOrchestrator`] and passed
/// around explicitly; there is no global/lazily-initialized instance.
#[derive(Debug, Clone)]
pub struct HostSystem {
    pub os_family: OsFamily,
    pub cpu_arch: String,
    pub working_directory: PathBuf,
    pub system_path: Vec<PathBuf>,
    pub path_extensions: Vec<String>,
}

impl HostSystem {
    /// Detects the current host from process environment.
    pub fn detect() -> std::io::Result<Self> {
        let os_family = OsFamily::detect();
        let cpu_arch = env::consts::ARCH.to_ascii_lowercase();
        let working_directory = env::current_dir()?;
        let system_path = Self::scan_path_dirs();
        let path_extensions = Self::path_extensions(os_family);
        Ok(Self { os_family, cpu_arch, working_directory, system_path, path_extensions })
    }

    fn scan_path_dirs() -> Vec<PathBuf> {
        let raw = env::var_os("PATH").unwrap_or_default();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for dir in env::split_paths(&raw) {
            if !dir.is_dir() {
                continue;
            }
            if seen.insert(dir.clone()) {
                out.push(dir);
            }
        }
        out
    }

    fn path_extensions(os_family: OsFamily) -> Vec<String> {
        if os_family == OsFamily::Windows {
            env::var("PATHEXT")
                .unwrap_or_else(|_| ".EXE;.BAT;.CMD;.COM".to_string())
                .split(';')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_ascii_uppercase())
                .collect()
        } else {
            Vec::new()
        }
    }

    /// Number of worker threads to use for bounded parallel operations
    /// (source tree walking, archive extraction): `min(4*cpu, 32)`.
    pub fn worker_pool_size(&self) -> usize {
        (num_cpus::get() * 4).min(32).max(1)
    }
}
