//! PlatformClassifierFactory: maps `(OsFamily, cpu arch)` to the Maven-style
//! classifier string used to pick the right `protoc`/plugin binary
//! artifact, e.g. `linux-x86_64`.

use crate::error::{Error, Result};
use crate::host::OsFamily;

/// Static `(os, arch) -> classifier` table. Entries use the raw,
/// lowercased `cpu_arch` values as they come back from [`crate::host::HostSystem`]
/// (itself sourced from `std::env::consts::ARCH`), normalised to the handful
/// of spellings Rust and the wider ecosystem actually emit.
const TABLE: &[(OsFamily, &[&str], &str)] = &[
    (OsFamily::Linux, &["x86_64", "amd64"], "linux-x86_64"),
    (OsFamily::Linux, &["aarch64", "arm64"], "linux-aarch_64"),
    (OsFamily::Linux, &["powerpc64le", "ppc64le", "ppc64"], "linux-ppcle_64"),
    (OsFamily::Linux, &["s390x"], "linux-s390_64"),
    (OsFamily::Macos, &["x86_64", "amd64"], "osx-x86_64"),
    (OsFamily::Macos, &["aarch64", "arm64"], "osx-aarch_64"),
    (OsFamily::Windows, &["x86_64", "amd64"], "windows-x86_64"),
    (OsFamily::Windows, &["x86", "i686"], "windows-x86_32"),
];

/// Resolves the Maven classifier for the given OS family and CPU
/// architecture, failing with a targeted message if the combination isn't
/// one of the supported release artifacts.
pub fn classifier_for(os_family: OsFamily, cpu_arch: &str) -> Result<&'static str> {
    let arch = cpu_arch.to_ascii_lowercase();
    TABLE
        .iter()
        .find(|(os, archs, _)| *os == os_family && archs.contains(&arch.as_str()))
        .map(|(_, _, classifier)| *classifier)
        .ok_or_else(|| Error::invalid(format!("no binary for {os_family}/{cpu_arch}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_combinations() {
        assert_eq!(classifier_for(OsFamily::Linux, "x86_64").unwrap(), "linux-x86_64");
        assert_eq!(classifier_for(OsFamily::Linux, "aarch64").unwrap(), "linux-aarch_64");
        assert_eq!(classifier_for(OsFamily::Macos, "aarch64").unwrap(), "osx-aarch_64");
        assert_eq!(classifier_for(OsFamily::Windows, "x86_64").unwrap(), "windows-x86_64");
    }

    #[test]
    fn unsupported_combination_fails() {
        let err = classifier_for(OsFamily::Other, "mips").unwrap_err();
        assert!(err.to_string().contains("no binary for"));
    }

    #[test]
    fn arch_matching_is_case_insensitive() {
        assert_eq!(classifier_for(OsFamily::Linux, "X86_64").unwrap(), "linux-x86_64");
    }
}
