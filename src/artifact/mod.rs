//! Artifact identity and dependency data model shared by the resolution
//! pipeline: [`ArtifactKey`], [`Exclusion`], [`Dependency`], [`Scope`], and
//! the supporting tables ([`ManagedDependency`], [`ProjectArtifact`]).

pub mod repository;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// `(groupId, artifactId, version?, classifier?, type?)`.
///
/// Two artifacts are the same for deduplication purposes when their
/// `(group_id, artifact_id, classifier, type)` match; version participates
/// only in resolution, never in identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub classifier: Option<String>,
    pub r#type: Option<String>,
}

/// The subset of an [`ArtifactKey`] that identifies it for deduplication.
pub type DedupKey = (String, String, Option<String>, Option<String>);

impl ArtifactKey {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: None,
            classifier: None,
            r#type: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    pub fn with_type(mut self, ty: impl Into<String>) -> Self {
        self.r#type = Some(ty.into());
        self
    }

    pub fn dedup_key(&self) -> DedupKey {
        (self.group_id.clone(), self.artifact_id.clone(), self.classifier.clone(), self.r#type.clone())
    }

    /// The `groupId:artifactId:version:classifier:type` coordinate string
    /// used as the input to `sha1(artifactKey.toString())` when building
    /// resolved-executable file names.
    pub fn coordinate_string(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.group_id,
            self.artifact_id,
            self.version.as_deref().unwrap_or(""),
            self.classifier.as_deref().unwrap_or(""),
            self.r#type.as_deref().unwrap_or("")
        )
    }
}

impl std::fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)?;
        if let Some(v) = &self.version {
            write!(f, ":{v}")?;
        }
        if let Some(c) = &self.classifier {
            write!(f, ":{c}")?;
        }
        if let Some(t) = &self.r#type {
            write!(f, ":{t}")?;
        }
        Ok(())
    }
}

/// `(groupId, artifactId, classifier?, type?)`, where an absent
/// classifier/type means "all" (`*`). `(*, *, *, *)` is the wildcard
/// exclusion, which blocks traversal into a node's transitive dependencies
/// entirely rather than excluding one specific child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    pub group_id: String,
    pub artifact_id: String,
    pub classifier: Option<String>,
    pub r#type: Option<String>,
}

impl Exclusion {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self { group_id: group_id.into(), artifact_id: artifact_id.into(), classifier: None, r#type: None }
    }

    /// The sentinel `(*, *, *, *)` exclusion used to stop a traverser from
    /// descending past a `DIRECT`-depth dependency.
    pub fn wildcard() -> Self {
        Self::new("*", "*")
    }

    pub fn is_wildcard(&self) -> bool {
        self.group_id == "*" && self.artifact_id == "*"
    }

    pub fn matches(&self, key: &ArtifactKey) -> bool {
        if self.is_wildcard() {
            return true;
        }
        let group_matches = self.group_id == "*" || self.group_id == key.group_id;
        let artifact_matches = self.artifact_id == "*" || self.artifact_id == key.artifact_id;
        let classifier_matches = match &self.classifier {
            None => true,
            Some(c) if c == "*" => true,
            Some(c) => Some(c.as_str()) == key.classifier.as_deref(),
        };
        let type_matches = match &self.r#type {
            None => true,
            Some(t) if t == "*" => true,
            Some(t) => Some(t.as_str()) == key.r#type.as_deref(),
        };
        group_matches && artifact_matches && classifier_matches && type_matches
    }
}

/// Dependency resolution scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Compile,
    Provided,
    System,
    Runtime,
    Test,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Compile => "compile",
            Self::Provided => "provided",
            Self::System => "system",
            Self::Runtime => "runtime",
            Self::Test => "test",
        };
        f.write_str(s)
    }
}

/// Per-node resolution depth override. `None` on a [`Dependency`] means
/// "inherit the caller-supplied default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepthOverride {
    Direct,
    Transitive,
}

/// An artifact plus the scope it's pulled in at, optional exclusions, and
/// an optional depth override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub artifact: ArtifactKey,
    pub scope: Scope,
    pub exclusions: Vec<Exclusion>,
    pub depth: Option<DepthOverride>,
}

impl Dependency {
    pub fn new(artifact: ArtifactKey, scope: Scope) -> Self {
        Self { artifact, scope, exclusions: Vec::new(), depth: None }
    }
}

/// One row of the project's dependency-management table: fills in a
/// dependency's version (and, implicitly, matches on classifier/type) when
/// the dependency itself leaves them blank.
#[derive(Debug, Clone)]
pub struct ManagedDependency {
    pub group_id: String,
    pub artifact_id: String,
    pub classifier: Option<String>,
    pub r#type: Option<String>,
    pub version: String,
}

impl ManagedDependency {
    /// A management entry matches a dependency iff their
    /// `(groupId, artifactId, classifier-or-empty, type-or-jar)` tuples are
    /// equal.
    fn matches(&self, key: &ArtifactKey) -> bool {
        self.group_id == key.group_id
            && self.artifact_id == key.artifact_id
            && self.classifier.as_deref().unwrap_or("") == key.classifier.as_deref().unwrap_or("")
            && self.r#type.as_deref().unwrap_or("jar") == key.r#type.as_deref().unwrap_or("jar")
    }
}

/// Fills in `version` from `management` when the dependency's own version is
/// absent or blank. Non-blank versions are never overridden.
pub fn fill_from_management(mut key: ArtifactKey, management: &[ManagedDependency]) -> ArtifactKey {
    let needs_fill = key.version.as_deref().map(str::is_empty).unwrap_or(true);
    if needs_fill {
        if let Some(managed) = management.iter().find(|m| m.matches(&key)) {
            key.version = Some(managed.version.clone());
        }
    }
    key
}

/// An artifact produced by another module in the same build, available
/// without going through the external repository at all.
#[derive(Debug, Clone)]
pub struct ProjectArtifact {
    pub key: ArtifactKey,
    pub scope: Scope,
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_ignores_version() {
        let a = ArtifactKey::new("g", "a").with_version("1.0");
        let b = ArtifactKey::new("g", "a").with_version("2.0");
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn wildcard_exclusion_matches_everything() {
        let wildcard = Exclusion::wildcard();
        assert!(wildcard.matches(&ArtifactKey::new("any", "thing")));
    }

    #[test]
    fn exclusion_respects_classifier_and_type() {
        let excl = Exclusion {
            group_id: "g".into(),
            artifact_id: "a".into(),
            classifier: Some("linux-x86_64".into()),
            r#type: None,
        };
        let matching = ArtifactKey::new("g", "a").with_classifier("linux-x86_64");
        let other_classifier = ArtifactKey::new("g", "a").with_classifier("osx-x86_64");
        assert!(excl.matches(&matching));
        assert!(!excl.matches(&other_classifier));
    }

    #[test]
    fn management_fills_blank_version_only() {
        let management = vec![ManagedDependency {
            group_id: "g".into(),
            artifact_id: "a".into(),
            classifier: None,
            r#type: None,
            version: "9.9.9".into(),
        }];
        let blank = ArtifactKey::new("g", "a");
        assert_eq!(fill_from_management(blank, &management).version.as_deref(), Some("9.9.9"));

        let pinned = ArtifactKey::new("g", "a").with_version("1.2.3");
        assert_eq!(fill_from_management(pinned, &management).version.as_deref(), Some("1.2.3"));
    }
}
