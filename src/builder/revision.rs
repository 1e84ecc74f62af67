//! Source revision lookup.
//!
//! The revision string is embedded into the generated build-info unit. It
//! comes from the version control tool; failing to obtain it stops
//! configuration.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use git2::Repository;

use crate::builder::errors::ConfigureError;
use crate::util::process::ProcessBuilder;

/// A way of obtaining the current source revision.
pub trait RevisionSource {
    /// Short name used in diagnostics.
    fn tool(&self) -> &'static str;

    /// Look up the revision of the checkout at `root`.
    fn lookup(&self, root: &Path) -> Result<String>;

    /// Look up the revision, mapping failure to a configuration error.
    fn revision(&self, root: &Path) -> Result<String, ConfigureError> {
        let rev = self
            .lookup(root)
            .map_err(|source| ConfigureError::RevisionLookup {
                tool: self.tool(),
                source,
            })?;
        tracing::debug!("source revision {} (via {})", rev, self.tool());
        Ok(rev)
    }
}

/// Runs `git rev-parse HEAD` in the source root.
#[derive(Debug, Clone, Default)]
pub struct GitCommand;

impl RevisionSource for GitCommand {
    fn tool(&self) -> &'static str {
        "git"
    }

    fn lookup(&self, root: &Path) -> Result<String> {
        let rev = ProcessBuilder::new("git")
            .args(["rev-parse", "HEAD"])
            .cwd(root)
            .exec_stdout()?;
        if rev.is_empty() {
            anyhow::bail!("`git rev-parse HEAD` printed nothing");
        }
        Ok(rev)
    }
}

/// Reads `HEAD` through libgit2.
#[derive(Debug, Clone, Default)]
pub struct GitRepository;

impl RevisionSource for GitRepository {
    fn tool(&self) -> &'static str {
        "libgit2"
    }

    fn lookup(&self, root: &Path) -> Result<String> {
        let repo = Repository::discover(root)
            .with_context(|| format!("no git repository at {}", root.display()))?;
        let commit = repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .context("HEAD does not point at a commit")?;
        Ok(commit.id().to_string())
    }
}

/// A fixed revision string.
#[derive(Debug, Clone)]
pub struct StaticRevision(pub String);

impl RevisionSource for StaticRevision {
    fn tool(&self) -> &'static str {
        "static"
    }

    fn lookup(&self, _root: &Path) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Selectable revision backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevisionSourceKind {
    #[default]
    Git,
    Libgit2,
}

impl RevisionSourceKind {
    pub fn into_source(self) -> Box<dyn RevisionSource> {
        match self {
            RevisionSourceKind::Git => Box::new(GitCommand),
            RevisionSourceKind::Libgit2 => Box::new(GitRepository),
        }
    }
}

impl FromStr for RevisionSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git" => Ok(RevisionSourceKind::Git),
            "libgit2" | "git2" => Ok(RevisionSourceKind::Libgit2),
            other => Err(format!(
                "unknown revision source '{}', valid values: git, libgit2",
                other
            )),
        }
    }
}

impl fmt::Display for RevisionSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionSourceKind::Git => write!(f, "git"),
            RevisionSourceKind::Libgit2 => write!(f, "libgit2"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn commit_file(dir: &Path) -> String {
        let repo = Repository::init(dir).unwrap();
        std::fs::write(dir.join("README"), "llama").unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new("README")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();

        let sig = git2::Signature::now("test", "test@example.com").unwrap();
        let oid = repo
            .commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();
        oid.to_string()
    }

    #[test]
    fn test_static_revision() {
        let source = StaticRevision("abc123".to_string());
        assert_eq!(source.revision(Path::new(".")).unwrap(), "abc123");
    }

    #[test]
    fn test_libgit2_reads_head() {
        let tmp = TempDir::new().unwrap();
        let expected = commit_file(tmp.path());

        let rev = GitRepository.revision(tmp.path()).unwrap();
        assert_eq!(rev, expected);
        assert_eq!(rev.len(), 40);
    }

    #[test]
    fn test_libgit2_outside_repository_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let err = GitRepository.revision(tmp.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigureError::RevisionLookup { tool: "libgit2", .. }
        ));
    }

    #[test]
    fn test_libgit2_unborn_head_is_fatal() {
        let tmp = TempDir::new().unwrap();
        Repository::init(tmp.path()).unwrap();
        assert!(GitRepository.revision(tmp.path()).is_err());
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("git".parse(), Ok(RevisionSourceKind::Git));
        assert_eq!("libgit2".parse(), Ok(RevisionSourceKind::Libgit2));
        assert!("svn".parse::<RevisionSourceKind>().is_err());
        assert_eq!(RevisionSourceKind::Libgit2.into_source().tool(), "libgit2");
    }
}
