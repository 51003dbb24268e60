//! Local git mirrors of gist pages.
//!
//! `MirrorProvider` is the seam between the sync/publish logic and git.
//! `GitMirrors` is the real implementation; tests substitute fakes.

mod git;

use std::path::PathBuf;

use thiserror::Error;

pub use git::{GitCli, GitMirror, GitMirrors};

/// Errors returned by mirror operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// libgit2 reported an error.
    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),
    /// Path does not contain a git repo.
    #[error("repository not found at {0}")]
    NotFound(String),
    /// Clone failed.
    #[error("clone failed: {0}")]
    CloneError(String),
    /// Push failed.
    #[error("push failed: {0}")]
    PushError(String),
    /// Underlying IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid inputs were provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Everything needed to clone, open or push one mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSpec {
    /// Remote clone URL
    pub url: String,
    /// Local working copy
    pub work_dir: PathBuf,
    pub username: String,
    /// Empty when no token is configured
    pub token: String,
}

/// An opened local working copy.
pub trait Mirror {
    /// True when the working tree has no changes against HEAD.
    fn is_clean(&self) -> Result<bool, GitError>;

    /// Stage a single file, relative to the working directory.
    fn add(&self, filename: &str) -> Result<(), GitError>;

    /// Commit the index on top of HEAD.
    fn commit(&self, message: &str) -> Result<(), GitError>;

    /// Push the current branch to origin.
    fn push(&self) -> Result<(), GitError>;
}

/// Creates or opens mirrors. Shared across sync threads.
pub trait MirrorProvider: Send + Sync {
    type Mirror: Mirror;

    /// Clone when `spec.work_dir` is absent, otherwise open it as is.
    fn clone_or_open(&self, spec: &MirrorSpec) -> Result<Self::Mirror, GitError>;

    /// Open an existing working copy.
    fn open(&self, spec: &MirrorSpec) -> Result<Self::Mirror, GitError>;
}

impl<P: MirrorProvider + ?Sized> MirrorProvider for &P {
    type Mirror = P::Mirror;

    fn clone_or_open(&self, spec: &MirrorSpec) -> Result<Self::Mirror, GitError> {
        (**self).clone_or_open(spec)
    }

    fn open(&self, spec: &MirrorSpec) -> Result<Self::Mirror, GitError> {
        (**self).open(spec)
    }
}
