//! Working directory path management
//!
//! ```text
//! ~/.gist/
//! ├── cache.json            # Page metadata snapshot
//! ├── cache.lock            # flock-based lock for cache writes
//! └── <user>/
//!     └── <gist id>/        # git working copy
//!         └── <file>
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("{0} cannot be empty")]
    Empty(&'static str),
    #[error("{0} cannot be '.' or '..'")]
    Traversal(&'static str),
    #[error("{0} cannot contain path separators")]
    Separator(&'static str),
    #[error("{0} cannot start with '-'")]
    LeadingDash(&'static str),
    #[error("{0} cannot contain null or control characters")]
    ControlCharacter(&'static str),
}

/// Check that a user or gist id is safe to use as a single path component.
///
/// These also end up as git clone destinations, so a leading `-` is refused.
pub fn validate_component(value: &str, name: &'static str) -> Result<(), PathError> {
    validate_file_name(value, name)?;
    if value.starts_with('-') {
        return Err(PathError::LeadingDash(name));
    }
    Ok(())
}

/// Check that a gist file name is a single path component.
pub fn validate_file_name(value: &str, name: &'static str) -> Result<(), PathError> {
    if value.is_empty() {
        return Err(PathError::Empty(name));
    }
    if value == "." || value == ".." {
        return Err(PathError::Traversal(name));
    }
    if value.contains('/') || value.contains('\\') {
        return Err(PathError::Separator(name));
    }
    if value.bytes().any(|b| b < 0x20) {
        return Err(PathError::ControlCharacter(name));
    }
    Ok(())
}

/// All filesystem paths under the working directory.
#[derive(Debug, Clone)]
pub struct WorkPaths {
    root: PathBuf,
}

impl WorkPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/cache.json`
    pub fn cache_file(&self) -> PathBuf {
        self.root.join("cache.json")
    }

    /// `{root}/cache.lock`
    pub fn lock_path(&self) -> PathBuf {
        self.root.join("cache.lock")
    }

    /// `{root}/{user}`
    pub fn user_dir(&self, user: &str) -> Result<PathBuf, PathError> {
        validate_component(user, "user")?;
        Ok(self.root.join(user))
    }

    /// `{root}/{user}/{id}`
    pub fn mirror_dir(&self, user: &str, id: &str) -> Result<PathBuf, PathError> {
        validate_component(id, "gist id")?;
        Ok(self.user_dir(user)?.join(id))
    }

    /// `{root}/{user}/{id}/{name}`
    pub fn file_path(&self, user: &str, id: &str, name: &str) -> Result<PathBuf, PathError> {
        validate_file_name(name, "file name")?;
        Ok(self.mirror_dir(user, id)?.join(name))
    }
}
