//! Process configuration derived from the environment.
//!
//! The environment is read exactly once, in `Config::from_env`. Everything
//! downstream receives a `&Config`.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::paths::WorkPaths;

/// Editor used when `$EDITOR` is unset.
pub const DEFAULT_EDITOR: &str = "vim";

/// Directory under `$HOME` that holds the cache file and mirrors.
pub const DEFAULT_DIR_NAME: &str = ".gist";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("USER is not set")]
    MissingUser,

    #[error("unable to determine home directory")]
    HomeDirNotFound,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Local user name; also the GitHub login whose gists are mirrored
    pub user: String,
    /// Root of the cache file and all mirrors
    pub work_dir: PathBuf,
    /// GitHub token, if any
    pub token: Option<String>,
    /// Editor command line, e.g. `vim` or `code --wait`
    pub editor: String,
}

impl Config {
    pub fn new(user: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            user: user.into(),
            work_dir: work_dir.into(),
            token: None,
            editor: DEFAULT_EDITOR.to_string(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_editor(mut self, editor: impl Into<String>) -> Self {
        self.editor = editor.into();
        self
    }

    /// Read `USER`, `GIST_DIR`, `GITHUB_TOKEN` and `EDITOR`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), dirs::home_dir())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F, home: Option<PathBuf>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let user = non_empty("USER").ok_or(ConfigError::MissingUser)?;

        let work_dir = match non_empty("GIST_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => home
                .ok_or(ConfigError::HomeDirNotFound)?
                .join(DEFAULT_DIR_NAME),
        };

        let mut config = Self::new(user, work_dir);
        config.token = non_empty("GITHUB_TOKEN");
        if let Some(editor) = non_empty("EDITOR") {
            config.editor = editor;
        }
        Ok(config)
    }

    pub fn paths(&self) -> WorkPaths {
        WorkPaths::new(&self.work_dir)
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// The token as the empty string when absent.
    pub fn token_or_empty(&self) -> &str {
        self.token.as_deref().unwrap_or("")
    }
}
