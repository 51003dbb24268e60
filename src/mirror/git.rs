//! Git operations using a hybrid CLI + libgit2 approach.
//!
//! **CLI (with hardening) for network operations:**
//! - `clone` and `push` go through the system git so HTTPS transport and
//!   credential handling match what the user already has configured
//!
//! **libgit2 for local operations:**
//! - `open_repository`, working tree status, index updates and commits

use std::path::Path;
use std::process::{Command, Stdio};

use git2::{Repository, Signature, StatusOptions};

use super::{GitError, Mirror, MirrorProvider, MirrorSpec};

/// Environment variables read by the inline credential helper.
const AUTH_USER_ENV: &str = "GIST_AUTH_USER";
const AUTH_TOKEN_ENV: &str = "GIST_AUTH_TOKEN";

/// Credential helper that answers `get` from the child's environment, so the
/// token never appears in argv or in the stored remote URL.
const CREDENTIAL_HELPER: &str = "!f() { test \"$1\" = get || exit 0; echo \"username=${GIST_AUTH_USER}\"; echo \"password=${GIST_AUTH_TOKEN}\"; }; f";

/// Validate that a remote URL cannot be interpreted as a git option.
fn validate_url(url: &str) -> Result<(), GitError> {
    if url.is_empty() {
        return Err(GitError::InvalidInput("url cannot be empty".to_string()));
    }
    if url.starts_with('-') {
        return Err(GitError::InvalidInput(
            "url cannot start with '-'".to_string(),
        ));
    }
    if url.bytes().any(|b| b < 0x20) {
        return Err(GitError::InvalidInput(
            "url cannot contain null or control characters".to_string(),
        ));
    }
    Ok(())
}

/// Validate a file name to be staged.
///
/// Rejects:
/// - Empty strings
/// - Absolute paths
/// - Any `..` component
fn validate_filename(name: &str) -> Result<(), GitError> {
    if name.is_empty() {
        return Err(GitError::InvalidInput(
            "file name cannot be empty".to_string(),
        ));
    }
    let path = Path::new(name);
    if path.is_absolute() {
        return Err(GitError::InvalidInput(format!(
            "file name must be relative: {}",
            name
        )));
    }
    if path
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(GitError::InvalidInput(format!(
            "file name cannot contain '..': {}",
            name
        )));
    }
    Ok(())
}

fn path_str<'a>(path: &'a Path, what: &str) -> Result<&'a str, GitError> {
    path.to_str()
        .ok_or_else(|| GitError::InvalidInput(format!("{} is not valid UTF-8", what)))
}

/// Git CLI wrapper with security hardening.
#[derive(Debug, Clone)]
pub struct GitCli {
    git_path: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    /// Create a new GitCli instance using the system git.
    pub fn new() -> Self {
        Self {
            git_path: "git".into(),
        }
    }

    /// Create a hardened Command with security settings.
    ///
    /// Applies:
    /// - `GIT_TERMINAL_PROMPT=0` - disable interactive prompts
    /// - `core.hooksPath=` - disable hooks execution
    /// - the env-based credential helper when a token is present
    fn command(&self, spec: &MirrorSpec) -> Command {
        let mut cmd = Command::new(&self.git_path);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.args(["-c", "core.hooksPath="]);
        if !spec.token.is_empty() {
            cmd.args(["-c", "credential.helper="]);
            cmd.arg("-c")
                .arg(format!("credential.helper={}", CREDENTIAL_HELPER));
            cmd.env(AUTH_USER_ENV, &spec.username);
            cmd.env(AUTH_TOKEN_ENV, &spec.token);
        }
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Clone `spec.url` into `spec.work_dir`.
    ///
    /// A failed clone removes the destination if this call created it.
    pub fn clone_repo(&self, spec: &MirrorSpec) -> Result<(), GitError> {
        validate_url(&spec.url)?;

        let dest = &spec.work_dir;
        let dest_existed = dest.exists();

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let dest_str = path_str(dest, "destination path")?;

        let output = self
            .command(spec)
            .args(["clone", "--quiet", "--"])
            .arg(&spec.url)
            .arg(dest_str)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !dest_existed {
                let _ = std::fs::remove_dir_all(dest);
            }
            return Err(GitError::CloneError(stderr.trim().to_string()));
        }

        Ok(())
    }

    /// Push the checked out branch of `spec.work_dir` to origin.
    pub fn push(&self, spec: &MirrorSpec) -> Result<(), GitError> {
        let work_str = path_str(&spec.work_dir, "working directory")?;

        let output = self
            .command(spec)
            .arg("-C")
            .arg(work_str)
            .args(["push", "--quiet", "origin", "HEAD"])
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::PushError(stderr.trim().to_string()));
        }

        Ok(())
    }

    /// True when the git binary can be executed.
    pub fn is_available(&self) -> bool {
        Command::new(&self.git_path)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

/// Open an existing repository at the given path.
fn open_repository(path: &Path) -> Result<Repository, GitError> {
    let repo = Repository::open(path).map_err(|e| {
        if e.code() == git2::ErrorCode::NotFound {
            GitError::NotFound(path.display().to_string())
        } else {
            GitError::Git(e)
        }
    })?;
    Ok(repo)
}

/// Real mirror provider backed by git.
#[derive(Debug, Clone, Default)]
pub struct GitMirrors {
    git: GitCli,
}

impl GitMirrors {
    pub fn new() -> Self {
        Self { git: GitCli::new() }
    }

    pub fn cli(&self) -> &GitCli {
        &self.git
    }
}

impl MirrorProvider for GitMirrors {
    type Mirror = GitMirror;

    fn clone_or_open(&self, spec: &MirrorSpec) -> Result<GitMirror, GitError> {
        if !spec.work_dir.exists() {
            log::info!("Cloning {} into {}", spec.url, spec.work_dir.display());
            self.git.clone_repo(spec)?;
        }
        self.open(spec)
    }

    fn open(&self, spec: &MirrorSpec) -> Result<GitMirror, GitError> {
        let repo = open_repository(&spec.work_dir)?;
        Ok(GitMirror {
            repo,
            spec: spec.clone(),
            git: self.git.clone(),
        })
    }
}

/// An opened working copy.
pub struct GitMirror {
    repo: Repository,
    spec: MirrorSpec,
    git: GitCli,
}

impl GitMirror {
    fn signature(&self) -> Result<Signature<'static>, GitError> {
        if let Ok(sig) = self.repo.signature() {
            return Ok(sig);
        }
        let name = if self.spec.username.is_empty() {
            "gist"
        } else {
            self.spec.username.as_str()
        };
        let email = format!("{}@users.noreply.github.com", name);
        Ok(Signature::now(name, &email)?)
    }
}

impl Mirror for GitMirror {
    fn is_clean(&self) -> Result<bool, GitError> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .include_ignored(false)
            .recurse_untracked_dirs(true);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        Ok(statuses.is_empty())
    }

    fn add(&self, filename: &str) -> Result<(), GitError> {
        validate_filename(filename)?;
        let mut index = self.repo.index()?;
        index.add_path(Path::new(filename))?;
        index.write()?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<(), GitError> {
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = self.signature()?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
            Err(e) if e.code() == git2::ErrorCode::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        log::debug!("Committed {} in {}", oid, self.spec.work_dir.display());
        Ok(())
    }

    fn push(&self) -> Result<(), GitError> {
        log::info!("Pushing {}", self.spec.work_dir.display());
        self.git.push(&self.spec)
    }
}
