//! Edit a mirrored file and publish the change.
//!
//! ```text
//! Editing -> CleanCheck -> Done
//!                       -> Staging -> Committing -> Pushing -> Done
//! ```
//! Any failure after editing stops the session where it happened.

use std::fmt;

use thiserror::Error;

use crate::cache::PageCache;
use crate::config::Config;
use crate::editor::{Editor, EditorError};
use crate::mirror::{GitError, Mirror, MirrorProvider, MirrorSpec};
use crate::types::File;

/// Commit message used for every published edit.
pub const COMMIT_MESSAGE: &str = "update";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStage {
    Editing,
    Opening,
    CleanCheck,
    Staging,
    Committing,
    Pushing,
}

impl fmt::Display for EditStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EditStage::Editing => "editing",
            EditStage::Opening => "opening mirror",
            EditStage::CleanCheck => "checking for changes",
            EditStage::Staging => "staging",
            EditStage::Committing => "committing",
            EditStage::Pushing => "pushing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("editor failed: {0}")]
    Editor(#[from] EditorError),

    #[error("file has no parent directory: {0}")]
    NoMirrorDir(String),

    #[error("opening mirror failed: {0}")]
    Open(#[source] GitError),

    #[error("checking for changes failed: {0}")]
    CleanCheck(#[source] GitError),

    #[error("staging failed: {0}")]
    Stage(#[source] GitError),

    #[error("committing failed: {0}")]
    Commit(#[source] GitError),

    #[error("pushing failed: {0}")]
    Push(#[source] GitError),
}

impl PublishError {
    /// The stage the session stopped in.
    pub fn stage(&self) -> EditStage {
        match self {
            PublishError::Editor(_) => EditStage::Editing,
            PublishError::NoMirrorDir(_) | PublishError::Open(_) => EditStage::Opening,
            PublishError::CleanCheck(_) => EditStage::CleanCheck,
            PublishError::Stage(_) => EditStage::Staging,
            PublishError::Commit(_) => EditStage::Committing,
            PublishError::Push(_) => EditStage::Pushing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// The mirror was clean after editing; nothing was published.
    Unchanged,
    /// The edit was committed and pushed.
    Pushed,
}

pub struct Publisher<'a, E, M, C> {
    config: &'a Config,
    editor: E,
    mirrors: M,
    cache: C,
}

impl<'a, E, M, C> Publisher<'a, E, M, C>
where
    E: Editor,
    M: MirrorProvider,
    C: PageCache,
{
    pub fn new(config: &'a Config, editor: E, mirrors: M, cache: C) -> Self {
        Self {
            config,
            editor,
            mirrors,
            cache,
        }
    }

    /// Run one edit session for `file`.
    pub fn edit(&self, file: &File) -> Result<EditOutcome, PublishError> {
        log::debug!("{}: {}", EditStage::Editing, file.path.display());
        self.editor.edit(&file.path)?;

        let work_dir = file
            .path
            .parent()
            .ok_or_else(|| PublishError::NoMirrorDir(file.path.display().to_string()))?;
        let spec = MirrorSpec {
            url: file.page.url.clone(),
            work_dir: work_dir.to_path_buf(),
            username: file.page.user.clone(),
            token: self.config.token_or_empty().to_string(),
        };

        let mirror = step(EditStage::Opening, PublishError::Open, || {
            self.mirrors.open(&spec)
        })?;

        if step(EditStage::CleanCheck, PublishError::CleanCheck, || {
            mirror.is_clean()
        })? {
            log::info!("No changes to {}", file.name);
            return Ok(EditOutcome::Unchanged);
        }

        step(EditStage::Staging, PublishError::Stage, || mirror.add(&file.name))?;
        step(EditStage::Committing, PublishError::Commit, || {
            mirror.commit(COMMIT_MESSAGE)
        })?;
        step(EditStage::Pushing, PublishError::Push, || mirror.push())?;

        // The remote listing changed; the next run refetches it.
        self.cache.invalidate();
        log::info!("Pushed {}/{}", file.page.id, file.name);
        Ok(EditOutcome::Pushed)
    }
}

fn step<T>(
    stage: EditStage,
    wrap: fn(GitError) -> PublishError,
    op: impl FnOnce() -> Result<T, GitError>,
) -> Result<T, PublishError> {
    log::debug!("{}", stage);
    op().map_err(wrap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::JsonFileCache;
    use crate::types::fixtures::page;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    type Log = Arc<Mutex<Vec<String>>>;

    struct FakeEditor {
        log: Log,
        fail: bool,
    }

    impl Editor for FakeEditor {
        fn edit(&self, path: &Path) -> Result<(), EditorError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("edit {}", path.file_name().unwrap().to_string_lossy()));
            if self.fail {
                return Err(EditorError::Empty);
            }
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Script {
        clean: bool,
        fail_open: bool,
        fail_at: Option<&'static str>,
    }

    struct FakeMirror {
        log: Log,
        script: Script,
    }

    impl FakeMirror {
        fn record(&self, call: String, name: &'static str) -> Result<(), GitError> {
            self.log.lock().unwrap().push(call);
            if self.script.fail_at == Some(name) {
                return Err(GitError::InvalidInput(format!("{} broke", name)));
            }
            Ok(())
        }
    }

    impl Mirror for FakeMirror {
        fn is_clean(&self) -> Result<bool, GitError> {
            self.record("is_clean".to_string(), "is_clean")?;
            Ok(self.script.clean)
        }
        fn add(&self, filename: &str) -> Result<(), GitError> {
            self.record(format!("add {}", filename), "add")
        }
        fn commit(&self, message: &str) -> Result<(), GitError> {
            self.record(format!("commit {}", message), "commit")
        }
        fn push(&self) -> Result<(), GitError> {
            self.record("push".to_string(), "push")
        }
    }

    struct FakeMirrors {
        log: Log,
        script: Script,
        specs: Mutex<Vec<MirrorSpec>>,
    }

    impl MirrorProvider for FakeMirrors {
        type Mirror = FakeMirror;

        fn clone_or_open(&self, spec: &MirrorSpec) -> Result<FakeMirror, GitError> {
            self.open(spec)
        }

        fn open(&self, spec: &MirrorSpec) -> Result<FakeMirror, GitError> {
            self.specs.lock().unwrap().push(spec.clone());
            self.log.lock().unwrap().push("open".to_string());
            if self.script.fail_open {
                return Err(GitError::NotFound(spec.work_dir.display().to_string()));
            }
            Ok(FakeMirror {
                log: Arc::clone(&self.log),
                script: self.script.clone(),
            })
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        config: Config,
        cache: JsonFileCache,
        file: File,
        log: Log,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let config = Config::new("octocat", dir.path()).with_token("secret");
            let cache = JsonFileCache::new(&config.paths());
            cache.save(&[page("a", 1, &["x.txt"])]);
            let path = config.paths().file_path("octocat", "a", "x.txt").unwrap();
            let file = File {
                name: "x.txt".to_string(),
                content: String::new(),
                path,
                page: Arc::new(page("a", 1, &["x.txt"])),
            };
            Self {
                _dir: dir,
                config,
                cache,
                file,
                log: Log::default(),
            }
        }

        fn run(&self, script: Script, editor_fails: bool) -> Result<EditOutcome, PublishError> {
            let editor = FakeEditor {
                log: Arc::clone(&self.log),
                fail: editor_fails,
            };
            let mirrors = FakeMirrors {
                log: Arc::clone(&self.log),
                script,
                specs: Mutex::new(Vec::new()),
            };
            Publisher::new(&self.config, editor, &mirrors, &self.cache).edit(&self.file)
        }

        fn calls(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[test]
    fn clean_mirror_publishes_nothing() {
        let h = Harness::new();
        let outcome = h
            .run(
                Script {
                    clean: true,
                    ..Script::default()
                },
                false,
            )
            .unwrap();

        assert_eq!(outcome, EditOutcome::Unchanged);
        assert_eq!(h.calls(), vec!["edit x.txt", "open", "is_clean"]);
        assert!(h.cache.path().exists());
    }

    #[test]
    fn dirty_mirror_stages_commits_pushes_and_invalidates() {
        let h = Harness::new();
        let outcome = h.run(Script::default(), false).unwrap();

        assert_eq!(outcome, EditOutcome::Pushed);
        assert_eq!(
            h.calls(),
            vec![
                "edit x.txt",
                "open",
                "is_clean",
                "add x.txt",
                "commit update",
                "push"
            ]
        );
        assert!(!h.cache.path().exists());
    }

    #[test]
    fn editor_failure_stops_before_git() {
        let h = Harness::new();
        let err = h.run(Script::default(), true).unwrap_err();

        assert_eq!(err.stage(), EditStage::Editing);
        assert_eq!(h.calls(), vec!["edit x.txt"]);
        assert!(h.cache.path().exists());
    }

    #[test]
    fn open_failure_is_reported() {
        let h = Harness::new();
        let err = h
            .run(
                Script {
                    fail_open: true,
                    ..Script::default()
                },
                false,
            )
            .unwrap_err();

        assert_eq!(err.stage(), EditStage::Opening);
        assert!(matches!(err, PublishError::Open(GitError::NotFound(_))));
        assert_eq!(h.calls(), vec!["edit x.txt", "open"]);
    }

    #[test]
    fn clean_check_failure_stops_before_staging() {
        let h = Harness::new();
        let err = h
            .run(
                Script {
                    fail_at: Some("is_clean"),
                    ..Script::default()
                },
                false,
            )
            .unwrap_err();

        assert!(matches!(err, PublishError::CleanCheck(_)));
        assert_eq!(err.stage(), EditStage::CleanCheck);
        assert_eq!(h.calls(), vec!["edit x.txt", "open", "is_clean"]);
    }

    #[test]
    fn stage_failure_skips_commit_and_push() {
        let h = Harness::new();
        let err = h
            .run(
                Script {
                    fail_at: Some("add"),
                    ..Script::default()
                },
                false,
            )
            .unwrap_err();

        assert_eq!(err.stage(), EditStage::Staging);
        assert!(matches!(err, PublishError::Stage(_)));
        assert!(!h.calls().iter().any(|c| c.starts_with("commit") || c == "push"));
        assert!(h.cache.path().exists());
    }

    #[test]
    fn commit_failure_skips_push() {
        let h = Harness::new();
        let err = h
            .run(
                Script {
                    fail_at: Some("commit"),
                    ..Script::default()
                },
                false,
            )
            .unwrap_err();

        assert_eq!(err.stage(), EditStage::Committing);
        assert!(matches!(err, PublishError::Commit(_)));
        assert!(!h.calls().contains(&"push".to_string()));
    }

    #[test]
    fn push_failure_leaves_cache() {
        let h = Harness::new();
        let err = h
            .run(
                Script {
                    fail_at: Some("push"),
                    ..Script::default()
                },
                false,
            )
            .unwrap_err();

        assert_eq!(err.stage(), EditStage::Pushing);
        assert!(matches!(err, PublishError::Push(_)));
        assert!(err.to_string().contains("pushing failed"));
        assert!(h.cache.path().exists());
    }

    #[test]
    fn mirror_spec_uses_page_owner_and_file_dir() {
        let h = Harness::new();
        let mirrors = FakeMirrors {
            log: Arc::clone(&h.log),
            script: Script {
                clean: true,
                ..Script::default()
            },
            specs: Mutex::new(Vec::new()),
        };
        let editor = FakeEditor {
            log: Arc::clone(&h.log),
            fail: false,
        };
        Publisher::new(&h.config, editor, &mirrors, &h.cache)
            .edit(&h.file)
            .unwrap();

        let specs = mirrors.specs.lock().unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].url, "https://gist.github.com/a.git");
        assert_eq!(specs[0].username, "octocat");
        assert_eq!(specs[0].token, "secret");
        assert_eq!(specs[0].work_dir, h.file.path.parent().unwrap());
    }
}
