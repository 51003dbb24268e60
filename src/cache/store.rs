//! JSON file backed page cache.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use fs2::FileExt;

use super::PageCache;
use crate::paths::WorkPaths;
use crate::types::Page;

/// Counter for unique temp file names within a process
static WRITE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// How long a writer waits for another process to finish with the snapshot.
/// Writes are best effort, so a stuck holder just means this one is skipped.
const WRITE_WAIT: Duration = Duration::from_secs(2);

/// Delay between attempts to take the write lock.
const RETRY_STEP: Duration = Duration::from_millis(20);

/// Page cache stored as a flat JSON array at `{work_dir}/cache.json`.
///
/// Writers (`save` and `invalidate`) serialize on an flock of
/// `{work_dir}/cache.lock`. Readers never take it: the snapshot is replaced
/// with a rename, so a reader sees either the old or the new file.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    path: PathBuf,
    lock_path: PathBuf,
    write_wait: Duration,
}

impl JsonFileCache {
    pub fn new(paths: &WorkPaths) -> Self {
        Self {
            path: paths.cache_file(),
            lock_path: paths.lock_path(),
            write_wait: WRITE_WAIT,
        }
    }

    /// Override how long writers wait for the lock.
    pub fn with_write_wait(mut self, wait: Duration) -> Self {
        self.write_wait = wait;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_save(&self, pages: &[Page]) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(pages)?;
        let _guard = WriteGuard::take(&self.lock_path, self.write_wait)?;
        write_atomic(&self.path, &json)
    }

    fn try_invalidate(&self) -> io::Result<()> {
        let _guard = WriteGuard::take(&self.lock_path, self.write_wait)?;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl PageCache for JsonFileCache {
    fn load(&self) -> Vec<Page> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                log::warn!("Cannot read cache {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        match serde_json::from_slice::<Vec<Page>>(&data) {
            Ok(pages) => {
                log::debug!("Loaded {} pages from cache", pages.len());
                pages
            }
            Err(e) => {
                log::warn!(
                    "Discarding corrupt cache {}: {}",
                    self.path.display(),
                    e
                );
                self.invalidate();
                Vec::new()
            }
        }
    }

    fn save(&self, pages: &[Page]) {
        match self.try_save(pages) {
            Ok(()) => log::debug!("Saved {} pages to cache", pages.len()),
            Err(e) => log::warn!("Failed to save cache {}: {}", self.path.display(), e),
        }
    }

    fn invalidate(&self) {
        match self.try_invalidate() {
            Ok(()) => log::debug!("Invalidated cache {}", self.path.display()),
            Err(e) => log::warn!(
                "Failed to invalidate cache {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Held while a writer touches the snapshot; unlocks on drop.
struct WriteGuard {
    file: std::fs::File,
}

impl WriteGuard {
    fn take(lock_path: &Path, wait: Duration) -> io::Result<Self> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?;

        let deadline = Instant::now() + wait;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { file }),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("cache is locked by another writer ({})", lock_path.display()),
                        ));
                    }
                    std::thread::sleep(RETRY_STEP);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Write `data` to `path` via a temp file and rename, so readers never see a
/// partially written snapshot.
fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let counter = WRITE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_path = path.with_extension(format!("tmp.{}.{}", std::process::id(), counter));

    let result = (|| {
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        std::fs::rename(&temp_path, path)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::page;
    use tempfile::tempdir;

    fn cache_in(dir: &Path) -> JsonFileCache {
        JsonFileCache::new(&WorkPaths::new(dir))
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        assert!(cache_in(dir.path()).load().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        let pages = vec![page("a", 20, &["x.txt", "y.md"]), page("b", 10, &[])];

        cache.save(&pages);
        assert!(cache.path().exists());
        assert_eq!(cache.load(), pages);
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());

        cache.save(&[page("a", 1, &[]), page("b", 2, &[])]);
        cache.save(&[page("c", 3, &[])]);

        let loaded = cache.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "c");
    }

    #[test]
    fn save_creates_work_dir() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir.path().join("not").join("yet"));
        cache.save(&[page("a", 1, &[])]);
        assert_eq!(cache.load().len(), 1);
    }

    #[test]
    fn corrupt_file_loads_empty_and_is_removed() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        std::fs::write(cache.path(), b"{ not json").unwrap();

        assert!(cache.load().is_empty());
        assert!(!cache.path().exists());
    }

    #[test]
    fn structurally_invalid_file_loads_empty() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        std::fs::write(cache.path(), br#"[{"id": "a"}]"#).unwrap();

        assert!(cache.load().is_empty());
    }

    #[test]
    fn invalidate_is_idempotent() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        cache.save(&[page("a", 1, &[])]);

        cache.invalidate();
        assert!(!cache.path().exists());
        cache.invalidate();
        assert!(cache.load().is_empty());
    }

    /// Hold the cache's write lock through a separate handle.
    fn hold_lock(dir: &Path) -> std::fs::File {
        let file = std::fs::File::create(WorkPaths::new(dir).lock_path()).unwrap();
        file.lock_exclusive().unwrap();
        file
    }

    #[test]
    fn save_is_skipped_while_another_writer_holds_the_lock() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path()).with_write_wait(Duration::from_millis(50));
        cache.save(&[page("a", 1, &[])]);

        let held = hold_lock(dir.path());
        cache.save(&[page("b", 2, &[])]);
        cache.invalidate();
        assert_eq!(cache.load()[0].id, "a");

        drop(held);
        cache.save(&[page("b", 2, &[])]);
        assert_eq!(cache.load()[0].id, "b");
    }

    #[test]
    fn load_does_not_wait_for_the_lock() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        cache.save(&[page("a", 1, &[])]);

        let _held = hold_lock(dir.path());
        assert_eq!(cache.load().len(), 1);
    }

    #[test]
    fn guard_releases_lock_on_drop() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("nested").join("cache.lock");

        let guard = WriteGuard::take(&lock_path, Duration::ZERO).unwrap();
        let err = WriteGuard::take(&lock_path, Duration::from_millis(30))
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        drop(guard);
        assert!(WriteGuard::take(&lock_path, Duration::ZERO).is_ok());
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        cache.save(&[page("a", 1, &[])]);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }
}
