//! Mirror synchronizer.
//!
//! Fans out one thread per page, each ensuring the page's local mirror is
//! present, and fans the outcomes back in over a channel. A page whose mirror
//! cannot be established is dropped from the result for this run; nothing is
//! surfaced to the caller.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::bounded;

use crate::config::Config;
use crate::mirror::{MirrorProvider, MirrorSpec};
use crate::paths::WorkPaths;
use crate::types::{Page, sort_newest_first};

/// Outcome of synchronizing a single page.
#[derive(Debug)]
pub enum SyncOutcome {
    Synced(Page),
    Failed(SyncFailure),
}

#[derive(Debug, Clone)]
pub struct SyncFailure {
    pub page: Page,
    pub reason: String,
}

/// Merged result of one synchronization run.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Pages whose mirror is present, newest first
    pub synced: Vec<Page>,
    pub failed: Vec<SyncFailure>,
}

impl SyncReport {
    fn merge(outcomes: impl IntoIterator<Item = SyncOutcome>) -> Self {
        let mut report = SyncReport::default();
        for outcome in outcomes {
            match outcome {
                SyncOutcome::Synced(page) => report.synced.push(page),
                SyncOutcome::Failed(failure) => report.failed.push(failure),
            }
        }
        sort_newest_first(&mut report.synced);
        report
    }

    pub fn into_pages(self) -> Vec<Page> {
        self.synced
    }
}

pub struct Synchronizer<'a, M: MirrorProvider> {
    config: &'a Config,
    paths: WorkPaths,
    mirrors: &'a M,
}

impl<'a, M: MirrorProvider> Synchronizer<'a, M> {
    pub fn new(config: &'a Config, mirrors: &'a M) -> Self {
        Self {
            config,
            paths: config.paths(),
            mirrors,
        }
    }

    /// Ensure every page has a local mirror, concurrently.
    ///
    /// Blocks until every worker has reported. There is no timeout: a hung
    /// clone hangs the whole run.
    pub fn sync(&self, pages: Vec<Page>) -> SyncReport {
        if pages.is_empty() {
            return SyncReport::default();
        }

        log::info!("Checking {} pages", pages.len());
        let (tx, rx) = bounded(pages.len());

        thread::scope(|scope| {
            for page in pages {
                let worker_tx = tx.clone();
                let name = format!("gist-sync-{}", page.id);
                // The page is moved into the worker; keep a copy so a failed
                // spawn can still be reported.
                let fallback = page.clone();
                let spawned = thread::Builder::new().name(name).spawn_scoped(scope, move || {
                    let _ = worker_tx.send(self.sync_guarded(page));
                });
                if let Err(e) = spawned {
                    let _ = tx.send(SyncOutcome::Failed(SyncFailure {
                        page: fallback,
                        reason: format!("failed to spawn sync thread: {}", e),
                    }));
                }
            }
        });
        drop(tx);

        let report = SyncReport::merge(rx.iter());
        for failure in &report.failed {
            log::warn!("Skipping gist {}: {}", failure.page.id, failure.reason);
        }
        log::debug!(
            "Sync finished: {} synced, {} failed",
            report.synced.len(),
            report.failed.len()
        );
        report
    }

    fn spec_for(&self, page: &Page) -> Result<MirrorSpec, String> {
        let work_dir = self
            .paths
            .mirror_dir(&self.config.user, &page.id)
            .map_err(|e| e.to_string())?;
        Ok(MirrorSpec {
            url: page.url.clone(),
            work_dir,
            username: self.config.user.clone(),
            token: self.config.token_or_empty().to_string(),
        })
    }

    /// Run `sync_one`, turning a panic in the mirror provider into a failure
    /// for this page only.
    fn sync_guarded(&self, page: Page) -> SyncOutcome {
        panic::catch_unwind(AssertUnwindSafe(|| self.sync_one(page.clone()))).unwrap_or_else(
            |payload| {
                SyncOutcome::Failed(SyncFailure {
                    page,
                    reason: format!("sync thread panicked: {}", panic_message(&*payload)),
                })
            },
        )
    }

    fn sync_one(&self, page: Page) -> SyncOutcome {
        let result = self
            .spec_for(&page)
            .and_then(|spec| self.mirrors.clone_or_open(&spec).map_err(|e| e.to_string()));
        match result {
            Ok(_) => SyncOutcome::Synced(page),
            Err(reason) => SyncOutcome::Failed(SyncFailure { page, reason }),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
