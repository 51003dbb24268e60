//! Page index: cache-or-fetch, synchronize, and project onto files.

use thiserror::Error;

use crate::api::{ApiError, GistApi};
use crate::cache::PageCache;
use crate::config::Config;
use crate::mirror::MirrorProvider;
use crate::sync::Synchronizer;
use crate::types::{File, NewPage, Page};
use crate::view::file_view;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to fetch gists: {0}")]
    Fetch(#[source] ApiError),

    #[error("failed to create gist: {0}")]
    Create(#[source] ApiError),
}

pub struct PageIndex<'a, C, A, M> {
    config: &'a Config,
    cache: C,
    api: A,
    mirrors: M,
}

impl<'a, C, A, M> PageIndex<'a, C, A, M>
where
    C: PageCache,
    A: GistApi,
    M: MirrorProvider,
{
    pub fn new(config: &'a Config, cache: C, api: A, mirrors: M) -> Self {
        Self {
            config,
            cache,
            api,
            mirrors,
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn mirrors(&self) -> &M {
        &self.mirrors
    }

    /// The current page set with local mirrors ensured, newest first.
    ///
    /// A non-empty cache is authoritative and the remote listing is skipped.
    /// Pages whose mirror fails are left out of the result but stay cached.
    pub fn pages(&self) -> Result<Vec<Page>, IndexError> {
        let cached = self.cache.load();
        let pages = if cached.is_empty() {
            log::info!("Fetching pages for {}", self.config.user);
            self.api.list(&self.config.user).map_err(IndexError::Fetch)?
        } else {
            log::debug!("Using {} cached pages", cached.len());
            cached
        };

        // Cache the pre-sync set so a transient mirror failure is not
        // remembered as a deleted page.
        self.cache.save(&pages);

        Ok(Synchronizer::new(self.config, &self.mirrors)
            .sync(pages)
            .into_pages())
    }

    /// Drop the cache and rebuild from the remote listing.
    pub fn refresh(&self) -> Result<Vec<Page>, IndexError> {
        self.cache.invalidate();
        self.pages()
    }

    /// Every file of every synchronized page.
    pub fn files(&self) -> Result<Vec<File>, IndexError> {
        let pages = self.pages()?;
        Ok(file_view(&self.config.paths(), &self.config.user, &pages))
    }

    /// Create a gist remotely; the cache is invalidated so the next listing
    /// picks it up.
    pub fn create(&self, page: &NewPage) -> Result<Page, IndexError> {
        let created = self.api.create(page).map_err(IndexError::Create)?;
        self.cache.invalidate();
        Ok(created)
    }
}
