//! Metadata cache for the page listing.
//!
//! The cache is a hint: an absent or unreadable snapshot only means the next
//! listing comes from the remote API. None of the operations can fail the
//! caller.

mod store;

pub use store::JsonFileCache;

use crate::types::Page;

/// Best-effort storage for the last known page set.
pub trait PageCache: Send + Sync {
    /// Load the snapshot, or an empty set if it is missing or unreadable.
    fn load(&self) -> Vec<Page>;

    /// Overwrite the snapshot. Failures are logged and ignored.
    fn save(&self, pages: &[Page]);

    /// Delete the snapshot. Missing is not an error.
    fn invalidate(&self);
}

impl<C: PageCache + ?Sized> PageCache for &C {
    fn load(&self) -> Vec<Page> {
        (**self).load()
    }

    fn save(&self, pages: &[Page]) {
        (**self).save(pages)
    }

    fn invalidate(&self) {
        (**self).invalidate()
    }
}
