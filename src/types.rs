//! Shared types for gist

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a single gist page.
///
/// Pages are replaced wholesale when a newer listing arrives; consumers never
/// mutate them in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub user: String,
    pub id: String,
    pub description: String,
    pub url: String,
    pub public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// File names in the order the page declares them
    pub files: Vec<String>,
}

/// A file materialized from a page's local mirror.
#[derive(Debug, Clone)]
pub struct File {
    pub name: String,
    pub content: String,
    /// Absolute path inside the page's mirror directory
    pub path: PathBuf,
    /// The page that declares this file (lookup only)
    pub page: Arc<Page>,
}

/// Input for creating a new gist.
#[derive(Debug, Clone, Default)]
pub struct NewPage {
    pub description: String,
    pub public: bool,
    /// (file name, content) pairs
    pub files: Vec<(String, String)>,
}

/// Sort pages by creation time, most recent first.
///
/// The sort is stable, so pages with equal timestamps keep their relative order.
pub fn sort_newest_first(pages: &mut [Page]) {
    pages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
