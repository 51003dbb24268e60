//! File view: pages projected onto the files in their local mirrors.

use std::sync::Arc;

use crate::paths::WorkPaths;
use crate::types::{File, Page};

/// Materialize every declared file of every page, in page order and then in
/// each page's declared file order.
///
/// Files that are missing or unreadable get empty content.
pub fn file_view(paths: &WorkPaths, user: &str, pages: &[Page]) -> Vec<File> {
    let mut files = Vec::new();
    for page in pages {
        let page_ref = Arc::new(page.clone());
        for name in &page.files {
            let path = match paths.file_path(user, &page.id, name) {
                Ok(path) => path,
                Err(e) => {
                    log::warn!("Skipping {}/{}: {}", page.id, name, e);
                    continue;
                }
            };
            let content = match std::fs::read(&path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    log::debug!("Cannot read {}: {}", path.display(), e);
                    String::new()
                }
            };
            files.push(File {
                name: name.clone(),
                content,
                path,
                page: Arc::clone(&page_ref),
            });
        }
    }
    files
}

/// Find a file by gist id (or unique id prefix) and file name.
pub fn find_file<'a>(files: &'a [File], id: &str, name: &str) -> Option<&'a File> {
    if let Some(file) = files.iter().find(|f| f.page.id == id && f.name == name) {
        return Some(file);
    }
    let mut matches = files
        .iter()
        .filter(|f| f.name == name && f.page.id.starts_with(id));
    match (matches.next(), matches.next()) {
        (Some(file), None) => Some(file),
        _ => None,
    }
}
