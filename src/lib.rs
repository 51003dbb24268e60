//! Local git mirror of a user's GitHub gists.

pub mod api;
pub mod cache;
pub mod config;
pub mod editor;
pub mod index;
pub mod mirror;
pub mod paths;
pub mod publish;
pub mod sync;
pub mod types;
pub mod view;

pub use config::Config;
pub use types::{File, NewPage, Page};
