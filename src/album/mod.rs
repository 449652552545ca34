// Album module - directory pages, single item views and derivative serving
mod error;
mod handlers;
pub mod listing;
pub mod navigation;
mod pages;
mod serve;

pub use error::AlbumError;
pub use handlers::{album_handler, album_root_handler, derivative_handler, top_page_handler};
pub use navigation::{Jump, NavigationWindow, StripEntry};
pub use serve::serve_file;
