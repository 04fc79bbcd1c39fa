pub mod build;
pub mod catalog;
pub mod fallback;
pub mod guardian;
