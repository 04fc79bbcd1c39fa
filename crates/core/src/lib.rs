pub mod annotate;
pub mod domain;
pub mod error;
pub mod types;
