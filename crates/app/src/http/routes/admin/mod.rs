pub mod auth;
pub mod builds;
pub mod manifest;
