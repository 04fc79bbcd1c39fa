pub mod admin;
pub mod builds;
pub mod catalog;
pub mod health;
pub mod manifest;

use serde::Serialize;

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}
