pub mod db;
pub mod manifest;
