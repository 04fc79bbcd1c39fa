pub mod manifest_refresh;
