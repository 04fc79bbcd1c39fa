pub mod class_items;
pub mod classify;
pub mod definitions;
pub mod source;

pub use classify::classify;
pub use definitions::{ManifestIndex, ManifestTables, SupplementalDataset};
pub use source::{fetch_manifest, HttpManifestSource, ManifestSource, SourceError};
