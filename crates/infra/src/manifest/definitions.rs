use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::manifest::source::SourceError;

pub const INVENTORY_ITEM_TABLE: &str = "DestinyInventoryItemDefinition";
pub const SANDBOX_PERK_TABLE: &str = "DestinySandboxPerkDefinition";

/// Bungie platform response wrapper.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Envelope<T> {
    pub response: Option<T>,
    #[serde(default)]
    pub error_code: i32,
    #[serde(default)]
    pub error_status: String,
    #[serde(default)]
    pub message: String,
}

impl<T> Envelope<T> {
    const SUCCESS: i32 = 1;

    pub fn into_response(self) -> Result<T, SourceError> {
        if self.error_code != Self::SUCCESS {
            return Err(SourceError::Upstream {
                code: self.error_code,
                status: self.error_status,
                message: self.message,
            });
        }
        self.response.ok_or(SourceError::MissingData("Response"))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestIndex {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub json_world_component_content_paths: HashMap<String, HashMap<String, String>>,
}

impl ManifestIndex {
    pub fn table_path(&self, language: &str, table: &'static str) -> Result<&str, SourceError> {
        self.json_world_component_content_paths
            .get(language)
            .and_then(|tables| tables.get(table))
            .map(String::as_str)
            .filter(|path| !path.is_empty())
            .ok_or_else(|| SourceError::MissingTable {
                table,
                language: language.to_string(),
            })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayProperties {
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InventoryBlock {
    pub tier_type: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SocketEntry {
    pub single_initial_item_hash: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SocketBlock {
    pub socket_entries: Vec<SocketEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InventoryItemDefinition {
    pub hash: u32,
    pub display_properties: DisplayProperties,
    pub item_type: i32,
    pub item_type_display_name: Option<String>,
    pub inventory: Option<InventoryBlock>,
    pub screenshot: Option<String>,
    pub sockets: Option<SocketBlock>,
    pub flavor_text: Option<String>,
}

impl InventoryItemDefinition {
    pub fn name(&self) -> &str {
        &self.display_properties.name
    }

    pub fn display_type(&self) -> &str {
        self.item_type_display_name.as_deref().unwrap_or_default()
    }

    pub fn tier_type(&self) -> Option<i32> {
        self.inventory.as_ref().map(|inventory| inventory.tier_type)
    }

    /// Hash plugged into the socket at `index` by default, if any.
    pub fn socket_plug(&self, index: usize) -> Option<u32> {
        self.sockets
            .as_ref()?
            .socket_entries
            .get(index)
            .map(|entry| entry.single_initial_item_hash)
            .filter(|hash| *hash != 0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SandboxPerkDefinition {
    pub hash: u32,
    pub display_properties: DisplayProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RewardPlugItem {
    pub plug_item_hash: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtendedSocket {
    pub reward_plug_items: Vec<RewardPlugItem>,
}

/// Per-item socket data from the supplemental dataset, keyed by socket index.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtendedSocketDefinition {
    pub hash: u32,
    pub sockets: HashMap<String, ExtendedSocket>,
}

/// Supplemental document keyed by numeric item hash.
#[derive(Debug, Clone, Default)]
pub struct SupplementalDataset {
    entries: Map<String, Value>,
}

impl SupplementalDataset {
    /// Accepts the document only if it is an object containing every
    /// `required` hash.
    pub fn from_value(value: Value, required: &[u32]) -> Result<Self, SourceError> {
        let Value::Object(entries) = value else {
            return Err(SourceError::NotAnObject);
        };
        let missing: Vec<u32> = required
            .iter()
            .copied()
            .filter(|hash| {
                entries
                    .get(&hash.to_string())
                    .is_none_or(|entry| entry.is_null())
            })
            .collect();
        if !missing.is_empty() {
            return Err(SourceError::MissingClassItems(missing));
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries are decoded on demand; shapes vary across the document.
    pub fn socket_definition(&self, hash: u32) -> Option<ExtendedSocketDefinition> {
        let entry = self.entries.get(&hash.to_string())?;
        serde_json::from_value(entry.clone()).ok()
    }
}

/// Everything a rebuild fetched, ready for classification.
#[derive(Debug, Clone, Default)]
pub struct ManifestTables {
    pub version: String,
    pub items: HashMap<u32, InventoryItemDefinition>,
    pub sandbox_perks: Vec<SandboxPerkDefinition>,
    pub supplemental: SupplementalDataset,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn envelope_rejects_upstream_error_codes() {
        let envelope: Envelope<ManifestIndex> = serde_json::from_value(json!({
            "ErrorCode": 5,
            "ErrorStatus": "SystemDisabled",
            "Message": "maintenance"
        }))
        .unwrap();
        let err = envelope.into_response().unwrap_err();
        assert!(matches!(err, SourceError::Upstream { code: 5, .. }));
    }

    #[test]
    fn index_resolves_table_paths_per_language() {
        let envelope: Envelope<ManifestIndex> = serde_json::from_value(json!({
            "Response": {
                "version": "228511.24",
                "jsonWorldComponentContentPaths": {
                    "en": { "DestinyInventoryItemDefinition": "/common/items-en.json" }
                }
            },
            "ErrorCode": 1,
            "ErrorStatus": "Success",
            "Message": "Ok"
        }))
        .unwrap();
        let index = envelope.into_response().unwrap();
        assert_eq!(
            index.table_path("en", INVENTORY_ITEM_TABLE).unwrap(),
            "/common/items-en.json"
        );
        assert!(index.table_path("en", SANDBOX_PERK_TABLE).is_err());
        assert!(index.table_path("fr", INVENTORY_ITEM_TABLE).is_err());
    }

    #[test]
    fn item_definition_tolerates_sparse_json() {
        let item: InventoryItemDefinition = serde_json::from_value(json!({
            "hash": 42,
            "displayProperties": { "name": "Bomber" },
            "itemType": 19,
            "sockets": { "socketEntries": [{ "singleInitialItemHash": 0 }, { "singleInitialItemHash": 7 }] }
        }))
        .unwrap();
        assert_eq!(item.name(), "Bomber");
        assert_eq!(item.display_type(), "");
        assert_eq!(item.socket_plug(0), None);
        assert_eq!(item.socket_plug(1), Some(7));
        assert_eq!(item.socket_plug(11), None);
    }

    #[test]
    fn supplemental_requires_object_with_all_keys() {
        assert!(matches!(
            SupplementalDataset::from_value(json!([1, 2]), &[1]),
            Err(SourceError::NotAnObject)
        ));
        let err = SupplementalDataset::from_value(json!({ "1": {}, "3": null }), &[1, 2, 3])
            .unwrap_err();
        assert!(matches!(err, SourceError::MissingClassItems(ref missing) if missing == &vec![2, 3]));
    }

    #[test]
    fn supplemental_decodes_socket_definitions() {
        let dataset = SupplementalDataset::from_value(
            json!({
                "266021826": {
                    "hash": 266021826,
                    "sockets": { "10": { "rewardPlugItems": [{ "plugItemHash": 11 }] } }
                }
            }),
            &[266021826],
        )
        .unwrap();
        let definition = dataset.socket_definition(266021826).unwrap();
        assert_eq!(definition.sockets["10"].reward_plug_items[0].plug_item_hash, 11);
        assert!(dataset.socket_definition(1).is_none());
    }
}
