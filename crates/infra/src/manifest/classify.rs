use std::collections::HashMap;
use std::time::Instant;

use d2builds_core::domain::catalog::{
    ArmorSlot, CatalogItem, DescriptionSource, ItemKind, ManifestSnapshot, SandboxPerk,
};
use d2builds_core::domain::fallback::{first_available, Resolved};
use tracing::{debug, info};

use crate::manifest::class_items::build_class_items;
use crate::manifest::definitions::{
    InventoryItemDefinition, ManifestTables, SandboxPerkDefinition,
};

pub const ITEM_TYPE_ARMOR: i32 = 2;
pub const ITEM_TYPE_WEAPON: i32 = 3;
pub const ITEM_TYPE_MOD: i32 = 19;
pub const TIER_TYPE_EXOTIC: i32 = 6;

/// Armor tries the intrinsic perk socket, then the first socket.
const ARMOR_DESCRIPTION_SOCKETS: [usize; 2] = [11, 1];
const WEAPON_DESCRIPTION_SOCKETS: [usize; 1] = [0];

pub fn is_deprecated(item: &InventoryItemDefinition) -> bool {
    item.display_type().to_lowercase().contains("deprecated")
}

fn has_preview(item: &InventoryItemDefinition) -> bool {
    item.screenshot.as_deref().is_some_and(|shot| !shot.is_empty())
}

fn is_exotic_of_type(item: &InventoryItemDefinition, item_type: i32) -> bool {
    item.tier_type() == Some(TIER_TYPE_EXOTIC)
        && item.item_type == item_type
        && !is_deprecated(item)
        && has_preview(item)
}

pub fn is_exotic_armor(item: &InventoryItemDefinition) -> bool {
    is_exotic_of_type(item, ITEM_TYPE_ARMOR)
}

pub fn is_exotic_weapon(item: &InventoryItemDefinition) -> bool {
    is_exotic_of_type(item, ITEM_TYPE_WEAPON)
}

pub fn is_mod(item: &InventoryItemDefinition) -> bool {
    item.item_type == ITEM_TYPE_MOD && !is_deprecated(item)
}

pub fn is_aspect(item: &InventoryItemDefinition) -> bool {
    item.display_type().contains("Aspect") && !is_deprecated(item)
}

pub fn is_fragment(item: &InventoryItemDefinition) -> bool {
    item.display_type().contains("Fragment") && !is_deprecated(item)
}

/// Read-only view over one rebuild's tables used while classifying.
struct Classifier<'a> {
    items: &'a HashMap<u32, InventoryItemDefinition>,
    perks_by_name: HashMap<&'a str, &'a SandboxPerkDefinition>,
}

impl<'a> Classifier<'a> {
    fn new(tables: &'a ManifestTables) -> Self {
        let mut perks_by_name = HashMap::new();
        for perk in &tables.sandbox_perks {
            // First entry with a given name wins.
            perks_by_name
                .entry(perk.display_properties.name.as_str())
                .or_insert(perk);
        }
        Self {
            items: &tables.items,
            perks_by_name,
        }
    }

    fn plug_description(&self, item: &InventoryItemDefinition, socket: usize) -> Option<String> {
        let plug = self.items.get(&item.socket_plug(socket)?)?;
        let description = &plug.display_properties.description;
        (!description.is_empty()).then(|| description.clone())
    }

    fn sandbox_description(&self, name: &str) -> Option<String> {
        self.perks_by_name
            .get(name)
            .map(|perk| perk.display_properties.description.clone())
    }

    fn describe(
        &self,
        item: &InventoryItemDefinition,
        kind: ItemKind,
    ) -> Resolved<String, DescriptionSource> {
        let own = &item.display_properties.description;
        if !own.is_empty() {
            return Resolved::new(own.clone(), DescriptionSource::Own);
        }
        match kind {
            ItemKind::ExoticArmor => self.from_sockets(item, &ARMOR_DESCRIPTION_SOCKETS),
            ItemKind::ExoticWeapon => self.from_sockets(item, &WEAPON_DESCRIPTION_SOCKETS),
            ItemKind::Mod | ItemKind::Aspect | ItemKind::Fragment => first_available(
                [(DescriptionSource::SandboxPerk, self.sandbox_description(item.name()))],
                DescriptionSource::Missing,
                String::new(),
            ),
        }
    }

    fn from_sockets(
        &self,
        item: &InventoryItemDefinition,
        sockets: &[usize],
    ) -> Resolved<String, DescriptionSource> {
        first_available(
            sockets.iter().map(|&socket| {
                (
                    DescriptionSource::Socket(socket),
                    self.plug_description(item, socket),
                )
            }),
            DescriptionSource::Missing,
            String::new(),
        )
    }

    fn catalog_item(&self, item: &InventoryItemDefinition, kind: ItemKind) -> CatalogItem {
        let description = self.describe(item, kind);
        let armor_slot = match kind {
            ItemKind::Mod => ArmorSlot::from_display_type(item.display_type()),
            _ => None,
        };
        CatalogItem {
            hash: item.hash,
            name: item.name().to_string(),
            kind,
            icon: item
                .display_properties
                .icon
                .clone()
                .filter(|icon| !icon.is_empty()),
            description: description.value,
            description_source: description.source,
            display_type: item.display_type().to_string(),
            armor_slot,
        }
    }

    fn bucket(
        &self,
        sorted: &[&InventoryItemDefinition],
        kind: ItemKind,
        predicate: fn(&InventoryItemDefinition) -> bool,
    ) -> Vec<CatalogItem> {
        sorted
            .iter()
            .filter(|item| predicate(item))
            .map(|item| self.catalog_item(item, kind))
            .collect()
    }
}

/// Splits raw tables into the snapshot buckets, backfilling descriptions and
/// building the exotic class item data.
pub fn classify(tables: &ManifestTables, image_base: &str) -> ManifestSnapshot {
    let started = Instant::now();
    let classifier = Classifier::new(tables);

    let mut sorted: Vec<&InventoryItemDefinition> = tables.items.values().collect();
    sorted.sort_by_key(|item| item.hash);

    let snapshot = ManifestSnapshot {
        exotic_armor: classifier.bucket(&sorted, ItemKind::ExoticArmor, is_exotic_armor),
        exotic_weapons: classifier.bucket(&sorted, ItemKind::ExoticWeapon, is_exotic_weapon),
        mods: classifier.bucket(&sorted, ItemKind::Mod, is_mod),
        aspects: classifier.bucket(&sorted, ItemKind::Aspect, is_aspect),
        fragments: classifier.bucket(&sorted, ItemKind::Fragment, is_fragment),
        sandbox_perks: tables
            .sandbox_perks
            .iter()
            .map(|perk| SandboxPerk {
                hash: perk.hash,
                name: perk.display_properties.name.clone(),
                description: perk.display_properties.description.clone(),
                icon: perk.display_properties.icon.clone(),
            })
            .collect(),
        exotic_class_items: build_class_items(tables, image_base),
    };

    let counts = snapshot.counts();
    debug!(?counts, "manifest buckets");
    info!(
        items = tables.items.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "manifest classified"
    );
    snapshot
}
