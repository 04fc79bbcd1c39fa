use serde::Serialize;

use crate::domain::fallback::{first_available, Resolved};
use crate::domain::guardian::{GuardianClass, Subclass};

pub const PLACEHOLDER_IMAGE: &str = "/placeholder.svg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    ExoticArmor,
    ExoticWeapon,
    Mod,
    Aspect,
    Fragment,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::ExoticArmor => "exotic_armor",
            ItemKind::ExoticWeapon => "exotic_weapon",
            ItemKind::Mod => "mod",
            ItemKind::Aspect => "aspect",
            ItemKind::Fragment => "fragment",
        }
    }
}

/// Coarse armor slot a mod plugs into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmorSlot {
    Helmet,
    Arms,
    Chest,
    Legs,
    Class,
}

impl ArmorSlot {
    /// Matched in order; the first substring hit wins.
    const PATTERNS: [(&'static str, ArmorSlot); 5] = [
        ("Helmet", ArmorSlot::Helmet),
        ("Arms", ArmorSlot::Arms),
        ("Chest", ArmorSlot::Chest),
        ("Leg", ArmorSlot::Legs),
        ("Class Item", ArmorSlot::Class),
    ];

    pub fn from_display_type(display_type: &str) -> Option<Self> {
        Self::PATTERNS
            .iter()
            .find(|(needle, _)| display_type.contains(needle))
            .map(|(_, slot)| *slot)
    }

    pub fn tag(self) -> &'static str {
        match self {
            ArmorSlot::Helmet => "helmet",
            ArmorSlot::Arms => "arms",
            ArmorSlot::Chest => "chest",
            ArmorSlot::Legs => "legs",
            ArmorSlot::Class => "class",
        }
    }
}

/// Slot tag for a mod's display type, empty when nothing matches.
pub fn armor_slot_tag(display_type: &str) -> &'static str {
    ArmorSlot::from_display_type(display_type).map_or("", ArmorSlot::tag)
}

/// Where a catalog item's description came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionSource {
    Own,
    SandboxPerk,
    Socket(usize),
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    Icon,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogItem {
    pub hash: u32,
    pub name: String,
    pub kind: ItemKind,
    pub icon: Option<String>,
    pub description: String,
    pub description_source: DescriptionSource,
    pub display_type: String,
    pub armor_slot: Option<ArmorSlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SandboxPerk {
    pub hash: u32,
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PerkTier {
    S,
    A,
    B,
    C,
}

/// Perk column on an exotic class item; serialized as `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PerkColumn {
    First,
    Second,
}

impl PerkColumn {
    pub fn number(self) -> u8 {
        match self {
            PerkColumn::First => 1,
            PerkColumn::Second => 2,
        }
    }
}

impl Serialize for PerkColumn {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.number())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Perk {
    pub id: String,
    pub name: String,
    pub description: String,
    pub column: PerkColumn,
    pub image_url: String,
    pub tier: PerkTier,
}

impl Perk {
    /// Stand-in for a curated perk name that is absent from the manifest.
    pub fn placeholder(name: &str, column: PerkColumn) -> Self {
        let id = name
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join("-");
        Self {
            id,
            name: name.to_string(),
            description: format!("Description for {name} not found"),
            column,
            image_url: PLACEHOLDER_IMAGE.to_string(),
            tier: PerkTier::B,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerkCombination {
    pub id: String,
    pub perk1: Perk,
    pub perk2: Perk,
    pub tier: PerkTier,
    pub description: String,
    pub aspects: Vec<String>,
    pub fragments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassItemData {
    pub class: GuardianClass,
    pub name: String,
    pub image_url: String,
    pub description: String,
    pub perks: Vec<Perk>,
    pub combinations: Vec<PerkCombination>,
}

/// One fully classified copy of the manifest tables the site needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ManifestSnapshot {
    pub exotic_armor: Vec<CatalogItem>,
    pub exotic_weapons: Vec<CatalogItem>,
    pub mods: Vec<CatalogItem>,
    pub aspects: Vec<CatalogItem>,
    pub fragments: Vec<CatalogItem>,
    pub sandbox_perks: Vec<SandboxPerk>,
    pub exotic_class_items: Vec<ClassItemData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketCounts {
    pub exotic_armor: usize,
    pub exotic_weapons: usize,
    pub mods: usize,
    pub aspects: usize,
    pub fragments: usize,
    pub sandbox_perks: usize,
    pub exotic_class_items: usize,
}

impl ManifestSnapshot {
    pub fn bucket(&self, kind: ItemKind) -> &[CatalogItem] {
        match kind {
            ItemKind::ExoticArmor => &self.exotic_armor,
            ItemKind::ExoticWeapon => &self.exotic_weapons,
            ItemKind::Mod => &self.mods,
            ItemKind::Aspect => &self.aspects,
            ItemKind::Fragment => &self.fragments,
        }
    }

    pub fn find(&self, kind: ItemKind, name: &str) -> Option<&CatalogItem> {
        self.bucket(kind).iter().find(|item| item.name == name)
    }

    /// Exotic armor first, then exotic weapons.
    pub fn exotic(&self, name: &str) -> Option<&CatalogItem> {
        self.find(ItemKind::ExoticArmor, name)
            .or_else(|| self.find(ItemKind::ExoticWeapon, name))
    }

    pub fn aspects_by_subclass(&self, subclass: Subclass) -> Vec<&CatalogItem> {
        filter_by_subclass(&self.aspects, subclass, "Aspect")
    }

    pub fn fragments_by_subclass(&self, subclass: Subclass) -> Vec<&CatalogItem> {
        filter_by_subclass(&self.fragments, subclass, "Fragment")
    }

    pub fn class_item(&self, class: GuardianClass) -> Option<&ClassItemData> {
        self.exotic_class_items.iter().find(|item| item.class == class)
    }

    pub fn counts(&self) -> BucketCounts {
        BucketCounts {
            exotic_armor: self.exotic_armor.len(),
            exotic_weapons: self.exotic_weapons.len(),
            mods: self.mods.len(),
            aspects: self.aspects.len(),
            fragments: self.fragments.len(),
            sandbox_perks: self.sandbox_perks.len(),
            exotic_class_items: self.exotic_class_items.len(),
        }
    }
}

fn filter_by_subclass<'a>(
    items: &'a [CatalogItem],
    subclass: Subclass,
    suffix: &str,
) -> Vec<&'a CatalogItem> {
    if !subclass.has_own_catalog() {
        return Vec::new();
    }
    let needle = format!("{} {suffix}", subclass.as_str());
    items
        .iter()
        .filter(|item| item.display_type.contains(&needle))
        .collect()
}

/// Absolute image URL for an icon path, or the placeholder image.
pub fn resolve_image(image_base: &str, icon: Option<&str>) -> Resolved<String, ImageSource> {
    let base = image_base.trim_end_matches('/');
    first_available(
        [(
            ImageSource::Icon,
            icon.filter(|path| !path.is_empty())
                .map(|path| format!("{base}{path}")),
        )],
        ImageSource::Placeholder,
        PLACEHOLDER_IMAGE.to_string(),
    )
}
