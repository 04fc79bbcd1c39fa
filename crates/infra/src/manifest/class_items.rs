use std::collections::HashMap;

use d2builds_core::domain::catalog::{
    resolve_image, ClassItemData, Perk, PerkColumn, PerkCombination, PerkTier,
};
use d2builds_core::domain::guardian::GuardianClass;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::manifest::definitions::{ExtendedSocketDefinition, ManifestTables};

/// One exotic class item per guardian class, identified by item hash.
pub struct KnownClassItem {
    pub class: GuardianClass,
    pub hash: u32,
    pub name: &'static str,
}

pub const CLASS_ITEMS: [KnownClassItem; 3] = [
    KnownClassItem {
        class: GuardianClass::Titan,
        hash: 266021826,
        name: "Stoicism",
    },
    KnownClassItem {
        class: GuardianClass::Warlock,
        hash: 2273643087,
        name: "Solipsism",
    },
    KnownClassItem {
        class: GuardianClass::Hunter,
        hash: 2809120022,
        name: "Relativism",
    },
];

/// Supplemental socket keys holding the two perk columns.
const PERK_SOCKETS: [(&str, PerkColumn); 2] = [("10", PerkColumn::First), ("11", PerkColumn::Second)];

pub fn required_hashes() -> Vec<u32> {
    CLASS_ITEMS.iter().map(|known| known.hash).collect()
}

/// Hand-curated perk pairings; perks are looked up by name in the
/// resolved class item.
pub struct CuratedCombination {
    pub class: GuardianClass,
    pub id: &'static str,
    pub perk1: &'static str,
    pub perk2: &'static str,
    pub tier: PerkTier,
    pub description: &'static str,
    pub aspects: &'static [&'static str],
    pub fragments: &'static [&'static str],
}

pub const CURATED_COMBINATIONS: &[CuratedCombination] = &[CuratedCombination {
    class: GuardianClass::Hunter,
    id: "hunter-combination-1",
    perk1: "Spirit of the Ophidian",
    perk2: "Spirit of the Cyrtarachne",
    tier: PerkTier::A,
    description: "A great combination for PvP as handling is always helpful, and gaining Woven Mail is always a plus",
    aspects: &["Stylish Executioner", "Gunpowder Gamble"],
    fragments: &["Echo of Persistence", "Echo of Undermining"],
}];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassItemError {
    #[error("missing item definition for class item {0}")]
    MissingDefinition(u32),
    #[error("missing supplemental socket data for class item {0}")]
    MissingSocketData(u32),
    #[error("class item {hash} has no socket {socket}")]
    MissingSocket { hash: u32, socket: &'static str },
}

/// Builds class item data for every class that resolves; failures only drop
/// the affected class.
pub fn build_class_items(tables: &ManifestTables, image_base: &str) -> Vec<ClassItemData> {
    let mut built = Vec::with_capacity(CLASS_ITEMS.len());
    for known in &CLASS_ITEMS {
        match build_class_item(tables, image_base, known) {
            Ok(mut data) => {
                data.combinations = curated_combinations(known.class, &data.perks);
                info!(
                    class = %known.class,
                    perks = data.perks.len(),
                    combinations = data.combinations.len(),
                    "class item built"
                );
                built.push(data);
            }
            Err(err) => {
                error!(class = %known.class, error = %err, "class item skipped");
            }
        }
    }
    built
}

fn build_class_item(
    tables: &ManifestTables,
    image_base: &str,
    known: &KnownClassItem,
) -> Result<ClassItemData, ClassItemError> {
    let definition = tables
        .items
        .get(&known.hash)
        .ok_or(ClassItemError::MissingDefinition(known.hash))?;
    let sockets: ExtendedSocketDefinition = tables
        .supplemental
        .socket_definition(known.hash)
        .ok_or(ClassItemError::MissingSocketData(known.hash))?;

    let mut perks = Vec::new();
    for (key, column) in PERK_SOCKETS {
        let socket = sockets
            .sockets
            .get(key)
            .ok_or(ClassItemError::MissingSocket {
                hash: known.hash,
                socket: key,
            })?;
        for plug in &socket.reward_plug_items {
            let Some(perk) = tables.items.get(&plug.plug_item_hash) else {
                error!(hash = plug.plug_item_hash, class = %known.class, "missing perk definition");
                continue;
            };
            perks.push(Perk {
                id: plug.plug_item_hash.to_string(),
                name: perk.name().to_string(),
                description: perk.display_properties.description.clone(),
                column,
                image_url: resolve_image(image_base, perk.display_properties.icon.as_deref()).value,
                tier: PerkTier::B,
            });
        }
    }

    let name = match definition.name() {
        "" => known.name.to_string(),
        name => name.to_string(),
    };
    Ok(ClassItemData {
        class: known.class,
        name,
        image_url: resolve_image(image_base, definition.display_properties.icon.as_deref()).value,
        description: definition.flavor_text.clone().unwrap_or_default(),
        perks,
        combinations: Vec::new(),
    })
}

fn curated_combinations(class: GuardianClass, perks: &[Perk]) -> Vec<PerkCombination> {
    let mut by_name: HashMap<&str, &Perk> = HashMap::new();
    for perk in perks {
        by_name.insert(perk.name.as_str(), perk);
    }
    let perk_named = |name: &str, column: PerkColumn| -> Perk {
        match by_name.get(name) {
            Some(perk) => (*perk).clone(),
            None => {
                warn!(perk = name, %class, "curated perk not in manifest, using placeholder");
                Perk::placeholder(name, column)
            }
        }
    };

    CURATED_COMBINATIONS
        .iter()
        .filter(|combination| combination.class == class)
        .map(|combination| PerkCombination {
            id: combination.id.to_string(),
            perk1: perk_named(combination.perk1, PerkColumn::First),
            perk2: perk_named(combination.perk2, PerkColumn::Second),
            tier: combination.tier,
            description: combination.description.to_string(),
            aspects: combination.aspects.iter().map(|s| s.to_string()).collect(),
            fragments: combination.fragments.iter().map(|s| s.to_string()).collect(),
        })
        .collect()
}
