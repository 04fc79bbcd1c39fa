//! Build view models: stored builds merged with manifest lookups.
//!
//! Nothing here fails because of the manifest. Items that cannot be resolved
//! fall back to placeholders and narrative falls back to plain text.

use std::collections::HashMap;

use d2builds_core::annotate::{HighlightTracker, ItemIndex, ItemReference, ReferenceKind, Segment};
use d2builds_core::domain::build::{Build, BuildMetrics, Mode};
use d2builds_core::domain::catalog::{
    armor_slot_tag, resolve_image, CatalogItem, ImageSource, ManifestSnapshot, PLACEHOLDER_IMAGE,
};
use d2builds_core::domain::fallback::first_available;
use d2builds_core::domain::guardian::{GuardianClass, Subclass};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::manifest_cache::ManifestCache;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExoticView {
    pub name: String,
    pub image_url: String,
    pub image_source: ImageSource,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModView {
    pub name: String,
    pub image_url: String,
    pub image_source: ImageSource,
    pub description: String,
    pub armor_slot: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariationRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub id: String,
    pub name: String,
    pub class: GuardianClass,
    pub subclass: Subclass,
    pub mode: Mode,
    pub description: String,
    pub tags: Vec<String>,
    pub image_url: String,
    pub exotics: Vec<ExoticView>,
    pub metrics: Option<BuildMetrics>,
    pub is_variation: bool,
    pub parent_build_id: Option<String>,
    pub variations: Vec<VariationRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassGroup {
    pub class: GuardianClass,
    pub builds: Vec<BuildSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildDetail {
    pub build: Build,
    pub image_url: String,
    pub exotics: Vec<ExoticView>,
    pub key_mods: Vec<ModView>,
    pub how_it_works: Vec<Vec<Segment>>,
    pub how_it_works2: Option<Vec<Vec<Segment>>>,
    pub manifest_available: bool,
}

fn build_image(image_url: Option<&str>) -> String {
    image_url.unwrap_or(PLACEHOLDER_IMAGE).to_string()
}

fn exotic_view(image_base: &str, name: &str, item: Option<&CatalogItem>) -> ExoticView {
    let image = resolve_image(image_base, item.and_then(|item| item.icon.as_deref()));
    ExoticView {
        name: name.to_string(),
        image_url: image.value,
        image_source: image.source,
        description: item.map(|item| item.description.clone()).unwrap_or_default(),
    }
}

fn mod_view(image_base: &str, name: &str, item: Option<&CatalogItem>) -> ModView {
    let image = resolve_image(image_base, item.and_then(|item| item.icon.as_deref()));
    ModView {
        name: name.to_string(),
        image_url: image.value,
        image_source: image.source,
        description: item.map(|item| item.description.clone()).unwrap_or_default(),
        armor_slot: item.map_or("", |item| armor_slot_tag(&item.display_type)),
    }
}

async fn resolve_exotic(cache: &ManifestCache, name: &str) -> ExoticView {
    match cache.exotic(name).await {
        Ok(item) => {
            if item.is_none() {
                debug!(exotic = name, "exotic not in manifest");
            }
            exotic_view(cache.image_base(), name, item.as_ref())
        }
        Err(err) => {
            debug!(exotic = name, error = %err, "exotic lookup failed");
            exotic_view(cache.image_base(), name, None)
        }
    }
}

async fn resolve_mod(cache: &ManifestCache, name: &str) -> ModView {
    match cache.mod_item(name).await {
        Ok(item) => mod_view(cache.image_base(), name, item.as_ref()),
        Err(err) => {
            debug!(key_mod = name, error = %err, "mod lookup failed");
            mod_view(cache.image_base(), name, None)
        }
    }
}

async fn resolve_exotics(cache: &ManifestCache, names: &[String]) -> Vec<ExoticView> {
    join_all(names.iter().map(|name| resolve_exotic(cache, name))).await
}

/// Base builds in creation order followed by their variations. Variations
/// whose parent is unknown are dropped.
fn arrange_listing(builds: Vec<Build>) -> Vec<(Build, Option<String>)> {
    let (bases, variations): (Vec<_>, Vec<_>) =
        builds.into_iter().partition(|build| !build.is_variation());
    let parent_images: HashMap<String, Option<String>> = bases
        .iter()
        .map(|build| (build.id.clone(), build.image_url.clone()))
        .collect();

    let mut arranged: Vec<(Build, Option<String>)> =
        bases.into_iter().map(|build| (build, None)).collect();
    for variation in variations {
        let Some(parent_image) = variation
            .parent_build_id
            .as_ref()
            .and_then(|parent| parent_images.get(parent))
        else {
            warn!(
                build = %variation.id,
                parent = ?variation.parent_build_id,
                "variation without parent dropped"
            );
            continue;
        };
        let inherited = parent_image.clone();
        arranged.push((variation, inherited));
    }
    arranged
}

/// One group per class in display order; within a group builds are ordered
/// by subclass, keeping creation order otherwise.
pub fn group_by_class(summaries: Vec<BuildSummary>) -> Vec<ClassGroup> {
    let mut groups: Vec<ClassGroup> = GuardianClass::ALL
        .iter()
        .map(|class| ClassGroup {
            class: *class,
            builds: Vec::new(),
        })
        .collect();
    for summary in summaries {
        if let Some(group) = groups.iter_mut().find(|group| group.class == summary.class) {
            group.builds.push(summary);
        }
    }
    for group in &mut groups {
        group.builds.sort_by_key(|build| build.subclass.sort_order());
    }
    groups
}

/// Listing view for all builds.
pub async fn render_listing(cache: &ManifestCache, builds: Vec<Build>) -> Vec<ClassGroup> {
    let arranged = arrange_listing(builds);

    let mut variations_by_parent: HashMap<String, Vec<VariationRef>> = HashMap::new();
    for (build, _) in &arranged {
        if let Some(parent) = &build.parent_build_id {
            variations_by_parent
                .entry(parent.clone())
                .or_default()
                .push(VariationRef {
                    id: build.id.clone(),
                    name: build.name.clone(),
                });
        }
    }

    let exotics = join_all(
        arranged
            .iter()
            .map(|(build, _)| resolve_exotics(cache, &build.exotics)),
    )
    .await;

    let summaries = arranged
        .into_iter()
        .zip(exotics)
        .map(|((build, inherited_image), exotics)| {
            let image = first_available(
                [
                    ("own", build.image_url.clone()),
                    ("parent", inherited_image),
                ],
                "placeholder",
                PLACEHOLDER_IMAGE.to_string(),
            );
            BuildSummary {
                variations: variations_by_parent.remove(&build.id).unwrap_or_default(),
                is_variation: build.is_variation(),
                image_url: image.value,
                id: build.id,
                name: build.name,
                class: build.class,
                subclass: build.subclass,
                mode: build.mode,
                description: build.description,
                tags: build.tags,
                exotics,
                metrics: build.metrics,
                parent_build_id: build.parent_build_id,
            }
        })
        .collect();
    group_by_class(summaries)
}

/// Known names for one build's narrative: its exotics and key mods, then
/// every aspect and fragment. Later entries win on a name clash.
fn item_index(
    snapshot: &ManifestSnapshot,
    image_base: &str,
    exotics: &[ExoticView],
    key_mods: &[ModView],
) -> Option<ItemIndex> {
    let exotic_refs = exotics.iter().map(|exotic| ItemReference {
        kind: ReferenceKind::Exotic,
        name: exotic.name.clone(),
        image_url: exotic.image_url.clone(),
        description: exotic.description.clone(),
        armor_slot: None,
    });
    let mod_refs = key_mods.iter().map(|key_mod| ItemReference {
        kind: ReferenceKind::Mod,
        name: key_mod.name.clone(),
        image_url: key_mod.image_url.clone(),
        description: key_mod.description.clone(),
        armor_slot: Some(key_mod.armor_slot.to_string()).filter(|slot| !slot.is_empty()),
    });
    let catalog_ref = |kind: ReferenceKind| {
        move |item: &CatalogItem| ItemReference {
            kind,
            name: item.name.clone(),
            image_url: resolve_image(image_base, item.icon.as_deref()).value,
            description: item.description.clone(),
            armor_slot: None,
        }
    };
    let aspect_refs = snapshot.aspects.iter().map(catalog_ref(ReferenceKind::Aspect));
    let fragment_refs = snapshot.fragments.iter().map(catalog_ref(ReferenceKind::Fragment));

    match ItemIndex::new(exotic_refs.chain(mod_refs).chain(aspect_refs).chain(fragment_refs)) {
        Ok(index) => Some(index),
        Err(err) => {
            warn!(error = %err, "item index unavailable, narrative left plain");
            None
        }
    }
}

fn plain(paragraphs: &[String]) -> Vec<Vec<Segment>> {
    paragraphs
        .iter()
        .map(|text| vec![Segment::Text { text: text.clone() }])
        .collect()
}

/// Annotates both narrative sections with one tracker, so an item is only
/// highlighted at its first mention across the whole build.
pub fn annotate_narrative(
    index: Option<&ItemIndex>,
    how_it_works: &[String],
    how_it_works2: Option<&[String]>,
) -> (Vec<Vec<Segment>>, Option<Vec<Vec<Segment>>>) {
    let Some(index) = index else {
        return (plain(how_it_works), how_it_works2.map(plain));
    };
    let mut tracker = HighlightTracker::new();
    let mut first = true;
    let mut section = |paragraphs: &[String]| -> Vec<Vec<Segment>> {
        paragraphs
            .iter()
            .map(|paragraph| {
                let reset = std::mem::replace(&mut first, false);
                index.annotate(paragraph, &mut tracker, reset).collect()
            })
            .collect()
    };
    let primary = section(how_it_works);
    let secondary = how_it_works2.map(&mut section);
    (primary, secondary)
}

/// Detail view for one build.
pub async fn render_detail(cache: &ManifestCache, build: Build) -> BuildDetail {
    let (exotics, key_mods, snapshot) = tokio::join!(
        resolve_exotics(cache, &build.exotics),
        join_all(build.key_mods.iter().map(|name| resolve_mod(cache, name))),
        cache.best_effort(),
    );

    let snapshot = match snapshot {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            warn!(build = %build.id, error = %err, "manifest unavailable, rendering degraded");
            None
        }
    };
    let index = snapshot
        .as_deref()
        .and_then(|snapshot| item_index(snapshot, cache.image_base(), &exotics, &key_mods));
    let (how_it_works, how_it_works2) = annotate_narrative(
        index.as_ref(),
        &build.how_it_works,
        build.how_it_works2.as_deref(),
    );

    BuildDetail {
        image_url: build_image(build.image_url.as_deref()),
        exotics,
        key_mods,
        how_it_works,
        how_it_works2,
        manifest_available: snapshot.is_some(),
        build,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use d2builds_infra::manifest::definitions::InventoryItemDefinition;
    use d2builds_infra::manifest::ManifestSource;

    use super::*;
    use crate::manifest_cache::tests::{exotic_armor, FakeSource};

    fn build(id: &str, class: GuardianClass, subclass: Subclass) -> Build {
        Build {
            id: id.to_string(),
            name: format!("Build {id}"),
            class,
            subclass,
            description: "A build for testing.".to_string(),
            image_url: None,
            mode: Mode::PvE,
            tags: Vec::new(),
            exotics: vec!["Celestial Nighthawk".to_string()],
            key_mods: Vec::new(),
            target_stats: Vec::new(),
            aspects: Vec::new(),
            fragments: Vec::new(),
            how_it_works: vec!["Celestial Nighthawk does it.".to_string()],
            how_it_works2: None,
            metrics: None,
            parent_build_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn aspect(hash: u32, name: &str) -> InventoryItemDefinition {
        InventoryItemDefinition {
            item_type: 0,
            item_type_display_name: Some("Solar Aspect".to_string()),
            screenshot: None,
            ..exotic_armor(hash, name, "Aspect text.")
        }
    }

    fn cache_with(source: FakeSource) -> ManifestCache {
        ManifestCache::new(
            Arc::new(source) as Arc<dyn ManifestSource>,
            "https://www.bungie.net".to_string(),
            Duration::from_secs(60),
        )
    }

    fn texts(segments: &[Segment]) -> Vec<String> {
        segments
            .iter()
            .map(|segment| match segment {
                Segment::Text { text } => format!("text:{text}"),
                Segment::Reference { item } => format!("ref:{}", item.name),
            })
            .collect()
    }

    #[test]
    fn listing_groups_by_class_and_subclass_order() {
        let summaries = vec![
            ("a", GuardianClass::Hunter, Subclass::Prismatic),
            ("b", GuardianClass::Warlock, Subclass::Void),
            ("c", GuardianClass::Hunter, Subclass::Arc),
            ("d", GuardianClass::Hunter, Subclass::Prismatic),
        ]
        .into_iter()
        .map(|(id, class, subclass)| BuildSummary {
            id: id.to_string(),
            name: id.to_string(),
            class,
            subclass,
            mode: Mode::PvE,
            description: String::new(),
            tags: Vec::new(),
            image_url: PLACEHOLDER_IMAGE.to_string(),
            exotics: Vec::new(),
            metrics: None,
            is_variation: false,
            parent_build_id: None,
            variations: Vec::new(),
        })
        .collect();

        let groups = group_by_class(summaries);
        let classes: Vec<_> = groups.iter().map(|group| group.class).collect();
        assert_eq!(
            classes,
            vec![GuardianClass::Hunter, GuardianClass::Titan, GuardianClass::Warlock]
        );
        let hunter: Vec<_> = groups[0].builds.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(hunter, vec!["c", "a", "d"]);
        assert!(groups[1].builds.is_empty());
    }

    #[test]
    fn variations_follow_parents_and_orphans_are_dropped() {
        let parent = Build {
            image_url: Some("https://img.example/parent.png".to_string()),
            ..build("parent", GuardianClass::Hunter, Subclass::Solar)
        };
        let variation = Build {
            parent_build_id: Some("parent".to_string()),
            ..build("variation", GuardianClass::Hunter, Subclass::Solar)
        };
        let orphan = Build {
            parent_build_id: Some("missing".to_string()),
            ..build("orphan", GuardianClass::Hunter, Subclass::Solar)
        };
        let arranged = arrange_listing(vec![variation, parent, orphan]);
        let ids: Vec<_> = arranged.iter().map(|(b, _)| b.id.as_str()).collect();
        assert_eq!(ids, vec!["parent", "variation"]);
        assert_eq!(
            arranged[1].1.as_deref(),
            Some("https://img.example/parent.png")
        );
    }

    #[test]
    fn narrative_tracks_first_mention_across_both_sections() {
        let index = ItemIndex::new([ItemReference {
            kind: ReferenceKind::Aspect,
            name: "Knock 'Em Down".to_string(),
            image_url: PLACEHOLDER_IMAGE.to_string(),
            description: String::new(),
            armor_slot: None,
        }])
        .unwrap();
        let first = vec!["Use Knock 'Em Down.".to_string()];
        let second = vec!["Knock 'Em Down again.".to_string()];
        let (primary, secondary) = annotate_narrative(Some(&index), &first, Some(&second));
        assert_eq!(texts(&primary[0])[1], "ref:Knock 'Em Down");
        assert_eq!(texts(&secondary.unwrap()[0])[0], "text:Knock 'Em Down");

        let (plain, none) = annotate_narrative(None, &first, None);
        assert_eq!(texts(&plain[0]), vec!["text:Use Knock 'Em Down."]);
        assert!(none.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn detail_resolves_items_and_annotates() {
        let cache = cache_with(FakeSource::with_items(vec![
            exotic_armor(1, "Celestial Nighthawk", "One big shot."),
            aspect(2, "Knock 'Em Down"),
        ]));
        let detail = render_detail(
            &cache,
            Build {
                key_mods: vec!["Unknown Mod".to_string()],
                how_it_works: vec![
                    "Celestial Nighthawk with Knock 'Em Down.".to_string(),
                    "Celestial Nighthawk again.".to_string(),
                ],
                ..build("nighthawk", GuardianClass::Hunter, Subclass::Solar)
            },
        )
        .await;

        assert!(detail.manifest_available);
        assert_eq!(detail.exotics[0].image_url, "https://www.bungie.net/icons/1.png");
        assert_eq!(detail.exotics[0].description, "One big shot.");
        assert_eq!(detail.key_mods[0].image_url, PLACEHOLDER_IMAGE);
        assert_eq!(detail.key_mods[0].image_source, ImageSource::Placeholder);
        assert_eq!(detail.image_url, PLACEHOLDER_IMAGE);
        assert_eq!(
            texts(&detail.how_it_works[0]),
            vec![
                "ref:Celestial Nighthawk",
                "text: with ",
                "ref:Knock 'Em Down",
                "text:.",
            ]
        );
        assert_eq!(texts(&detail.how_it_works[1])[0], "text:Celestial Nighthawk");
    }

    #[tokio::test(start_paused = true)]
    async fn detail_degrades_when_manifest_is_unavailable() {
        let source = FakeSource::default();
        source
            .drop_class_item
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let cache = cache_with(source);

        let detail = render_detail(&cache, build("nighthawk", GuardianClass::Hunter, Subclass::Solar)).await;
        assert!(!detail.manifest_available);
        assert_eq!(detail.exotics[0].image_url, PLACEHOLDER_IMAGE);
        assert_eq!(
            texts(&detail.how_it_works[0]),
            vec!["text:Celestial Nighthawk does it."]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn listing_resolves_exotic_images() {
        let cache = cache_with(FakeSource::with_items(vec![exotic_armor(
            1,
            "Celestial Nighthawk",
            "",
        )]));
        let groups = render_listing(
            &cache,
            vec![build("nighthawk", GuardianClass::Hunter, Subclass::Solar)],
        )
        .await;
        let summary = &groups[0].builds[0];
        assert_eq!(summary.exotics[0].image_source, ImageSource::Icon);
        assert_eq!(summary.image_url, PLACEHOLDER_IMAGE);
    }
}
