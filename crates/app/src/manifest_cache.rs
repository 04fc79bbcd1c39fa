use std::sync::Arc;
use std::time::Duration;

use d2builds_core::domain::catalog::{BucketCounts, CatalogItem, ItemKind, ManifestSnapshot};
use d2builds_infra::manifest::{classify, fetch_manifest, ManifestSource, SourceError};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RebuildError {
    #[error("{0}")]
    Source(#[from] SourceError),
    #[error("rebuild task failed: {0}")]
    Task(#[from] JoinError),
}

/// Every rebuild failure collapses into this one category. Cloneable so all
/// callers awaiting the same rebuild receive the same error.
#[derive(Debug, Clone, Error)]
pub enum ManifestError {
    #[error("manifest unavailable: {0}")]
    Unavailable(Arc<RebuildError>),
}

impl From<RebuildError> for ManifestError {
    fn from(err: RebuildError) -> Self {
        ManifestError::Unavailable(Arc::new(err))
    }
}

impl From<JoinError> for ManifestError {
    fn from(err: JoinError) -> Self {
        RebuildError::Task(err).into()
    }
}

type RebuildResult = Result<Arc<ManifestSnapshot>, ManifestError>;
type PendingRebuild = Shared<BoxFuture<'static, RebuildResult>>;

struct CacheEntry {
    snapshot: Arc<ManifestSnapshot>,
    built_at: Instant,
    stale: bool,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        !self.stale && self.built_at.elapsed() < ttl
    }
}

#[derive(Default)]
struct CacheState {
    entry: Option<CacheEntry>,
    pending: Option<PendingRebuild>,
}

struct Inner {
    source: Arc<dyn ManifestSource>,
    image_base: String,
    ttl: Duration,
    state: Mutex<CacheState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub cached: bool,
    pub fresh: bool,
    pub rebuilding: bool,
    pub age_secs: Option<u64>,
    pub ttl_secs: u64,
    pub counts: Option<BucketCounts>,
}

/// Classified manifest shared by every request handler and job.
///
/// A snapshot stays valid for `ttl` after the rebuild that produced it
/// finished. At most one rebuild runs at a time: callers arriving while one is
/// in flight await the same shared result. The rebuild runs on its own task,
/// so a caller that gives up does not cancel it for the others.
#[derive(Clone)]
pub struct ManifestCache {
    inner: Arc<Inner>,
}

impl ManifestCache {
    pub fn new(source: Arc<dyn ManifestSource>, image_base: String, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                image_base,
                ttl,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    pub fn image_base(&self) -> &str {
        &self.inner.image_base
    }

    /// Current snapshot, rebuilding first when there is none or it expired.
    pub async fn get_manifest(&self) -> RebuildResult {
        let pending = {
            let mut state = self.inner.state.lock().await;
            if let Some(entry) = state.entry.as_ref().filter(|e| e.is_fresh(self.inner.ttl)) {
                return Ok(Arc::clone(&entry.snapshot));
            }
            self.join_or_start(&mut state)
        };
        pending.await
    }

    /// Invalidates the current snapshot and rebuilds. Joins a rebuild that
    /// is already running instead of starting a second one.
    pub async fn refresh(&self) -> RebuildResult {
        let pending = {
            let mut state = self.inner.state.lock().await;
            if let Some(entry) = state.entry.as_mut() {
                entry.stale = true;
            }
            self.join_or_start(&mut state)
        };
        pending.await
    }

    pub async fn lookup(
        &self,
        kind: ItemKind,
        name: &str,
    ) -> Result<Option<CatalogItem>, ManifestError> {
        let snapshot = self.get_manifest().await?;
        Ok(snapshot.find(kind, name).cloned())
    }

    /// Current snapshot, or the last one built when a rebuild fails.
    pub async fn best_effort(&self) -> RebuildResult {
        let err = match self.get_manifest().await {
            Ok(snapshot) => return Ok(snapshot),
            Err(err) => err,
        };
        match self.last_snapshot().await {
            Some(snapshot) => {
                warn!(error = %err, "serving previous manifest snapshot");
                Ok(snapshot)
            }
            None => Err(err),
        }
    }

    /// Exotic armor or weapon by name, from [`Self::best_effort`].
    pub async fn exotic(&self, name: &str) -> Result<Option<CatalogItem>, ManifestError> {
        Ok(self.best_effort().await?.exotic(name).cloned())
    }

    pub async fn mod_item(&self, name: &str) -> Result<Option<CatalogItem>, ManifestError> {
        Ok(self.best_effort().await?.find(ItemKind::Mod, name).cloned())
    }

    /// Last successfully built snapshot, even if expired or invalidated.
    pub async fn last_snapshot(&self) -> Option<Arc<ManifestSnapshot>> {
        let state = self.inner.state.lock().await;
        state.entry.as_ref().map(|entry| Arc::clone(&entry.snapshot))
    }

    pub async fn status(&self) -> CacheStatus {
        let state = self.inner.state.lock().await;
        let entry = state.entry.as_ref();
        CacheStatus {
            cached: entry.is_some(),
            fresh: entry.is_some_and(|entry| entry.is_fresh(self.inner.ttl)),
            rebuilding: state.pending.is_some(),
            age_secs: entry.map(|entry| entry.built_at.elapsed().as_secs()),
            ttl_secs: self.inner.ttl.as_secs(),
            counts: entry.map(|entry| entry.snapshot.counts()),
        }
    }

    fn join_or_start(&self, state: &mut CacheState) -> PendingRebuild {
        if let Some(pending) = &state.pending {
            return pending.clone();
        }

        let task = tokio::spawn({
            let inner = Arc::clone(&self.inner);
            async move { inner.rebuild().await }
        });
        let inner = Arc::clone(&self.inner);
        let pending = async move {
            match task.await {
                Ok(result) => result,
                Err(err) => {
                    // The task never reached its own cleanup.
                    inner.state.lock().await.pending = None;
                    Err(ManifestError::from(err))
                }
            }
        }
        .boxed()
        .shared();
        state.pending = Some(pending.clone());
        pending
    }
}

impl Inner {
    async fn rebuild(&self) -> RebuildResult {
        let started = Instant::now();
        let outcome = self.fetch_and_classify().await;

        let mut state = self.state.lock().await;
        state.pending = None;
        match outcome {
            Ok(snapshot) => {
                state.entry = Some(CacheEntry {
                    snapshot: Arc::clone(&snapshot),
                    built_at: Instant::now(),
                    stale: false,
                });
                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    exotic_armor = snapshot.exotic_armor.len(),
                    exotic_weapons = snapshot.exotic_weapons.len(),
                    mods = snapshot.mods.len(),
                    "manifest snapshot published"
                );
                Ok(snapshot)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    kept_previous = state.entry.is_some(),
                    "manifest rebuild failed"
                );
                Err(ManifestError::from(err))
            }
        }
    }

    async fn fetch_and_classify(&self) -> Result<Arc<ManifestSnapshot>, RebuildError> {
        let tables = fetch_manifest(self.source.as_ref()).await?;
        let image_base = self.image_base.clone();
        let snapshot = tokio::task::spawn_blocking(move || classify(&tables, &image_base)).await?;
        Ok(Arc::new(snapshot))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use d2builds_infra::manifest::definitions::{
        DisplayProperties, InventoryBlock, InventoryItemDefinition, SandboxPerkDefinition,
    };
    use d2builds_infra::manifest::ManifestIndex;
    use serde_json::{json, Value};

    use super::*;

    const TTL: Duration = Duration::from_secs(24 * 60 * 60);

    /// In-memory manifest with a fetch delay and a switchable supplemental
    /// validation failure.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub index_fetches: AtomicUsize,
        pub supplemental_fetches: AtomicUsize,
        pub drop_class_item: AtomicBool,
        pub items: Vec<InventoryItemDefinition>,
    }

    impl FakeSource {
        pub(crate) fn with_items(items: Vec<InventoryItemDefinition>) -> Self {
            Self {
                items,
                ..Self::default()
            }
        }
    }

    pub(crate) fn exotic_armor(hash: u32, name: &str, description: &str) -> InventoryItemDefinition {
        InventoryItemDefinition {
            hash,
            display_properties: DisplayProperties {
                name: name.to_string(),
                description: description.to_string(),
                icon: Some(format!("/icons/{hash}.png")),
            },
            item_type: 2,
            item_type_display_name: Some("Helmet".to_string()),
            inventory: Some(InventoryBlock { tier_type: 6 }),
            screenshot: Some("/shot.jpg".to_string()),
            ..InventoryItemDefinition::default()
        }
    }

    #[async_trait]
    impl ManifestSource for FakeSource {
        async fn fetch_index(&self) -> Result<ManifestIndex, SourceError> {
            self.index_fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(ManifestIndex::default())
        }

        async fn fetch_item_definitions(
            &self,
            _index: &ManifestIndex,
        ) -> Result<HashMap<u32, InventoryItemDefinition>, SourceError> {
            Ok(self
                .items
                .iter()
                .map(|item| (item.hash, item.clone()))
                .collect())
        }

        async fn fetch_sandbox_perks(
            &self,
            _index: &ManifestIndex,
        ) -> Result<Vec<SandboxPerkDefinition>, SourceError> {
            Ok(Vec::new())
        }

        async fn fetch_supplemental(&self) -> Result<Value, SourceError> {
            self.supplemental_fetches.fetch_add(1, Ordering::SeqCst);
            if self.drop_class_item.load(Ordering::SeqCst) {
                return Ok(json!({ "266021826": {}, "2809120022": {} }));
            }
            Ok(json!({ "266021826": {}, "2273643087": {}, "2809120022": {} }))
        }
    }

    fn cache(source: &Arc<FakeSource>) -> ManifestCache {
        ManifestCache::new(
            Arc::clone(source) as Arc<dyn ManifestSource>,
            "https://www.bungie.net".to_string(),
            TTL,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_rebuild() {
        let source = Arc::new(FakeSource::default());
        let cache = cache(&source);

        let results = futures::future::join_all((0..8).map(|_| cache.get_manifest())).await;

        assert_eq!(source.index_fetches.load(Ordering::SeqCst), 1);
        let first = results[0].as_ref().unwrap();
        for result in &results {
            assert!(Arc::ptr_eq(first, result.as_ref().unwrap()));
        }
        assert!(!cache.status().await.rebuilding);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_is_reused_until_expiry() {
        let source = Arc::new(FakeSource::default());
        let cache = cache(&source);

        let first = cache.get_manifest().await.unwrap();
        tokio::time::advance(TTL - Duration::from_secs(60)).await;
        let second = cache.get_manifest().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.index_fetches.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(120)).await;
        let third = cache.get_manifest().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(source.index_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_reaches_every_waiter_and_allows_retry() {
        let source = Arc::new(FakeSource::default());
        source.drop_class_item.store(true, Ordering::SeqCst);
        let cache = cache(&source);

        let results = futures::future::join_all((0..4).map(|_| cache.get_manifest())).await;
        assert_eq!(source.supplemental_fetches.load(Ordering::SeqCst), 1);
        for result in &results {
            let ManifestError::Unavailable(err) = result.as_ref().unwrap_err();
            assert!(matches!(
                err.as_ref(),
                RebuildError::Source(SourceError::MissingClassItems(_))
            ));
        }
        let status = cache.status().await;
        assert!(!status.rebuilding);
        assert!(!status.cached);

        source.drop_class_item.store(false, Ordering::SeqCst);
        assert!(cache.get_manifest().await.is_ok());
        assert_eq!(source.index_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_rebuild_keeps_previous_snapshot() {
        let source = Arc::new(FakeSource::default());
        let cache = cache(&source);
        let first = cache.get_manifest().await.unwrap();

        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        source.drop_class_item.store(true, Ordering::SeqCst);
        assert!(cache.get_manifest().await.is_err());

        let kept = cache.last_snapshot().await.unwrap();
        assert!(Arc::ptr_eq(&first, &kept));
        let served = cache.best_effort().await.unwrap();
        assert!(Arc::ptr_eq(&first, &served));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_rebuilds_inside_validity_window() {
        let source = Arc::new(FakeSource::default());
        let cache = cache(&source);
        let first = cache.get_manifest().await.unwrap();

        let (refreshed, joined) = tokio::join!(cache.refresh(), cache.get_manifest());
        let refreshed = refreshed.unwrap();
        assert!(!Arc::ptr_eq(&first, &refreshed));
        assert!(Arc::ptr_eq(&refreshed, &joined.unwrap()));
        assert_eq!(source.index_fetches.load(Ordering::SeqCst), 2);

        let again = cache.get_manifest().await.unwrap();
        assert!(Arc::ptr_eq(&refreshed, &again));
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_finds_classified_items() {
        let source = Arc::new(FakeSource::with_items(vec![exotic_armor(
            1,
            "Celestial Nighthawk",
            "Golden Gun fires one shot.",
        )]));
        let cache = cache(&source);

        let found = cache
            .lookup(ItemKind::ExoticArmor, "Celestial Nighthawk")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.description, "Golden Gun fires one shot.");
        assert!(cache
            .lookup(ItemKind::ExoticWeapon, "Celestial Nighthawk")
            .await
            .unwrap()
            .is_none());
        assert_eq!(source.index_fetches.load(Ordering::SeqCst), 1);

        let status = cache.status().await;
        assert!(status.fresh);
        assert_eq!(status.counts.unwrap().exotic_armor, 1);
    }
}
