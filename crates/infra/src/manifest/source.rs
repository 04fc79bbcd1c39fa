use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::manifest::class_items::required_hashes;
use crate::manifest::definitions::{
    Envelope, InventoryItemDefinition, ManifestIndex, ManifestTables, SandboxPerkDefinition,
    SupplementalDataset, INVENTORY_ITEM_TABLE, SANDBOX_PERK_TABLE,
};

const MANIFEST_PATH: &str = "/Platform/Destiny2/Manifest/";
const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream error {code} ({status}): {message}")]
    Upstream {
        code: i32,
        status: String,
        message: String,
    },
    #[error("missing data: {0}")]
    MissingData(&'static str),
    #[error("manifest has no {table} table for language {language}")]
    MissingTable {
        table: &'static str,
        language: String,
    },
    #[error("supplemental dataset is not an object")]
    NotAnObject,
    #[error("supplemental dataset is missing class items: {0:?}")]
    MissingClassItems(Vec<u32>),
}

/// Where manifest tables come from. Implemented over HTTP in production and
/// by in-memory fakes in tests.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn fetch_index(&self) -> Result<ManifestIndex, SourceError>;

    async fn fetch_item_definitions(
        &self,
        index: &ManifestIndex,
    ) -> Result<HashMap<u32, InventoryItemDefinition>, SourceError>;

    async fn fetch_sandbox_perks(
        &self,
        index: &ManifestIndex,
    ) -> Result<Vec<SandboxPerkDefinition>, SourceError>;

    async fn fetch_supplemental(&self) -> Result<Value, SourceError>;
}

/// Fetches everything one rebuild needs, in order: index, item table, perk
/// table, supplemental dataset. Any failure fails the whole fetch.
pub async fn fetch_manifest(source: &dyn ManifestSource) -> Result<ManifestTables, SourceError> {
    let index = source.fetch_index().await?;
    debug!(version = %index.version, "manifest index fetched");
    let items = source.fetch_item_definitions(&index).await?;
    let sandbox_perks = source.fetch_sandbox_perks(&index).await?;
    let supplemental =
        SupplementalDataset::from_value(source.fetch_supplemental().await?, &required_hashes())?;
    info!(
        version = %index.version,
        items = items.len(),
        sandbox_perks = sandbox_perks.len(),
        supplemental = supplemental.len(),
        "manifest tables fetched"
    );
    Ok(ManifestTables {
        version: index.version,
        items,
        sandbox_perks,
        supplemental,
    })
}

#[derive(Debug, Clone)]
pub struct HttpManifestSource {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    language: String,
    supplemental_url: String,
}

impl HttpManifestSource {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        api_key: String,
        language: String,
        supplemental_url: String,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            language,
            supplemental_url,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let response = self
            .http
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn fetch_table<T: DeserializeOwned>(
        &self,
        index: &ManifestIndex,
        table: &'static str,
    ) -> Result<HashMap<String, T>, SourceError> {
        let path = index.table_path(&self.language, table)?;
        let url = format!("{}{}", self.base_url, path);
        debug!(table, %url, "fetching manifest table");
        self.get_json(&url).await
    }
}

#[async_trait]
impl ManifestSource for HttpManifestSource {
    async fn fetch_index(&self) -> Result<ManifestIndex, SourceError> {
        let url = format!("{}{}", self.base_url, MANIFEST_PATH);
        let envelope: Envelope<ManifestIndex> = self.get_json(&url).await?;
        envelope.into_response()
    }

    async fn fetch_item_definitions(
        &self,
        index: &ManifestIndex,
    ) -> Result<HashMap<u32, InventoryItemDefinition>, SourceError> {
        let table: HashMap<String, InventoryItemDefinition> =
            self.fetch_table(index, INVENTORY_ITEM_TABLE).await?;
        Ok(table.into_values().map(|item| (item.hash, item)).collect())
    }

    async fn fetch_sandbox_perks(
        &self,
        index: &ManifestIndex,
    ) -> Result<Vec<SandboxPerkDefinition>, SourceError> {
        let table: HashMap<String, SandboxPerkDefinition> =
            self.fetch_table(index, SANDBOX_PERK_TABLE).await?;
        let mut perks: Vec<_> = table.into_values().collect();
        perks.sort_by_key(|perk| perk.hash);
        Ok(perks)
    }

    async fn fetch_supplemental(&self) -> Result<Value, SourceError> {
        let response = self
            .http
            .get(&self.supplemental_url)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}
