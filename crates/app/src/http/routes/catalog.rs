use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::http::routes::ErrorBody;
use crate::manifest_cache::ManifestError;
use crate::state::AppState;
use d2builds_core::domain::catalog::{
    resolve_image, ArmorSlot, CatalogItem, ClassItemData, ImageSource, ItemKind,
};
use d2builds_core::domain::guardian::{GuardianClass, Subclass};
use d2builds_core::error::CoreError;

#[derive(Debug, Serialize)]
pub struct CatalogEntry {
    pub hash: u32,
    pub name: String,
    pub kind: ItemKind,
    pub image_url: String,
    pub image_source: ImageSource,
    pub description: String,
    pub display_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub armor_slot: Option<ArmorSlot>,
}

impl CatalogEntry {
    fn new(image_base: &str, item: &CatalogItem) -> Self {
        let image = resolve_image(image_base, item.icon.as_deref());
        Self {
            hash: item.hash,
            name: item.name.clone(),
            kind: item.kind,
            image_url: image.value,
            image_source: image.source,
            description: item.description.clone(),
            display_type: item.display_type.clone(),
            armor_slot: item.armor_slot,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SubclassParams {
    pub subclass: Option<String>,
}

#[derive(Debug, Error)]
pub enum CatalogApiError {
    #[error("manifest unavailable: {0}")]
    Manifest(#[from] ManifestError),
    #[error("{0}")]
    InvalidSubclass(CoreError),
    #[error("no exotic class item for {0}")]
    ClassItemNotFound(String),
    #[error("unknown item kind: {0}")]
    UnknownKind(String),
    #[error("no {kind} named {name}")]
    ItemNotFound { kind: &'static str, name: String },
}

/// Path segment naming a catalog bucket, e.g. `exotic-armor`.
fn parse_kind(value: &str) -> Option<ItemKind> {
    match value.trim().to_ascii_lowercase().as_str() {
        "exotic-armor" => Some(ItemKind::ExoticArmor),
        "exotic-weapon" => Some(ItemKind::ExoticWeapon),
        "mod" => Some(ItemKind::Mod),
        "aspect" => Some(ItemKind::Aspect),
        "fragment" => Some(ItemKind::Fragment),
        _ => None,
    }
}

/// Exact-name lookup in one bucket of the current snapshot.
pub async fn get_item(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<Json<CatalogEntry>, CatalogApiError> {
    let kind = parse_kind(&kind).ok_or(CatalogApiError::UnknownKind(kind))?;
    match state.manifest.lookup(kind, &name).await? {
        Some(item) => Ok(Json(CatalogEntry::new(state.manifest.image_base(), &item))),
        None => {
            debug!(kind = kind.as_str(), name = %name, "catalog lookup missed");
            Err(CatalogApiError::ItemNotFound {
                kind: kind.as_str(),
                name,
            })
        }
    }
}

pub async fn list_exotics(
    State(state): State<AppState>,
) -> Result<Json<Vec<CatalogEntry>>, CatalogApiError> {
    let snapshot = state.manifest.best_effort().await?;
    let base = state.manifest.image_base();
    Ok(Json(
        snapshot
            .exotic_armor
            .iter()
            .map(|item| CatalogEntry::new(base, item))
            .collect(),
    ))
}

pub async fn list_aspects(
    State(state): State<AppState>,
    Query(params): Query<SubclassParams>,
) -> Result<Json<Vec<CatalogEntry>>, CatalogApiError> {
    list_by_subclass(&state, ItemKind::Aspect, params).await
}

pub async fn list_fragments(
    State(state): State<AppState>,
    Query(params): Query<SubclassParams>,
) -> Result<Json<Vec<CatalogEntry>>, CatalogApiError> {
    list_by_subclass(&state, ItemKind::Fragment, params).await
}

/// Without a subclass filter the whole bucket is returned.
async fn list_by_subclass(
    state: &AppState,
    kind: ItemKind,
    params: SubclassParams,
) -> Result<Json<Vec<CatalogEntry>>, CatalogApiError> {
    let subclass = params
        .subclass
        .filter(|value| !value.trim().is_empty())
        .map(|value| value.parse::<Subclass>())
        .transpose()
        .map_err(CatalogApiError::InvalidSubclass)?;
    let snapshot = state.manifest.best_effort().await?;
    let base = state.manifest.image_base();
    let items = match (subclass, kind) {
        (Some(subclass), ItemKind::Aspect) => snapshot.aspects_by_subclass(subclass),
        (Some(subclass), ItemKind::Fragment) => snapshot.fragments_by_subclass(subclass),
        _ => snapshot.bucket(kind).iter().collect(),
    };
    Ok(Json(
        items
            .into_iter()
            .map(|item| CatalogEntry::new(base, item))
            .collect(),
    ))
}

pub async fn list_class_items(
    State(state): State<AppState>,
) -> Result<Json<Vec<ClassItemData>>, CatalogApiError> {
    let snapshot = state.manifest.best_effort().await?;
    Ok(Json(snapshot.exotic_class_items.clone()))
}

pub async fn get_class_item(
    State(state): State<AppState>,
    Path(class): Path<String>,
) -> Result<Json<ClassItemData>, CatalogApiError> {
    let Ok(parsed) = class.parse::<GuardianClass>() else {
        debug!(class = %class, "unknown class requested");
        return Err(CatalogApiError::ClassItemNotFound(class));
    };
    let snapshot = state.manifest.best_effort().await?;
    snapshot
        .class_item(parsed)
        .cloned()
        .map(Json)
        .ok_or_else(|| CatalogApiError::ClassItemNotFound(parsed.to_string()))
}

impl IntoResponse for CatalogApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            CatalogApiError::Manifest(_) => StatusCode::SERVICE_UNAVAILABLE,
            CatalogApiError::InvalidSubclass(_) => StatusCode::BAD_REQUEST,
            CatalogApiError::ClassItemNotFound(_)
            | CatalogApiError::UnknownKind(_)
            | CatalogApiError::ItemNotFound { .. } => StatusCode::NOT_FOUND,
        };
        if status.is_server_error() {
            warn!(error = %self, "catalog request failed");
        }
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
