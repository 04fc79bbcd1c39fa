use chrono::{DateTime, Utc};
use d2builds_core::domain::build::{BuildQuery, BuildRecord, BuildSort, Encoded, NewBuild};
use d2builds_core::error::CoreError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, QueryBuilder};
use thiserror::Error;

const COLUMNS: &str = r#"
    id, name, class, subclass, description, image_url, mode,
    tags, exotics, key_mods, target_stats, aspects, fragments,
    how_it_works, how_it_works2, metrics, parent_build_id,
    created_at, updated_at
"#;

#[derive(Debug, Error)]
pub enum BuildsRepoError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("stored build {id} is malformed: {source}")]
    Decode {
        id: String,
        #[source]
        source: CoreError,
    },
    #[error("build {0} already exists")]
    Duplicate(String),
}

/// JSONB columns hold either the value itself or the value encoded as a
/// JSON string; both shapes survive until the record is normalized.
#[derive(Debug, Clone, sqlx::FromRow)]
struct BuildRow {
    id: String,
    name: String,
    class: String,
    subclass: String,
    description: String,
    image_url: Option<String>,
    mode: String,
    tags: Value,
    exotics: Value,
    key_mods: Value,
    target_stats: Value,
    aspects: Value,
    fragments: Value,
    how_it_works: Value,
    how_it_works2: Option<Value>,
    metrics: Option<Value>,
    parent_build_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn encoded<T: DeserializeOwned>(field: &'static str, value: Value) -> Result<Encoded<T>, CoreError> {
    serde_json::from_value(value).map_err(|err| CoreError::MalformedField {
        field,
        message: err.to_string(),
    })
}

fn optional_encoded<T: DeserializeOwned>(
    field: &'static str,
    value: Option<Value>,
) -> Result<Option<Encoded<T>>, CoreError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => encoded(field, value).map(Some),
    }
}

impl TryFrom<BuildRow> for BuildRecord {
    type Error = BuildsRepoError;

    fn try_from(row: BuildRow) -> Result<Self, Self::Error> {
        let id = row.id.clone();
        let decode = |source| BuildsRepoError::Decode {
            id: id.clone(),
            source,
        };
        Ok(BuildRecord {
            tags: encoded("tags", row.tags).map_err(decode)?,
            exotics: encoded("exotics", row.exotics).map_err(decode)?,
            key_mods: encoded("key_mods", row.key_mods).map_err(decode)?,
            target_stats: encoded("target_stats", row.target_stats).map_err(decode)?,
            aspects: encoded("aspects", row.aspects).map_err(decode)?,
            fragments: encoded("fragments", row.fragments).map_err(decode)?,
            how_it_works: encoded("how_it_works", row.how_it_works).map_err(decode)?,
            how_it_works2: optional_encoded("how_it_works2", row.how_it_works2).map_err(decode)?,
            metrics: optional_encoded("metrics", row.metrics).map_err(decode)?,
            id: row.id,
            name: row.name,
            class: row.class,
            subclass: row.subclass,
            description: row.description,
            image_url: row.image_url,
            mode: row.mode,
            parent_build_id: row.parent_build_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn get_build(pool: &PgPool, id: &str) -> Result<Option<BuildRecord>, BuildsRepoError> {
    let mut builder = QueryBuilder::new("SELECT ");
    builder.push(COLUMNS).push(" FROM builds WHERE id = ").push_bind(id);
    let row: Option<BuildRow> = builder.build_query_as().fetch_optional(pool).await?;
    row.map(BuildRecord::try_from).transpose()
}

pub async fn list_builds(
    pool: &PgPool,
    query: &BuildQuery,
) -> Result<Vec<BuildRecord>, BuildsRepoError> {
    let mut builder = QueryBuilder::new("SELECT ");
    builder.push(COLUMNS).push(" FROM builds WHERE TRUE");
    if let Some(class) = query.class {
        builder.push(" AND class = ").push_bind(class.as_str());
    }
    if let Some(subclass) = query.subclass {
        builder.push(" AND subclass = ").push_bind(subclass.as_str());
    }
    if let Some(mode) = query.mode {
        builder.push(" AND mode = ").push_bind(mode.as_str());
    }
    builder.push(match query.sort {
        BuildSort::CreatedAsc => " ORDER BY created_at ASC, id ASC",
        BuildSort::CreatedDesc => " ORDER BY created_at DESC, id ASC",
        BuildSort::Name => " ORDER BY name ASC, id ASC",
    });

    let rows: Vec<BuildRow> = builder.build_query_as().fetch_all(pool).await?;
    rows.into_iter().map(BuildRecord::try_from).collect()
}

pub async fn create_build(pool: &PgPool, build: &NewBuild) -> Result<BuildRecord, BuildsRepoError> {
    let mut builder = QueryBuilder::new(
        r#"
        INSERT INTO builds
            (id, name, class, subclass, description, image_url, mode,
             tags, exotics, key_mods, target_stats, aspects, fragments,
             how_it_works, how_it_works2, metrics, parent_build_id)
        VALUES (
        "#,
    );
    let mut values = builder.separated(", ");
    values
        .push_bind(build.id.as_str())
        .push_bind(&build.name)
        .push_bind(build.class.as_str())
        .push_bind(build.subclass.as_str())
        .push_bind(&build.description)
        .push_bind(&build.image_url)
        .push_bind(build.mode.as_str())
        .push_bind(Json(&build.tags))
        .push_bind(Json(&build.exotics))
        .push_bind(Json(&build.key_mods))
        .push_bind(Json(&build.target_stats))
        .push_bind(Json(&build.aspects))
        .push_bind(Json(&build.fragments))
        .push_bind(Json(&build.how_it_works))
        .push_bind(build.how_it_works2.as_ref().map(Json))
        .push_bind(Json(&build.metrics))
        .push_bind(&build.parent_build_id);
    builder.push(") RETURNING ").push(COLUMNS);

    let row: BuildRow = match builder.build_query_as().fetch_one(pool).await {
        Ok(row) => row,
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            return Err(BuildsRepoError::Duplicate(build.id.as_str().to_string()));
        }
        Err(err) => return Err(err.into()),
    };
    BuildRecord::try_from(row)
}
