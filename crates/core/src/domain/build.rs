use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::guardian::{GuardianClass, Subclass};
use crate::error::CoreError;
use crate::types::slug::Slug;

const MIN_NAME_LEN: usize = 2;
const MIN_DESCRIPTION_LEN: usize = 10;
const MIN_HOW_IT_WORKS_LEN: usize = 10;
const MAX_METRIC: f32 = 10.0;
const DEFAULT_METRIC: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    PvE,
    PvP,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::PvE => "PvE",
            Mode::PvP => "PvP",
        }
    }
}

impl FromStr for Mode {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("pve") {
            Ok(Mode::PvE)
        } else if trimmed.eq_ignore_ascii_case("pvp") {
            Ok(Mode::PvP)
        } else {
            Err(CoreError::UnknownVariant {
                kind: "mode",
                value: trimmed.to_string(),
            })
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildMetrics {
    pub versatility: Option<f32>,
    pub ease_of_use: Option<f32>,
    pub survivability: Option<f32>,
    pub dps: Option<f32>,
    pub crowd_control: Option<f32>,
    pub buff_healing_support: Option<f32>,
    pub content_best_for: Vec<String>,
    pub teamplay_orientation: Option<f32>,
}

impl BuildMetrics {
    fn ratings_mut(&mut self) -> [(&'static str, &mut Option<f32>); 7] {
        [
            ("metrics.versatility", &mut self.versatility),
            ("metrics.easeOfUse", &mut self.ease_of_use),
            ("metrics.survivability", &mut self.survivability),
            ("metrics.dps", &mut self.dps),
            ("metrics.crowdControl", &mut self.crowd_control),
            ("metrics.buffHealingSupport", &mut self.buff_healing_support),
            ("metrics.teamplayOrientation", &mut self.teamplay_orientation),
        ]
    }

    /// Fills unset ratings with the form default and rejects values outside 0..=10.
    fn normalize(mut self) -> Result<Self, CoreError> {
        for (field, rating) in self.ratings_mut() {
            let value = rating.get_or_insert(DEFAULT_METRIC);
            if !value.is_finite() || *value < 0.0 || *value > MAX_METRIC {
                return Err(CoreError::invalid(field, "must be between 0 and 10"));
            }
        }
        self.content_best_for = self
            .content_best_for
            .into_iter()
            .map(|entry| entry.trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect();
        Ok(self)
    }
}

/// A stored field that is either the decoded JSON value or that value
/// serialized to a JSON string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Encoded<T> {
    Value(T),
    Text(String),
}

impl<T: DeserializeOwned> Encoded<T> {
    pub fn decode(self, field: &'static str) -> Result<T, CoreError> {
        match self {
            Encoded::Value(value) => Ok(value),
            Encoded::Text(raw) => {
                serde_json::from_str(&raw).map_err(|err| CoreError::MalformedField {
                    field,
                    message: err.to_string(),
                })
            }
        }
    }
}

/// Build as persisted, before list and object fields are normalized.
#[derive(Debug, Clone)]
pub struct BuildRecord {
    pub id: String,
    pub name: String,
    pub class: String,
    pub subclass: String,
    pub description: String,
    pub image_url: Option<String>,
    pub mode: String,
    pub tags: Encoded<Vec<String>>,
    pub exotics: Encoded<Vec<String>>,
    pub key_mods: Encoded<Vec<String>>,
    pub target_stats: Encoded<Vec<String>>,
    pub aspects: Encoded<Vec<String>>,
    pub fragments: Encoded<Vec<String>>,
    pub how_it_works: Encoded<Vec<String>>,
    pub how_it_works2: Option<Encoded<Vec<String>>>,
    pub metrics: Option<Encoded<BuildMetrics>>,
    pub parent_build_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Build {
    pub id: String,
    pub name: String,
    pub class: GuardianClass,
    pub subclass: Subclass,
    pub description: String,
    pub image_url: Option<String>,
    pub mode: Mode,
    pub tags: Vec<String>,
    pub exotics: Vec<String>,
    pub key_mods: Vec<String>,
    pub target_stats: Vec<String>,
    pub aspects: Vec<String>,
    pub fragments: Vec<String>,
    pub how_it_works: Vec<String>,
    pub how_it_works2: Option<Vec<String>>,
    pub metrics: Option<BuildMetrics>,
    pub parent_build_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Build {
    pub fn is_variation(&self) -> bool {
        self.parent_build_id.is_some()
    }
}

impl TryFrom<BuildRecord> for Build {
    type Error = CoreError;

    fn try_from(record: BuildRecord) -> Result<Self, Self::Error> {
        Ok(Build {
            class: record.class.parse()?,
            subclass: record.subclass.parse()?,
            mode: record.mode.parse()?,
            tags: record.tags.decode("tags")?,
            exotics: record.exotics.decode("exotics")?,
            key_mods: record.key_mods.decode("key_mods")?,
            target_stats: record.target_stats.decode("target_stats")?,
            aspects: record.aspects.decode("aspects")?,
            fragments: record.fragments.decode("fragments")?,
            how_it_works: record.how_it_works.decode("how_it_works")?,
            how_it_works2: record
                .how_it_works2
                .map(|field| field.decode("how_it_works2"))
                .transpose()?,
            metrics: record
                .metrics
                .map(|field| field.decode("metrics"))
                .transpose()?,
            image_url: record.image_url.filter(|url| !url.trim().is_empty()),
            parent_build_id: record.parent_build_id.filter(|id| !id.trim().is_empty()),
            id: record.id,
            name: record.name,
            description: record.description,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildSort {
    #[default]
    CreatedAsc,
    CreatedDesc,
    Name,
}

#[derive(Debug, Clone, Default)]
pub struct BuildQuery {
    pub class: Option<GuardianClass>,
    pub subclass: Option<Subclass>,
    pub mode: Option<Mode>,
    pub sort: BuildSort,
}

/// Raw admin input. List fields are comma separated, narrative fields one
/// paragraph per line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BuildForm {
    pub name: String,
    pub slug: String,
    pub class: String,
    pub subclass: String,
    pub description: String,
    pub image_url: String,
    pub mode: String,
    pub tags: String,
    pub exotics: String,
    pub key_mods: String,
    pub target_stats: String,
    pub aspects: String,
    pub fragments: String,
    pub how_it_works: String,
    pub how_it_works2: String,
    pub metrics: BuildMetrics,
    pub parent_build_id: String,
}

/// Validated build ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBuild {
    pub id: Slug,
    pub name: String,
    pub class: GuardianClass,
    pub subclass: Subclass,
    pub description: String,
    pub image_url: Option<String>,
    pub mode: Mode,
    pub tags: Vec<String>,
    pub exotics: Vec<String>,
    pub key_mods: Vec<String>,
    pub target_stats: Vec<String>,
    pub aspects: Vec<String>,
    pub fragments: Vec<String>,
    pub how_it_works: Vec<String>,
    pub how_it_works2: Option<Vec<String>>,
    pub metrics: BuildMetrics,
    pub parent_build_id: Option<String>,
}

impl BuildForm {
    pub fn validate(self) -> Result<NewBuild, CoreError> {
        let name = self.name.trim().to_string();
        if name.chars().count() < MIN_NAME_LEN {
            return Err(CoreError::invalid("name", "must be at least 2 characters"));
        }
        let id = if self.slug.trim().is_empty() {
            Slug::from_name(&name)?
        } else {
            Slug::try_from(self.slug.as_str())?
        };
        let class = self.class.parse()?;
        let subclass = self.subclass.parse()?;
        let mode = if self.mode.trim().is_empty() {
            Mode::PvE
        } else {
            self.mode.parse()?
        };
        let description = self.description.trim().to_string();
        if description.chars().count() < MIN_DESCRIPTION_LEN {
            return Err(CoreError::invalid(
                "description",
                "must be at least 10 characters",
            ));
        }
        let image_url = optional_text(&self.image_url);
        if let Some(url) = image_url.as_deref() {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(CoreError::invalid("image_url", "must be a valid URL"));
            }
        }
        let exotics = require_list("exotics", split_list(&self.exotics))?;
        let aspects = require_list("aspects", split_list(&self.aspects))?;
        let fragments = require_list("fragments", split_list(&self.fragments))?;
        if self.how_it_works.trim().chars().count() < MIN_HOW_IT_WORKS_LEN {
            return Err(CoreError::invalid(
                "how_it_works",
                "must be at least 10 characters",
            ));
        }
        let how_it_works = split_paragraphs(&self.how_it_works);
        let how_it_works2 = Some(split_paragraphs(&self.how_it_works2)).filter(|p| !p.is_empty());

        Ok(NewBuild {
            id,
            name,
            class,
            subclass,
            description,
            image_url,
            mode,
            tags: split_list(&self.tags),
            exotics,
            key_mods: split_list(&self.key_mods),
            target_stats: split_list(&self.target_stats),
            aspects,
            fragments,
            how_it_works,
            how_it_works2,
            metrics: self.metrics.normalize()?,
            parent_build_id: optional_text(&self.parent_build_id),
        })
    }
}

pub fn split_list(input: &str) -> Vec<String> {
    split_trimmed(input.split(','))
}

pub fn split_paragraphs(input: &str) -> Vec<String> {
    split_trimmed(input.lines())
}

fn split_trimmed<'a>(parts: impl Iterator<Item = &'a str>) -> Vec<String> {
    parts
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn require_list(field: &'static str, values: Vec<String>) -> Result<Vec<String>, CoreError> {
    if values.is_empty() {
        return Err(CoreError::invalid(field, "at least one entry is required"));
    }
    Ok(values)
}

fn optional_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
