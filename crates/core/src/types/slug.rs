use std::fmt;

use serde::Serialize;

use crate::error::CoreError;

const MIN_SLUG_LEN: usize = 2;

/// Build identifier: lowercase ascii letters, digits and hyphens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives a slug from a display name: lowercased, whitespace runs become
    /// a single hyphen, everything outside `[a-z0-9-]` is dropped.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        let mut slug = String::with_capacity(name.len());
        let mut pending_hyphen = false;
        for ch in name.trim().chars().flat_map(char::to_lowercase) {
            if ch.is_whitespace() {
                pending_hyphen = true;
                continue;
            }
            if pending_hyphen {
                slug.push('-');
                pending_hyphen = false;
            }
            if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
                slug.push(ch);
            }
        }
        Slug::try_from(slug.as_str())
    }
}

impl TryFrom<&str> for Slug {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.len() < MIN_SLUG_LEN {
            return Err(CoreError::InvalidSlug(format!(
                "slug must be at least {MIN_SLUG_LEN} characters"
            )));
        }
        if !trimmed
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
        {
            return Err(CoreError::InvalidSlug(trimmed.to_string()));
        }
        Ok(Slug(trimmed.to_string()))
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
