//! Document identifier newtype.
//!
//! Identifiers are generated by the store and echoed back by clients, so the
//! store treats every incoming identifier as untrusted. A [`DocumentId`] can
//! only hold characters from `[A-Za-z0-9_-]`, which makes it safe to join
//! onto a directory path: no separators, no dots, no `..`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Maximum accepted identifier length.
const MAX_ID_LEN: usize = 128;

/// Maximum length of the human-readable slug embedded in generated ids.
const MAX_SLUG_LEN: usize = 40;

/// Opaque, file-safe identifier of a stored document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Generate a fresh identifier for a document named `original_name`.
    ///
    /// Format: `{unix_millis}-{8 hex chars}-{slug}`.
    pub fn generate(original_name: &str) -> Self {
        let millis = crate::util::unix_millis();
        let random = Uuid::new_v4().simple().to_string();
        let suffix = &random[..8];
        Self(format!("{millis}-{suffix}-{}", slugify(original_name)))
    }

    /// Validate an untrusted identifier.
    ///
    /// Anything that is not a well-formed id fails with `NotFound`, so a
    /// traversal attempt looks exactly like an unknown document.
    pub fn parse(raw: &str) -> Result<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(Error::NotFound(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for DocumentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Reduce a user-supplied file name to `[a-z0-9_]`, without its extension.
fn slugify(original_name: &str) -> String {
    // Only the last path component counts; browsers sometimes send full paths.
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    let stem = base.rsplit_once('.').map_or(base, |(stem, _)| stem);

    let mut slug = String::with_capacity(stem.len().min(MAX_SLUG_LEN));
    let mut last_was_sep = false;
    for c in stem.chars() {
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep && !slug.is_empty() {
            slug.push('_');
            last_was_sep = true;
        }
    }

    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        "doc".to_string()
    } else {
        slug.to_string()
    }
}
