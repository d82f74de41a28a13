//! Manifest decoding.
//!
//! A manifest is a JSON object mapping site keys to site configurations.
//! Sites are applied in key order.
//!
//! ```json
//! {
//!   "docs": {
//!     "name": "Project Docs",
//!     "url": "https://docs.example.org",
//!     "src": "docs",
//!     "dst": "public/docs",
//!     "cleanup": true,
//!     "generate-index": true,
//!     "generate-index-mode": "reverse",
//!     "copies": {
//!       "assets/logo.svg": "public/docs/",
//!       "LICENSE": { "target": "public/docs/LICENSE.txt", "force": true },
//!       "fonts": ["public/docs/fonts", { "target": "public/blog/fonts" }]
//!     },
//!     "replaces": {
//!       "version": "1.4.0",
//!       "year": { "text": "2024", "count": 1 }
//!     }
//!   }
//! }
//! ```
//!
//! ## Polymorphic values
//!
//! A `copies` value is a target string, a `{"target", "force"}` object, or an
//! array of either; all three decode to a list of [`CopyTarget`]. A `replaces`
//! value is the replacement text or a `{"text", "count"}` object. Any other
//! shape, an unknown key, or a negative count is a decode error: nothing is
//! applied from a manifest that does not decode.

use crate::index::IndexMode;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_MANIFEST: &str = "manifest.json";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid manifest {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Site key → site configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub sites: BTreeMap<String, SiteConfig>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ManifestError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Site title, used when a page has none of its own.
    #[serde(rename = "name")]
    pub title: String,
    /// Base URL. Empty disables the sitemap.
    pub url: String,
    #[serde(rename = "src")]
    pub source: PathBuf,
    #[serde(rename = "dst")]
    pub dest: PathBuf,
    /// Remove every copy target before copying.
    pub cleanup: bool,
    pub generate_index: bool,
    pub generate_index_mode: IndexMode,
    #[serde(deserialize_with = "decode_copies")]
    pub copies: BTreeMap<PathBuf, Vec<CopyTarget>>,
    #[serde(deserialize_with = "decode_replaces")]
    pub replaces: BTreeMap<String, ReplaceTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyTarget {
    pub target: PathBuf,
    /// Remove an existing target before copying.
    #[serde(default)]
    pub force: bool,
}

impl CopyTarget {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            force: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplaceTarget {
    #[serde(default)]
    pub text: String,
    /// `0` replaces every occurrence.
    #[serde(default)]
    pub count: usize,
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn copy_target(value: Value) -> Result<CopyTarget, String> {
    match value {
        Value::String(target) => Ok(CopyTarget::new(target)),
        object @ Value::Object(_) => serde_json::from_value(object).map_err(|e| e.to_string()),
        other => Err(format!(
            "expected a target string or {{\"target\", \"force\"}} object, found {}",
            kind(&other)
        )),
    }
}

fn copy_targets(value: Value) -> Result<Vec<CopyTarget>, String> {
    match value {
        Value::Array(items) => items.into_iter().map(copy_target).collect(),
        single => copy_target(single).map(|target| vec![target]),
    }
}

fn replace_target(value: Value) -> Result<ReplaceTarget, String> {
    match value {
        Value::String(text) => Ok(ReplaceTarget { text, count: 0 }),
        object @ Value::Object(_) => serde_json::from_value(object).map_err(|e| e.to_string()),
        other => Err(format!(
            "expected replacement text or {{\"text\", \"count\"}} object, found {}",
            kind(&other)
        )),
    }
}

fn decode_copies<'de, D>(deserializer: D) -> Result<BTreeMap<PathBuf, Vec<CopyTarget>>, D::Error>
where
    D: Deserializer<'de>,
{
    BTreeMap::<PathBuf, Value>::deserialize(deserializer)?
        .into_iter()
        .map(|(src, value)| {
            copy_targets(value)
                .map(|targets| (src.clone(), targets))
                .map_err(|msg| de::Error::custom(format!("copies[{:?}]: {msg}", src)))
        })
        .collect()
}

fn decode_replaces<'de, D>(deserializer: D) -> Result<BTreeMap<String, ReplaceTarget>, D::Error>
where
    D: Deserializer<'de>,
{
    BTreeMap::<String, Value>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, value)| {
            replace_target(value)
                .map_err(|msg| de::Error::custom(format!("replaces[{key:?}]: {msg}")))
                .map(|target| (key, target))
        })
        .collect()
}
