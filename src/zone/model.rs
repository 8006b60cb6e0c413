//! Zone value types.
//!
//! A [`ZoneConfig`] is the raw, serde-facing shape as written in
//! `zonegen.toml`; a [`Zone`] is the validated, fully-defaulted value the
//! rest of the pipeline works with. Zones are immutable once built.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Raw zone definition as it appears in configuration.
///
/// Every field except `apps` is optional; defaults are applied during
/// validation so a [`Zone`] always carries concrete values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// App identifiers owned by this zone. Must be non-empty.
    pub apps: Vec<String>,
    /// Display title; derived from the zone name when absent.
    pub title: Option<String>,
    /// Display description; derived from the title when absent.
    pub description: Option<String>,
    /// Whether the zone is publicly visible. Defaults to `true`.
    pub public: Option<bool>,
    /// Whether requests require authentication. Defaults to `false`.
    pub auth_required: Option<bool>,
    /// API version string. Defaults to `"v1"`.
    pub version: Option<String>,
    /// URL path prefix. Defaults to the zone name.
    pub path_prefix: Option<String>,
    /// Opaque permission identifiers passed through to the routing layer.
    pub permissions: Option<Vec<String>>,
    /// Opaque middleware identifiers passed through to the routing layer.
    pub middleware: Option<Vec<String>>,
}

impl ZoneConfig {
    /// Convenience constructor for embedders and tests.
    pub fn with_apps<I, S>(apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            apps: apps.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// A validated API partition.
///
/// Names are normalized (trimmed, lowercased) and all optional metadata is
/// resolved to concrete values. Invariants across zones (disjoint apps,
/// unique path prefixes) are enforced by
/// [`crate::zone::ZoneRegistry::build`], not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub apps: Vec<String>,
    pub title: String,
    pub description: String,
    pub public: bool,
    pub auth_required: bool,
    pub version: String,
    pub path_prefix: String,
    pub permissions: Vec<String>,
    pub middleware: Vec<String>,
}

impl Zone {
    /// Validate a raw config into a zone.
    ///
    /// Fails with [`ConfigError::InvalidZone`] when the name is
    /// empty/whitespace or the apps list is empty.
    pub fn from_config(name: &str, config: &ZoneConfig) -> Result<Self, ConfigError> {
        let normalized = name.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ConfigError::InvalidZone {
                zone: name.to_string(),
                reason: "zone name is empty or whitespace".to_string(),
            });
        }
        if config.apps.is_empty() {
            return Err(ConfigError::InvalidZone {
                zone: normalized,
                reason: "apps list is empty".to_string(),
            });
        }
        if config.apps.iter().any(|a| a.trim().is_empty()) {
            return Err(ConfigError::InvalidZone {
                zone: normalized,
                reason: "apps list contains an empty identifier".to_string(),
            });
        }

        let title = config
            .title
            .clone()
            .unwrap_or_else(|| title_from_name(&normalized));
        let description = config
            .description
            .clone()
            .unwrap_or_else(|| format!("API endpoints for {title}"));
        let path_prefix = config
            .path_prefix
            .clone()
            .unwrap_or_else(|| normalized.clone());

        Ok(Self {
            name: normalized,
            apps: config.apps.clone(),
            title,
            description,
            public: config.public.unwrap_or(true),
            auth_required: config.auth_required.unwrap_or(false),
            version: config.version.clone().unwrap_or_else(|| "v1".to_string()),
            path_prefix,
            permissions: config.permissions.clone().unwrap_or_default(),
            middleware: config.middleware.clone().unwrap_or_default(),
        })
    }

    /// Whether this zone declares the given app.
    pub fn owns_app(&self, app: &str) -> bool {
        self.apps.iter().any(|a| a == app)
    }
}

/// Derive a display title from a zone name: underscores become spaces and
/// each word is title-cased (`client_portal` becomes `Client Portal`).
pub(crate) fn title_from_name(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
