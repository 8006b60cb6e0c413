//! # Routing Synthesis
//!
//! Builds the isolated, per-zone routing table the external schema tool
//! extracts from. Isolation is the entire point: the table synthesized
//! for a zone contains only that zone's apps' URL patterns, so schema
//! extraction can never leak endpoints across zones.
//!
//! The table is an explicit [`RoutingNamespace`] value; nothing here
//! mutates a process-global module registry. Each namespace gets a unique
//! id derived from the zone name (`zonegen_urls_<zone>`; zone names are
//! unique per registry, so ids are unique per run), and
//! [`RoutingNamespace::materialize`] writes the table to disk so a CLI
//! collaborator can target it by id.
//!
//! URL patterns come from a [`RouteSource`] collaborator. Library
//! embedders implement the trait against their framework's URL
//! introspection; the `zonegen` binary reads a [`RouteManifest`] file
//! instead.

use crate::error::{RouteSourceError, SynthesisError};
use crate::zone::{AppProbe, Zone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One URL pattern exposed by an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePattern {
    /// Path relative to the app mount, e.g. `users/<id>/`.
    pub path: String,
    /// Optional route name for reverse lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl RoutePattern {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: None,
        }
    }

    pub fn named(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: Some(name.into()),
        }
    }
}

/// Supplies URL patterns for app identifiers.
pub trait RouteSource: Send + Sync {
    fn url_patterns(&self, app: &str) -> Result<Vec<RoutePattern>, RouteSourceError>;
}

/// File-backed route source for the CLI: a YAML map of app to patterns.
///
/// Doubles as an [`AppProbe`]; the apps the manifest knows about are the
/// apps considered installed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteManifest {
    apps: BTreeMap<String, Vec<RoutePattern>>,
}

impl RouteManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a manifest from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read routing manifest: {}", path.display()))?;
        let manifest: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse routing manifest: {}", path.display()))?;
        Ok(manifest)
    }

    /// Register an app's patterns, replacing any previous entry.
    pub fn insert_app<I>(&mut self, app: impl Into<String>, patterns: I)
    where
        I: IntoIterator<Item = RoutePattern>,
    {
        self.apps
            .insert(app.into(), patterns.into_iter().collect());
    }

    pub fn app_names(&self) -> Vec<String> {
        self.apps.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

impl RouteSource for RouteManifest {
    fn url_patterns(&self, app: &str) -> Result<Vec<RoutePattern>, RouteSourceError> {
        self.apps
            .get(app)
            .cloned()
            .ok_or_else(|| RouteSourceError {
                app: app.to_string(),
                reason: "app not present in routing manifest".to_string(),
            })
    }
}

impl AppProbe for RouteManifest {
    fn is_installed(&self, app: &str) -> bool {
        self.apps.contains_key(app)
    }
}

/// An isolated routing table for one zone.
///
/// Carries the zone's mount metadata plus the union of its apps' URL
/// patterns, and nothing from any other zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingNamespace {
    /// Unique id the schema tool targets, `zonegen_urls_<zone>`.
    pub id: String,
    /// Owning zone name.
    pub zone: String,
    /// URL prefix the patterns are mounted under.
    pub path_prefix: String,
    /// API version of the zone.
    pub version: String,
    /// The zone's patterns, in app declaration order.
    pub patterns: Vec<RoutePattern>,
}

impl RoutingNamespace {
    /// Namespace id for a zone name. One synthesis per zone per run keeps
    /// these collision-free.
    pub fn id_for(zone_name: &str) -> String {
        format!("zonegen_urls_{zone_name}")
    }

    /// Whether any pattern matches the given relative path.
    pub fn contains_path(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.path == path)
    }

    /// Patterns prefixed with the zone mount, as the schema tool sees them.
    pub fn mounted_paths(&self) -> Vec<String> {
        self.patterns
            .iter()
            .map(|p| format!("{}/{}", self.path_prefix, p.path))
            .collect()
    }

    /// Write the table as YAML to `<dir>/<id>.yaml` and return the path.
    ///
    /// The file is the handle a CLI collaborator resolves the namespace id
    /// against; it lives in run-scoped scratch space.
    pub fn materialize(&self, dir: &Path) -> Result<PathBuf, SynthesisError> {
        let path = dir.join(format!("{}.yaml", self.id));
        let rendered = serde_yaml::to_string(self).map_err(|e| SynthesisError::Materialize {
            zone: self.zone.clone(),
            path: path.clone(),
            source: std::io::Error::other(e),
        })?;
        std::fs::create_dir_all(dir).map_err(|e| SynthesisError::Materialize {
            zone: self.zone.clone(),
            path: path.clone(),
            source: e,
        })?;
        std::fs::write(&path, rendered).map_err(|e| SynthesisError::Materialize {
            zone: self.zone.clone(),
            path: path.clone(),
            source: e,
        })?;
        debug!(zone = %self.zone, path = %path.display(), "materialized routing table");
        Ok(path)
    }
}

/// Builds per-zone routing namespaces from a [`RouteSource`].
pub struct RouteSynthesizer<'a> {
    source: &'a dyn RouteSource,
}

impl<'a> RouteSynthesizer<'a> {
    pub fn new(source: &'a dyn RouteSource) -> Self {
        Self { source }
    }

    /// Collect the union of the zone's apps' patterns into a namespace.
    ///
    /// Fails with a zone-attributed [`SynthesisError`] if any app's
    /// patterns cannot be retrieved; never touches other zones.
    pub fn synthesize(&self, zone: &Zone) -> Result<RoutingNamespace, SynthesisError> {
        let mut patterns = Vec::new();
        for app in &zone.apps {
            let mut app_patterns =
                self.source
                    .url_patterns(app)
                    .map_err(|e| SynthesisError::PatternsUnavailable {
                        zone: zone.name.clone(),
                        source: e,
                    })?;
            patterns.append(&mut app_patterns);
        }

        debug!(
            zone = %zone.name,
            patterns = patterns.len(),
            "synthesized routing namespace"
        );

        Ok(RoutingNamespace {
            id: RoutingNamespace::id_for(&zone.name),
            zone: zone.name.clone(),
            path_prefix: zone.path_prefix.clone(),
            version: zone.version.clone(),
            patterns,
        })
    }
}
