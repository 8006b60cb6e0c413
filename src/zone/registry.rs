//! Zone registry construction and cross-zone validation.

use crate::error::ConfigError;
use crate::zone::{Zone, ZoneConfig};
use std::collections::BTreeMap;

/// Validated, immutable set of zones.
///
/// Construction is all-or-nothing: a registry either satisfies the
/// partition invariant (apps disjoint across zones, path prefixes unique)
/// or no registry is produced at all.
#[derive(Debug, Clone, Default)]
pub struct ZoneRegistry {
    zones: BTreeMap<String, Zone>,
}

impl ZoneRegistry {
    /// Build a registry from raw zone configs.
    ///
    /// Validation order: each zone on its own first
    /// ([`ConfigError::InvalidZone`]), then app disjointness
    /// ([`ConfigError::DuplicateApps`]), then prefix uniqueness
    /// ([`ConfigError::DuplicatePrefix`]). Iteration is over a `BTreeMap`,
    /// so the failure reported for a given input is deterministic.
    pub fn build(configs: &BTreeMap<String, ZoneConfig>) -> Result<Self, ConfigError> {
        let mut zones: BTreeMap<String, Zone> = BTreeMap::new();

        for (name, config) in configs {
            let zone = Zone::from_config(name, config)?;
            if zones.contains_key(&zone.name) {
                // Distinct raw keys can collide after normalization.
                return Err(ConfigError::InvalidZone {
                    zone: zone.name,
                    reason: format!("zone name `{name}` duplicates another zone after normalization"),
                });
            }
            zones.insert(zone.name.clone(), zone);
        }

        let mut app_owner: BTreeMap<&str, &str> = BTreeMap::new();
        let mut duplicate_apps: Vec<String> = Vec::new();
        for zone in zones.values() {
            for app in &zone.apps {
                if app_owner.insert(app, &zone.name).is_some() && !duplicate_apps.contains(app) {
                    duplicate_apps.push(app.clone());
                }
            }
        }
        if !duplicate_apps.is_empty() {
            duplicate_apps.sort();
            return Err(ConfigError::DuplicateApps {
                apps: duplicate_apps,
            });
        }

        let mut prefix_owner: BTreeMap<&str, &str> = BTreeMap::new();
        for zone in zones.values() {
            if let Some(first) = prefix_owner.insert(&zone.path_prefix, &zone.name) {
                return Err(ConfigError::DuplicatePrefix {
                    prefix: zone.path_prefix.clone(),
                    first: first.to_string(),
                    second: zone.name.clone(),
                });
            }
        }

        Ok(Self { zones })
    }

    /// Look up a zone by (normalized) name.
    pub fn get(&self, name: &str) -> Option<&Zone> {
        self.zones.get(&name.trim().to_lowercase())
    }

    /// All zones, in name order.
    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    /// Zone names, in order.
    pub fn names(&self) -> Vec<String> {
        self.zones.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Select zones for a run.
    ///
    /// `None` selects every zone. Requested names are normalized before
    /// matching; names that don't exist in the registry are silently
    /// dropped, so a fully-unknown request yields an empty selection
    /// rather than an error.
    pub fn select(&self, requested: Option<&[String]>) -> Vec<Zone> {
        match requested {
            None => self.zones.values().cloned().collect(),
            Some(names) => {
                let wanted: Vec<String> =
                    names.iter().map(|n| n.trim().to_lowercase()).collect();
                self.zones
                    .values()
                    .filter(|z| wanted.iter().any(|w| *w == z.name))
                    .cloned()
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configs(entries: &[(&str, &[&str])]) -> BTreeMap<String, ZoneConfig> {
        entries
            .iter()
            .map(|(name, apps)| {
                (
                    name.to_string(),
                    ZoneConfig::with_apps(apps.iter().copied()),
                )
            })
            .collect()
    }

    #[test]
    fn test_build_valid_registry() {
        let registry =
            ZoneRegistry::build(&configs(&[("public", &["a", "b"]), ("admin", &["c"])])).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["admin", "public"]);
        assert!(registry.get("PUBLIC").is_some());
    }

    #[test]
    fn test_duplicate_app_fails() {
        let err =
            ZoneRegistry::build(&configs(&[("public", &["a", "shared"]), ("admin", &["shared"])]))
                .unwrap_err();
        match err {
            ConfigError::DuplicateApps { apps } => {
                assert_eq!(apps, vec!["shared".to_string()]);
            }
            other => panic!("expected DuplicateApps, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_prefix_fails() {
        let mut configs = configs(&[("public", &["a"]), ("admin", &["b"])]);
        if let Some(c) = configs.get_mut("admin") {
            c.path_prefix = Some("public".to_string());
        }
        let err = ZoneRegistry::build(&configs).unwrap_err();
        match err {
            ConfigError::DuplicatePrefix { prefix, .. } => assert_eq!(prefix, "public"),
            other => panic!("expected DuplicatePrefix, got {other:?}"),
        }
    }

    #[test]
    fn test_normalized_name_collision_fails() {
        let err =
            ZoneRegistry::build(&configs(&[("Public", &["a"]), ("public", &["b"])])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidZone { .. }));
    }

    #[test]
    fn test_invalid_zone_fails_whole_build() {
        // One bad zone means no registry at all.
        let err =
            ZoneRegistry::build(&configs(&[("good", &["a"]), ("bad", &[])])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidZone { .. }));
    }

    #[test]
    fn test_select_all_and_subset() {
        let registry =
            ZoneRegistry::build(&configs(&[("public", &["a"]), ("admin", &["b"])])).unwrap();
        assert_eq!(registry.select(None).len(), 2);

        let subset = registry.select(Some(&["Public".to_string()]));
        assert_eq!(subset.len(), 1);
        assert_eq!(subset[0].name, "public");
    }

    #[test]
    fn test_select_unknown_names_dropped() {
        let registry = ZoneRegistry::build(&configs(&[("public", &["a"])])).unwrap();
        let selected = registry.select(Some(&["nonexistent".to_string()]));
        assert!(selected.is_empty());
    }
}
