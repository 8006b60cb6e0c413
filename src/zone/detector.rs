//! Zone validity detection against the host framework.
//!
//! A zone is only generatable when every app it declares is actually
//! registered in the host. The check is a collaborator call behind
//! [`AppProbe`] so embedders can wire in their framework's app registry
//! and tests can substitute a fixed set.

use crate::zone::ZoneRegistry;
use std::collections::BTreeMap;
use tracing::debug;

/// "Is this app installed?" predicate supplied by the host framework.
pub trait AppProbe: Send + Sync {
    fn is_installed(&self, app: &str) -> bool;
}

/// Probe that treats a fixed set of apps as installed.
///
/// `permissive()` answers yes for everything, for environments where no
/// app registry is available.
#[derive(Debug, Clone, Default)]
pub struct StaticAppProbe {
    apps: Vec<String>,
    permissive: bool,
}

impl StaticAppProbe {
    pub fn new<I, S>(apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            apps: apps.into_iter().map(Into::into).collect(),
            permissive: false,
        }
    }

    /// A probe that considers every app installed.
    pub fn permissive() -> Self {
        Self {
            apps: Vec::new(),
            permissive: true,
        }
    }
}

impl AppProbe for StaticAppProbe {
    fn is_installed(&self, app: &str) -> bool {
        self.permissive || self.apps.iter().any(|a| a == app)
    }
}

/// Per-zone and aggregate validity checks over a registry.
pub struct ZoneDetector<'a> {
    registry: &'a ZoneRegistry,
    probe: &'a dyn AppProbe,
}

impl<'a> ZoneDetector<'a> {
    pub fn new(registry: &'a ZoneRegistry, probe: &'a dyn AppProbe) -> Self {
        Self { registry, probe }
    }

    /// `true` iff the zone exists and every declared app is installed.
    ///
    /// A bad app never raises; it just makes the zone invalid.
    pub fn validate_zone(&self, name: &str) -> bool {
        match self.registry.get(name) {
            Some(zone) => zone.apps.iter().all(|app| {
                let installed = self.probe.is_installed(app);
                if !installed {
                    debug!(zone = %zone.name, app = %app, "app not installed");
                }
                installed
            }),
            None => false,
        }
    }

    /// Validity of every zone in the registry, keyed by zone name.
    pub fn validate_all(&self) -> BTreeMap<String, bool> {
        self.registry
            .zones()
            .map(|zone| (zone.name.clone(), self.validate_zone(&zone.name)))
            .collect()
    }

    /// Apps of the named zone that fail the probe. Empty for valid or
    /// unknown zones.
    pub fn missing_apps(&self, name: &str) -> Vec<String> {
        match self.registry.get(name) {
            Some(zone) => zone
                .apps
                .iter()
                .filter(|app| !self.probe.is_installed(app))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }
}
