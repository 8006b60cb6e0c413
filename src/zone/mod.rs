//! # Zone Module
//!
//! Zones partition the host API's apps into named groups, each with its
//! own visibility, auth, versioning and URL prefix metadata. Everything
//! downstream (routing synthesis, schema extraction, client generation,
//! archiving) is keyed by zone name.
//!
//! ## Pieces
//!
//! - [`ZoneConfig`] / [`Zone`]: raw vs. validated zone values
//! - [`ZoneRegistry`]: all-or-nothing construction enforcing the
//!   partition invariant (apps disjoint, prefixes unique)
//! - [`ZoneDetector`] / [`AppProbe`]: "are this zone's apps actually
//!   installed?" checks against the host framework
//!
//! ## Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use zonegen::zone::{ZoneConfig, ZoneRegistry};
//!
//! let mut configs = BTreeMap::new();
//! configs.insert("public".to_string(), ZoneConfig::with_apps(["accounts"]));
//! configs.insert("admin".to_string(), ZoneConfig::with_apps(["ops"]));
//!
//! let registry = ZoneRegistry::build(&configs).unwrap();
//! assert_eq!(registry.len(), 2);
//! assert_eq!(registry.get("public").unwrap().path_prefix, "public");
//! ```

mod detector;
mod model;
mod registry;

pub use detector::{AppProbe, StaticAppProbe, ZoneDetector};
pub use model::{Zone, ZoneConfig};
pub use registry::ZoneRegistry;
