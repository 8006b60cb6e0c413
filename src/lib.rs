//! # zonegen
//!
//! Zone-partitioned OpenAPI schema and API client generation.
//!
//! zonegen splits a service's API surface into named **zones** (public,
//! internal, partner, ...), derives an isolated routing namespace per
//! zone, drives the external schema and client generator tools for each
//! one, and packages the results into versioned archives and an optional
//! frontend monorepo.
//!
//! ## Pipeline
//!
//! ```mermaid
//! sequenceDiagram
//!     participant O as Orchestrator
//!     participant R as RouteSynthesizer
//!     participant S as SchemaStage
//!     participant C as Client stages
//!     participant A as ArchiveManager
//!     participant M as MonorepoSync
//!
//!     O->>R: synthesize(zone) per zone
//!     R-->>O: RoutingNamespace
//!     O->>S: generate(jobs)
//!     S-->>O: zone -> schema path
//!     O->>C: generate_zone(zone, schema) per zone
//!     C-->>O: GenerationResult (tagged, never raised)
//!     O->>A: archive_zone(zone, ts_dir, py_dir)
//!     O->>M: sync_all(clients_dir)
//!     O-->>O: GenerationSummary
//! ```
//!
//! Every stage isolates per-zone failures: one zone's broken schema or
//! client tool never aborts the batch. Tool failures are recorded as
//! tagged [`GenerationResult`](summary::GenerationResult)s; only
//! configuration problems (duplicate apps, duplicate path prefixes, no
//! zones at all) abort a run.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`zone`] | Zone model, registry validation, app detection |
//! | [`routing`] | Route manifest, per-zone routing namespace synthesis |
//! | [`schema`] | OpenAPI schema generation through the external tool |
//! | [`clients`] | TypeScript and Python client generation stages |
//! | [`pool`] | Bounded worker pool and the parallel/sequential decision |
//! | [`process`] | External tool invocation with timeouts |
//! | [`archive`] | Versioned tar.gz archives with retention |
//! | [`monorepo`] | Sync generated TypeScript clients into a monorepo |
//! | [`orchestrator`] | End-to-end pipeline and environment validation |
//! | [`summary`] | Per-zone results and the run summary |
//! | [`config`] | TOML configuration with env and CLI overrides |
//! | [`cli`] | The `zonegen` command-line interface |
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use zonegen::config::GenerationConfig;
//! use zonegen::orchestrator::Orchestrator;
//! use zonegen::process::SystemRunner;
//! use zonegen::routing::{RouteManifest, RoutePattern, RouteSource};
//! use zonegen::zone::{AppProbe, ZoneConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut config = GenerationConfig::default();
//!     config
//!         .zones
//!         .insert("public".to_string(), ZoneConfig::with_apps(["storefront"]));
//!
//!     let mut manifest = RouteManifest::new();
//!     manifest.insert_app("storefront", [RoutePattern::new("api/items/")]);
//!     let manifest = Arc::new(manifest);
//!
//!     let orchestrator = Orchestrator::new(
//!         config,
//!         Arc::clone(&manifest) as Arc<dyn RouteSource>,
//!         manifest as Arc<dyn AppProbe>,
//!         Arc::new(SystemRunner),
//!     )?;
//!
//!     let summary = orchestrator.generate_all(None, true)?;
//!     println!("generated {} file(s)", summary.total_files_generated);
//!     Ok(())
//! }
//! ```
//!
//! ## CLI
//!
//! ```bash
//! zonegen generate                 # full pipeline, all zones
//! zonegen generate --zones public  # one zone, with archives
//! zonegen schemas                  # schemas only
//! zonegen validate                 # check tools and config
//! zonegen clean-archives --keep-days 14
//! ```

pub mod archive;
pub mod cli;
pub mod clients;
pub mod config;
pub mod error;
pub mod monorepo;
pub mod orchestrator;
pub mod pool;
pub mod process;
pub mod routing;
pub mod schema;
pub mod summary;
pub mod zone;

pub use config::GenerationConfig;
pub use error::{ArchiveError, ConfigError, SyncError, SynthesisError};
pub use orchestrator::Orchestrator;
pub use summary::{GenerationResult, GenerationSummary};
pub use zone::{Zone, ZoneRegistry};
