//! # Generation Orchestrator
//!
//! Owns a run end to end: zone selection, routing synthesis, schema
//! extraction, client generation (TypeScript and Python interleaved in
//! one pool when both are enabled), the consolidated index, archiving,
//! and the optional monorepo sync. Every run that gets past
//! configuration validation terminates in a [`GenerationSummary`];
//! per-zone failures are folded into it, never raised.
//!
//! All collaborators arrive injected: configuration, the route source,
//! the app probe and the tool runner. Nothing in here reaches for
//! process-global state.

use crate::archive::{ArchiveEntry, ArchiveManager};
use crate::clients::{run_stage, write_consolidated_index, ClientStage, PythonStage, TypeScriptStage};
use crate::config::{GenerationConfig, MultithreadingConfig};
use crate::error::{ArchiveError, ConfigError};
use crate::monorepo::MonorepoSync;
use crate::pool::{use_parallel, worker_count, StagePool, StageTaskResult};
use crate::process::{CommandSpec, ToolRunner};
use crate::routing::{RouteSource, RouteSynthesizer};
use crate::schema::SchemaStage;
use crate::summary::{GenerationResult, GenerationSummary};
use crate::zone::{AppProbe, Zone, ZoneDetector, ZoneRegistry};
use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Environment probes run with a short leash; they only print a version.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Snapshot returned by [`Orchestrator::get_status`].
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub zones_detected: usize,
    pub zone_names: Vec<String>,
    pub output_dir: PathBuf,
    pub typescript_enabled: bool,
    pub python_enabled: bool,
    pub monorepo_enabled: bool,
    /// Present only when monorepo integration is enabled.
    pub monorepo_path_exists: Option<bool>,
    pub multithreading: MultithreadingConfig,
    /// Number of archives currently on disk (latest + dated).
    pub archives: usize,
}

/// Drives the full generation pipeline for one configuration.
pub struct Orchestrator {
    config: GenerationConfig,
    registry: ZoneRegistry,
    route_source: Arc<dyn RouteSource>,
    app_probe: Arc<dyn AppProbe>,
    runner: Arc<dyn ToolRunner>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Validate the configured zones into a registry and wire up the
    /// collaborators. The only fallible part is registry construction.
    pub fn new(
        config: GenerationConfig,
        route_source: Arc<dyn RouteSource>,
        app_probe: Arc<dyn AppProbe>,
        runner: Arc<dyn ToolRunner>,
    ) -> Result<Self, ConfigError> {
        let registry = ZoneRegistry::build(&config.zones)?;
        Ok(Self {
            config,
            registry,
            route_source,
            app_probe,
            runner,
        })
    }

    pub fn registry(&self) -> &ZoneRegistry {
        &self.registry
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Generate schemas only (no clients, no archives).
    ///
    /// Returns the schema file per zone for the zones that produced one.
    pub fn generate_schemas(
        &self,
        zones: Option<&[String]>,
    ) -> anyhow::Result<BTreeMap<String, PathBuf>> {
        if self.registry.is_empty() {
            return Err(ConfigError::NoZones.into());
        }
        let selected = self.registry.select(zones);
        if selected.is_empty() {
            info!("no matching zones requested, nothing to do");
            return Ok(BTreeMap::new());
        }
        Ok(self.run_schema_stage(&selected))
    }

    /// Run the full pipeline for the requested zones (all zones when
    /// `None`). Always returns a summary once configuration validation
    /// has passed; per-zone failures live inside it.
    pub fn generate_all(
        &self,
        zones: Option<&[String]>,
        archive: bool,
    ) -> anyhow::Result<GenerationSummary> {
        let started = Instant::now();
        if self.registry.is_empty() {
            return Err(ConfigError::NoZones.into());
        }

        let selected = self.registry.select(zones);
        if selected.is_empty() {
            warn!("no matching zones requested, returning empty summary");
            return Ok(GenerationSummary::from_results(
                0,
                BTreeMap::new(),
                BTreeMap::new(),
                started.elapsed().as_secs_f64(),
            ));
        }
        println!("🚀 Generating API clients for {} zone(s)", selected.len());

        let schemas = self.run_schema_stage(&selected);

        let ts_stage = Arc::new(TypeScriptStage::new(
            &self.config.generators.typescript,
            &self.config.output,
            Arc::clone(&self.runner),
        ));
        let py_stage = Arc::new(PythonStage::new(
            &self.config.generators.python,
            &self.config.output,
            Arc::clone(&self.runner),
        ));

        // Zones that lost their schema have no client jobs; their absence
        // from the result maps mirrors their absence from `schemas`.
        let client_jobs: Vec<(Zone, PathBuf)> = selected
            .iter()
            .filter_map(|zone| {
                schemas
                    .get(&zone.name)
                    .map(|schema| (zone.clone(), schema.clone()))
            })
            .collect();

        let (ts_results, py_results) = if ts_stage.enabled() && py_stage.enabled() {
            self.run_interleaved_clients(&ts_stage, &py_stage, &client_jobs)
        } else {
            (
                run_stage(&ts_stage, &client_jobs, &self.config.multithreading),
                run_stage(&py_stage, &client_jobs, &self.config.multithreading),
            )
        };

        if ts_stage.enabled() {
            self.write_index(&ts_results);
        }
        if archive {
            self.archive_zones(&selected, &ts_results, &py_results);
        }
        if self.config.monorepo.enabled {
            let sync = MonorepoSync::new(self.config.monorepo.clone(), Arc::clone(&self.runner));
            let report = sync.sync_all(&self.config.output.clients_path());
            info!(
                synced = report.synced.len(),
                failed = report.failed.len(),
                warnings = report.warnings.len(),
                "monorepo sync finished"
            );
        }

        let summary = GenerationSummary::from_results(
            selected.len(),
            ts_results,
            py_results,
            started.elapsed().as_secs_f64(),
        );
        println!(
            "✅ Generation finished in {:.2}s: TypeScript {}/{}, Python {}/{}, {} file(s)",
            summary.duration_seconds,
            summary.successful_typescript,
            summary.successful_typescript + summary.failed_typescript,
            summary.successful_python,
            summary.successful_python + summary.failed_python,
            summary.total_files_generated,
        );
        Ok(summary)
    }

    fn run_schema_stage(&self, selected: &[Zone]) -> BTreeMap<String, PathBuf> {
        let stage = SchemaStage::new(
            &self.config.schema_tool,
            &self.config.output,
            Arc::clone(&self.runner),
        );
        let synthesizer = RouteSynthesizer::new(self.route_source.as_ref());
        let jobs = stage.prepare(selected, &synthesizer);
        stage.generate(jobs, &self.config.multithreading)
    }

    /// Run both client stages over one shared pool, one task per
    /// (zone, language) pair. Sized `min(max_workers, zones × 2)` so a
    /// zone's TypeScript and Python generation can overlap.
    fn run_interleaved_clients(
        &self,
        ts_stage: &Arc<TypeScriptStage>,
        py_stage: &Arc<PythonStage>,
        jobs: &[(Zone, PathBuf)],
    ) -> (
        BTreeMap<String, GenerationResult>,
        BTreeMap<String, GenerationResult>,
    ) {
        let mt = &self.config.multithreading;
        let mut ts_results = BTreeMap::new();
        let mut py_results = BTreeMap::new();
        if jobs.is_empty() {
            return (ts_results, py_results);
        }

        if use_parallel(mt.enabled, jobs.len(), mt.max_workers) {
            let workers = worker_count(jobs.len() * 2, mt.max_workers);
            info!(workers, zones = jobs.len(), "generating clients in one interleaved pool");
            let pool = StagePool::new(workers);
            let mut tasks: Vec<(String, Box<dyn FnOnce() -> GenerationResult + Send>)> =
                Vec::with_capacity(jobs.len() * 2);
            for (zone, schema) in jobs.iter().cloned() {
                let stage = Arc::clone(ts_stage);
                let ts_zone = zone.clone();
                let ts_schema = schema.clone();
                tasks.push((
                    format!("ts_{}", zone.name),
                    Box::new(move || stage.generate_zone(&ts_zone, &ts_schema)),
                ));
                let stage = Arc::clone(py_stage);
                tasks.push((
                    format!("py_{}", zone.name),
                    Box::new(move || stage.generate_zone(&zone, &schema)),
                ));
            }
            for (label, outcome) in pool.run(tasks) {
                let (kind, zone_name) = label.split_at(3);
                let result = match outcome {
                    StageTaskResult::Completed(result) => result,
                    StageTaskResult::Panicked(message) => {
                        let dir = if kind == "ts_" {
                            ts_stage.zone_output_dir(zone_name)
                        } else {
                            py_stage.zone_output_dir(zone_name)
                        };
                        GenerationResult::failed(
                            zone_name,
                            dir,
                            format!("generation task panicked: {message}"),
                        )
                    }
                };
                if kind == "ts_" {
                    ts_results.insert(zone_name.to_string(), result);
                } else {
                    py_results.insert(zone_name.to_string(), result);
                }
            }
        } else {
            info!(zones = jobs.len(), "generating clients sequentially");
            for (zone, schema) in jobs {
                ts_results.insert(zone.name.clone(), ts_stage.generate_zone(zone, schema));
                py_results.insert(zone.name.clone(), py_stage.generate_zone(zone, schema));
            }
        }
        (ts_results, py_results)
    }

    /// Consolidated index over the successful TypeScript zones. Written
    /// after the client barrier; failure to write is a warning.
    fn write_index(&self, ts_results: &BTreeMap<String, GenerationResult>) {
        let successful: Vec<String> = ts_results
            .values()
            .filter(|r| r.success)
            .map(|r| r.zone_name.clone())
            .collect();
        if successful.is_empty() {
            return;
        }
        match write_consolidated_index(
            &self.config.output.typescript_clients_path(),
            &successful,
        ) {
            Ok(path) => {
                info!(path = %path.display(), zones = successful.len(), "wrote consolidated index");
            }
            Err(e) => {
                warn!(error = %e, "could not write consolidated index");
                println!("⚠️  Could not write consolidated index: {e}");
            }
        }
    }

    /// Archive every zone with at least one successful client. Archive
    /// failures are zone-scoped and never abort the run.
    fn archive_zones(
        &self,
        selected: &[Zone],
        ts_results: &BTreeMap<String, GenerationResult>,
        py_results: &BTreeMap<String, GenerationResult>,
    ) {
        let manager = ArchiveManager::new(&self.config.output);
        for zone in selected {
            let ts_dir = ts_results
                .get(&zone.name)
                .filter(|r| r.success)
                .map(|r| r.output_path.clone());
            let py_dir = py_results
                .get(&zone.name)
                .filter(|r| r.success)
                .map(|r| r.output_path.clone());
            if ts_dir.is_none() && py_dir.is_none() {
                debug!(zone = %zone.name, "no successful clients, skipping archive");
                continue;
            }
            if let Err(e) = manager.archive_zone(&zone.name, ts_dir.as_deref(), py_dir.as_deref())
            {
                warn!(zone = %zone.name, error = %e, "archive failed");
                println!("⚠️  Archive failed for zone '{}': {e}", zone.name);
            }
        }
    }

    /// Registry, app, output-directory and tool checks. Prints one line
    /// per check; returns whether the environment is ready to generate.
    pub fn validate_environment(&self) -> bool {
        let mut ok = true;

        if self.registry.is_empty() {
            error!("no zones configured");
            println!("❌ No zones configured");
            ok = false;
        } else {
            println!("✅ {} zone(s) configured", self.registry.len());
            let detector = ZoneDetector::new(&self.registry, self.app_probe.as_ref());
            for (zone, valid) in detector.validate_all() {
                if valid {
                    println!("✅ Zone '{zone}': all apps present");
                } else {
                    let missing = detector.missing_apps(&zone);
                    warn!(zone = %zone, missing = ?missing, "zone has missing apps");
                    println!("❌ Zone '{zone}' is missing apps: {}", missing.join(", "));
                    ok = false;
                }
            }
        }

        match self.probe_output_dir() {
            Ok(()) => println!(
                "✅ Output directory is writable: {}",
                self.config.output.base_dir.display()
            ),
            Err(e) => {
                error!(error = %e, "output directory is not writable");
                println!(
                    "❌ Output directory is not writable ({}): {e}",
                    self.config.output.base_dir.display()
                );
                ok = false;
            }
        }

        if self.probe_tool(&self.config.schema_tool.command) {
            println!("✅ Schema tool available");
        } else {
            println!("❌ Schema tool not available: {}", self.config.schema_tool.command.join(" "));
            ok = false;
        }
        ok &= self.probe_client_tool(
            "TypeScript generator",
            &self.config.generators.typescript.command,
            self.config.generators.typescript.enabled.resolve(),
        );
        ok &= self.probe_client_tool(
            "Python generator",
            &self.config.generators.python.command,
            self.config.generators.python.enabled.resolve(),
        );
        ok
    }

    /// A missing client tool only fails validation when that client is
    /// enabled; otherwise it is worth a warning and nothing more.
    fn probe_client_tool(&self, label: &str, command: &[String], enabled: bool) -> bool {
        if self.probe_tool(command) {
            println!("✅ {label} available");
            return true;
        }
        if enabled {
            println!("❌ {label} not available: {}", command.join(" "));
            false
        } else {
            println!("⚠️  {label} not available (disabled, ignoring)");
            true
        }
    }

    fn probe_tool(&self, command: &[String]) -> bool {
        let Some(base) = CommandSpec::from_argv(command) else {
            return false;
        };
        let cmd = base.arg("--version");
        match self.runner.run(&cmd, PROBE_TIMEOUT) {
            Ok(output) => output.success(),
            Err(e) => {
                debug!(command = %cmd.display(), error = %e, "tool probe failed");
                false
            }
        }
    }

    fn probe_output_dir(&self) -> std::io::Result<()> {
        let base = &self.config.output.base_dir;
        fs::create_dir_all(base)?;
        let probe = base.join(".zonegen_write_probe");
        fs::write(&probe, b"probe")?;
        fs::remove_file(&probe)?;
        Ok(())
    }

    /// Current pipeline configuration and on-disk state, for `status`.
    pub fn get_status(&self) -> Status {
        Status {
            zones_detected: self.registry.len(),
            zone_names: self.registry.names(),
            output_dir: self.config.output.base_dir.clone(),
            typescript_enabled: self.config.generators.typescript.enabled.resolve(),
            python_enabled: self.config.generators.python.enabled.resolve(),
            monorepo_enabled: self.config.monorepo.enabled,
            monorepo_path_exists: self
                .config
                .monorepo
                .enabled
                .then(|| self.config.monorepo.path.is_dir()),
            multithreading: self.config.multithreading,
            archives: ArchiveManager::new(&self.config.output).list_archives().len(),
        }
    }

    /// Empty the output tree, keeping `.gitkeep` and `README.md`.
    ///
    /// Returns `false` when some entries could not be removed; the rest
    /// are still cleaned.
    pub fn clean_output(&self) -> anyhow::Result<bool> {
        let base = &self.config.output.base_dir;
        if !base.exists() {
            info!(dir = %base.display(), "output directory does not exist, nothing to clean");
            return Ok(true);
        }

        let mut clean = true;
        let reader = fs::read_dir(base)
            .with_context(|| format!("Failed to read output directory: {}", base.display()))?;
        for entry in reader {
            let entry = entry
                .with_context(|| format!("Failed to read output directory: {}", base.display()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == ".gitkeep" || name == "README.md" {
                continue;
            }
            let path = entry.path();
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            if let Err(e) = removed {
                warn!(path = %path.display(), error = %e, "could not remove output entry");
                println!("⚠️  Could not remove {}: {e}", path.display());
                clean = false;
            }
        }
        if clean {
            println!("✅ Cleaned output directory: {}", base.display());
        }
        Ok(clean)
    }

    pub fn list_archives(&self) -> Vec<ArchiveEntry> {
        ArchiveManager::new(&self.config.output).list_archives()
    }

    pub fn clean_old_archives(&self, keep_days: u32) -> Result<usize, ArchiveError> {
        ArchiveManager::new(&self.config.output).clean_old_archives(keep_days)
    }
}
