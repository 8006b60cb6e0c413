//! # Schema Extraction Stage
//!
//! Turns zones into OpenAPI schema files by driving the configured
//! external extractor (by default the project's `manage.py spectacular`
//! equivalent) once per zone.
//!
//! The stage runs in two phases. Phase one is always sequential: each
//! zone's routing namespace is synthesized and materialized under
//! `temp/routing/`, producing a [`PreparedSchemaJob`]; a zone whose
//! routes cannot be assembled is dropped here with a warning. Phase two
//! invokes the extractor per job, fanning out over the worker pool when
//! the multithreading config allows it.
//!
//! An invocation only counts as successful when the tool exits zero
//! *and* the target schema file exists non-empty afterwards; tools that
//! exit zero while writing nothing are treated as failures.

use crate::config::{MultithreadingConfig, OutputConfig, SchemaToolConfig};
use crate::pool::{use_parallel, worker_count, StagePool, StageTaskResult};
use crate::process::{CommandSpec, ToolRunner};
use crate::routing::RouteSynthesizer;
use crate::zone::Zone;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A zone whose routing namespace is materialized and which is ready
/// for schema extraction.
#[derive(Debug, Clone)]
pub struct PreparedSchemaJob {
    pub zone_name: String,
    pub version: String,
    pub namespace_id: String,
    pub output_file: PathBuf,
}

/// Drives the external schema extractor for a batch of zones.
#[derive(Clone)]
pub struct SchemaStage {
    command: Vec<String>,
    timeout: Duration,
    schemas_dir: PathBuf,
    routing_dir: PathBuf,
    runner: Arc<dyn ToolRunner>,
}

impl SchemaStage {
    pub fn new(tool: &SchemaToolConfig, output: &OutputConfig, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            command: tool.command.clone(),
            timeout: Duration::from_secs(tool.timeout_secs),
            schemas_dir: output.schemas_path(),
            routing_dir: output.routing_path(),
            runner,
        }
    }

    /// Phase one: synthesize and materialize a routing namespace per zone.
    ///
    /// Zones that fail synthesis or materialization are skipped with a
    /// warning; they produce no job and therefore no schema or clients.
    pub fn prepare(
        &self,
        zones: &[Zone],
        synthesizer: &RouteSynthesizer<'_>,
    ) -> Vec<PreparedSchemaJob> {
        let mut jobs = Vec::with_capacity(zones.len());
        for zone in zones {
            let namespace = match synthesizer.synthesize(zone) {
                Ok(ns) => ns,
                Err(e) => {
                    warn!(zone = %zone.name, error = %e, "skipping zone: route synthesis failed");
                    println!("⚠️  Skipping zone '{}': {e}", zone.name);
                    continue;
                }
            };
            if let Err(e) = namespace.materialize(&self.routing_dir) {
                warn!(zone = %zone.name, error = %e, "skipping zone: could not materialize routing namespace");
                println!("⚠️  Skipping zone '{}': {e}", zone.name);
                continue;
            }
            jobs.push(PreparedSchemaJob {
                zone_name: zone.name.clone(),
                version: zone.version.clone(),
                namespace_id: namespace.id.clone(),
                output_file: self.schemas_dir.join(format!("{}.yaml", zone.name)),
            });
        }
        jobs
    }

    /// Phase two: run the extractor for every prepared job.
    ///
    /// Returns the schema file per zone for the jobs that succeeded;
    /// failed zones are logged and omitted so downstream stages never
    /// see a schema that does not exist on disk.
    pub fn generate(
        &self,
        jobs: Vec<PreparedSchemaJob>,
        mt: &MultithreadingConfig,
    ) -> BTreeMap<String, PathBuf> {
        let mut schemas = BTreeMap::new();
        if jobs.is_empty() {
            return schemas;
        }

        if use_parallel(mt.enabled, jobs.len(), mt.max_workers) {
            let workers = worker_count(jobs.len(), mt.max_workers);
            info!(workers, zones = jobs.len(), "generating schemas in parallel");
            let pool = StagePool::new(workers);
            let tasks = jobs
                .into_iter()
                .map(|job| {
                    let stage = self.clone();
                    let label = job.zone_name.clone();
                    let task: Box<dyn FnOnce() -> Result<PathBuf, String> + Send> =
                        Box::new(move || stage.run_job(&job));
                    (label, task)
                })
                .collect();
            for (zone, outcome) in pool.run(tasks) {
                match outcome {
                    StageTaskResult::Completed(Ok(path)) => {
                        schemas.insert(zone, path);
                    }
                    StageTaskResult::Completed(Err(_)) => {}
                    StageTaskResult::Panicked(message) => {
                        warn!(zone = %zone, panic = %message, "schema task panicked");
                        println!("❌ Schema generation for zone '{zone}' panicked: {message}");
                    }
                }
            }
        } else {
            info!(zones = jobs.len(), "generating schemas sequentially");
            for job in jobs {
                let zone = job.zone_name.clone();
                if let Ok(path) = self.run_job(&job) {
                    schemas.insert(zone, path);
                }
            }
        }
        schemas
    }

    fn run_job(&self, job: &PreparedSchemaJob) -> Result<PathBuf, String> {
        match self.try_job(job) {
            Ok(path) => {
                println!("✅ Generated schema for zone '{}'", job.zone_name);
                Ok(path)
            }
            Err(message) => {
                warn!(zone = %job.zone_name, error = %message, "schema generation failed");
                println!("❌ Schema generation failed for zone '{}': {message}", job.zone_name);
                Err(message)
            }
        }
    }

    fn try_job(&self, job: &PreparedSchemaJob) -> Result<PathBuf, String> {
        let base = CommandSpec::from_argv(&self.command)
            .ok_or_else(|| "schema tool command is empty".to_string())?;
        if let Some(parent) = job.output_file.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("could not create schema directory: {e}"))?;
        }

        let cmd = base.args([
            "--file".to_string(),
            job.output_file.display().to_string(),
            "--api-version".to_string(),
            job.version.clone(),
            "--urlconf".to_string(),
            job.namespace_id.clone(),
        ]);
        let output = self
            .runner
            .run(&cmd, self.timeout)
            .map_err(|e| e.to_string())?;

        if output.timed_out {
            return Err(format!(
                "schema tool timed out after {}s",
                self.timeout.as_secs()
            ));
        }
        if !output.success() {
            let detail = output.combined();
            let detail = detail.trim();
            let code = output
                .exit_code
                .map_or_else(|| "killed".to_string(), |c| format!("exit status {c}"));
            return Err(if detail.is_empty() {
                format!("schema tool failed ({code})")
            } else {
                format!("schema tool failed ({code}): {detail}")
            });
        }

        // Exit 0 alone is not enough; the schema must actually be there.
        match fs::metadata(&job.output_file) {
            Ok(meta) if meta.len() > 0 => Ok(job.output_file.clone()),
            Ok(_) => Err(format!(
                "schema tool exited 0 but wrote an empty file: {}",
                job.output_file.display()
            )),
            Err(_) => Err(format!(
                "schema tool exited 0 but produced no file: {}",
                job.output_file.display()
            )),
        }
    }
}
