//! # Client Generation Stages
//!
//! One stage per client language, both driving an external generator CLI
//! per zone and dressing the output with auxiliary files rendered from
//! embedded templates:
//!
//! - [`TypeScriptStage`]: `npx @hey-api/openapi-ts` plus a per-zone
//!   `index.ts` / `package.json`, and a consolidated root `index.ts`
//!   re-exporting every generated zone client.
//! - [`PythonStage`]: `datamodel-codegen` plus `example.py`,
//!   `README.md`, `requirements.txt`, and an `error_<zone>.log`
//!   diagnostic on failure.
//!
//! Stages never raise for a failing tool: each zone yields a tagged
//! [`GenerationResult`] and the batch keeps going. Auxiliary-file
//! rendering failures degrade to warnings and leave the result
//! successful.

use crate::config::MultithreadingConfig;
use crate::pool::{use_parallel, worker_count, StagePool, StageTaskResult};
use crate::summary::GenerationResult;
use crate::zone::Zone;
use anyhow::Context;
use minijinja::Environment;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use walkdir::WalkDir;

pub mod python;
pub mod typescript;

pub use python::PythonStage;
pub use typescript::TypeScriptStage;

/// A client generator for one language.
///
/// `generate_zone` is the unit of parallelism: the orchestrator may run
/// it from a pooled task, so implementations must be self-contained and
/// touch only their zone's output directory.
pub trait ClientStage: Send + Sync {
    /// Stable stage label used in logs and task keys (`"typescript"`).
    fn kind(&self) -> &'static str;

    /// Whether the stage's toggle resolves to enabled.
    fn enabled(&self) -> bool;

    /// Output directory for one zone's client.
    fn zone_output_dir(&self, zone_name: &str) -> PathBuf;

    /// Generate one zone's client from its schema file.
    fn generate_zone(&self, zone: &Zone, schema: &Path) -> GenerationResult;
}

/// Run one stage over a batch of (zone, schema) jobs.
///
/// Returns an empty map when the stage is disabled. Chooses parallel or
/// sequential execution per the pool decision; both paths produce the
/// same results keyed by zone name, with a panicked task converted into
/// a failed result for its zone.
pub fn run_stage<S: ClientStage + 'static>(
    stage: &Arc<S>,
    jobs: &[(Zone, PathBuf)],
    mt: &MultithreadingConfig,
) -> BTreeMap<String, GenerationResult> {
    let mut results = BTreeMap::new();
    if !stage.enabled() || jobs.is_empty() {
        return results;
    }

    if use_parallel(mt.enabled, jobs.len(), mt.max_workers) {
        let workers = worker_count(jobs.len(), mt.max_workers);
        info!(
            stage = stage.kind(),
            workers,
            zones = jobs.len(),
            "generating clients in parallel"
        );
        let pool = StagePool::new(workers);
        let tasks = jobs
            .iter()
            .cloned()
            .map(|(zone, schema)| {
                let stage = Arc::clone(stage);
                let label = zone.name.clone();
                let task: Box<dyn FnOnce() -> GenerationResult + Send> =
                    Box::new(move || stage.generate_zone(&zone, &schema));
                (label, task)
            })
            .collect();
        for (zone, outcome) in pool.run(tasks) {
            let result = match outcome {
                StageTaskResult::Completed(result) => result,
                StageTaskResult::Panicked(message) => GenerationResult::failed(
                    zone.clone(),
                    stage.zone_output_dir(&zone),
                    format!("generation task panicked: {message}"),
                ),
            };
            results.insert(zone, result);
        }
    } else {
        info!(stage = stage.kind(), zones = jobs.len(), "generating clients sequentially");
        for (zone, schema) in jobs {
            results.insert(zone.name.clone(), stage.generate_zone(zone, schema));
        }
    }
    results
}

/// Write the consolidated `index.ts` at the TypeScript clients root,
/// re-exporting each zone client as a namespace.
pub fn write_consolidated_index(ts_root: &Path, zones: &[String]) -> anyhow::Result<PathBuf> {
    #[derive(serde::Serialize)]
    struct ZoneExport {
        name: String,
        alias: String,
    }

    let exports: Vec<ZoneExport> = zones
        .iter()
        .map(|name| ZoneExport {
            name: name.clone(),
            alias: name.replace('-', "_"),
        })
        .collect();
    let rendered = render_template(
        include_str!("../templates/consolidated_index.ts.j2"),
        minijinja::context! { count => exports.len(), zones => exports },
    )?;

    std::fs::create_dir_all(ts_root)
        .with_context(|| format!("Failed to create clients directory: {}", ts_root.display()))?;
    let path = ts_root.join("index.ts");
    std::fs::write(&path, rendered)
        .with_context(|| format!("Failed to write consolidated index: {}", path.display()))?;
    Ok(path)
}

/// Render one embedded template with the given context.
pub(crate) fn render_template(
    source: &str,
    ctx: minijinja::Value,
) -> anyhow::Result<String> {
    let mut env = Environment::new();
    env.add_template("tpl", source)
        .context("Failed to compile embedded template")?;
    let tmpl = env.get_template("tpl")?;
    let rendered = tmpl.render(ctx)?;
    Ok(rendered)
}

/// Diagnostic logs follow the `error_<zone>.log` convention; archives
/// and file counts both skip them.
pub(crate) fn is_error_log(file_name: &str) -> bool {
    file_name.starts_with("error_") && file_name.ends_with(".log")
}

/// Count regular files under a directory, skipping diagnostic logs.
pub(crate) fn count_generated_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| !is_error_log(&entry.file_name().to_string_lossy()))
        .count()
}
