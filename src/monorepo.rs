//! # Monorepo Sync
//!
//! Copies generated TypeScript zone clients into an external workspace
//! repository, rewriting each client's `package.json` into a private
//! workspace package and giving it a `tsconfig.json` that extends the
//! workspace base config.
//!
//! The monorepo is never owned by this tool: sync copies into the path
//! it is told about and reports per-zone failures in a [`SyncReport`];
//! nothing here can fail a generation run. A failed downstream build is
//! a warning, permanently.

use crate::clients::render_template;
use crate::config::MonorepoConfig;
use crate::error::SyncError;
use crate::process::{CommandSpec, ToolRunner};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Outcome of one sync pass.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Zones copied across successfully.
    pub synced: Vec<String>,
    /// Failure message per zone for zones that could not be copied.
    pub failed: BTreeMap<String, String>,
    /// Non-fatal conditions (missing target, failed build, ...).
    pub warnings: Vec<String>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.warnings.is_empty()
    }
}

/// Copies zone clients into the configured workspace repository.
pub struct MonorepoSync {
    config: MonorepoConfig,
    runner: Arc<dyn ToolRunner>,
}

impl MonorepoSync {
    pub fn new(config: MonorepoConfig, runner: Arc<dyn ToolRunner>) -> Self {
        Self { config, runner }
    }

    /// Sync every zone client under `<clients_dir>/typescript/` into the
    /// monorepo's API package. No-op when the integration is disabled.
    pub fn sync_all(&self, clients_dir: &Path) -> SyncReport {
        let mut report = SyncReport::default();
        if !self.config.enabled {
            debug!("monorepo sync disabled, skipping");
            return report;
        }
        if !self.config.path.is_dir() {
            let message = format!(
                "monorepo path does not exist: {}",
                self.config.path.display()
            );
            warn!("{message}");
            println!("⚠️  {message}");
            report.warnings.push(message);
            return report;
        }

        let api_package_dir = self.config.path.join(&self.config.api_package_path);
        if let Err(e) = fs::create_dir_all(&api_package_dir) {
            let message = format!(
                "could not create API package directory {}: {e}",
                api_package_dir.display()
            );
            warn!("{message}");
            report.warnings.push(message);
            return report;
        }

        let ts_dir = clients_dir.join("typescript");
        println!("🚀 Syncing zone clients into {}", api_package_dir.display());

        let mut zone_dirs: Vec<PathBuf> = match fs::read_dir(&ts_dir) {
            Ok(reader) => reader
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect(),
            Err(e) => {
                let message = format!("no TypeScript clients to sync ({}): {e}", ts_dir.display());
                warn!("{message}");
                report.warnings.push(message);
                return report;
            }
        };
        zone_dirs.sort();

        for zone_dir in zone_dirs {
            let Some(zone) = zone_dir.file_name().map(|n| n.to_string_lossy().into_owned())
            else {
                continue;
            };
            match self.sync_zone(&zone, &zone_dir, &api_package_dir) {
                Ok(()) => {
                    info!(zone = %zone, "synced zone client into monorepo");
                    println!("✅ Synced zone '{zone}' into monorepo");
                    report.synced.push(zone);
                }
                Err(e) => {
                    warn!(zone = %zone, error = %e, "monorepo sync failed for zone");
                    println!("⚠️  Monorepo sync failed for zone '{zone}': {e}");
                    report.failed.insert(zone, e.to_string());
                }
            }
        }

        self.copy_consolidated_index(&ts_dir, &api_package_dir, &mut report);
        self.run_build(&api_package_dir, &mut report);
        report
    }

    /// Copy one zone's client into `<api package>/<zone>/`, replacing any
    /// previous copy. `package.json` and `node_modules` never cross over;
    /// the workspace gets a rewritten manifest and tsconfig instead.
    fn sync_zone(
        &self,
        zone: &str,
        source: &Path,
        api_package_dir: &Path,
    ) -> Result<(), SyncError> {
        let target = api_package_dir.join(zone);
        if target.exists() {
            fs::remove_dir_all(&target).map_err(|e| {
                SyncError::io(format!("failed to remove stale target {}", target.display()), e)
            })?;
        }

        for entry in WalkDir::new(source)
            .into_iter()
            .filter_entry(|e| !is_sync_excluded(&e.file_name().to_string_lossy()))
        {
            let entry = entry.map_err(|e| {
                SyncError::io("failed to walk client tree".to_string(), std::io::Error::from(e))
            })?;
            let rel = entry.path().strip_prefix(source).map_err(|e| {
                SyncError::io("failed to relativize client path".to_string(), std::io::Error::other(e))
            })?;
            let dest = target.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest).map_err(|e| {
                    SyncError::io(format!("failed to create {}", dest.display()), e)
                })?;
            } else if entry.file_type().is_file() {
                fs::copy(entry.path(), &dest).map_err(|e| {
                    SyncError::io(format!("failed to copy {}", dest.display()), e)
                })?;
            }
        }

        self.write_workspace_manifest(zone, &target)?;
        self.write_tsconfig(zone, &target)?;
        Ok(())
    }

    fn write_workspace_manifest(&self, zone: &str, target: &Path) -> Result<(), SyncError> {
        let manifest = serde_json::json!({
            "name": format!("{}/{}-api", self.config.package_scope, zone),
            "version": "workspace:*",
            "private": true,
            "main": "./index.ts",
            "types": "./index.ts",
            "scripts": {
                "build": "tsc -p tsconfig.json",
                "clean": "rm -rf dist",
                "dev": "tsc -p tsconfig.json --watch",
                "lint": "eslint .",
                "type-check": "tsc --noEmit",
            },
        });
        let rendered = serde_json::to_string_pretty(&manifest)?;
        let path = target.join("package.json");
        fs::write(&path, rendered + "\n")
            .map_err(|e| SyncError::io(format!("failed to write {}", path.display()), e))?;
        Ok(())
    }

    fn write_tsconfig(&self, zone: &str, target: &Path) -> Result<(), SyncError> {
        let rendered = render_template(
            include_str!("templates/monorepo_tsconfig.json.j2"),
            minijinja::context! { zone => zone },
        )
        .map_err(|e| SyncError::io("failed to render tsconfig".to_string(), std::io::Error::other(e)))?;
        let path = target.join("tsconfig.json");
        fs::write(&path, rendered)
            .map_err(|e| SyncError::io(format!("failed to write {}", path.display()), e))?;
        Ok(())
    }

    fn copy_consolidated_index(&self, ts_dir: &Path, api_package_dir: &Path, report: &mut SyncReport) {
        let index = ts_dir.join("index.ts");
        if !index.is_file() {
            return;
        }
        if let Err(e) = fs::copy(&index, api_package_dir.join("index.ts")) {
            let message = format!("could not copy consolidated index: {e}");
            warn!("{message}");
            report.warnings.push(message);
        }
    }

    /// Build the API package when it declares a manifest. Build failures
    /// never fail the sync.
    fn run_build(&self, api_package_dir: &Path, report: &mut SyncReport) {
        if !api_package_dir.join("package.json").is_file() {
            debug!("API package has no package.json, skipping build");
            return;
        }
        let Some(base) = CommandSpec::from_argv(&self.config.build_command) else {
            return;
        };
        let cmd = base.cwd(api_package_dir);
        let timeout = Duration::from_secs(self.config.build_timeout_secs);

        info!(command = %cmd.display(), "running monorepo build");
        match self.runner.run(&cmd, timeout) {
            Ok(output) if output.success() => {
                println!("✅ Monorepo build succeeded");
            }
            Ok(output) => {
                let detail = output.combined();
                let detail = detail.trim();
                let message = if output.timed_out {
                    format!("monorepo build timed out after {}s", timeout.as_secs())
                } else if detail.is_empty() {
                    "monorepo build failed".to_string()
                } else {
                    format!("monorepo build failed: {detail}")
                };
                warn!("{message}");
                println!("⚠️  {message}");
                report.warnings.push(message);
            }
            Err(e) => {
                let message = format!("monorepo build could not run: {e}");
                warn!("{message}");
                println!("⚠️  {message}");
                report.warnings.push(message);
            }
        }
    }
}

/// Names that never cross into the monorepo, at any depth.
fn is_sync_excluded(name: &str) -> bool {
    name == "package.json" || name == "node_modules"
}
