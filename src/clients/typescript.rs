//! TypeScript client stage (`@hey-api/openapi-ts`).

use super::{count_generated_files, render_template, ClientStage};
use crate::config::{OutputConfig, TypeScriptConfig};
use crate::process::{CommandSpec, ToolRunner};
use crate::summary::GenerationResult;
use crate::zone::Zone;
use minijinja::context;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Generates one TypeScript client per zone and dresses it with
/// `index.ts` and `package.json`.
#[derive(Clone)]
pub struct TypeScriptStage {
    enabled: bool,
    command: Vec<String>,
    timeout: Duration,
    out_root: PathBuf,
    package_scope: String,
    runner: Arc<dyn ToolRunner>,
}

impl TypeScriptStage {
    pub fn new(config: &TypeScriptConfig, output: &OutputConfig, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            enabled: config.enabled.resolve(),
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            out_root: output.typescript_clients_path(),
            package_scope: config.package_scope.clone(),
            runner,
        }
    }

    fn run_tool(&self, schema: &Path, out_dir: &Path) -> Result<usize, String> {
        if !schema.is_file() {
            return Err(format!("schema file not found: {}", schema.display()));
        }
        fs::create_dir_all(out_dir)
            .map_err(|e| format!("could not create output directory: {e}"))?;

        let base = CommandSpec::from_argv(&self.command)
            .ok_or_else(|| "typescript generator command is empty".to_string())?;
        let cmd = base.args([
            "-i".to_string(),
            schema.display().to_string(),
            "-o".to_string(),
            out_dir.display().to_string(),
        ]);
        let output = self
            .runner
            .run(&cmd, self.timeout)
            .map_err(|e| e.to_string())?;

        if output.timed_out {
            return Err(format!(
                "typescript generator timed out after {}s",
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
                format!("typescript generator failed ({code})")
            } else {
                format!("typescript generator failed ({code}): {detail}")
            });
        }
        Ok(count_generated_files(out_dir))
    }

    /// Render `index.ts` and `package.json` next to the generated client.
    ///
    /// Failures here degrade to warnings; the zone's result stays
    /// successful.
    fn write_auxiliaries(&self, zone: &Zone, out_dir: &Path) {
        let index = render_template(
            include_str!("../templates/ts_index.ts.j2"),
            context! { title => zone.title, description => zone.description },
        );
        match index {
            Ok(rendered) => {
                if let Err(e) = fs::write(out_dir.join("index.ts"), rendered) {
                    warn!(zone = %zone.name, error = %e, "could not write index.ts");
                    println!("⚠️  Could not write index.ts for zone '{}': {e}", zone.name);
                }
            }
            Err(e) => {
                warn!(zone = %zone.name, error = %e, "could not render index.ts");
                println!("⚠️  Could not render index.ts for zone '{}': {e}", zone.name);
            }
        }

        let manifest = serde_json::json!({
            "name": format!("{}/{}", self.package_scope, zone.name),
            "version": package_version(&zone.version),
            "description": zone.description,
            "main": "index.ts",
            "types": "index.ts",
        });
        match serde_json::to_string_pretty(&manifest) {
            Ok(rendered) => {
                if let Err(e) = fs::write(out_dir.join("package.json"), rendered + "\n") {
                    warn!(zone = %zone.name, error = %e, "could not write package.json");
                    println!("⚠️  Could not write package.json for zone '{}': {e}", zone.name);
                }
            }
            Err(e) => {
                warn!(zone = %zone.name, error = %e, "could not render package.json");
            }
        }
    }
}

impl ClientStage for TypeScriptStage {
    fn kind(&self) -> &'static str {
        "typescript"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn zone_output_dir(&self, zone_name: &str) -> PathBuf {
        self.out_root.join(zone_name)
    }

    fn generate_zone(&self, zone: &Zone, schema: &Path) -> GenerationResult {
        let out_dir = self.zone_output_dir(&zone.name);
        match self.run_tool(schema, &out_dir) {
            Ok(files) => {
                self.write_auxiliaries(zone, &out_dir);
                println!(
                    "✅ TypeScript client generated for zone '{}' ({files} files)",
                    zone.name
                );
                GenerationResult::ok(&zone.name, out_dir, files)
            }
            Err(message) => {
                warn!(zone = %zone.name, error = %message, "typescript generation failed");
                println!(
                    "❌ TypeScript generation failed for zone '{}': {message}",
                    zone.name
                );
                GenerationResult::failed(&zone.name, out_dir, message)
            }
        }
    }
}

/// Map a zone API version onto a package.json semver.
/// `v1` style versions become `1.0.0`; full semver passes through.
fn package_version(zone_version: &str) -> String {
    let v = zone_version.trim_start_matches('v');
    match v.parse::<u32>() {
        Ok(major) => format!("{major}.0.0"),
        Err(_) if !v.is_empty() => v.to_string(),
        Err(_) => "1.0.0".to_string(),
    }
}
