//! Python client stage (`datamodel-codegen`).

use super::{count_generated_files, render_template, ClientStage};
use crate::config::{OutputConfig, PythonConfig};
use crate::process::{CommandSpec, ProcessOutput, ToolRunner};
use crate::summary::GenerationResult;
use crate::zone::Zone;
use minijinja::context;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const REQUIREMENTS: &str = "pydantic>=2.0\n";

/// Generates pydantic models per zone (`models.py`) and dresses the
/// output with `example.py`, `README.md` and `requirements.txt`. On
/// failure, writes an `error_<zone>.log` diagnostic into the zone
/// directory instead.
#[derive(Clone)]
pub struct PythonStage {
    enabled: bool,
    command: Vec<String>,
    timeout: Duration,
    out_root: PathBuf,
    project_name_template: String,
    runner: Arc<dyn ToolRunner>,
}

/// Everything the diagnostic log needs about a failed invocation.
struct ToolFailure {
    message: String,
    command: Option<String>,
    output: Option<ProcessOutput>,
}

impl ToolFailure {
    fn early(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            command: None,
            output: None,
        }
    }
}

impl PythonStage {
    pub fn new(config: &PythonConfig, output: &OutputConfig, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            enabled: config.enabled.resolve(),
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            out_root: output.python_clients_path(),
            project_name_template: config.project_name_template.clone(),
            runner,
        }
    }

    fn project_name(&self, zone_name: &str) -> String {
        self.project_name_template.replace("{zone}", zone_name)
    }

    fn run_tool(&self, schema: &Path, out_dir: &Path) -> Result<usize, ToolFailure> {
        if !schema.is_file() {
            return Err(ToolFailure::early(format!(
                "schema file not found: {}",
                schema.display()
            )));
        }
        fs::create_dir_all(out_dir).map_err(|e| {
            ToolFailure::early(format!("could not create output directory: {e}"))
        })?;

        let base = CommandSpec::from_argv(&self.command)
            .ok_or_else(|| ToolFailure::early("python generator command is empty"))?;
        let cmd = base.args([
            "--input".to_string(),
            schema.display().to_string(),
            "--input-file-type".to_string(),
            "openapi".to_string(),
            "--output".to_string(),
            out_dir.join("models.py").display().to_string(),
        ]);
        let command_line = cmd.display();
        let output = self.runner.run(&cmd, self.timeout).map_err(|e| ToolFailure {
            message: e.to_string(),
            command: Some(command_line.clone()),
            output: None,
        })?;

        if output.timed_out {
            return Err(ToolFailure {
                message: format!("python generator timed out after {}s", self.timeout.as_secs()),
                command: Some(command_line),
                output: Some(output),
            });
        }
        if !output.success() {
            let detail = output.combined();
            let detail = detail.trim();
            let code = output
                .exit_code
                .map_or_else(|| "killed".to_string(), |c| format!("exit status {c}"));
            let message = if detail.is_empty() {
                format!("python generator failed ({code})")
            } else {
                format!("python generator failed ({code}): {detail}")
            };
            return Err(ToolFailure {
                message,
                command: Some(command_line),
                output: Some(output),
            });
        }
        Ok(count_generated_files(out_dir))
    }

    /// Render `example.py`, `README.md` and `requirements.txt` next to the
    /// generated models. Failures degrade to warnings.
    fn write_auxiliaries(&self, zone: &Zone, out_dir: &Path) {
        let project_name = self.project_name(&zone.name);
        let rendered = [
            (
                "example.py",
                render_template(
                    include_str!("../templates/py_example.py.j2"),
                    context! { title => zone.title, project_name => project_name },
                ),
            ),
            (
                "README.md",
                render_template(
                    include_str!("../templates/py_readme.md.j2"),
                    context! {
                        title => zone.title,
                        description => zone.description,
                        zone => zone.name,
                    },
                ),
            ),
            ("requirements.txt", Ok(REQUIREMENTS.to_string())),
        ];

        for (file_name, outcome) in rendered {
            match outcome {
                Ok(contents) => {
                    if let Err(e) = fs::write(out_dir.join(file_name), contents) {
                        warn!(zone = %zone.name, file = file_name, error = %e, "could not write auxiliary file");
                        println!(
                            "⚠️  Could not write {file_name} for zone '{}': {e}",
                            zone.name
                        );
                    }
                }
                Err(e) => {
                    warn!(zone = %zone.name, file = file_name, error = %e, "could not render auxiliary file");
                    println!(
                        "⚠️  Could not render {file_name} for zone '{}': {e}",
                        zone.name
                    );
                }
            }
        }
    }

    fn write_error_log(&self, zone_name: &str, out_dir: &Path, failure: &ToolFailure) {
        let mut body = format!("Python client generation failed for zone '{zone_name}'\n");
        body.push_str(&format!(
            "Timestamp: {}\n",
            chrono::Local::now().to_rfc3339()
        ));
        if let Some(command) = &failure.command {
            body.push_str(&format!("Command: {command}\n"));
        }
        body.push_str(&format!("Error: {}\n", failure.message));
        if let Some(output) = &failure.output {
            body.push_str(&format!("\n--- stdout ---\n{}\n", output.stdout));
            body.push_str(&format!("--- stderr ---\n{}\n", output.stderr));
        }
        body.push_str("\n--- environment ---\n");
        body.push_str(&format!(
            "os: {} ({})\n",
            std::env::consts::OS,
            std::env::consts::ARCH
        ));
        if let Ok(cwd) = std::env::current_dir() {
            body.push_str(&format!("cwd: {}\n", cwd.display()));
        }

        if let Err(e) = fs::create_dir_all(out_dir) {
            warn!(zone = %zone_name, error = %e, "could not create directory for error log");
            return;
        }
        let path = out_dir.join(format!("error_{zone_name}.log"));
        if let Err(e) = fs::write(&path, body) {
            warn!(zone = %zone_name, error = %e, "could not write error log");
        }
    }
}

impl ClientStage for PythonStage {
    fn kind(&self) -> &'static str {
        "python"
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
                    "✅ Python client generated for zone '{}' ({files} files)",
                    zone.name
                );
                GenerationResult::ok(&zone.name, out_dir, files)
            }
            Err(failure) => {
                self.write_error_log(&zone.name, &out_dir, &failure);
                warn!(zone = %zone.name, error = %failure.message, "python generation failed");
                println!(
                    "❌ Python generation failed for zone '{}': {}",
                    zone.name, failure.message
                );
                GenerationResult::failed(&zone.name, out_dir, failure.message)
            }
        }
    }
}
