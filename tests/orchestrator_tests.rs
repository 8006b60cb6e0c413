#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::fixtures::{two_zone_config, two_zone_manifest};
use common::mock_tools::{arg_value, MockRunner};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use zonegen::config::{ClientToggle, GenerationConfig};
use zonegen::error::ConfigError;
use zonegen::orchestrator::Orchestrator;
use zonegen::process::ProcessOutput;
use zonegen::routing::RouteSource;
use zonegen::zone::{AppProbe, ZoneConfig};

/// A runner that plays all three external tools: the schema extractor
/// (`--file`), the TypeScript generator (`-o`, three files) and the
/// Python generator (`--output`, two files).
fn pipeline_runner() -> Arc<MockRunner> {
    MockRunner::with(|spec| {
        if let Some(out) = arg_value(spec, "--file") {
            fs::write(out, "openapi: 3.1.0\n").unwrap();
        } else if let Some(out) = arg_value(spec, "-o") {
            let dir = PathBuf::from(out);
            for name in ["types.gen.ts", "sdk.gen.ts", "client.gen.ts"] {
                fs::write(dir.join(name), "export {};\n").unwrap();
            }
        } else if let Some(models) = arg_value(spec, "--output") {
            let models = PathBuf::from(models);
            fs::create_dir_all(models.parent().unwrap()).unwrap();
            fs::write(&models, "class Model: ...\n").unwrap();
            fs::write(models.parent().unwrap().join("__init__.py"), "").unwrap();
        }
        Ok(ProcessOutput::ok())
    })
}

fn orchestrator(config: GenerationConfig, runner: Arc<MockRunner>) -> Orchestrator {
    let manifest = Arc::new(two_zone_manifest());
    Orchestrator::new(
        config,
        Arc::clone(&manifest) as Arc<dyn RouteSource>,
        manifest as Arc<dyn AppProbe>,
        runner,
    )
    .unwrap()
}

/// Test full-pipeline accounting over two zones: per-zone results,
/// summary totals, the consolidated index and the archives
#[test]
fn test_full_pipeline_accounting() {
    let dir = TempDir::new().unwrap();
    let config = two_zone_config(dir.path());
    let orch = orchestrator(config, pipeline_runner());

    let summary = orch.generate_all(None, true).unwrap();

    assert_eq!(summary.total_zones, 2);
    assert_eq!(summary.successful_typescript, 2);
    assert_eq!(summary.failed_typescript, 0);
    assert_eq!(summary.successful_python, 2);
    assert_eq!(summary.failed_python, 0);
    // 3 TypeScript + 2 Python tool files per zone; auxiliaries excluded.
    assert_eq!(summary.total_files_generated, 10);
    assert!(summary.all_succeeded());
    assert!(summary.typescript_results["billing"].success);
    assert!(summary.python_results["public"].success);

    let index = fs::read_to_string(
        dir.path()
            .join("clients")
            .join("typescript")
            .join("index.ts"),
    )
    .unwrap();
    assert!(index.contains("export * as billing"));
    assert!(index.contains("export * as public"));

    let latest = dir.path().join("archive").join("latest");
    assert!(latest.join("billing.tar.gz").is_file());
    assert!(latest.join("public.tar.gz").is_file());
}

/// Test that selecting only unknown zones yields an empty successful
/// summary without touching any tool
#[test]
fn test_unknown_zone_selection_is_empty_success() {
    let dir = TempDir::new().unwrap();
    let config = two_zone_config(dir.path());
    let runner = pipeline_runner();
    let orch = orchestrator(config, Arc::clone(&runner));

    let summary = orch
        .generate_all(Some(&["nonexistent".to_string()]), true)
        .unwrap();

    assert_eq!(summary.total_zones, 0);
    assert!(summary.typescript_results.is_empty());
    assert!(summary.python_results.is_empty());
    assert!(summary.all_succeeded());
    assert!(runner.calls().is_empty());
}

/// Test that one zone losing its schema removes only that zone from the
/// client stages and the archives
#[test]
fn test_schema_failure_drops_zone_clients() {
    let dir = TempDir::new().unwrap();
    let config = two_zone_config(dir.path());

    let runner = MockRunner::with(|spec| {
        if let Some(out) = arg_value(spec, "--file") {
            if out.contains("billing") {
                return Ok(ProcessOutput::failed("ImproperlyConfigured"));
            }
            fs::write(out, "openapi: 3.1.0\n").unwrap();
        } else if let Some(out) = arg_value(spec, "-o") {
            fs::write(PathBuf::from(out).join("types.gen.ts"), "export {};\n").unwrap();
        } else if let Some(models) = arg_value(spec, "--output") {
            let models = PathBuf::from(models);
            fs::create_dir_all(models.parent().unwrap()).unwrap();
            fs::write(&models, "class Model: ...\n").unwrap();
        }
        Ok(ProcessOutput::ok())
    });
    let orch = orchestrator(config, runner);

    let summary = orch.generate_all(None, true).unwrap();

    assert_eq!(summary.total_zones, 2);
    assert_eq!(summary.successful_typescript, 1);
    assert_eq!(summary.successful_python, 1);
    assert!(!summary.typescript_results.contains_key("billing"));
    assert!(!summary.python_results.contains_key("billing"));
    assert!(summary.typescript_results["public"].success);

    let latest = dir.path().join("archive").join("latest");
    assert!(latest.join("public.tar.gz").is_file());
    assert!(!latest.join("billing.tar.gz").exists());
}

/// Test that parallel and sequential pipeline runs agree on the summary
#[test]
fn test_parallel_pipeline_matches_sequential() {
    let run = |parallel: bool| {
        let dir = TempDir::new().unwrap();
        let mut config = two_zone_config(dir.path());
        config.multithreading.enabled = parallel;
        let orch = orchestrator(config, pipeline_runner());
        let summary = orch.generate_all(None, false).unwrap();
        (
            summary.total_zones,
            summary.successful_typescript,
            summary.successful_python,
            summary.total_files_generated,
        )
    };

    assert_eq!(run(false), run(true));
}

/// Test that an app claimed by two zones fails orchestrator construction
#[test]
fn test_duplicate_apps_rejected_at_construction() {
    let dir = TempDir::new().unwrap();
    let mut config = two_zone_config(dir.path());
    config
        .zones
        .insert("extra".to_string(), ZoneConfig::with_apps(["storefront"]));

    let manifest = Arc::new(two_zone_manifest());
    let err = Orchestrator::new(
        config,
        Arc::clone(&manifest) as Arc<dyn RouteSource>,
        manifest as Arc<dyn AppProbe>,
        MockRunner::ok(),
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateApps { .. }));
}

/// Test that running without any configured zones is an error, not an
/// empty success
#[test]
fn test_no_zones_is_an_error() {
    let dir = TempDir::new().unwrap();
    let mut config = GenerationConfig::default();
    config.output.base_dir = dir.path().to_path_buf();
    let orch = orchestrator(config, MockRunner::ok());

    assert!(orch.generate_all(None, true).is_err());
    assert!(orch.generate_schemas(None).is_err());
}

/// Test that the schema-only operation runs no client tools
#[test]
fn test_generate_schemas_only() {
    let dir = TempDir::new().unwrap();
    let config = two_zone_config(dir.path());
    let runner = pipeline_runner();
    let orch = orchestrator(config, Arc::clone(&runner));

    let schemas = orch.generate_schemas(None).unwrap();
    assert_eq!(schemas.len(), 2);
    assert!(schemas["billing"].is_file());

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.program == "python"));
}

/// Test the status snapshot fields
#[test]
fn test_status_reflects_configuration() {
    let dir = TempDir::new().unwrap();
    let mut config = two_zone_config(dir.path());
    config.generators.python.enabled = ClientToggle::Disabled;
    let orch = orchestrator(config, MockRunner::ok());

    let status = orch.get_status();
    assert_eq!(status.zones_detected, 2);
    assert_eq!(status.zone_names, vec!["billing", "public"]);
    assert_eq!(status.output_dir, dir.path());
    assert!(status.typescript_enabled);
    assert!(!status.python_enabled);
    assert!(!status.monorepo_enabled);
    assert_eq!(status.monorepo_path_exists, None);
    assert_eq!(status.archives, 0);
}

/// Test environment validation with every tool present
#[test]
fn test_validate_environment_ready() {
    let dir = TempDir::new().unwrap();
    let config = two_zone_config(dir.path());
    let orch = orchestrator(config, MockRunner::ok());
    assert!(orch.validate_environment());
}

/// Test that a missing schema tool always fails validation
#[test]
fn test_validate_environment_missing_schema_tool() {
    let dir = TempDir::new().unwrap();
    let config = two_zone_config(dir.path());
    let runner = MockRunner::with(|spec| {
        if spec.program == "python" {
            Ok(ProcessOutput::failed("command not found"))
        } else {
            Ok(ProcessOutput::ok())
        }
    });
    let orch = orchestrator(config, runner);
    assert!(!orch.validate_environment());
}

/// Test that a missing client tool is tolerated while that client is
/// disabled, and fatal once it is enabled
#[test]
fn test_validate_environment_client_tool_rules() {
    let dir = TempDir::new().unwrap();
    let runner_factory = || {
        MockRunner::with(|spec| {
            if spec.program == "npx" {
                Ok(ProcessOutput::failed("not found"))
            } else {
                Ok(ProcessOutput::ok())
            }
        })
    };

    let mut config = two_zone_config(dir.path());
    config.generators.typescript.enabled = ClientToggle::Disabled;
    let orch = orchestrator(config, runner_factory());
    assert!(orch.validate_environment());

    let config = two_zone_config(dir.path());
    let orch = orchestrator(config, runner_factory());
    assert!(!orch.validate_environment());
}

/// Test that a zone whose apps are not installed fails validation
#[test]
fn test_validate_environment_missing_apps() {
    let dir = TempDir::new().unwrap();
    let mut config = two_zone_config(dir.path());
    config
        .zones
        .insert("ghost".to_string(), ZoneConfig::with_apps(["not_installed"]));
    let orch = orchestrator(config, MockRunner::ok());
    assert!(!orch.validate_environment());
}

/// Test that cleaning the output tree spares the repository markers
#[test]
fn test_clean_output_preserves_markers() {
    let dir = TempDir::new().unwrap();
    let mut config = GenerationConfig::default();
    config.output.base_dir = dir.path().join("openapi");
    config
        .zones
        .insert("public".to_string(), ZoneConfig::with_apps(["storefront"]));
    let base = config.output.base_dir.clone();
    fs::create_dir_all(base.join("schemas")).unwrap();
    fs::write(base.join("schemas").join("public.yaml"), "openapi").unwrap();
    fs::write(base.join(".gitkeep"), "").unwrap();
    fs::write(base.join("README.md"), "# generated output\n").unwrap();

    let orch = orchestrator(config, MockRunner::ok());
    assert!(orch.clean_output().unwrap());

    assert!(base.join(".gitkeep").is_file());
    assert!(base.join("README.md").is_file());
    assert!(!base.join("schemas").exists());
}

/// Test that archiving can be switched off per run
#[test]
fn test_no_archive_flag_skips_archives() {
    let dir = TempDir::new().unwrap();
    let config = two_zone_config(dir.path());
    let orch = orchestrator(config, pipeline_runner());

    let summary = orch.generate_all(None, false).unwrap();
    assert!(summary.all_succeeded());
    assert!(!dir.path().join("archive").exists());
}
