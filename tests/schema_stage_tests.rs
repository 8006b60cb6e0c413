#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::fixtures::{two_zone_config, two_zone_manifest};
use common::mock_tools::{arg_value, MockRunner};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use zonegen::config::MultithreadingConfig;
use zonegen::process::{ProcessOutput, ToolRunner};
use zonegen::routing::RouteSynthesizer;
use zonegen::schema::SchemaStage;
use zonegen::zone::ZoneRegistry;

fn sequential() -> MultithreadingConfig {
    MultithreadingConfig {
        enabled: false,
        max_workers: 1,
    }
}

fn parallel(workers: usize) -> MultithreadingConfig {
    MultithreadingConfig {
        enabled: true,
        max_workers: workers,
    }
}

/// A runner that plays the schema tool: writes `content` to the path
/// given via `--file` and reports success.
fn schema_tool_writing(content: &'static str) -> Arc<MockRunner> {
    MockRunner::with(move |spec| {
        if let Some(out) = arg_value(spec, "--file") {
            fs::write(out, content).unwrap();
        }
        Ok(ProcessOutput::ok())
    })
}

/// Test that the extractor is invoked with the configured base command
/// plus the per-zone file, version and namespace arguments
#[test]
fn test_schema_tool_invocation_contract() {
    let dir = TempDir::new().unwrap();
    let config = two_zone_config(dir.path());
    let manifest = two_zone_manifest();
    let registry = ZoneRegistry::build(&config.zones).unwrap();

    let runner = schema_tool_writing("openapi: 3.1.0\n");
    let stage = SchemaStage::new(
        &config.schema_tool,
        &config.output,
        Arc::clone(&runner) as Arc<dyn ToolRunner>,
    );
    let synthesizer = RouteSynthesizer::new(&manifest);

    let jobs = stage.prepare(&registry.select(None), &synthesizer);
    assert_eq!(jobs.len(), 2);
    let schemas = stage.generate(jobs, &sequential());
    assert_eq!(schemas.len(), 2);

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    // BTreeMap order puts billing before public.
    let billing = &calls[0];
    assert_eq!(
        arg_value(billing, "--file").unwrap(),
        dir.path()
            .join("schemas")
            .join("billing.yaml")
            .to_string_lossy()
    );
    assert_eq!(arg_value(billing, "--api-version").unwrap(), "v1");
    assert_eq!(
        arg_value(billing, "--urlconf").unwrap(),
        "zonegen_urls_billing"
    );
}

/// Test that each prepared zone gets its own routing table on disk with
/// only its own apps' patterns in it
#[test]
fn test_prepared_namespaces_are_isolated() {
    let dir = TempDir::new().unwrap();
    let config = two_zone_config(dir.path());
    let manifest = two_zone_manifest();
    let registry = ZoneRegistry::build(&config.zones).unwrap();

    let stage = SchemaStage::new(&config.schema_tool, &config.output, MockRunner::ok());
    let synthesizer = RouteSynthesizer::new(&manifest);
    let jobs = stage.prepare(&registry.select(None), &synthesizer);

    let ids: Vec<&str> = jobs.iter().map(|j| j.namespace_id.as_str()).collect();
    assert_eq!(ids, vec!["zonegen_urls_billing", "zonegen_urls_public"]);

    let routing_dir = dir.path().join("temp").join("routing");
    let billing_table =
        fs::read_to_string(routing_dir.join("zonegen_urls_billing.yaml")).unwrap();
    let public_table =
        fs::read_to_string(routing_dir.join("zonegen_urls_public.yaml")).unwrap();

    assert!(billing_table.contains("api/invoices/"));
    assert!(billing_table.contains("api/payments/"));
    assert!(!billing_table.contains("api/items/"));

    assert!(public_table.contains("api/items/"));
    assert!(!public_table.contains("api/invoices/"));
}

/// Test that a tool run exiting zero without writing the output file is
/// treated as a failure for that zone only
#[test]
fn test_exit_zero_without_output_file_fails_zone() {
    let dir = TempDir::new().unwrap();
    let config = two_zone_config(dir.path());
    let manifest = two_zone_manifest();
    let registry = ZoneRegistry::build(&config.zones).unwrap();

    // Succeed for public, silently produce nothing for billing.
    let runner = MockRunner::with(|spec| {
        if let Some(out) = arg_value(spec, "--file") {
            if !out.contains("billing") {
                fs::write(out, "openapi: 3.1.0\n").unwrap();
            }
        }
        Ok(ProcessOutput::ok())
    });
    let stage = SchemaStage::new(&config.schema_tool, &config.output, runner);
    let synthesizer = RouteSynthesizer::new(&manifest);

    let jobs = stage.prepare(&registry.select(None), &synthesizer);
    let schemas = stage.generate(jobs, &sequential());

    assert_eq!(schemas.len(), 1);
    assert!(schemas.contains_key("public"));
    assert!(!schemas.contains_key("billing"));
}

/// Test that an empty output file is rejected even on exit zero
#[test]
fn test_empty_output_file_fails_zone() {
    let dir = TempDir::new().unwrap();
    let config = two_zone_config(dir.path());
    let manifest = two_zone_manifest();
    let registry = ZoneRegistry::build(&config.zones).unwrap();

    let runner = schema_tool_writing("");
    let stage = SchemaStage::new(&config.schema_tool, &config.output, runner);
    let synthesizer = RouteSynthesizer::new(&manifest);

    let jobs = stage.prepare(&registry.select(None), &synthesizer);
    let schemas = stage.generate(jobs, &sequential());
    assert!(schemas.is_empty());
}

/// Test that one zone's nonzero exit leaves the other zones' schemas in
/// place
#[test]
fn test_failure_is_isolated_per_zone() {
    let dir = TempDir::new().unwrap();
    let config = two_zone_config(dir.path());
    let manifest = two_zone_manifest();
    let registry = ZoneRegistry::build(&config.zones).unwrap();

    let runner = MockRunner::with(|spec| {
        let out = arg_value(spec, "--file").unwrap();
        if out.contains("billing") {
            Ok(ProcessOutput::failed("ImproperlyConfigured: boom"))
        } else {
            fs::write(out, "openapi: 3.1.0\n").unwrap();
            Ok(ProcessOutput::ok())
        }
    });
    let stage = SchemaStage::new(
        &config.schema_tool,
        &config.output,
        Arc::clone(&runner) as Arc<dyn ToolRunner>,
    );
    let synthesizer = RouteSynthesizer::new(&manifest);

    let jobs = stage.prepare(&registry.select(None), &synthesizer);
    let schemas = stage.generate(jobs, &sequential());

    assert_eq!(schemas.len(), 1);
    assert!(schemas.contains_key("public"));
    // Both zones were still attempted.
    assert_eq!(runner.calls().len(), 2);
}

/// Test that a timed-out tool run fails its zone
#[test]
fn test_timeout_fails_zone() {
    let dir = TempDir::new().unwrap();
    let config = two_zone_config(dir.path());
    let manifest = two_zone_manifest();
    let registry = ZoneRegistry::build(&config.zones).unwrap();

    let runner = MockRunner::with(|_| Ok(ProcessOutput::timeout()));
    let stage = SchemaStage::new(&config.schema_tool, &config.output, runner);
    let synthesizer = RouteSynthesizer::new(&manifest);

    let jobs = stage.prepare(&registry.select(None), &synthesizer);
    let schemas = stage.generate(jobs, &sequential());
    assert!(schemas.is_empty());
}

/// Test that parallel and sequential execution produce the same schema
/// map for the same inputs
#[test]
fn test_parallel_matches_sequential() {
    let run = |mt: &MultithreadingConfig| {
        let dir = TempDir::new().unwrap();
        let config = two_zone_config(dir.path());
        let manifest = two_zone_manifest();
        let registry = ZoneRegistry::build(&config.zones).unwrap();

        let runner = schema_tool_writing("openapi: 3.1.0\n");
        let stage = SchemaStage::new(&config.schema_tool, &config.output, runner);
        let synthesizer = RouteSynthesizer::new(&manifest);
        let jobs = stage.prepare(&registry.select(None), &synthesizer);
        let schemas = stage.generate(jobs, mt);

        // Normalize to relative paths so the two runs compare equal.
        schemas
            .into_iter()
            .map(|(zone, path)| {
                let rel = path.strip_prefix(dir.path()).unwrap().to_path_buf();
                (zone, rel)
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(run(&sequential()), run(&parallel(4)));
}
