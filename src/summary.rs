//! Tagged per-zone results and the run-level summary.
//!
//! Stages never signal client-tool failure through `Result`; each zone
//! produces a [`GenerationResult`] whose `success` flag and optional
//! `error_message` carry the outcome, and [`GenerationSummary`] folds
//! those into the counts reported at the end of a run.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Outcome of one client-generation attempt for one zone.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub success: bool,
    pub zone_name: String,
    pub output_path: PathBuf,
    pub files_generated: usize,
    pub error_message: Option<String>,
}

impl GenerationResult {
    pub fn ok(zone: impl Into<String>, output_path: impl Into<PathBuf>, files: usize) -> Self {
        Self {
            success: true,
            zone_name: zone.into(),
            output_path: output_path.into(),
            files_generated: files,
            error_message: None,
        }
    }

    pub fn failed(
        zone: impl Into<String>,
        output_path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            zone_name: zone.into(),
            output_path: output_path.into(),
            files_generated: 0,
            error_message: Some(message.into()),
        }
    }
}

/// Aggregate outcome of a full generation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationSummary {
    pub total_zones: usize,
    pub successful_typescript: usize,
    pub failed_typescript: usize,
    pub successful_python: usize,
    pub failed_python: usize,
    pub total_files_generated: usize,
    pub duration_seconds: f64,
    pub typescript_results: BTreeMap<String, GenerationResult>,
    pub python_results: BTreeMap<String, GenerationResult>,
}

impl GenerationSummary {
    pub fn from_results(
        total_zones: usize,
        typescript_results: BTreeMap<String, GenerationResult>,
        python_results: BTreeMap<String, GenerationResult>,
        duration_seconds: f64,
    ) -> Self {
        let successful_typescript = typescript_results.values().filter(|r| r.success).count();
        let failed_typescript = typescript_results.len() - successful_typescript;
        let successful_python = python_results.values().filter(|r| r.success).count();
        let failed_python = python_results.len() - successful_python;
        let total_files_generated = typescript_results
            .values()
            .chain(python_results.values())
            .map(|r| r.files_generated)
            .sum();

        Self {
            total_zones,
            successful_typescript,
            failed_typescript,
            successful_python,
            failed_python,
            total_files_generated,
            duration_seconds,
            typescript_results,
            python_results,
        }
    }

    /// True when nothing failed in either language.
    pub fn all_succeeded(&self) -> bool {
        self.failed_typescript == 0 && self.failed_python == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let mut ts = BTreeMap::new();
        ts.insert("public".to_string(), GenerationResult::ok("public", "/out/public", 4));
        ts.insert(
            "admin".to_string(),
            GenerationResult::failed("admin", "/out/admin", "npx exited with 1"),
        );
        let mut py = BTreeMap::new();
        py.insert("public".to_string(), GenerationResult::ok("public", "/out/py", 5));

        let summary = GenerationSummary::from_results(2, ts, py, 1.5);
        assert_eq!(summary.total_zones, 2);
        assert_eq!(summary.successful_typescript, 1);
        assert_eq!(summary.failed_typescript, 1);
        assert_eq!(summary.successful_python, 1);
        assert_eq!(summary.failed_python, 0);
        assert_eq!(summary.total_files_generated, 9);
        assert!(!summary.all_succeeded());
    }

    #[test]
    fn test_empty_summary() {
        let summary =
            GenerationSummary::from_results(0, BTreeMap::new(), BTreeMap::new(), 0.0);
        assert_eq!(summary.total_files_generated, 0);
        assert!(summary.all_succeeded());
    }
}
