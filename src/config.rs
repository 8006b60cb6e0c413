//! # Generation Configuration
//!
//! Explicit configuration for the whole pipeline, loaded from a TOML file
//! (`zonegen.toml` by default) that sits in the project root.
//!
//! There is deliberately no global accessor: a [`GenerationConfig`] is
//! constructed once at process start and injected into
//! [`crate::orchestrator::Orchestrator::new`], so parallel test runs can
//! each carry their own configuration.
//!
//! ## Environment overrides
//!
//! - `ZONEGEN_MULTITHREADING`: `1`/`true` or `0`/`false`
//! - `ZONEGEN_MAX_WORKERS`: worker cap for parallel stages
//!
//! Unparseable values are logged and ignored.

use crate::zone::ZoneConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default configuration file name, resolved relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "zonegen.toml";

/// Three-state enablement for a client generator.
///
/// `Default` exists so callers can distinguish "explicitly requested" and
/// "explicitly refused" from "nothing said"; it resolves to enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientToggle {
    /// Explicitly requested.
    Enabled,
    /// Explicitly refused.
    Disabled,
    /// Nothing said either way; resolves to enabled.
    #[default]
    Default,
}

impl ClientToggle {
    /// Parse a toggle from string, case-insensitive.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "enabled" => Some(Self::Enabled),
            "disabled" => Some(Self::Disabled),
            "default" => Some(Self::Default),
            _ => None,
        }
    }

    /// Map a pair of explicit CLI flags onto the toggle.
    ///
    /// `enable` wins over nothing, `disable` wins over nothing; both unset
    /// leaves the configured value untouched (`None`).
    pub fn from_flags(enable: bool, disable: bool) -> Option<Self> {
        match (enable, disable) {
            (true, _) => Some(Self::Enabled),
            (_, true) => Some(Self::Disabled),
            (false, false) => None,
        }
    }

    /// Resolve the three states to a concrete on/off decision.
    pub fn resolve(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Output tree layout under a single base directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root of the persisted layout.
    pub base_dir: PathBuf,
    /// Schema files, one per zone.
    pub schemas_dir: String,
    /// Generated clients, split per client type then per zone.
    pub clients_dir: String,
    /// Run-scoped scratch space (routing tables, archive staging).
    pub temp_dir: String,
    /// Timestamped and `latest/` archives.
    pub archive_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("openapi"),
            schemas_dir: "schemas".to_string(),
            clients_dir: "clients".to_string(),
            temp_dir: "temp".to_string(),
            archive_dir: "archive".to_string(),
        }
    }
}

impl OutputConfig {
    /// `<base>/schemas`
    pub fn schemas_path(&self) -> PathBuf {
        self.base_dir.join(&self.schemas_dir)
    }

    /// `<base>/clients`
    pub fn clients_path(&self) -> PathBuf {
        self.base_dir.join(&self.clients_dir)
    }

    /// `<base>/clients/typescript`
    pub fn typescript_clients_path(&self) -> PathBuf {
        self.clients_path().join("typescript")
    }

    /// `<base>/clients/python`
    pub fn python_clients_path(&self) -> PathBuf {
        self.clients_path().join("python")
    }

    /// `<base>/temp`
    pub fn temp_path(&self) -> PathBuf {
        self.base_dir.join(&self.temp_dir)
    }

    /// `<base>/temp/routing`, where routing tables are materialized.
    pub fn routing_path(&self) -> PathBuf {
        self.temp_path().join("routing")
    }

    /// `<base>/archive`
    pub fn archive_path(&self) -> PathBuf {
        self.base_dir.join(&self.archive_dir)
    }
}

/// Parallelism knobs shared by every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultithreadingConfig {
    /// Master switch; `false` forces the sequential path everywhere.
    pub enabled: bool,
    /// Upper bound on workers per stage pool.
    pub max_workers: usize,
}

impl Default for MultithreadingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_workers: 20,
        }
    }
}

/// External schema-extraction tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaToolConfig {
    /// Base argv; the stage appends `--file`, `--api-version`, `--urlconf`.
    pub command: Vec<String>,
    /// Per-invocation timeout.
    pub timeout_secs: u64,
}

impl Default for SchemaToolConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "python".to_string(),
                "manage.py".to_string(),
                "spectacular".to_string(),
            ],
            timeout_secs: 60,
        }
    }
}

/// TypeScript client generator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeScriptConfig {
    pub enabled: ClientToggle,
    /// Base argv; the stage appends `-i <schema>` and `-o <dir>`.
    pub command: Vec<String>,
    pub timeout_secs: u64,
    /// npm scope used for per-zone package manifests, e.g. `@api`.
    pub package_scope: String,
}

impl Default for TypeScriptConfig {
    fn default() -> Self {
        Self {
            enabled: ClientToggle::Default,
            command: vec!["npx".to_string(), "@hey-api/openapi-ts".to_string()],
            timeout_secs: 120,
            package_scope: "@api".to_string(),
        }
    }
}

/// Python client generator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PythonConfig {
    pub enabled: ClientToggle,
    /// Base argv; the stage appends `--input`, `--input-file-type`, `--output`.
    pub command: Vec<String>,
    pub timeout_secs: u64,
    /// `{zone}` is replaced with the zone name, e.g. `api_client_{zone}`.
    pub project_name_template: String,
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            enabled: ClientToggle::Default,
            command: vec!["datamodel-codegen".to_string()],
            timeout_secs: 120,
            project_name_template: "api_client_{zone}".to_string(),
        }
    }
}

/// Both client generators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorsConfig {
    pub typescript: TypeScriptConfig,
    pub python: PythonConfig,
}

/// External monorepo integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonorepoConfig {
    pub enabled: bool,
    /// Root of the external repository. Never owned by this tool.
    pub path: PathBuf,
    /// API package directory relative to `path`.
    pub api_package_path: String,
    /// npm scope for rewritten workspace manifests.
    pub package_scope: String,
    /// Build command run in the API package directory; failures are warnings.
    pub build_command: Vec<String>,
    pub build_timeout_secs: u64,
}

impl Default for MonorepoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::new(),
            api_package_path: "packages/api".to_string(),
            package_scope: "@api".to_string(),
            build_command: vec!["pnpm".to_string(), "build".to_string()],
            build_timeout_secs: 300,
        }
    }
}

/// Where the CLI finds URL patterns for apps.
///
/// Library embedders implement [`crate::routing::RouteSource`] directly;
/// the binary reads a routing manifest file instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// YAML manifest mapping app identifiers to their URL patterns.
    pub manifest: Option<PathBuf>,
}

/// Top-level configuration, injected into the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub output: OutputConfig,
    pub multithreading: MultithreadingConfig,
    pub schema_tool: SchemaToolConfig,
    pub generators: GeneratorsConfig,
    pub monorepo: MonorepoConfig,
    pub routing: RoutingConfig,
    /// Zone definitions keyed by zone name.
    pub zones: BTreeMap<String, ZoneConfig>,
}

impl GenerationConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns `Ok(Some(config))` if the file exists and parses,
    /// `Ok(None)` if it doesn't exist (not an error),
    /// `Err` if it exists but fails to parse.
    pub fn from_file(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(Some(config))
    }

    /// Resolve configuration for the CLI.
    ///
    /// An explicitly given path must exist; the default path may be absent,
    /// in which case built-in defaults apply.
    pub fn load_or_default(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path)?
                .with_context(|| format!("Config file not found: {}", path.display())),
            None => Ok(Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?.unwrap_or_default()),
        }
    }

    /// Apply environment overrides on top of the file values.
    pub fn apply_env(&mut self) {
        if let Ok(raw) = std::env::var("ZONEGEN_MULTITHREADING") {
            match parse_bool(&raw) {
                Some(enabled) => self.multithreading.enabled = enabled,
                None => warn!(value = %raw, "ignoring unparseable ZONEGEN_MULTITHREADING"),
            }
        }

        if let Ok(raw) = std::env::var("ZONEGEN_MAX_WORKERS") {
            match raw.parse::<usize>() {
                Ok(n) if n > 0 => self.multithreading.max_workers = n,
                _ => warn!(value = %raw, "ignoring unparseable ZONEGEN_MAX_WORKERS"),
            }
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_toggle_from_str() {
        assert_eq!(ClientToggle::from_str("enabled"), Some(ClientToggle::Enabled));
        assert_eq!(ClientToggle::from_str("Enabled"), Some(ClientToggle::Enabled));
        assert_eq!(
            ClientToggle::from_str("DISABLED"),
            Some(ClientToggle::Disabled)
        );
        assert_eq!(ClientToggle::from_str("default"), Some(ClientToggle::Default));
        assert_eq!(ClientToggle::from_str("maybe"), None);
    }

    #[test]
    fn test_client_toggle_resolve() {
        assert!(ClientToggle::Enabled.resolve());
        assert!(ClientToggle::Default.resolve());
        assert!(!ClientToggle::Disabled.resolve());
    }

    #[test]
    fn test_client_toggle_from_flags() {
        assert_eq!(
            ClientToggle::from_flags(true, false),
            Some(ClientToggle::Enabled)
        );
        assert_eq!(
            ClientToggle::from_flags(false, true),
            Some(ClientToggle::Disabled)
        );
        assert_eq!(ClientToggle::from_flags(false, false), None);
    }

    #[test]
    fn test_defaults() {
        let config = GenerationConfig::default();
        assert_eq!(config.output.base_dir, PathBuf::from("openapi"));
        assert!(config.multithreading.enabled);
        assert_eq!(config.multithreading.max_workers, 20);
        assert_eq!(config.schema_tool.timeout_secs, 60);
        assert_eq!(config.generators.typescript.timeout_secs, 120);
        assert_eq!(
            config.generators.python.project_name_template,
            "api_client_{zone}"
        );
        assert!(!config.monorepo.enabled);
        assert_eq!(config.monorepo.api_package_path, "packages/api");
        assert!(config.zones.is_empty());
    }

    #[test]
    fn test_output_paths() {
        let output = OutputConfig::default();
        assert_eq!(output.schemas_path(), PathBuf::from("openapi/schemas"));
        assert_eq!(
            output.typescript_clients_path(),
            PathBuf::from("openapi/clients/typescript")
        );
        assert_eq!(
            output.python_clients_path(),
            PathBuf::from("openapi/clients/python")
        );
        assert_eq!(output.routing_path(), PathBuf::from("openapi/temp/routing"));
        assert_eq!(output.archive_path(), PathBuf::from("openapi/archive"));
    }

    #[test]
    fn test_parse_toml() {
        let raw = r#"
            [output]
            base_dir = "build/openapi"

            [multithreading]
            enabled = false
            max_workers = 4

            [generators.typescript]
            enabled = "disabled"
            package_scope = "@acme"

            [zones.public]
            apps = ["accounts", "billing"]
            title = "Public API"

            [zones.internal]
            apps = ["ops"]
            auth_required = true
        "#;

        let config: GenerationConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.output.base_dir, PathBuf::from("build/openapi"));
        assert!(!config.multithreading.enabled);
        assert_eq!(config.multithreading.max_workers, 4);
        assert_eq!(config.generators.typescript.enabled, ClientToggle::Disabled);
        assert_eq!(config.generators.typescript.package_scope, "@acme");
        // Untouched sections keep their defaults.
        assert_eq!(config.generators.python.enabled, ClientToggle::Default);
        assert_eq!(config.zones.len(), 2);
        assert_eq!(
            config.zones["public"].apps,
            vec!["accounts".to_string(), "billing".to_string()]
        );
        assert_eq!(config.zones["internal"].auth_required, Some(true));
    }

    #[test]
    fn test_parse_bool_values() {
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool(" Yes "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("sometimes"), None);
    }
}
