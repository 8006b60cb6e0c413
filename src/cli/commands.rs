use crate::config::{ClientToggle, GenerationConfig};
use crate::orchestrator::{Orchestrator, Status};
use crate::process::SystemRunner;
use crate::routing::{RouteManifest, RouteSource};
use crate::zone::AppProbe;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Command-line interface for zonegen
///
/// Maps the orchestrator's operations onto non-interactive subcommands;
/// all pipeline behavior lives in the library.
#[derive(Parser)]
#[command(name = "zonegen")]
#[command(version)]
#[command(about = "Zone-partitioned OpenAPI schema and client generation", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available zonegen commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline: schemas, clients, archives, monorepo sync
    Generate {
        /// Zones to generate (comma-separated or repeated); all zones when omitted
        #[arg(long, num_args = 1.., value_delimiter = ',')]
        zones: Option<Vec<String>>,

        /// Skip archiving the generated clients
        #[arg(long, default_value_t = false)]
        no_archive: bool,

        /// Force TypeScript client generation on
        #[arg(long, conflicts_with = "no_typescript", default_value_t = false)]
        typescript: bool,

        /// Force TypeScript client generation off
        #[arg(long, default_value_t = false)]
        no_typescript: bool,

        /// Force Python client generation on
        #[arg(long, conflicts_with = "no_python", default_value_t = false)]
        python: bool,

        /// Force Python client generation off
        #[arg(long, default_value_t = false)]
        no_python: bool,

        /// Path to the configuration file (default: zonegen.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the configured output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate OpenAPI schemas only, no clients
    Schemas {
        /// Zones to generate (comma-separated or repeated); all zones when omitted
        #[arg(long, num_args = 1.., value_delimiter = ',')]
        zones: Option<Vec<String>>,

        /// Path to the configuration file (default: zonegen.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show configured zones, client toggles and archive counts
    Status {
        /// Path to the configuration file (default: zonegen.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Check zones, output directory and external tools
    Validate {
        /// Path to the configuration file (default: zonegen.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Empty the output directory, keeping .gitkeep and README.md
    Clean {
        /// Path to the configuration file (default: zonegen.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List the archives currently on disk
    Archives {
        /// Path to the configuration file (default: zonegen.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Remove dated archives older than the retention window
    CleanArchives {
        /// Keep archives newer than this many days
        #[arg(long, default_value_t = 30)]
        keep_days: u32,

        /// Path to the configuration file (default: zonegen.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Parse the command line and run the selected command.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration file cannot be read or parsed
/// - Zone validation fails (duplicate apps, duplicate prefixes, ...)
/// - The selected command reports failure (failed generations,
///   environment validation, archive retention errors)
pub fn run_cli() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match &cli.command {
        Commands::Generate {
            zones,
            no_archive,
            typescript,
            no_typescript,
            python,
            no_python,
            config,
            output,
        } => {
            let mut config = load_config(config.as_deref(), output.as_deref())?;
            if let Some(toggle) = ClientToggle::from_flags(*typescript, *no_typescript) {
                config.generators.typescript.enabled = toggle;
            }
            if let Some(toggle) = ClientToggle::from_flags(*python, *no_python) {
                config.generators.python.enabled = toggle;
            }

            let orchestrator = build_orchestrator(config)?;
            let summary = orchestrator.generate_all(zones.as_deref(), !*no_archive)?;
            if summary.all_succeeded() {
                Ok(())
            } else {
                let failures = summary.failed_typescript + summary.failed_python;
                Err(format!("{failures} client generation(s) failed").into())
            }
        }
        Commands::Schemas { zones, config } => {
            let config = load_config(config.as_deref(), None)?;
            let orchestrator = build_orchestrator(config)?;
            let schemas = orchestrator.generate_schemas(zones.as_deref())?;
            println!("Generated {} schema(s)", schemas.len());
            for (zone, path) in &schemas {
                println!("  {zone}: {}", path.display());
            }
            Ok(())
        }
        Commands::Status { config } => {
            let config = load_config(config.as_deref(), None)?;
            let orchestrator = build_orchestrator(config)?;
            print_status(&orchestrator.get_status());
            Ok(())
        }
        Commands::Validate { config } => {
            let config = load_config(config.as_deref(), None)?;
            let orchestrator = build_orchestrator(config)?;
            if orchestrator.validate_environment() {
                println!("✅ Environment is ready");
                Ok(())
            } else {
                Err("environment validation failed".into())
            }
        }
        Commands::Clean { config } => {
            let config = load_config(config.as_deref(), None)?;
            let orchestrator = build_orchestrator(config)?;
            orchestrator.clean_output()?;
            Ok(())
        }
        Commands::Archives { config } => {
            let config = load_config(config.as_deref(), None)?;
            let orchestrator = build_orchestrator(config)?;
            let entries = orchestrator.list_archives();
            if entries.is_empty() {
                println!("No archives found");
                return Ok(());
            }
            for entry in &entries {
                let marker = if entry.latest {
                    "latest".to_string()
                } else {
                    entry.timestamp.clone().unwrap_or_else(|| "-".to_string())
                };
                match &entry.metadata {
                    Some(meta) => println!(
                        "  [{marker}] {}: {} file(s), {:.2} MB",
                        entry.zone, meta.total_files, meta.total_size_mb
                    ),
                    None => println!(
                        "  [{marker}] {}: {} byte(s), no metadata",
                        entry.zone, entry.size_bytes
                    ),
                }
            }
            Ok(())
        }
        Commands::CleanArchives { keep_days, config } => {
            let config = load_config(config.as_deref(), None)?;
            let orchestrator = build_orchestrator(config)?;
            let removed = orchestrator.clean_old_archives(*keep_days)?;
            println!(
                "✅ Removed {removed} archive director{} older than {keep_days} day(s)",
                if removed == 1 { "y" } else { "ies" }
            );
            Ok(())
        }
    }
}

/// File config + environment overrides + CLI output override.
fn load_config(
    explicit: Option<&Path>,
    output_override: Option<&Path>,
) -> anyhow::Result<GenerationConfig> {
    let mut config = GenerationConfig::load_or_default(explicit)?;
    config.apply_env();
    if let Some(dir) = output_override {
        config.output.base_dir = dir.to_path_buf();
    }
    Ok(config)
}

/// Wire the orchestrator for CLI use: the routing manifest file doubles
/// as route source and app probe, and tools run through the real
/// process runner.
fn build_orchestrator(config: GenerationConfig) -> anyhow::Result<Orchestrator> {
    let manifest = match &config.routing.manifest {
        Some(path) => RouteManifest::from_file(path)?,
        None => {
            warn!("no routing manifest configured; zones cannot resolve URL patterns");
            RouteManifest::new()
        }
    };
    let manifest = Arc::new(manifest);
    let orchestrator = Orchestrator::new(
        config,
        Arc::clone(&manifest) as Arc<dyn RouteSource>,
        manifest as Arc<dyn AppProbe>,
        Arc::new(SystemRunner),
    )?;
    Ok(orchestrator)
}

fn print_status(status: &Status) {
    println!("Zones detected: {}", status.zones_detected);
    for name in &status.zone_names {
        println!("  - {name}");
    }
    println!("Output directory: {}", status.output_dir.display());
    println!(
        "TypeScript clients: {}",
        if status.typescript_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "Python clients: {}",
        if status.python_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    match status.monorepo_path_exists {
        Some(true) => println!("Monorepo sync: enabled"),
        Some(false) => println!("Monorepo sync: enabled (path missing!)"),
        None => println!("Monorepo sync: disabled"),
    }
    println!(
        "Multithreading: {} (max {} workers)",
        if status.multithreading.enabled {
            "enabled"
        } else {
            "disabled"
        },
        status.multithreading.max_workers
    );
    println!("Archives on disk: {}", status.archives);
}
