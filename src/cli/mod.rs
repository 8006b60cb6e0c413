//! Command-line interface for zonegen
//!
//! This module contains the CLI definitions and command implementations
//! for the zone generation tool. Every subcommand is a thin wrapper over
//! an [`Orchestrator`](crate::orchestrator::Orchestrator) operation, so
//! anything the CLI can do is also available as a library call.
//!
//! # Commands
//!
//! - `generate` - Run the full pipeline: schemas, clients, archives, monorepo sync
//! - `schemas` - Generate OpenAPI schemas only
//! - `status` - Show configured zones, toggles and archive counts
//! - `validate` - Check zones, output directory and external tools
//! - `clean` - Empty the output directory
//! - `archives` - List the archives on disk
//! - `clean-archives` - Apply the archive retention policy
//!
//! # Example
//!
//! ```bash
//! # Generate everything for two zones without archiving
//! zonegen generate --zones public,billing --no-archive
//!
//! # Schemas only, custom config
//! zonegen schemas --config deploy/zonegen.toml
//! ```

mod commands;


pub use commands::{run_cli, Cli, Commands};
