//! # Error Types
//!
//! Typed failure taxonomy for the generation pipeline.
//!
//! The split mirrors how failures propagate:
//!
//! - [`ConfigError`]: registry/configuration validation. Fatal at startup:
//!   no generation work begins after one of these.
//! - [`RouteSourceError`] / [`SynthesisError`]: a zone's routing table could
//!   not be built. Zone-scoped: that zone is skipped, siblings continue.
//! - [`RunnerError`]: an external tool could not be launched at all.
//!   Stages convert these into failed per-zone results; they are never
//!   raised out of a stage. Non-zero exits and timeouts are *not* errors
//!   at this level; see [`crate::process::ProcessOutput`].
//! - [`ArchiveError`]: staging/copy/compress failures, reported per zone.
//! - [`SyncError`]: monorepo copy failures, downgraded to warnings by the
//!   sync stage.
//!
//! Orchestration code wraps filesystem plumbing in `anyhow::Context`; the
//! enums below are the typed seams the library exposes.

use std::path::PathBuf;
use thiserror::Error;

/// Zone registry and configuration validation failures.
///
/// All of these abort the run before any generation starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A single zone's definition is unusable (empty name, no apps, ...).
    #[error("invalid zone `{zone}`: {reason}")]
    InvalidZone { zone: String, reason: String },

    /// The same app identifier is declared by more than one zone.
    #[error("apps declared in more than one zone: {}", apps.join(", "))]
    DuplicateApps { apps: Vec<String> },

    /// Two zones resolved to the same URL path prefix.
    #[error("path prefix `{prefix}` is used by both `{first}` and `{second}`")]
    DuplicatePrefix {
        prefix: String,
        first: String,
        second: String,
    },

    /// The registry has no zones at all.
    #[error("no zones configured")]
    NoZones,
}

/// A collaborator could not supply URL patterns for an app.
#[derive(Debug, Error)]
#[error("failed to load URL patterns for app `{app}`: {reason}")]
pub struct RouteSourceError {
    /// App identifier the lookup was for.
    pub app: String,
    /// Collaborator-supplied reason text.
    pub reason: String,
}

/// A zone's routing table could not be synthesized.
///
/// Always attributed to a single zone; never fatal to other zones.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// One of the zone's apps has no retrievable URL patterns.
    #[error("zone `{zone}`: {source}")]
    PatternsUnavailable {
        zone: String,
        #[source]
        source: RouteSourceError,
    },

    /// The synthesized table could not be written for the schema tool.
    #[error("zone `{zone}`: failed to write routing table to {path}: {source}")]
    Materialize {
        zone: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SynthesisError {
    /// Zone the failure is attributed to.
    pub fn zone(&self) -> &str {
        match self {
            Self::PatternsUnavailable { zone, .. } | Self::Materialize { zone, .. } => zone,
        }
    }
}

/// An external tool invocation could not be carried out.
///
/// Distinct from the tool *failing*: a process that launches, runs and
/// exits non-zero (or times out) yields a `ProcessOutput`, not an error.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The program could not be spawned (missing binary, permissions, ...).
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The child spawned but its status or output could not be collected.
    #[error("failed to collect output of `{program}`: {source}")]
    Capture {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Archive staging, compression, or metadata failures. Zone-scoped.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Neither a TypeScript nor a Python client path was supplied.
    #[error("zone `{zone}`: nothing to archive (no client paths supplied)")]
    NothingToArchive { zone: String },

    /// Filesystem failure while staging or writing archives.
    #[error("zone `{zone}`: {context}: {source}")]
    Io {
        zone: String,
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Archive metadata could not be serialized.
    #[error("zone `{zone}`: failed to encode archive metadata: {source}")]
    Metadata {
        zone: String,
        #[source]
        source: serde_json::Error,
    },

    /// Filesystem failure while pruning dated archive directories.
    #[error("archive retention failed at {path}: {source}")]
    Retention {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    pub(crate) fn io(zone: &str, context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            zone: zone.to_string(),
            context: context.into(),
            source,
        }
    }
}

/// Monorepo sync failures. Recorded per zone, downgraded to warnings.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Filesystem failure while copying a client tree.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The rewritten package manifest could not be serialized.
    #[error("failed to encode package manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl SyncError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
