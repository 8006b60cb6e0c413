//! # Archive Manager
//!
//! Bundles each zone's generated clients into compressed tar archives
//! under the output tree:
//!
//! ```text
//! archive/
//! ├── latest/<zone>.tar.gz                 overwritten every run
//! │         <zone>_metadata.json
//! └── files/<timestamp>/<zone>.tar.gz      append-only history
//!               <zone>_metadata.json
//! ```
//!
//! Staging happens in a run-scoped `temp_<zone>_<timestamp>` directory
//! that is removed unconditionally, success or failure. The archive
//! payload and the metadata counts both exclude `error_*.log`
//! diagnostics.

use crate::clients::is_error_log;
use crate::config::OutputConfig;
use crate::error::ArchiveError;
use chrono::{Days, Local, NaiveDate};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Per-client-type block inside [`ArchiveMetadata`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientArtifact {
    pub available: bool,
    /// Source path the client tree was staged from.
    pub path: Option<String>,
    pub file_count: usize,
    pub size_bytes: u64,
}

/// Metadata written next to each archive as `<zone>_metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    pub zone_name: String,
    /// `%Y%m%d_%H%M%S`, shared with the dated directory name.
    pub timestamp: String,
    /// RFC 3339 wall-clock time of the archive run.
    pub archive_date: String,
    pub generator_version: String,
    pub typescript: ClientArtifact,
    pub python: ClientArtifact,
    pub total_files: usize,
    pub total_size_bytes: u64,
    /// Two-decimal megabytes, for human-facing listings.
    pub total_size_mb: f64,
}

/// Where a successful archive run put its artifacts.
#[derive(Debug, Clone)]
pub struct ArchiveOutcome {
    pub zone: String,
    pub timestamp: String,
    pub timestamped_archive: PathBuf,
    pub latest_archive: PathBuf,
    pub metadata: ArchiveMetadata,
}

/// One archive on disk, merged with its metadata when readable.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveEntry {
    pub zone: String,
    /// Dated directory name; for `latest/` entries, taken from metadata.
    pub timestamp: Option<String>,
    pub latest: bool,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub metadata: Option<ArchiveMetadata>,
}

/// Owns the `archive/` subtree of the output directory.
#[derive(Debug, Clone)]
pub struct ArchiveManager {
    archive_root: PathBuf,
    temp_root: PathBuf,
}

impl ArchiveManager {
    pub fn new(output: &OutputConfig) -> Self {
        Self {
            archive_root: output.archive_path(),
            temp_root: output.temp_path(),
        }
    }

    /// Archive one zone's clients, stamped with the current local time.
    pub fn archive_zone(
        &self,
        zone: &str,
        ts_path: Option<&Path>,
        py_path: Option<&Path>,
    ) -> Result<ArchiveOutcome, ArchiveError> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        self.archive_zone_at(zone, ts_path, py_path, &timestamp)
    }

    /// Archive one zone's clients under an explicit timestamp.
    ///
    /// At least one client path must be supplied and exist on disk.
    /// The staging directory is removed before returning, whatever the
    /// outcome.
    pub fn archive_zone_at(
        &self,
        zone: &str,
        ts_path: Option<&Path>,
        py_path: Option<&Path>,
        timestamp: &str,
    ) -> Result<ArchiveOutcome, ArchiveError> {
        if ts_path.is_none() && py_path.is_none() {
            return Err(ArchiveError::NothingToArchive {
                zone: zone.to_string(),
            });
        }

        let staging = self.temp_root.join(format!("temp_{zone}_{timestamp}"));
        fs::create_dir_all(&staging)
            .map_err(|e| ArchiveError::io(zone, "failed to create staging directory", e))?;

        let result = self.build_archives(zone, ts_path, py_path, timestamp, &staging);

        if staging.exists() {
            if let Err(e) = fs::remove_dir_all(&staging) {
                warn!(zone = %zone, staging = %staging.display(), error = %e, "could not remove staging directory");
            }
        }
        result
    }

    fn build_archives(
        &self,
        zone: &str,
        ts_path: Option<&Path>,
        py_path: Option<&Path>,
        timestamp: &str,
        staging: &Path,
    ) -> Result<ArchiveOutcome, ArchiveError> {
        let typescript = self.stage_client(zone, ts_path, &staging.join("typescript"))?;
        let python = self.stage_client(zone, py_path, &staging.join("python"))?;
        if !typescript.available && !python.available {
            return Err(ArchiveError::NothingToArchive {
                zone: zone.to_string(),
            });
        }

        let dated_dir = self.archive_root.join("files").join(timestamp);
        fs::create_dir_all(&dated_dir)
            .map_err(|e| ArchiveError::io(zone, "failed to create archive directory", e))?;
        let archive_name = format!("{zone}.tar.gz");
        let dated_archive = dated_dir.join(&archive_name);
        tar_gz_dir(zone, staging, &dated_archive)?;

        let metadata = ArchiveMetadata {
            zone_name: zone.to_string(),
            timestamp: timestamp.to_string(),
            archive_date: Local::now().to_rfc3339(),
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
            total_files: typescript.file_count + python.file_count,
            total_size_bytes: typescript.size_bytes + python.size_bytes,
            total_size_mb: round_mb(typescript.size_bytes + python.size_bytes),
            typescript,
            python,
        };
        let metadata_name = format!("{zone}_metadata.json");
        let encoded =
            serde_json::to_string_pretty(&metadata).map_err(|e| ArchiveError::Metadata {
                zone: zone.to_string(),
                source: e,
            })?;
        fs::write(dated_dir.join(&metadata_name), &encoded)
            .map_err(|e| ArchiveError::io(zone, "failed to write archive metadata", e))?;

        let latest_dir = self.archive_root.join("latest");
        fs::create_dir_all(&latest_dir)
            .map_err(|e| ArchiveError::io(zone, "failed to create latest directory", e))?;
        let latest_archive = latest_dir.join(&archive_name);
        fs::copy(&dated_archive, &latest_archive)
            .map_err(|e| ArchiveError::io(zone, "failed to update latest archive", e))?;
        fs::write(latest_dir.join(&metadata_name), &encoded)
            .map_err(|e| ArchiveError::io(zone, "failed to update latest metadata", e))?;

        info!(zone = %zone, archive = %dated_archive.display(), "archived zone clients");
        println!("📦 Archived zone '{zone}' to {}", dated_archive.display());

        Ok(ArchiveOutcome {
            zone: zone.to_string(),
            timestamp: timestamp.to_string(),
            timestamped_archive: dated_archive,
            latest_archive,
            metadata,
        })
    }

    /// Copy one client source (file or directory tree) into staging and
    /// measure it. A `None` or missing source yields an unavailable
    /// artifact, not an error.
    fn stage_client(
        &self,
        zone: &str,
        source: Option<&Path>,
        dest: &Path,
    ) -> Result<ClientArtifact, ArchiveError> {
        let Some(source) = source else {
            return Ok(ClientArtifact::default());
        };
        if !source.exists() {
            warn!(zone = %zone, path = %source.display(), "client path missing, skipping in archive");
            return Ok(ClientArtifact::default());
        }

        copy_into(source, dest)
            .map_err(|e| ArchiveError::io(zone, "failed to stage client files", e))?;
        let (file_count, size_bytes) = tree_stats(dest);
        Ok(ClientArtifact {
            available: true,
            path: Some(source.display().to_string()),
            file_count,
            size_bytes,
        })
    }

    /// All archives on disk: `latest/` first, then dated runs newest
    /// first. Unreadable metadata degrades to `None`, never an error.
    pub fn list_archives(&self) -> Vec<ArchiveEntry> {
        let mut entries = Vec::new();
        entries.extend(self.collect_archives(&self.archive_root.join("latest"), true, None));

        let files_dir = self.archive_root.join("files");
        let mut dated: Vec<PathBuf> = match fs::read_dir(&files_dir) {
            Ok(reader) => reader
                .filter_map(Result::ok)
                .filter(|e| e.path().is_dir())
                .map(|e| e.path())
                .collect(),
            Err(_) => Vec::new(),
        };
        dated.sort();
        dated.reverse();
        for dir in dated {
            let timestamp = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned());
            entries.extend(self.collect_archives(&dir, false, timestamp));
        }
        entries
    }

    fn collect_archives(
        &self,
        dir: &Path,
        latest: bool,
        timestamp: Option<String>,
    ) -> Vec<ArchiveEntry> {
        let Ok(reader) = fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut entries: Vec<ArchiveEntry> = reader
            .filter_map(Result::ok)
            .filter_map(|e| {
                let path = e.path();
                let name = e.file_name().to_string_lossy().into_owned();
                let zone = name.strip_suffix(".tar.gz")?.to_string();
                let size_bytes = e.metadata().map(|m| m.len()).unwrap_or(0);
                let metadata = read_metadata(&path.with_file_name(format!("{zone}_metadata.json")));
                let timestamp = timestamp
                    .clone()
                    .or_else(|| metadata.as_ref().map(|m| m.timestamp.clone()));
                Some(ArchiveEntry {
                    zone,
                    timestamp,
                    latest,
                    path,
                    size_bytes,
                    metadata,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.zone.cmp(&b.zone));
        entries
    }

    /// Remove dated archive directories older than `keep_days`.
    ///
    /// A directory participates only if its name starts with a parseable
    /// `YYYYMMDD` date; anything else survives unconditionally. Returns
    /// the number of directories removed.
    pub fn clean_old_archives(&self, keep_days: u32) -> Result<usize, ArchiveError> {
        let files_dir = self.archive_root.join("files");
        if !files_dir.exists() {
            return Ok(0);
        }
        let cutoff = Local::now()
            .date_naive()
            .checked_sub_days(Days::new(u64::from(keep_days)))
            .unwrap_or(NaiveDate::MIN);

        let reader = fs::read_dir(&files_dir).map_err(|e| ArchiveError::Retention {
            path: files_dir.clone(),
            source: e,
        })?;
        let mut removed = 0;
        for entry in reader.filter_map(Result::ok) {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(date) = parse_archive_date(&name) else {
                debug!(dir = %name, "archive directory name has no date prefix, keeping");
                continue;
            };
            if date < cutoff {
                fs::remove_dir_all(&path).map_err(|e| ArchiveError::Retention {
                    path: path.clone(),
                    source: e,
                })?;
                info!(dir = %name, "removed old archive directory");
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// `YYYYMMDD` prefix of a dated directory name, if it parses.
fn parse_archive_date(name: &str) -> Option<NaiveDate> {
    let prefix = name.get(..8)?;
    NaiveDate::parse_from_str(prefix, "%Y%m%d").ok()
}

fn round_mb(bytes: u64) -> f64 {
    (bytes as f64 / 1_048_576.0 * 100.0).round() / 100.0
}

fn read_metadata(path: &Path) -> Option<ArchiveMetadata> {
    let contents = fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Copy a file or directory tree into `dest`. A single file lands as
/// `dest/<file name>`.
fn copy_into(source: &Path, dest: &Path) -> io::Result<()> {
    if source.is_dir() {
        for entry in WalkDir::new(source) {
            let entry = entry.map_err(io::Error::from)?;
            let rel = entry
                .path()
                .strip_prefix(source)
                .map_err(io::Error::other)?;
            let target = dest.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else if entry.file_type().is_file() {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(entry.path(), &target)?;
            }
        }
    } else {
        fs::create_dir_all(dest)?;
        let name = source
            .file_name()
            .ok_or_else(|| io::Error::other("source path has no file name"))?;
        fs::copy(source, dest.join(name))?;
    }
    Ok(())
}

/// Stats of a staged tree, excluding diagnostic logs to match the
/// archive payload.
fn tree_stats(dir: &Path) -> (usize, u64) {
    let mut count = 0;
    let mut bytes = 0;
    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        if is_error_log(&entry.file_name().to_string_lossy()) {
            continue;
        }
        count += 1;
        bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
    }
    (count, bytes)
}

/// Compress a staging tree into a `.tar.gz`, excluding `error_*.log`
/// files. Entries are added in sorted order.
fn tar_gz_dir(zone: &str, src: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let file = fs::File::create(dest)
        .map_err(|e| ArchiveError::io(zone, "failed to create archive file", e))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry =
            entry.map_err(|e| ArchiveError::io(zone, "failed to walk staging tree", io::Error::from(e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if is_error_log(&name) {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| ArchiveError::io(zone, "failed to relativize staged path", io::Error::other(e)))?;
        builder
            .append_path_with_name(entry.path(), rel)
            .map_err(|e| ArchiveError::io(zone, "failed to append archive entry", e))?;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| ArchiveError::io(zone, "failed to finish archive", e))?;
    encoder
        .finish()
        .map_err(|e| ArchiveError::io(zone, "failed to flush compressed archive", e))?;
    Ok(())
}
