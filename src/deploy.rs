//! Two-phase batch deployment of JSON payloads onto znodes.
//!
//! A mapping file lists `target_path:source_file` pairs, one per line. Deployment happens in
//! two phases:
//!
//! 1. [`DeploymentPlan::load`] parses every line and checks that every source file is
//!    readable. If anything is wrong, the deployment stops here and the namespace is never
//!    touched.
//! 2. [`deploy`] replays the parsed entries in file order. Each payload is read, validated as
//!    JSON and canonicalized only now, and a failure on one entry is reported without
//!    stopping the remaining entries.
//!
//! JSON well-formedness is deliberately not part of phase 1, so an invalid payload only
//! affects its own entry.

use crate::namespace::{Namespace, NamespaceError, create_and_set};
use crate::payload::{PayloadError, read_canonical};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

const COMMENT_PREFIX: char = '#';
const SEPARATOR: char = ':';

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("IO error reading mapping file {path}: {source}")]
    MappingIo {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed mapping entry on line {line}: {content:?} (expected <znode>:<file>)")]
    MalformedMappingEntry { line: usize, content: String },
    #[error("{} unreadable source file(s), nothing was deployed: {}", .0.len(), display_paths(.0))]
    UnreadableSource(Vec<PathBuf>),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Namespace(#[from] NamespaceError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentEntry {
    /// 1-based line number in the mapping file.
    pub line: usize,
    pub target_path: String,
    pub source: PathBuf,
}

/// Validated, in-memory form of a mapping file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    pub entries: Vec<DeploymentEntry>,
}

#[derive(Debug, thiserror::Error)]
#[error("Error during creation/insertion of {} from {}: {}", .target_path, .file.display(), .error)]
pub struct EntryFailure {
    pub target_path: String,
    pub file: PathBuf,
    pub error: EntryError,
}

#[derive(Debug, Default)]
pub struct DeployReport {
    pub applied: Vec<String>,
    pub failures: Vec<EntryFailure>,
}

impl DeploymentPlan {
    /// Reads and validates the mapping file at `path` (phase 1).
    ///
    /// Relative source paths are resolved against the mapping file's directory.
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        let content = std::fs::read_to_string(path).map_err(|source| DeployError::MappingIo {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or(Path::new("."));
        Self::parse(&content, base_dir)
    }

    /// Parses mapping `content` and checks source readability.
    ///
    /// All entries are checked before failing so that every unreadable source is reported
    /// at once.
    pub fn parse(content: &str, base_dir: &Path) -> Result<Self, DeployError> {
        let mut entries = Vec::new();

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim_end();
            if line.is_empty() || line.starts_with(COMMENT_PREFIX) {
                continue;
            }

            let (target_path, source) = line.split_once(SEPARATOR).ok_or_else(|| {
                DeployError::MalformedMappingEntry {
                    line: idx + 1,
                    content: line.to_string(),
                }
            })?;

            let entry = DeploymentEntry {
                line: idx + 1,
                target_path: target_path.to_string(),
                source: base_dir.join(source),
            };
            debug!(
                "Line {}: {} <- {}",
                entry.line,
                entry.target_path,
                entry.source.display()
            );
            entries.push(entry);
        }

        let unreadable: Vec<PathBuf> = entries
            .iter()
            .filter(|entry| !is_readable_file(&entry.source))
            .map(|entry| {
                error!(
                    "Can't access or open file {} (line {}, znode {})",
                    entry.source.display(),
                    entry.line,
                    entry.target_path
                );
                entry.source.clone()
            })
            .collect();

        if !unreadable.is_empty() {
            return Err(DeployError::UnreadableSource(unreadable));
        }

        info!("Validated {} deployment entries", entries.len());

        Ok(DeploymentPlan { entries })
    }
}

fn is_readable_file(path: &Path) -> bool {
    // Opening a FIFO blocks until a writer shows up, so the type is checked first.
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => File::open(path).is_ok(),
        _ => false,
    }
}

/// Applies every entry of `plan` to `namespace` (phase 2).
///
/// Never stops early: failures are collected in the returned report.
pub fn deploy<N: Namespace + ?Sized>(namespace: &N, plan: &DeploymentPlan) -> DeployReport {
    let mut report = DeployReport::default();

    for entry in &plan.entries {
        match apply_entry(namespace, entry) {
            Ok(()) => report.applied.push(entry.target_path.clone()),
            Err(error) => {
                let failure = EntryFailure {
                    target_path: entry.target_path.clone(),
                    file: entry.source.clone(),
                    error,
                };
                error!("{}", failure);
                report.failures.push(failure);
            }
        }
    }

    info!(
        "Deployed {} of {} entries",
        report.applied.len(),
        plan.entries.len()
    );

    report
}

fn apply_entry<N: Namespace + ?Sized>(
    namespace: &N,
    entry: &DeploymentEntry,
) -> Result<(), EntryError> {
    let payload = read_canonical(&entry.source)?;
    create_and_set(namespace, &entry.target_path, payload)?;
    Ok(())
}
