//! Build history lookups on the CI host's builds directory
//!
//! The CI host keeps one directory per build under `jobs/<job>/builds/<id>/`,
//! each holding a `build.xml` record with the build's start time in epoch
//! milliseconds, plus a `lastSuccessfulBuild` entry naming the last build that
//! succeeded (a plain file with the number, or a symlink to the build directory).
//!
//! Missing or unreadable files mean there is no usable history, which callers
//! turn into a full synchronization. Files that exist but hold garbage are
//! reported as errors.

mod build_record;
mod context;

pub use build_record::extract_timestamp;
pub use context::{BuildContext, BUILD_ID_ENV, BUILD_TAG_ENV, WORKSPACE_ENV};

use crate::fs::FileSystem;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const BUILD_RECORD_FILE: &str = "build.xml";
pub const LAST_SUCCESSFUL_BUILD: &str = "lastSuccessfulBuild";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Cannot derive a job name from BUILD_TAG \"{0}\"")]
    InvalidBuildTag(String),

    #[error("Workspace {0:?} is not inside a CI home directory (expected <home>/workspace/<job>)")]
    InvalidWorkspace(PathBuf),

    #[error("Build identifier \"{value}\" is not a number")]
    InvalidBuildId { value: String },

    #[error("Build record {path:?} has no <timestamp> element")]
    MissingTimestamp { path: PathBuf },

    #[error("Build record {path:?} has an invalid timestamp \"{value}\"")]
    InvalidTimestamp { path: PathBuf, value: String },
}

/// Which build the sync window starts from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildSelector {
    /// The build right before `current_id`
    Previous { current_id: String },
    /// Whatever `lastSuccessfulBuild` points at
    LastSuccessful,
}

/// A build found in the history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildRecord {
    pub id: i64,
    pub started_at: DateTime<Utc>,
}

/// A job's builds directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildHistory {
    builds_dir: PathBuf,
}

impl BuildHistory {
    pub fn new(builds_dir: impl Into<PathBuf>) -> Self {
        Self {
            builds_dir: builds_dir.into(),
        }
    }

    /// Derives `<home>/jobs/<job>/builds` from a job workspace at
    /// `<home>/workspace/<job>` and the host's `BUILD_TAG`.
    pub fn locate(workspace: &Path, build_tag: &str) -> Result<Self, HistoryError> {
        let job = job_name_from_build_tag(build_tag)?;
        let home = workspace
            .parent()
            .and_then(Path::parent)
            .ok_or_else(|| HistoryError::InvalidWorkspace(workspace.to_path_buf()))?;

        let builds_dir = home.join("jobs").join(job).join("builds");
        debug!("Build history located at {}", builds_dir.display());
        Ok(Self::new(builds_dir))
    }

    pub fn builds_dir(&self) -> &Path {
        &self.builds_dir
    }

    pub fn build_record_path(&self, id: i64) -> PathBuf {
        self.builds_dir.join(id.to_string()).join(BUILD_RECORD_FILE)
    }

    /// Resolves the selector to a build number.
    ///
    /// `Ok(None)` means no such build exists (negative identifier, or no
    /// `lastSuccessfulBuild` entry).
    pub fn resolve_build_id(
        &self,
        fs: &dyn FileSystem,
        selector: &BuildSelector,
    ) -> Result<Option<i64>, HistoryError> {
        let raw = match selector {
            BuildSelector::Previous { current_id } => {
                if current_id.starts_with('-') {
                    return Ok(None);
                }
                let current = parse_build_id(current_id)?;
                return Ok(current.checked_sub(1).filter(|id| *id >= 0));
            }
            BuildSelector::LastSuccessful => match self.read_last_successful(fs) {
                Some(raw) => raw,
                None => return Ok(None),
            },
        };

        if raw.starts_with('-') {
            return Ok(None);
        }
        parse_build_id(&raw).map(Some)
    }

    /// Finds the reference build and its start time.
    pub fn reference_build(
        &self,
        fs: &dyn FileSystem,
        selector: &BuildSelector,
    ) -> Result<Option<BuildRecord>, HistoryError> {
        let Some(id) = self.resolve_build_id(fs, selector)? else {
            return Ok(None);
        };

        let path = self.build_record_path(id);
        if !fs.is_file(&path) {
            debug!("No build record at {}", path.display());
            return Ok(None);
        }

        let content = match fs.read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Cannot read build record {}: {:#}", path.display(), e);
                return Ok(None);
            }
        };

        let raw = extract_timestamp(&content)
            .ok_or_else(|| HistoryError::MissingTimestamp { path: path.clone() })?;
        let started_at = raw
            .parse::<i64>()
            .ok()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .ok_or_else(|| HistoryError::InvalidTimestamp {
                path: path.clone(),
                value: raw.clone(),
            })?;

        debug!("Build #{} started at {}", id, started_at);
        Ok(Some(BuildRecord { id, started_at }))
    }

    fn read_last_successful(&self, fs: &dyn FileSystem) -> Option<String> {
        let path = self.builds_dir.join(LAST_SUCCESSFUL_BUILD);

        if let Ok(target) = fs.read_link(&path) {
            return target
                .file_name()
                .map(|name| name.to_string_lossy().trim().to_string());
        }

        if !fs.is_file(&path) {
            debug!("No {} entry in {}", LAST_SUCCESSFUL_BUILD, self.builds_dir.display());
            return None;
        }

        match fs.read_to_string(&path) {
            Ok(content) => content.lines().next().map(|line| line.trim().to_string()),
            Err(e) => {
                warn!("Cannot read {}: {:#}", path.display(), e);
                None
            }
        }
    }
}

/// `BUILD_TAG` is `<prefix>-<job>-<number>`; the job name may itself contain dashes.
pub fn job_name_from_build_tag(build_tag: &str) -> Result<String, HistoryError> {
    let invalid = || HistoryError::InvalidBuildTag(build_tag.to_string());

    let (_, rest) = build_tag.trim().split_once('-').ok_or_else(invalid)?;
    let job = match rest.rsplit_once('-') {
        Some((job, number)) if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) => {
            job
        }
        _ => rest,
    };

    if job.is_empty() {
        return Err(invalid());
    }
    Ok(job.to_string())
}

fn parse_build_id(value: &str) -> Result<i64, HistoryError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| HistoryError::InvalidBuildId {
            value: value.to_string(),
        })
}
